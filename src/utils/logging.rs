//! Tracing subscriber setup shared by the server and the CLI tools

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LogTarget, LoggingConfig};

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` wins over `level_override`, which wins over `config.level`.
/// The returned guard must live as long as file output is needed.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Option<WorkerGuard> {
    let level = level_override.unwrap_or(&config.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.target {
        LogTarget::Console => {
            init_console_logging(subscriber, &config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(config);
            init_file_logging(subscriber, &config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(config);
            init_both_logging(subscriber, &config.format, writer);
            Some(guard)
        }
    }
}

fn create_file_writer(config: &LoggingConfig) -> (NonBlocking, WorkerGuard) {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            config.log_dir, e
        );
    }

    let file_appender = if config.daily_rotation {
        tracing_appender::rolling::daily(&config.log_dir, &config.log_prefix)
    } else {
        tracing_appender::rolling::never(&config.log_dir, &config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    match format {
        LogFormat::Json => subscriber.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
    }
}

fn init_file_logging<S>(subscriber: S, format: &LogFormat, writer: NonBlocking)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false).with_writer(writer))
            .init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }
}

fn init_both_logging<S>(subscriber: S, format: &LogFormat, writer: NonBlocking)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true))
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .with(fmt::layer().compact().with_target(false).with_writer(writer))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(true))
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }
}
