//! Business logic services

pub mod audit;
pub mod campaigns;
pub mod content;
pub mod dispatch_scheduler;
pub mod dispatcher;
pub mod generation;
pub mod publications;
pub mod publisher;
pub mod workflow;

pub use campaigns::{AccountService, CampaignService};
pub use content::{ContentService, ObjectGeneration};
pub use dispatch_scheduler::start_dispatch_scheduler;
pub use dispatcher::{DispatchOutcome, DispatchResult, PublicationDispatcher};
pub use generation::GenerationClient;
pub use publications::PublicationService;
pub use publisher::{build_publisher, LogPublisher, PublishReceipt, PublishRequest, Publisher, WebhookPublisher};
pub use workflow::WorkflowClient;
