//! Client address and user agent for audit entries

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use crate::middleware::auth::AuthUser;
use crate::models::AuditContext;

/// Request metadata recorded with every audited mutation
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Audit context for an authenticated caller
    pub fn audit_context(&self, user: &AuthUser) -> AuditContext {
        AuditContext::for_actor(user.id)
            .with_request(self.ip_address.clone(), self.user_agent.as_deref())
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Client IP, in order: first X-Forwarded-For entry, X-Real-IP, socket peer.
/// A header that does not parse falls through to the next source.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            ip_address: client_ip(&parts.headers, peer).map(|ip| ip.to_string()),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
        })
    }
}
