//! Cross-context session id lookup
//!
//! A page context does not know its own tab id; it asks the hosting process.

use async_trait::async_trait;
use thiserror::Error;

use super::SessionId;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Host did not answer the session id request: {0}")]
    NoResponse(String),
}

/// Resolves the id of the session a page belongs to
#[async_trait]
pub trait SessionIdentity: Send + Sync {
    /// `Ok(None)` when the host answered without an id
    async fn current_session_id(&self) -> Result<Option<SessionId>, IdentityError>;
}

/// Identity known up front, e.g. when the host created the session itself
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(pub Option<SessionId>);

#[async_trait]
impl SessionIdentity for FixedIdentity {
    async fn current_session_id(&self) -> Result<Option<SessionId>, IdentityError> {
        Ok(self.0)
    }
}
