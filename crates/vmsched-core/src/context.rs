//! Per-call request context

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Caller identity and ambient signals for one scheduling call
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request identifier, used to correlate logs and notifications
    pub request_id: Uuid,
    /// Requesting user
    pub user_id: Option<String>,
    /// Requesting project
    pub project_id: Option<String>,
    /// Whether the context carries admin rights
    pub is_admin: bool,
    /// Cancellation signal checked once per placement round
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// Create a non-admin context with a fresh request id
    pub fn new(user_id: Option<String>, project_id: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id,
            project_id,
            is_admin: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Copy of this context with admin rights, sharing the same
    /// request id and cancellation signal
    pub fn elevated(&self) -> Self {
        let mut ctx = self.clone();
        ctx.is_admin = true;
        ctx
    }

    /// Attach an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(None, None)
    }
}
