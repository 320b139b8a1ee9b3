//! Notification sinks for scheduler lifecycle events

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;
use vmsched_core::{RequestContext, SchedError, SchedResult};

use crate::traits::Notifier;

/// Emitted before a batch is placed
pub const SELECT_DESTINATIONS_START: &str = "scheduler.select_destinations.start";
/// Emitted after a batch has been fully placed
pub const SELECT_DESTINATIONS_END: &str = "scheduler.select_destinations.end";

/// One emitted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub request_id: Uuid,
    pub event_type: String,
    pub payload: Value,
}

/// Operator-facing sink writing events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn info(&self, ctx: &RequestContext, event_type: &str, payload: Value) -> SchedResult<()> {
        info!(
            request_id = %ctx.request_id,
            event_type,
            payload = %payload,
            "Scheduler notification"
        );
        Ok(())
    }
}

/// Sink forwarding events over a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn info(&self, ctx: &RequestContext, event_type: &str, payload: Value) -> SchedResult<()> {
        let notification = Notification {
            request_id: ctx.request_id,
            event_type: event_type.to_string(),
            payload,
        };
        self.tx
            .send(notification)
            .await
            .map_err(|e| SchedError::Notification(format!("receiver dropped: {}", e)))
    }
}
