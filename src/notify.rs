use std::sync::mpsc;

use serde_json::{Value, json};
use thiserror::Error;

/// Every stat, score and chat change goes out on this topic, tagged by `kind`.
pub const EVENTS_TOPIC: &str = "events";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no live subscribers on {0}")]
    Disconnected(String),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _topic: &str, _payload: &Value) -> Result<(), PublishError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// Forwards notifications to an in-process receiver (a socket relay, a test).
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Notification>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError> {
        self.tx
            .send(Notification {
                topic: topic.to_string(),
                payload: payload.clone(),
            })
            .map_err(|_| PublishError::Disconnected(topic.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Stat,
    Chat,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Stat => "stat",
            NotificationKind::Chat => "chat",
        }
    }
}

pub fn envelope(kind: NotificationKind, data: Value) -> Value {
    json!({ "kind": kind.as_str(), "data": data })
}

/// Fire and forget: a failed publish is logged and never reaches the caller.
pub fn publish_quietly(publisher: &dyn Publisher, kind: NotificationKind, data: Value) {
    let payload = envelope(kind, data);
    if let Err(err) = publisher.publish(EVENTS_TOPIC, &payload) {
        tracing::warn!(kind = kind.as_str(), error = %err, "notification publish failed");
    }
}
