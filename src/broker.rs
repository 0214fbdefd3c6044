//! Registry of ephemeral, single-consumer job event channels.
//!
//! Each channel is an unbounded FIFO. Publishing never blocks; a stalled or
//! disconnected consumer lets events pile up until the job closes the channel.
//! Draining is destructive, so two concurrent consumers split the events
//! between them. Only one reader per channel is supported.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::store::ItemDto;

/// Lifecycle state carried by `status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Empty,
    Done,
}

/// Per-source result attached to the final `done` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SourceOutcome {
    /// Adapter answered; `count` items were streamed from it.
    Fetched { count: usize },
    /// Streaming stopped early on a store error after `count` items.
    Partial { count: usize, reason: String },
    /// Adapter failed; the job moved on to the next source.
    Failed { reason: String },
    /// Source type has no adapter.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPayload {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReport>,
}

impl StatusPayload {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            message: None,
            sources: Vec::new(),
        }
    }
}

/// One event on a job channel. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(StatusPayload),
    Item(ItemDto),
    Close,
}

impl ChannelEvent {
    pub fn status(status: JobStatus) -> Self {
        ChannelEvent::Status(StatusPayload::new(status))
    }

    /// Wire event type.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::Status(_) => "status",
            ChannelEvent::Item(_) => "item",
            ChannelEvent::Close => "close",
        }
    }

    /// JSON data line payload.
    pub fn data(&self) -> serde_json::Value {
        match self {
            ChannelEvent::Status(p) => {
                serde_json::to_value(p).unwrap_or_else(|_| serde_json::json!({}))
            }
            ChannelEvent::Item(item) => serde_json::json!({ "item": item }),
            ChannelEvent::Close => serde_json::json!({}),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, ChannelEvent::Close)
    }
}

struct ChannelQueue {
    tx: UnboundedSender<ChannelEvent>,
    rx: tokio::sync::Mutex<UnboundedReceiver<ChannelEvent>>,
}

/// Channel registry. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct ChannelBroker {
    channels: Mutex<HashMap<String, Arc<ChannelQueue>>>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, channel_id: &str) -> Option<Arc<ChannelQueue>> {
        let map = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        map.get(channel_id).cloned()
    }

    /// Allocate and register an empty channel; returns its id.
    pub fn create_channel(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(ChannelQueue {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        });
        let mut map = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        map.insert(id.clone(), queue);
        debug!(target: "broker", channel = %id, "channel created");
        id
    }

    /// Append an event; unknown or closed channels drop it silently.
    pub fn publish(&self, channel_id: &str, event: ChannelEvent) {
        if let Some(q) = self.lookup(channel_id) {
            // The receiver lives inside the same queue, so send cannot fail here.
            let _ = q.tx.send(event);
        }
    }

    /// Unregister the channel and push the terminal `close`. Idempotent.
    pub fn close(&self, channel_id: &str) {
        let removed = {
            let mut map = self.channels.lock().unwrap_or_else(|p| p.into_inner());
            map.remove(channel_id)
        };
        if let Some(q) = removed {
            let _ = q.tx.send(ChannelEvent::Close);
            debug!(target: "broker", channel = %channel_id, "channel closed");
        }
    }

    pub fn is_open(&self, channel_id: &str) -> bool {
        self.lookup(channel_id).is_some()
    }

    pub fn open_channels(&self) -> usize {
        self.channels.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Drain events in publish order, ending right after `close`.
    /// Unknown channels yield an empty stream.
    pub fn consume(&self, channel_id: &str) -> BoxStream<'static, ChannelEvent> {
        let Some(queue) = self.lookup(channel_id) else {
            return stream::empty().boxed();
        };
        stream::unfold(Some(queue), |state| async move {
            let queue = state?;
            let next = {
                let mut rx = queue.rx.lock().await;
                rx.recv().await
            };
            // The queue keeps its own sender alive, so recv only ends on close.
            let event = next?;
            let keep = if event.is_close() { None } else { Some(queue) };
            Some((event, keep))
        })
        .boxed()
    }
}
