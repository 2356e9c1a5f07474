//! Event system for progress tracking
//!
//! In-process event bus distributing pipeline progress to subscribers
//! without blocking operations.
//!
//! # Non-Blocking Behavior
//!
//! The bus uses `tokio::sync::broadcast`: if no subscribers exist events are
//! dropped immediately, and lagging subscribers lose oldest events instead
//! of blocking emitters.
//!
//! # Example
//!
//! ```no_run
//! use crosscast::service::events::{EventBus, Event};
//! use crosscast::types::{Platform, PostStatus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PublishStarted {
//!     post_id: "abc123".to_string(),
//!     platforms: vec![Platform::Facebook],
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Platform, PostStatus};

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

/// Event bus for distributing progress events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` is the per-subscriber buffer; lagging subscribers drop
    /// oldest events once it fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers. Non-blocking; a bus with no
    /// subscribers drops the event.
    pub fn emit(&self, event: Event) {
        // send() errs when nobody is listening, which is fine
        let _ = self.sender.send(event);
    }

    /// Number of active subscribers. Diagnostic only.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Events emitted while the pipeline works
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Fan-out started for a post
    PublishStarted {
        post_id: String,
        platforms: Vec<Platform>,
    },

    /// One account delivery moved to in-flight
    AccountPublishing {
        post_id: String,
        account_id: String,
        platform: Platform,
    },

    /// One account delivery reached a terminal state
    AccountCompleted {
        post_id: String,
        account_id: String,
        platform: Platform,
        success: bool,
        error: Option<String>,
    },

    /// Fan-out finished and the aggregate status was recomputed
    PublishCompleted { post_id: String, status: PostStatus },

    /// A retry attempt finished for one result
    RetryCompleted {
        post_result_id: String,
        success: bool,
        retry_count: i64,
    },

    /// Engagement data was refreshed for a post
    EngagementRefreshed {
        post_id: String,
        refreshed: usize,
        failed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emission_and_subscription() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.emit(Event::PublishStarted {
            post_id: "p1".to_string(),
            platforms: vec![Platform::Facebook, Platform::Telegram],
        });

        match receiver.recv().await.unwrap() {
            Event::PublishStarted { post_id, platforms } => {
                assert_eq!(post_id, "p1");
                assert_eq!(platforms.len(), 2);
            }
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        event_bus.emit(Event::PublishCompleted {
            post_id: "p2".to_string(),
            status: PostStatus::Partial,
        });

        for receiver in [&mut receiver1, &mut receiver2] {
            assert!(matches!(
                receiver.recv().await.unwrap(),
                Event::PublishCompleted { status: PostStatus::Partial, .. }
            ));
        }
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_block() {
        let event_bus = EventBus::new(10);
        event_bus.emit(Event::RetryCompleted {
            post_result_id: "r1".to_string(),
            success: false,
            retry_count: 2,
        });
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn events_serialize_with_snake_case_tags() {
        let event = Event::AccountCompleted {
            post_id: "p3".to_string(),
            account_id: "a1".to_string(),
            platform: Platform::Instagram,
            success: false,
            error: Some("Instagram requires an image".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("account_completed"));
        assert!(json.contains("instagram"));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Event::AccountCompleted { success: false, .. }));
    }
}
