//! Notify Module
//!
//! 领域事件广播。发布方 fire-and-forget：没有订阅者不是错误，
//! 事件丢失不影响任何库存/订单不变量（通知是副作用，不是事实来源）。

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Domain events worth telling the outside world about
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    OrderShipped {
        order_id: i64,
        user_id: String,
    },
    OrderCancelled {
        order_id: i64,
        user_id: String,
        reason: String,
    },
    /// Expired cart holds were swept for this user
    ReservationReleased {
        user_id: String,
        removed: u64,
    },
}

/// Broadcast fan-out for domain events
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotifyEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Succeeds regardless of subscriber count.
    pub fn emit(&self, event: NotifyEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No notification subscribers: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifyEvent> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
