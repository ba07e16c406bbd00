//! Outbound publish queue and its dispatch loop.
//!
//! Every producer (journal tailer, snapshot watchers) hands finished packets
//! to one shared [`PublishQueue`].  A single dispatch task drains it into the
//! [`BusTransport`].
//!
//! # Backpressure (for beginners)
//!
//! The broker can disappear for minutes while the game keeps writing.  The
//! queue has a fixed capacity; when it is full, the *oldest* item is thrown
//! away to make room.  Recent telemetry is worth more than stale telemetry,
//! and producers never block on a slow or absent broker.
//!
//! ```text
//!  tailer ──┐
//!  status ──┼─► PublishQueue (VecDeque, cap N) ──► dispatch loop ──► BusTransport
//!  modules ─┘        full? evict front                 disconnected? wait, keep head
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use edlink_core::{PacketBuilder, PacketError, PacketSource};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Delay between connectivity checks while the transport is down.
pub const RECONNECT_POLL: Duration = Duration::from_millis(500);

/// Error type for bus publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport is not connected")]
    Disconnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// The outbound half of the message bus.
///
/// The MQTT adapter implements this; tests use recording fakes.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Whether the transport currently has a live broker session.
    fn is_connected(&self) -> bool;

    /// Publishes one payload to `topic`.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// A serialized packet addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Bounded FIFO with drop-oldest overflow.
///
/// `enqueue` never blocks.  The length never exceeds the capacity.
#[derive(Debug)]
pub struct PublishQueue {
    items: Mutex<VecDeque<OutboundMessage>>,
    capacity: usize,
    evicted: AtomicU64,
    ready: Notify,
}

impl PublishQueue {
    /// Creates an empty queue.  A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            evicted: AtomicU64::new(0),
            ready: Notify::new(),
        }
    }

    /// Appends `message`, evicting the oldest item first if the queue is full.
    ///
    /// Returns the evicted item, if any.
    pub fn enqueue(&self, message: OutboundMessage) -> Option<OutboundMessage> {
        let evicted = {
            let mut items = self.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(message);
            evicted
        };

        if let Some(dropped) = &evicted {
            let total = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                topic = %dropped.topic,
                capacity = self.capacity,
                total_evicted = total,
                "publish queue full; dropped oldest message"
            );
        }
        self.ready.notify_one();
        evicted
    }

    /// Removes and returns the oldest item.
    pub fn pop(&self) -> Option<OutboundMessage> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of items dropped by overflow since creation.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Resolves once an item has been enqueued since the last wake-up.
    pub async fn wait_for_item(&self) {
        self.ready.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<OutboundMessage>> {
        // The deque is always left consistent, so a poisoned lock is still usable.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drains `queue` into `transport` until `running` is cleared.
///
/// While the transport is disconnected the loop sleeps for
/// [`RECONNECT_POLL`] *without* dequeuing, so the head item is the first one
/// sent after reconnect.  A dequeued item whose publish fails is logged and
/// dropped.
pub async fn run_dispatch_loop(
    queue: Arc<PublishQueue>,
    transport: Arc<dyn BusTransport>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        if !transport.is_connected() {
            tokio::time::sleep(RECONNECT_POLL).await;
            continue;
        }

        let Some(message) = queue.pop() else {
            // Bounded wait so the stop flag is rechecked.
            let _ = tokio::time::timeout(RECONNECT_POLL, queue.wait_for_item()).await;
            continue;
        };

        match transport.publish(&message.topic, &message.payload).await {
            Ok(()) => debug!(topic = %message.topic, "published"),
            Err(e) => warn!(topic = %message.topic, "publish failed, message dropped: {e}"),
        }
    }
    debug!("dispatch loop stopped");
}

/// Producer handle: wraps data in a packet and enqueues it on its topic.
///
/// Cheap to clone; all clones share the sequence counter and the queue.
#[derive(Debug, Clone)]
pub struct Publisher {
    builder: Arc<PacketBuilder>,
    queue: Arc<PublishQueue>,
    base_topic: String,
}

impl Publisher {
    pub fn new(builder: Arc<PacketBuilder>, queue: Arc<PublishQueue>, base_topic: &str) -> Self {
        Self {
            builder,
            queue,
            base_topic: base_topic.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a packet and enqueues it on `<base>/events/<kind>`.
    ///
    /// Returns the packet's sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] if `data` cannot be serialized; nothing is
    /// enqueued in that case.
    pub fn publish<T>(&self, source: PacketSource, kind: &str, data: &T) -> Result<u64, PacketError>
    where
        T: Serialize + ?Sized,
    {
        let packet = self.builder.build(source, kind, data)?;
        let message = OutboundMessage {
            topic: packet.topic(&self.base_topic),
            payload: packet.to_json()?,
        };
        self.queue.enqueue(message);
        Ok(packet.seq)
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn queue(&self) -> &Arc<PublishQueue> {
        &self.queue
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
