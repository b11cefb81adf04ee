//! Per-user live event channels
//!
//! Each user has at most one open channel. The registry keeps the sending
//! half of a bounded queue; the [`ChannelHandle`] owned by the SSE stream
//! keeps the receiving half and releases the slot when dropped.
//!
//! Delivery never blocks: a full queue drops the event for that user only.

use audy_common::events::AudyEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key of the error event sent to a second connection of the same user
pub const ALREADY_CONNECTED_KEY: &str = "already_connected";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("User {0} already has an open channel")]
pub struct AlreadyConnected(pub i64);

struct Slot {
    conn_id: Uuid,
    tx: mpsc::Sender<AudyEvent>,
}

struct Inner {
    slots: Mutex<HashMap<i64, Slot>>,
    capacity: usize,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, user_id: i64, conn_id: Uuid) -> bool {
        let mut slots = self.lock();
        match slots.get(&user_id) {
            Some(slot) if slot.conn_id == conn_id => {
                slots.remove(&user_id);
                true
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<Inner>,
}

impl ChannelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Open the user's channel; fails while another one is open
    pub fn open(&self, user_id: i64) -> Result<ChannelHandle, AlreadyConnected> {
        let mut slots = self.inner.lock();
        if slots.contains_key(&user_id) {
            return Err(AlreadyConnected(user_id));
        }

        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let conn_id = Uuid::new_v4();
        slots.insert(user_id, Slot { conn_id, tx });

        info!(user_id, conn_id = %conn_id, "Channel opened");
        Ok(ChannelHandle {
            user_id,
            conn_id,
            rx,
            registry: Arc::clone(&self.inner),
        })
    }

    /// Queue an event for one user, returning whether it was accepted
    pub fn send_to(&self, user_id: i64, event: AudyEvent) -> bool {
        let mut slots = self.inner.lock();
        let Some(slot) = slots.get(&user_id) else {
            debug!(user_id, event = event.event_type(), "No channel, event dropped");
            return false;
        };

        match slot.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(user_id, event = event.event_type(), "Channel queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                slots.remove(&user_id);
                false
            }
        }
    }

    /// Queue an event for every open channel, returning the delivery count
    pub fn broadcast(&self, event: AudyEvent) -> usize {
        let targets: Vec<(i64, Uuid, mpsc::Sender<AudyEvent>)> = self
            .inner
            .lock()
            .iter()
            .map(|(user_id, slot)| (*user_id, slot.conn_id, slot.tx.clone()))
            .collect();

        let mut delivered = 0;
        for (user_id, conn_id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(user_id, event = event.event_type(), "Channel queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    self.inner.release(user_id, conn_id);
                }
            }
        }

        debug!(event = event.event_type(), delivered, "Broadcast");
        delivered
    }

    /// Close the user's channel with a final `destroy` event
    ///
    /// Returns false when no channel was open.
    pub fn close(&self, user_id: i64) -> bool {
        let Some(slot) = self.inner.lock().remove(&user_id) else {
            return false;
        };

        if slot.tx.try_send(AudyEvent::Destroy).is_err() {
            warn!(user_id, "Could not queue destroy event");
        }
        info!(user_id, conn_id = %slot.conn_id, "Channel closed");
        true
    }

    /// Tell a user's client that its session is gone
    pub fn kick(&self, user_id: i64) -> bool {
        self.send_to(user_id, AudyEvent::Kick)
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.inner.lock().contains_key(&user_id)
    }

    pub fn connected_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Receiving end of a user's channel
pub struct ChannelHandle {
    user_id: i64,
    conn_id: Uuid,
    rx: mpsc::Receiver<AudyEvent>,
    registry: Arc<Inner>,
}

impl ChannelHandle {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Next queued event; `None` once the channel was closed
    pub async fn recv(&mut self) -> Option<AudyEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if self.registry.release(self.user_id, self.conn_id) {
            info!(user_id = self.user_id, conn_id = %self.conn_id, "Channel disconnected");
        }
    }
}
