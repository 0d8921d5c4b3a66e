/// Notification bus
///
/// Fans flow notifications out to UI observers so they can follow a run
/// without polling the controller. Every clone shares one subscriber list.
/// Publishing never blocks; a subscriber whose receiver is gone is removed
/// on the next publish.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::debug;

use super::events::Notification;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<Notification>,
}

#[derive(Default)]
struct BusState {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<BusState>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; notifications published from now on are queued
    /// on the returned receiver
    pub fn subscribe(&self) -> (Receiver<Notification>, SubscriberId) {
        let (sender, receiver) = unbounded();
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push(Subscriber { id, sender });
        (receiver, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.subscribers.write().retain(|s| s.id != id);
    }

    /// Deliver `notification` to every live subscriber
    pub fn publish(&self, notification: Notification) {
        let mut subscribers = self.inner.subscribers.write();
        subscribers.retain(|subscriber| match subscriber.sender.try_send(notification.clone()) {
            Err(TrySendError::Disconnected(_)) => {
                debug!("Dropping notification subscriber {:?}", subscriber.id);
                false
            }
            _ => true,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn clear(&self) {
        self.inner.subscribers.write().clear();
    }
}
