//! Event fan-out for status changes.
//!
//! [`EventBus`] is a small publish/subscribe primitive: listeners register
//! and deregister by identity, and [`EventBus::fire`] delivers the event to
//! every listener on its own task. Firing never waits for a listener, so a
//! slow SSE subscriber cannot stall the lifecycle controller or starve its
//! siblings.
//!
//! The process-wide instance carrying [`StatusChangedEvent`]s is created at
//! startup and handed explicitly to the controller and to every observer
//! adapter. There is no global bus.

use crate::machine::ClusterState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A cluster status transition, broadcast once per transition.
#[derive(Debug, Clone)]
pub struct StatusChangedEvent {
    /// The cluster state entered by the transition.
    pub state: ClusterState,
    /// The failure that caused the transition, if any.
    pub error: Option<String>,
}

impl StatusChangedEvent {
    /// Creates an event for a successful transition.
    #[must_use]
    pub const fn new(state: ClusterState) -> Self {
        Self { state, error: None }
    }

    /// Creates an event for a failed operation.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            state: ClusterState::Error,
            error: Some(error.into()),
        }
    }
}

/// Receiver half of the bus: anything that wants events implements this.
#[async_trait]
pub trait Notifiable<E>: Send + Sync {
    /// Called once per fired event, on a dedicated task.
    async fn notify(&self, event: E);
}

/// Shared handle to the status change bus.
pub type StatusChannel = Arc<EventBus<StatusChangedEvent>>;

/// Publish/subscribe bus for events of type `E`.
///
/// Listeners are keyed by pointer identity: adding the same `Arc` twice is a
/// no-op, and removing a listener that was never added is allowed. The
/// internal mutex is held only to snapshot or mutate the set, never while a
/// listener runs.
pub struct EventBus<E> {
    listeners: Mutex<HashMap<usize, Arc<dyn Notifiable<E>>>>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Creates a new bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `listener` to receive future events.
    ///
    /// Re-adding the same listener is a no-op.
    pub fn add_listener(&self, listener: Arc<dyn Notifiable<E>>) {
        let key = listener_key(&listener);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(key, listener);
        }
    }

    /// Deregisters `listener`.
    ///
    /// Removing a listener that was never added is a no-op.
    pub fn remove_listener(&self, listener: &Arc<dyn Notifiable<E>>) {
        let key = listener_key(listener);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&key);
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Delivers `event` to every currently registered listener.
    ///
    /// Each listener is notified on its own task; this method returns without
    /// waiting for any of them. A panicking listener only tears down its own
    /// task. No delivery ordering is guaranteed, either across listeners or
    /// across consecutive fires.
    pub fn fire(&self, event: E) {
        let snapshot: Vec<Arc<dyn Notifiable<E>>> = match self.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => return,
        };

        for listener in snapshot {
            let event = event.clone();
            tokio::spawn(async move {
                listener.notify(event).await;
            });
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn listener_key<E>(listener: &Arc<dyn Notifiable<E>>) -> usize {
    Arc::as_ptr(listener).cast::<()>() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Recorder {
        tx: mpsc::Sender<StatusChangedEvent>,
    }

    #[async_trait]
    impl Notifiable<StatusChangedEvent> for Recorder {
        async fn notify(&self, event: StatusChangedEvent) {
            let _ = self.tx.send(event).await;
        }
    }

    /// Listener whose notify never completes within the test.
    struct Stuck {
        tx: mpsc::Sender<()>,
    }

    #[async_trait]
    impl Notifiable<StatusChangedEvent> for Stuck {
        async fn notify(&self, _event: StatusChangedEvent) {
            let _ = self.tx.send(()).await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    #[tokio::test]
    async fn test_fire_reaches_all_listeners() {
        let bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        bus.add_listener(Arc::new(Recorder { tx: tx_a }));
        bus.add_listener(Arc::new(Recorder { tx: tx_b }));

        bus.fire(StatusChangedEvent::new(ClusterState::Running));

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.state, ClusterState::Running);
        assert_eq!(got_b.state, ClusterState::Running);
        assert!(rx_a.try_recv().is_err(), "delivered more than once");
    }

    #[tokio::test]
    async fn test_blocked_listener_does_not_stall_delivery() {
        let bus = EventBus::new();
        let (stuck_tx, mut stuck_rx) = mpsc::channel(1);
        let (tx, mut rx) = mpsc::channel(4);
        bus.add_listener(Arc::new(Stuck { tx: stuck_tx }));
        bus.add_listener(Arc::new(Recorder { tx }));

        bus.fire(StatusChangedEvent::new(ClusterState::Stopping));

        // The stuck listener entered notify and will never return; the
        // recorder must still observe the event.
        stuck_rx.recv().await.unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.state, ClusterState::Stopping);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_idempotent() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(4);
        let listener: Arc<dyn Notifiable<StatusChangedEvent>> = Arc::new(Recorder { tx });
        bus.add_listener(listener.clone());
        bus.add_listener(listener);
        assert_eq!(bus.listener_count(), 1);

        bus.fire(StatusChangedEvent::new(ClusterState::Stopped));

        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "duplicate registration delivered twice");
    }

    #[tokio::test]
    async fn test_remove_unknown_listener_is_noop() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(4);
        bus.add_listener(Arc::new(Recorder { tx }));

        let (other_tx, _other_rx) = mpsc::channel(4);
        let never_added: Arc<dyn Notifiable<StatusChangedEvent>> =
            Arc::new(Recorder { tx: other_tx });
        bus.remove_listener(&never_added);

        bus.fire(StatusChangedEvent::new(ClusterState::NoVm));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.state, ClusterState::NoVm);
    }

    #[tokio::test]
    async fn test_removed_listener_stops_receiving() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(4);
        let listener: Arc<dyn Notifiable<StatusChangedEvent>> = Arc::new(Recorder { tx });
        bus.add_listener(listener.clone());
        bus.remove_listener(&listener);
        assert_eq!(bus.listener_count(), 0);

        bus.fire(StatusChangedEvent::new(ClusterState::Running));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
