//! Serialization of lifecycle operations against the single cluster VM.
//!
//! [`Synchronized`] wraps a machine [`Client`](super::Client) and
//! guarantees that at most
//! one mutating operation (start, stop, delete) is in flight at any time.
//! Competing callers are rejected immediately instead of queued; the one
//! exception is a stop/delete arriving while a start is in flight, which
//! cancels the start and waits a bounded time for it to unwind.
//!
//! Status transitions are broadcast on the injected [`StatusChannel`] at the
//! operation boundaries, so SSE and WebSocket observers see every change
//! regardless of which client triggered it.

use super::{
    ClusterLoadResult, ClusterState, ClusterStatusResult, ConnectionDetails, ConsoleResult,
    DynClient, Preset, StartConfig, StartResult,
};
use crate::error::{CoreError, Result};
use crate::events::{StatusChannel, StatusChangedEvent};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// How long a stop/delete waits for an in-flight start to unwind after
/// cancelling it.
const START_CANCEL_TIMEOUT: Duration = Duration::from_secs(15);

/// Internal lifecycle state of the controller.
///
/// At most one of the non-`Idle` states is active at any instant; `Idle` is
/// both the initial and the only rest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No mutating operation in flight.
    Idle,
    /// A start is in flight.
    Starting,
    /// A stop is in flight.
    Stopping,
    /// A delete is in flight.
    Deleting,
}

struct Inner {
    state: LifecycleState,
    /// Cancellation handle of the in-flight start. Present only while
    /// `state == Starting`.
    start_cancel: Option<CancellationToken>,
    done_rx: mpsc::Receiver<LifecycleState>,
}

impl Inner {
    /// Drains a pending completion signal and returns the up-to-date state.
    ///
    /// Completions are recorded lazily: the operation paths push into the
    /// capacity-1 channel when the underlying call returns, and the next
    /// state read folds that into `state`. There is no background task.
    fn refresh(&mut self) -> LifecycleState {
        if let Ok(done) = self.done_rx.try_recv() {
            if self.state == done {
                self.state = LifecycleState::Idle;
            }
            if done == LifecycleState::Starting {
                self.start_cancel = None;
            }
        }
        self.state
    }
}

/// Lifecycle controller wrapping a machine [`Client`](super::Client).
///
/// Created once per process around exactly one driver instance. All methods
/// take `&self`; the controller is shared behind an `Arc` by the daemon, the
/// API handlers and the observer adapters.
pub struct Synchronized {
    underlying: DynClient,
    status_events: StatusChannel,
    done_tx: mpsc::Sender<LifecycleState>,
    inner: Mutex<Inner>,
}

impl Synchronized {
    /// Wraps `underlying`, broadcasting transitions on `status_events`.
    #[must_use]
    pub fn new(underlying: DynClient, status_events: StatusChannel) -> Self {
        let (done_tx, done_rx) = mpsc::channel(1);
        Self {
            underlying,
            status_events,
            done_tx,
            inner: Mutex::new(Inner {
                state: LifecycleState::Idle,
                start_cancel: None,
                done_rx,
            }),
        }
    }

    /// Returns the current lifecycle state, folding in any completion that
    /// has been signalled since the last read. Cheap and non-blocking.
    pub async fn current_state(&self) -> LifecycleState {
        self.inner.lock().await.refresh()
    }

    /// Starts the cluster.
    ///
    /// Rejected with [`CoreError::Busy`] when any operation is already in
    /// flight; the check never blocks. The start itself runs outside the
    /// state lock and may take minutes. The token derived from `cancel` is
    /// stored so a competing stop/delete can abort the boot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Busy`], or whatever the driver returns,
    /// unchanged. Driver errors are additionally broadcast as an `Error`
    /// status event.
    pub async fn start(
        &self,
        cancel: CancellationToken,
        config: StartConfig,
    ) -> Result<StartResult> {
        let start_cancel = cancel.child_token();
        self.prepare_start(start_cancel.clone()).await?;
        self.fire(StatusChangedEvent::new(ClusterState::Starting));

        let result = self.underlying.start(start_cancel, config).await;
        self.signal_done(LifecycleState::Starting);

        match &result {
            Ok(started) => self.fire(StatusChangedEvent::new(started.status)),
            Err(err) => self.fire(StatusChangedEvent::failure(err.to_string())),
        }
        result
    }

    async fn prepare_start(&self, start_cancel: CancellationToken) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.refresh() != LifecycleState::Idle {
            return Err(CoreError::Busy);
        }
        inner.start_cancel = Some(start_cancel);
        inner.state = LifecycleState::Starting;
        Ok(())
    }

    /// Stops the cluster.
    ///
    /// An in-flight start is cancelled first (bounded wait, see
    /// [`CoreError::CancelTimeout`]); an in-flight stop or delete rejects the
    /// call with [`CoreError::StoppingOrDeleting`].
    ///
    /// # Errors
    ///
    /// Returns the preparation failure or the driver error unchanged.
    pub async fn stop(&self) -> Result<ClusterState> {
        self.prepare_stop_delete(LifecycleState::Stopping).await?;
        self.fire(StatusChangedEvent::new(ClusterState::Stopping));

        let result = self.underlying.stop().await;
        self.signal_done(LifecycleState::Stopping);

        match &result {
            Ok(state) => self.fire(StatusChangedEvent::new(*state)),
            Err(err) => self.fire(StatusChangedEvent::failure(err.to_string())),
        }
        result
    }

    /// Deletes the cluster VM.
    ///
    /// Same serialization rules as [`Synchronized::stop`]. The external
    /// state vocabulary has no "deleting", so the intermediate broadcast
    /// reports `Stopping`; success broadcasts `NoVm`.
    ///
    /// # Errors
    ///
    /// Returns the preparation failure or the driver error unchanged.
    pub async fn delete(&self) -> Result<()> {
        self.prepare_stop_delete(LifecycleState::Deleting).await?;
        self.fire(StatusChangedEvent::new(ClusterState::Stopping));

        let result = self.underlying.delete().await;
        self.signal_done(LifecycleState::Deleting);

        match &result {
            Ok(()) => self.fire(StatusChangedEvent::new(ClusterState::NoVm)),
            Err(err) => self.fire(StatusChangedEvent::failure(err.to_string())),
        }
        result
    }

    /// Hard-stops the VM.
    ///
    /// Best-effort and always allowed: power-off bypasses the lifecycle
    /// state machine entirely.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn power_off(&self) -> Result<()> {
        let result = self.underlying.power_off().await;
        match &result {
            Ok(()) => self.fire(StatusChangedEvent::new(ClusterState::Stopped)),
            Err(err) => self.fire(StatusChangedEvent::failure(err.to_string())),
        }
        result
    }

    /// Status snapshot.
    ///
    /// While an operation is in flight the snapshot is synthesized from the
    /// lifecycle state instead of querying the driver (which may be blocked
    /// in the middle of that very operation).
    ///
    /// # Errors
    ///
    /// Returns the driver error when idle and the driver query fails.
    pub async fn status(&self) -> Result<ClusterStatusResult> {
        match self.current_state().await {
            LifecycleState::Starting => {
                Ok(ClusterStatusResult::transitional(ClusterState::Starting))
            }
            LifecycleState::Stopping | LifecycleState::Deleting => {
                Ok(ClusterStatusResult::transitional(ClusterState::Stopping))
            }
            LifecycleState::Idle => self.underlying.status().await,
        }
    }

    /// Shared preparation for stop and delete: settle the current state,
    /// then claim the machine for `target`.
    async fn prepare_stop_delete(&self, target: LifecycleState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.refresh() {
            LifecycleState::Starting => {
                // Cooperative cancellation: signal the in-flight start, then
                // wait (bounded) for its completion to land on the channel.
                if let Some(cancel) = inner.start_cancel.take() {
                    tracing::info!("Cancelling virtual machine start...");
                    cancel.cancel();
                }
                match tokio::time::timeout(START_CANCEL_TIMEOUT, inner.done_rx.recv()).await {
                    Ok(_) => {}
                    Err(_) => return Err(CoreError::CancelTimeout),
                }
            }
            LifecycleState::Idle => {}
            LifecycleState::Stopping | LifecycleState::Deleting => {
                return Err(CoreError::StoppingOrDeleting);
            }
        }

        inner.state = target;
        Ok(())
    }

    /// Records completion of `op`. The channel has capacity 1 and only one
    /// operation can be in flight, so the send cannot fail to find a slot.
    fn signal_done(&self, op: LifecycleState) {
        let _ = self.done_tx.try_send(op);
    }

    fn fire(&self, event: StatusChangedEvent) {
        self.status_events.fire(event);
    }

    // Pass-through operations with no state-machine involvement.

    /// Machine name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.underlying.name()
    }

    /// Cluster preset.
    #[must_use]
    pub fn preset(&self) -> Preset {
        self.underlying.preset()
    }

    /// Whether the VM exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn exists(&self) -> Result<bool> {
        self.underlying.exists().await
    }

    /// Web console location and login details.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn console_url(&self) -> Result<ConsoleResult> {
        self.underlying.console_url().await
    }

    /// SSH connection details.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn connection_details(&self) -> Result<ConnectionDetails> {
        self.underlying.connection_details().await
    }

    /// Instantaneous resource usage.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn cluster_load(&self) -> Result<ClusterLoadResult> {
        self.underlying.cluster_load().await
    }

    /// Whether the VM is running.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn is_running(&self) -> Result<bool> {
        self.underlying.is_running().await
    }

    /// Packages the current VM disk into a reusable bundle.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    pub async fn generate_bundle(&self, force_stop: bool) -> Result<()> {
        self.underlying.generate_bundle(force_stop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, Notifiable};
    use crate::machine::fake::FakeMachine;
    use crate::machine::{Client, ClusterConfig};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Driver whose mutating operations announce entry and then block until
    /// released, so tests can hold an operation in flight.
    struct WaitingMachine {
        entered: mpsc::Sender<()>,
        start_release: Notify,
        stop_release: Notify,
        delete_release: Notify,
    }

    impl WaitingMachine {
        fn new() -> (Arc<Self>, mpsc::Receiver<()>) {
            let (entered, entered_rx) = mpsc::channel(4);
            (
                Arc::new(Self {
                    entered,
                    start_release: Notify::new(),
                    stop_release: Notify::new(),
                    delete_release: Notify::new(),
                }),
                entered_rx,
            )
        }
    }

    #[async_trait]
    impl Client for WaitingMachine {
        fn name(&self) -> &str {
            "waiting machine"
        }

        fn preset(&self) -> Preset {
            Preset::OpenShift
        }

        async fn start(
            &self,
            cancel: CancellationToken,
            _config: StartConfig,
        ) -> Result<StartResult> {
            let _ = self.entered.send(()).await;
            tokio::select! {
                () = cancel.cancelled() => Err(CoreError::Canceled),
                () = self.start_release.notified() => Ok(StartResult {
                    status: ClusterState::Running,
                    cluster_config: ClusterConfig::default(),
                    kubelet_started: true,
                }),
            }
        }

        async fn stop(&self) -> Result<ClusterState> {
            let _ = self.entered.send(()).await;
            self.stop_release.notified().await;
            Ok(ClusterState::Stopped)
        }

        async fn delete(&self) -> Result<()> {
            let _ = self.entered.send(()).await;
            self.delete_release.notified().await;
            Ok(())
        }

        async fn power_off(&self) -> Result<()> {
            Ok(())
        }

        async fn status(&self) -> Result<ClusterStatusResult> {
            Err(CoreError::machine("not implemented"))
        }

        async fn exists(&self) -> Result<bool> {
            Err(CoreError::machine("not implemented"))
        }

        async fn console_url(&self) -> Result<ConsoleResult> {
            Err(CoreError::machine("not implemented"))
        }

        async fn connection_details(&self) -> Result<ConnectionDetails> {
            Err(CoreError::machine("not implemented"))
        }

        async fn cluster_load(&self) -> Result<ClusterLoadResult> {
            Err(CoreError::machine("not implemented"))
        }

        async fn is_running(&self) -> Result<bool> {
            Err(CoreError::machine("not implemented"))
        }

        async fn generate_bundle(&self, _force_stop: bool) -> Result<()> {
            Err(CoreError::machine("not implemented"))
        }
    }

    struct Recorder {
        tx: mpsc::Sender<StatusChangedEvent>,
    }

    #[async_trait]
    impl Notifiable<StatusChangedEvent> for Recorder {
        async fn notify(&self, event: StatusChangedEvent) {
            let _ = self.tx.send(event).await;
        }
    }

    fn synced(machine: Arc<WaitingMachine>) -> Arc<Synchronized> {
        Arc::new(Synchronized::new(machine, Arc::new(EventBus::new())))
    }

    #[tokio::test]
    async fn test_one_start_at_a_time() {
        let (machine, mut entered) = WaitingMachine::new();
        let sync = synced(machine.clone());
        assert_eq!(sync.current_state().await, LifecycleState::Idle);

        let starter = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.start(CancellationToken::new(), StartConfig::default())
                    .await
            })
        };

        entered.recv().await.unwrap();
        assert_eq!(sync.current_state().await, LifecycleState::Starting);
        assert_eq!(sync.name(), machine.name());

        let err = sync
            .start(CancellationToken::new(), StartConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cluster is busy");

        machine.start_release.notify_one();
        let result = starter.await.unwrap().unwrap();
        assert_eq!(result.status, ClusterState::Running);
        assert_eq!(sync.current_state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_conflicts_rejected_while_deleting() {
        let (machine, mut entered) = WaitingMachine::new();
        let sync = synced(machine.clone());
        assert_eq!(sync.current_state().await, LifecycleState::Idle);

        let deleter = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.delete().await })
        };

        entered.recv().await.unwrap();
        assert_eq!(sync.current_state().await, LifecycleState::Deleting);

        let err = sync.delete().await.unwrap_err();
        assert_eq!(err.to_string(), "cluster is stopping or deleting");
        let err = sync.stop().await.unwrap_err();
        assert_eq!(err.to_string(), "cluster is stopping or deleting");
        let err = sync
            .start(CancellationToken::new(), StartConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cluster is busy");

        machine.delete_release.notify_one();
        deleter.await.unwrap().unwrap();
        assert_eq!(sync.current_state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_delete_cancels_in_flight_start() {
        let (machine, mut entered) = WaitingMachine::new();
        let sync = synced(machine.clone());

        let starter = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.start(CancellationToken::new(), StartConfig::default())
                    .await
            })
        };

        entered.recv().await.unwrap();
        assert_eq!(sync.current_state().await, LifecycleState::Starting);

        let deleter = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.delete().await })
        };

        // The delete cancels the start; the start must observe the token.
        let err = starter.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::Canceled));

        // Once the start has unwound, the delete reaches the driver.
        entered.recv().await.unwrap();
        machine.delete_release.notify_one();
        deleter.await.unwrap().unwrap();
        assert_eq!(sync.current_state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_stop_broadcasts_begin_and_end() {
        let (machine, mut entered) = WaitingMachine::new();
        let bus = Arc::new(EventBus::new());
        let sync = Arc::new(Synchronized::new(machine.clone(), bus.clone()));

        let (tx, mut events) = mpsc::channel(8);
        bus.add_listener(Arc::new(Recorder { tx }));

        let stopper = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.stop().await })
        };
        entered.recv().await.unwrap();
        machine.stop_release.notify_one();
        let state = stopper.await.unwrap().unwrap();
        assert_eq!(state, ClusterState::Stopped);

        let begin = events.recv().await.unwrap();
        assert_eq!(begin.state, ClusterState::Stopping);
        assert!(begin.error.is_none());
        let end = events.recv().await.unwrap();
        assert_eq!(end.state, ClusterState::Stopped);
    }

    #[tokio::test]
    async fn test_delete_broadcasts_no_vm_on_success() {
        let (machine, mut entered) = WaitingMachine::new();
        let bus = Arc::new(EventBus::new());
        let sync = Arc::new(Synchronized::new(machine.clone(), bus.clone()));

        let (tx, mut events) = mpsc::channel(8);
        bus.add_listener(Arc::new(Recorder { tx }));

        let deleter = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.delete().await })
        };
        entered.recv().await.unwrap();
        machine.delete_release.notify_one();
        deleter.await.unwrap().unwrap();

        assert_eq!(events.recv().await.unwrap().state, ClusterState::Stopping);
        assert_eq!(events.recv().await.unwrap().state, ClusterState::NoVm);
    }

    #[tokio::test]
    async fn test_status_synthesized_while_starting() {
        let (machine, mut entered) = WaitingMachine::new();
        let sync = synced(machine.clone());

        let starter = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.start(CancellationToken::new(), StartConfig::default())
                    .await
            })
        };
        entered.recv().await.unwrap();

        // The driver's status() would error; the controller must not call it.
        let status = sync.status().await.unwrap();
        assert_eq!(status.cluster_status, ClusterState::Starting);

        machine.start_release.notify_one();
        starter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_start_status_stop_round_trip() {
        let sync = Synchronized::new(Arc::new(FakeMachine::new()), Arc::new(EventBus::new()));

        let result = sync
            .start(CancellationToken::new(), StartConfig::default())
            .await
            .unwrap();
        assert_eq!(result.status, ClusterState::Running);
        assert_eq!(sync.current_state().await, LifecycleState::Idle);

        // Idle again, so status() delegates to the driver.
        let status = sync.status().await.unwrap();
        assert_eq!(status.cluster_status, ClusterState::Running);

        let state = sync.stop().await.unwrap();
        assert_eq!(state, ClusterState::Stopped);
        assert_eq!(sync.current_state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_busy_rejection_fires_no_event() {
        let (machine, mut entered) = WaitingMachine::new();
        let bus = Arc::new(EventBus::new());
        let sync = Arc::new(Synchronized::new(machine.clone(), bus.clone()));

        let starter = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.start(CancellationToken::new(), StartConfig::default())
                    .await
            })
        };
        entered.recv().await.unwrap();

        let (tx, mut events) = mpsc::channel(8);
        bus.add_listener(Arc::new(Recorder { tx }));

        let _ = sync
            .start(CancellationToken::new(), StartConfig::default())
            .await
            .unwrap_err();

        machine.start_release.notify_one();
        starter.await.unwrap().unwrap();

        // Only the original start's completion event arrives, nothing for
        // the rejected request.
        let only = events.recv().await.unwrap();
        assert_eq!(only.state, ClusterState::Running);
        assert!(events.try_recv().is_err());
    }
}
