use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use skytorch_remote::{ConnectionStatusRecord, DashboardStore, Usage};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const CHECK_FAILED_MESSAGE: &str = "Connection check failed";

/// Provider health as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    Connected,
    Warning,
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Maps the store's status string. Anything unrecognised counts as disconnected.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "connected" => Self::Connected,
            "warning" => Self::Warning,
            _ => Self::Disconnected,
        }
    }
}

/// Latest indicator contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub usage: Option<Usage>,
    pub message: Option<String>,
}

impl ConnectionStatus {
    /// Usage that violates `used <= limit` is dropped rather than shown.
    pub fn from_record(record: ConnectionStatusRecord) -> Self {
        Self {
            state: ConnectionState::from_wire(&record.status),
            usage: record.usage.filter(Usage::is_consistent),
            message: record.message.filter(|message| !message.trim().is_empty()),
        }
    }

    /// Disconnected with the fixed failure message.
    pub fn check_failed() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            usage: None,
            message: Some(CHECK_FAILED_MESSAGE.to_string()),
        }
    }
}

/// Shared connection indicator written by the monitor and the send flow.
///
/// Readers take cheap snapshots; every write bumps a version so watchers can re-render.
#[derive(Clone)]
pub struct StatusBoard {
    current: Arc<ArcSwap<ConnectionStatus>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            current: Arc::new(ArcSwap::from_pointee(ConnectionStatus::default())),
            version: Arc::new(version),
        }
    }

    /// Current status. Cheap to call on every render.
    pub fn snapshot(&self) -> Arc<ConnectionStatus> {
        self.current.load_full()
    }

    /// Stores a fresh check result. The usage display is kept when the new result carries none.
    pub fn publish(&self, status: ConnectionStatus) {
        self.current.rcu(|previous| {
            let mut next = status.clone();
            if next.usage.is_none() {
                next.usage = previous.usage;
            }
            next
        });
        self.bump();
    }

    /// Replaces only the usage figures, leaving state and message untouched.
    pub fn update_usage(&self, usage: Usage) -> bool {
        if !usage.is_consistent() {
            return false;
        }
        self.current.rcu(|previous| ConnectionStatus {
            usage: Some(usage),
            ..ConnectionStatus::clone(previous)
        });
        self.bump();
        true
    }

    /// Version counter that changes on every write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Periodic connection check feeding a [`StatusBoard`].
pub struct ConnectionStatusMonitor {
    store: Arc<dyn DashboardStore>,
    board: StatusBoard,
    interval: Duration,
}

impl ConnectionStatusMonitor {
    pub fn new(store: Arc<dyn DashboardStore>, board: StatusBoard, interval: Duration) -> Self {
        Self {
            store,
            board,
            interval,
        }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Runs one check and publishes its result. Failures only degrade the indicator.
    pub async fn check_once(&self) -> ConnectionStatus {
        let status = match self.store.connection_status().await {
            Ok(record) => {
                let status = ConnectionStatus::from_record(record);
                tracing::debug!(state = ?status.state, has_usage = status.usage.is_some(), "connection check finished");
                status
            }
            Err(error) => {
                tracing::warn!(stage = error.stage(), error = %error, "connection check failed");
                ConnectionStatus::check_failed()
            }
        };
        self.board.publish(status.clone());
        status
    }

    /// Spawns the polling task: one check immediately, then one per interval until stopped.
    pub fn start(self) -> MonitorHandle {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        tracing::debug!("connection monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = &mut cancel_rx => {
                                tracing::debug!("connection monitor stopped during a check");
                                break;
                            }
                            _ = self.check_once() => {}
                        }
                    }
                }
            }
        });

        MonitorHandle {
            cancel_tx: Some(cancel_tx),
            task: Some(task),
        }
    }
}

/// Lifetime of a running monitor. Dropping the handle stops polling.
pub struct MonitorHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signals the task to stop, interrupting a check in progress. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
        {
            tracing::warn!(error = %error, "connection monitor task ended abnormally");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future;
    use skytorch_remote::{BoxFuture, ChatPage, ConversationId, Quota, RemoteResult, StatusAction};

    use super::*;
    use crate::testing::{Call, ScriptedStore};

    fn usage(requests_used: u64, tokens_used: u64) -> Usage {
        Usage {
            requests: Quota::new(requests_used, 100),
            tokens: Quota::new(tokens_used, 1000),
        }
    }

    fn record(status: &str, usage: Option<Usage>) -> ConnectionStatusRecord {
        ConnectionStatusRecord {
            status: status.to_string(),
            usage,
            message: None,
        }
    }

    #[test]
    fn inconsistent_usage_is_dropped() {
        let status = ConnectionStatus::from_record(record(
            "connected",
            Some(Usage {
                requests: Quota::new(120, 100),
                tokens: Quota::new(1, 10),
            }),
        ));

        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.usage, None);
        assert_eq!(ConnectionState::from_wire("offline"), ConnectionState::Disconnected);
    }

    #[test]
    fn publish_keeps_previous_usage_when_absent() {
        let board = StatusBoard::new();
        let mut watcher = board.subscribe();

        assert!(board.update_usage(usage(5, 50)));
        board.publish(ConnectionStatus::check_failed());

        let snapshot = board.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert_eq!(snapshot.message.as_deref(), Some(CHECK_FAILED_MESSAGE));
        assert_eq!(snapshot.usage, Some(usage(5, 50)));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), 2);
    }

    #[test]
    fn update_usage_leaves_state_alone() {
        let board = StatusBoard::new();
        board.publish(ConnectionStatus::from_record(record("warning", None)));

        assert!(!board.update_usage(Usage {
            requests: Quota::new(2, 1),
            tokens: Quota::new(0, 1),
        }));
        assert!(board.update_usage(usage(1, 2)));

        let snapshot = board.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Warning);
        assert_eq!(snapshot.usage, Some(usage(1, 2)));
    }

    #[tokio::test]
    async fn failed_check_forces_disconnected_indicator() {
        let store = Arc::new(ScriptedStore::default());
        let monitor =
            ConnectionStatusMonitor::new(store.clone(), StatusBoard::new(), Duration::from_secs(30));

        let status = monitor.check_once().await;

        assert_eq!(status, ConnectionStatus::check_failed());
        assert_eq!(*monitor.board().snapshot(), ConnectionStatus::check_failed());
        assert_eq!(store.calls(), vec![Call::ConnectionStatus]);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_checks_immediately_then_every_interval_until_stopped() {
        let store = Arc::new(ScriptedStore::default());
        store
            .connection_status
            .push_ok(record("connected", Some(usage(3, 30))));
        store.connection_status.push_ok(record("warning", None));
        let board = StatusBoard::new();

        let handle =
            ConnectionStatusMonitor::new(store.clone(), board.clone(), Duration::from_secs(30))
                .start();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.calls().len(), 1);
        assert_eq!(board.snapshot().state, ConnectionState::Connected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.calls().len(), 2);
        assert_eq!(board.snapshot().state, ConnectionState::Warning);
        assert_eq!(board.snapshot().usage, Some(usage(3, 30)));

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.calls().len(), 2);
    }

    /// Store whose status check never answers.
    struct HungStore;

    impl DashboardStore for HungStore {
        fn update_chat_status<'a>(
            &'a self,
            _chat_id: &'a ConversationId,
            _action: StatusAction,
        ) -> BoxFuture<'a, RemoteResult<()>> {
            Box::pin(future::pending::<RemoteResult<()>>())
        }

        fn connection_status(&self) -> BoxFuture<'_, RemoteResult<ConnectionStatusRecord>> {
            Box::pin(future::pending::<RemoteResult<ConnectionStatusRecord>>())
        }

        fn load_more_chats(&self, _page: u32) -> BoxFuture<'_, RemoteResult<ChatPage>> {
            Box::pin(future::pending::<RemoteResult<ChatPage>>())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_hung_check() {
        let board = StatusBoard::new();
        let handle =
            ConnectionStatusMonitor::new(Arc::new(HungStore), board.clone(), Duration::from_secs(30))
                .start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), handle.shutdown()).await;

        assert!(stopped.is_ok());
        assert_eq!(*board.snapshot(), ConnectionStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let store = Arc::new(ScriptedStore::default());
        let handle =
            ConnectionStatusMonitor::new(store.clone(), StatusBoard::new(), Duration::from_secs(30))
                .start();

        tokio::time::sleep(Duration::from_millis(1)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_secs(90)).await;

        assert_eq!(store.calls(), vec![Call::ConnectionStatus]);
    }
}
