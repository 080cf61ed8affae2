//! `ScmManager`: the admin-facing registry of connectors and their
//! running session tasks (§4.3 "Admin operations: add, remove, start,
//! stop, stop-all, list, details"). An `RwLock<HashMap>` registry over
//! connector entries, with a single-writer connect/disconnect path for
//! starting and stopping one connector's task.

use std::collections::HashMap;
use std::sync::Arc;

use jasmin_proto::{Connector, ConnectorId, ConnectorStatus};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ScmError;
use crate::session::{self, SessionContext};

/// A registered connector plus the handle to its running task, if
/// started. Re-adding a `cid` that is `Some` is rejected (§3: "cid
/// unique; cannot be re-added with same cid while present").
struct Entry {
    connector: Connector,
    task: Option<RunningTask>,
}

struct RunningTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<ConnectorStatus>,
}

/// Details surfaced by the admin `list`/`details` operations.
#[derive(Debug, Clone)]
pub struct ConnectorDetails {
    pub cid: ConnectorId,
    pub started: bool,
    pub status: ConnectorStatus,
}

pub struct ScmManager {
    entries: RwLock<HashMap<ConnectorId, Entry>>,
    session_context: Arc<dyn Fn(&Connector) -> SessionContext + Send + Sync>,
}

impl ScmManager {
    /// `session_context` builds a fresh `SessionContext` per connector
    /// start (it owns the shared bus/store/router/link-factory handles
    /// this crate's caller already constructed).
    pub fn new(session_context: impl Fn(&Connector) -> SessionContext + Send + Sync + 'static) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            session_context: Arc::new(session_context),
        }
    }

    pub async fn add(&self, connector: Connector) -> Result<(), ScmError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&connector.cid) {
            return Err(ScmError::AlreadyStarted(connector.cid.to_string()));
        }
        entries.insert(connector.cid.clone(), Entry { connector, task: None });
        Ok(())
    }

    pub async fn remove(&self, cid: &ConnectorId) -> Result<(), ScmError> {
        let mut entries = self.entries.write().await;
        let entry = entries.remove(cid).ok_or_else(|| ScmError::UnknownConnector(cid.to_string()))?;
        if let Some(task) = entry.task {
            let _ = task.shutdown_tx.send(true);
            let _ = task.handle.await;
        }
        Ok(())
    }

    /// Start a registered connector's session task. Starting an
    /// already-started connector cancels the prior consumer and
    /// re-subscribes (§4.3: "starting a started connector cancels the
    /// prior consumer and re-subscribes; this is a deliberate
    /// guarantee"), implemented here as stop-then-start.
    pub async fn start(&self, cid: &ConnectorId) -> Result<(), ScmError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(cid).ok_or_else(|| ScmError::UnknownConnector(cid.to_string()))?;

        if let Some(task) = entry.task.take() {
            let _ = task.shutdown_tx.send(true);
            let _ = task.handle.await;
        }

        entry.connector.started = true;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectorStatus::None);
        let ctx = (self.session_context)(&entry.connector);
        let connector = entry.connector.clone();
        let handle = tokio::spawn(session::run(connector, ctx, status_tx, shutdown_rx));

        entry.task = Some(RunningTask { handle, shutdown_tx, status_rx });
        info!(cid = %cid, "connector started");
        Ok(())
    }

    pub async fn stop(&self, cid: &ConnectorId) -> Result<(), ScmError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(cid).ok_or_else(|| ScmError::UnknownConnector(cid.to_string()))?;
        entry.connector.started = false;
        if let Some(task) = entry.task.take() {
            let _ = task.shutdown_tx.send(true);
            let _ = task.handle.await;
        }
        info!(cid = %cid, "connector stopped");
        Ok(())
    }

    pub async fn stop_all(&self) {
        let cids: Vec<ConnectorId> = self.entries.read().await.keys().cloned().collect();
        for cid in cids {
            let _ = self.stop(&cid).await;
        }
    }

    pub async fn list(&self) -> Vec<ConnectorDetails> {
        let entries = self.entries.read().await;
        entries
            .values()
            .map(|e| ConnectorDetails {
                cid: e.connector.cid.clone(),
                started: e.connector.started,
                status: e.task.as_ref().map(|t| *t.status_rx.borrow()).unwrap_or(ConnectorStatus::None),
            })
            .collect()
    }

    pub async fn details(&self, cid: &ConnectorId) -> Result<ConnectorDetails, ScmError> {
        let entries = self.entries.read().await;
        let entry = entries.get(cid).ok_or_else(|| ScmError::UnknownConnector(cid.to_string()))?;
        Ok(ConnectorDetails {
            cid: entry.connector.cid.clone(),
            started: entry.connector.started,
            status: entry.task.as_ref().map(|t| *t.status_rx.borrow()).unwrap_or(ConnectorStatus::None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_bus::{BackoffPolicy, MessageBus};
    use jasmin_conf::{AmqpConfig, RedisConfig};
    use jasmin_router::RouterCore;
    use jasmin_store::HotStore;
    use jasmin_ucs::UserCredentialStore;
    use std::time::Duration;

    fn connector(cid: &str) -> Connector {
        Connector::new(cid, "127.0.0.1", 2775, jasmin_proto::BindType::Transceiver)
    }

    #[tokio::test]
    async fn adding_the_same_cid_twice_is_rejected() {
        let manager = ScmManager::new(|_| unreachable!("not started in this test"));
        manager.add(connector("smsc1")).await.unwrap();
        let err = manager.add(connector("smsc1")).await.unwrap_err();
        assert!(matches!(err, ScmError::AlreadyStarted(cid) if cid == "smsc1"));
    }

    #[tokio::test]
    async fn starting_an_unregistered_connector_is_an_error() {
        let manager = ScmManager::new(|_| unreachable!("not started in this test"));
        let err = manager.start(&ConnectorId::new("nope")).await.unwrap_err();
        assert!(matches!(err, ScmError::UnknownConnector(cid) if cid == "nope"));
    }

    #[tokio::test]
    async fn list_reflects_registered_but_unstarted_connectors() {
        let manager = ScmManager::new(|_| unreachable!("not started in this test"));
        manager.add(connector("smsc1")).await.unwrap();
        let list = manager.list().await;
        assert_eq!(list.len(), 1);
        assert!(!list[0].started);
        assert_eq!(list[0].status, ConnectorStatus::None);
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn start_then_stop_drives_the_session_task_through_shutdown() {
        let ucs = UserCredentialStore::new(std::env::temp_dir().join("jasmin-scm-manager-test.bin"));
        let store = HotStore::connect(&RedisConfig::default()).unwrap();
        let bus = Arc::new(MessageBus::connect(&AmqpConfig::default()).await.unwrap());

        let manager = ScmManager::new(move |_| SessionContext {
            bus: bus.clone(),
            store: store.clone(),
            router: RouterCore::new(ucs.clone(), store.clone(), bus.clone(), jasmin_conf::SubmitDefaults::default()),
            link_factory: Arc::new(crate::link::test_util::FakeLinkFactory),
            backoff: BackoffPolicy::default(),
            enquire_link_interval: Duration::from_secs(30),
            deliver_poll_interval: Duration::from_millis(200),
        });

        manager.add(connector("smsc1")).await.unwrap();
        manager.start(&ConnectorId::new("smsc1")).await.unwrap();
        manager.stop(&ConnectorId::new("smsc1")).await.unwrap();

        let details = manager.details(&ConnectorId::new("smsc1")).await.unwrap();
        assert!(!details.started);
    }
}
