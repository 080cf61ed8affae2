//! The live UCS: a single writer behind a `tokio::sync::RwLock`, readers
//! taking cheap clones of `Arc`-wrapped snapshots (§5 Scheduling: "a
//! single-writer UCS behind a `tokio::sync::RwLock`").
//!
//! Every mutation goes through [`UserCredentialStore`]'s methods (never
//! directly through the lock from outside this crate), so admin operations
//! and the periodic snapshot task are the only writers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::snapshot::{read_snapshot, write_snapshot};
use crate::state::UcsState;

#[derive(Clone)]
pub struct UserCredentialStore {
    state: Arc<RwLock<UcsState>>,
    snapshot_path: PathBuf,
}

impl UserCredentialStore {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self {
            state: Arc::new(RwLock::new(UcsState::empty())),
            snapshot_path,
        }
    }

    /// Load a previous snapshot if one exists at `snapshot_path`; a missing
    /// file just starts from empty state, mirroring a fresh install.
    pub async fn load_or_empty(snapshot_path: PathBuf) -> Self {
        let state = if snapshot_path.exists() {
            match read_snapshot::<UcsState>(&snapshot_path) {
                Ok(state) => {
                    info!(path = %snapshot_path.display(), "loaded UCS snapshot");
                    state
                }
                Err(err) => {
                    warn!(path = %snapshot_path.display(), error = %err, "failed to load UCS snapshot, starting empty");
                    UcsState::empty()
                }
            }
        } else {
            UcsState::empty()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path,
        }
    }

    /// A cheap, consistent read-only copy of the whole state (the "readers
    /// are cheap clones" half of the scheduling model). Callers that only
    /// need one field should prefer a narrower accessor where one exists.
    pub async fn snapshot(&self) -> UcsState {
        self.state.read().await.clone()
    }

    /// Run `f` against the live state under the write lock. Kept `pub`
    /// (not just `pub(crate)`) deliberately: other daemons (the router)
    /// need atomic read-modify-write sequences — e.g. charging a quota —
    /// that a pair of separate `snapshot`/mutate calls couldn't make
    /// atomic across the lock.
    pub async fn with_write<R>(&self, f: impl FnOnce(&mut UcsState) -> R) -> R {
        let mut guard = self.state.write().await;
        f(&mut guard)
    }

    pub async fn with_read<R>(&self, f: impl FnOnce(&UcsState) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    pub async fn persist(&self) -> Result<(), crate::error::UcsError> {
        let state = self.snapshot().await;
        write_snapshot(&self.snapshot_path, &state)?;
        info!(path = %self.snapshot_path.display(), "wrote UCS snapshot");
        Ok(())
    }

    /// Reload state from `snapshot_path`, replacing whatever is currently
    /// live (§6.1 admin "load"). A missing file is an error here, unlike
    /// [`Self::load_or_empty`] at startup: an admin asking to reload
    /// almost certainly expects a snapshot to already exist.
    pub async fn reload(&self) -> Result<(), crate::error::UcsError> {
        let state = read_snapshot::<UcsState>(&self.snapshot_path)?;
        *self.state.write().await = state;
        info!(path = %self.snapshot_path.display(), "reloaded UCS snapshot");
        Ok(())
    }

    /// Spawn the periodic snapshot task (§3.1 "periodic full-state
    /// snapshotting"). Errors are logged, not propagated: a failed
    /// snapshot write should not bring down the daemon.
    pub fn spawn_periodic_snapshots(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.persist().await {
                    warn!(error = %err, "periodic UCS snapshot failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::{GroupId, UserId};

    #[tokio::test]
    async fn snapshot_reflects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserCredentialStore::new(dir.path().join("state.bin"));

        store
            .with_write(|state| {
                state
                    .users
                    .insert(UserId::new("u1"), jasmin_proto::User::new("u1", "g1", "alice", "pw"));
            })
            .await;

        let snap = store.snapshot().await;
        assert!(snap.users.contains_key(&UserId::new("u1")));
        let _ = GroupId::new("g1");
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let store = UserCredentialStore::new(path.clone());
        store
            .with_write(|state| {
                state
                    .users
                    .insert(UserId::new("u1"), jasmin_proto::User::new("u1", "g1", "alice", "pw"));
            })
            .await;
        store.persist().await.unwrap();

        let reloaded = UserCredentialStore::load_or_empty(path).await;
        let snap = reloaded.snapshot().await;
        assert!(snap.users.contains_key(&UserId::new("u1")));
    }

    #[tokio::test]
    async fn reload_discards_in_memory_changes_since_last_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let store = UserCredentialStore::new(path.clone());
        store
            .with_write(|state| {
                state
                    .users
                    .insert(UserId::new("u1"), jasmin_proto::User::new("u1", "g1", "alice", "pw"));
            })
            .await;
        store.persist().await.unwrap();

        store
            .with_write(|state| {
                state
                    .users
                    .insert(UserId::new("u2"), jasmin_proto::User::new("u2", "g1", "bob", "pw"));
            })
            .await;

        store.reload().await.unwrap();

        let snap = store.snapshot().await;
        assert!(snap.users.contains_key(&UserId::new("u1")));
        assert!(!snap.users.contains_key(&UserId::new("u2")));
    }

    #[tokio::test]
    async fn reload_without_a_prior_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserCredentialStore::new(dir.path().join("missing.bin"));
        assert!(store.reload().await.is_err());
    }
}
