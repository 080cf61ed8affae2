//! Admin RPC operations (§4.6 supplement): user/group/connector lifecycle
//! and quota mutation, exposed to `jasmin-ctl` and the router daemon over
//! the same internal surface (§6.1).

use jasmin_proto::{
    BalanceQuota, Connector, ConnectorId, CountQuota, Direction, Group, GroupId, JasminError, Route, User, UserId,
};
use rust_decimal::Decimal;

use crate::error::UcsError;
use crate::store::UserCredentialStore;

impl UserCredentialStore {
    // --- Users (§4.6 UserManager) ---------------------------------------

    pub async fn add_user(&self, user: User) -> Result<(), UcsError> {
        self.with_write(|state| {
            if state.users.contains_key(&user.id) {
                return Err(UcsError::UserExists(user.id.clone()));
            }
            if !state.groups.contains_key(&user.group_id) {
                return Err(UcsError::GroupNotFound(user.group_id.clone()));
            }
            state.users.insert(user.id.clone(), user);
            Ok(())
        })
        .await
    }

    /// Apply `mutate` to an existing user. Used by narrower admin commands
    /// (enable/disable, quota updates) so each keeps a small surface while
    /// sharing one not-found check.
    pub async fn update_user(&self, id: &UserId, mutate: impl FnOnce(&mut User)) -> Result<(), UcsError> {
        self.with_write(|state| match state.users.get_mut(id) {
            Some(user) => {
                mutate(user);
                Ok(())
            }
            None => Err(UcsError::UserNotFound(id.clone())),
        })
        .await
    }

    /// Removes the user and, with it, its owned MT/SMPPs credentials and
    /// quotas (§3 "Lifetime = owning User").
    pub async fn remove_user(&self, id: &UserId) -> Result<(), UcsError> {
        self.with_write(|state| {
            if state.users.remove(id).is_none() {
                return Err(UcsError::UserNotFound(id.clone()));
            }
            Ok(())
        })
        .await
    }

    pub async fn enable_user(&self, id: &UserId) -> Result<(), UcsError> {
        self.update_user(id, |u| u.enabled = true).await
    }

    pub async fn disable_user(&self, id: &UserId) -> Result<(), UcsError> {
        self.update_user(id, |u| u.enabled = false).await
    }

    /// Apply the `unlimited` / absolute / `+N` / `-N` mutation syntax to a
    /// user's balance quota (§3 MT Credential, matches
    /// `test_userm.py`'s `updateMtCredentialQuota` behavior).
    pub async fn update_mt_balance_quota(&self, id: &UserId, raw: &str) -> Result<(), UcsError> {
        self.with_write(|state| {
            let user = state.users.get_mut(id).ok_or_else(|| UcsError::UserNotFound(id.clone()))?;
            user.mt_credential.balance.apply_update(raw)?;
            Ok(())
        })
        .await
    }

    pub async fn update_mt_submit_sm_count_quota(&self, id: &UserId, raw: &str) -> Result<(), UcsError> {
        self.with_write(|state| {
            let user = state.users.get_mut(id).ok_or_else(|| UcsError::UserNotFound(id.clone()))?;
            user.mt_credential.submit_sm_count.apply_update(raw)?;
            Ok(())
        })
        .await
    }

    pub async fn set_mt_balance_quota(&self, id: &UserId, quota: BalanceQuota) -> Result<(), UcsError> {
        self.update_user(id, |u| u.mt_credential.balance = quota).await
    }

    pub async fn set_mt_submit_sm_count_quota(&self, id: &UserId, quota: CountQuota) -> Result<(), UcsError> {
        self.update_user(id, |u| u.mt_credential.submit_sm_count = quota).await
    }

    /// Atomically check affordability, deduct one `submit_sm_count` unit
    /// and apply the early-decrement-percent split of `total` against the
    /// balance (§4.2 step 4). Returns the amount still owed once the
    /// message is confirmed delivered, or `None` if it was fully deducted
    /// up front. The whole check-then-deduct sequence runs under one
    /// write-lock acquisition so two concurrent submits from the same
    /// user can't both pass the affordability check against a balance
    /// that can only cover one of them.
    pub async fn charge_mt_balance(&self, user_id: &UserId, total: Decimal) -> Result<Option<Decimal>, UcsError> {
        self.with_write(|state| {
            let user = state.users.get_mut(user_id).ok_or_else(|| UcsError::UserNotFound(user_id.clone()))?;
            if !user.mt_credential.balance.can_afford(total) {
                return Err(UcsError::Quota(JasminError::Charging {
                    reason: format!("total {total} exceeds available balance"),
                }));
            }
            let percent = Decimal::from(user.mt_credential.early_decrement_balance_percent.min(100));
            let upfront = total * percent / Decimal::from(100);
            user.mt_credential.balance.deduct(upfront);
            user.mt_credential.submit_sm_count.deduct(1);

            let remainder = total - upfront;
            Ok(if remainder > Decimal::ZERO { Some(remainder) } else { None })
        })
        .await
    }

    /// Deduct a DLR's stored `pending_charge` from its owning user's
    /// balance (§4.2 step 4: "remainder deducted on delivered DLR").
    pub async fn settle_pending_charge(&self, user_id: &UserId, remainder: Decimal) -> Result<(), UcsError> {
        self.with_write(|state| match state.users.get_mut(user_id) {
            Some(user) => {
                user.mt_credential.balance.deduct(remainder);
                Ok(())
            }
            None => Err(UcsError::UserNotFound(user_id.clone())),
        })
        .await
    }

    /// Authenticate an inbound SMPP bind and atomically admit it against
    /// `max_bindings` (§3 SMPPs Credential quota, §4.8): looks the user up
    /// by `system_id`, checks the password digest, `bind_authorized`, and
    /// the current `counters.bound_sessions` against the limit, then
    /// increments the counter — all under one write-lock acquisition so
    /// two concurrent binds from the same user can't both pass the count
    /// check against a limit that can only admit one of them. Mirrors
    /// `charge_mt_balance`'s check-then-mutate shape.
    pub async fn try_bind(&self, system_id: &str, password: &str) -> Result<UserId, UcsError> {
        self.with_write(|state| {
            let (id, user) = state
                .users
                .iter_mut()
                .find(|(_, u)| u.username == system_id)
                .ok_or_else(|| {
                    UcsError::Quota(JasminError::Authentication {
                        username: system_id.to_string(),
                    })
                })?;

            if !user.enabled || !user.password.matches(password) {
                return Err(UcsError::Quota(JasminError::Authentication {
                    username: system_id.to_string(),
                }));
            }
            if !user.smpps_credential.bind_authorized {
                return Err(UcsError::Quota(JasminError::Authorization {
                    username: system_id.to_string(),
                    action: "smpp_bind".to_string(),
                }));
            }
            let limit = user.smpps_credential.max_bindings.unwrap_or(u32::MAX);
            if user.counters.bound_sessions >= limit {
                return Err(UcsError::Quota(JasminError::Throughput {
                    surface: format!("smpp_bind:{system_id}"),
                }));
            }

            user.counters.bound_sessions += 1;
            Ok(id.clone())
        })
        .await
    }

    /// Release one bound-session slot on unbind or connection loss. A
    /// missing user (removed mid-session) is not an error: there is
    /// nothing left to decrement.
    pub async fn unbind(&self, user_id: &UserId) {
        self.with_write(|state| {
            if let Some(user) = state.users.get_mut(user_id) {
                user.counters.bound_sessions = user.counters.bound_sessions.saturating_sub(1);
            }
        })
        .await
    }

    // --- Groups (§4.6 GroupManager) --------------------------------------

    pub async fn add_group(&self, group: Group) -> Result<(), UcsError> {
        self.with_write(|state| {
            if state.groups.contains_key(&group.id) {
                return Err(UcsError::GroupExists(group.id.clone()));
            }
            state.groups.insert(group.id.clone(), group);
            Ok(())
        })
        .await
    }

    /// Removes the group and every member user with it (§3 Group
    /// invariant: cascades to member users).
    pub async fn remove_group(&self, id: &GroupId) -> Result<(), UcsError> {
        self.with_write(|state| {
            if state.groups.remove(id).is_none() {
                return Err(UcsError::GroupNotFound(id.clone()));
            }
            state.users.retain(|_, user| &user.group_id != id);
            Ok(())
        })
        .await
    }

    /// Disabling cascades to member users (§3 Group invariant); enabling a
    /// group does not re-enable users an admin separately disabled, since
    /// that would erase a distinct, independently-made decision.
    pub async fn disable_group(&self, id: &GroupId) -> Result<(), UcsError> {
        self.with_write(|state| {
            if !state.groups.contains_key(id) {
                return Err(UcsError::GroupNotFound(id.clone()));
            }
            state.groups.get_mut(id).unwrap().enabled = false;
            for user in state.users_in_group_mut(id) {
                user.enabled = false;
            }
            Ok(())
        })
        .await
    }

    pub async fn enable_group(&self, id: &GroupId) -> Result<(), UcsError> {
        self.with_write(|state| match state.groups.get_mut(id) {
            Some(group) => {
                group.enabled = true;
                Ok(())
            }
            None => Err(UcsError::GroupNotFound(id.clone())),
        })
        .await
    }

    // --- Connectors (§4.3) -----------------------------------------------

    pub async fn add_connector(&self, connector: Connector) -> Result<(), UcsError> {
        self.with_write(|state| {
            if state.connectors.contains_key(&connector.cid) {
                return Err(UcsError::ConnectorExists(connector.cid.clone()));
            }
            state.connectors.insert(connector.cid.clone(), connector);
            Ok(())
        })
        .await
    }

    /// A started connector must be stopped first (§3 Connector lifecycle:
    /// "add -> start/stop (many cycles) -> remove").
    pub async fn remove_connector(&self, cid: &ConnectorId) -> Result<(), UcsError> {
        self.with_write(|state| {
            let connector = state
                .connectors
                .get(cid)
                .ok_or_else(|| UcsError::ConnectorNotFound(cid.clone()))?;
            if connector.started {
                return Err(UcsError::ConnectorStillStarted(cid.clone()));
            }
            state.connectors.remove(cid);
            Ok(())
        })
        .await
    }

    pub async fn start_connector(&self, cid: &ConnectorId) -> Result<(), UcsError> {
        self.with_write(|state| match state.connectors.get_mut(cid) {
            Some(connector) => {
                connector.started = true;
                Ok(())
            }
            None => Err(UcsError::ConnectorNotFound(cid.clone())),
        })
        .await
    }

    pub async fn stop_connector(&self, cid: &ConnectorId) -> Result<(), UcsError> {
        self.with_write(|state| match state.connectors.get_mut(cid) {
            Some(connector) => {
                connector.started = false;
                Ok(())
            }
            None => Err(UcsError::ConnectorNotFound(cid.clone())),
        })
        .await
    }

    pub async fn list_connectors(&self) -> Vec<Connector> {
        self.with_read(|state| state.connectors.values().cloned().collect()).await
    }

    // --- Routes (§4.1 Route/Filter Engine admin) -------------------------

    pub async fn add_route(&self, direction: Direction, route: Route) -> Result<(), UcsError> {
        self.with_write(|state| table_for(state, direction).insert(route).map_err(UcsError::from)).await
    }

    pub async fn remove_route(&self, direction: Direction, priority: u32) -> Result<(), UcsError> {
        self.with_write(|state| {
            if table_for(state, direction).remove(priority) {
                Ok(())
            } else {
                Err(UcsError::RouteNotFound { direction, priority })
            }
        })
        .await
    }

    pub async fn list_routes(&self, direction: Direction) -> Vec<Route> {
        self.with_read(|state| table_for(state, direction).routes().cloned().collect()).await
    }
}

fn table_for(state: &mut crate::state::UcsState, direction: Direction) -> &mut jasmin_proto::RouteTable {
    match direction {
        Direction::Mt => &mut state.mt_routes,
        Direction::Mo => &mut state.mo_routes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::BindType;
    use rust_decimal::Decimal;

    fn store() -> UserCredentialStore {
        // Leaked on purpose: these tests never persist, so the directory
        // is never touched; a per-test temp path just has to be unique.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        std::mem::forget(dir);
        UserCredentialStore::new(path)
    }

    #[tokio::test]
    async fn add_user_requires_existing_group() {
        let store = store();
        let user = User::new("u1", "missing-group", "alice", "pw");
        let err = store.add_user(user).await.unwrap_err();
        assert!(matches!(err, UcsError::GroupNotFound(_)));
    }

    #[tokio::test]
    async fn add_user_rejects_duplicate_id() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        store.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();
        let err = store.add_user(User::new("u1", "g1", "alice2", "pw")).await.unwrap_err();
        assert!(matches!(err, UcsError::UserExists(_)));
    }

    #[tokio::test]
    async fn disable_group_cascades_to_members() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        store.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();
        store.disable_group(&GroupId::new("g1")).await.unwrap();

        let snap = store.snapshot().await;
        assert!(!snap.users.get(&UserId::new("u1")).unwrap().enabled);
    }

    #[tokio::test]
    async fn remove_group_cascades_removal_of_members() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        store.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();
        store.remove_group(&GroupId::new("g1")).await.unwrap();

        let snap = store.snapshot().await;
        assert!(snap.users.is_empty());
        assert!(snap.groups.is_empty());
    }

    #[tokio::test]
    async fn relative_quota_update_via_admin_surface() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        let mut user = User::new("u1", "g1", "alice", "pw");
        user.mt_credential.balance = BalanceQuota::of(Decimal::new(1000, 2));
        store.add_user(user).await.unwrap();

        store.update_mt_balance_quota(&UserId::new("u1"), "+5").await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(
            snap.users.get(&UserId::new("u1")).unwrap().mt_credential.balance.0,
            Some(Decimal::new(1500, 2))
        );
    }

    #[tokio::test]
    async fn charge_deducts_only_the_early_decrement_share() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        let mut user = User::new("u1", "g1", "alice", "pw");
        user.mt_credential.balance = BalanceQuota::of(Decimal::new(10000, 2)); // 100.00
        user.mt_credential.early_decrement_balance_percent = 50;
        store.add_user(user).await.unwrap();

        let remainder = store
            .charge_mt_balance(&UserId::new("u1"), Decimal::new(2000, 2)) // 20.00
            .await
            .unwrap();
        assert_eq!(remainder, Some(Decimal::new(1000, 2))); // 10.00 owed later

        let snap = store.snapshot().await;
        assert_eq!(
            snap.users.get(&UserId::new("u1")).unwrap().mt_credential.balance.0,
            Some(Decimal::new(9000, 2)) // 100.00 - 10.00 upfront
        );
    }

    #[tokio::test]
    async fn charge_rejects_when_balance_insufficient() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        let mut user = User::new("u1", "g1", "alice", "pw");
        user.mt_credential.balance = BalanceQuota::of(Decimal::new(100, 2)); // 1.00
        store.add_user(user).await.unwrap();

        let err = store
            .charge_mt_balance(&UserId::new("u1"), Decimal::new(2000, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, UcsError::Quota(JasminError::Charging { .. })));
    }

    #[tokio::test]
    async fn connector_must_be_stopped_before_removal() {
        let store = store();
        store
            .add_connector(Connector::new("smsc1", "10.0.0.1", 2775, BindType::Transceiver))
            .await
            .unwrap();
        store.start_connector(&ConnectorId::new("smsc1")).await.unwrap();

        let err = store.remove_connector(&ConnectorId::new("smsc1")).await.unwrap_err();
        assert!(matches!(err, UcsError::ConnectorStillStarted(_)));

        store.stop_connector(&ConnectorId::new("smsc1")).await.unwrap();
        store.remove_connector(&ConnectorId::new("smsc1")).await.unwrap();
    }

    #[tokio::test]
    async fn bind_rejects_wrong_password() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        store.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();

        let err = store.try_bind("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, UcsError::Quota(JasminError::Authentication { .. })));
    }

    #[tokio::test]
    async fn bind_rejects_when_not_bind_authorized() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        store.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();

        let err = store.try_bind("alice", "pw").await.unwrap_err();
        assert!(matches!(err, UcsError::Quota(JasminError::Authorization { .. })));
    }

    #[tokio::test]
    async fn bind_enforces_max_bindings_then_unbind_frees_a_slot() {
        let store = store();
        store.add_group(Group::new("g1")).await.unwrap();
        let mut user = User::new("u1", "g1", "alice", "pw");
        user.smpps_credential.bind_authorized = true;
        user.smpps_credential.max_bindings = Some(1);
        store.add_user(user).await.unwrap();

        let id = store.try_bind("alice", "pw").await.unwrap();
        assert_eq!(id, UserId::new("u1"));

        let err = store.try_bind("alice", "pw").await.unwrap_err();
        assert!(matches!(err, UcsError::Quota(JasminError::Throughput { .. })));

        store.unbind(&id).await;
        store.try_bind("alice", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn connector_cid_is_unique_while_present() {
        let store = store();
        store
            .add_connector(Connector::new("smsc1", "10.0.0.1", 2775, BindType::Transceiver))
            .await
            .unwrap();
        let err = store
            .add_connector(Connector::new("smsc1", "10.0.0.2", 2775, BindType::Transmitter))
            .await
            .unwrap_err();
        assert!(matches!(err, UcsError::ConnectorExists(_)));
    }

    #[tokio::test]
    async fn adding_a_route_at_priority_zero_must_be_default() {
        let store = store();
        let bad = Route {
            priority: 0,
            kind: jasmin_proto::RouteKind::Static,
            filters: Vec::new(),
            destination: jasmin_proto::RouteDestination::Single(ConnectorId::new("smsc1")),
            rate: None,
        };
        let err = store.add_route(Direction::Mt, bad).await.unwrap_err();
        assert!(matches!(err, UcsError::Quota(JasminError::Validation { .. })));
    }

    #[tokio::test]
    async fn removing_a_nonexistent_route_is_an_error() {
        let store = store();
        let err = store.remove_route(Direction::Mt, 7).await.unwrap_err();
        assert!(matches!(err, UcsError::RouteNotFound { direction: Direction::Mt, priority: 7 }));
    }

    #[tokio::test]
    async fn list_routes_reflects_insertions() {
        let store = store();
        store.add_route(Direction::Mt, Route::default_route(ConnectorId::new("smsc1"))).await.unwrap();
        store
            .add_route(
                Direction::Mt,
                Route {
                    priority: 10,
                    kind: jasmin_proto::RouteKind::Static,
                    filters: Vec::new(),
                    destination: jasmin_proto::RouteDestination::Single(ConnectorId::new("smsc2")),
                    rate: None,
                },
            )
            .await
            .unwrap();

        let routes = store.list_routes(Direction::Mt).await;
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].priority, 10);

        store.remove_route(Direction::Mt, 10).await.unwrap();
        assert_eq!(store.list_routes(Direction::Mt).await.len(), 1);
    }
}
