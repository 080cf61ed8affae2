//! The full UCS aggregate: every user, group, connector and route table
//! (§3 Group, User, Connector, Route). This is the type the snapshot format
//! serializes whole; admin operations mutate it in place.

use std::collections::HashMap;

use jasmin_proto::{Connector, ConnectorId, Direction, Group, GroupId, RouteTable, User, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UcsState {
    pub users: HashMap<UserId, User>,
    pub groups: HashMap<GroupId, Group>,
    pub connectors: HashMap<ConnectorId, Connector>,
    pub mt_routes: RouteTable,
    pub mo_routes: RouteTable,
}

impl UcsState {
    pub fn empty() -> Self {
        Self {
            users: HashMap::new(),
            groups: HashMap::new(),
            connectors: HashMap::new(),
            mt_routes: RouteTable::new(Direction::Mt),
            mo_routes: RouteTable::new(Direction::Mo),
        }
    }

    /// Every user belonging to `group_id`, for cascade operations (§3
    /// Group invariant: "Disabling cascades to member users").
    pub fn users_in_group(&self, group_id: &GroupId) -> impl Iterator<Item = &User> {
        self.users.values().filter(move |u| &u.group_id == group_id)
    }

    /// `username` is the human-facing identifier submit admission
    /// authenticates against (§4.2 step 1); `UserId` is the internal
    /// primary key everything else (routes, quotas) keys off.
    pub fn find_user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn users_in_group_mut(&mut self, group_id: &GroupId) -> impl Iterator<Item = &mut User> {
        self.users.values_mut().filter(move |u| &u.group_id == group_id)
    }
}

impl Default for UcsState {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_in_group_filters_correctly() {
        let mut state = UcsState::empty();
        let g1 = GroupId::new("g1");
        let g2 = GroupId::new("g2");
        state.groups.insert(g1.clone(), Group::new("g1"));
        state.groups.insert(g2.clone(), Group::new("g2"));
        state.users.insert(UserId::new("u1"), User::new("u1", "g1", "alice", "pw"));
        state.users.insert(UserId::new("u2"), User::new("u2", "g2", "bob", "pw"));

        let members: Vec<_> = state.users_in_group(&g1).map(|u| u.username.clone()).collect();
        assert_eq!(members, vec!["alice".to_string()]);
    }
}
