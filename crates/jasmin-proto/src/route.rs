//! Routes and the route table (§3 Route, §4.1 Route/Filter Engine).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::JasminError;
use crate::filter::{Direction, Filter, Routable};
use crate::ids::ConnectorId;

/// Where a matched routable is sent (§4.1 "Route kinds"). The first three
/// variants are MT-only and consumed by `pick_destination`; the last two
/// are MO-only (§4.4 "HTTP targets" / "SmppServerSystemIdConnector") and
/// instead read directly off the resolved route by the deliver classifier,
/// since an MO message has no destination connector to fail over across.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RouteDestination {
    Single(ConnectorId),
    /// Ordered list tried in turn (§4.5).
    Failover(Vec<ConnectorId>),
    /// MT only: picked uniformly at random per submission.
    RandomRoundRobin(Vec<ConnectorId>),
    /// MO: forward as an HTTP POST to this subscriber URL.
    HttpSubscriber(String),
    /// MO: forward to a downstream SMPP session bound under this
    /// `system_id` (§4.4 "SmppServerSystemIdConnector").
    SmppSystemId(String),
}

/// Tags the route's kind explicitly so priority-0 admission can be checked
/// without inferring intent from the destination's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    Default,
    Static,
    Failover,
    RandomRoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub priority: u32,
    pub kind: RouteKind,
    pub filters: Vec<Filter>,
    pub destination: RouteDestination,
    /// MT only; `None` for MO routes.
    pub rate: Option<Decimal>,
}

impl Route {
    pub fn default_route(destination: ConnectorId) -> Self {
        Self {
            priority: 0,
            kind: RouteKind::Default,
            filters: Vec::new(),
            destination: RouteDestination::Single(destination),
            rate: None,
        }
    }

    pub fn matches(&self, routable: &Routable, now: DateTime<Utc>) -> bool {
        self.filters.iter().all(|f| f.matches(routable, now))
    }

    pub fn is_default(&self) -> bool {
        self.priority == 0
    }
}

/// Per-direction route table (§4.1: "Routes are stored per direction (MT,
/// MO) in a mapping priority -> route").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTable {
    direction: Direction,
    routes: BTreeMap<u32, Route>,
}

impl RouteTable {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            routes: BTreeMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn has_default(&self) -> bool {
        self.routes.contains_key(&0)
    }

    /// All routes, highest priority first (admin `list`, §6.1).
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().rev()
    }

    /// Insert or replace a route at `route.priority`. "Adding a route at an
    /// existing priority replaces the previous; the table size is
    /// unchanged" (§8). Priority 0 is reserved for `RouteKind::Default`
    /// (§4.1).
    pub fn insert(&mut self, route: Route) -> Result<(), JasminError> {
        if route.priority == 0 && route.kind != RouteKind::Default {
            return Err(JasminError::Validation {
                field: "route.priority".to_string(),
                message: "priority 0 is reserved for the Default route".to_string(),
            });
        }
        if route.priority != 0 && route.kind == RouteKind::Default {
            return Err(JasminError::Validation {
                field: "route.priority".to_string(),
                message: "a Default route must be inserted at priority 0".to_string(),
            });
        }
        if route.kind == RouteKind::Default && !route.filters.is_empty() {
            return Err(JasminError::Validation {
                field: "route.filters".to_string(),
                message: "the Default route must be filter-less (implicitly transparent)".to_string(),
            });
        }
        self.routes.insert(route.priority, route);
        Ok(())
    }

    /// Remove a route by priority. Returns false (and leaves the table
    /// unchanged) if no route exists at that priority (§8).
    pub fn remove(&mut self, priority: u32) -> bool {
        self.routes.remove(&priority).is_some()
    }

    pub fn flush(&mut self) {
        self.routes.clear();
    }

    /// First route (descending priority) whose filters all accept the
    /// routable; falls back to the priority-0 default. Returns `None` only
    /// if the table was constructed without a default route, which is a
    /// misconfiguration the caller should treat as `JasminError::Routing`
    /// (§4.2 step 3, §8 "For every route table with a default route, match
    /// always returns a route").
    pub fn resolve(&self, routable: &Routable, now: DateTime<Utc>) -> Option<&Route> {
        for (priority, route) in self.routes.iter().rev() {
            if *priority == 0 {
                continue;
            }
            if route.matches(routable, now) {
                return Some(route);
            }
        }
        self.routes.get(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Originator;
    use crate::ids::{GroupId, UserId};
    use std::collections::HashSet;

    fn routable() -> Routable {
        Routable {
            direction: Direction::Mt,
            originator: Originator::User {
                user_id: UserId::new("u1"),
                group_id: GroupId::new("g1"),
            },
            source_addr: "061".to_string(),
            destination_addr: "062".to_string(),
            content: b"hi".to_vec(),
            tags: HashSet::new(),
            admitted_at: Utc::now(),
        }
    }

    #[test]
    fn resolve_always_returns_a_route_when_default_present() {
        let mut table = RouteTable::new(Direction::Mt);
        table.insert(Route::default_route(ConnectorId::new("abc"))).unwrap();
        let r = table.resolve(&routable(), Utc::now()).unwrap();
        assert!(r.is_default());
    }

    #[test]
    fn non_default_route_at_priority_zero_is_rejected() {
        let mut table = RouteTable::new(Direction::Mt);
        let bad = Route {
            priority: 0,
            kind: RouteKind::Static,
            filters: Vec::new(),
            destination: RouteDestination::Single(ConnectorId::new("abc")),
            rate: None,
        };
        assert!(table.insert(bad).is_err());
    }

    #[test]
    fn higher_priority_route_wins_over_default() {
        let mut table = RouteTable::new(Direction::Mt);
        table.insert(Route::default_route(ConnectorId::new("default"))).unwrap();
        table
            .insert(Route {
                priority: 10,
                kind: RouteKind::Static,
                filters: vec![Filter::User(UserId::new("u1"))],
                destination: RouteDestination::Single(ConnectorId::new("special")),
                rate: None,
            })
            .unwrap();

        let r = table.resolve(&routable(), Utc::now()).unwrap();
        match &r.destination {
            RouteDestination::Single(cid) => assert_eq!(cid.as_str(), "special"),
            _ => panic!("expected single destination"),
        }
    }

    #[test]
    fn replacing_existing_priority_keeps_table_size() {
        let mut table = RouteTable::new(Direction::Mt);
        table.insert(Route::default_route(ConnectorId::new("a"))).unwrap();
        table
            .insert(Route {
                priority: 5,
                kind: RouteKind::Static,
                filters: Vec::new(),
                destination: RouteDestination::Single(ConnectorId::new("b")),
                rate: None,
            })
            .unwrap();
        let size_before = table.len();
        table
            .insert(Route {
                priority: 5,
                kind: RouteKind::Static,
                filters: Vec::new(),
                destination: RouteDestination::Single(ConnectorId::new("c")),
                rate: None,
            })
            .unwrap();
        assert_eq!(table.len(), size_before);
    }

    #[test]
    fn removing_nonexistent_priority_returns_false() {
        let mut table = RouteTable::new(Direction::Mt);
        table.insert(Route::default_route(ConnectorId::new("a"))).unwrap();
        assert!(!table.remove(99));
        assert_eq!(table.len(), 1);
    }
}
