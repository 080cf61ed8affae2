//! Failover and round-robin destination selection (§4.5).

use jasmin_proto::{ConnectorId, RouteDestination};
use rand::seq::SliceRandom;

/// Resolve a route's destination to a single connector cid.
///
/// - `Single`: always that connector.
/// - `Failover`: the first connector `is_up` accepts, in list order
///   ("if the connector is known-down... at route resolution time it
///   falls through to the next"); if every candidate is down, the first
///   connector is still returned — a route resolution-time snapshot is
///   advisory, not a guarantee, and the SCM's own requeue/retrial handles
///   a connector that goes down between resolution and send.
/// - `RandomRoundRobin`: uniformly at random, `is_up` is not consulted
///   (§4.5 only specifies failover for the known-down fallthrough).
///
/// `HttpSubscriber`/`SmppSystemId` are MO-only destinations with no
/// connector to resolve; a route table that yields one of those here
/// would mean an MT route was misconfigured with an MO destination, so
/// this returns `None` rather than panicking.
pub fn pick_destination(destination: &RouteDestination, is_up: impl Fn(&ConnectorId) -> bool) -> Option<ConnectorId> {
    match destination {
        RouteDestination::Single(cid) => Some(cid.clone()),
        RouteDestination::Failover(candidates) => {
            if candidates.is_empty() {
                return None;
            }
            candidates
                .iter()
                .find(|cid| is_up(cid))
                .or_else(|| candidates.first())
                .cloned()
        }
        RouteDestination::RandomRoundRobin(candidates) => {
            candidates.choose(&mut rand::thread_rng()).cloned()
        }
        RouteDestination::HttpSubscriber(_) | RouteDestination::SmppSystemId(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_destination_is_unconditional() {
        let dest = RouteDestination::Single(ConnectorId::new("a"));
        assert_eq!(pick_destination(&dest, |_| false).unwrap(), ConnectorId::new("a"));
    }

    #[test]
    fn failover_skips_down_connectors() {
        let dest = RouteDestination::Failover(vec![
            ConnectorId::new("a"),
            ConnectorId::new("b"),
            ConnectorId::new("c"),
        ]);
        let up = |cid: &ConnectorId| cid.as_str() == "b";
        assert_eq!(pick_destination(&dest, up).unwrap(), ConnectorId::new("b"));
    }

    #[test]
    fn failover_falls_back_to_first_when_all_down() {
        let dest = RouteDestination::Failover(vec![ConnectorId::new("a"), ConnectorId::new("b")]);
        assert_eq!(pick_destination(&dest, |_| false).unwrap(), ConnectorId::new("a"));
    }

    #[test]
    fn random_round_robin_always_returns_a_listed_member() {
        let members = vec![ConnectorId::new("a"), ConnectorId::new("b"), ConnectorId::new("c")];
        let dest = RouteDestination::RandomRoundRobin(members.clone());
        for _ in 0..20 {
            let picked = pick_destination(&dest, |_| true).unwrap();
            assert!(members.contains(&picked));
        }
    }
}
