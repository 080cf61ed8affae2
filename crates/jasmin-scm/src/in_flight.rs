//! The in-flight table: one per connector task, never shared across
//! tasks (§5 "the in-flight table must remain owned by a single task per
//! connector"). Tracks a submitted segment from the moment it's handed to
//! the link until a `submit_sm_resp` (or a retrial giving up) resolves it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jasmin_proto::MessageId;

#[derive(Debug, Clone)]
pub struct InFlightEntry {
    pub message_id: MessageId,
    pub submitted_at: DateTime<Utc>,
    pub attempt: u32,
}

/// Keyed by the SMPP sequence_number assigned at submit time, since that's
/// the only correlation a `submit_sm_resp` carries back on the wire.
#[derive(Debug, Default)]
pub struct InFlightTable {
    entries: HashMap<u32, InFlightEntry>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence_number: u32, message_id: MessageId, attempt: u32) {
        self.entries.insert(
            sequence_number,
            InFlightEntry {
                message_id,
                submitted_at: Utc::now(),
                attempt,
            },
        );
    }

    /// Resolve (and remove) the entry a `submit_sm_resp` answers.
    pub fn resolve(&mut self, sequence_number: u32) -> Option<InFlightEntry> {
        self.entries.remove(&sequence_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries outstanding longer than `max_age` — candidates for the
    /// error-retrial path when the SMSC never responds at all.
    pub fn stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|(_, e)| now - e.submitted_at >= max_age)
            .map(|(seq, _)| *seq)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_removes_and_returns_the_entry() {
        let mut table = InFlightTable::new();
        table.insert(1, MessageId::new(), 0);
        assert_eq!(table.len(), 1);
        let entry = table.resolve(1).unwrap();
        assert_eq!(entry.attempt, 0);
        assert!(table.is_empty());
    }

    #[test]
    fn resolve_of_unknown_sequence_is_none() {
        let mut table = InFlightTable::new();
        assert!(table.resolve(99).is_none());
    }

    #[test]
    fn stale_entries_are_found_past_max_age() {
        let mut table = InFlightTable::new();
        table.insert(1, MessageId::new(), 0);
        let future = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(table.stale(future, chrono::Duration::seconds(60)), vec![1]);
        assert!(table.stale(Utc::now(), chrono::Duration::seconds(60)).is_empty());
    }
}
