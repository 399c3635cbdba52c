//! Relationship aggregation over flat management API lists
//!
//! Both aggregations run once per poll cycle over already fetched data and
//! are read-only afterwards.

use std::collections::HashMap;

use super::{EntityKey, EntityKind};
use crate::collector::{BindingData, ConnectionData};

/// Synthetic connection state counting every connection of a vhost
pub const TOTAL_STATE: &str = "total";

/// Connection states reported per vhost, in reporting order
pub const CONNECTION_STATES: [&str; 10] = [
    TOTAL_STATE,
    "starting",
    "tuning",
    "opening",
    "running",
    "flow",
    "blocking",
    "blocked",
    "closing",
    "closed",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionStatKey {
    pub vhost: String,
    pub state: String,
}

impl ConnectionStatKey {
    pub fn new(vhost: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            vhost: vhost.into(),
            state: state.into(),
        }
    }
}

/// vhost x state -> connection count
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    counts: HashMap<ConnectionStatKey, u64>,
}

impl ConnectionStats {
    /// Tally connections by `(vhost, state)` plus `(vhost, "total")`
    pub fn aggregate(connections: &[ConnectionData]) -> Self {
        let mut counts: HashMap<ConnectionStatKey, u64> = HashMap::new();

        for connection in connections {
            *counts
                .entry(ConnectionStatKey::new(&connection.vhost, &connection.state))
                .or_default() += 1;
            *counts
                .entry(ConnectionStatKey::new(&connection.vhost, TOTAL_STATE))
                .or_default() += 1;
        }

        Self { counts }
    }

    /// Count for `(vhost, state)`; zero when never seen
    pub fn count(&self, vhost: &str, state: &str) -> u64 {
        self.counts
            .get(&ConnectionStatKey::new(vhost, state))
            .copied()
            .unwrap_or(0)
    }
}

/// Bindings touching one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingRelation {
    /// Exchanges that bind into this entity
    pub sources: Vec<EntityKey>,
    /// Entities this exchange binds to
    pub destinations: Vec<EntityKey>,
}

impl BindingRelation {
    /// Number of bindings in either direction
    pub fn count(&self) -> usize {
        self.sources.len() + self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.destinations.is_empty()
    }
}

/// Entity key -> binding relation
///
/// Keys use bare object names. An entity without bindings has no entry;
/// [`BindingStats::relation`] hides that difference from callers.
#[derive(Debug, Clone, Default)]
pub struct BindingStats {
    relations: HashMap<EntityKey, BindingRelation>,
}

impl BindingStats {
    /// Build source and destination lists from the binding list
    ///
    /// The source of a binding is always an exchange; the destination kind
    /// comes from the binding record. Bindings whose destination kind was not
    /// recognised are skipped.
    pub fn aggregate(bindings: &[BindingData]) -> Self {
        let mut relations: HashMap<EntityKey, BindingRelation> = HashMap::new();

        for binding in bindings {
            let Some(destination_type) = binding.destination_type else {
                continue;
            };
            let src_key = EntityKey::new(&binding.vhost, &binding.source, EntityKind::Exchange);
            let dst_key = EntityKey::new(&binding.vhost, &binding.destination, destination_type);

            relations
                .entry(src_key.clone())
                .or_default()
                .destinations
                .push(dst_key.clone());
            relations.entry(dst_key).or_default().sources.push(src_key);
        }

        Self { relations }
    }

    /// Recorded relation for `key`, if any binding mentioned it
    pub fn get(&self, key: &EntityKey) -> Option<&BindingRelation> {
        self.relations.get(key)
    }

    /// Relation for `key`, empty when no binding mentioned it
    pub fn relation(&self, key: &EntityKey) -> BindingRelation {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Total bindings touching `key`
    pub fn count(&self, key: &EntityKey) -> usize {
        self.get(key).map_or(0, BindingRelation::count)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(vhost: &str, state: &str) -> ConnectionData {
        ConnectionData {
            vhost: vhost.to_string(),
            state: state.to_string(),
        }
    }

    fn binding(vhost: &str, source: &str, destination: &str, kind: EntityKind) -> BindingData {
        BindingData {
            vhost: vhost.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            destination_type: Some(kind),
        }
    }

    #[test]
    fn test_connection_tally() {
        let stats = ConnectionStats::aggregate(&[
            conn("/", "running"),
            conn("/", "running"),
            conn("/", "blocked"),
            conn("vh", "closing"),
        ]);

        assert_eq!(stats.count("/", "running"), 2);
        assert_eq!(stats.count("/", "blocked"), 1);
        assert_eq!(stats.count("/", TOTAL_STATE), 3);
        assert_eq!(stats.count("vh", "closing"), 1);
        assert_eq!(stats.count("vh", TOTAL_STATE), 1);
    }

    #[test]
    fn test_connection_missing_is_zero() {
        let stats = ConnectionStats::aggregate(&[]);
        assert_eq!(stats.count("/", "running"), 0);
        assert_eq!(stats.count("/", TOTAL_STATE), 0);
    }

    #[test]
    fn test_connection_total_invariant() {
        let connections = vec![
            conn("/", "running"),
            conn("/", "flow"),
            conn("/", "running"),
            conn("a", "starting"),
            conn("a", "tuning"),
            conn("b", "closed"),
        ];
        let stats = ConnectionStats::aggregate(&connections);

        for vhost in ["/", "a", "b"] {
            let sum: u64 = CONNECTION_STATES
                .iter()
                .filter(|state| **state != TOTAL_STATE)
                .map(|state| stats.count(vhost, state))
                .sum();
            assert_eq!(sum, stats.count(vhost, TOTAL_STATE), "vhost {vhost}");
        }
    }

    #[test]
    fn test_binding_fan_out_and_fan_in() {
        let stats = BindingStats::aggregate(&[
            binding("/", "ex1", "q1", EntityKind::Queue),
            binding("/", "ex1", "q2", EntityKind::Queue),
        ]);

        let ex1 = stats
            .get(&EntityKey::new("/", "ex1", EntityKind::Exchange))
            .unwrap();
        assert_eq!(
            ex1.destinations,
            vec![
                EntityKey::new("/", "q1", EntityKind::Queue),
                EntityKey::new("/", "q2", EntityKind::Queue),
            ]
        );
        assert!(ex1.sources.is_empty());

        let q1 = stats.get(&EntityKey::new("/", "q1", EntityKind::Queue)).unwrap();
        assert_eq!(q1.sources, vec![EntityKey::new("/", "ex1", EntityKind::Exchange)]);
        assert!(q1.destinations.is_empty());
    }

    #[test]
    fn test_binding_symmetry() {
        let bindings = vec![
            binding("/", "", "q1", EntityKind::Queue),
            binding("/", "ex1", "ex2", EntityKind::Exchange),
            binding("vh", "ex1", "q1", EntityKind::Queue),
            binding("vh", "ex1", "q1", EntityKind::Queue),
        ];
        let stats = BindingStats::aggregate(&bindings);

        for b in &bindings {
            let src = EntityKey::new(&b.vhost, &b.source, EntityKind::Exchange);
            let dst = EntityKey::new(&b.vhost, &b.destination, b.destination_type.unwrap());
            assert!(stats.relation(&src).destinations.contains(&dst));
            assert!(stats.relation(&dst).sources.contains(&src));
        }
        assert_eq!(stats.count(&EntityKey::new("vh", "q1", EntityKind::Queue)), 2);
    }

    #[test]
    fn test_binding_absent_key() {
        let stats = BindingStats::aggregate(&[binding("/", "ex1", "q1", EntityKind::Queue)]);
        let missing = EntityKey::new("/", "q9", EntityKind::Queue);

        assert!(stats.get(&missing).is_none());
        assert!(stats.relation(&missing).is_empty());
        assert_eq!(stats.count(&missing), 0);
    }

    #[test]
    fn test_binding_keys_are_vhost_and_kind_scoped() {
        let stats = BindingStats::aggregate(&[binding("/", "x", "x", EntityKind::Queue)]);
        assert_eq!(stats.count(&EntityKey::new("/", "x", EntityKind::Queue)), 1);
        assert_eq!(stats.count(&EntityKey::new("/", "x", EntityKind::Exchange)), 1);
        assert_eq!(stats.count(&EntityKey::new("vh", "x", EntityKind::Queue)), 0);
    }

    #[test]
    fn test_binding_with_unknown_destination_is_skipped() {
        let mut unknown = binding("/", "ex1", "s1", EntityKind::Queue);
        unknown.destination_type = None;
        let stats = BindingStats::aggregate(&[unknown, binding("/", "ex1", "q1", EntityKind::Queue)]);

        let ex1 = EntityKey::new("/", "ex1", EntityKind::Exchange);
        assert_eq!(stats.count(&ex1), 1);
        assert_eq!(
            stats.relation(&ex1).destinations,
            vec![EntityKey::new("/", "q1", EntityKind::Queue)]
        );
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_self_binding() {
        let stats = BindingStats::aggregate(&[binding("/", "ex1", "ex1", EntityKind::Exchange)]);
        let key = EntityKey::new("/", "ex1", EntityKind::Exchange);
        let relation = stats.get(&key).unwrap();

        assert_eq!(relation.sources, vec![key.clone()]);
        assert_eq!(relation.destinations, vec![key]);
        assert_eq!(stats.len(), 1);
    }
}
