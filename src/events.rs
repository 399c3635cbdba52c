//! Lifecycle events
//!
//! Failed node healthchecks, failed vhost aliveness tests and nodes that are
//! not (known to be) running become free-text events. Each event is addressed to an object by
//! `(kind, name, vhost)`; the assembler resolves that address through the
//! filters, so events for excluded vhosts are dropped.

use std::fmt;

use crate::collector::{NodeData, NodeTest, VhostTest};
use crate::entity::EntityKind;
use crate::transformer::payload::Event;

/// Category of every event this collector reports
pub const EVENT_CATEGORY: &str = "integration";

/// An event not yet attached to an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub kind: EntityKind,
    pub name: String,
    pub vhost: String,
    pub event: Event,
}

/// Why a node is reported as not running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStatus {
    NotRunning,
    Unknown,
}

impl fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningStatus::NotRunning => write!(f, "not running"),
            RunningStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One event per node whose healthcheck did not return `ok`
pub fn healthcheck_events(tests: &[NodeTest]) -> Vec<PendingEvent> {
    tests
        .iter()
        .filter(|t| !t.test.is_ok())
        .map(|t| PendingEvent {
            kind: EntityKind::Node,
            name: t.node.name.clone(),
            vhost: String::new(),
            event: Event::new(
                format!(
                    "Response [{}] for node [{}]: {}",
                    t.test.status, t.node.name, t.test.reason
                ),
                EVENT_CATEGORY,
            ),
        })
        .collect()
}

/// One event per vhost whose aliveness test did not return `ok`
pub fn aliveness_events(tests: &[VhostTest]) -> Vec<PendingEvent> {
    tests
        .iter()
        .filter(|t| !t.test.is_ok())
        .map(|t| PendingEvent {
            kind: EntityKind::Vhost,
            name: t.vhost.name.clone(),
            vhost: t.vhost.name.clone(),
            event: Event::new(
                format!(
                    "Response [{}] for vhost [{}]: {}",
                    t.test.status, t.vhost.name, t.test.reason
                ),
                EVENT_CATEGORY,
            ),
        })
        .collect()
}

/// One event per node that is not running or did not report its state
pub fn node_running_events(nodes: &[NodeData]) -> Vec<PendingEvent> {
    nodes
        .iter()
        .filter_map(|node| {
            let status = match node.running {
                Some(true) => return None,
                Some(false) => RunningStatus::NotRunning,
                None => RunningStatus::Unknown,
            };
            Some(PendingEvent {
                kind: EntityKind::Node,
                name: node.name.clone(),
                vhost: String::new(),
                event: Event::new(
                    format!(
                        "Response is [{status}] for node [{}] running status",
                        node.name
                    ),
                    EVENT_CATEGORY,
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{TestData, VhostData};

    fn vhost_test(name: &str, status: &str, reason: &str) -> VhostTest {
        VhostTest {
            vhost: VhostData {
                name: name.to_string(),
            },
            test: TestData {
                status: status.to_string(),
                reason: reason.to_string(),
            },
        }
    }

    #[test]
    fn test_aliveness_events() {
        let events = aliveness_events(&[
            vhost_test("/", "ok", ""),
            vhost_test("vh1", "failed", "queue down"),
            vhost_test("vh2", "error", "HTTP error status 500"),
        ]);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EntityKind::Vhost);
        assert_eq!(events[0].vhost, "vh1");
        assert_eq!(
            events[0].event.summary,
            "Response [failed] for vhost [vh1]: queue down"
        );
        assert_eq!(events[0].event.category, "integration");
        assert_eq!(
            events[1].event.summary,
            "Response [error] for vhost [vh2]: HTTP error status 500"
        );
    }

    #[test]
    fn test_healthcheck_events() {
        let node = NodeData {
            name: "rabbit@host1".into(),
            ..Default::default()
        };
        let events = healthcheck_events(&[
            NodeTest {
                node: node.clone(),
                test: TestData {
                    status: "ok".into(),
                    reason: String::new(),
                },
            },
            NodeTest {
                node,
                test: TestData::error("HTTP error status 404"),
            },
        ]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EntityKind::Node);
        assert_eq!(
            events[0].event.summary,
            "Response [error] for node [rabbit@host1]: HTTP error status 404"
        );
    }

    #[test]
    fn test_node_running_events() {
        let nodes = vec![
            NodeData {
                name: "rabbit@up".into(),
                running: Some(true),
                ..Default::default()
            },
            NodeData {
                name: "rabbit@down".into(),
                running: Some(false),
                ..Default::default()
            },
            NodeData {
                name: "rabbit@unknown".into(),
                running: None,
                ..Default::default()
            },
        ];

        let events = node_running_events(&nodes);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].event.summary,
            "Response is [not running] for node [rabbit@down] running status"
        );
        assert_eq!(
            events[1].event.summary,
            "Response is [unknown] for node [rabbit@unknown] running status"
        );
        assert!(events.iter().all(|e| e.kind == EntityKind::Node));
    }
}
