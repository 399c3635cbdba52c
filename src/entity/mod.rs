//! Broker entity model
//!
//! Every object the collector reports (node, vhost, queue, exchange or the
//! cluster itself) is identified by an [`EntityKey`]. This module holds the
//! closed set of kinds plus the three pieces of core logic built on top of
//! them:
//!
//! - [`filter`] - name/regex allow-lists per kind
//! - [`identity`] - inclusion decision and reported name for one object
//! - [`relations`] - connection-state tallies and binding relations

pub mod filter;
pub mod identity;
pub mod relations;

pub use filter::{include_name, EntityFilter, FilterSpec};
pub use identity::{join_vhost_name, Attribute, IdentityResolver, ResolvedIdentity};
pub use relations::{BindingRelation, BindingStats, ConnectionStatKey, ConnectionStats};

use serde::{Deserialize, Serialize};

/// Name reported for the exchange the broker publishes with an empty name
pub const DEFAULT_EXCHANGE_NAME: &str = "amq.default";

/// Kind of broker object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A broker node
    Node,
    /// A virtual host
    Vhost,
    /// A queue, scoped to a vhost
    Queue,
    /// An exchange, scoped to a vhost
    Exchange,
    /// The whole cluster
    Cluster,
}

impl EntityKind {
    /// Returns the lowercase kind name used as entity namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Vhost => "vhost",
            EntityKind::Queue => "queue",
            EntityKind::Exchange => "exchange",
            EntityKind::Cluster => "cluster",
        }
    }

    /// Queues and exchanges live inside a vhost and report a vhost-joined name
    pub fn is_vhost_scoped(&self) -> bool {
        matches!(self, EntityKind::Queue | EntityKind::Exchange)
    }

    /// Nodes and the cluster are never filtered
    pub fn bypasses_filters(&self) -> bool {
        matches!(self, EntityKind::Node | EntityKind::Cluster)
    }

    /// Event type of the metric set reported for this kind
    pub fn sample_name(&self) -> &'static str {
        match self {
            EntityKind::Node => "RabbitmqNodeSample",
            EntityKind::Vhost => "RabbitmqVhostSample",
            EntityKind::Queue => "RabbitmqQueueSample",
            EntityKind::Exchange => "RabbitmqExchangeSample",
            EntityKind::Cluster => "RabbitmqClusterSample",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural identity of a broker object
///
/// `name` is the bare object name as the management API reports it, never the
/// vhost-joined name. Binding lookups depend on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub vhost: String,
    pub name: String,
    pub kind: EntityKind,
}

impl EntityKey {
    pub fn new(vhost: impl Into<String>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            vhost: vhost.into(),
            name: name.into(),
            kind,
        }
    }

    /// `"{kind}:{joined name}"`, with the default exchange name substituted
    pub fn qualified_name(&self) -> String {
        let name = identity::clean_entity_name(&self.name, self.kind);
        format!("{}:{}", self.kind, join_vhost_name(&self.vhost, name))
    }
}
