//! Entity assembly - API snapshot to integration payload
//!
//! Every polled object is resolved through the filters first. Excluded
//! objects are skipped silently (debug log); objects whose entity cannot be
//! created are logged and skipped. Neither aborts the cycle.
//!
//! Binding lookups use the bare object name as the API reports it, while the
//! reported entity uses the vhost-joined name.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::collector::{
    ApiSnapshot, ExchangeData, ManagedObject, NodeData, OverviewData, QueueData, VhostData,
};
use crate::config::Settings;
use crate::entity::relations::CONNECTION_STATES;
use crate::entity::{
    BindingRelation, BindingStats, ConnectionStats, EntityFilter, EntityKey, EntityKind,
    IdentityResolver, ResolvedIdentity,
};
use crate::error::PayloadError;
use crate::events::{aliveness_events, healthcheck_events, node_running_events, PendingEvent};
use crate::inventory::{LocalNodeConfig, CONFIG_CATEGORY};

use super::payload::{
    bool_to_int, Entity, IdAttribute, Integration, Inventory, MetricSet, MetricValue, SourceType,
};

/// Inventory a reported object contributes besides its metrics
pub trait ObjectInventory: ManagedObject {
    /// Write the object's own inventory items
    fn collect_inventory(&self, _inventory: &mut Inventory) {}
}

impl ObjectInventory for NodeData {}

impl ObjectInventory for QueueData {
    fn collect_inventory(&self, inventory: &mut Inventory) {
        let category = EntityKind::Queue.as_str();
        set_inventory_item(inventory, category, "exclusive", bool_to_int(self.exclusive));
        set_inventory_item(inventory, category, "durable", bool_to_int(self.durable));
        set_inventory_item(inventory, category, "auto_delete", bool_to_int(self.auto_delete));
        set_inventory_map(inventory, category, "arguments", &self.arguments);
    }
}

impl ObjectInventory for ExchangeData {
    fn collect_inventory(&self, inventory: &mut Inventory) {
        let category = EntityKind::Exchange.as_str();
        set_inventory_item(inventory, category, "type", self.exchange_type.as_str());
        set_inventory_item(inventory, category, "durable", bool_to_int(self.durable));
        set_inventory_item(inventory, category, "auto_delete", bool_to_int(self.auto_delete));
        set_inventory_map(inventory, category, "arguments", &self.arguments);
    }
}

/// Builds the payload of one poll cycle
pub struct EntityAssembler<'a> {
    settings: &'a Settings,
    resolver: IdentityResolver<'a>,
    id_attributes: Vec<IdAttribute>,
    reporting_endpoint: String,
    integration: Integration,
}

impl<'a> EntityAssembler<'a> {
    pub fn new(settings: &'a Settings, cluster_name: &str) -> Self {
        Self {
            settings,
            resolver: IdentityResolver::new(&settings.filter),
            id_attributes: vec![IdAttribute {
                key: "clusterName".to_string(),
                value: cluster_name.to_string(),
            }],
            reporting_endpoint: settings.reporting_endpoint(),
            integration: Integration::default(),
        }
    }

    /// Resolve an object and get or create its entity
    ///
    /// `Ok(None)` means the filters exclude the object.
    fn entity(
        &mut self,
        raw_name: &str,
        kind: EntityKind,
        vhost: &str,
    ) -> Result<Option<(ResolvedIdentity, &mut Entity)>, PayloadError> {
        let Some(identity) = self.resolver.resolve(raw_name, kind, vhost) else {
            debug!(kind = %kind, name = raw_name, vhost, "Skipping entity excluded by filters");
            return Ok(None);
        };

        let entity = self.integration.entity(
            &identity.name,
            kind.as_str(),
            &self.reporting_endpoint,
            self.id_attributes.clone(),
        )?;
        Ok(Some((identity, entity)))
    }

    /// One metric set per included vhost with its connection-state gauges
    pub fn add_vhost_metrics(&mut self, vhosts: &[VhostData], connections: &ConnectionStats) {
        for vhost in vhosts {
            let (identity, entity) = match self.entity(&vhost.name, EntityKind::Vhost, &vhost.name) {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => {
                    error!(vhost = %vhost.name, error = %e, "Could not create vhost entity");
                    continue;
                }
            };

            let set = entity.new_metric_set(EntityKind::Vhost.sample_name(), &identity.attributes);
            for state in CONNECTION_STATES {
                let count = connections.count(&vhost.name, state);
                set_metric(set, &connection_metric_name(state), count.into(), SourceType::Gauge);
            }
        }
    }

    /// Metric set (and for queues/exchanges binding data and inventory) per object
    pub fn add_object_metrics<T: ObjectInventory>(&mut self, objects: &[T], bindings: &BindingStats) {
        let with_inventory = !self.settings.disable_entities;

        for object in objects {
            let (identity, entity) = match self.entity(object.name(), T::KIND, object.vhost()) {
                Ok(Some(found)) => found,
                Ok(None) => continue,
                Err(e) => {
                    error!(kind = %T::KIND, name = object.name(), error = %e, "Could not create entity");
                    continue;
                }
            };

            let set = entity.new_metric_set(T::KIND.sample_name(), &identity.attributes);
            for reading in object.metrics() {
                set_metric(set, reading.name, reading.value, reading.source_type);
            }

            if !T::KIND.is_vhost_scoped() {
                continue;
            }

            let key = EntityKey::new(object.vhost(), object.name(), T::KIND);
            let relation = bindings.get(&key);
            let count = relation.map_or(0, BindingRelation::count);
            set_metric(set, &format!("{}.bindings", T::KIND), count.into(), SourceType::Gauge);

            if with_inventory {
                object.collect_inventory(&mut entity.inventory);
                if let Some(relation) = relation {
                    set_binding_inventory(&mut entity.inventory, T::KIND, relation);
                }
            }
        }
    }

    /// `version/*` inventory on the cluster entity
    pub fn add_cluster_inventory(&mut self, overview: &OverviewData) {
        if overview.cluster_name.is_empty() {
            return;
        }

        match self.entity(&overview.cluster_name, EntityKind::Cluster, "") {
            Ok(Some((_, entity))) => {
                let inventory = &mut entity.inventory;
                set_inventory_item(inventory, "version", "rabbitmq", overview.rabbitmq_version.as_str());
                set_inventory_item(
                    inventory,
                    "version",
                    "management",
                    overview.management_version.as_str(),
                );
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Error creating cluster entity"),
        }
    }

    /// `config/*` inventory on the local node entity
    pub fn add_local_node_inventory(&mut self, local: &LocalNodeConfig) {
        match self.entity(&local.node_name, EntityKind::Node, "") {
            Ok(Some((_, entity))) => {
                for (key, value) in &local.values {
                    set_inventory_item(&mut entity.inventory, CONFIG_CATEGORY, key, value.as_str());
                }
            }
            Ok(None) => {}
            Err(e) => error!(node = %local.node_name, error = %e, "Error creating local node entity"),
        }
    }

    /// Attach events to their entities, dropping those of excluded objects
    pub fn add_events(&mut self, events: Vec<PendingEvent>) {
        for pending in events {
            match self.entity(&pending.name, pending.kind, &pending.vhost) {
                Ok(Some((_, entity))) => entity.add_event(pending.event),
                Ok(None) => {}
                Err(e) => error!(
                    kind = %pending.kind,
                    name = %pending.name,
                    error = %e,
                    "Error creating entity for event"
                ),
            }
        }
    }

    pub fn finish(self) -> Integration {
        self.integration
    }
}

/// Build the full payload for one snapshot
pub fn assemble(
    settings: &Settings,
    snapshot: &ApiSnapshot,
    local_config: Option<&LocalNodeConfig>,
) -> Integration {
    let scope = settings.scope;
    let mut assembler = EntityAssembler::new(settings, &snapshot.overview.cluster_name);

    if scope.has_metrics() {
        let connections = ConnectionStats::aggregate(&snapshot.connections);
        assembler.add_vhost_metrics(&snapshot.vhosts, &connections);

        let bindings = BindingStats::aggregate(&snapshot.bindings);
        assembler.add_object_metrics(&snapshot.nodes, &bindings);
        assembler.add_object_metrics(&snapshot.exchanges, &bindings);
        assembler.add_object_metrics(queues_to_collect(settings, &snapshot.queues), &bindings);

        assembler.add_cluster_inventory(&snapshot.overview);
    }

    if scope.has_inventory() {
        if let Some(local) = local_config {
            assembler.add_local_node_inventory(local);
        }
    }

    if scope.has_events() {
        assembler.add_events(healthcheck_events(&snapshot.healthchecks));
        assembler.add_events(aliveness_events(&snapshot.aliveness));
        assembler.add_events(node_running_events(&snapshot.nodes));
    }

    assembler.finish()
}

/// Number of queues the filters would report
pub fn count_included_queues(filter: &EntityFilter, queues: &[QueueData]) -> usize {
    queues
        .iter()
        .filter(|q| filter.include_entity(&q.name, EntityKind::Queue, &q.vhost))
        .count()
}

/// All queues, or none when the included count exceeds the configured cap
pub fn queues_to_collect<'q>(settings: &Settings, queues: &'q [QueueData]) -> &'q [QueueData] {
    let Some(limit) = settings.queue_limit() else {
        return queues;
    };

    let count = count_included_queues(&settings.filter, queues);
    if count > limit {
        error!(
            count,
            limit,
            "There are {count} queues in collection, the maximum amount of queues to collect is {limit}. \
             Use the queue whitelist or regex configuration parameter to limit collection size."
        );
        return &[];
    }
    queues
}

/// `vhost.connections{State}`
fn connection_metric_name(state: &str) -> String {
    let mut chars = state.chars();
    match chars.next() {
        Some(first) => format!("vhost.connections{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "vhost.connections".to_string(),
    }
}

fn set_metric(set: &mut MetricSet, name: &str, value: MetricValue, source_type: SourceType) {
    if let Err(e) = set.set_metric(name, value, source_type) {
        error!(metric = name, error = %e, "There was an error when trying to set metric value");
    }
}

/// `{category}/{key}` item with a single `value` field
fn set_inventory_item(inventory: &mut Inventory, category: &str, key: &str, value: impl Into<Value>) {
    let item = format!("{category}/{key}");
    if let Err(e) = inventory.set_item(&item, "value", value) {
        warn!(key = %item, error = %e, "Error setting inventory item");
    }
}

/// One field per map entry; arrays are stored JSON-encoded
fn set_inventory_map(
    inventory: &mut Inventory,
    category: &str,
    key: &str,
    values: &BTreeMap<String, Value>,
) {
    let item = format!("{category}/{key}");
    for (field, value) in values {
        let value = match value {
            Value::Array(_) => Value::String(value.to_string()),
            other => other.clone(),
        };
        if let Err(e) = inventory.set_item(&item, field, value) {
            warn!(key = %item, error = %e, "Error setting inventory item");
        }
    }
}

fn set_binding_inventory(inventory: &mut Inventory, kind: EntityKind, relation: &BindingRelation) {
    if !relation.sources.is_empty() {
        set_inventory_item(
            inventory,
            kind.as_str(),
            "bindings.source",
            key_list(&relation.sources),
        );
    }
    if !relation.destinations.is_empty() {
        set_inventory_item(
            inventory,
            kind.as_str(),
            "bindings.destination",
            key_list(&relation.destinations),
        );
    }
}

fn key_list(keys: &[EntityKey]) -> String {
    keys.iter()
        .map(EntityKey::qualified_name)
        .collect::<Vec<_>>()
        .join(", ")
}
