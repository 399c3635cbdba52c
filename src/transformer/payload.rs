//! Integration payload model
//!
//! The structures in this module serialize directly into the JSON document
//! the monitoring agent ingests (protocol version 3):
//!
//! ```text
//! {
//!   "name": "com.newrelic.rabbitmq",
//!   "protocol_version": "3",
//!   "integration_version": "0.1.0",
//!   "data": [
//!     {
//!       "entity": {"name": "/orders", "type": "queue", "id_attributes": [...]},
//!       "metrics": [{"event_type": "RabbitmqQueueSample", "queue.consumers": 1, ...}],
//!       "inventory": {"queue/durable": {"value": 1}},
//!       "events": [{"summary": "...", "category": "integration"}]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::entity::Attribute;
use crate::error::PayloadError;

/// Integration name reported in every payload
pub const INTEGRATION_NAME: &str = "com.newrelic.rabbitmq";

/// Payload protocol version
pub const PROTOCOL_VERSION: &str = "3";

/// How a metric value is interpreted downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    /// Numeric value that can go up and down
    #[default]
    Gauge,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single metric value
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Int(bool_to_int(v))
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Booleans are reported as 0/1 in metrics and inventory
pub fn bool_to_int(v: bool) -> i64 {
    i64::from(v)
}

/// Named group of metrics sharing an event type and entity attributes
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricSet {
    event_type: String,
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl MetricSet {
    pub fn new(event_type: impl Into<String>, attributes: &[Attribute]) -> Self {
        let values = attributes
            .iter()
            .map(|a| (a.key.clone(), Value::String(a.value.clone())))
            .collect();
        Self {
            event_type: event_type.into(),
            values,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Set a metric, checking the value against its source type
    ///
    /// # Errors
    ///
    /// Gauges must be finite numbers (numeric strings are accepted and
    /// converted). Attributes must be strings.
    pub fn set_metric(
        &mut self,
        name: &str,
        value: MetricValue,
        source_type: SourceType,
    ) -> Result<(), PayloadError> {
        let invalid = || PayloadError::InvalidMetricValue {
            name: name.to_string(),
            source_type,
        };

        let json = match (source_type, value) {
            (SourceType::Gauge, MetricValue::Int(i)) => Value::from(i),
            (SourceType::Gauge, MetricValue::Float(f)) => {
                serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)?
            }
            (SourceType::Gauge, MetricValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)?,
        };

        self.values.insert(name.to_string(), json);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Inventory items keyed by `category/key`, each holding field -> value
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    items: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Inventory {
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidInventoryItem`] for an empty key or field.
    pub fn set_item(
        &mut self,
        key: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), PayloadError> {
        if key.is_empty() || field.is_empty() {
            return Err(PayloadError::InvalidInventoryItem {
                key: key.to_string(),
                field: field.to_string(),
            });
        }
        self.items
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &str, field: &str) -> Option<&Value> {
        self.items.get(key).and_then(|item| item.get(field))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Free-text lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub summary: String,
    pub category: String,
}

impl Event {
    pub fn new(summary: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            category: category.into(),
        }
    }
}

/// Identity attribute distinguishing entities with the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdAttribute {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reporting_endpoint: String,
    pub id_attributes: Vec<IdAttribute>,
}

/// One reported entity with everything attached to it
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    #[serde(rename = "entity")]
    pub metadata: EntityMetadata,
    pub metrics: Vec<MetricSet>,
    pub inventory: Inventory,
    pub events: Vec<Event>,
}

impl Entity {
    pub fn new_metric_set(&mut self, event_type: &str, attributes: &[Attribute]) -> &mut MetricSet {
        self.metrics.push(MetricSet::new(event_type, attributes));
        let last = self.metrics.len() - 1;
        &mut self.metrics[last]
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// The whole payload of one poll cycle
#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub name: String,
    pub protocol_version: String,
    pub integration_version: String,
    pub data: Vec<Entity>,
    #[serde(skip)]
    index: HashMap<(String, String), usize>,
}

impl Default for Integration {
    fn default() -> Self {
        Self::new(INTEGRATION_NAME, env!("CARGO_PKG_VERSION"))
    }
}

impl Integration {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            integration_version: version.into(),
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Get or create the entity `name` in `namespace`
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidEntity`] when the name or namespace is
    /// empty.
    pub fn entity(
        &mut self,
        name: &str,
        namespace: &str,
        reporting_endpoint: &str,
        id_attributes: Vec<IdAttribute>,
    ) -> Result<&mut Entity, PayloadError> {
        if name.is_empty() || namespace.is_empty() {
            return Err(PayloadError::InvalidEntity {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }

        let key = (namespace.to_string(), name.to_string());
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                self.data.push(Entity {
                    metadata: EntityMetadata {
                        name: name.to_string(),
                        namespace: namespace.to_string(),
                        reporting_endpoint: reporting_endpoint.to_string(),
                        id_attributes,
                    },
                    metrics: Vec::new(),
                    inventory: Inventory::default(),
                    events: Vec::new(),
                });
                let idx = self.data.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };

        Ok(&mut self.data[idx])
    }

    /// Look up an entity that was already created
    pub fn find(&self, name: &str, namespace: &str) -> Option<&Entity> {
        self.index
            .get(&(namespace.to_string(), name.to_string()))
            .map(|idx| &self.data[*idx])
    }

    pub fn entities(&self) -> &[Entity] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
