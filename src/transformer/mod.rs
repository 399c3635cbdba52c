//! Payload assembly and output
//!
//! Turns one [`ApiSnapshot`](crate::collector::ApiSnapshot) into the
//! integration payload: entities with metric sets, inventory and events.

pub mod engine;
pub mod formatter;
pub mod payload;

pub use engine::{assemble, count_included_queues, queues_to_collect, EntityAssembler, ObjectInventory};
pub use formatter::PayloadFormatter;
pub use payload::{
    Entity, EntityMetadata, Event, IdAttribute, Integration, Inventory, MetricSet, MetricValue,
    SourceType, INTEGRATION_NAME, PROTOCOL_VERSION,
};
