//! Entity identity resolution
//!
//! Turns `(raw name, kind, vhost)` into either "skip this object" or the
//! name, display name and grouping attributes shared by every metric,
//! inventory item and event reported for it.

use serde::Serialize;

use super::{EntityFilter, EntityKind, DEFAULT_EXCHANGE_NAME};

/// Key/value attribute attached to every metric set of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Identity of an object that passed the filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub kind: EntityKind,
    /// Bare object name after default-exchange substitution
    pub object_name: String,
    /// Reported entity name; vhost-joined for queues and exchanges
    pub name: String,
    pub display_name: String,
    /// `displayName` and `entityName` metric-set attributes
    pub attributes: Vec<Attribute>,
}

/// Substitutes the default exchange name for the broker's unnamed exchange
pub fn clean_entity_name(name: &str, kind: EntityKind) -> &str {
    if kind == EntityKind::Exchange && name.is_empty() {
        DEFAULT_EXCHANGE_NAME
    } else {
        name
    }
}

/// Joins a vhost and an object name without doubling a trailing `/`
pub fn join_vhost_name(vhost: &str, name: &str) -> String {
    if vhost.ends_with('/') {
        format!("{vhost}{name}")
    } else {
        format!("{vhost}/{name}")
    }
}

/// Resolves identities against an immutable [`EntityFilter`]
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    filter: &'a EntityFilter,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(filter: &'a EntityFilter) -> Self {
        Self { filter }
    }

    /// Resolve one object
    ///
    /// Returns `None` when the filters exclude the object; the caller must not
    /// report anything for it. A vhost object passes its own name as `vhost`.
    pub fn resolve(&self, raw_name: &str, kind: EntityKind, vhost: &str) -> Option<ResolvedIdentity> {
        let object_name = clean_entity_name(raw_name, kind);

        if !self.filter.include_entity(object_name, kind, vhost) {
            return None;
        }

        let name = if kind.is_vhost_scoped() {
            join_vhost_name(vhost, object_name)
        } else {
            object_name.to_string()
        };

        let attributes = vec![
            Attribute::new("displayName", name.clone()),
            Attribute::new("entityName", format!("{kind}:{name}")),
        ];

        Some(ResolvedIdentity {
            kind,
            object_name: object_name.to_string(),
            display_name: name.clone(),
            name,
            attributes,
        })
    }
}
