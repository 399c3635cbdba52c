//! Name and regex allow-lists
//!
//! Each filterable kind (queue, exchange, vhost) has its own [`FilterSpec`].
//! An empty spec allows everything; a configured spec allows only names that
//! match a literal or one of the patterns.
//!
//! Patterns are compiled once while the configuration is loaded, so matching
//! itself never fails.

use std::collections::HashSet;

use regex::Regex;

use super::EntityKind;
use crate::error::FilterError;

/// Returns true if `name` should be collected
///
/// Literal membership wins first, then any regex match. When neither list is
/// configured everything is allowed.
pub fn include_name(name: &str, literals: &HashSet<String>, regexes: &[Regex]) -> bool {
    if literals.contains(name) {
        return true;
    }
    if regexes.iter().any(|re| re.is_match(name)) {
        return true;
    }
    literals.is_empty() && regexes.is_empty()
}

/// Allow-list for a single entity kind
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    names: HashSet<String>,
    regexes: Vec<Regex>,
}

impl FilterSpec {
    /// Create a spec from literal names and already compiled patterns
    pub fn new(names: impl IntoIterator<Item = String>, regexes: Vec<Regex>) -> Self {
        Self {
            names: names.into_iter().collect(),
            regexes,
        }
    }

    /// Build a spec from two JSON-array-encoded strings
    ///
    /// `field` names the setting (e.g. `"queues"`) and is only used for error
    /// messages. Blank inputs and a JSON `null` are treated as "not configured".
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if either input is not a JSON array of strings
    /// or if a pattern fails to compile.
    pub fn from_json(
        field: &str,
        names: Option<&str>,
        regexes: Option<&str>,
    ) -> Result<Self, FilterError> {
        let names = parse_string_array(field, names)?;
        let regex_field = format!("{field}_regexes");
        let patterns = parse_string_array(&regex_field, regexes)?;

        let regexes = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| FilterError::InvalidPattern {
                    field: regex_field.clone(),
                    pattern,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(names, regexes))
    }

    /// Check `name` against this spec
    pub fn includes(&self, name: &str) -> bool {
        include_name(name, &self.names, &self.regexes)
    }

    /// True if nothing was configured, i.e. everything is allowed
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.regexes.is_empty()
    }
}

fn parse_string_array(field: &str, value: Option<&str>) -> Result<Vec<String>, FilterError> {
    match value.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str::<Option<Vec<String>>>(raw)
            .map(Option::unwrap_or_default)
            .map_err(|source| FilterError::InvalidJson {
                field: field.to_string(),
                source,
            }),
    }
}

/// Allow-lists for every filterable kind
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub queues: FilterSpec,
    pub exchanges: FilterSpec,
    pub vhosts: FilterSpec,
}

impl EntityFilter {
    pub fn new(queues: FilterSpec, exchanges: FilterSpec, vhosts: FilterSpec) -> Self {
        Self {
            queues,
            exchanges,
            vhosts,
        }
    }

    /// Decide whether an object of `kind` named `name` in `vhost` is collected
    ///
    /// Nodes and the cluster always pass. Everything else must first live in
    /// an included vhost; a vhost object is checked with its own name as
    /// `vhost`.
    pub fn include_entity(&self, name: &str, kind: EntityKind, vhost: &str) -> bool {
        if kind.bypasses_filters() {
            return true;
        }
        if !self.include_vhost(vhost) {
            return false;
        }
        match kind {
            EntityKind::Queue => self.queues.includes(name),
            EntityKind::Exchange => self.exchanges.includes(name),
            EntityKind::Vhost | EntityKind::Node | EntityKind::Cluster => true,
        }
    }

    pub fn include_vhost(&self, vhost: &str) -> bool {
        self.vhosts.includes(vhost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(names: &[&str], patterns: &[&str]) -> FilterSpec {
        FilterSpec::new(
            names.iter().map(|s| s.to_string()),
            patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
        )
    }

    #[test]
    fn test_default_allow() {
        let empty = FilterSpec::default();
        for name in ["", "orders", "amq.default", "/", "anything at all"] {
            assert!(empty.includes(name), "{name} should be allowed");
        }
    }

    #[test]
    fn test_literal_precedence() {
        let s = spec(&["orders"], &["^never$", "^nope"]);
        assert!(s.includes("orders"));
    }

    #[test]
    fn test_regex_match() {
        let s = spec(&[], &["^log-", "tmp$"]);
        assert!(s.includes("log-1"));
        assert!(s.includes("scratch-tmp"));
        assert!(!s.includes("orders"));
    }

    #[test]
    fn test_exclusion_when_configured() {
        assert!(!spec(&["orders"], &[]).includes("logs"));
        assert!(!spec(&[], &["^orders$"]).includes("logs"));
        assert!(!spec(&["a"], &["^b$"]).includes("c"));
    }

    #[test]
    fn test_literal_is_exact() {
        let s = spec(&["orders"], &[]);
        assert!(!s.includes("orders2"));
        assert!(!s.includes("Orders"));
    }

    #[test]
    fn test_from_json() {
        let s = FilterSpec::from_json("queues", Some(r#"["a","b"]"#), Some(r#"["^c"]"#)).unwrap();
        assert!(s.includes("a"));
        assert!(s.includes("b"));
        assert!(s.includes("cat"));
        assert!(!s.includes("dog"));
    }

    #[test]
    fn test_from_json_blank_is_unconfigured() {
        let s = FilterSpec::from_json("queues", Some("  "), None).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn test_from_json_null_is_unconfigured() {
        let s = FilterSpec::from_json("queues", Some("null"), Some(" null ")).unwrap();
        assert!(s.is_empty());
        assert!(s.includes("orders"));
    }

    #[test]
    fn test_from_json_invalid_array() {
        let err = FilterSpec::from_json("queues", Some("orders"), None).unwrap_err();
        assert!(matches!(err, FilterError::InvalidJson { ref field, .. } if field == "queues"));
    }

    #[test]
    fn test_from_json_invalid_regex() {
        let err = FilterSpec::from_json("vhosts", None, Some(r#"["("]"#)).unwrap_err();
        match err {
            FilterError::InvalidPattern { field, pattern, .. } => {
                assert_eq!(field, "vhosts_regexes");
                assert_eq!(pattern, "(");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_node_exemption() {
        let filter = EntityFilter::new(
            FilterSpec::default(),
            FilterSpec::default(),
            spec(&[], &["^$never"]),
        );
        assert!(filter.include_entity("rabbit@host", EntityKind::Node, ""));
        assert!(filter.include_entity("rabbit@host", EntityKind::Node, "/"));
        assert!(filter.include_entity("my-cluster", EntityKind::Cluster, ""));
        assert!(!filter.include_entity("q", EntityKind::Queue, "/"));
    }

    #[test]
    fn test_vhost_scoping() {
        let filter = EntityFilter::new(FilterSpec::default(), FilterSpec::default(), spec(&["/"], &[]));
        assert!(filter.include_entity("q", EntityKind::Queue, "/"));
        assert!(!filter.include_entity("q", EntityKind::Queue, "other"));
        assert!(filter.include_entity("/", EntityKind::Vhost, "/"));
        assert!(!filter.include_entity("other", EntityKind::Vhost, "other"));
    }

    #[test]
    fn test_kind_specific_specs() {
        let filter = EntityFilter::new(spec(&["orders"], &[]), spec(&["ex1"], &[]), FilterSpec::default());
        assert!(filter.include_entity("orders", EntityKind::Queue, "/"));
        assert!(!filter.include_entity("ex1", EntityKind::Queue, "/"));
        assert!(filter.include_entity("ex1", EntityKind::Exchange, "/"));
        assert!(!filter.include_entity("orders", EntityKind::Exchange, "/"));
    }
}
