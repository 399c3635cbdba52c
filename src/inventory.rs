//! Local node configuration inventory
//!
//! Finds the node this collector runs next to, locates its `rabbitmq.conf`
//! and turns every `key = value` line into a `config/{key}` inventory item.
//! Nothing here is fatal: problems are logged and the inventory is skipped.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::collector::NodeData;
use crate::config::NodeConfig;
use crate::error::InventoryError;

const RABBITMQCTL: &str = "rabbitmqctl";

/// Inventory category for config file entries
pub const CONFIG_CATEGORY: &str = "config";

/// Parsed configuration of the local node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNodeConfig {
    pub node_name: String,
    /// config key -> value, in key order
    pub values: BTreeMap<String, String>,
}

/// Collect the local node's config inventory
///
/// Returns `None` when there is nothing to report.
pub async fn collect_local_config(node_config: &NodeConfig, nodes: &[NodeData]) -> Option<LocalNodeConfig> {
    if nodes.is_empty() {
        warn!("No node data available to collect inventory");
        return None;
    }

    let node_name = match local_node_name(node_config).await {
        Ok(name) => name,
        Err(e) => {
            error!(error = %e, "Error getting local node name");
            return None;
        }
    };

    let node = match find_node(&node_name, nodes) {
        Ok(node) => node,
        Err(e) => {
            error!(error = %e, "Error finding node");
            return None;
        }
    };

    let Some(path) = config_path(node_config, node) else {
        debug!(node = %node_name, "No configuration file to collect");
        return None;
    };

    match read_config(&path) {
        Ok(values) if !values.is_empty() => Some(LocalNodeConfig { node_name, values }),
        Ok(_) => None,
        Err(e) => {
            error!(error = %e, "Error reading node configuration");
            None
        }
    }
}

/// Local node name from the override or `rabbitmqctl eval "node()."`
///
/// # Errors
///
/// Returns [`InventoryError`] if the command cannot run, fails, or prints
/// nothing usable.
pub async fn local_node_name(node_config: &NodeConfig) -> Result<String, InventoryError> {
    if let Some(name) = node_config
        .node_name_override
        .as_deref()
        .filter(|name| !name.is_empty())
    {
        return Ok(name.to_string());
    }

    let command = format!("{RABBITMQCTL} eval node().");
    let output = tokio::process::Command::new(RABBITMQCTL)
        .args(["eval", "node()."])
        .output()
        .await
        .map_err(|source| InventoryError::Command {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(InventoryError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let name = trim_node_name(&String::from_utf8_lossy(&output.stdout));
    if name.is_empty() {
        return Err(InventoryError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: "could not determine the local node name".to_string(),
        });
    }
    Ok(name)
}

/// Strip whitespace and the Erlang atom quotes around a node name
pub fn trim_node_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\'')
        .to_string()
}

/// # Errors
///
/// Returns [`InventoryError::UnknownNode`] when no node has that name.
pub fn find_node<'a>(name: &str, nodes: &'a [NodeData]) -> Result<&'a NodeData, InventoryError> {
    nodes
        .iter()
        .find(|node| node.name == name)
        .ok_or_else(|| InventoryError::UnknownNode(name.to_string()))
}

/// Configured path, else the first `.conf` file the node reports
pub fn config_path(node_config: &NodeConfig, node: &NodeData) -> Option<PathBuf> {
    if let Some(path) = node_config
        .config_path
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty())
    {
        return Some(path.clone());
    }

    node.config_files
        .iter()
        .find(|file| file.ends_with(".conf"))
        .map(PathBuf::from)
}

/// # Errors
///
/// Returns [`InventoryError::ConfigFile`] if the file cannot be opened or read.
pub fn read_config(path: &Path) -> Result<BTreeMap<String, String>, InventoryError> {
    let to_error = |source| InventoryError::ConfigFile {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(to_error)?;
    parse_config_inventory(std::io::BufReader::new(file)).map_err(to_error)
}

/// Parse `key = value` lines, ignoring `#` comments
///
/// A line needs at least two characters and an `=` that is not the first
/// character. Later duplicates overwrite earlier ones. Bytes that are not
/// valid UTF-8 are replaced rather than failing the whole file.
pub fn parse_config_inventory<R: BufRead>(reader: R) -> std::io::Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();

    for raw in reader.split(b'\n') {
        let raw = raw?;
        let raw = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
        let line = String::from_utf8_lossy(raw);
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => &line[..],
        };
        if line.len() < 2 {
            continue;
        }
        if let Some(eq) = line.find('=').filter(|idx| *idx >= 1) {
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();
            values.insert(key.to_string(), value.to_string());
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn node(name: &str, config_files: &[&str]) -> NodeData {
        NodeData {
            name: name.to_string(),
            config_files: config_files.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_config_inventory() {
        let input = "\
# full line comment
listeners.tcp.default = 5672
log.file.level=info # trailing comment
=novalue
x
management.tcp.port   =   15672
";
        let values = parse_config_inventory(input.as_bytes()).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["listeners.tcp.default"], "5672");
        assert_eq!(values["log.file.level"], "info");
        assert_eq!(values["management.tcp.port"], "15672");
    }

    #[test]
    fn test_parse_config_invalid_utf8_line() {
        let input = std::io::Cursor::new(
            b"cluster_name = a\ncomment = caf\xe9\r\nlisteners.tcp = 5672\n".to_vec(),
        );
        let values = parse_config_inventory(input).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["cluster_name"], "a");
        assert_eq!(values["comment"], "caf\u{FFFD}");
        assert_eq!(values["listeners.tcp"], "5672");
    }

    #[test]
    fn test_parse_config_empty_value() {
        let values = parse_config_inventory("a=".as_bytes()).unwrap();
        assert_eq!(values["a"], "");
    }

    #[test]
    fn test_trim_node_name() {
        assert_eq!(trim_node_name("'rabbit@host1'\n"), "rabbit@host1");
        assert_eq!(trim_node_name("  \n"), "");
    }

    #[test]
    fn test_find_node() {
        let nodes = vec![node("rabbit@a", &[]), node("rabbit@b", &[])];
        assert_eq!(find_node("rabbit@b", &nodes).unwrap().name, "rabbit@b");
        assert!(matches!(
            find_node("rabbit@c", &nodes),
            Err(InventoryError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_config_path_detection() {
        let data = node(
            "rabbit@a",
            &["/etc/rabbitmq/advanced.config", "/etc/rabbitmq/rabbitmq.conf"],
        );
        assert_eq!(
            config_path(&NodeConfig::default(), &data),
            Some(PathBuf::from("/etc/rabbitmq/rabbitmq.conf"))
        );

        let configured = NodeConfig {
            config_path: Some(PathBuf::from("/opt/rabbit.conf")),
            ..Default::default()
        };
        assert_eq!(
            config_path(&configured, &data),
            Some(PathBuf::from("/opt/rabbit.conf"))
        );

        assert_eq!(config_path(&NodeConfig::default(), &node("n", &["a.config"])), None);
    }

    #[tokio::test]
    async fn test_local_node_name_override() {
        let config = NodeConfig {
            node_name_override: Some("rabbit@override".to_string()),
            ..Default::default()
        };
        assert_eq!(local_node_name(&config).await.unwrap(), "rabbit@override");
    }

    #[tokio::test]
    async fn test_collect_local_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listeners.tcp.default = 5672").unwrap();

        let config = NodeConfig {
            node_name_override: Some("rabbit@a".to_string()),
            config_path: Some(file.path().to_path_buf()),
        };
        let local = collect_local_config(&config, &[node("rabbit@a", &[])])
            .await
            .unwrap();
        assert_eq!(local.node_name, "rabbit@a");
        assert_eq!(local.values["listeners.tcp.default"], "5672");
    }

    #[tokio::test]
    async fn test_collect_local_config_failures_are_skipped() {
        let config = NodeConfig {
            node_name_override: Some("rabbit@missing".to_string()),
            config_path: None,
        };
        assert!(collect_local_config(&config, &[node("rabbit@a", &[])]).await.is_none());
        assert!(collect_local_config(&config, &[]).await.is_none());

        let config = NodeConfig {
            node_name_override: Some("rabbit@a".to_string()),
            config_path: Some(PathBuf::from("/nonexistent/rabbitmq.conf")),
        };
        assert!(matches!(
            read_config(config.config_path.as_deref().unwrap()),
            Err(InventoryError::ConfigFile { .. })
        ));
        assert!(collect_local_config(&config, &[node("rabbit@a", &[])]).await.is_none());
    }
}
