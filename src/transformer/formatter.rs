//! Payload output
//!
//! The payload is one JSON document per cycle, written to stdout and
//! terminated by a newline.
//!
//! ```text
//! {"name":"com.newrelic.rabbitmq","protocol_version":"3","integration_version":"...","data":[...]}
//! ```

use std::io::Write;

use super::payload::Integration;
use crate::error::PayloadError;

/// JSON payload formatter
///
/// # Example
///
/// ```ignore
/// use rabbitmq_collector::transformer::{Integration, PayloadFormatter};
///
/// let formatter = PayloadFormatter::new().with_pretty(true);
/// formatter.write_to(&Integration::default(), std::io::stdout().lock())?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct PayloadFormatter {
    pretty: bool,
}

impl PayloadFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Serialize the payload without the trailing newline
    pub fn format(&self, integration: &Integration) -> Result<String, PayloadError> {
        let out = if self.pretty {
            serde_json::to_string_pretty(integration)?
        } else {
            serde_json::to_string(integration)?
        };
        Ok(out)
    }

    /// Write the payload followed by a newline and flush
    pub fn write_to<W: Write>(&self, integration: &Integration, mut writer: W) -> Result<(), PayloadError> {
        let out = self.format(integration)?;
        writer.write_all(out.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::payload::{Event, IdAttribute};

    fn sample() -> Integration {
        let mut integration = Integration::new("com.newrelic.rabbitmq", "1.0.0");
        let entity = integration
            .entity(
                "rabbit@host1",
                "node",
                "localhost:15672",
                vec![IdAttribute {
                    key: "clusterName".into(),
                    value: "c1".into(),
                }],
            )
            .unwrap();
        entity.add_event(Event::new("down", "integration"));
        integration
    }

    #[test]
    fn test_compact_output() {
        let mut buf = Vec::new();
        PayloadFormatter::new().write_to(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "com.newrelic.rabbitmq");
        assert_eq!(value["protocol_version"], "3");
        assert_eq!(value["integration_version"], "1.0.0");
        assert_eq!(value["data"][0]["entity"]["name"], "rabbit@host1");
        assert_eq!(value["data"][0]["entity"]["type"], "node");
        assert_eq!(value["data"][0]["entity"]["id_attributes"][0]["Key"], "clusterName");
        assert_eq!(value["data"][0]["events"][0]["summary"], "down");
    }

    #[test]
    fn test_pretty_output() {
        let text = PayloadFormatter::new()
            .with_pretty(true)
            .format(&sample())
            .unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.contains("\n  \"name\": \"com.newrelic.rabbitmq\""));
    }
}
