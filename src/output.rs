//! # List Output Formats
//!
//! Registered output renderers for resource list operations.

use serde_json::Value;

use crate::errors::{KubegateError, Result};

/// Registered output format names.
pub const NAMES: &[&str] = &["table", "yaml", "json"];

/// Output format for resource list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutput {
    Table,
    Yaml,
    Json,
}

/// Look up a registered output format by name.
pub fn from_name(name: &str) -> Option<ListOutput> {
    match name {
        "table" => Some(ListOutput::Table),
        "yaml" => Some(ListOutput::Yaml),
        "json" => Some(ListOutput::Json),
        _ => None,
    }
}

impl ListOutput {
    pub fn name(&self) -> &'static str {
        match self {
            ListOutput::Table => "table",
            ListOutput::Yaml => "yaml",
            ListOutput::Json => "json",
        }
    }

    /// Render a list of Kubernetes objects.
    pub fn render(&self, items: &[Value]) -> Result<String> {
        match self {
            ListOutput::Table => Ok(render_table(items)),
            ListOutput::Yaml => serde_yaml::to_string(items)
                .map_err(|e| KubegateError::internal(format!("YAML rendering failed: {}", e))),
            ListOutput::Json => serde_json::to_string_pretty(items).map_err(KubegateError::from),
        }
    }
}

/// Fixed-width table of apiVersion, kind, namespace, and name.
fn render_table(items: &[Value]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<24} {:<24} NAME\n",
        "APIVERSION", "KIND", "NAMESPACE"
    ));
    for item in items {
        let api_version = item.get("apiVersion").and_then(Value::as_str).unwrap_or("");
        let kind = item.get("kind").and_then(Value::as_str).unwrap_or("");
        let metadata = item.get("metadata");
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let name = metadata.and_then(|m| m.get("name")).and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!(
            "{:<24} {:<24} {:<24} {}\n",
            api_version, kind, namespace, name
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_name() {
        assert_eq!(from_name("table"), Some(ListOutput::Table));
        assert_eq!(from_name("yaml"), Some(ListOutput::Yaml));
        assert_eq!(from_name("json"), Some(ListOutput::Json));
        assert_eq!(from_name("xml"), None);
    }

    #[test]
    fn test_names_round_trip() {
        for name in NAMES {
            assert_eq!(from_name(name).unwrap().name(), *name);
        }
    }

    #[test]
    fn test_table_rendering() {
        let items = vec![json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "default"}
        })];

        let rendered = ListOutput::Table.render(&items).unwrap();
        assert!(rendered.contains("APIVERSION"));
        assert!(rendered.contains("web-0"));
        assert!(rendered.contains("default"));
    }

    #[test]
    fn test_json_rendering() {
        let items = vec![json!({"apiVersion": "v1", "kind": "Namespace"})];
        let rendered = ListOutput::Json.render(&items).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
