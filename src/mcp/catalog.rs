//! Tool and prompt catalog.
//!
//! The advertised catalog is an immutable snapshot published through an
//! atomic pointer swap. Reconciliation builds the next snapshot by
//! diffing the applicable set against the current one and applying
//! removals before additions.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::errors::Result;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{Prompt, Tool};
use crate::output::ListOutput;

/// Async handler bound to a tool definition. Receives the derived client
/// for the selected target and the typed argument view; returns the text
/// rendered into the protocol result.
pub type ToolHandler =
    Arc<dyn Fn(ToolHandlerParams) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Everything a tool handler needs for one invocation.
pub struct ToolHandlerParams {
    pub client: kube::Client,
    pub args: ToolCallArgs,
    pub list_output: ListOutput,
    /// Snapshot of the provider's target set at invocation time.
    pub targets: Vec<String>,
    pub default_target: String,
}

/// Typed view over a tool call's arguments object.
#[derive(Debug, Clone, Default)]
pub struct ToolCallArgs {
    arguments: serde_json::Map<String, Value>,
}

impl ToolCallArgs {
    pub fn from_value(value: Option<Value>) -> std::result::Result<Self, McpError> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(arguments)) => Ok(Self { arguments }),
            Some(other) => Err(McpError::InvalidParams(format!(
                "tool arguments must be an object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// String argument with a fallback. An empty key always yields the
    /// fallback; this is how single-target providers opt out of the target
    /// parameter.
    pub fn get_string(&self, key: &str, default_value: &str) -> String {
        if key.is_empty() {
            return default_value.to_string();
        }
        match self.arguments.get(key) {
            Some(Value::String(value)) if !value.is_empty() => value.clone(),
            _ => default_value.to_string(),
        }
    }

    pub fn get_optional(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: &str, default_value: bool) -> bool {
        self.arguments.get(key).and_then(Value::as_bool).unwrap_or(default_value)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.arguments.get(key).and_then(Value::as_i64)
    }

    /// Required string argument; missing or empty is an invalid-params
    /// error.
    pub fn require(&self, key: &str) -> std::result::Result<String, McpError> {
        self.get_optional(key)
            .map(str::to_string)
            .ok_or_else(|| McpError::InvalidParams(format!("missing required argument: {}", key)))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A tool definition paired with its handler.
#[derive(Clone)]
pub struct ServerTool {
    pub tool: Tool,
    pub handler: ToolHandler,
}

/// A prompt definition paired with its static message templates
/// (role, content) where `{{argument}}` placeholders are interpolated at
/// render time.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPrompt {
    pub prompt: Prompt,
    pub messages: Vec<(String, String)>,
}

/// The advertised tool and prompt catalog.
#[derive(Clone, Default)]
pub struct Catalog {
    tools: Vec<ServerTool>,
    prompts: Vec<ServerPrompt>,
}

/// Name-level difference between two catalogs. A tool whose definition
/// changed shows up in both `removed` and `added` (remove-then-add).
#[derive(Debug, Default, PartialEq)]
pub struct CatalogDiff {
    pub removed_tools: Vec<String>,
    pub added_tools: Vec<String>,
    pub removed_prompts: Vec<String>,
    pub added_prompts: Vec<String>,
}

impl CatalogDiff {
    pub fn tools_changed(&self) -> bool {
        !self.removed_tools.is_empty() || !self.added_tools.is_empty()
    }

    pub fn prompts_changed(&self) -> bool {
        !self.removed_prompts.is_empty() || !self.added_prompts.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.tools_changed() && !self.prompts_changed()
    }
}

impl Catalog {
    pub fn new(tools: Vec<ServerTool>, prompts: Vec<ServerPrompt>) -> Self {
        Self { tools, prompts }
    }

    pub fn tools(&self) -> &[ServerTool] {
        &self.tools
    }

    pub fn prompts(&self) -> &[ServerPrompt] {
        &self.prompts
    }

    pub fn tool(&self, name: &str) -> Option<&ServerTool> {
        self.tools.iter().find(|t| t.tool.name == name)
    }

    pub fn prompt(&self, name: &str) -> Option<&ServerPrompt> {
        self.prompts.iter().find(|p| p.prompt.name == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.tool.name.clone()).collect()
    }

    pub fn prompt_names(&self) -> Vec<String> {
        self.prompts.iter().map(|p| p.prompt.name.clone()).collect()
    }

    /// Compute the transition from `self` to `next`. A definition change
    /// (schema or annotations) forces remove-then-add for that name.
    pub fn diff(&self, next: &Catalog) -> CatalogDiff {
        let mut diff = CatalogDiff::default();

        for old_tool in &self.tools {
            match next.tool(&old_tool.tool.name) {
                Some(new_tool) if new_tool.tool == old_tool.tool => {}
                _ => diff.removed_tools.push(old_tool.tool.name.clone()),
            }
        }
        for new_tool in &next.tools {
            match self.tool(&new_tool.tool.name) {
                Some(old_tool) if old_tool.tool == new_tool.tool => {}
                _ => diff.added_tools.push(new_tool.tool.name.clone()),
            }
        }

        for old_prompt in &self.prompts {
            match next.prompt(&old_prompt.prompt.name) {
                Some(new_prompt) if new_prompt == old_prompt => {}
                _ => diff.removed_prompts.push(old_prompt.prompt.name.clone()),
            }
        }
        for new_prompt in &next.prompts {
            match self.prompt(&new_prompt.prompt.name) {
                Some(old_prompt) if old_prompt == new_prompt => {}
                _ => diff.added_prompts.push(new_prompt.prompt.name.clone()),
            }
        }

        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, schema: Value) -> ServerTool {
        ServerTool {
            tool: Tool {
                name: name.to_string(),
                description: format!("{} description", name),
                input_schema: schema,
                annotations: None,
            },
            handler: Arc::new(|_params| Box::pin(async { Ok(String::new()) })),
        }
    }

    fn prompt(name: &str) -> ServerPrompt {
        ServerPrompt {
            prompt: Prompt {
                name: name.to_string(),
                title: None,
                description: None,
                arguments: None,
            },
            messages: vec![("user".to_string(), "hello".to_string())],
        }
    }

    #[test]
    fn test_args_from_value() {
        assert!(ToolCallArgs::from_value(None).is_ok());
        assert!(ToolCallArgs::from_value(Some(json!({"a": 1}))).is_ok());
        assert!(ToolCallArgs::from_value(Some(json!([1, 2]))).is_err());
    }

    #[test]
    fn test_args_get_string() {
        let args = ToolCallArgs::from_value(Some(json!({
            "context": "prod",
            "empty": "",
            "number": 3
        })))
        .unwrap();

        assert_eq!(args.get_string("context", "default"), "prod");
        assert_eq!(args.get_string("missing", "default"), "default");
        assert_eq!(args.get_string("empty", "default"), "default");
        assert_eq!(args.get_string("number", "default"), "default");
        // Empty key always falls back, used by single-target providers
        assert_eq!(args.get_string("", "default"), "default");
    }

    #[test]
    fn test_args_require() {
        let args = ToolCallArgs::from_value(Some(json!({"name": "web-0"}))).unwrap();
        assert_eq!(args.require("name").unwrap(), "web-0");
        assert!(args.require("namespace").is_err());
    }

    #[test]
    fn test_diff_detects_additions_and_removals() {
        let old = Catalog::new(vec![tool("a", json!({})), tool("b", json!({}))], vec![]);
        let new = Catalog::new(vec![tool("b", json!({})), tool("c", json!({}))], vec![]);

        let diff = old.diff(&new);
        assert_eq!(diff.removed_tools, vec!["a"]);
        assert_eq!(diff.added_tools, vec!["c"]);
        assert!(diff.tools_changed());
        assert!(!diff.prompts_changed());
    }

    #[test]
    fn test_diff_schema_change_forces_remove_then_add() {
        let old = Catalog::new(vec![tool("a", json!({"type": "object"}))], vec![]);
        let new = Catalog::new(
            vec![tool("a", json!({"type": "object", "required": ["context"]}))],
            vec![],
        );

        let diff = old.diff(&new);
        assert_eq!(diff.removed_tools, vec!["a"]);
        assert_eq!(diff.added_tools, vec!["a"]);
    }

    #[test]
    fn test_diff_identical_catalogs_is_empty() {
        let old = Catalog::new(vec![tool("a", json!({}))], vec![prompt("p")]);
        let new = Catalog::new(vec![tool("a", json!({}))], vec![prompt("p")]);
        assert!(old.diff(&new).is_empty());
    }

    #[test]
    fn test_diff_prompts() {
        let old = Catalog::new(vec![], vec![prompt("keep"), prompt("drop")]);
        let new = Catalog::new(vec![], vec![prompt("keep"), prompt("add")]);

        let diff = old.diff(&new);
        assert_eq!(diff.removed_prompts, vec!["drop"]);
        assert_eq!(diff.added_prompts, vec!["add"]);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::new(vec![tool("a", json!({}))], vec![prompt("p")]);
        assert!(catalog.tool("a").is_some());
        assert!(catalog.tool("missing").is_none());
        assert!(catalog.prompt("p").is_some());
        assert_eq!(catalog.tool_names(), vec!["a"]);
        assert_eq!(catalog.prompt_names(), vec!["p"]);
    }
}
