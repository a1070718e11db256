//! # Prompts
//!
//! User-declared prompts from configuration, merged over the embedded
//! toolset prompts. Message templates interpolate `{{argument}}`
//! placeholders at render time.

use serde_json::Value;

use crate::config::PromptDefinition;
use crate::mcp::catalog::ServerPrompt;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    Prompt, PromptArgument, PromptContent, PromptGetResult, PromptMessage,
};

/// Convert configuration prompt definitions into server prompts. Entries
/// without a name or without messages are skipped.
pub fn from_definitions(definitions: &[PromptDefinition]) -> Vec<ServerPrompt> {
    definitions
        .iter()
        .filter(|d| !d.name.is_empty() && !d.messages.is_empty())
        .map(|d| ServerPrompt {
            prompt: Prompt {
                name: d.name.clone(),
                title: (!d.title.is_empty()).then(|| d.title.clone()),
                description: (!d.description.is_empty()).then(|| d.description.clone()),
                arguments: (!d.arguments.is_empty()).then(|| {
                    d.arguments
                        .iter()
                        .map(|a| PromptArgument {
                            name: a.name.clone(),
                            description: (!a.description.is_empty())
                                .then(|| a.description.clone()),
                            required: a.required.then_some(true),
                        })
                        .collect()
                }),
            },
            messages: d.messages.iter().map(|m| (m.role.clone(), m.content.clone())).collect(),
        })
        .collect()
}

/// Merge embedded toolset prompts with user-declared prompts. A declared
/// prompt replaces an embedded prompt of the same name.
pub fn merge_prompts(
    embedded: Vec<ServerPrompt>,
    declared: Vec<ServerPrompt>,
) -> Vec<ServerPrompt> {
    let mut merged: Vec<ServerPrompt> = embedded
        .into_iter()
        .filter(|e| !declared.iter().any(|d| d.prompt.name == e.prompt.name))
        .collect();
    merged.extend(declared);
    merged
}

/// Render a prompt with the given arguments.
pub fn render(
    prompt: &ServerPrompt,
    arguments: Option<&Value>,
) -> std::result::Result<PromptGetResult, McpError> {
    let arguments = match arguments {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(_) => {
            return Err(McpError::InvalidParams(
                "prompt arguments must be an object".to_string(),
            ));
        }
    };

    if let Some(declared_args) = &prompt.prompt.arguments {
        for declared in declared_args {
            if declared.required == Some(true) && !arguments.contains_key(&declared.name) {
                return Err(McpError::InvalidParams(format!(
                    "missing required prompt argument: {}",
                    declared.name
                )));
            }
        }
    }

    let messages = prompt
        .messages
        .iter()
        .map(|(role, template)| PromptMessage {
            role: role.clone(),
            content: PromptContent::Text { text: interpolate(template, &arguments) },
        })
        .collect();

    Ok(PromptGetResult { description: prompt.prompt.description.clone(), messages })
}

/// Replace `{{name}}` placeholders with argument values. Unknown
/// placeholders are left in place.
fn interpolate(template: &str, arguments: &serde_json::Map<String, Value>) -> String {
    let mut rendered = template.to_string();
    for (name, value) in arguments {
        let placeholder = format!("{{{{{}}}}}", name);
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &replacement);
    }
    rendered
}
