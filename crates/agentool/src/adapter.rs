//! Adapter exposing a loaded tool to agent-orchestration frameworks.
//!
//! Frameworks want a name, a description, a JSON schema for the arguments,
//! and an async entry point returning text. [`AgentTool`] derives all four
//! from a [`ToolWithMeta`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::ToolResult;
use crate::tool::{ToolMeta, ToolWithMeta};

/// Field name of the single string argument in simple mode.
pub const SIMPLE_INPUT_FIELD: &str = "input";

/// Renders a tool result as text for the framework.
pub type Stringify = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// A tool as seen by an agent framework.
#[async_trait::async_trait]
pub trait FrameworkTool: Send + Sync {
    /// Identifier restricted to `[A-Za-z0-9_-]`.
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON schema for the arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool and render its result as text.
    async fn invoke(&self, input: Value) -> ToolResult<String>;
}

/// Overrides for [`AgentTool::new`].
#[derive(Clone, Default)]
pub struct AdapterOptions {
    /// Replaces the derived name.
    pub name: Option<String>,
    /// Replaces the manifest description.
    pub description: Option<String>,
    /// Replaces the default result rendering.
    pub stringify: Option<Stringify>,
    /// Always expose a single string argument, even when the manifest has an
    /// input schema.
    pub force_simple: bool,
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("stringify", &self.stringify.as_ref().map(|_| "<fn>"))
            .field("force_simple", &self.force_simple)
            .finish()
    }
}

/// A [`FrameworkTool`] backed by a loaded tool.
pub struct AgentTool {
    loaded: ToolWithMeta,
    name: String,
    description: String,
    schema: Value,
    simple: bool,
    stringify: Stringify,
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("simple", &self.simple)
            .finish_non_exhaustive()
    }
}

impl AgentTool {
    /// Wrap `loaded`, applying `options`.
    #[must_use]
    pub fn new(loaded: ToolWithMeta, options: AdapterOptions) -> Self {
        let meta = &loaded.meta;
        let name = options
            .name
            .unwrap_or_else(|| sanitize_name(&meta.name));
        let description = describe(meta, options.description);

        let structured = meta
            .inputs
            .as_ref()
            .filter(|schema| is_object_schema(schema) && !options.force_simple);
        let (schema, simple) = match structured {
            Some(schema) => (schema.clone(), false),
            None => (simple_schema(), true),
        };

        Self {
            name,
            description,
            schema,
            simple,
            stringify: options.stringify.unwrap_or_else(|| Arc::new(default_stringify)),
            loaded,
        }
    }

    /// Whether the tool takes a single string argument.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// The wrapped tool's metadata.
    #[must_use]
    pub fn meta(&self) -> &ToolMeta {
        &self.loaded.meta
    }
}

#[async_trait::async_trait]
impl FrameworkTool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, input: Value) -> ToolResult<String> {
        let payload = if self.simple {
            simple_payload(input)
        } else {
            input
        };
        let result = self.loaded.tool.call(payload).await?;
        Ok((self.stringify)(&result))
    }
}

/// Map a package name onto `[A-Za-z0-9_-]`: `@zack/summarize` becomes
/// `zack_summarize`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches('_');
    if trimmed.is_empty() {
        "tool".to_string()
    } else {
        trimmed.to_string()
    }
}

fn describe(meta: &ToolMeta, custom: Option<String>) -> String {
    let base = custom
        .or_else(|| meta.description.clone())
        .unwrap_or_else(|| format!("Run the {} tool (version {}).", meta.name, meta.version));
    match &meta.outputs {
        Some(outputs) => format!("{base}\n\nReturns JSON matching: {outputs}"),
        None => base,
    }
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some_and(Value::is_object)
}

fn simple_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            SIMPLE_INPUT_FIELD: {
                "type": "string",
                "description": "Tool input. JSON text is parsed; anything else is passed as a string."
            }
        },
        "required": [SIMPLE_INPUT_FIELD]
    })
}

/// Turn a simple-mode argument into the tool's request payload.
fn simple_payload(input: Value) -> Value {
    let text = match input {
        Value::String(s) => s,
        Value::Object(mut map) => match map.remove(SIMPLE_INPUT_FIELD) {
            Some(Value::String(s)) if map.is_empty() => s,
            Some(other) => {
                map.insert(SIMPLE_INPUT_FIELD.to_string(), other);
                return Value::Object(map);
            },
            None => return Value::Object(map),
        },
        other => return other,
    };
    serde_json::from_str(&text).unwrap_or_else(|_| json!({ SIMPLE_INPUT_FIELD: text }))
}

fn default_stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
