//! Tool registry
//!
//! Maps tool names to handlers and renders their definitions for
//! `response.create`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while dispatching a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that was never registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The argument payload could not be parsed into the tool's argument type
    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    /// The handler itself failed
    #[error("Tool {tool} failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn invalid_arguments(tool: impl Into<String>, message: impl ToString) -> Self {
        ToolError::InvalidArguments {
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    pub fn execution(tool: impl Into<String>, message: impl ToString) -> Self {
        ToolError::Execution {
            tool: tool.into(),
            message: message.to_string(),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Function tool definition as the realtime protocol expects it inside
/// `response.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Always `"function"`
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object, including its `required` list
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A single tool capability.
///
/// Handlers receive the already parsed argument object. Returning a JSON
/// string yields that string verbatim; any other value is rendered in its
/// plain textual form.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: Value) -> ToolResult<Value>;
}

/// Adapter turning a plain function into a [`ToolHandler`].
pub struct FnTool<F> {
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(Value) -> ToolResult<Value> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> ToolResult<Value> + Send + Sync,
{
    async fn invoke(&self, arguments: Value) -> ToolResult<Value> {
        (self.func)(arguments)
    }
}

struct ToolEntry {
    schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

/// Name-keyed registry of tools, kept in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let (schema, handler) = super::calculate_sum_tool();
        registry.register_shared(schema, handler);
        registry
    }

    /// Register a handler under `schema.name`. A second registration with the
    /// same name replaces the first.
    pub fn register(&mut self, schema: ToolSchema, handler: impl ToolHandler + 'static) {
        self.register_shared(schema, Arc::new(handler));
    }

    pub fn register_shared(&mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) {
        let name = schema.name.clone();
        let entry = ToolEntry { schema, handler };

        match self.by_name.get(&name) {
            Some(&index) => {
                tracing::warn!("Replacing registered tool {}", name);
                self.entries[index] = entry;
            }
            None => {
                self.by_name.insert(name, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schemas of every registered tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.entries.iter().map(|e| e.schema.clone()).collect()
    }

    /// Invoke `name` with parsed arguments and stringify its result.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolResult<String> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let value = self.entries[index].handler.invoke(arguments).await?;
        Ok(stringify_output(&value))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Textual form of a tool result. Integral floats drop their fraction.
fn stringify_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
