//! Built-in tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Number, Value, json};

use super::registry::{ToolError, ToolHandler, ToolResult, ToolSchema};
use std::sync::Arc;

pub const CALCULATE_SUM: &str = "calculate_sum";

const CALCULATE_SUM_DESCRIPTION: &str = "Use this function when asked to add number together, for example when asked 'What's 4 + 6'?. Strictly only use the answer in the prompt.";

#[derive(Debug, Deserialize)]
struct SumArgs {
    a: Number,
    b: Number,
}

/// Adds `a` and `b`. Integer inputs stay integers.
pub struct CalculateSum;

#[async_trait]
impl ToolHandler for CalculateSum {
    async fn invoke(&self, arguments: Value) -> ToolResult<Value> {
        let args: SumArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::invalid_arguments(CALCULATE_SUM, e))?;

        if let (Some(a), Some(b)) = (args.a.as_i64(), args.b.as_i64()) {
            if let Some(sum) = a.checked_add(b) {
                return Ok(json!(sum));
            }
        }

        let a = args.a.as_f64().unwrap_or_default();
        let b = args.b.as_f64().unwrap_or_default();
        Number::from_f64(a + b)
            .map(Value::Number)
            .ok_or_else(|| ToolError::execution(CALCULATE_SUM, "sum is not a finite number"))
    }
}

/// Schema and handler of the `calculate_sum` tool.
pub fn calculate_sum_tool() -> (ToolSchema, Arc<dyn ToolHandler>) {
    let schema = ToolSchema::function(
        CALCULATE_SUM,
        CALCULATE_SUM_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["a", "b"]
        }),
    );
    (schema, Arc::new(CalculateSum))
}
