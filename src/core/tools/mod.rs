//! Locally executable tools offered to the realtime model.
//!
//! Each registry entry pairs the schema the model sees with a handler that
//! performs the call. Tool output is always stringified before it goes back
//! over the connection.

mod builtin;
mod registry;

pub use builtin::{CALCULATE_SUM, CalculateSum, calculate_sum_tool};
pub use registry::{FnTool, ToolError, ToolHandler, ToolRegistry, ToolResult, ToolSchema};
