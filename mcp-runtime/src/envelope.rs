use std::fmt::Display;

use serde::Serialize;
use serde_json::{Value, json};

/// Uniform outcome of every tool call: serialized JSON on success, a
/// human-readable message on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub is_error: bool,
    pub content: String,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: content.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: message.into(),
        }
    }

    /// Single wrapping point for handler outcomes. Never fails: a value that
    /// cannot be serialized turns into an error result as well.
    pub fn from_outcome<T, E>(outcome: Result<T, E>) -> Self
    where
        T: Serialize,
        E: Display,
    {
        match outcome {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(text) => Self::success(text),
                Err(err) => Self::failure(format!("Failed to serialize tool result: {err}")),
            },
            Err(err) => Self::failure(err.to_string()),
        }
    }

    /// MCP `tools/call` result shape.
    pub fn to_value(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.content }],
            "isError": self.is_error
        })
    }
}
