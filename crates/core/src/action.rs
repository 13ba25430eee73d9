use serde_json::{Map, Value};

use crate::errors::ErrorKind;

/// One inbound request against a selected skill. Created per event,
/// consumed once, never persisted.
#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub skill_name: String,
    pub action: Option<String>,
    pub params: Map<String, Value>,
    pub requester_id: String,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub raw_text: String,
}

impl ActionRequest {
    pub fn new(skill_name: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            skill_name: skill_name.into(),
            action: None,
            params: Map::new(),
            requester_id: requester_id.into(),
            channel_id: None,
            thread_id: None,
            raw_text: String::new(),
        }
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Numeric parameter, tolerating models that emit numbers as strings.
    pub fn param_i64(&self, key: &str) -> Option<i64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// The only externally observable output of dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    pub error_kind: Option<ErrorKind>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None, error_kind: None }
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self { success: true, message: message.into(), data: Some(data), error_kind: None }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None, error_kind: Some(kind) }
    }

    /// A clarifying question. Counts as success with empty data; the user
    /// is expected to answer, nothing went wrong.
    pub fn clarify(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error_kind: Some(ErrorKind::AmbiguousInput),
        }
    }

    pub fn is_clarification(&self) -> bool {
        self.success && self.error_kind == Some(ErrorKind::AmbiguousInput)
    }
}
