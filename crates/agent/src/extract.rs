use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use joey_core::skill::Skill;

use crate::llm::{ChatMessage, LlmClient};

/// Best-effort structured extraction. Never extracts more than the skill
/// declares, never fails: a parse problem is an empty map, and downstream
/// handlers ask clarifying questions for anything missing.
pub struct ParameterExtractor {
    llm: Arc<dyn LlmClient>,
}

impl ParameterExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, skill: &Skill, text: &str) -> Map<String, Value> {
        if skill.parameters.is_empty() {
            return Map::new();
        }

        let definitions = skill
            .parameters
            .iter()
            .map(|param| {
                let required = if param.required { " (required)" } else { "" };
                let default = param
                    .default
                    .as_deref()
                    .map(|value| format!(" (default: {value})"))
                    .unwrap_or_default();
                format!("- **{}**: {}{required}{default}", param.name, param.description)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Extract parameters from the user's message based on these definitions:\n\n\
             {definitions}\n\n\
             User message: \"{text}\"\n\n\
             Return a JSON object with the extracted parameters. Only include parameters that \
             are clearly present.\n\
             Example: {{\"query\": \"machine learning\", \"limit\": 5}}\n\n\
             JSON:"
        );

        let messages = [
            ChatMessage::system(
                "You extract structured parameters from text. Return valid JSON only.",
            ),
            ChatMessage::user(prompt),
        ];

        let outcome = match self.llm.chat(&messages).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(event_name = "agent.extract.model_failed", %error, "parameter extraction failed");
                return Map::new();
            }
        };

        parse_object(&outcome.content)
    }
}

/// Defensive parse of a model reply that should be a JSON object. Strips
/// markdown fences; anything unparsable becomes an empty map.
pub fn parse_object(raw: &str) -> Map<String, Value> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!(event_name = "agent.extract.non_object", value_type = %value_type(&other), "extraction returned non-object JSON");
            Map::new()
        }
        Err(error) => {
            debug!(event_name = "agent.extract.parse_failed", %error, "extraction returned unparsable JSON");
            Map::new()
        }
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    inner.trim_end_matches("```").trim()
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_object;

    #[test]
    fn parses_plain_json_objects() {
        let map = parse_object(r#"{"action": "award_points", "points": 10}"#);
        assert_eq!(map.get("action"), Some(&json!("award_points")));
        assert_eq!(map.get("points"), Some(&json!(10)));
    }

    #[test]
    fn strips_markdown_fences_with_language_tag() {
        let map = parse_object("```json\n{\"query\": \"rust\"}\n```");
        assert_eq!(map.get("query"), Some(&json!("rust")));
    }

    #[test]
    fn garbage_becomes_empty_map() {
        assert!(parse_object("I couldn't find any parameters, sorry!").is_empty());
    }

    #[test]
    fn non_object_json_becomes_empty_map() {
        assert!(parse_object("[1, 2, 3]").is_empty());
        assert!(parse_object("\"just a string\"").is_empty());
    }
}
