use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use joey_core::skill::Skill;
use joey_core::{ActionRequest, ActionResult};

use crate::extract::ParameterExtractor;
use crate::llm::{ChatMessage, LlmClient};

/// A native implementation for one skill. Returning `None` defers to the
/// generic model-driven path; that is how a handler says "this request is
/// in my skill but not one of my canonical actions".
#[async_trait]
pub trait SkillHandler: Send + Sync {
    async fn execute(&self, skill: &Skill, request: &ActionRequest) -> Option<ActionResult>;
}

/// Static map from skill name to handler, built once at startup. Skills
/// without an entry run on the generic path only.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn SkillHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill_name: impl Into<String>, handler: Arc<dyn SkillHandler>) {
        self.handlers.insert(skill_name.into(), handler);
    }

    pub fn get(&self, skill_name: &str) -> Option<&Arc<dyn SkillHandler>> {
        self.handlers.get(skill_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runs a selected skill: extract parameters, hand off to the native
/// handler when one is registered, otherwise (or when the handler
/// defers) follow the skill's instructions with the model.
pub struct SkillExecutor {
    extractor: ParameterExtractor,
    handlers: HandlerRegistry,
    llm: Arc<dyn LlmClient>,
}

impl SkillExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, handlers: HandlerRegistry) -> Self {
        Self { extractor: ParameterExtractor::new(Arc::clone(&llm)), handlers, llm }
    }

    pub async fn execute(
        &self,
        skill: &Skill,
        text: &str,
        requester_id: &str,
        channel_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> ActionResult {
        let params = self.extractor.extract(skill, text).await;
        debug!(
            event_name = "agent.executor.params_extracted",
            skill = %skill.name,
            param_count = params.len(),
            "parameters extracted"
        );

        let request = ActionRequest {
            skill_name: skill.name.clone(),
            action: params.get("action").and_then(Value::as_str).map(str::to_owned),
            params,
            requester_id: requester_id.to_owned(),
            channel_id: channel_id.map(str::to_owned),
            thread_id: thread_id.map(str::to_owned),
            raw_text: text.to_owned(),
        };

        if let Some(handler) = self.handlers.get(&skill.name) {
            if let Some(result) = handler.execute(skill, &request).await {
                return result;
            }
        }

        self.execute_with_model(skill, &request).await
    }

    /// Generic path: the skill's instructions go to the model verbatim,
    /// with whatever parameters were extracted as context.
    async fn execute_with_model(&self, skill: &Skill, request: &ActionRequest) -> ActionResult {
        let params =
            serde_json::to_string(&request.params).unwrap_or_else(|_| "{}".to_owned());
        let prompt = format!(
            "You are Joey, executing the \"{}\" skill.\n\n\
             Skill description: {}\n\n\
             Skill instructions:\n{}\n\n\
             User's original request: \"{}\"\n\
             Extracted parameters: {params}\n\
             Requesting user ID: {}\n\n\
             Follow the skill instructions to generate an appropriate response.\n\
             Be helpful, friendly, and use casual Australian expressions occasionally.\n\
             Keep the response concise but informative.",
            skill.name, skill.description, skill.instructions, request.raw_text,
            request.requester_id
        );

        let messages = [
            ChatMessage::system("You are Joey, a friendly AI assistant for the MLAI community."),
            ChatMessage::user(prompt),
        ];

        match self.llm.chat(&messages).await {
            Ok(outcome) => ActionResult::ok_with_data(
                outcome.content,
                Value::Object(request.params.clone()),
            ),
            Err(error) => {
                warn!(event_name = "agent.executor.model_failed", skill = %skill.name, %error, "generic skill execution failed");
                ActionResult::ok(
                    "Sorry, I ran into a problem with that one. Can you try again in a bit?",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use joey_core::skill::{builtin_skills, Skill};
    use joey_core::{ActionRequest, ActionResult};

    use super::{HandlerRegistry, SkillExecutor, SkillHandler};
    use crate::llm::{ChatMessage, ChatOutcome, LlmClient};

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
            let content = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            // Extraction prompts get an empty object; execution prompts get prose.
            let reply = if content.contains("Return a JSON object") {
                "{}".to_owned()
            } else {
                "model reply".to_owned()
            };
            Ok(ChatOutcome { content: reply, model: "fake".to_owned(), usage: None })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("not supported")
        }
    }

    struct FixedHandler;

    #[async_trait]
    impl SkillHandler for FixedHandler {
        async fn execute(&self, _skill: &Skill, _request: &ActionRequest) -> Option<ActionResult> {
            Some(ActionResult::ok("handled natively"))
        }
    }

    struct DeferringHandler;

    #[async_trait]
    impl SkillHandler for DeferringHandler {
        async fn execute(&self, _skill: &Skill, _request: &ActionRequest) -> Option<ActionResult> {
            None
        }
    }

    fn points_skill() -> Skill {
        builtin_skills().into_iter().find(|s| s.name == "community-points").expect("points skill")
    }

    #[tokio::test]
    async fn native_handler_takes_precedence_over_model() {
        let mut handlers = HandlerRegistry::new();
        handlers.register("community-points", Arc::new(FixedHandler));
        let executor = SkillExecutor::new(Arc::new(EchoLlm), handlers);

        let result = executor.execute(&points_skill(), "balance", "U1", None, None).await;
        assert_eq!(result.message, "handled natively");
    }

    #[tokio::test]
    async fn deferring_handler_falls_back_to_model() {
        let mut handlers = HandlerRegistry::new();
        handlers.register("community-points", Arc::new(DeferringHandler));
        let executor = SkillExecutor::new(Arc::new(EchoLlm), handlers);

        let result = executor.execute(&points_skill(), "something odd", "U1", None, None).await;
        assert!(result.success);
        assert_eq!(result.message, "model reply");
    }

    #[tokio::test]
    async fn unregistered_skill_uses_model_path() {
        let executor = SkillExecutor::new(Arc::new(EchoLlm), HandlerRegistry::new());
        let skill =
            builtin_skills().into_iter().find(|s| s.name == "connect-users").expect("skill");
        let result = executor.execute(&skill, "anyone into Rust?", "U1", None, None).await;
        assert!(result.success);
        assert_eq!(result.message, "model reply");
    }
}
