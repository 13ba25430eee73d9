use std::sync::Arc;

use tracing::{debug, warn};

use joey_core::skill::{normalize_skill_name, Skill, SkillRegistry};

use crate::llm::{ChatMessage, LlmClient};

/// Picks a skill for a message: trigger keywords first (registry order,
/// zero model calls), then a single classification call. Returning `None`
/// is never an error; the caller falls back to a conversational reply.
pub struct IntentSelector {
    registry: Arc<SkillRegistry>,
    llm: Arc<dyn LlmClient>,
}

impl IntentSelector {
    pub fn new(registry: Arc<SkillRegistry>, llm: Arc<dyn LlmClient>) -> Self {
        Self { registry, llm }
    }

    pub async fn select(&self, text: &str) -> Option<Skill> {
        if self.registry.is_empty() {
            return None;
        }

        let text_lower = text.to_ascii_lowercase();
        for skill in self.registry.list() {
            for keyword in &skill.trigger_keywords {
                if text_lower.contains(&keyword.to_ascii_lowercase()) {
                    debug!(
                        event_name = "agent.intent.keyword_match",
                        skill = %skill.name,
                        keyword = %keyword,
                        "skill selected by trigger keyword"
                    );
                    return Some(skill.clone());
                }
            }
        }

        self.classify(text).await
    }

    async fn classify(&self, text: &str) -> Option<Skill> {
        let skill_descriptions = self
            .registry
            .list()
            .iter()
            .map(|skill| format!("- {}: {}", skill.name, skill.description))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are a skill router. Given the user's message, decide which skill to use.\n\n\
             Available skills:\n{skill_descriptions}\n\
             - none: Use this if no skill is appropriate (general conversation)\n\n\
             User message: \"{text}\"\n\n\
             Respond with ONLY the skill name (e.g., \"community-points\" or \"none\"):"
        );

        let messages = [
            ChatMessage::system("You are a skill router. Respond with only the skill name."),
            ChatMessage::user(prompt),
        ];

        let outcome = match self.llm.chat(&messages).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(event_name = "agent.intent.classify_failed", %error, "skill classification failed");
                return None;
            }
        };

        let name = normalize_skill_name(&outcome.content);
        if name == "none" {
            return None;
        }
        self.registry.find(&name).cloned()
    }
}
