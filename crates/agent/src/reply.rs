use std::sync::Arc;

use tracing::warn;

use crate::llm::{ChatMessage, LlmClient};

const PERSONA_PROMPT: &str = "\
You are Joey, the friendly AI assistant for the MLAI community.

Your personality:
- Warm and approachable, like a helpful local
- Use casual Australian expressions occasionally (mate, no worries, etc.)
- Helpful and encouraging
- Keep responses concise but friendly

Respond to the user's message in a helpful, conversational way.";

const FALLBACK_APOLOGY: &str =
    "G'day! Sorry, I'm having a bit of trouble at the moment. Mind trying again? 🦘";

/// Conversational fallback when no skill matched. Provider failure
/// surfaces a canned apology, never an error.
pub async fn general_response(llm: &Arc<dyn LlmClient>, text: &str) -> String {
    let messages = [ChatMessage::system(PERSONA_PROMPT), ChatMessage::user(text)];
    match llm.chat(&messages).await {
        Ok(outcome) => outcome.content,
        Err(error) => {
            warn!(event_name = "agent.reply.model_failed", %error, "general response failed");
            FALLBACK_APOLOGY.to_owned()
        }
    }
}
