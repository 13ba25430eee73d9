use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use joey_core::skill::SkillRegistry;

use crate::fastpath::FastPath;
use crate::intent::IntentSelector;
use crate::llm::LlmClient;
use crate::normalize::clean_mention;
use crate::reply;
use crate::executor::SkillExecutor;

/// What a handled mention produces: the reply text plus which skill (if
/// any) did the work.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub message: String,
    pub skill_used: Option<String>,
    pub data: Option<Value>,
}

/// The orchestration pipeline for one inbound mention: normalize, fast
/// path, intent selection, skill execution, conversational fallback.
/// Strictly sequential within one event; concurrency lives above, one
/// spawned task per event.
pub struct Agent {
    fast_path: FastPath,
    selector: IntentSelector,
    executor: SkillExecutor,
    llm: Arc<dyn LlmClient>,
    bot_user_id: String,
}

impl Agent {
    pub fn new(
        registry: Arc<SkillRegistry>,
        fast_path: FastPath,
        executor: SkillExecutor,
        llm: Arc<dyn LlmClient>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            fast_path,
            selector: IntentSelector::new(registry, Arc::clone(&llm)),
            executor,
            llm,
            bot_user_id: bot_user_id.into(),
        }
    }

    pub async fn handle_mention(
        &self,
        text: &str,
        user_id: &str,
        channel_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> AgentReply {
        let clean_text = clean_mention(text, &self.bot_user_id);
        debug!(
            event_name = "agent.mention.received",
            user = %user_id,
            text_len = clean_text.len(),
            "processing mention"
        );

        // Fast path short-circuits everything: a hit never reaches the
        // intent selector or any model call.
        if let Some(result) = self.fast_path.try_execute(&clean_text, user_id, channel_id).await {
            info!(event_name = "agent.mention.fast_path", user = %user_id, "fast path handled mention");
            return AgentReply {
                message: result.message,
                skill_used: Some("community-points (fast)".to_owned()),
                data: result.data,
            };
        }

        if let Some(skill) = self.selector.select(&clean_text).await {
            info!(event_name = "agent.mention.skill_selected", skill = %skill.name, "skill selected");
            let result = self
                .executor
                .execute(&skill, &clean_text, user_id, channel_id, thread_id)
                .await;
            return AgentReply {
                message: result.message,
                skill_used: Some(skill.name.clone()),
                data: result.data,
            };
        }

        debug!(event_name = "agent.mention.general_reply", "no skill matched, conversational reply");
        AgentReply {
            message: reply::general_response(&self.llm, &clean_text).await,
            skill_used: None,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use joey_core::config::BotConfig;
    use joey_core::skill::{builtin_skills, SkillRegistry};
    use joey_core::{AdminAllowance, RateCardEntry};

    use super::Agent;
    use crate::dispatch::ActionDispatcher;
    use crate::executor::{HandlerRegistry, SkillExecutor};
    use crate::fastpath::FastPath;
    use crate::llm::LlmClient;
    use crate::testutil::{CountingLlm, StubChat, StubPoints};

    fn agent_with(points: Arc<StubPoints>, llm: Arc<CountingLlm>) -> Agent {
        let bot = BotConfig { timezone_offset_minutes: 600 };
        let registry = Arc::new(SkillRegistry::new(builtin_skills()));
        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "community-points",
            Arc::new(ActionDispatcher::new(
                Arc::clone(&points) as _,
                Arc::new(StubChat::default()),
                bot.clone(),
                "BOT1",
            )),
        );
        let executor = SkillExecutor::new(Arc::clone(&llm) as Arc<dyn LlmClient>, handlers);
        Agent::new(
            registry,
            FastPath::new(points as _, bot),
            executor,
            llm as Arc<dyn LlmClient>,
            "BOT1",
        )
    }

    #[tokio::test]
    async fn balance_fast_path_answers_without_any_model_call() {
        let points = Arc::new(StubPoints::default());
        let llm = Arc::new(CountingLlm::new("should never be used"));
        let agent = agent_with(Arc::clone(&points), Arc::clone(&llm));

        let reply = agent.handle_mention("<@BOT1> points", "U1", Some("C1"), None).await;

        assert!(reply.message.contains("42"));
        assert!(reply.message.contains("100"));
        assert_eq!(reply.skill_used.as_deref(), Some("community-points (fast)"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn book_today_issues_booking_for_local_date_and_echoes_cost() {
        let points = Arc::new(StubPoints { booking_cost: 3, ..StubPoints::default() });
        let llm = Arc::new(CountingLlm::new("unused"));
        let agent = agent_with(Arc::clone(&points), llm);

        let reply =
            agent.handle_mention("<@BOT1> coworking book today", "U1", Some("C1"), None).await;

        let expected_date = BotConfig { timezone_offset_minutes: 600 }.today().to_string();
        let bookings = points.booking_calls.lock().expect("bookings").clone();
        assert_eq!(bookings, vec![("U1".to_owned(), expected_date.clone())]);
        assert!(reply.message.contains(&expected_date));
        assert!(reply.message.contains('3'));
    }

    #[tokio::test]
    async fn fast_path_failure_degrades_to_apology_not_fallthrough() {
        let points = Arc::new(StubPoints { fail_upstream: true, ..StubPoints::default() });
        let llm = Arc::new(CountingLlm::new("unused"));
        let agent = agent_with(points, Arc::clone(&llm));

        let reply = agent.handle_mention("<@BOT1> points", "U1", None, None).await;

        assert!(reply.message.contains("trouble"));
        // Even on failure there is no second resolution attempt.
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn ambiguous_award_confirms_rate_card_amount_without_awarding() {
        let points = Arc::new(StubPoints {
            admin_ids: vec!["ADMIN".to_owned()],
            allowance: Some(AdminAllowance { allowance: 50, used: 0, remaining: 50 }),
            rate_card: vec![RateCardEntry {
                alias: "newsletter".to_owned(),
                name: "Weekly Newsletter".to_owned(),
                points: 10,
                description: "Writing the weekly newsletter".to_owned(),
            }],
            ..StubPoints::default()
        });
        // Extraction returns unparsable prose; the dispatcher still
        // resolves the action from raw text.
        let llm = Arc::new(CountingLlm::new("no json here"));
        let agent = agent_with(Arc::clone(&points), llm);

        let reply = agent
            .handle_mention("<@BOT1> award <@U2> for newsletter", "ADMIN", Some("C1"), None)
            .await;

        assert!(reply.message.contains("10"), "got: {}", reply.message);
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn quota_exhausted_admin_cannot_award_anything() {
        let points = Arc::new(StubPoints {
            admin_ids: vec!["ADMIN".to_owned()],
            allowance: Some(AdminAllowance { allowance: 50, used: 50, remaining: 0 }),
            ..StubPoints::default()
        });
        let llm = Arc::new(CountingLlm::new("no json here"));
        let agent = agent_with(Arc::clone(&points), llm);

        let reply = agent
            .handle_mention("<@BOT1> award <@U2> 5 points", "ADMIN", Some("C1"), None)
            .await;

        assert!(reply.message.contains("allowance"), "got: {}", reply.message);
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_text_gets_conversational_reply() {
        let points = Arc::new(StubPoints::default());
        let llm = Arc::new(CountingLlm::new("none"));
        let agent = agent_with(points, Arc::clone(&llm));

        let reply = agent.handle_mention("<@BOT1> how was your weekend?", "U1", None, None).await;

        assert!(reply.skill_used.is_none());
        // One classification call, one reply call.
        assert_eq!(llm.call_count(), 2);
        assert_eq!(reply.message, "none");
    }
}
