use std::sync::Arc;

use tracing::{debug, info, warn};

use joey_core::api::{ChatApi, PointsApi};
use joey_core::store::KvStore;
use joey_core::{QuestDefinition, QuestEvent};

/// Event-driven engagement counters with idempotent completion. All
/// per-(user, quest) state lives in the injected store; the tracker
/// itself is stateless and safe to share across event handlers.
pub struct QuestTracker {
    quests: Vec<QuestDefinition>,
    store: Arc<dyn KvStore>,
    points: Arc<dyn PointsApi>,
    chat: Arc<dyn ChatApi>,
    bot_user_id: String,
}

fn count_key(user_id: &str, quest_id: &str) -> String {
    format!("quest:{user_id}:{quest_id}:count")
}

fn done_key(user_id: &str, quest_id: &str) -> String {
    format!("quest:{user_id}:{quest_id}:done")
}

impl QuestTracker {
    pub fn new(
        quests: Vec<QuestDefinition>,
        store: Arc<dyn KvStore>,
        points: Arc<dyn PointsApi>,
        chat: Arc<dyn ChatApi>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self { quests, store, points, chat, bot_user_id: bot_user_id.into() }
    }

    /// Evaluate one normalized event against every quest independently.
    /// A single event may advance several quests; each gets at most 1.
    pub async fn handle_event(&self, event: &QuestEvent) {
        let user_id = event.user_id();
        if user_id.is_empty() || user_id == self.bot_user_id {
            return;
        }

        for quest in &self.quests {
            if quest.rule.matches(event) {
                self.advance(user_id, quest, event).await;
            }
        }
    }

    async fn advance(&self, user_id: &str, quest: &QuestDefinition, event: &QuestEvent) {
        let done_key = done_key(user_id, &quest.id);
        match self.store.get(&done_key).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(error) => {
                warn!(event_name = "quests.store_failed", quest = %quest.id, %error, "completion lookup failed");
                return;
            }
        }

        // First-post quests dedup through the backend registry so the
        // one-time bonus survives restarts.
        if quest.rule.first_post_channel().is_some() {
            let channel_id = event.channel_id();
            match self.points.has_posted_in_channel(user_id, channel_id).await {
                Ok(true) => return,
                Ok(false) => {
                    if let Err(error) =
                        self.points.record_channel_post(user_id, channel_id).await
                    {
                        warn!(event_name = "quests.record_post_failed", quest = %quest.id, %error, "first-post record failed");
                        return;
                    }
                }
                Err(error) => {
                    warn!(event_name = "quests.first_post_check_failed", quest = %quest.id, %error, "first-post lookup failed");
                    return;
                }
            }
        }

        let count = match self.store.increment(&count_key(user_id, &quest.id), 1).await {
            Ok(count) => count,
            Err(error) => {
                warn!(event_name = "quests.store_failed", quest = %quest.id, %error, "progress increment failed");
                return;
            }
        };
        debug!(
            event_name = "quests.progress",
            quest = %quest.id,
            user = %user_id,
            count,
            target = quest.target_count,
            "quest progress"
        );

        if count >= i64::from(quest.target_count) {
            // The completion marker is claimed before the reward attempt:
            // at most one reward per (user, quest), even under duplicate
            // delivery or a failed award.
            match self.store.set_if_absent(&done_key, "1").await {
                Ok(true) => self.complete(user_id, quest).await,
                Ok(false) => {}
                Err(error) => {
                    warn!(event_name = "quests.store_failed", quest = %quest.id, %error, "completion marker failed");
                }
            }
        }
    }

    async fn complete(&self, user_id: &str, quest: &QuestDefinition) {
        info!(
            event_name = "quests.completed",
            quest = %quest.id,
            user = %user_id,
            points = quest.points,
            "quest completed"
        );

        let reason = format!("Completed quest: {}", quest.name);
        if let Err(error) = self
            .points
            .system_award_points(&self.bot_user_id, user_id, quest.points, &reason)
            .await
        {
            warn!(event_name = "quests.award_failed", quest = %quest.id, %error, "quest reward failed");
            return;
        }

        let congratulations = format!(
            "🏆 *Quest Complete!*\n\nYou've completed the *{}* quest and earned {} points! 🌟",
            quest.name, quest.points
        );
        if let Err(error) = self.chat.send_dm(user_id, &congratulations).await {
            warn!(event_name = "quests.dm_failed", quest = %quest.id, %error, "congratulation DM failed");
        }
    }
}
