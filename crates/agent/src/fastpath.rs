use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use joey_core::api::PointsApi;
use joey_core::config::BotConfig;
use joey_core::{ActionResult, ErrorKind};

use crate::format;

/// High-frequency commands answered with zero model calls. Ordered;
/// first match wins. Matches are whole-string and case-insensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastCommand {
    Balance,
    ListEarnTasks,
    ListRewards,
    BookCoworkingToday,
    CancelCoworkingToday,
}

static FAST_TABLE: Lazy<Vec<(Regex, FastCommand)>> = Lazy::new(|| {
    let entry = |pattern: &str, command| {
        (Regex::new(&format!("(?i)^(?:{pattern})$")).expect("fast path pattern"), command)
    };
    vec![
        entry(r"points|balance|my points", FastCommand::Balance),
        entry(r"points\s+earn|earn\s+points|tasks|ways\s+to\s+earn", FastCommand::ListEarnTasks),
        entry(r"points\s+rewards|rewards", FastCommand::ListRewards),
        entry(r"coworking\s+book\s+today", FastCommand::BookCoworkingToday),
        entry(r"coworking\s+cancel", FastCommand::CancelCoworkingToday),
    ]
});

pub fn match_fast_command(text: &str) -> Option<FastCommand> {
    let text = text.trim();
    FAST_TABLE.iter().find(|(pattern, _)| pattern.is_match(text)).map(|(_, command)| *command)
}

pub struct FastPath {
    points: Arc<dyn PointsApi>,
    bot: BotConfig,
}

impl FastPath {
    pub fn new(points: Arc<dyn PointsApi>, bot: BotConfig) -> Self {
        Self { points, bot }
    }

    /// Returns `None` when the text is not a fast-path command. On a hit
    /// there is no further fallback, so any backend error degrades to an
    /// apologetic result instead of propagating.
    pub async fn try_execute(
        &self,
        text: &str,
        user_id: &str,
        channel_id: Option<&str>,
    ) -> Option<ActionResult> {
        let command = match_fast_command(text)?;
        Some(match self.execute(command, user_id, channel_id).await {
            Ok(result) => result,
            Err(error) => {
                warn!(event_name = "agent.fast_path.degraded", %error, "fast path backend call failed");
                ActionResult::failed(ErrorKind::UpstreamUnavailable, format::upstream_apology())
            }
        })
    }

    async fn execute(
        &self,
        command: FastCommand,
        user_id: &str,
        channel_id: Option<&str>,
    ) -> Result<ActionResult, joey_core::ApiError> {
        match command {
            FastCommand::Balance => {
                let balance = self.points.get_balance(user_id).await?;
                Ok(ActionResult::ok(format::balance_message(&balance)))
            }
            FastCommand::ListEarnTasks => {
                let tasks = self.points.list_tasks(Some("open")).await?;
                Ok(ActionResult::ok(format::task_list_message(&tasks)))
            }
            FastCommand::ListRewards => {
                let rewards = self.points.list_rewards(Some(user_id)).await?;
                Ok(ActionResult::ok(format::reward_list_message(&rewards)))
            }
            FastCommand::BookCoworkingToday => {
                let today = self.bot.today().to_string();
                let receipt = self.points.book_coworking(user_id, &today, channel_id).await?;
                Ok(ActionResult::ok(format::booking_message(&today, receipt.points_cost)))
            }
            FastCommand::CancelCoworkingToday => {
                let today = self.bot.today().to_string();
                let receipt = self.points.cancel_coworking(user_id, &today).await?;
                Ok(ActionResult::ok(format::cancellation_message(&today, &receipt)))
            }
        }
    }
}
