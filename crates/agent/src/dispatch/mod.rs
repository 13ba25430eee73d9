mod awards;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use joey_core::api::{ChatApi, PointsApi};
use joey_core::config::BotConfig;
use joey_core::skill::Skill;
use joey_core::{ActionRequest, ActionResult, ApiError};

use crate::executor::SkillHandler;
use crate::format;

pub use awards::resolve_amount;

/// Every action the dispatcher knows how to execute directly. Anything
/// that doesn't resolve to one of these takes the generic model-driven
/// path instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanonicalAction {
    // Member actions: requester identity only.
    Balance,
    History,
    ListTasks,
    ClaimTask,
    SubmitTask,
    CheckCoworking,
    BookCoworking,
    CancelCoworking,
    ListRewards,
    RequestReward,
    // Admin actions: authorization required.
    CreateTask,
    ApproveTask,
    RejectTask,
    AwardTask,
    AwardPoints,
    DeductPoints,
    AllowanceStatus,
    PendingRedemptions,
    ApproveReward,
}

/// Deterministic resolution: explicit extracted action through the alias
/// table first, then ordered keyword rules over raw text, else none.
pub fn resolve_action(request: &ActionRequest) -> Option<CanonicalAction> {
    let explicit = request.action.as_deref().or_else(|| request.param_str("action"));
    if let Some(explicit) = explicit {
        if let Some(action) = resolve_alias(explicit, request) {
            return Some(action);
        }
    }
    resolve_keywords(&request.raw_text)
}

/// Collapse known mis-extractions to canonical names. A bare `book` is
/// always the coworking booking; a bare `create`/`task` is task creation
/// only when a title or the word "create" corroborates it.
fn resolve_alias(explicit: &str, request: &ActionRequest) -> Option<CanonicalAction> {
    let normalized = explicit.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    use CanonicalAction::*;
    match normalized.as_str() {
        "balance" | "get_balance" | "check_balance" | "my_points" => Some(Balance),
        "history" | "get_history" | "ledger" => Some(History),
        "list_tasks" | "tasks" | "open_tasks" | "earn" => Some(ListTasks),
        "claim" | "claim_task" => Some(ClaimTask),
        "submit" | "submit_task" => Some(SubmitTask),
        "check_coworking" | "coworking_availability" | "availability" => Some(CheckCoworking),
        "book" | "book_coworking" => Some(BookCoworking),
        "cancel" | "cancel_coworking" | "cancel_booking" => Some(CancelCoworking),
        "list_rewards" | "rewards" => Some(ListRewards),
        "request_reward" | "redeem" | "buy_reward" => Some(RequestReward),
        "create_task" | "new_task" => Some(CreateTask),
        "create" | "task" => {
            let corroborated = request.param_str("title").is_some()
                || request.raw_text.to_ascii_lowercase().contains("create");
            corroborated.then_some(CreateTask)
        }
        "approve" | "approve_task" => Some(ApproveTask),
        "reject" | "reject_task" => Some(RejectTask),
        "award_task" => Some(AwardTask),
        "award" | "award_points" | "give_points" | "reward_points" | "reward_user" => {
            Some(AwardPoints)
        }
        "deduct" | "deduct_points" | "remove_points" => Some(DeductPoints),
        "allowance" | "admin_allowance" => Some(AllowanceStatus),
        "pending_redemptions" | "pending_rewards" => Some(PendingRedemptions),
        "approve_reward" | "approve_redemption" => Some(ApproveReward),
        _ => None,
    }
}

/// Ordered keyword rules; each rule is a disjunction of substrings and
/// the first matching rule wins. Order is load-bearing: cancel before
/// book ("cancel my booking"), approve-reward before approve-task,
/// award before the balance catch-all.
const KEYWORD_RULES: &[(CanonicalAction, &[&str])] = &[
    (CanonicalAction::CreateTask, &["create task", "create a task", "new task", "add a task"]),
    (CanonicalAction::ApproveReward, &["approve reward", "approve redemption"]),
    (CanonicalAction::PendingRedemptions, &["pending redemptions", "pending rewards"]),
    (CanonicalAction::ApproveTask, &["approve"]),
    (CanonicalAction::RejectTask, &["reject"]),
    (CanonicalAction::DeductPoints, &["deduct", "remove points", "take away"]),
    (CanonicalAction::AllowanceStatus, &["allowance", "how much can i give"]),
    (CanonicalAction::RequestReward, &["redeem", "buy "]),
    (CanonicalAction::AwardPoints, &["award ", "reward ", "give ", "send points"]),
    (CanonicalAction::ClaimTask, &["claim"]),
    (CanonicalAction::SubmitTask, &["submit"]),
    (CanonicalAction::CheckCoworking, &["availability", "available", "free spots"]),
    (CanonicalAction::CancelCoworking, &["cancel"]),
    (CanonicalAction::BookCoworking, &["book"]),
    (CanonicalAction::History, &["history", "ledger", "transactions"]),
    (CanonicalAction::ListRewards, &["rewards"]),
    (CanonicalAction::ListTasks, &["tasks", "ways to earn", "earn"]),
    (CanonicalAction::Balance, &["balance", "my points", "points"]),
];

fn resolve_keywords(raw_text: &str) -> Option<CanonicalAction> {
    let text = raw_text.to_ascii_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| text.contains(needle)))
        .map(|(action, _)| *action)
}

static TASK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("task id pattern"));

fn extract_task_id(request: &ActionRequest) -> Option<i64> {
    if let Some(id) = request.param_i64("task_id") {
        return Some(id);
    }
    TASK_ID.captures(&request.raw_text).and_then(|caps| caps[1].parse().ok())
}

fn api_failure(error: ApiError) -> ActionResult {
    ActionResult::failed(error.kind(), error.user_message())
}

/// Executes canonical actions against the backend. Holds the bot's own
/// identity so award-target scanning can exclude it, and the chat client
/// for the email lookup behind target linking.
pub struct ActionDispatcher {
    points: Arc<dyn PointsApi>,
    chat: Arc<dyn ChatApi>,
    bot: BotConfig,
    bot_user_id: String,
}

impl ActionDispatcher {
    pub fn new(
        points: Arc<dyn PointsApi>,
        chat: Arc<dyn ChatApi>,
        bot: BotConfig,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self { points, chat, bot, bot_user_id: bot_user_id.into() }
    }

    /// `None` means no canonical action resolved; the caller falls back
    /// to the generic model-driven path.
    pub async fn dispatch(&self, request: &ActionRequest) -> Option<ActionResult> {
        let action = resolve_action(request)?;
        Some(self.execute(action, request).await)
    }

    async fn execute(&self, action: CanonicalAction, request: &ActionRequest) -> ActionResult {
        use CanonicalAction::*;
        match action {
            Balance => self.balance(request).await,
            History => self.history(request).await,
            ListTasks => self.list_tasks().await,
            ClaimTask => self.claim_task(request).await,
            SubmitTask => self.submit_task(request).await,
            CheckCoworking => self.check_coworking().await,
            BookCoworking => self.book_coworking(request).await,
            CancelCoworking => self.cancel_coworking(request).await,
            ListRewards => self.list_rewards(request).await,
            RequestReward => self.request_reward(request).await,
            CreateTask => self.create_task(request).await,
            ApproveTask => self.approve_task(request).await,
            RejectTask => self.reject_task(request).await,
            AwardTask => self.award_task(request).await,
            AwardPoints => self.award_points_flow(request).await,
            DeductPoints => self.refuse_deduction(),
            AllowanceStatus => self.allowance_status(request).await,
            PendingRedemptions => self.pending_redemptions(request).await,
            ApproveReward => self.approve_reward(request).await,
        }
    }

    async fn balance(&self, request: &ActionRequest) -> ActionResult {
        match self.points.get_balance(&request.requester_id).await {
            Ok(balance) => ActionResult::ok(format::balance_message(&balance)),
            Err(error) => api_failure(error),
        }
    }

    async fn history(&self, request: &ActionRequest) -> ActionResult {
        match self.points.get_history(&request.requester_id, 10).await {
            Ok(entries) => ActionResult::ok(format::history_message(&entries)),
            Err(error) => api_failure(error),
        }
    }

    async fn list_tasks(&self) -> ActionResult {
        match self.points.list_tasks(Some("open")).await {
            Ok(tasks) => ActionResult::ok(format::task_list_message(&tasks)),
            Err(error) => api_failure(error),
        }
    }

    async fn claim_task(&self, request: &ActionRequest) -> ActionResult {
        let Some(task_id) = extract_task_id(request) else {
            return ActionResult::clarify(
                "Which task would you like to claim? Say `tasks` to see what's open.",
            );
        };
        match self.points.claim_task(task_id, &request.requester_id).await {
            Ok(task) => ActionResult::ok(format!(
                "You're on it! 💪 Task *#{} - {}* ({} pts) is yours. When you're done, say \
                 `@Joey submit task {}`.",
                task.id, task.title, task.points, task.id
            )),
            Err(error) => api_failure(error),
        }
    }

    async fn submit_task(&self, request: &ActionRequest) -> ActionResult {
        let Some(task_id) = extract_task_id(request) else {
            return ActionResult::clarify("Which task are you submitting? Give me the task number.");
        };
        let submission = request
            .param_str("submission")
            .or_else(|| request.param_str("notes"))
            .unwrap_or(&request.raw_text);
        match self.points.submit_task(task_id, &request.requester_id, submission).await {
            Ok(task) => ActionResult::ok(format!(
                "Beauty! Your submission for task *#{} - {}* is in. An admin will review it soon. 🤞",
                task.id, task.title
            )),
            Err(error) => api_failure(error),
        }
    }

    async fn check_coworking(&self) -> ActionResult {
        match self.points.check_coworking(7).await {
            Ok(days) => ActionResult::ok(format::availability_message(&days)),
            Err(error) => api_failure(error),
        }
    }

    fn requested_date(&self, request: &ActionRequest) -> String {
        if let Some(date) = request.param_str("date") {
            return date.to_owned();
        }
        let today = self.bot.today();
        if request.raw_text.to_ascii_lowercase().contains("tomorrow") {
            (today + chrono::Days::new(1)).to_string()
        } else {
            today.to_string()
        }
    }

    async fn book_coworking(&self, request: &ActionRequest) -> ActionResult {
        let date = self.requested_date(request);
        match self
            .points
            .book_coworking(&request.requester_id, &date, request.channel_id.as_deref())
            .await
        {
            Ok(receipt) => ActionResult::ok(format::booking_message(&date, receipt.points_cost)),
            Err(error) => api_failure(error),
        }
    }

    async fn cancel_coworking(&self, request: &ActionRequest) -> ActionResult {
        let date = self.requested_date(request);
        match self.points.cancel_coworking(&request.requester_id, &date).await {
            Ok(receipt) => ActionResult::ok(format::cancellation_message(&date, &receipt)),
            Err(error) => api_failure(error),
        }
    }

    async fn list_rewards(&self, request: &ActionRequest) -> ActionResult {
        match self.points.list_rewards(Some(&request.requester_id)).await {
            Ok(rewards) => ActionResult::ok(format::reward_list_message(&rewards)),
            Err(error) => api_failure(error),
        }
    }

    async fn request_reward(&self, request: &ActionRequest) -> ActionResult {
        let Some(code) = request.param_str("reward_code") else {
            return ActionResult::clarify(
                "Which reward would you like? Say `rewards` to see the menu.",
            );
        };
        match self.points.request_reward(&request.requester_id, code, 1).await {
            Ok(()) => ActionResult::ok(format!(
                "Done! Requested *{code}*. An admin will sort it out shortly. 🎁"
            )),
            Err(error) => api_failure(error),
        }
    }
}

/// The dispatcher is the native handler for the points skill: it handles
/// what resolves to a canonical action and defers the rest to the
/// generic model-driven path.
#[async_trait]
impl SkillHandler for ActionDispatcher {
    async fn execute(&self, _skill: &Skill, request: &ActionRequest) -> Option<ActionResult> {
        self.dispatch(request).await
    }
}
