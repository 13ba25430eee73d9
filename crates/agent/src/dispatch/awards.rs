//! Admin actions: task lifecycle, award resolution, and the allowance
//! gate. Every path here either talks to the backend after both
//! authorization checks pass, or returns a refusal/clarification without
//! any backend mutation.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use joey_core::ratecard::RateInference;
use joey_core::{check_award_shape, ActionRequest, ActionResult, ApiError, AwardDenied, ErrorKind};

use crate::normalize::{clean_user_id, extract_mention_targets};

use super::{api_failure, extract_task_id, ActionDispatcher};

static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(-?\d+)\s*(?:points?|pts?)\b").expect("amount pattern"));

/// Explicit amount from extracted params, else a numeric-with-unit match
/// on raw text. `None` defers to the rate card.
pub fn resolve_amount(request: &ActionRequest) -> Option<i64> {
    if let Some(points) = request.param_i64("points") {
        return Some(points);
    }
    AMOUNT.captures(&request.raw_text).and_then(|caps| caps[1].parse().ok())
}

/// The free-text reason for an award: extracted param first, else the
/// text after the last " for ", else the whole message.
fn resolve_reason(request: &ActionRequest) -> String {
    if let Some(reason) = request.param_str("reason") {
        return reason.to_owned();
    }
    match request.raw_text.rsplit_once(" for ") {
        Some((_, tail)) if !tail.trim().is_empty() => tail.trim().to_owned(),
        _ => request.raw_text.trim().to_owned(),
    }
}

impl ActionDispatcher {
    /// Admin status is queried per call; the result lives only for this
    /// request. Caching it across requests would let a revoked admin keep
    /// awarding until restart.
    async fn ensure_admin(&self, user_id: &str) -> Result<(), ActionResult> {
        match self.points.get_admin(user_id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ActionResult::failed(
                ErrorKind::Unauthorized,
                "Sorry, that one's for points admins only!",
            )),
            Err(error) => Err(api_failure(error)),
        }
    }

    pub(super) fn refuse_deduction(&self) -> ActionResult {
        ActionResult::failed(ErrorKind::BadRequest, AwardDenied::DeductionDisabled.user_message())
    }

    pub(super) async fn create_task(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        let Some(title) = request.param_str("title") else {
            return ActionResult::clarify("What should the task be called?");
        };
        let Some(points) = resolve_amount(request) else {
            return ActionResult::clarify("How many points should the task be worth?");
        };
        let description = request.param_str("description").unwrap_or("");
        let targets = extract_mention_targets(&request.raw_text, &self.bot_user_id);
        let assignee = targets.first().map(String::as_str);

        match self
            .points
            .create_task(&request.requester_id, title, points, description, assignee)
            .await
        {
            Ok(task) => {
                let assignment = match assignee {
                    Some(user) => format!(" Assigned to <@{user}>."),
                    None => " Open for claims!".to_owned(),
                };
                ActionResult::ok(format!(
                    "Task created! *#{} - {}* ({} pts).{assignment}",
                    task.id, task.title, task.points
                ))
            }
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn approve_task(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        let Some(task_id) = extract_task_id(request) else {
            return ActionResult::clarify("Which task should I approve? Give me the task number.");
        };
        match self.points.approve_task(task_id, &request.requester_id).await {
            Ok(task) => ActionResult::ok(format!(
                "Approved! ✅ Task *#{} - {}*. Points are on their way.",
                task.id, task.title
            )),
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn reject_task(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        let Some(task_id) = extract_task_id(request) else {
            return ActionResult::clarify("Which task should I reject? Give me the task number.");
        };
        let reason = request.param_str("reason").unwrap_or("");
        match self.points.reject_task(task_id, &request.requester_id, reason).await {
            Ok(task) => ActionResult::ok(format!(
                "Rejected task *#{} - {}*. I've let the submitter know.",
                task.id, task.title
            )),
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn award_task(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        let Some(task_id) = extract_task_id(request) else {
            return ActionResult::clarify("Which task is being awarded? Give me the task number.");
        };
        let targets = self.award_targets(request);
        let Some(target) = targets.first() else {
            return ActionResult::clarify("Who completed it? Mention them like `@name`.");
        };
        match self.points.award_task(task_id, &request.requester_id, target).await {
            Ok(task) => ActionResult::ok(format!(
                "Done! Task *#{} - {}* awarded to <@{target}>. 🎉",
                task.id, task.title
            )),
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn allowance_status(&self, request: &ActionRequest) -> ActionResult {
        match self.points.get_admin_allowance(&request.requester_id).await {
            Ok(allowance) => ActionResult::ok(format!(
                "💳 Weekly allowance: {} of {} pts used, {} left. Resets on Monday.",
                allowance.used, allowance.allowance, allowance.remaining
            )),
            Err(ApiError::NotFound) => ActionResult::failed(
                ErrorKind::Unauthorized,
                "You're not a points admin, so there's no weekly allowance here, sorry!",
            ),
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn pending_redemptions(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        match self.points.pending_redemptions(&request.requester_id).await {
            Ok(pending) if pending.is_empty() => {
                ActionResult::ok("No pending reward requests. All caught up! 🎉")
            }
            Ok(pending) => {
                let mut lines = vec!["🎁 *Pending reward requests:*".to_owned()];
                for item in &pending {
                    let who = item
                        .requested_by
                        .as_deref()
                        .map(|user| format!(" from <@{user}>"))
                        .unwrap_or_default();
                    lines.push(format!("• *{}*: {}{who}", item.redemption_id, item.reward_code));
                }
                lines.push("\nSay `approve reward <ID>` to approve one.".to_owned());
                ActionResult::ok(lines.join("\n"))
            }
            Err(error) => api_failure(error),
        }
    }

    pub(super) async fn approve_reward(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }
        let Some(redemption_id) = request
            .param_str("redemption_id")
            .map(str::to_owned)
            .or_else(|| redemption_token(&request.raw_text))
        else {
            return ActionResult::clarify(
                "Which redemption should I approve? Say `pending rewards` to see them.",
            );
        };
        match self.points.approve_reward(&request.requester_id, &redemption_id).await {
            Ok(()) => ActionResult::ok(format!("Approved redemption *{redemption_id}*. 🎉")),
            Err(error) => api_failure(error),
        }
    }

    fn award_targets(&self, request: &ActionRequest) -> Vec<String> {
        let targets = extract_mention_targets(&request.raw_text, &self.bot_user_id);
        if !targets.is_empty() {
            return targets;
        }
        request
            .param_str("target_user")
            .map(clean_user_id)
            .filter(|id| id != &self.bot_user_id)
            .into_iter()
            .collect()
    }

    pub(super) async fn award_points_flow(&self, request: &ActionRequest) -> ActionResult {
        if let Err(refusal) = self.ensure_admin(&request.requester_id).await {
            return refusal;
        }

        let targets = self.award_targets(request);
        if targets.is_empty() {
            return ActionResult::clarify(
                "Who should I award points to? Mention them like `@name`.",
            );
        }

        let reason = resolve_reason(request);
        let Some(points) = resolve_amount(request) else {
            return self.propose_from_rate_card(&reason).await;
        };

        for target in &targets {
            if let Err(denied) = check_award_shape(&request.requester_id, target, points) {
                let kind = match denied {
                    AwardDenied::DeductionDisabled => ErrorKind::BadRequest,
                    _ => ErrorKind::Unauthorized,
                };
                return ActionResult::failed(kind, denied.user_message());
            }
        }

        // Re-fetched on every attempt: a cached allowance across requests
        // would let concurrent awards both pass the same budget.
        let allowance = match self.points.get_admin_allowance(&request.requester_id).await {
            Ok(allowance) => allowance,
            Err(ApiError::NotFound) => {
                return ActionResult::failed(
                    ErrorKind::Unauthorized,
                    "You're not a points admin, sorry!",
                )
            }
            Err(error) => return api_failure(error),
        };
        let total = points * targets.len() as i64;
        if let Err(denied) = allowance.check(total) {
            return ActionResult::failed(ErrorKind::QuotaExceeded, denied.user_message());
        }

        let mut lines = Vec::new();
        for target in &targets {
            self.ensure_target_linked(target).await;
            match self.points.award_points(&request.requester_id, target, points, &reason).await {
                Ok(receipt) => {
                    info!(
                        event_name = "agent.award.granted",
                        admin = %request.requester_id,
                        target = %target,
                        points,
                        "points awarded"
                    );
                    let balance_note = receipt
                        .new_balance
                        .map(|balance| format!(" (new balance: {balance})"))
                        .unwrap_or_default();
                    lines.push(format!(
                        "🎉 Awarded *{points} points* to <@{target}> for \"{reason}\"!{balance_note}"
                    ));
                }
                Err(error) => {
                    lines.push(format!(
                        "Couldn't award <@{target}>: {}",
                        error.user_message()
                    ));
                    return ActionResult {
                        success: false,
                        message: lines.join("\n"),
                        data: None,
                        error_kind: Some(error.kind()),
                    };
                }
            }
        }
        ActionResult::ok(lines.join("\n"))
    }

    /// Best-effort account linking before an award: an unknown chat
    /// identity gets matched to a backend account by email. Failures are
    /// logged and the award proceeds; the backend re-validates anyway.
    async fn ensure_target_linked(&self, target_id: &str) {
        match self.points.get_user_by_slack_id(target_id).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(error) => {
                warn!(event_name = "agent.award.link_lookup_failed", target = %target_id, %error, "link lookup failed");
                return;
            }
        }

        let email = match self.chat.lookup_user(target_id).await {
            Ok(profile) => profile.email,
            Err(error) => {
                warn!(event_name = "agent.award.email_lookup_failed", target = %target_id, %error, "email lookup failed");
                None
            }
        };
        let Some(email) = email else {
            debug!(event_name = "agent.award.no_email", target = %target_id, "no email to link with");
            return;
        };

        match self.points.link_slack_user(target_id, &email).await {
            Ok(Some(user_id)) => {
                info!(event_name = "agent.award.linked", target = %target_id, user_id, "chat identity linked");
            }
            Ok(None) => {
                debug!(event_name = "agent.award.no_account", target = %target_id, "no backend account for email");
            }
            Err(error) => {
                warn!(event_name = "agent.award.link_failed", target = %target_id, %error, "linking failed");
            }
        }
    }

    /// No explicit amount anywhere: consult the rate card and propose.
    /// This path never awards: even a confident match comes back as a
    /// confirmation question.
    async fn propose_from_rate_card(&self, reason: &str) -> ActionResult {
        let entries = self.points.get_rate_card().await.unwrap_or_default();
        match joey_core::infer_points(reason, &entries) {
            RateInference::Confident(scored) => ActionResult::clarify(format!(
                "Looks like *{}*, that's *{} points* on the rate card. Want me to go ahead? \
                 Just say `award @them {} points for {}` to confirm.",
                scored.entry.name, scored.entry.points, scored.entry.points, reason
            )),
            RateInference::Ambiguous(options) => {
                let names = options
                    .iter()
                    .map(|scored| format!("*{}* ({} pts)", scored.entry.name, scored.entry.points))
                    .collect::<Vec<_>>()
                    .join(", ");
                ActionResult::clarify(format!(
                    "That could be a few things on the rate card: {names}. \
                     Which one did you mean, or how many points?"
                ))
            }
            RateInference::NoMatch => {
                ActionResult::clarify("How many points? I couldn't match that to the rate card.")
            }
        }
    }
}

fn redemption_token(raw_text: &str) -> Option<String> {
    static REDEMPTION: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b([A-Za-z]+-\d+|\d+)\b").expect("redemption pattern"));
    REDEMPTION.captures(raw_text).map(|caps| caps[1].to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use joey_core::config::BotConfig;
    use joey_core::{ActionRequest, AdminAllowance, ErrorKind, RateCardEntry};

    use super::super::ActionDispatcher;
    use super::resolve_amount;
    use crate::testutil::{StubChat, StubPoints};

    fn request_with_text(text: &str) -> ActionRequest {
        let mut request = ActionRequest::new("community-points", "ADMIN");
        request.raw_text = text.to_owned();
        request
    }

    fn dispatcher(points: Arc<StubPoints>) -> ActionDispatcher {
        ActionDispatcher::new(
            points,
            Arc::new(StubChat::default()),
            BotConfig { timezone_offset_minutes: 600 },
            "BOT1",
        )
    }

    fn admin_points() -> StubPoints {
        StubPoints {
            admin_ids: vec!["ADMIN".to_owned()],
            allowance: Some(AdminAllowance { allowance: 50, used: 10, remaining: 40 }),
            ..StubPoints::default()
        }
    }

    #[test]
    fn explicit_param_beats_text_scan() {
        let mut request = request_with_text("award <@U2> 99 points");
        request.params.insert("points".into(), json!(10));
        assert_eq!(resolve_amount(&request), Some(10));
    }

    #[test]
    fn text_amount_requires_a_unit() {
        assert_eq!(resolve_amount(&request_with_text("award <@U2> 15 points")), Some(15));
        assert_eq!(resolve_amount(&request_with_text("award <@U2> 15pts")), Some(15));
        assert_eq!(resolve_amount(&request_with_text("award <@U2> for task 15")), None);
    }

    #[test]
    fn no_amount_anywhere_is_none() {
        assert_eq!(resolve_amount(&request_with_text("award <@U2> for newsletter")), None);
    }

    #[tokio::test]
    async fn non_admin_award_is_unauthorized_without_backend_call() {
        let points = Arc::new(StubPoints::default());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 10 points"))
            .await;

        assert_eq!(result.error_kind, Some(ErrorKind::Unauthorized));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_allowance_blocks_any_positive_award() {
        let points = Arc::new(StubPoints {
            allowance: Some(AdminAllowance { allowance: 50, used: 50, remaining: 0 }),
            ..admin_points()
        });
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 1 point"))
            .await;

        assert_eq!(result.error_kind, Some(ErrorKind::QuotaExceeded));
        assert!(result.message.contains("weekly allowance"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn oversized_award_is_rejected_with_remaining_quota_in_message() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 45 points"))
            .await;

        assert_eq!(result.error_kind, Some(ErrorKind::QuotaExceeded));
        assert!(result.message.contains("40"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn self_award_is_rejected_independent_of_allowance() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@ADMIN> 5 points"))
            .await;

        assert!(!result.success);
        assert!(result.message.contains("yourself"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn negative_amount_is_refused_as_deduction() {
        let points = Arc::new(admin_points());
        let mut request = request_with_text("award <@U2>");
        request.params.insert("points".into(), json!(-5));
        let result = dispatcher(Arc::clone(&points)).award_points_flow(&request).await;

        assert!(!result.success);
        assert!(result.message.contains("Point deductions are disabled"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn missing_target_asks_who() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award 10 points for being great"))
            .await;

        assert!(result.is_clarification());
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn rate_card_inference_proposes_without_awarding() {
        let points = Arc::new(StubPoints {
            rate_card: vec![RateCardEntry {
                alias: "newsletter".to_owned(),
                name: "Weekly Newsletter".to_owned(),
                points: 10,
                description: "Writing the weekly newsletter".to_owned(),
            }],
            ..admin_points()
        });
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> for newsletter"))
            .await;

        assert!(result.is_clarification());
        assert!(result.message.contains("10"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn empty_rate_card_asks_for_an_amount() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> for unknown thing"))
            .await;

        assert!(result.is_clarification());
        assert!(result.message.contains("How many points?"));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn successful_award_reaches_backend_with_resolved_fields() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 10 points for the newsletter"))
            .await;

        assert!(result.success, "unexpected failure: {}", result.message);
        let calls = points.award_calls.lock().expect("calls").clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].admin_id, "ADMIN");
        assert_eq!(calls[0].target_id, "U2");
        assert_eq!(calls[0].points, 10);
        assert_eq!(calls[0].reason, "the newsletter");
    }

    #[tokio::test]
    async fn unknown_target_gets_linked_by_email_before_award() {
        let points = Arc::new(admin_points());
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 10 points for the newsletter"))
            .await;

        assert!(result.success);
        let links = points.link_calls.lock().expect("links").clone();
        assert_eq!(links, vec![("U2".to_owned(), "member@example.test".to_owned())]);
        assert_eq!(points.award_call_count(), 1);
    }

    #[tokio::test]
    async fn already_linked_target_skips_the_email_lookup() {
        let points = Arc::new(admin_points());
        points.linked_users.lock().expect("linked").insert("U2".to_owned());
        dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> 10 points"))
            .await;

        assert!(points.link_calls.lock().expect("links").is_empty());
        assert_eq!(points.award_call_count(), 1);
    }

    #[tokio::test]
    async fn multi_target_award_checks_the_combined_total() {
        let points = Arc::new(StubPoints {
            allowance: Some(AdminAllowance { allowance: 50, used: 35, remaining: 15 }),
            ..admin_points()
        });
        // Two targets at 10 points each needs 20, only 15 remain.
        let result = dispatcher(Arc::clone(&points))
            .award_points_flow(&request_with_text("award <@U2> <@U3> 10 points"))
            .await;

        assert_eq!(result.error_kind, Some(ErrorKind::QuotaExceeded));
        assert_eq!(points.award_call_count(), 0);
    }

    #[tokio::test]
    async fn deduction_action_is_refused_before_any_lookup() {
        let points = Arc::new(StubPoints::default());
        let result = dispatcher(Arc::clone(&points)).refuse_deduction();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::BadRequest));
        assert!(result.message.contains("Only positive awards"));
    }
}
