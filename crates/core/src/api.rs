//! Collaborator contracts. The core never speaks HTTP itself: the backend
//! points service, the job service, and the chat platform are reached
//! through these traits, with reqwest adapters living in `joey-clients`
//! and `joey-slack`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::allowance::AdminAllowance;
use crate::errors::ApiError;
use crate::ratecard::RateCardEntry;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: i64,
    #[serde(default)]
    pub lifetime_earned: i64,
    #[serde(default)]
    pub lifetime_spent: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub points: i64,
    pub reason: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: i64,
    pub title: String,
    pub points: i64,
    #[serde(default)]
    pub portfolio: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    pub code: String,
    pub name: String,
    pub cost_points: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoworkingDay {
    pub date: String,
    #[serde(default)]
    pub spots_available: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    #[serde(default = "default_booking_cost")]
    pub points_cost: i64,
}

fn default_booking_cost() -> i64 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationReceipt {
    #[serde(default)]
    pub refund_amount: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardReceipt {
    #[serde(default)]
    pub new_balance: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub slack_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub redemption_id: String,
    pub reward_code: String,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Backend points/tasks/rewards/coworking/admin surface. Every method may
/// fail with any `ApiError` variant; the dispatcher owns turning those
/// into user-facing copy.
#[async_trait]
pub trait PointsApi: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> Result<Balance, ApiError>;
    async fn get_history(&self, user_id: &str, limit: usize) -> Result<Vec<LedgerEntry>, ApiError>;

    async fn list_tasks(&self, status: Option<&str>) -> Result<Vec<TaskSummary>, ApiError>;
    async fn claim_task(&self, task_id: i64, user_id: &str) -> Result<TaskSummary, ApiError>;
    async fn submit_task(
        &self,
        task_id: i64,
        user_id: &str,
        submission_text: &str,
    ) -> Result<TaskSummary, ApiError>;
    async fn create_task(
        &self,
        admin_id: &str,
        title: &str,
        points: i64,
        description: &str,
        assignee: Option<&str>,
    ) -> Result<TaskSummary, ApiError>;
    async fn approve_task(&self, task_id: i64, admin_id: &str) -> Result<TaskSummary, ApiError>;
    async fn reject_task(
        &self,
        task_id: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<TaskSummary, ApiError>;
    /// Claim + approve in one step, crediting the target directly.
    async fn award_task(
        &self,
        task_id: i64,
        admin_id: &str,
        target_id: &str,
    ) -> Result<TaskSummary, ApiError>;

    /// Raw award call. Authorization, allowance, and self-award policy run
    /// in the dispatcher before this is reached; the backend re-validates
    /// server-side.
    async fn award_points(
        &self,
        admin_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError>;
    /// Automated award with the bot as the acting identity (quest rewards).
    /// Skips the client-side admin pre-flight by contract.
    async fn system_award_points(
        &self,
        acting_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError>;

    async fn check_coworking(&self, days: u32) -> Result<Vec<CoworkingDay>, ApiError>;
    async fn book_coworking(
        &self,
        user_id: &str,
        date: &str,
        channel_id: Option<&str>,
    ) -> Result<BookingReceipt, ApiError>;
    async fn cancel_coworking(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<CancellationReceipt, ApiError>;

    async fn list_rewards(&self, user_id: Option<&str>) -> Result<Vec<RewardItem>, ApiError>;
    async fn request_reward(
        &self,
        user_id: &str,
        reward_code: &str,
        quantity: u32,
    ) -> Result<(), ApiError>;
    async fn pending_redemptions(
        &self,
        admin_id: &str,
    ) -> Result<Vec<RedemptionRequest>, ApiError>;
    async fn approve_reward(&self, admin_id: &str, redemption_id: &str) -> Result<(), ApiError>;

    /// Fresh snapshot per call; prices may change between messages.
    async fn get_rate_card(&self) -> Result<Vec<RateCardEntry>, ApiError>;
    /// `Ok(None)` means the user is not an admin (backend 404).
    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminProfile>, ApiError>;
    async fn get_admin_allowance(&self, user_id: &str) -> Result<AdminAllowance, ApiError>;

    async fn has_posted_in_channel(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<bool, ApiError>;
    async fn record_channel_post(&self, user_id: &str, channel_id: &str) -> Result<(), ApiError>;

    /// Backend account ID for a chat identity, `None` when unlinked.
    async fn get_user_by_slack_id(&self, slack_id: &str) -> Result<Option<i64>, ApiError>;
    /// Link a chat identity to an existing backend account by email.
    /// `None` when no account matches.
    async fn link_slack_user(&self, slack_id: &str, email: &str)
        -> Result<Option<i64>, ApiError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub domain: String,
    pub topic: String,
    pub target_keyword: String,
    pub context: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub pr_url: Option<String>,
}

/// Long-running generation job service.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn start_generation(&self, request: &GenerationRequest) -> Result<String, ApiError>;
    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ApiError>;
    async fn result(&self, job_id: &str) -> Result<Value, ApiError>;
    async fn publish(&self, job_id: &str) -> Result<PublishReceipt, ApiError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Chat platform surface. Failures here are non-fatal everywhere: callers
/// log and continue.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_id: Option<&str>,
    ) -> Result<(), ApiError>;
    async fn send_dm(&self, user_id: &str, text: &str) -> Result<(), ApiError>;
    async fn bot_user_id(&self) -> Result<String, ApiError>;
    async fn lookup_user(&self, user_id: &str) -> Result<UserProfile, ApiError>;
    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, ApiError>;
}
