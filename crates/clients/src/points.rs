use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use joey_core::api::{
    AdminProfile, AwardReceipt, Balance, BookingReceipt, CancellationReceipt, CoworkingDay,
    LedgerEntry, PointsApi, RedemptionRequest, RewardItem, TaskSummary,
};
use joey_core::config::{BackendConfig, BotConfig};
use joey_core::{AdminAllowance, ApiError, RateCardEntry};

/// HTTP adapter for the community backend's points surface. Maps the
/// backend's 404/403/400 responses onto the `ApiError` taxonomy so the
/// dispatcher can produce distinct user-facing copy per class.
pub struct PointsHttpClient {
    http: reqwest::Client,
    base: String,
    root: String,
    api_key: Option<SecretString>,
    internal_api_key: Option<SecretString>,
    bot: BotConfig,
}

impl PointsHttpClient {
    pub fn new(config: &BackendConfig, bot: BotConfig) -> Self {
        let root = config.base_url.trim_end_matches('/').to_owned();
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base: format!("{root}/api/v1/points"),
            root,
            api_key: config.api_key.clone(),
            internal_api_key: config.internal_api_key.clone(),
            bot,
        }
    }

    fn member_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    /// Admin calls prefer the internal key but fall back to the member
    /// key so single-key deployments still authenticate.
    fn admin_key(&self) -> Option<&SecretString> {
        self.internal_api_key.as_ref().or(self.api_key.as_ref())
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: String,
        key: Option<&SecretString>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key.expose_secret());
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response =
            builder.send().await.map_err(|error| ApiError::Upstream(error.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|error| ApiError::Upstream(error.to_string()));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(map_error(status, &body))
    }

    async fn send_ignoring_body(&self, builder: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response =
            builder.send().await.map_err(|error| ApiError::Upstream(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(map_error(status, &body))
    }
}

fn map_error(status: reqwest::StatusCode, body: &Value) -> ApiError {
    use reqwest::StatusCode;
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::BAD_REQUEST => {
            let reason = ["error", "detail", "message"]
                .iter()
                .find_map(|key| body.get(key).and_then(Value::as_str))
                .unwrap_or("invalid request")
                .to_owned();
            ApiError::BadRequest(reason)
        }
        other => ApiError::Upstream(format!("backend returned {other}")),
    }
}

#[async_trait]
impl PointsApi for PointsHttpClient {
    async fn get_balance(&self, user_id: &str) -> Result<Balance, ApiError> {
        let url = format!("{}/users/{user_id}/balance/", self.base);
        self.send(self.request(reqwest::Method::GET, url, self.member_key())).await
    }

    async fn get_history(&self, user_id: &str, limit: usize) -> Result<Vec<LedgerEntry>, ApiError> {
        let url = format!("{}/ledger/", self.base);
        let builder = self
            .request(reqwest::Method::GET, url, self.member_key())
            .query(&[("slack_user_id", user_id)]);
        let mut entries: Vec<LedgerEntry> = self.send(builder).await?;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_tasks(&self, status: Option<&str>) -> Result<Vec<TaskSummary>, ApiError> {
        let url = format!("{}/tasks/", self.base);
        let mut builder = self.request(reqwest::Method::GET, url, self.member_key());
        if let Some(status) = status {
            builder = builder.query(&[("status", status)]);
        }
        self.send(builder).await
    }

    async fn claim_task(&self, task_id: i64, user_id: &str) -> Result<TaskSummary, ApiError> {
        let url = format!("{}/tasks/{task_id}/claim/", self.base);
        let builder = self
            .request(reqwest::Method::POST, url, self.member_key())
            .json(&json!({ "slack_user_id": user_id }));
        self.send(builder).await
    }

    async fn submit_task(
        &self,
        task_id: i64,
        user_id: &str,
        submission_text: &str,
    ) -> Result<TaskSummary, ApiError> {
        let url = format!("{}/tasks/{task_id}/submit/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.member_key()).json(&json!({
            "slack_user_id": user_id,
            "submission_text": submission_text,
        }));
        self.send(builder).await
    }

    async fn create_task(
        &self,
        admin_id: &str,
        title: &str,
        points: i64,
        description: &str,
        assignee: Option<&str>,
    ) -> Result<TaskSummary, ApiError> {
        let mut payload = json!({
            "title": title,
            "points": points,
            "description": description,
            "created_by_user_id": admin_id,
            "status": "open",
        });
        if let Some(assignee) = assignee {
            payload["assigned_to_user_id"] = json!(assignee);
            payload["status"] = json!("claimed");
        }
        let url = format!("{}/tasks/", self.base);
        self.send(self.request(reqwest::Method::POST, url, self.admin_key()).json(&payload)).await
    }

    async fn approve_task(&self, task_id: i64, admin_id: &str) -> Result<TaskSummary, ApiError> {
        let url = format!("{}/tasks/{task_id}/approve/", self.base);
        let builder = self
            .request(reqwest::Method::POST, url, self.admin_key())
            .json(&json!({ "slack_user_id": admin_id }));
        self.send(builder).await
    }

    async fn reject_task(
        &self,
        task_id: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<TaskSummary, ApiError> {
        let url = format!("{}/tasks/{task_id}/reject/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "slack_user_id": admin_id,
            "reason": reason,
        }));
        self.send(builder).await
    }

    async fn award_task(
        &self,
        task_id: i64,
        admin_id: &str,
        target_id: &str,
    ) -> Result<TaskSummary, ApiError> {
        let url = format!("{}/tasks/{task_id}/award/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "created_by_user_id": admin_id,
            "assigned_to_user_id": target_id,
        }));
        self.send(builder).await
    }

    async fn award_points(
        &self,
        admin_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError> {
        let url = format!("{}/admin/award/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "admin_slack_id": admin_id,
            "target_slack_id": target_id,
            "points": points,
            "reason": reason,
        }));
        self.send(builder).await
    }

    async fn system_award_points(
        &self,
        acting_id: &str,
        target_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<AwardReceipt, ApiError> {
        // Same endpoint as manual awards; the backend recognizes the
        // internal key and waives the per-admin allowance.
        self.award_points(acting_id, target_id, points, reason).await
    }

    async fn check_coworking(&self, days: u32) -> Result<Vec<CoworkingDay>, ApiError> {
        let url = format!("{}/coworking/availability/", self.base);
        let builder = self
            .request(reqwest::Method::GET, url, self.member_key())
            .query(&[("days", days.to_string())]);
        self.send(builder).await
    }

    async fn book_coworking(
        &self,
        user_id: &str,
        date: &str,
        channel_id: Option<&str>,
    ) -> Result<BookingReceipt, ApiError> {
        // The server's local clock (in the configured zone) rides along
        // so the backend can validate same-day cutoffs.
        let current_time = Utc::now().with_timezone(&self.bot.timezone()).to_rfc3339();
        let mut payload = json!({
            "slack_user_id": user_id,
            "date": date,
            "current_time": current_time,
        });
        if let Some(channel_id) = channel_id {
            payload["slack_channel_id"] = json!(channel_id);
        }
        let url = format!("{}/coworking/book/", self.base);
        self.send(self.request(reqwest::Method::POST, url, self.member_key()).json(&payload)).await
    }

    async fn cancel_coworking(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<CancellationReceipt, ApiError> {
        let url = format!("{}/coworking/cancel/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.member_key()).json(&json!({
            "slack_user_id": user_id,
            "date": date,
        }));
        self.send(builder).await
    }

    async fn list_rewards(&self, user_id: Option<&str>) -> Result<Vec<RewardItem>, ApiError> {
        let url = format!("{}/rewards/", self.base);
        let mut builder = self.request(reqwest::Method::GET, url, self.member_key());
        if let Some(user_id) = user_id {
            builder = builder.query(&[("slack_user_id", user_id)]);
        }
        self.send(builder).await
    }

    async fn request_reward(
        &self,
        user_id: &str,
        reward_code: &str,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/rewards/request/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.member_key()).json(&json!({
            "slack_user_id": user_id,
            "reward_code": reward_code,
            "quantity": quantity,
        }));
        self.send_ignoring_body(builder).await
    }

    async fn pending_redemptions(
        &self,
        admin_id: &str,
    ) -> Result<Vec<RedemptionRequest>, ApiError> {
        let url = format!("{}/rewards/pending/", self.base);
        let builder = self
            .request(reqwest::Method::GET, url, self.admin_key())
            .query(&[("slack_user_id", admin_id)]);
        self.send(builder).await
    }

    async fn approve_reward(&self, admin_id: &str, redemption_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/rewards/approve/", self.base);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "slack_user_id": admin_id,
            "redemption_id": redemption_id,
        }));
        self.send_ignoring_body(builder).await
    }

    async fn get_rate_card(&self) -> Result<Vec<RateCardEntry>, ApiError> {
        let url = format!("{}/rate-card/", self.base);
        match self.send(self.request(reqwest::Method::GET, url, self.member_key())).await {
            Ok(entries) => Ok(entries),
            // An older backend without the endpoint just means no card.
            Err(ApiError::NotFound) => Ok(Vec::new()),
            Err(error) => {
                warn!(event_name = "clients.rate_card_failed", %error, "rate card fetch failed");
                Ok(Vec::new())
            }
        }
    }

    async fn get_admin(&self, user_id: &str) -> Result<Option<AdminProfile>, ApiError> {
        let url = format!("{}/admins/{user_id}/", self.base);
        match self.send(self.request(reqwest::Method::GET, url, self.member_key())).await {
            Ok(profile) => Ok(Some(profile)),
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn get_admin_allowance(&self, user_id: &str) -> Result<AdminAllowance, ApiError> {
        let url = format!("{}/admin/allowance/", self.base);
        let builder = self
            .request(reqwest::Method::GET, url, self.admin_key())
            .query(&[("slack_id", user_id)]);
        self.send(builder).await
    }

    async fn has_posted_in_channel(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<bool, ApiError> {
        let url = format!("{}/api/v1/activity/first-post/{user_id}/{channel_id}/", self.root);
        match self
            .send::<Value>(self.request(reqwest::Method::GET, url, self.admin_key()))
            .await
        {
            Ok(body) => Ok(body.get("has_posted").and_then(Value::as_bool).unwrap_or(false)),
            Err(ApiError::NotFound) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn record_channel_post(&self, user_id: &str, channel_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/v1/activity/first-post/", self.root);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "slack_user_id": user_id,
            "channel_id": channel_id,
        }));
        let response =
            builder.send().await.map_err(|error| ApiError::Upstream(error.to_string()))?;
        let status = response.status();
        // 409 means the first post was already recorded, which is fine.
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(map_error(status, &body))
    }

    async fn get_user_by_slack_id(&self, slack_id: &str) -> Result<Option<i64>, ApiError> {
        let url = format!("{}/users/{slack_id}/", self.base);
        match self
            .send::<Value>(self.request(reqwest::Method::GET, url, self.member_key()))
            .await
        {
            Ok(body) => Ok(body.get("id").and_then(Value::as_i64)),
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn link_slack_user(
        &self,
        slack_id: &str,
        email: &str,
    ) -> Result<Option<i64>, ApiError> {
        let url = format!("{}/api/v1/users/link-slack/", self.root);
        let builder = self.request(reqwest::Method::POST, url, self.admin_key()).json(&json!({
            "slack_id": slack_id,
            "email": email,
        }));
        match self.send::<Value>(builder).await {
            Ok(body) => Ok(body.get("user_id").and_then(Value::as_i64)),
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }
}
