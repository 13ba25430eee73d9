use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use joey_core::api::{ChatApi, UserProfile};
use joey_core::ApiError;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack Web API adapter. The bot's own user ID is resolved once via
/// `auth.test`; channel names are cached per ID since they change rarely
/// and the quest tracker asks on every channel event.
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
    bot_user_id: OnceCell<String>,
    channel_names: RwLock<HashMap<String, Option<String>>>,
}

impl SlackClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            bot_token,
            base_url: base_url.into(),
            bot_user_id: OnceCell::new(),
            channel_names: RwLock::new(HashMap::new()),
        }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| ApiError::Upstream(error.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|error| ApiError::Upstream(error.to_string()))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_owned();
            return Err(match error.as_str() {
                "channel_not_found" | "user_not_found" => ApiError::NotFound,
                "not_authed" | "invalid_auth" | "missing_scope" => ApiError::Forbidden,
                _ => ApiError::BadRequest(error),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut payload = json!({
            "channel": channel_id,
            "text": text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if let Some(thread_ts) = thread_id {
            payload["thread_ts"] = json!(thread_ts);
        }
        self.call("chat.postMessage", payload).await?;
        debug!(event_name = "slack.message_posted", channel = %channel_id, "message posted");
        Ok(())
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<(), ApiError> {
        let opened = self.call("conversations.open", json!({ "users": user_id })).await?;
        let dm_channel = opened
            .pointer("/channel/id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Upstream("conversations.open returned no channel".to_owned()))?
            .to_owned();
        self.post_message(&dm_channel, text, None).await
    }

    async fn bot_user_id(&self) -> Result<String, ApiError> {
        self.bot_user_id
            .get_or_try_init(|| async {
                let identity = self.call("auth.test", json!({})).await?;
                identity
                    .get("user_id")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::Upstream("auth.test returned no user_id".to_owned()))
            })
            .await
            .cloned()
    }

    async fn lookup_user(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let response = self.call("users.info", json!({ "user": user_id })).await?;
        let user = response.get("user").cloned().unwrap_or(Value::Null);
        let profile = user.get("profile").cloned().unwrap_or(Value::Null);

        let display_name = [
            profile.get("display_name").and_then(Value::as_str),
            user.get("real_name").and_then(Value::as_str),
            user.get("name").and_then(Value::as_str),
        ]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .unwrap_or("Unknown")
        .to_owned();

        Ok(UserProfile {
            display_name,
            email: profile.get("email").and_then(Value::as_str).map(str::to_owned),
        })
    }

    async fn channel_name(&self, channel_id: &str) -> Result<Option<String>, ApiError> {
        if let Some(cached) = self.channel_names.read().await.get(channel_id) {
            return Ok(cached.clone());
        }

        let name = match self.call("conversations.info", json!({ "channel": channel_id })).await {
            Ok(response) => response
                .pointer("/channel/name")
                .and_then(Value::as_str)
                .map(str::to_owned),
            Err(ApiError::NotFound) => None,
            Err(error) => return Err(error),
        };

        self.channel_names.write().await.insert(channel_id.to_owned(), name.clone());
        Ok(name)
    }
}
