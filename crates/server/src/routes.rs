use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use joey_agent::{Agent, QuestTracker};
use joey_core::api::ChatApi;
use joey_core::config::BotConfig;
use joey_slack::{parse_event, InboundEvent};

const MENTION_FAILURE_APOLOGY: &str =
    "Sorry mate, I ran into a bit of trouble. Mind trying again? 🤔";
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub quests: Arc<QuestTracker>,
    pub chat: Arc<dyn ChatApi>,
    pub bot: BotConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "joey",
        "message": "G'day! Joey is awake and ready 🦘",
    }))
}

/// Replay guard: requests older than five minutes are refused. Full
/// signature verification is the ingress middleware's job.
fn timestamp_is_fresh(headers: &HeaderMap) -> bool {
    let Some(raw) = headers.get("x-slack-request-timestamp").and_then(|v| v.to_str().ok()) else {
        // Local tooling and tests don't set the header.
        return true;
    };
    let Ok(timestamp) = raw.parse::<i64>() else {
        return false;
    };
    let now = chrono::Utc::now().timestamp();
    (now - timestamp).abs() <= MAX_TIMESTAMP_SKEW_SECS
}

async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    if !timestamp_is_fresh(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "stale request"})));
    }

    // URL verification challenge during app setup.
    if payload.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = payload.get("challenge").cloned().unwrap_or(Value::Null);
        return (StatusCode::OK, Json(json!({ "challenge": challenge })));
    }

    if let Some(event) = payload.get("event").and_then(|event| parse_event(event)) {
        dispatch_event(state, event);
    }

    // Slack requires a prompt 200 regardless; work continues detached.
    (StatusCode::OK, Json(json!({})))
}

fn dispatch_event(state: AppState, event: InboundEvent) {
    match event {
        InboundEvent::Mention { user_id, channel_id, text, thread_ts, ts }
        | InboundEvent::DirectMessage { user_id, channel_id, text, thread_ts, ts } => {
            tokio::spawn(handle_mention(state, user_id, channel_id, text, thread_ts, ts));
        }
        event @ (InboundEvent::Message { .. } | InboundEvent::ReactionAdded { .. }) => {
            tokio::spawn(handle_quest_event(state, event));
        }
        InboundEvent::Unsupported { event_type } => {
            info!(event_name = "server.event.unsupported", %event_type, "ignoring event");
        }
    }
}

/// One task per inbound mention, end to end. The agent itself never
/// errors; only the final chat post can fail, and that only gets logged.
async fn handle_mention(
    state: AppState,
    user_id: String,
    channel_id: String,
    text: String,
    thread_ts: Option<String>,
    ts: String,
) {
    let correlation_id = Uuid::new_v4().to_string();
    let thread = thread_ts.unwrap_or(ts);
    info!(
        event_name = "server.mention.received",
        %correlation_id,
        user = %user_id,
        channel = %channel_id,
        "handling mention"
    );

    let reply =
        state.agent.handle_mention(&text, &user_id, Some(&channel_id), Some(&thread)).await;

    info!(
        event_name = "server.mention.handled",
        %correlation_id,
        skill = reply.skill_used.as_deref().unwrap_or("none"),
        "mention handled"
    );

    if let Err(chat_error) =
        state.chat.post_message(&channel_id, &reply.message, Some(&thread)).await
    {
        error!(event_name = "server.mention.post_failed", %correlation_id, error = %chat_error, "reply post failed");
        // Best effort apology; if even that fails we only log.
        if let Err(apology_error) =
            state.chat.post_message(&channel_id, MENTION_FAILURE_APOLOGY, Some(&thread)).await
        {
            error!(event_name = "server.mention.apology_failed", %correlation_id, error = %apology_error, "apology post failed");
        }
    }
}

async fn handle_quest_event(state: AppState, event: InboundEvent) {
    let channel_name = match state.chat.channel_name(event_channel(&event)).await {
        Ok(name) => name,
        Err(error) => {
            warn!(event_name = "server.quest.channel_lookup_failed", %error, "channel lookup failed");
            None
        }
    };

    let bot = state.bot.clone();
    if let Some(quest_event) =
        event.to_quest_event(channel_name, move |seconds| bot.local_hour(seconds))
    {
        state.quests.handle_event(&quest_event).await;
    }
}

fn event_channel(event: &InboundEvent) -> &str {
    match event {
        InboundEvent::Mention { channel_id, .. }
        | InboundEvent::DirectMessage { channel_id, .. }
        | InboundEvent::Message { channel_id, .. }
        | InboundEvent::ReactionAdded { channel_id, .. } => channel_id,
        InboundEvent::Unsupported { .. } => "",
    }
}
