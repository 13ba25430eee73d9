use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use joey_agent::{
    Agent, ActionDispatcher, ContentFactoryHandler, FastPath, HandlerRegistry, MonitorSettings,
    QuestTracker, SkillExecutor,
};
use joey_clients::{build_llm_client, JobServiceClient, PointsHttpClient};
use joey_core::api::{ChatApi, JobApi, PointsApi};
use joey_core::config::{AppConfig, ConfigError, LoadOptions};
use joey_core::skill::{builtin_skills, SkillRegistry};
use joey_core::store::{InMemoryStore, KvStore};
use joey_core::{default_quests, ApiError};
use joey_slack::SlackClient;

/// The explicit application context: every component gets its
/// collaborators here, once, at startup. No singletons, no lazy getters.
pub struct Application {
    pub config: AppConfig,
    pub agent: Arc<Agent>,
    pub quests: Arc<QuestTracker>,
    pub chat: Arc<dyn ChatApi>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not resolve bot identity: {0}")]
    BotIdentity(#[source] ApiError),
    #[error("llm client construction failed: {0}")]
    Llm(anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let chat: Arc<dyn ChatApi> = Arc::new(SlackClient::new(config.slack.bot_token.clone()));
    let bot_user_id = chat.bot_user_id().await.map_err(BootstrapError::BotIdentity)?;
    info!(event_name = "system.bootstrap.identity_resolved", bot_user_id = %bot_user_id, "bot identity resolved");

    let points: Arc<dyn PointsApi> =
        Arc::new(PointsHttpClient::new(&config.backend, config.bot.clone()));
    let llm = build_llm_client(&config.llm).map_err(BootstrapError::Llm)?;

    let mut skills = builtin_skills();
    let mut handlers = HandlerRegistry::new();
    handlers.register(
        "community-points",
        Arc::new(ActionDispatcher::new(
            Arc::clone(&points),
            Arc::clone(&chat),
            config.bot.clone(),
            &bot_user_id,
        )),
    );

    match &config.jobs.base_url {
        Some(jobs_url) => {
            let jobs: Arc<dyn JobApi> =
                Arc::new(JobServiceClient::new(jobs_url.clone(), config.jobs.api_key.clone()));
            let settings = MonitorSettings {
                poll_interval: Duration::from_secs(config.jobs.poll_interval_secs),
                ..MonitorSettings::default()
            };
            handlers.register(
                "content-factory",
                Arc::new(ContentFactoryHandler::new(jobs, Arc::clone(&chat), settings)),
            );
        }
        None => {
            // Without a job service the skill would only hallucinate;
            // drop it from the registry entirely.
            skills.retain(|skill| skill.name != "content-factory");
            info!(event_name = "system.bootstrap.content_disabled", "content factory disabled (no jobs.base_url)");
        }
    }

    let registry = Arc::new(SkillRegistry::new(skills));
    info!(
        event_name = "system.bootstrap.skills_loaded",
        skill_count = registry.list().len(),
        handler_count = handlers.len(),
        "skill registry built"
    );

    let executor = SkillExecutor::new(Arc::clone(&llm), handlers);
    let agent = Arc::new(Agent::new(
        Arc::clone(&registry),
        FastPath::new(Arc::clone(&points), config.bot.clone()),
        executor,
        llm,
        &bot_user_id,
    ));

    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let quests = Arc::new(QuestTracker::new(
        default_quests(),
        store,
        points,
        Arc::clone(&chat),
        &bot_user_id,
    ));

    Ok(Application { config, agent, quests, chat })
}

#[cfg(test)]
mod tests {
    use joey_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_config() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("not-a-token".to_string()),
                slack_signing_secret: Some("ss".to_string()),
                backend_base_url: Some("https://api.example.test".to_string()),
                llm_api_key: Some("sk-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("invalid token should fail").to_string();
        assert!(message.contains("xoxb-"));
    }
}
