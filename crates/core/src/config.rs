use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub backend: BackendConfig,
    pub jobs: JobsConfig,
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub signing_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    /// Secure key for admin/system endpoints. Falls back to `api_key`
    /// when only one key is configured.
    pub internal_api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct JobsConfig {
    /// Content generation is disabled when unset.
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub poll_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    /// The service's time zone as a fixed UTC offset in minutes.
    /// "Today" for coworking bookings and the night-window quest hour are
    /// derived from it.
    pub timezone_offset_minutes: i32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Anthropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub backend_base_url: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                signing_secret: String::new().into(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 30,
            },
            backend: BackendConfig { base_url: String::new(), api_key: None, internal_api_key: None },
            jobs: JobsConfig { base_url: None, api_key: None, poll_interval_secs: 5 },
            // Melbourne standard time.
            bot: BotConfig { timezone_offset_minutes: 600 },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|gemini|anthropic)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl BotConfig {
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    /// Today's date in the configured zone, ISO formatted on request.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    pub fn local_hour(&self, utc_seconds: i64) -> Option<u8> {
        let utc = chrono::DateTime::from_timestamp(utc_seconds, 0)?;
        Some(chrono::Timelike::hour(&utc.with_timezone(&self.timezone())) as u8)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("joey.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(value) = slack.bot_token {
                self.slack.bot_token = value.into();
            }
            if let Some(value) = slack.signing_secret {
                self.slack.signing_secret = value.into();
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(value) = llm.api_key {
                self.llm.api_key = Some(value.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(value) = backend.api_key {
                self.backend.api_key = Some(value.into());
            }
            if let Some(value) = backend.internal_api_key {
                self.backend.internal_api_key = Some(value.into());
            }
        }

        if let Some(jobs) = patch.jobs {
            if let Some(base_url) = jobs.base_url {
                self.jobs.base_url = Some(base_url);
            }
            if let Some(value) = jobs.api_key {
                self.jobs.api_key = Some(value.into());
            }
            if let Some(poll_interval_secs) = jobs.poll_interval_secs {
                self.jobs.poll_interval_secs = poll_interval_secs;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(offset) = bot.timezone_offset_minutes {
                self.bot.timezone_offset_minutes = offset;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("JOEY_SLACK_BOT_TOKEN") {
            self.slack.bot_token = value.into();
        }
        if let Some(value) = read_env("JOEY_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = value.into();
        }

        if let Some(value) = read_env("JOEY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("JOEY_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("JOEY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("JOEY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("JOEY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("JOEY_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("JOEY_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("JOEY_BACKEND_API_KEY") {
            self.backend.api_key = Some(value.into());
        }
        if let Some(value) = read_env("JOEY_BACKEND_INTERNAL_API_KEY") {
            self.backend.internal_api_key = Some(value.into());
        }

        if let Some(value) = read_env("JOEY_JOBS_BASE_URL") {
            self.jobs.base_url = Some(value);
        }
        if let Some(value) = read_env("JOEY_JOBS_API_KEY") {
            self.jobs.api_key = Some(value.into());
        }
        if let Some(value) = read_env("JOEY_JOBS_POLL_INTERVAL_SECS") {
            self.jobs.poll_interval_secs = parse_u64("JOEY_JOBS_POLL_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("JOEY_BOT_TIMEZONE_OFFSET_MINUTES") {
            self.bot.timezone_offset_minutes =
                parse_i32("JOEY_BOT_TIMEZONE_OFFSET_MINUTES", &value)?;
        }

        if let Some(value) = read_env("JOEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("JOEY_SERVER_PORT") {
            self.server.port = parse_u16("JOEY_SERVER_PORT", &value)?;
        }

        let log_level = read_env("JOEY_LOGGING_LEVEL").or_else(|| read_env("JOEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("JOEY_LOGGING_FORMAT").or_else(|| read_env("JOEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(value) = overrides.slack_bot_token {
            self.slack.bot_token = value.into();
        }
        if let Some(value) = overrides.slack_signing_secret {
            self.slack.signing_secret = value.into();
        }
        if let Some(value) = overrides.backend_base_url {
            self.backend.base_url = value;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(value) = overrides.llm_api_key {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = overrides.log_level {
            self.logging.level = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bot_token = self.slack.bot_token.expose_secret();
        if bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > \
                 OAuth & Permissions > Bot User OAuth Token"
                    .to_string(),
            ));
        }
        if !bot_token.starts_with("xoxb-") {
            return Err(ConfigError::Validation(
                "slack.bot_token must start with `xoxb-`".to_string(),
            ));
        }
        if self.slack.signing_secret.expose_secret().is_empty() {
            return Err(ConfigError::Validation("slack.signing_secret is required".to_string()));
        }

        let backend_url = self.backend.base_url.trim();
        if backend_url.is_empty() {
            return Err(ConfigError::Validation("backend.base_url is required".to_string()));
        }
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "backend.base_url must start with http:// or https://".to_string(),
            ));
        }

        let missing_key = self
            .llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "llm.api_key is required for openai/gemini/anthropic providers".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_string(),
            ));
        }

        if self.jobs.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "jobs.poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.bot.timezone_offset_minutes.abs() > 14 * 60 {
            return Err(ConfigError::Validation(
                "bot.timezone_offset_minutes must be within ±840".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be greater than zero".to_string(),
            ));
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Validation(
                "logging.level must be one of trace|debug|info|warn|error".to_string(),
            )),
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("joey.toml"), PathBuf::from("config/joey.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    llm: Option<LlmPatch>,
    backend: Option<BackendPatch>,
    jobs: Option<JobsPatch>,
    bot: Option<BotPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    signing_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    internal_api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobsPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    poll_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    timezone_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
