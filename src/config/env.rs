use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub watch: WatchConfig,
    pub feed: FeedConfig,
    pub classifier: ClassifierConfig,
    pub notify: NotifyConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Substring every candidate post must contain before it is classified.
    pub keyword: String,
    /// Natural-language description of what counts as relevant.
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: Url,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint: Url,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub title: String,
    pub telegram_bot_token: Option<String>,
    pub chat_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
