use std::{env, str::FromStr, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig,
    NotifyConfig, WatchConfig,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434/api/generate";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let keyword = get("WATCH_KEYWORD").unwrap_or_else(|| "excelsior".to_string());
        let keyword = keyword.trim().to_string();
        let watch = WatchConfig {
            keyword,
            topic: get("WATCH_TOPIC").unwrap_or_else(|| {
                "Excelsior Rotterdam, a football club from the Netherlands".to_string()
            }),
        };

        let feed_url = get("FEED_URL").ok_or(ConfigError::Missing("FEED_URL"))?;
        let feed = FeedConfig {
            url: parse_url("FEED_URL", &feed_url)?,
            fetch_timeout: parse_millis(&get, "FEED_FETCH_TIMEOUT", 20_000)?,
        };

        let endpoint = get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let max_attempts: u32 = parse_or(&get, "CLASSIFIER_MAX_ATTEMPTS", 1)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "CLASSIFIER_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let classifier = ClassifierConfig {
            endpoint: parse_url("OLLAMA_URL", &endpoint)?,
            model: get("OLLAMA_MODEL").unwrap_or_else(|| "llama3.1".to_string()),
            timeout: parse_millis(&get, "CLASSIFIER_TIMEOUT", 60_000)?,
            max_attempts,
            retry_backoff: parse_millis(&get, "CLASSIFIER_RETRY_BACKOFF_MS", 2_000)?,
        };

        let notify = NotifyConfig {
            title: get("NOTIFY_TITLE").unwrap_or_else(|| "New Excelsior Post".to_string()),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            chat_id: get("NOTIFY_CHAT_ID")
                .map(|value| parse_value("NOTIFY_CHAT_ID", &value))
                .transpose()?,
        };

        let directories = DirectoryConfig {
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            db_filename: get("DB_FILENAME").unwrap_or_else(|| "history.db".to_string()),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let timezone = get("WATCH_TIMEZONE").unwrap_or_else(|| "Europe/Amsterdam".to_string());

        let config = Self {
            watch,
            feed,
            classifier,
            notify,
            directories,
            logging,
            timezone,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.keyword.is_empty() {
            return Err(ConfigError::Invalid {
                key: "WATCH_KEYWORD",
                value: self.watch.keyword.clone(),
            });
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid {
                key: "WATCH_TIMEZONE",
                value: self.timezone.clone(),
            });
        }
        Ok(())
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_millis<G>(get: &G, key: &'static str, default_ms: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default_ms).map(Duration::from_millis)
}
