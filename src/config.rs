use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub browser: BrowserConfig,
    pub probe: ProbeConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub accept_language: String,
    pub window_width: u32,
    pub window_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Pause after navigation before interacting, for client-side rendering.
    pub settle_delay_ms: u64,
    /// Upper bound on waiting for the size panel container to appear.
    pub panel_wait_ms: u64,
    pub extract_attempts: u32,
    pub extract_retry_delay_ms: u64,
    pub availability_attempts: u32,
    pub availability_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Six-field cron expression, seconds first.
    pub poll_interval: String,
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl ProbeConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn panel_wait(&self) -> Duration {
        Duration::from_millis(self.panel_wait_ms)
    }

    pub fn extract_retry_delay(&self) -> Duration {
        Duration::from_millis(self.extract_retry_delay_ms)
    }

    /// Total budget for the availability snapshot to arrive.
    pub fn availability_wait(&self) -> Duration {
        Duration::from_millis(self.availability_interval_ms * u64::from(self.availability_attempts))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "RESTOCK"
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Bare environment fallbacks for deployments without the prefix scheme
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }
        if config.notifications.telegram.bot_token.is_none() {
            config.notifications.telegram.bot_token = env::var("TELEGRAM_TOKEN").ok();
        }
        if config.notifications.telegram.chat_id.is_none() {
            config.notifications.telegram.chat_id = env::var("TELEGRAM_CHAT_ID").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.store.path.trim().is_empty() {
            return Err(ConfigError::Message("Store path must not be empty".into()));
        }

        if self.browser.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "Browser user_agent must not be empty".into(),
            ));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message(
                "Browser window dimensions must be greater than 0".into(),
            ));
        }

        if self.probe.panel_wait_ms == 0 {
            return Err(ConfigError::Message(
                "Probe panel_wait_ms must be greater than 0".into(),
            ));
        }

        if self.probe.extract_attempts == 0 {
            return Err(ConfigError::Message(
                "Probe extract_attempts must be greater than 0".into(),
            ));
        }

        if self.probe.availability_attempts == 0 || self.probe.availability_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Probe availability budget must be greater than 0".into(),
            ));
        }

        if !self.is_valid_cron(&self.scheduler.poll_interval) {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler.poll_interval".into(),
            ));
        }

        if Url::parse(&self.notifications.telegram.api_base).is_err() {
            return Err(ConfigError::Message(
                "Invalid telegram api_base URL".into(),
            ));
        }

        Ok(())
    }

    fn is_valid_cron(&self, cron_expr: &str) -> bool {
        // The scheduler parses seconds-first cron: 6 parts, optional year field
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 && parts.len() != 7 {
            return false;
        }

        for part in parts {
            if part.is_empty() {
                return false;
            }
            // Allow numbers, ranges, lists, and wildcards
            if !part
                .chars()
                .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
            {
                return false;
            }
        }

        true
    }
}
