use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps a headless_chrome failure, flattening its error chain into one line.
    pub fn browser(err: anyhow::Error) -> Self {
        AppError::Browser(format!("{err:#}"))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
