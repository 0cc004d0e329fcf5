pub mod browser;
pub mod config;
pub mod models;
pub mod notifiers;
pub mod poller;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use poller::PollController;
pub use scheduler::PollScheduler;
pub use utils::error::{AppError, Result};
