use crate::utils::error::Result;
use async_trait::async_trait;

pub mod telegram;

// Re-exports for convenience
pub use telegram::TelegramNotifier;

/// Fire-and-forget plain-text delivery. Callers log delivery failures and
/// move on; a failed send never feeds back into poll state.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> Result<()>;
}

/// Fallback used when no Telegram credentials are configured: messages are
/// written to the log instead of delivered.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, text: &str) -> Result<()> {
        tracing::info!("Notification (log only): {}", text);
        Ok(())
    }
}
