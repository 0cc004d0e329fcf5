use anyhow::Result;
use clap::Parser;
use restock_watcher::browser::BrowserSession;
use restock_watcher::notifiers::{LogNotifier, Notifier, TelegramNotifier};
use restock_watcher::probe::ChromeStockProbe;
use restock_watcher::store::{ItemStore, JsonFileStore};
use restock_watcher::web::{self, AppState};
use restock_watcher::{AppConfig, PollController, PollScheduler};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "restock-watcher",
    version,
    about = "Watches size-level stock on dynamic product pages"
)]
struct Args {
    /// Run a single poll cycle and exit instead of starting the daemon
    #[arg(long)]
    check_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("restock_watcher=info".parse()?),
        )
        .with_writer(writer)
        .init();

    info!("Starting restock-watcher...");

    let config = AppConfig::from_env()?;

    let session = Arc::new(BrowserSession::launch(&config.browser)?);
    let store: Arc<dyn ItemStore> = Arc::new(JsonFileStore::new(&config.store.path));

    let telegram = &config.notifications.telegram;
    let notifier: Arc<dyn Notifier> = match (telegram.bot_token.clone(), telegram.chat_id.clone())
    {
        (Some(bot_token), Some(chat_id)) => {
            info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(
                telegram.api_base.clone(),
                bot_token,
                chat_id,
            ))
        }
        _ => {
            warn!("Telegram credentials not configured, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let items = store.load().await?;
    info!("Loaded {} tracked item(s) from {}", items.len(), config.store.path);

    let probe = Arc::new(ChromeStockProbe::new(
        Arc::clone(&session),
        config.probe.clone(),
    ));
    let controller = Arc::new(PollController::new(items, store, notifier, probe));

    if args.check_once {
        info!("Running a single poll cycle");
        controller.run_cycle().await;
        return Ok(());
    }

    let mut scheduler =
        PollScheduler::new(Arc::clone(&controller), config.scheduler.clone()).await?;
    scheduler.start().await?;

    web::serve(AppState {
        controller: Arc::clone(&controller),
        config,
    })
    .await?;

    scheduler.shutdown().await?;
    drop(controller);
    drop(session);
    info!("Shutting down...");

    Ok(())
}
