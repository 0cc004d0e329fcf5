// Integration tests for the restock watcher
// Shared wiring: a scripted probe and a recording notifier around the real
// controller, store and router

pub mod api_tests;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use restock_watcher::config::{
    AppConfig, BrowserConfig, NotificationsConfig, ProbeConfig, SchedulerConfig, ServerConfig,
    StoreConfig, TelegramConfig,
};
use restock_watcher::models::{SizeLabel, TrackedItem};
use restock_watcher::notifiers::Notifier;
use restock_watcher::poller::PollController;
use restock_watcher::probe::{ProbeOutcome, ProbeSuccess, StockCheck, StockProbe};
use restock_watcher::store::{ItemStore, JsonFileStore};
use restock_watcher::utils::error::{AppError, Result};
use restock_watcher::web::AppState;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Test configuration with probe budgets shrunk so cycles finish fast.
pub fn get_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000, // Never bound in tests
        },
        store: StoreConfig {
            path: "data/tracked-test.json".to_string(),
        },
        browser: BrowserConfig {
            headless: true,
            chrome_path: None,
            user_agent: "RestockWatcher-Test/1.0".to_string(),
            accept_language: "tr-TR,tr;q=0.9,en;q=0.8".to_string(),
            window_width: 1365,
            window_height: 768,
        },
        probe: ProbeConfig {
            settle_delay_ms: 0,
            panel_wait_ms: 100,
            extract_attempts: 1,
            extract_retry_delay_ms: 10,
            availability_attempts: 1,
            availability_interval_ms: 50,
        },
        scheduler: SchedulerConfig {
            poll_interval: "0 */5 * * * *".to_string(),
            run_on_start: false,
        },
        notifications: NotificationsConfig {
            telegram: TelegramConfig {
                bot_token: None,
                chat_id: None,
                api_base: "https://api.telegram.org".to_string(),
            },
        },
    }
}

/// Probe double serving pre-scripted outcomes per item URL. A check for a
/// URL with no remaining script panics, naming the URL.
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<ProbeOutcome, String>>>>,
    checks: AtomicUsize,
    delay: Duration,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    /// Variant whose checks take `delay`, for exercising cycle overlap.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            checks: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn script(&self, url: &str, outcome: ProbeOutcome) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(outcome));
    }

    pub fn script_fault(&self, url: &str, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockProbe for ScriptedProbe {
    async fn check(&self, item: &TrackedItem) -> Result<ProbeOutcome> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&item.url)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(AppError::Browser(message)),
            None => panic!("no scripted outcome left for {}", item.url),
        }
    }
}

/// Notifier double that records every delivered text.
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// Variant whose sends all fail after recording, for delivery-failure flows.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(AppError::Notification("simulated delivery failure".into()))
        } else {
            Ok(())
        }
    }
}

/// Complete application wired around a scripted probe and a recording
/// notifier, persisting to a store file in a throwaway directory.
pub struct TestApp {
    pub state: AppState,
    pub controller: Arc<PollController>,
    pub probe: Arc<ScriptedProbe>,
    pub notifier: Arc<RecordingNotifier>,
    pub store_path: PathBuf,
    _data_dir: TempDir,
}

pub async fn create_test_app() -> anyhow::Result<TestApp> {
    build_test_app(Duration::ZERO).await
}

/// Same as [`create_test_app`] but every probe check takes `delay`.
pub async fn create_test_app_with_probe_delay(delay: Duration) -> anyhow::Result<TestApp> {
    build_test_app(delay).await
}

async fn build_test_app(delay: Duration) -> anyhow::Result<TestApp> {
    let data_dir = TempDir::new()?;
    let store_path = data_dir.path().join("tracked.json");
    let store = Arc::new(JsonFileStore::new(&store_path));

    let mut config = get_test_config();
    config.store.path = store_path.display().to_string();

    let probe = ScriptedProbe::with_delay(delay);
    let notifier = RecordingNotifier::new();

    let items = store.load().await?;
    let controller = Arc::new(PollController::new(
        items,
        store,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&probe) as Arc<dyn StockProbe>,
    ));

    Ok(TestApp {
        state: AppState {
            controller: Arc::clone(&controller),
            config,
        },
        controller,
        probe,
        notifier,
        store_path,
        _data_dir: data_dir,
    })
}

/// Product URL carrying the "v1" product id the probe needs.
pub fn product_url(product_id: &str) -> String {
    format!("https://www.example.com/shop/overshirt-p{product_id}.html?v1={product_id}")
}

/// Successful probe outcome where `size` resolved to `sku` with the given
/// availability status.
pub fn offered_outcome(size: SizeLabel, sku: u64, status: &str, in_stock: bool) -> ProbeOutcome {
    ProbeOutcome::Success(ProbeSuccess {
        check: StockCheck::Offered {
            sku,
            status: status.to_string(),
            in_stock,
        },
        size_sku_map: BTreeMap::from([(size, sku)]),
    })
}

/// Successful probe outcome where the wanted size is not offered at all.
pub fn not_offered_outcome() -> ProbeOutcome {
    ProbeOutcome::Success(ProbeSuccess {
        check: StockCheck::NotOffered,
        size_sku_map: BTreeMap::from([(SizeLabel::S, 44_900_231), (SizeLabel::M, 44_900_232)]),
    })
}

/// Helper to make HTTP requests to the test app.
pub async fn make_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> anyhow::Result<Response> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(Body::from(body.unwrap_or_default()))?;
    Ok(app.clone().oneshot(request).await?)
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response) -> anyhow::Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Parses the store file from disk as JSON.
pub async fn read_store_json(path: &Path) -> anyhow::Result<Value> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
