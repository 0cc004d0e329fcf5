use anyhow::{Result, anyhow};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrowserConfig;

/// Keeps the shared Chrome process alive across poll cycles; the crate
/// default would reap it after 30 idle seconds.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Process-wide Chrome session, launched once at startup. Dropping the
/// session terminates the Chrome process.
pub struct BrowserSession {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-setuid-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        // Set Chrome path if provided
        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        Ok(Self {
            browser,
            config: config.clone(),
        })
    }

    /// Opens a fresh tab with the configured identity headers applied. One
    /// page serves exactly one probe.
    pub fn new_page(&self) -> Result<ProbePage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to create tab: {}", e))?;

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

        let headers = HashMap::from([("Accept-Language", self.config.accept_language.as_str())]);
        tab.set_extra_http_headers(headers)
            .map_err(|e| anyhow!("Failed to set request headers: {}", e))?;

        Ok(ProbePage { tab })
    }
}

/// One isolated page context. The tab is closed when the page is dropped,
/// so every probe exit path releases it.
pub struct ProbePage {
    tab: Arc<Tab>,
}

impl ProbePage {
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    pub fn open(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| anyhow!("Navigation to {} failed: {}", url, e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| anyhow!("Page load failed: {}", e))?;
        Ok(())
    }

    /// Current document serialized to HTML.
    pub fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| anyhow!("Failed to get page content: {}", e))
    }

    /// Clicks the first element matching `selector`. Returns false when no
    /// element matches or the click does not land.
    pub fn click_first(&self, selector: &str) -> bool {
        match self.tab.find_element(selector) {
            Ok(element) => element.click().is_ok(),
            Err(_) => false,
        }
    }

    pub fn evaluate_bool(&self, js: &str) -> Result<bool> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| anyhow!("Script evaluation failed: {}", e))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    pub fn evaluate_string(&self, js: &str) -> Result<String> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| anyhow!("Script evaluation failed: {}", e))?;
        Ok(result
            .value
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default())
    }

    /// Waits until any of the selectors matches, or the timeout passes.
    pub fn wait_for_any(&self, selectors: &[&str], timeout: Duration) -> bool {
        let joined = selectors.join(", ");
        self.tab
            .wait_for_element_with_custom_timeout(&joined, timeout)
            .is_ok()
    }
}

impl Drop for ProbePage {
    fn drop(&mut self) {
        let _ = self.tab.close(true);
    }
}
