use crate::browser::ProbePage;
use crate::config::ProbeConfig;
use crate::models::SizeLabel;
use crate::probe::{FailureReason, ProbeError};
use crate::utils::error::AppError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

/// Container shapes the size panel is known to render as, most specific
/// first. Waited on as one comma-joined selector.
pub const PANEL_SELECTORS: [&str; 4] = [
    "ul.size-selector-sizes",
    "ul[class*='size-selector-sizes']",
    "[class*='size-selector'] ul",
    ".size-selector",
];

/// Label element candidates inside one size entry.
const LABEL_SELECTORS: [&str; 3] = [
    "[data-qa-qualifier='size-selector-sizes-size-label']",
    "[class*='size-selector-sizes-size-label']",
    "[data-qa-qualifier*='size-label']",
];

const DISABLED_CLASS: &str = "size-selector-sizes__size--disabled";
const OUT_OF_STOCK_ACTION: &str = "size-out-of-stock";

static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("invalid selector"));
static BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button").expect("invalid selector"));

/// One entry of the revealed size panel, in DOM order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeEntry {
    pub label: String,
    pub disabled: bool,
}

enum ExtractError {
    Empty,
    Fault(AppError),
}

/// Waits for the panel container, then reads entries out of document
/// snapshots, retrying empty reads while the panel hydrates. Exhausting
/// the retry budget on an empty panel is not a fault: the empty list
/// flows into the canonical filter downstream.
pub(crate) async fn extract_sizes(
    page: &ProbePage,
    config: &ProbeConfig,
) -> Result<Vec<SizeEntry>, ProbeError> {
    if !page.wait_for_any(&PANEL_SELECTORS, config.panel_wait()) {
        return Err(FailureReason::PanelNotFound.into());
    }

    let retries = config.extract_attempts.saturating_sub(1) as usize;
    let strategy = FixedInterval::from_millis(config.extract_retry_delay_ms).take(retries);

    let attempt = || async {
        let html = page
            .content()
            .map_err(|e| ExtractError::Fault(AppError::browser(e)))?;
        let entries = parse_size_panel(&html);
        if entries.is_empty() {
            Err(ExtractError::Empty)
        } else {
            Ok(entries)
        }
    };

    match Retry::spawn(strategy, attempt).await {
        Ok(entries) => Ok(entries),
        Err(ExtractError::Empty) => Ok(Vec::new()),
        Err(ExtractError::Fault(err)) => Err(err.into()),
    }
}

/// Parses size entries out of a document snapshot. Returns entries in DOM
/// order, empty when no known container shape is present.
pub fn parse_size_panel(html: &str) -> Vec<SizeEntry> {
    let document = Html::parse_document(html);

    let panel = PANEL_SELECTORS.iter().find_map(|selector| {
        let parsed = Selector::parse(selector).ok()?;
        document.select(&parsed).next()
    });
    let Some(panel) = panel else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for item in panel.select(&ITEM_SELECTOR) {
        let label = entry_label(&item);
        if label.is_empty() {
            continue;
        }

        let class = item.value().attr("class").unwrap_or("");
        let button = item.select(&BUTTON_SELECTOR).next();
        let qa_action = button
            .and_then(|b| b.value().attr("data-qa-action"))
            .unwrap_or("");
        let native_disabled = button.is_some_and(|b| b.value().attr("disabled").is_some());

        let disabled =
            class.contains(DISABLED_CLASS) || qa_action == OUT_OF_STOCK_ACTION || native_disabled;

        entries.push(SizeEntry { label, disabled });
    }
    entries
}

/// Filters entries to the canonical vocabulary and orders them by
/// canonical rank. DOM order is not trusted.
pub fn canonical_sizes(entries: &[SizeEntry]) -> Vec<SizeLabel> {
    let mut sizes: Vec<SizeLabel> = entries
        .iter()
        .filter_map(|entry| entry.label.parse().ok())
        .collect();
    sizes.sort();
    sizes
}

fn entry_label(item: &ElementRef<'_>) -> String {
    for selector in LABEL_SELECTORS {
        if let Ok(parsed) = Selector::parse(selector) {
            if let Some(element) = item.select(&parsed).next() {
                let text = element_text(&element);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    if let Some(button) = item.select(&BUTTON_SELECTOR).next() {
        let text = element_text(&button);
        if !text.is_empty() {
            return text;
        }
    }
    element_text(item)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
