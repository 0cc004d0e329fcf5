use crate::browser::ProbePage;
use crate::probe::{FailureReason, ProbeError};
use regex::Regex;
use std::sync::LazyLock;

/// Button labels that reveal the size panel, compared uppercased against
/// the visible text of each button on the page.
pub const REVEAL_LABELS: [&str; 5] = ["EKLE", "SEPETE EKLE", "ADD", "ADD TO BAG", "ADD TO CART"];

static BOT_DEFENSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)verify|interstitial|access denied|robot|captcha").expect("invalid regex")
});

const PAGE_TEXT_SCRIPT: &str =
    r#"document.title + "\n" + (document.documentElement.innerText || "")"#;

#[derive(Debug, Clone, Copy)]
pub enum RevealKind {
    /// A CSS selector clicked directly.
    Selector(&'static str),
    /// In-page scan of visible buttons against the known label set.
    VisibleButtonText,
}

#[derive(Debug, Clone, Copy)]
pub struct RevealStrategy {
    pub name: &'static str,
    pub kind: RevealKind,
}

/// Ways to land the add-to-cart click, tried in order. Attribute selectors
/// first (most stable across site revisions), then class substrings, then
/// a free-text sweep of every visible button.
pub const REVEAL_STRATEGIES: [RevealStrategy; 9] = [
    RevealStrategy {
        name: "qa-add-to-cart",
        kind: RevealKind::Selector(r#"button[data-qa-action="add-to-cart"]"#),
    },
    RevealStrategy {
        name: "qa-add-to-bag",
        kind: RevealKind::Selector(r#"button[data-qa-action="add-to-bag"]"#),
    },
    RevealStrategy {
        name: "qa-add-to-cart-button",
        kind: RevealKind::Selector(r#"button[data-qa-action="add-to-cart-button"]"#),
    },
    RevealStrategy {
        name: "qa-product-detail-add",
        kind: RevealKind::Selector(r#"button[data-qa-action="product-detail-add-to-cart"]"#),
    },
    RevealStrategy {
        name: "testid-add",
        kind: RevealKind::Selector(r#"button[data-testid*="add"]"#),
    },
    RevealStrategy {
        name: "class-add-to-cart",
        kind: RevealKind::Selector(r#"button[class*="add-to-cart"]"#),
    },
    RevealStrategy {
        name: "class-add-to-bag",
        kind: RevealKind::Selector(r#"button[class*="add-to-bag"]"#),
    },
    RevealStrategy {
        name: "class-product-detail",
        kind: RevealKind::Selector(r#"button[class*="product-detail"]"#),
    },
    RevealStrategy {
        name: "visible-button-text",
        kind: RevealKind::VisibleButtonText,
    },
];

/// Clicks the add-to-cart action so the size panel renders. When every
/// strategy misses, classifies the page: a bot-defense interstitial is
/// ACCESS_DENIED, anything else ADD_ACTION_NOT_FOUND.
pub(crate) fn reveal_size_panel(page: &ProbePage) -> Result<&'static str, ProbeError> {
    for strategy in &REVEAL_STRATEGIES {
        let clicked = match strategy.kind {
            RevealKind::Selector(selector) => page.click_first(selector),
            // A script error here is just another miss
            RevealKind::VisibleButtonText => page
                .evaluate_bool(&click_by_text_script())
                .unwrap_or(false),
        };
        if clicked {
            return Ok(strategy.name);
        }
    }

    let text = page.evaluate_string(PAGE_TEXT_SCRIPT)?;
    if looks_bot_defended(&text) {
        Err(FailureReason::AccessDenied.into())
    } else {
        Err(FailureReason::AddActionNotFound.into())
    }
}

pub(crate) fn looks_bot_defended(page_text: &str) -> bool {
    BOT_DEFENSE.is_match(page_text)
}

fn click_by_text_script() -> String {
    let labels = REVEAL_LABELS
        .iter()
        .map(|label| format!("\"{label}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"(() => {{
    const targets = new Set([{labels}]);
    const visible = (el) => {{
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }};
    const hit = Array.from(document.querySelectorAll("button"))
        .find((el) => visible(el) && targets.has((el.innerText || "").trim().toUpperCase()));
    if (hit) {{
        hit.click();
        return true;
    }}
    return false;
}})()"#
    )
}
