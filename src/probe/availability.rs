use crate::browser::ProbePage;
use crate::utils::error::{AppError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;

/// URL fragment that identifies the availability endpoint.
const AVAILABILITY_MARKER: &str = "/availability";

/// Latest per-SKU availability published by the page. Every accepted
/// response replaces the snapshot wholesale; there is no merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    by_sku: BTreeMap<u64, String>,
}

impl AvailabilitySnapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = (u64, String)>) -> Self {
        Self {
            by_sku: entries.into_iter().collect(),
        }
    }

    /// Parses an availability response body. None when the payload is not
    /// a `skusAvailability` array; entries that do not carry a numeric SKU
    /// and a string status are skipped.
    pub fn from_body(body: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(body).ok()?;
        let entries = value.get("skusAvailability")?.as_array()?;
        let by_sku = entries
            .iter()
            .filter_map(|entry| {
                let sku = entry.get("sku").and_then(sku_number)?;
                let status = entry.get("availability")?.as_str()?;
                Some((sku, status.to_string()))
            })
            .collect();
        Some(Self { by_sku })
    }

    /// SKUs in ascending numeric order.
    pub fn skus(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_sku.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_sku.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sku.is_empty()
    }

    pub fn status_of(&self, sku: u64) -> Option<String> {
        self.by_sku.get(&sku).cloned()
    }
}

// SKUs arrive as JSON numbers or as numeric strings depending on the
// endpoint revision
fn sku_number(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn scoped_path(product_id: &str) -> String {
    format!("/product/id/{product_id}{AVAILABILITY_MARKER}")
}

fn accepts(url: &str, scope: &str) -> bool {
    url.contains(AVAILABILITY_MARKER) && url.contains(scope)
}

/// Captures availability responses for one probe. Must be attached before
/// navigation: the page fires the availability request during initial
/// render and a late listener would miss it.
pub struct AvailabilityCapture {
    rx: watch::Receiver<Option<AvailabilitySnapshot>>,
}

impl AvailabilityCapture {
    pub fn attach(page: &ProbePage, product_id: &str) -> Result<Self> {
        let (tx, rx) = watch::channel(None);
        let scope = scoped_path(product_id);

        page.tab()
            .register_response_handling(
                "availability-capture",
                Box::new(move |params, fetch_body| {
                    if !accepts(&params.response.url, &scope) {
                        return;
                    }
                    // The body may not be retrievable yet; a later response
                    // for the same endpoint will replace it
                    let body = match fetch_body() {
                        Ok(body) => body,
                        Err(_) => return,
                    };
                    let raw = if body.base_64_encoded {
                        match BASE64
                            .decode(&body.body)
                            .ok()
                            .and_then(|bytes| String::from_utf8(bytes).ok())
                        {
                            Some(raw) => raw,
                            None => return,
                        }
                    } else {
                        body.body
                    };
                    if let Some(snapshot) = AvailabilitySnapshot::from_body(&raw) {
                        let _ = tx.send(Some(snapshot));
                    }
                }),
            )
            .map_err(AppError::browser)?;

        Ok(Self { rx })
    }

    /// Resolves as soon as any snapshot has been published, returning the
    /// newest one. None when the budget expires first.
    pub async fn wait_for_snapshot(&mut self, budget: Duration) -> Option<AvailabilitySnapshot> {
        let ready = self.rx.wait_for(|snapshot| snapshot.is_some());
        match tokio::time::timeout(budget, ready).await {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => None,
        }
    }
}
