use crate::models::{NewTrackedItem, TrackedItem, PRODUCT_ID_PARAM};
use crate::notifiers::Notifier;
use crate::probe::{FailureReason, ProbeOutcome, StockCheck, StockProbe};
use crate::store::ItemStore;
use crate::utils::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// Consecutive failed checks of one item before the log escalates to warn.
const FAILURE_ESCALATION_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub eligible: usize,
    pub checked: usize,
    pub in_stock: usize,
    pub access_denied: usize,
    pub failures: usize,
    pub elapsed_ms: u64,
}

/// Owns the tracked-item list and drives poll cycles over it. Cycles may
/// be triggered by the scheduler, the HTTP API or startup; overlapping
/// triggers are dropped, never queued.
pub struct PollController {
    items: Mutex<Vec<TrackedItem>>,
    store: Arc<dyn ItemStore>,
    notifier: Arc<dyn Notifier>,
    probe: Arc<dyn StockProbe>,
    cycle_guard: Mutex<()>,
    failure_counts: Mutex<HashMap<String, u32>>,
}

impl PollController {
    pub fn new(
        items: Vec<TrackedItem>,
        store: Arc<dyn ItemStore>,
        notifier: Arc<dyn Notifier>,
        probe: Arc<dyn StockProbe>,
    ) -> Self {
        Self {
            items: Mutex::new(items),
            store,
            notifier,
            probe,
            cycle_guard: Mutex::new(()),
            failure_counts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn items(&self) -> Vec<TrackedItem> {
        self.items.lock().await.clone()
    }

    pub async fn track(&self, new_item: NewTrackedItem) -> Result<TrackedItem> {
        let url = new_item.url.trim().to_string();
        if Url::parse(&url).is_err() {
            return Err(AppError::Validation(format!("Invalid URL: {url}")));
        }
        if TrackedItem::product_id_of(&url).is_none() {
            return Err(AppError::Validation(format!(
                "URL is missing the '{PRODUCT_ID_PARAM}' product id parameter"
            )));
        }
        if new_item.size.trim().is_empty() {
            return Err(AppError::Validation("Size must not be empty".to_string()));
        }

        let item = TrackedItem::new(NewTrackedItem {
            url,
            size: new_item.size,
        });

        let mut items = self.items.lock().await;
        items.push(item.clone());
        self.store.save(&items).await?;

        info!(
            "Tracking item {} (size {}, {})",
            item.id, item.target_size, item.url
        );
        Ok(item)
    }

    pub async fn untrack(&self, id: &str) -> Result<TrackedItem> {
        let removed = {
            let mut items = self.items.lock().await;
            let Some(position) = items.iter().position(|item| item.id == id) else {
                return Err(AppError::NotFound {
                    resource: format!("tracked item {id}"),
                });
            };
            let removed = items.remove(position);
            self.store.save(&items).await?;
            removed
        };

        self.failure_counts.lock().await.remove(id);
        info!("Stopped tracking item {}", id);
        Ok(removed)
    }

    /// Runs one poll cycle over the eligible items. Returns None when a
    /// cycle is already in flight and this trigger was dropped.
    pub async fn run_cycle(&self) -> Option<CycleSummary> {
        let _guard = match self.cycle_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Poll cycle already in flight, trigger dropped");
                return None;
            }
        };

        let started_at = Utc::now();
        let start = Instant::now();

        // Snapshot under the lock, probe outside it: items stay editable
        // through the API while a cycle runs
        let (eligible, total) = {
            let items = self.items.lock().await;
            let now = Utc::now();
            let eligible: Vec<TrackedItem> = items
                .iter()
                .filter(|item| item.is_eligible(now))
                .cloned()
                .collect();
            (eligible, items.len())
        };

        info!(
            "Poll cycle started: {} of {} items eligible",
            eligible.len(),
            total
        );

        let mut summary = CycleSummary {
            started_at,
            eligible: eligible.len(),
            checked: 0,
            in_stock: 0,
            access_denied: 0,
            failures: 0,
            elapsed_ms: 0,
        };

        for item in &eligible {
            summary.checked += 1;
            match self.probe.check(item).await {
                Ok(ProbeOutcome::Success(success)) => {
                    self.clear_failures(&item.id).await;
                    match success.check {
                        StockCheck::Offered {
                            sku,
                            status,
                            in_stock: true,
                        } => {
                            summary.in_stock += 1;
                            info!(
                                "Item {} size {} in stock (sku {}, {})",
                                item.id, item.target_size, sku, status
                            );
                            self.handle_in_stock(item, sku, &status).await;
                        }
                        StockCheck::Offered { status, .. } => {
                            debug!(
                                "Item {} size {} not available ({})",
                                item.id, item.target_size, status
                            );
                        }
                        StockCheck::NotOffered => {
                            debug!(
                                "Item {} size {} not offered for this product",
                                item.id, item.target_size
                            );
                        }
                    }
                }
                Ok(ProbeOutcome::Failure(FailureReason::AccessDenied)) => {
                    summary.access_denied += 1;
                    warn!("Item {} blocked by bot defense, cooling down", item.id);
                    self.handle_access_denied(item).await;
                }
                Ok(ProbeOutcome::Failure(reason)) => {
                    summary.failures += 1;
                    self.note_failure(&item.id, &reason.to_string()).await;
                }
                Err(e) => {
                    // One broken probe must not sink the rest of the cycle
                    summary.failures += 1;
                    error!("Probe fault for item {}: {}", item.id, e);
                    self.note_failure(&item.id, "probe fault").await;
                }
            }
        }

        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Poll cycle finished in {}ms: {} checked, {} in stock, {} access denied, {} failures",
            summary.elapsed_ms,
            summary.checked,
            summary.in_stock,
            summary.access_denied,
            summary.failures
        );
        Some(summary)
    }

    async fn handle_in_stock(&self, item: &TrackedItem, sku: u64, status: &str) {
        let message = stock_message(item, sku, status);
        if let Err(e) = self.notifier.send(&message).await {
            // The transition below still applies; a sighting is consumed
            // exactly once
            warn!(
                "Failed to deliver stock alert for item {} via {}: {}",
                item.id,
                self.notifier.name(),
                e
            );
        }

        let now = Utc::now();
        if let Err(e) = self.commit(&item.id, |it| it.mark_notified(now)).await {
            error!("Failed to persist notified state for item {}: {}", item.id, e);
        }
    }

    async fn handle_access_denied(&self, item: &TrackedItem) {
        let now = Utc::now();
        if let Err(e) = self.commit(&item.id, |it| it.begin_cooldown(now)).await {
            error!("Failed to persist cooldown for item {}: {}", item.id, e);
        }

        if let Err(e) = self.notifier.send(&degraded_message(item)).await {
            warn!(
                "Failed to deliver degraded-mode notice for item {}: {}",
                item.id, e
            );
        }
    }

    /// Applies a state change to the live list by id and persists. An item
    /// untracked while its probe ran is gone; nothing to commit.
    async fn commit<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut TrackedItem),
    {
        let mut items = self.items.lock().await;
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            debug!("Item {} untracked mid-cycle, dropping state change", id);
            return Ok(());
        };
        mutate(item);
        self.store.save(&items).await
    }

    async fn note_failure(&self, id: &str, reason: &str) {
        let mut counts = self.failure_counts.lock().await;
        let count = counts.entry(id.to_string()).or_insert(0);
        *count += 1;
        if *count >= FAILURE_ESCALATION_THRESHOLD {
            warn!("Item {} failed {} consecutive checks: {}", id, count, reason);
        } else {
            info!("Item {} check failed: {}", id, reason);
        }
    }

    async fn clear_failures(&self, id: &str) {
        self.failure_counts.lock().await.remove(id);
    }
}

fn stock_message(item: &TrackedItem, sku: u64, status: &str) -> String {
    format!(
        "Stock alert!\nSize: {}\nStatus: {}\nSKU: {}\n{}",
        item.target_size, status, sku, item.url
    )
}

fn degraded_message(item: &TrackedItem) -> String {
    format!(
        "Access denied by bot protection.\nChecks for this item are paused for 1 hour.\n{}",
        item.url
    )
}
