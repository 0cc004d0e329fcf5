use crate::browser::BrowserSession;
use crate::config::ProbeConfig;
use crate::models::{SizeLabel, TrackedItem};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod availability;
pub mod navigate;
pub mod reconcile;
pub mod size_panel;

// Re-exports for convenience
pub use availability::{AvailabilityCapture, AvailabilitySnapshot};
pub use reconcile::{PositionalCorrelation, SkuCorrelation};
pub use size_panel::SizeEntry;

/// Classified probe failures. These travel as values back to the poll
/// controller; only infrastructure faults surface as errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    AccessDenied,
    AddActionNotFound,
    PanelNotFound,
    NoRecognizedSizes,
    AvailabilityTimeout,
    CountMismatch,
    PrefixMismatch,
    ProductIdMissing,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::AccessDenied => "ACCESS_DENIED",
            FailureReason::AddActionNotFound => "ADD_ACTION_NOT_FOUND",
            FailureReason::PanelNotFound => "PANEL_NOT_FOUND",
            FailureReason::NoRecognizedSizes => "NO_RECOGNIZED_SIZES",
            FailureReason::AvailabilityTimeout => "AVAILABILITY_TIMEOUT",
            FailureReason::CountMismatch => "COUNT_MISMATCH",
            FailureReason::PrefixMismatch => "PREFIX_MISMATCH",
            FailureReason::ProductIdMissing => "PRODUCT_ID_MISSING",
        };
        f.write_str(s)
    }
}

/// Verdict for the wanted size. "Not offered" is a valid negative result,
/// not a failure: the probe worked, the product just has no such size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StockCheck {
    NotOffered,
    Offered {
        sku: u64,
        status: String,
        in_stock: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeSuccess {
    pub check: StockCheck,
    pub size_sku_map: BTreeMap<SizeLabel, u64>,
}

impl ProbeSuccess {
    pub fn in_stock(&self) -> bool {
        matches!(self.check, StockCheck::Offered { in_stock: true, .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProbeOutcome {
    Failure(FailureReason),
    Success(ProbeSuccess),
}

/// Pipeline-internal error: a classified outcome short-circuits the probe,
/// a fault escapes to the caller's failure boundary.
#[derive(Debug)]
pub(crate) enum ProbeError {
    Classified(FailureReason),
    Fault(AppError),
}

impl From<FailureReason> for ProbeError {
    fn from(reason: FailureReason) -> Self {
        ProbeError::Classified(reason)
    }
}

impl From<AppError> for ProbeError {
    fn from(err: AppError) -> Self {
        ProbeError::Fault(err)
    }
}

impl From<anyhow::Error> for ProbeError {
    fn from(err: anyhow::Error) -> Self {
        ProbeError::Fault(AppError::browser(err))
    }
}

/// Seam between the poll controller and the browser-driven probe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockProbe: Send + Sync {
    async fn check(&self, item: &TrackedItem) -> Result<ProbeOutcome>;
}

/// Full probe pipeline on a shared Chrome session: navigate, reveal the
/// size panel, extract sizes, await the availability snapshot, reconcile.
pub struct ChromeStockProbe {
    session: Arc<BrowserSession>,
    config: ProbeConfig,
    correlation: Box<dyn SkuCorrelation>,
}

impl ChromeStockProbe {
    pub fn new(session: Arc<BrowserSession>, config: ProbeConfig) -> Self {
        Self::with_correlation(session, config, Box::new(PositionalCorrelation))
    }

    pub fn with_correlation(
        session: Arc<BrowserSession>,
        config: ProbeConfig,
        correlation: Box<dyn SkuCorrelation>,
    ) -> Self {
        Self {
            session,
            config,
            correlation,
        }
    }

    async fn run_probe(&self, item: &TrackedItem) -> std::result::Result<ProbeSuccess, ProbeError> {
        let product_id = item
            .product_id()
            .ok_or(FailureReason::ProductIdMissing)?;

        // Page closes on every exit path below, via Drop
        let page = self.session.new_page()?;

        // Attach before navigating so an early availability response is not missed
        let mut capture = AvailabilityCapture::attach(&page, &product_id)?;

        page.open(&item.url)?;
        tokio::time::sleep(self.config.settle_delay()).await;

        let strategy = navigate::reveal_size_panel(&page)?;
        tracing::debug!("Reveal strategy '{}' matched for item {}", strategy, item.id);

        let entries = size_panel::extract_sizes(&page, &self.config).await?;
        tracing::debug!("Panel sizes for item {}: {:?}", item.id, entries);

        let sizes = size_panel::canonical_sizes(&entries);
        if sizes.is_empty() {
            return Err(FailureReason::NoRecognizedSizes.into());
        }

        let snapshot = capture
            .wait_for_snapshot(self.config.availability_wait())
            .await
            .ok_or(FailureReason::AvailabilityTimeout)?;

        let size_sku_map = self.correlation.correlate(&sizes, &snapshot)?;
        Ok(reconcile::evaluate_target(
            &item.target_size,
            &size_sku_map,
            &snapshot,
        ))
    }
}

#[async_trait]
impl StockProbe for ChromeStockProbe {
    async fn check(&self, item: &TrackedItem) -> Result<ProbeOutcome> {
        match self.run_probe(item).await {
            Ok(success) => Ok(ProbeOutcome::Success(success)),
            Err(ProbeError::Classified(reason)) => Ok(ProbeOutcome::Failure(reason)),
            Err(ProbeError::Fault(err)) => Err(err),
        }
    }
}
