use crate::models::SizeLabel;
use crate::probe::availability::AvailabilitySnapshot;
use crate::probe::{FailureReason, ProbeSuccess, StockCheck};
use std::collections::{BTreeMap, HashSet};

/// Statuses that count as purchasable.
pub const AVAILABLE_STATUSES: [&str; 2] = ["in_stock", "low_on_stock"];

pub fn is_available(status: &str) -> bool {
    AVAILABLE_STATUSES.contains(&status)
}

/// First six decimal digits of a SKU, None when the SKU is shorter.
pub fn sku_prefix(sku: u64) -> Option<String> {
    let digits = sku.to_string();
    (digits.len() >= 6).then(|| digits[..6].to_string())
}

/// Aligns canonical-ordered sizes with snapshot SKUs. The site exposes no
/// shared key between the panel and the availability feed, so every
/// implementation rests on structural assumptions; each one verifies its
/// own preconditions and fails rather than guess.
pub trait SkuCorrelation: Send + Sync {
    fn name(&self) -> &'static str;

    fn correlate(
        &self,
        sizes: &[SizeLabel],
        snapshot: &AvailabilitySnapshot,
    ) -> Result<BTreeMap<SizeLabel, u64>, FailureReason>;
}

/// Pairs the i-th canonical size with the i-th ascending SKU. Sound only
/// when the counts match and all SKUs belong to one product family, which
/// the shared 6-digit prefix stands in for.
pub struct PositionalCorrelation;

impl SkuCorrelation for PositionalCorrelation {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn correlate(
        &self,
        sizes: &[SizeLabel],
        snapshot: &AvailabilitySnapshot,
    ) -> Result<BTreeMap<SizeLabel, u64>, FailureReason> {
        let skus: Vec<u64> = snapshot.skus().collect();

        if skus.len() != sizes.len() {
            return Err(FailureReason::CountMismatch);
        }

        let prefixes: HashSet<Option<String>> = skus.iter().map(|&sku| sku_prefix(sku)).collect();
        if prefixes.len() != 1 {
            return Err(FailureReason::PrefixMismatch);
        }

        Ok(sizes.iter().copied().zip(skus).collect())
    }
}

/// Looks the wanted size up in the reconciled map and renders the verdict.
/// A target outside the map, including free text that is not a canonical
/// label at all, is NotOffered.
pub fn evaluate_target(
    target_size: &str,
    size_sku_map: &BTreeMap<SizeLabel, u64>,
    snapshot: &AvailabilitySnapshot,
) -> ProbeSuccess {
    let sku = target_size
        .parse::<SizeLabel>()
        .ok()
        .and_then(|label| size_sku_map.get(&label).copied());

    let check = match sku {
        None => StockCheck::NotOffered,
        Some(sku) => {
            let status = snapshot.status_of(sku).unwrap_or_default();
            let in_stock = is_available(&status);
            StockCheck::Offered {
                sku,
                status,
                in_stock,
            }
        }
    };

    ProbeSuccess {
        check,
        size_sku_map: size_sku_map.clone(),
    }
}
