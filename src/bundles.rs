//! Bundles
//!
//! A bundle is sold at its own price, not at the sum of its constituents' prices. Before
//! splitting, that price is spread over the constituents so they add up to what the customer
//! actually pays for the bundle line.

use tracing::debug;

use crate::{
    extraction::{ConstituentPricingMap, RootPricingMap},
    money::{AllocationError, CurrencyPolicy, allocate_proportionally, ensure_sum},
};

/// Redistribute each root's price over its constituents in proportion to their own prices.
///
/// A root line of quantity N holds N bundles. The line total is first split evenly into
/// per-bundle prices (leftovers on the trailing bundles), each bundle is apportioned on its
/// own, and the shares are added back up. N bundles on one line therefore round exactly like
/// N lines of one bundle.
///
/// Constituents are weighted in map order (most expensive first), so leftover minor units go
/// to the most expensive constituents. Quantities and discounts are left untouched, and roots
/// without constituents are skipped.
///
/// # Errors
///
/// Returns an [`AllocationError`] if an amount is in the wrong currency or the apportioned
/// prices fail to reproduce the root price.
pub fn apportion_bundle_prices<'a>(
    root_pricing: &RootPricingMap<'a>,
    mut constituents: ConstituentPricingMap<'a>,
    policy: &CurrencyPolicy<'a>,
) -> Result<ConstituentPricingMap<'a>, AllocationError> {
    for (root, pricing) in root_pricing.iter() {
        let Some(children) = constituents.get_mut(root) else {
            continue;
        };

        if children.is_empty() {
            continue;
        }

        let total = policy.to_minor(pricing.price())?;
        let weights = children
            .values()
            .map(|child| policy.to_minor(child.price()))
            .collect::<Result<Vec<i64>, AllocationError>>()?;

        let shares = apportion_per_bundle(total, pricing.quantity(), &weights)?;

        for (child, share) in children.values_mut().zip(shares) {
            *child = child.with_price(policy.from_minor(share));
        }

        debug!(
            line = %root,
            total,
            bundles = pricing.quantity(),
            constituents = children.len(),
            "apportioned bundle price"
        );
    }

    Ok(constituents)
}

/// Apportion `total` as `bundles` equal bundles, then sum each constituent's shares.
fn apportion_per_bundle(
    total: i64,
    bundles: u32,
    weights: &[i64],
) -> Result<Vec<i64>, AllocationError> {
    let bundles = i64::from(bundles.max(1));
    let base = total / bundles;
    let topped_up = total % bundles;

    let base_shares = allocate_proportionally(base, weights)?;
    let topped_up_shares = if topped_up == 0 {
        vec![0; weights.len()]
    } else {
        allocate_proportionally(base + 1, weights)?
    };

    let shares = base_shares
        .into_iter()
        .zip(topped_up_shares)
        .map(|(base_share, topped_up_share)| {
            base_share
                .checked_mul(bundles - topped_up)
                .zip(topped_up_share.checked_mul(topped_up))
                .and_then(|(plain, extra)| plain.checked_add(extra))
                .ok_or(AllocationError::Overflow)
        })
        .collect::<Result<Vec<i64>, AllocationError>>()?;

    ensure_sum(total, &shares)?;

    Ok(shares)
}
