//! Extraction
//!
//! Pulls root and constituent pricing out of a line item forest.

use std::cmp::Ordering;

use crate::{
    collections::OrderedMap,
    items::{LineItemId, LineItemNode},
    pricing::ItemPricing,
};

/// Root identity to the root's own line pricing, in forest order.
pub type RootPricingMap<'a> = OrderedMap<LineItemId, ItemPricing<'a>>;

/// Constituent identity to its line pricing, ordered most expensive first.
pub type ConstituentPricing<'a> = OrderedMap<LineItemId, ItemPricing<'a>>;

/// Root identity to the pricing of every non-bundle line beneath it, in forest order.
pub type ConstituentPricingMap<'a> = OrderedMap<LineItemId, ConstituentPricing<'a>>;

/// Record each root's own pricing.
pub fn extract_root_pricing<'a>(roots: &[LineItemNode<'a>]) -> RootPricingMap<'a> {
    roots
        .iter()
        .map(|root| (root.id().clone(), *root.pricing()))
        .collect()
}

/// Collect, per root, the pricing of every non-bundle descendant.
///
/// Intermediate bundles are flattened away: only leaves appear, keyed by their own identity,
/// under the top-level root. A root that is not a bundle gets an empty map. Entries are ordered
/// by descending price, then descending SKU code, then descending identity.
pub fn extract_constituent_pricing<'a>(roots: &[LineItemNode<'a>]) -> ConstituentPricingMap<'a> {
    roots
        .iter()
        .map(|root| {
            let mut constituents = root.constituents();
            constituents.sort_by(|a, b| constituent_order(a, b));

            let pricing: ConstituentPricing<'a> = constituents
                .into_iter()
                .map(|item| (item.id().clone(), *item.pricing()))
                .collect();

            (root.id().clone(), pricing)
        })
        .collect()
}

/// Most expensive first; ties go to the greater SKU code, then the greater identity.
fn constituent_order(a: &LineItemNode<'_>, b: &LineItemNode<'_>) -> Ordering {
    b.pricing()
        .price()
        .amount()
        .cmp(a.pricing().price().amount())
        .then_with(|| b.sku_code().cmp(a.sku_code()))
        .then_with(|| b.id().cmp(a.id()))
}
