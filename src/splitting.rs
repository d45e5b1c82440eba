//! Splitting
//!
//! Turns line totals into single-unit pricing.

use tracing::trace;

use crate::{
    collections::OrderedMap,
    extraction::ConstituentPricingMap,
    items::LineItemId,
    money::{AllocationError, CurrencyPolicy, allocate_evenly},
    pricing::ItemPricing,
};

/// Constituent identity to its single-unit pricings, in constituent order.
pub type SplitConstituents<'a> = OrderedMap<LineItemId, Vec<ItemPricing<'a>>>;

/// Parent identity to its split constituents, in forest order.
pub type SplitPricingMap<'a> = OrderedMap<LineItemId, SplitConstituents<'a>>;

/// Split the pricing of `quantity` units into one pricing per unit.
///
/// Unit prices sum exactly to the original price; leftover minor units land on the trailing
/// units. Discounts are left unset for the apportioner.
///
/// # Errors
///
/// Returns an [`AllocationError`] if the price is not in the policy currency, is negative, or
/// cannot be reproduced exactly.
pub fn split_by_quantity<'a>(
    pricing: &ItemPricing<'a>,
    policy: &CurrencyPolicy<'a>,
) -> Result<Vec<ItemPricing<'a>>, AllocationError> {
    let total = policy.to_minor(pricing.price())?;
    let count = usize::try_from(pricing.quantity()).map_err(|_err| AllocationError::Overflow)?;

    let units = allocate_evenly(total, count)?;

    trace!(total, ?units, "split pricing by quantity");

    Ok(units
        .into_iter()
        .map(|minor| ItemPricing::unit(policy.from_minor(minor)))
        .collect())
}

/// Split every constituent of every parent, keeping both orders.
///
/// # Errors
///
/// Returns the first [`AllocationError`] raised by [`split_by_quantity`].
pub fn split_constituents_by_quantity<'a>(
    pricing_map: &ConstituentPricingMap<'a>,
    policy: &CurrencyPolicy<'a>,
) -> Result<SplitPricingMap<'a>, AllocationError> {
    pricing_map
        .iter()
        .map(|(parent, constituents)| {
            let split = constituents
                .iter()
                .map(|(child, pricing)| Ok((child.clone(), split_by_quantity(pricing, policy)?)))
                .collect::<Result<SplitConstituents<'a>, AllocationError>>()?;

            Ok((parent.clone(), split))
        })
        .collect()
}
