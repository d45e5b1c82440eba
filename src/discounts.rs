//! Discounts
//!
//! Apportions a parent's aggregate discount over its split constituent units.

use std::{fmt, hash::Hash};

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    collections::OrderedMap,
    items::LineItemId,
    money::{AllocationError, CurrencyPolicy, allocate_capped},
    pricing::ItemPricing,
    splitting::{SplitConstituents, SplitPricingMap},
};

/// Errors specific to discount apportioning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Wrapped allocation invariant failure.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The discount sequence does not line up with the split units (units, discounts).
    #[error("{units} split units cannot take {discounts} positional discounts")]
    PositionMismatch {
        /// Number of split units across all constituents
        units: usize,
        /// Number of discounts supplied
        discounts: usize,
    },
}

/// Synthetic key of one split unit: its constituent and its position in that constituent's
/// unit list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitUnitKey {
    /// Constituent the unit belongs to
    pub line: LineItemId,
    /// Position within the constituent's units
    pub index: usize,
}

impl fmt::Display for SplitUnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.line, self.index)
    }
}

/// Project each pricing onto its discount, using zero where none is set.
pub fn extract_discount<'a, K: Clone + Eq + Hash>(
    pricing_by_key: &OrderedMap<K, ItemPricing<'a>>,
) -> OrderedMap<K, Money<'a, Currency>> {
    pricing_by_key
        .iter()
        .map(|(key, pricing)| (key.clone(), pricing.discount_or_zero()))
        .collect()
}

/// Order amounts from largest to smallest. Equal amounts keep their relative order.
pub fn sort_by_amount<'a, K: Clone + Eq + Hash>(
    amounts_by_key: impl IntoIterator<Item = (K, Money<'a, Currency>)>,
) -> OrderedMap<K, Money<'a, Currency>> {
    let mut sorted: OrderedMap<K, Money<'a, Currency>> = amounts_by_key.into_iter().collect();

    sorted.sort_by(|(_, a), (_, b)| b.amount().cmp(a.amount()));

    sorted
}

/// Apportion each parent's discount over all of its split units in proportion to unit price.
///
/// Units are weighted in descending price order, so leftover minor units favour the most
/// expensive units. A discount larger than the units' combined price is clamped to that price.
/// Parents without a discount entry get a zero discount on every unit.
///
/// # Errors
///
/// Returns a [`DiscountError`] if an amount is in the wrong currency or the apportioned
/// discounts fail to reproduce the parent total.
pub fn apply_apportioned_discount<'a>(
    split_pricing_map: &mut SplitPricingMap<'a>,
    discount_by_parent: &OrderedMap<LineItemId, Money<'a, Currency>>,
    policy: &CurrencyPolicy<'a>,
) -> Result<(), DiscountError> {
    for (parent, split_constituents) in split_pricing_map.iter_mut() {
        let discount = match discount_by_parent.get(parent) {
            Some(discount) => policy.to_minor(discount)?,
            None => 0,
        };

        let unit_prices = sort_by_amount(split_unit_prices(split_constituents));

        let weights = unit_prices
            .values()
            .map(|price| policy.to_minor(price))
            .collect::<Result<Vec<i64>, AllocationError>>()?;

        let capacity: i128 = weights.iter().copied().map(i128::from).sum();
        let discount = if i128::from(discount) > capacity {
            // below an i64 discount, so it fits
            let capacity = i64::try_from(capacity).map_err(|_err| AllocationError::Overflow)?;

            warn!(
                line = %parent,
                discount = %policy.from_minor(discount),
                price = %policy.from_minor(capacity),
                "bundle discount exceeds price; clamping to price"
            );

            capacity
        } else {
            discount
        };

        let shares = allocate_capped(discount, &weights)?;

        let by_unit: OrderedMap<SplitUnitKey, Money<'a, Currency>> = unit_prices
            .keys()
            .cloned()
            .zip(shares.into_iter().map(|minor| policy.from_minor(minor)))
            .collect();

        // back to flattening order for positional assignment
        let sequence: OrderedMap<SplitUnitKey, Money<'a, Currency>> = unit_keys(split_constituents)
            .filter_map(|key| by_unit.get(&key).map(|discount| (key, *discount)))
            .collect();

        debug!(line = %parent, discount, units = sequence.len(), "apportioned discount");

        set_apportioned_discount(split_constituents, &sequence)?;
    }

    Ok(())
}

/// Assign discounts position-for-position onto the concatenation of all unit lists.
///
/// # Errors
///
/// Returns [`DiscountError::PositionMismatch`] if the number of units and discounts differ.
pub fn set_apportioned_discount<'a, K: Clone + Eq + Hash>(
    split_child_pricing: &mut SplitConstituents<'a>,
    discount_sequence: &OrderedMap<K, Money<'a, Currency>>,
) -> Result<(), DiscountError> {
    let units: usize = split_child_pricing.values().map(Vec::len).sum();

    if units != discount_sequence.len() {
        return Err(DiscountError::PositionMismatch {
            units,
            discounts: discount_sequence.len(),
        });
    }

    let all_units = split_child_pricing.values_mut().flat_map(|units| units.iter_mut());

    for (unit, discount) in all_units.zip(discount_sequence.values()) {
        *unit = unit.with_discount(*discount);
    }

    Ok(())
}

/// Keys of every split unit in flattening order.
fn unit_keys<'s>(
    split_constituents: &'s SplitConstituents<'_>,
) -> impl Iterator<Item = SplitUnitKey> + 's {
    split_constituents.iter().flat_map(|(line, units)| {
        (0..units.len()).map(move |index| SplitUnitKey {
            line: line.clone(),
            index,
        })
    })
}

/// Price of every split unit in flattening order.
fn split_unit_prices<'a>(
    split_constituents: &SplitConstituents<'a>,
) -> Vec<(SplitUnitKey, Money<'a, Currency>)> {
    unit_keys(split_constituents)
        .zip(split_constituents.values().flatten().map(|unit| *unit.price()))
        .collect()
}
