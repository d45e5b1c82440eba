//! Pricing

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::warn;

use crate::money::{AllocationError, CurrencyPolicy};

/// Errors raised while constructing pricing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// Pricing must cover at least one unit.
    #[error("pricing quantity must be at least 1")]
    ZeroQuantity,
}

/// The total price and total discount of `quantity` units of one line.
///
/// Amounts are line totals, not per-unit amounts. The discount stays unset until it has been
/// apportioned, and once set never exceeds the price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemPricing<'a> {
    price: Money<'a, Currency>,
    discount: Option<Money<'a, Currency>>,
    quantity: u32,
}

impl<'a> ItemPricing<'a> {
    /// Create pricing for `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::ZeroQuantity`] if `quantity` is zero.
    pub fn new(
        price: Money<'a, Currency>,
        discount: Option<Money<'a, Currency>>,
        quantity: u32,
    ) -> Result<Self, PricingError> {
        if quantity == 0 {
            return Err(PricingError::ZeroQuantity);
        }

        Ok(ItemPricing {
            price,
            discount,
            quantity,
        })
    }

    /// Pricing for a single unit with no discount assigned yet.
    pub fn unit(price: Money<'a, Currency>) -> Self {
        ItemPricing {
            price,
            discount: None,
            quantity: 1,
        }
    }

    /// Total price of all units.
    pub fn price(&self) -> &Money<'a, Currency> {
        &self.price
    }

    /// Total discount of all units, if one has been assigned.
    pub fn discount(&self) -> Option<&Money<'a, Currency>> {
        self.discount.as_ref()
    }

    /// Total discount, or zero when none has been assigned.
    pub fn discount_or_zero(&self) -> Money<'a, Currency> {
        self.discount
            .unwrap_or_else(|| Money::from_decimal(Decimal::ZERO, self.price.currency()))
    }

    /// Number of units this pricing covers.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Same units at a different total price, keeping discount and quantity.
    #[must_use]
    pub fn with_price(self, price: Money<'a, Currency>) -> Self {
        ItemPricing { price, ..self }
    }

    /// Assign the discount, clamped so it never exceeds the price.
    #[must_use]
    pub fn with_discount(self, discount: Money<'a, Currency>) -> Self {
        ItemPricing {
            discount: Some(clamp_discount(&self.price, discount)),
            ..self
        }
    }

    /// Price after discount. Never negative.
    pub fn net_price(&self) -> Money<'a, Currency> {
        let discount = clamp_discount(&self.price, self.discount_or_zero());

        Money::from_decimal(
            *self.price.amount() - *discount.amount(),
            self.price.currency(),
        )
    }
}

/// Limit `discount` to `price`, warning when the clamp kicks in.
pub(crate) fn clamp_discount<'a>(
    price: &Money<'a, Currency>,
    discount: Money<'a, Currency>,
) -> Money<'a, Currency> {
    if discount.amount() > price.amount() {
        warn!(
            discount = %discount,
            price = %price,
            "discount exceeds price; clamping to price"
        );

        *price
    } else {
        discount
    }
}

/// Sum the prices of a set of pricings in minor units.
///
/// # Errors
///
/// Returns an [`AllocationError`] if a price is in the wrong currency or the sum overflows.
pub fn total_price<'a, 'p>(
    pricings: impl IntoIterator<Item = &'p ItemPricing<'a>>,
    policy: &CurrencyPolicy<'_>,
) -> Result<i64, AllocationError>
where
    'a: 'p,
{
    pricings.into_iter().try_fold(0_i64, |acc, pricing| {
        acc.checked_add(policy.to_minor(pricing.price())?)
            .ok_or(AllocationError::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn new_rejects_zero_quantity() {
        let result = ItemPricing::new(Money::from_minor(100, GBP), None, 0);

        assert_eq!(result, Err(PricingError::ZeroQuantity));
    }

    #[test]
    fn unit_has_quantity_one_and_no_discount() {
        let pricing = ItemPricing::unit(Money::from_minor(250, GBP));

        assert_eq!(pricing.quantity(), 1);
        assert!(pricing.discount().is_none());
        assert_eq!(pricing.discount_or_zero(), Money::from_minor(0, GBP));
    }

    #[test]
    fn with_discount_clamps_to_price() -> TestResult {
        let pricing = ItemPricing::new(Money::from_minor(300, GBP), None, 2)?
            .with_discount(Money::from_minor(500, GBP));

        assert_eq!(pricing.discount(), Some(&Money::from_minor(300, GBP)));
        assert_eq!(pricing.net_price(), Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn net_price_never_goes_negative() -> TestResult {
        let pricing = ItemPricing::new(
            Money::from_minor(300, GBP),
            Some(Money::from_minor(301, GBP)),
            1,
        )?;

        assert_eq!(pricing.net_price(), Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn net_price_subtracts_discount() -> TestResult {
        let pricing = ItemPricing::new(
            Money::from_minor(999, GBP),
            Some(Money::from_minor(100, GBP)),
            3,
        )?;

        assert_eq!(pricing.net_price(), Money::from_minor(899, GBP));

        Ok(())
    }

    #[test]
    fn with_price_keeps_discount_and_quantity() -> TestResult {
        let pricing = ItemPricing::new(
            Money::from_minor(999, GBP),
            Some(Money::from_minor(100, GBP)),
            3,
        )?
        .with_price(Money::from_minor(500, GBP));

        assert_eq!(pricing.price(), &Money::from_minor(500, GBP));
        assert_eq!(pricing.discount(), Some(&Money::from_minor(100, GBP)));
        assert_eq!(pricing.quantity(), 3);

        Ok(())
    }

    #[test]
    fn total_price_sums_minor_units() -> TestResult {
        let policy = CurrencyPolicy::new(GBP);
        let pricings = [
            ItemPricing::unit(Money::from_minor(100, GBP)),
            ItemPricing::unit(Money::from_minor(250, GBP)),
        ];

        assert_eq!(total_price(&pricings, &policy)?, 350);

        Ok(())
    }
}
