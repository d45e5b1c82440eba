//! Money
//!
//! Currency policy and the largest-remainder allocators every apportioning step is built on.
//! All allocation happens in whole minor units so that results always sum back to the input.

use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// Errors raised when an amount cannot be apportioned exactly.
///
/// Every variant is an internal-consistency failure: callers abort rather than correct.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// An amount was not in the policy currency (amount currency, policy currency).
    #[error("amount has currency {0}, but policy has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// An amount does not fit in minor units.
    #[error("amount overflows minor units")]
    Overflow,

    /// Allocation is only defined over non-negative amounts.
    #[error("cannot allocate negative amount {0}")]
    NegativeAmount(i64),

    /// A nonzero total has nobody to go to.
    #[error("cannot allocate {total} minor units across zero recipients")]
    NoRecipients {
        /// Total that was to be allocated
        total: i64,
    },

    /// A capped allocation asked for more than the recipients can hold.
    #[error("cannot allocate {total} minor units within a capacity of {capacity}")]
    ExceedsCapacity {
        /// Total that was to be allocated
        total: i64,
        /// Sum of the recipient caps
        capacity: i128,
    },

    /// Leftover units remained but every recipient was ineligible.
    #[error("{remaining} minor units left over with no eligible recipient")]
    Unallocatable {
        /// Units that could not be placed
        remaining: i128,
    },

    /// Allocated shares do not add up to the original total.
    #[error("allocated shares sum to {actual}, expected {expected}")]
    SumMismatch {
        /// Original total
        expected: i64,
        /// Sum of the produced shares
        actual: i128,
    },
}

/// Rounding applied when an amount is brought to the currency scale.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Round half away from zero.
    #[default]
    HalfUp,

    /// Round half to the nearest even digit.
    HalfEven,

    /// Round half towards zero.
    HalfDown,

    /// Truncate towards zero.
    Down,

    /// Round away from zero.
    Up,
}

impl From<RoundingMode> for RoundingStrategy {
    fn from(mode: RoundingMode) -> Self {
        match mode {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
        }
    }
}

/// The arithmetic rules of one transaction currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyPolicy<'a> {
    currency: &'a Currency,
    scale: u32,
    rounding: RoundingMode,
}

impl<'a> CurrencyPolicy<'a> {
    /// Policy using the currency's default fraction digits and half-up rounding.
    pub fn new(currency: &'a Currency) -> Self {
        CurrencyPolicy {
            currency,
            scale: currency.exponent.min(MAX_SCALE),
            rounding: RoundingMode::default(),
        }
    }

    /// Override the number of fractional digits.
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.min(MAX_SCALE);
        self
    }

    /// Override the rounding mode.
    #[must_use]
    pub fn with_rounding(mut self, rounding: RoundingMode) -> Self {
        self.rounding = rounding;
        self
    }

    /// Currency all amounts must be in.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Rounding mode.
    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// Zero in the policy currency.
    pub fn zero(&self) -> Money<'a, Currency> {
        self.from_minor(0)
    }

    /// Convert an amount to whole minor units at the policy scale.
    ///
    /// # Errors
    ///
    /// - [`AllocationError::CurrencyMismatch`]: the amount is in a different currency.
    /// - [`AllocationError::Overflow`]: the amount does not fit in an `i64` of minor units.
    pub fn to_minor(&self, money: &Money<'_, Currency>) -> Result<i64, AllocationError> {
        if money.currency() != self.currency {
            return Err(AllocationError::CurrencyMismatch(
                money.currency().iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        let mut rounded = money
            .amount()
            .round_dp_with_strategy(self.scale, self.rounding.into());

        rounded.rescale(self.scale);

        if rounded.scale() != self.scale {
            return Err(AllocationError::Overflow);
        }

        i64::try_from(rounded.mantissa()).map_err(|_err| AllocationError::Overflow)
    }

    /// Build an amount from whole minor units at the policy scale.
    pub fn from_minor(&self, minor: i64) -> Money<'a, Currency> {
        Money::from_decimal(Decimal::new(minor, self.scale), self.currency)
    }
}

/// Split `total` minor units evenly across `count` recipients.
///
/// Every recipient gets `floor(total / count)`; the leftover units go one each to the trailing
/// recipients, so `allocate_evenly(3, 2)` is `[1, 2]`.
///
/// # Errors
///
/// - [`AllocationError::NegativeAmount`]: `total` is negative.
/// - [`AllocationError::NoRecipients`]: `count` is zero but `total` is not.
/// - [`AllocationError::Overflow`]: `count` does not fit in an `i64`.
/// - [`AllocationError::SumMismatch`]: the shares failed to reproduce `total`.
pub fn allocate_evenly(total: i64, count: usize) -> Result<Vec<i64>, AllocationError> {
    if total < 0 {
        return Err(AllocationError::NegativeAmount(total));
    }

    if count == 0 {
        return if total == 0 {
            Ok(Vec::new())
        } else {
            Err(AllocationError::NoRecipients { total })
        };
    }

    let recipients = i64::try_from(count).map_err(|_err| AllocationError::Overflow)?;
    let base = total / recipients;
    let leftover = usize::try_from(total % recipients).map_err(|_err| AllocationError::Overflow)?;
    let first_topped_up = count - leftover;

    let shares: Vec<i64> = (0..count)
        .map(|idx| if idx >= first_topped_up { base + 1 } else { base })
        .collect();

    ensure_sum(total, &shares)?;

    Ok(shares)
}

/// Split `total` minor units across recipients in proportion to `weights`.
///
/// Leftover units go one at a time to recipients in the order given, skipping recipients with
/// zero weight. If every weight is zero the total is split evenly instead.
///
/// # Errors
///
/// - [`AllocationError::NegativeAmount`]: `total` or a weight is negative.
/// - [`AllocationError::NoRecipients`]: `weights` is empty but `total` is not zero.
/// - [`AllocationError::Overflow`]: a share does not fit in an `i64`.
/// - [`AllocationError::SumMismatch`]: the shares failed to reproduce `total`.
pub fn allocate_proportionally(total: i64, weights: &[i64]) -> Result<Vec<i64>, AllocationError> {
    largest_remainder(total, weights, false)
}

/// Split `total` minor units in proportion to `weights`, never giving a recipient more than its
/// own weight.
///
/// Used to spread a discount over priced units: no unit is discounted below zero.
///
/// # Errors
///
/// - [`AllocationError::ExceedsCapacity`]: `total` is larger than the sum of `weights`.
/// - any error of [`allocate_proportionally`].
pub fn allocate_capped(total: i64, weights: &[i64]) -> Result<Vec<i64>, AllocationError> {
    largest_remainder(total, weights, true)
}

fn largest_remainder(
    total: i64,
    weights: &[i64],
    capped: bool,
) -> Result<Vec<i64>, AllocationError> {
    if total < 0 {
        return Err(AllocationError::NegativeAmount(total));
    }

    if let Some(negative) = weights.iter().find(|weight| **weight < 0) {
        return Err(AllocationError::NegativeAmount(*negative));
    }

    if weights.is_empty() {
        return if total == 0 {
            Ok(Vec::new())
        } else {
            Err(AllocationError::NoRecipients { total })
        };
    }

    let weight_sum: i128 = weights.iter().copied().map(i128::from).sum();

    if capped && i128::from(total) > weight_sum {
        return Err(AllocationError::ExceedsCapacity {
            total,
            capacity: weight_sum,
        });
    }

    if weight_sum == 0 {
        return allocate_evenly(total, weights.len());
    }

    let mut shares = weights
        .iter()
        .map(|weight| {
            let share = i128::from(total) * i128::from(*weight) / weight_sum;

            i64::try_from(share).map_err(|_err| AllocationError::Overflow)
        })
        .collect::<Result<Vec<i64>, AllocationError>>()?;

    let mut remaining = i128::from(total) - shares.iter().copied().map(i128::from).sum::<i128>();

    while remaining > 0 {
        let before = remaining;

        for (share, weight) in shares.iter_mut().zip(weights) {
            if remaining == 0 {
                break;
            }

            if *weight == 0 || (capped && *share >= *weight) {
                continue;
            }

            *share += 1;
            remaining -= 1;
        }

        if remaining == before {
            return Err(AllocationError::Unallocatable { remaining });
        }
    }

    ensure_sum(total, &shares)?;

    Ok(shares)
}

/// Check that `shares` reproduce `total` exactly.
pub(crate) fn ensure_sum(total: i64, shares: &[i64]) -> Result<(), AllocationError> {
    let actual: i128 = shares.iter().copied().map(i128::from).sum();

    if actual == i128::from(total) {
        Ok(())
    } else {
        Err(AllocationError::SumMismatch {
            expected: total,
            actual,
        })
    }
}
