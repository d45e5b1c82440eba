//! Order Lines
//!
//! Rebuilds the cart's line item forest as finalised order lines, taking unit prices and
//! discounts for leaves from the apportioned, split pricing.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::warn;

use crate::{
    discounts::DiscountError,
    items::{LineDetails, LineItemId, LineItemNode},
    money::{AllocationError, CurrencyPolicy, allocate_capped, allocate_evenly},
    pricing::{ItemPricing, clamp_discount},
    splitting::SplitPricingMap,
};

pub mod details;
pub mod factory;

pub use details::{CopyLineDetails, LineDetailsCopier};
pub use factory::OrderLineFactory;

/// The leaf pricing handed to the materializer does not match the line item forest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuralMismatch {
    /// Pricing ran out before the leaf's quantity was covered.
    #[error("line {line} needs {required} units but pricing ran out after {covered}")]
    Underrun {
        /// Leaf line
        line: LineItemId,
        /// Units the leaf needs
        required: u32,
        /// Units covered before the queue was exhausted
        covered: u32,
    },

    /// A pricing entry covers more units than the leaf still needs.
    #[error("line {line} needs {required} units but pricing offers {offered}")]
    Overrun {
        /// Leaf line
        line: LineItemId,
        /// Units the leaf needs
        required: u32,
        /// Units covered including the oversized entry
        offered: u32,
    },

    /// Pricing remained for lines that were never materialized.
    #[error("pricing left unconsumed for lines {lines:?}")]
    Unconsumed {
        /// Lines with leftover pricing, sorted
        lines: Vec<LineItemId>,
    },
}

/// Errors that abort order line creation. No partial output is ever returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderLineError {
    /// A leaf line has no pricing at all.
    #[error("no pricing for leaf line {0}")]
    MissingPricing(LineItemId),

    /// Leaf pricing and forest shape disagree.
    #[error(transparent)]
    StructuralMismatch(#[from] StructuralMismatch),

    /// An amount could not be apportioned exactly.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// A discount could not be apportioned.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// A finalised order line, mirroring the shape of the cart line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineNode<'a> {
    id: LineItemId,
    sku_code: String,
    quantity: u32,
    unit_price: Money<'a, Currency>,
    discount: Money<'a, Currency>,
    bundle: bool,
    details: LineDetails,
    children: Vec<OrderLineNode<'a>>,
}

impl<'a> OrderLineNode<'a> {
    /// Create an order line without details or children.
    pub fn new(
        id: LineItemId,
        sku_code: impl Into<String>,
        quantity: u32,
        unit_price: Money<'a, Currency>,
        discount: Money<'a, Currency>,
    ) -> Self {
        OrderLineNode {
            id,
            sku_code: sku_code.into(),
            quantity,
            unit_price,
            discount,
            bundle: false,
            details: LineDetails::default(),
            children: Vec::new(),
        }
    }

    /// Identity of the cart line this order line came from.
    pub fn id(&self) -> &LineItemId {
        &self.id
    }

    /// SKU code.
    pub fn sku_code(&self) -> &str {
        &self.sku_code
    }

    /// Quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price.
    pub fn unit_price(&self) -> &Money<'a, Currency> {
        &self.unit_price
    }

    /// Discount. Never exceeds the unit price.
    pub fn discount(&self) -> &Money<'a, Currency> {
        &self.discount
    }

    /// Unit price less discount.
    pub fn net_price(&self) -> Money<'a, Currency> {
        Money::from_decimal(
            *self.unit_price.amount() - *self.discount.amount(),
            self.unit_price.currency(),
        )
    }

    /// Descriptive details.
    pub fn details(&self) -> &LineDetails {
        &self.details
    }

    /// Child order lines, in cart order.
    pub fn children(&self) -> &[OrderLineNode<'a>] {
        &self.children
    }

    /// Whether this order line has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this order line came from a bundle.
    pub fn is_bundle(&self) -> bool {
        self.bundle
    }

    pub(crate) fn has_priced_descendant(&self) -> bool {
        self.children
            .iter()
            .any(|child| !child.bundle || child.has_priced_descendant())
    }

    fn from_pricing(
        item: &LineItemNode<'a>,
        pricing: &ItemPricing<'a>,
        quantity: u32,
        copier: &(impl LineDetailsCopier + ?Sized),
    ) -> Self {
        let unit_price = *pricing.price();
        let discount = clamp_discount(&unit_price, pricing.discount_or_zero());

        let mut line = OrderLineNode::new(
            item.id().clone(),
            item.sku_code(),
            quantity,
            unit_price,
            discount,
        );
        line.bundle = item.is_bundle();
        copier.copy_details(item, &mut line.details);

        line
    }
}

/// Per-leaf FIFO queues of apportioned pricing, consumed in production order.
#[derive(Debug, Clone, Default)]
pub struct LeafPricing<'a> {
    queues: FxHashMap<LineItemId, VecDeque<ItemPricing<'a>>>,
}

impl<'a> LeafPricing<'a> {
    /// Create empty leaf pricing.
    pub fn new() -> Self {
        LeafPricing::default()
    }

    /// Flatten split pricing into one queue per leaf, keeping unit order.
    pub fn from_split(split: SplitPricingMap<'a>) -> Self {
        split.into_iter().flat_map(|(_, children)| children).collect()
    }

    /// Queue more pricing for a leaf.
    pub fn extend(
        &mut self,
        line: LineItemId,
        pricings: impl IntoIterator<Item = ItemPricing<'a>>,
    ) {
        self.queues.entry(line).or_default().extend(pricings);
    }

    /// Pricing still queued for a leaf, in consumption order.
    pub fn queued(&self, line: &LineItemId) -> impl Iterator<Item = &ItemPricing<'a>> {
        self.queues.get(line).into_iter().flatten()
    }

    /// Total number of queued pricing entries.
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Whether no pricing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_consumed(&self) -> Result<(), StructuralMismatch> {
        let mut lines: Vec<LineItemId> = self
            .queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(line, _)| line.clone())
            .collect();

        if lines.is_empty() {
            return Ok(());
        }

        lines.sort();

        Err(StructuralMismatch::Unconsumed { lines })
    }
}

impl<'a> FromIterator<(LineItemId, Vec<ItemPricing<'a>>)> for LeafPricing<'a> {
    fn from_iter<I: IntoIterator<Item = (LineItemId, Vec<ItemPricing<'a>>)>>(iter: I) -> Self {
        let mut leaves = LeafPricing::new();

        for (line, pricings) in iter {
            leaves.extend(line, pricings);
        }

        leaves
    }
}

/// Build order lines for a line item forest.
///
/// Bundles keep their own line pricing and get their children rebuilt in order. Each leaf
/// consumes queued pricing entries until their quantities cover the leaf's quantity, producing
/// one order line per entry. Children of non-bundle lines are not materialized.
///
/// # Errors
///
/// - [`OrderLineError::MissingPricing`]: a leaf has no queue at all.
/// - [`OrderLineError::StructuralMismatch`]: a queue runs dry, an entry overshoots the leaf's
///   quantity, or pricing is left over once the forest is built.
pub fn create_order_lines_with_apportioned_prices<'a>(
    roots: &[LineItemNode<'a>],
    mut leaves: LeafPricing<'a>,
    copier: &(impl LineDetailsCopier + ?Sized),
) -> Result<Vec<OrderLineNode<'a>>, OrderLineError> {
    let lines = materialize(roots, &mut leaves, copier)?;

    leaves.ensure_consumed()?;

    Ok(lines)
}

fn materialize<'a>(
    items: &[LineItemNode<'a>],
    leaves: &mut LeafPricing<'a>,
    copier: &(impl LineDetailsCopier + ?Sized),
) -> Result<Vec<OrderLineNode<'a>>, OrderLineError> {
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        if item.is_bundle() {
            let mut line =
                OrderLineNode::from_pricing(item, item.pricing(), item.quantity(), copier);
            line.children = materialize(item.children(), leaves, copier)?;

            lines.push(line);
        } else {
            materialize_leaf(item, leaves, copier, &mut lines)?;
        }
    }

    Ok(lines)
}

fn materialize_leaf<'a>(
    item: &LineItemNode<'a>,
    leaves: &mut LeafPricing<'a>,
    copier: &(impl LineDetailsCopier + ?Sized),
    lines: &mut Vec<OrderLineNode<'a>>,
) -> Result<(), OrderLineError> {
    let queue = leaves
        .queues
        .get_mut(item.id())
        .ok_or_else(|| OrderLineError::MissingPricing(item.id().clone()))?;

    let required = item.quantity();
    let mut covered = 0_u32;

    while covered < required {
        let Some(pricing) = queue.pop_front() else {
            return Err(StructuralMismatch::Underrun {
                line: item.id().clone(),
                required,
                covered,
            }
            .into());
        };

        let offered = covered.saturating_add(pricing.quantity());

        if offered > required {
            return Err(StructuralMismatch::Overrun {
                line: item.id().clone(),
                required,
                offered,
            }
            .into());
        }

        covered = offered;

        lines.push(OrderLineNode::from_pricing(item, &pricing, pricing.quantity(), copier));
    }

    Ok(())
}

/// Split a leaf order line whose unit price holds the line total into single-unit lines.
///
/// Prices are split evenly with leftovers on the trailing units; the discount is apportioned
/// by price, leftovers favouring the dearest units. Lines of quantity one, bundle lines and
/// lines with children are returned unchanged.
///
/// Standalone utility: [`OrderLineFactory::create_order_lines`] already emits single-unit
/// leaves and never calls this.
///
/// # Errors
///
/// Returns an [`OrderLineError::Allocation`] if the amounts cannot be split exactly.
pub fn split_order_line<'a>(
    line: &OrderLineNode<'a>,
    policy: &CurrencyPolicy<'a>,
) -> Result<Vec<OrderLineNode<'a>>, OrderLineError> {
    if line.quantity <= 1 || line.bundle || !line.is_leaf() {
        return Ok(vec![line.clone()]);
    }

    let total = policy.to_minor(&line.unit_price)?;
    let count = usize::try_from(line.quantity).map_err(|_err| AllocationError::Overflow)?;
    let prices = allocate_evenly(total, count)?;

    let discount = policy.to_minor(&line.discount)?;
    let discount = if discount > total {
        warn!(
            line = %line.id,
            discount = %line.discount,
            price = %line.unit_price,
            "discount exceeds price; clamping to price"
        );
        total
    } else {
        discount
    };

    // dearest units sit at the end; weight them first
    let reversed: Vec<i64> = prices.iter().rev().copied().collect();
    let mut discounts = allocate_capped(discount, &reversed)?;
    discounts.reverse();

    Ok(prices
        .into_iter()
        .zip(discounts)
        .map(|(price, discount)| OrderLineNode {
            quantity: 1,
            unit_price: policy.from_minor(price),
            discount: policy.from_minor(discount),
            ..line.clone()
        })
        .collect())
}

/// Order lines whose own amounts count towards the order total.
///
/// A bundle's price is carried by the non-bundle lines beneath it, so only those are returned.
/// A root bundle with nothing priced beneath it stands for itself. Nested bundles never do.
pub fn priced_lines<'l, 'a>(lines: &'l [OrderLineNode<'a>]) -> Vec<&'l OrderLineNode<'a>> {
    let mut priced = Vec::new();

    for line in lines {
        if line.bundle && !line.has_priced_descendant() {
            priced.push(line);
        } else {
            collect_non_bundle(line, &mut priced);
        }
    }

    priced
}

fn collect_non_bundle<'l, 'a>(
    line: &'l OrderLineNode<'a>,
    out: &mut Vec<&'l OrderLineNode<'a>>,
) {
    if line.bundle {
        for child in &line.children {
            collect_non_bundle(child, out);
        }
    } else {
        out.push(line);
    }
}

/// Sum of net prices over the [priced lines](priced_lines), in the currency of `policy`.
///
/// # Errors
///
/// Returns an [`AllocationError`] if a line is in a different currency or the sum overflows.
pub fn total_net_price<'a>(
    lines: &[OrderLineNode<'a>],
    policy: &CurrencyPolicy<'a>,
) -> Result<Money<'a, Currency>, AllocationError> {
    let total = priced_lines(lines).into_iter().try_fold(0_i64, |acc, line| {
        acc.checked_add(policy.to_minor(&line.net_price())?)
            .ok_or(AllocationError::Overflow)
    })?;

    Ok(policy.from_minor(total))
}
