//! Order Line Factory

use tracing::{Span, debug};

use crate::{
    bundles::apportion_bundle_prices,
    discounts::{apply_apportioned_discount, extract_discount},
    extraction::{ConstituentPricing, extract_constituent_pricing, extract_root_pricing},
    items::LineItemNode,
    money::CurrencyPolicy,
    splitting::split_constituents_by_quantity,
};

use super::{
    CopyLineDetails, LeafPricing, LineDetailsCopier, OrderLineError, OrderLineNode,
    create_order_lines_with_apportioned_prices,
};

/// Runs the whole apportionment pipeline over a cart's line item forest.
///
/// Bundle prices are spread over their constituents, every constituent is split into single
/// units, each root's discount is apportioned over those units, and the forest is rebuilt as
/// order lines. A root that is not a bundle is priced as the only constituent of its own group.
#[derive(Debug, Clone)]
pub struct OrderLineFactory<'a, C = CopyLineDetails> {
    policy: CurrencyPolicy<'a>,
    copier: C,
}

impl<'a> OrderLineFactory<'a> {
    /// Create a factory that copies line details verbatim.
    pub fn new(policy: CurrencyPolicy<'a>) -> Self {
        OrderLineFactory {
            policy,
            copier: CopyLineDetails,
        }
    }
}

impl<'a, C: LineDetailsCopier> OrderLineFactory<'a, C> {
    /// Replace the line details copier.
    pub fn with_copier<D: LineDetailsCopier>(self, copier: D) -> OrderLineFactory<'a, D> {
        OrderLineFactory {
            policy: self.policy,
            copier,
        }
    }

    /// Currency policy every amount is apportioned under.
    pub fn policy(&self) -> &CurrencyPolicy<'a> {
        &self.policy
    }

    /// Apportion the forest's pricing down to per-leaf unit queues.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderLineError`] if any amount cannot be apportioned exactly.
    pub fn leaf_pricing(
        &self,
        roots: &[LineItemNode<'a>],
    ) -> Result<LeafPricing<'a>, OrderLineError> {
        let root_pricing = extract_root_pricing(roots);
        let mut constituents = extract_constituent_pricing(roots);

        for root in roots.iter().filter(|root| !root.is_bundle()) {
            let group: ConstituentPricing<'a> =
                [(root.id().clone(), *root.pricing())].into_iter().collect();

            constituents.insert(root.id().clone(), group);
        }

        let constituents = apportion_bundle_prices(&root_pricing, constituents, &self.policy)?;

        let mut split = split_constituents_by_quantity(&constituents, &self.policy)?;

        apply_apportioned_discount(&mut split, &extract_discount(&root_pricing), &self.policy)?;

        let leaves = LeafPricing::from_split(split);

        debug!(roots = roots.len(), units = leaves.len(), "apportioned leaf pricing");

        Ok(leaves)
    }

    /// Build priced order lines for a line item forest.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderLineError`] if apportionment fails or the apportioned pricing does not
    /// fit the forest. Nothing is returned on failure.
    #[tracing::instrument(
        name = "order_lines.factory.create_order_lines",
        skip(self, roots),
        fields(
            roots = roots.len(),
            currency = self.policy.currency().iso_alpha_code,
            lines = tracing::field::Empty
        ),
        err
    )]
    pub fn create_order_lines(
        &self,
        roots: &[LineItemNode<'a>],
    ) -> Result<Vec<OrderLineNode<'a>>, OrderLineError> {
        let leaves = self.leaf_pricing(roots)?;

        let lines = create_order_lines_with_apportioned_prices(roots, leaves, &self.copier)?;

        Span::current().record("lines", tracing::field::display(lines.len()));

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{
        Money,
        iso::{Currency, GBP},
    };
    use testresult::TestResult;

    use crate::{
        items::{LineDetails, LineItemId},
        money::AllocationError,
        order_lines::total_net_price,
        pricing::ItemPricing,
    };

    use super::*;

    fn gbp(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, GBP)
    }

    type LeafAmounts = Vec<(String, i64, i64)>;

    fn leaves(lines: &[OrderLineNode<'static>]) -> Result<LeafAmounts, AllocationError> {
        fn walk(
            lines: &[OrderLineNode<'static>],
            policy: &CurrencyPolicy<'static>,
            out: &mut LeafAmounts,
        ) -> Result<(), AllocationError> {
            for line in lines {
                if line.is_leaf() {
                    out.push((
                        line.id().to_string(),
                        policy.to_minor(line.unit_price())?,
                        policy.to_minor(line.discount())?,
                    ));
                } else {
                    walk(line.children(), policy, out)?;
                }
            }

            Ok(())
        }

        let mut out = Vec::new();
        walk(lines, &CurrencyPolicy::new(GBP), &mut out)?;

        Ok(out)
    }

    #[test]
    fn bundle_price_and_discount_reach_every_unit() -> TestResult {
        let factory = OrderLineFactory::new(CurrencyPolicy::new(GBP));

        let roots = [LineItemNode::bundle(
            "1",
            "MEAL",
            ItemPricing::new(gbp(600), Some(gbp(100)), 1)?,
            [
                LineItemNode::leaf("1.1", "SANDWICH", ItemPricing::new(gbp(500), None, 2)?),
                LineItemNode::leaf("1.2", "DRINK", ItemPricing::unit(gbp(200))),
            ],
        )];

        let lines = factory.create_order_lines(&roots)?;

        // 600 over weights 500, 200: 428.57 -> 429 and 171.43 -> 171
        // sandwich units 214 + 215, discount 100 over 215, 214, 171
        assert_eq!(
            leaves(&lines)?,
            vec![
                ("1.1".to_string(), 214, 36),
                ("1.1".to_string(), 215, 36),
                ("1.2".to_string(), 171, 28),
            ]
        );

        let bundle = lines.first().ok_or("missing bundle")?;

        assert_eq!(bundle.unit_price(), &gbp(600));
        assert_eq!(bundle.discount(), &gbp(100));
        assert_eq!(bundle.children().len(), 3);

        Ok(())
    }

    #[test]
    fn plain_root_is_split_into_units() -> TestResult {
        let factory = OrderLineFactory::new(CurrencyPolicy::new(GBP));
        let roots = [LineItemNode::leaf(
            "1",
            "APPLE",
            ItemPricing::new(gbp(100), Some(gbp(10)), 3)?,
        )];

        let lines = factory.create_order_lines(&roots)?;

        assert_eq!(
            leaves(&lines)?,
            vec![
                ("1".to_string(), 33, 3),
                ("1".to_string(), 33, 3),
                ("1".to_string(), 34, 4),
            ]
        );

        Ok(())
    }

    #[test]
    fn net_total_matches_root_net_prices() -> TestResult {
        let policy = CurrencyPolicy::new(GBP);
        let factory = OrderLineFactory::new(policy);

        let roots = [
            LineItemNode::bundle(
                "1",
                "BOX",
                ItemPricing::new(gbp(999), Some(gbp(333)), 1)?,
                [
                    LineItemNode::bundle(
                        "1.1",
                        "INNER",
                        ItemPricing::unit(gbp(700)),
                        [LineItemNode::leaf(
                            "1.1.1",
                            "A",
                            ItemPricing::new(gbp(700), None, 7)?,
                        )],
                    ),
                    LineItemNode::leaf("1.2", "B", ItemPricing::new(gbp(301), None, 3)?),
                ],
            ),
            LineItemNode::leaf("2", "C", ItemPricing::new(gbp(1001), Some(gbp(2000)), 3)?),
        ];

        let lines = factory.create_order_lines(&roots)?;

        // 999 - 333 for the box, the plain line's discount clamps to its price
        assert_eq!(total_net_price(&lines, &policy)?, gbp(666));

        Ok(())
    }

    #[test]
    fn multi_bundle_root_is_apportioned_per_bundle() -> TestResult {
        let factory = OrderLineFactory::new(CurrencyPolicy::new(GBP));

        let roots = [LineItemNode::bundle(
            "1",
            "LUNCH",
            ItemPricing::new(gbp(1000), Some(gbp(100)), 2)?,
            [
                LineItemNode::leaf("1.1", "SOUP", ItemPricing::new(gbp(800), None, 2)?),
                LineItemNode::leaf("1.2", "BREAD", ItemPricing::new(gbp(400), None, 2)?),
            ],
        )];

        let lines = factory.create_order_lines(&roots)?;

        // 500 per bundle over 800, 400: 334 + 166, doubled to 668 and 332
        assert_eq!(
            leaves(&lines)?,
            vec![
                ("1.1".to_string(), 334, 34),
                ("1.1".to_string(), 334, 34),
                ("1.2".to_string(), 166, 16),
                ("1.2".to_string(), 166, 16),
            ]
        );

        let bundle = lines.first().ok_or("missing bundle")?;

        assert_eq!(bundle.quantity(), 2);
        assert_eq!(total_net_price(&lines, factory.policy())?, gbp(900));

        Ok(())
    }

    #[test]
    fn leaf_pricing_queues_units_per_leaf() -> TestResult {
        let factory = OrderLineFactory::new(CurrencyPolicy::new(GBP));
        let roots = [LineItemNode::bundle(
            "1",
            "PAIR",
            ItemPricing::unit(gbp(300)),
            [
                LineItemNode::leaf("1.1", "A", ItemPricing::new(gbp(200), None, 2)?),
                LineItemNode::leaf("1.2", "B", ItemPricing::unit(gbp(100))),
            ],
        )];

        let leaves = factory.leaf_pricing(&roots)?;

        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves.queued(&LineItemId::from("1.1")).count(), 2);
        assert_eq!(leaves.queued(&LineItemId::from("1.2")).count(), 1);

        Ok(())
    }

    #[test]
    fn custom_copier_is_used() -> TestResult {
        let factory = OrderLineFactory::new(CurrencyPolicy::new(GBP)).with_copier(
            |item: &LineItemNode<'_>, details: &mut LineDetails| {
                details.display_name = item.sku_code().to_lowercase();
            },
        );

        let roots = [LineItemNode::leaf("1", "APPLE", ItemPricing::new(gbp(100), None, 2)?)];

        let lines = factory.create_order_lines(&roots)?;

        assert!(lines.iter().all(|line| line.details().display_name == "apple"));
        assert_eq!(lines.len(), 2);

        Ok(())
    }
}
