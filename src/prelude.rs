//! Apportion prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    bundles::apportion_bundle_prices,
    collections::OrderedMap,
    discounts::{
        DiscountError, SplitUnitKey, apply_apportioned_discount, extract_discount,
        set_apportioned_discount, sort_by_amount,
    },
    extraction::{
        ConstituentPricing, ConstituentPricingMap, RootPricingMap, extract_constituent_pricing,
        extract_root_pricing,
    },
    fixtures::{Fixture, FixtureError},
    items::{LineDetails, LineItemId, LineItemNode},
    money::{
        AllocationError, CurrencyPolicy, RoundingMode, allocate_capped, allocate_evenly,
        allocate_proportionally,
    },
    order_lines::{
        CopyLineDetails, LeafPricing, LineDetailsCopier, OrderLineError, OrderLineFactory,
        OrderLineNode, StructuralMismatch, create_order_lines_with_apportioned_prices,
        priced_lines, split_order_line, total_net_price,
    },
    pricing::{ItemPricing, PricingError, total_price},
    receipt::{OrderTotals, ReceiptError, write_order_lines},
    splitting::{
        SplitConstituents, SplitPricingMap, split_by_quantity, split_constituents_by_quantity,
    },
};
