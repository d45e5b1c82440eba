//! Apportion
//!
//! Apportion turns a priced cart line item forest into order lines: bundle prices are spread
//! over their constituents, multi-unit lines are split into single units, and aggregate
//! discounts are apportioned over those units so that every amount sums back exactly to the
//! total it came from.

pub mod bundles;
pub mod collections;
pub mod discounts;
pub mod extraction;
pub mod fixtures;
pub mod items;
pub mod money;
pub mod order_lines;
pub mod prelude;
pub mod pricing;
pub mod receipt;
pub mod splitting;
pub mod utils;
