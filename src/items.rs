//! Items
//!
//! The cart-side line item tree handed over by the pricing engine.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::pricing::ItemPricing;

/// Identity of one line item instance within a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(String);

impl LineItemId {
    /// Create an identity from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        LineItemId(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LineItemId {
    fn from(id: &str) -> Self {
        LineItemId::new(id)
    }
}

impl From<String> for LineItemId {
    fn from(id: String) -> Self {
        LineItemId(id)
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive, non-monetary fields carried from a cart line onto its order lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDetails {
    /// Localised product name
    pub display_name: String,

    /// Tax classification code
    pub tax_code: Option<String>,

    /// Selected SKU option labels, e.g. size and colour
    pub sku_options: Vec<String>,

    /// Position of the line in the cart
    pub ordering: u32,

    /// Free-form data fields captured on the cart line
    pub fields: FxHashMap<String, String>,
}

impl LineDetails {
    /// Details with just a display name.
    pub fn named(display_name: impl Into<String>) -> Self {
        LineDetails {
            display_name: display_name.into(),
            ..LineDetails::default()
        }
    }

    /// SKU options joined for display, e.g. `"Large, Blue"`.
    pub fn sku_options_display(&self) -> String {
        self.sku_options.join(", ")
    }
}

/// A cart line item, possibly a bundle of nested line items.
///
/// `pricing` is the line total for the node's quantity, as computed upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemNode<'a> {
    id: LineItemId,
    sku_code: String,
    bundle: bool,
    pricing: ItemPricing<'a>,
    details: LineDetails,
    children: Vec<LineItemNode<'a>>,
}

impl<'a> LineItemNode<'a> {
    /// A non-bundle line.
    pub fn leaf(
        id: impl Into<LineItemId>,
        sku_code: impl Into<String>,
        pricing: ItemPricing<'a>,
    ) -> Self {
        LineItemNode {
            id: id.into(),
            sku_code: sku_code.into(),
            bundle: false,
            pricing,
            details: LineDetails::default(),
            children: Vec::new(),
        }
    }

    /// A bundle line with its constituents in cart order.
    pub fn bundle(
        id: impl Into<LineItemId>,
        sku_code: impl Into<String>,
        pricing: ItemPricing<'a>,
        children: impl Into<Vec<LineItemNode<'a>>>,
    ) -> Self {
        LineItemNode {
            id: id.into(),
            sku_code: sku_code.into(),
            bundle: true,
            pricing,
            details: LineDetails::default(),
            children: children.into(),
        }
    }

    /// Attach descriptive details.
    #[must_use]
    pub fn with_details(mut self, details: LineDetails) -> Self {
        self.details = details;
        self
    }

    /// Append a child line.
    #[must_use]
    pub fn with_child(mut self, child: LineItemNode<'a>) -> Self {
        self.children.push(child);
        self
    }

    /// Identity of this line.
    pub fn id(&self) -> &LineItemId {
        &self.id
    }

    /// SKU code of this line.
    pub fn sku_code(&self) -> &str {
        &self.sku_code
    }

    /// Whether this line is a bundle.
    pub fn is_bundle(&self) -> bool {
        self.bundle
    }

    /// Quantity of this line.
    pub fn quantity(&self) -> u32 {
        self.pricing.quantity()
    }

    /// Line-level pricing.
    pub fn pricing(&self) -> &ItemPricing<'a> {
        &self.pricing
    }

    /// Descriptive details.
    pub fn details(&self) -> &LineDetails {
        &self.details
    }

    /// Children in cart order. Only meaningful for bundles.
    pub fn children(&self) -> &[LineItemNode<'a>] {
        &self.children
    }

    /// Non-bundle descendants, flattening through nested bundles, in depth-first cart order.
    ///
    /// A non-bundle node has no constituents, even if it carries children.
    pub fn constituents(&self) -> Vec<&LineItemNode<'a>> {
        let mut leaves = Vec::new();

        if self.bundle {
            collect_leaves(&self.children, &mut leaves);
        }

        leaves
    }
}

fn collect_leaves<'n, 'a>(items: &'n [LineItemNode<'a>], leaves: &mut Vec<&'n LineItemNode<'a>>) {
    for item in items {
        if item.bundle {
            collect_leaves(&item.children, leaves);
        } else {
            leaves.push(item);
        }
    }
}
