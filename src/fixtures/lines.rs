//! Line Fixtures

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, JPY, USD},
};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    items::{LineDetails, LineItemId, LineItemNode},
    money::RoundingMode,
    pricing::ItemPricing,
};

/// An order in YAML: its currency settings and line item forest
#[derive(Debug, Deserialize)]
pub struct OrderFixture {
    /// ISO currency code (e.g., "GBP")
    pub currency: String,

    /// Fractional digits, defaulting to the currency's own
    #[serde(default)]
    pub scale: Option<u32>,

    /// Rounding mode, defaulting to half-up
    #[serde(default)]
    pub rounding: Option<RoundingMode>,

    /// Root lines in cart order
    pub lines: Vec<LineFixture>,
}

/// Line Fixture
#[derive(Debug, Deserialize)]
pub struct LineFixture {
    /// Line identity
    pub id: LineItemId,

    /// SKU code
    pub sku: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Line total for the quantity (e.g., "9.99")
    pub price: String,

    /// Line discount total (e.g., "1.50")
    #[serde(default)]
    pub discount: Option<String>,

    /// Whether the line is a bundle; lines with children are bundles unless set
    #[serde(default)]
    pub bundle: Option<bool>,

    /// Tax classification code
    #[serde(default)]
    pub tax_code: Option<String>,

    /// Selected SKU option labels
    #[serde(default)]
    pub sku_options: Vec<String>,

    /// Cart position, defaulting to the position among siblings
    #[serde(default)]
    pub ordering: Option<u32>,

    /// Free-form data fields
    #[serde(default)]
    pub fields: FxHashMap<String, String>,

    /// Nested lines
    #[serde(default)]
    pub children: Vec<LineFixture>,
}

fn default_quantity() -> u32 {
    1
}

impl LineFixture {
    /// Build the line item node, and its children, in `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount is invalid or the quantity is zero.
    pub fn try_into_node(
        self,
        position: usize,
        currency: &'static Currency,
    ) -> Result<LineItemNode<'static>, FixtureError> {
        let price = parse_amount(&self.price, currency)?;
        let discount = self
            .discount
            .as_deref()
            .map(|discount| parse_amount(discount, currency))
            .transpose()?;

        let pricing = ItemPricing::new(price, discount, self.quantity)
            .map_err(|_err| FixtureError::ZeroQuantity(self.id.to_string()))?;

        let ordering = match self.ordering {
            Some(ordering) => ordering,
            None => {
                u32::try_from(position).map_err(|_err| FixtureError::InvalidOrdering(position))?
            }
        };

        let details = LineDetails {
            display_name: self.name.unwrap_or_default(),
            tax_code: self.tax_code,
            sku_options: self.sku_options,
            ordering,
            fields: self.fields,
        };

        let children = self
            .children
            .into_iter()
            .enumerate()
            .map(|(position, child)| child.try_into_node(position, currency))
            .collect::<Result<Vec<_>, _>>()?;

        let node = if self.bundle.unwrap_or(!children.is_empty()) {
            LineItemNode::bundle(self.id, self.sku, pricing, children)
        } else {
            children
                .into_iter()
                .fold(LineItemNode::leaf(self.id, self.sku, pricing), LineItemNode::with_child)
        };

        Ok(node.with_details(details))
    }
}

/// Parse a plain decimal amount (e.g., "2.99") in `currency`
///
/// # Errors
///
/// Returns an error if the amount cannot be parsed as a decimal or is negative.
pub fn parse_amount(
    s: &str,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, FixtureError> {
    let amount = s
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidAmount(s.to_string()))?;

    if amount.is_sign_negative() {
        return Err(FixtureError::InvalidAmount(s.to_string()));
    }

    Ok(Money::from_decimal(amount, currency))
}

/// Look up a supported currency by ISO code
///
/// # Errors
///
/// Returns an error if the currency code is not recognized.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code.trim() {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        "JPY" => Ok(JPY),
        other => Err(FixtureError::UnknownCurrency(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_amount_rejects_invalid_format() {
        let result = parse_amount("2.99 GBP", GBP);

        assert!(matches!(result, Err(FixtureError::InvalidAmount(_))));
    }

    #[test]
    fn parse_amount_rejects_negative_amounts() {
        let result = parse_amount("-1.00", GBP);

        assert!(matches!(result, Err(FixtureError::InvalidAmount(amount)) if amount == "-1.00"));
    }

    #[test]
    fn parse_currency_rejects_unknown_currency() {
        let result = parse_currency("ABC");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_currency_accepts_supported_codes() -> TestResult {
        assert_eq!(parse_currency("USD")?, USD);
        assert_eq!(parse_currency("JPY")?, JPY);

        Ok(())
    }

    #[test]
    fn lines_with_children_default_to_bundles() -> TestResult {
        let fixture: LineFixture = serde_norway::from_str(
            r#"
            id: "1"
            sku: BOX
            price: "5.00"
            children:
              - id: "1.1"
                sku: TEA
                name: Green Tea
                price: "3.00"
                quantity: 2
              - id: "1.2"
                sku: CUP
                price: "2.00"
            "#,
        )?;

        let node = fixture.try_into_node(0, GBP)?;

        assert!(node.is_bundle());
        assert_eq!(node.children().len(), 2);

        let tea = node.children().first().ok_or("missing tea")?;

        assert!(!tea.is_bundle());
        assert_eq!(tea.quantity(), 2);
        assert_eq!(tea.details().display_name, "Green Tea");

        let cup = node.children().get(1).ok_or("missing cup")?;

        assert_eq!(cup.details().ordering, 1);

        Ok(())
    }

    #[test]
    fn explicit_non_bundle_keeps_children_out_of_constituents() -> TestResult {
        let fixture: LineFixture = serde_norway::from_str(
            r#"
            id: "1"
            sku: SHIRT
            price: "20.00"
            bundle: false
            children:
              - id: "1.1"
                sku: PRINT
                price: "0.00"
            "#,
        )?;

        let node = fixture.try_into_node(0, GBP)?;

        assert!(!node.is_bundle());
        assert_eq!(node.children().len(), 1);
        assert!(node.constituents().is_empty());

        Ok(())
    }

    #[test]
    fn zero_quantity_is_rejected() -> TestResult {
        let fixture: LineFixture = serde_norway::from_str(
            r#"
            id: "7"
            sku: TEA
            price: "3.00"
            quantity: 0
            "#,
        )?;

        let result = fixture.try_into_node(0, GBP);

        assert!(matches!(result, Err(FixtureError::ZeroQuantity(line)) if line == "7"));

        Ok(())
    }
}
