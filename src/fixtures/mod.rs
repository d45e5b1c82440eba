//! Fixtures

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    fixtures::lines::{OrderFixture, parse_currency},
    items::LineItemNode,
    money::CurrencyPolicy,
    order_lines::OrderLineFactory,
};

pub mod lines;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error, including unknown rounding modes
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid amount format
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Line with a quantity of zero
    #[error("Line {0} has a quantity of zero")]
    ZeroQuantity(String),

    /// Cart position too large to record
    #[error("Line position {0} is out of range")]
    InvalidOrdering(usize),
}

/// An order loaded from a YAML fixture: its currency policy and line item forest
#[derive(Debug, Clone)]
pub struct Fixture {
    policy: CurrencyPolicy<'static>,
    roots: Vec<LineItemNode<'static>>,
}

impl Fixture {
    /// Load an order by name from `./fixtures/orders`
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_set_in("./fixtures", name)
    }

    /// Load an order by name from `<base_path>/orders`
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture file cannot be read or parsed.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, FixtureError> {
        let file_path = base_path.into().join("orders").join(format!("{name}.yml"));

        Self::from_path(file_path)
    }

    /// Load an order from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Parse an order from YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, names an unknown currency, or contains an
    /// invalid line.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let fixture: OrderFixture = serde_norway::from_str(contents)?;

        let currency = parse_currency(&fixture.currency)?;
        let mut policy = CurrencyPolicy::new(currency);

        if let Some(scale) = fixture.scale {
            policy = policy.with_scale(scale);
        }

        if let Some(rounding) = fixture.rounding {
            policy = policy.with_rounding(rounding);
        }

        let roots = fixture
            .lines
            .into_iter()
            .enumerate()
            .map(|(position, line)| line.try_into_node(position, currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Fixture { policy, roots })
    }

    /// Override the currency scale
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.policy = self.policy.with_scale(scale);
        self
    }

    /// Currency policy of the order
    pub fn policy(&self) -> &CurrencyPolicy<'static> {
        &self.policy
    }

    /// Root lines in cart order
    pub fn roots(&self) -> &[LineItemNode<'static>] {
        &self.roots
    }

    /// Order line factory configured with the order's currency policy
    pub fn factory(&self) -> OrderLineFactory<'static> {
        OrderLineFactory::new(self.policy)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::iso::{GBP, JPY};
    use testresult::TestResult;

    use crate::money::RoundingMode;

    use super::*;

    const ORDER: &str = r#"
currency: GBP
lines:
  - id: "1"
    sku: BREAKFAST
    name: Breakfast Box
    price: "5.00"
    discount: "0.50"
    children:
      - id: "1.1"
        sku: CHEESE
        price: "3.00"
      - id: "1.2"
        sku: JUICE
        price: "2.50"
  - id: "2"
    sku: APPLE
    price: "0.90"
    quantity: 2
"#;

    #[test]
    fn from_yaml_builds_forest() -> TestResult {
        let fixture = Fixture::from_yaml(ORDER)?;

        assert_eq!(fixture.policy().currency(), GBP);
        assert_eq!(fixture.policy().scale(), 2);
        assert_eq!(fixture.roots().len(), 2);

        let breakfast = fixture.roots().first().ok_or("missing breakfast")?;

        assert!(breakfast.is_bundle());
        assert_eq!(breakfast.constituents().len(), 2);

        Ok(())
    }

    #[test]
    fn from_yaml_reads_policy_overrides() -> TestResult {
        let fixture = Fixture::from_yaml(
            "currency: JPY\nscale: 2\nrounding: half-even\nlines: []\n",
        )?;

        assert_eq!(fixture.policy().currency(), JPY);
        assert_eq!(fixture.policy().scale(), 2);
        assert_eq!(fixture.policy().rounding(), RoundingMode::HalfEven);
        assert!(fixture.roots().is_empty());

        Ok(())
    }

    #[test]
    fn from_yaml_rejects_unknown_currency() {
        let result = Fixture::from_yaml("currency: XYZ\nlines: []\n");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "XYZ"));
    }

    #[test]
    fn from_yaml_rejects_unknown_rounding() {
        let result = Fixture::from_yaml("currency: GBP\nrounding: sideways\nlines: []\n");

        assert!(matches!(result, Err(FixtureError::Yaml(_))));
    }

    #[test]
    fn from_set_in_reads_orders_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("orders"))?;

        let mut file = fs::File::create(dir.path().join("orders").join("breakfast.yml"))?;
        file.write_all(ORDER.as_bytes())?;

        let fixture = Fixture::from_set_in(dir.path(), "breakfast")?;

        assert_eq!(fixture.roots().len(), 2);

        Ok(())
    }

    #[test]
    fn from_path_reports_missing_file() -> TestResult {
        let dir = tempfile::tempdir()?;

        let result = Fixture::from_path(dir.path().join("missing.yml"));

        assert!(matches!(result, Err(FixtureError::Io(_))));

        Ok(())
    }

    #[test]
    fn factory_prices_fixture_order() -> TestResult {
        let fixture = Fixture::from_yaml(ORDER)?;

        let lines = fixture.factory().create_order_lines(fixture.roots())?;

        assert_eq!(lines.len(), 3);

        Ok(())
    }
}
