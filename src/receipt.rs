//! Receipt

use std::io;

use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    money::{AllocationError, CurrencyPolicy},
    order_lines::{OrderLineNode, priced_lines},
};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// An order line amount could not be totalled.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Totals over the priced order lines of a receipt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals<'a> {
    /// Sum of unit prices
    pub subtotal: Money<'a, Currency>,

    /// Sum of discounts
    pub discount: Money<'a, Currency>,

    /// Sum of net prices
    pub total: Money<'a, Currency>,
}

impl<'a> OrderTotals<'a> {
    /// Total the [priced lines](priced_lines) of an order line forest.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationError`] if an amount is in another currency or a sum overflows.
    pub fn from_lines(
        lines: &[OrderLineNode<'a>],
        policy: &CurrencyPolicy<'a>,
    ) -> Result<Self, AllocationError> {
        let mut subtotal = 0_i64;
        let mut discount = 0_i64;

        for line in priced_lines(lines) {
            subtotal = subtotal
                .checked_add(policy.to_minor(line.unit_price())?)
                .ok_or(AllocationError::Overflow)?;
            discount = discount
                .checked_add(policy.to_minor(line.discount())?)
                .ok_or(AllocationError::Overflow)?;
        }

        let total = subtotal.checked_sub(discount).ok_or(AllocationError::Overflow)?;

        Ok(OrderTotals {
            subtotal: policy.from_minor(subtotal),
            discount: policy.from_minor(discount),
            total: policy.from_minor(total),
        })
    }
}

/// Writes an order line forest as a table, followed by its totals.
///
/// Nested lines are indented under their parent. Bundle lines are shown greyed out: their
/// amounts are already carried by the lines beneath them.
///
/// # Errors
///
/// Returns a [`ReceiptError`] if the totals cannot be calculated or writing fails.
pub fn write_order_lines(
    mut out: impl io::Write,
    lines: &[OrderLineNode<'_>],
    policy: &CurrencyPolicy<'_>,
) -> Result<(), ReceiptError> {
    let totals = OrderTotals::from_lines(lines, policy)?;

    let mut builder = Builder::default();

    builder.push_record(["", "SKU", "Item", "Qty", "Unit Price", "Discount", "Net"]);

    let mut rows = RowWriter {
        builder: &mut builder,
        root_rows: smallvec![],
        grey_rows: smallvec![],
        current_row: 1, // header is row 0
    };

    for (idx, line) in lines.iter().enumerate() {
        rows.root_rows.push(rows.current_row);
        rows.append(&format!("#{}", idx + 1), line, 0);
    }

    let RowWriter {
        root_rows,
        grey_rows,
        ..
    } = rows;

    write_table(&mut out, builder, &root_rows, &grey_rows)?;

    write_summary(&mut out, &totals)
}

struct RowWriter<'b> {
    builder: &'b mut Builder,
    root_rows: SmallVec<[usize; 16]>,
    grey_rows: SmallVec<[usize; 16]>,
    current_row: usize,
}

impl RowWriter<'_> {
    fn append(&mut self, label: &str, line: &OrderLineNode<'_>, depth: usize) {
        let indent = if depth == 0 {
            String::new()
        } else {
            format!("{}└ ", "  ".repeat(depth - 1))
        };

        let name = if line.details().display_name.is_empty() {
            line.sku_code()
        } else {
            line.details().display_name.as_str()
        };

        let options = line.details().sku_options_display();
        let item = if options.is_empty() {
            format!("{indent}{name}")
        } else {
            format!("{indent}{name}\n{indent}{options}")
        };

        self.builder.push_record([
            label.to_string(),
            line.sku_code().to_string(),
            item,
            line.quantity().to_string(),
            line.unit_price().to_string(),
            line.discount().to_string(),
            line.net_price().to_string(),
        ]);

        // bundle amounts already carried by the lines beneath
        if line.is_bundle() && (depth > 0 || line.has_priced_descendant()) {
            self.grey_rows.push(self.current_row);
        }

        self.current_row += 1;

        for child in line.children() {
            self.append("", child, depth + 1);
        }
    }
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    root_rows: &[usize],
    grey_rows: &[usize],
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    for &row in root_rows {
        if row > 1 {
            theme.insert_horizontal_line(row, separator);
        }
    }

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..7), Alignment::right());

    for &row in grey_rows {
        for col in 1..7 {
            table.modify((row, col), color_dark_grey());
        }
    }

    writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)
}

fn write_summary(out: &mut impl io::Write, totals: &OrderTotals<'_>) -> Result<(), ReceiptError> {
    let rows = [
        ("Subtotal:", totals.subtotal.to_string()),
        ("Discount:", totals.discount.to_string()),
        ("Total:", totals.total.to_string()),
    ];

    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or_default();
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or_default();

    for (label, value) in rows {
        writeln!(out, " {label:>label_width$}  {value:>value_width$}  ")
            .map_err(|_err| ReceiptError::IO)?;
    }

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::{
        items::{LineDetails, LineItemNode},
        order_lines::OrderLineFactory,
        pricing::ItemPricing,
    };

    use super::*;

    fn gbp(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, GBP)
    }

    fn breakfast() -> Result<Vec<OrderLineNode<'static>>, Box<dyn std::error::Error>> {
        let roots = [
            LineItemNode::bundle(
                "1",
                "BREAKFAST",
                ItemPricing::new(gbp(500), Some(gbp(50)), 1)?,
                [
                    LineItemNode::leaf("1.1", "CHEESE", ItemPricing::unit(gbp(300)))
                        .with_details(LineDetails::named("Cheddar")),
                    LineItemNode::leaf("1.2", "JUICE", ItemPricing::unit(gbp(250)))
                        .with_details(LineDetails::named("Orange Juice")),
                ],
            )
            .with_details(LineDetails::named("Breakfast Box")),
            LineItemNode::leaf("2", "APPLE", ItemPricing::new(gbp(90), None, 2)?),
        ];

        Ok(OrderLineFactory::new(CurrencyPolicy::new(GBP)).create_order_lines(&roots)?)
    }

    #[test]
    fn totals_sum_leaf_lines() -> TestResult {
        let totals = OrderTotals::from_lines(&breakfast()?, &CurrencyPolicy::new(GBP))?;

        assert_eq!(totals.subtotal, gbp(590));
        assert_eq!(totals.discount, gbp(50));
        assert_eq!(totals.total, gbp(540));

        Ok(())
    }

    #[test]
    fn empty_nested_bundle_is_not_totalled() -> TestResult {
        let policy = CurrencyPolicy::new(GBP);
        let roots = [LineItemNode::bundle(
            "1",
            "HAMPER",
            ItemPricing::unit(gbp(1000)),
            [
                LineItemNode::leaf("1.1", "A", ItemPricing::unit(gbp(1000))),
                LineItemNode::bundle(
                    "1.2",
                    "EMPTY",
                    ItemPricing::unit(gbp(300)),
                    Vec::<LineItemNode<'_>>::new(),
                ),
            ],
        )];

        let lines = OrderLineFactory::new(policy).create_order_lines(&roots)?;
        let totals = OrderTotals::from_lines(&lines, &policy)?;

        assert_eq!(totals.subtotal, gbp(1000));
        assert_eq!(totals.total, gbp(1000));

        Ok(())
    }

    #[test]
    fn write_order_lines_renders_nested_lines() -> TestResult {
        let mut out = Vec::<u8>::new();
        write_order_lines(&mut out, &breakfast()?, &CurrencyPolicy::new(GBP))?;

        let output = String::from_utf8(out)?;

        assert!(output.contains("Breakfast Box"));
        assert!(output.contains("└ Cheddar"));
        assert!(output.contains("└ Orange Juice"));
        assert!(output.contains("APPLE"));
        assert!(output.contains("#2"));
        assert!(output.contains("Subtotal:"));
        assert!(output.contains("Total:"));
        assert!(output.contains("£5.40"));

        Ok(())
    }

    #[test]
    fn write_order_lines_rejects_foreign_currency() -> TestResult {
        let lines = [OrderLineNode::new(
            "1".into(),
            "APPLE",
            1,
            Money::from_minor(100, rusty_money::iso::USD),
            Money::from_minor(0, rusty_money::iso::USD),
        )];

        let result = write_order_lines(Vec::<u8>::new(), &lines, &CurrencyPolicy::new(GBP));

        assert!(matches!(
            result,
            Err(ReceiptError::Allocation(AllocationError::CurrencyMismatch("USD", "GBP")))
        ));

        Ok(())
    }
}
