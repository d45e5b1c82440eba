//! Utils

use clap::Parser;

/// Arguments for the order lines demo
#[derive(Debug, Parser)]
pub struct OrderLinesArgs {
    /// Order fixture to load from `fixtures/orders`
    #[clap(short, long, default_value = "nested-bundles")]
    pub fixture: String,

    /// Override the number of fractional digits amounts are apportioned at
    #[clap(short, long)]
    pub scale: Option<u32>,
}
