//! Order Lines Example
//!
//! This example loads an order fixture, apportions its bundle prices and discounts, and prints
//! the resulting order lines as a receipt.
//!
//! Use `-f` to load an order fixture by name
//! Use `-s` to apportion at a different number of fractional digits
//!
//! Set `RUST_LOG=apportion=debug` to see each pipeline stage.

use std::{io, time::Instant};

use anyhow::Result;
use apportion::{
    fixtures::Fixture,
    receipt::write_order_lines,
    utils::OrderLinesArgs,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Order Lines Example
#[expect(clippy::print_stdout, reason = "Example code")]
pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = OrderLinesArgs::parse();

    let mut fixture = Fixture::from_set(&args.fixture)?;

    if let Some(scale) = args.scale {
        fixture = fixture.with_scale(scale);
    }

    let start = Instant::now();

    let lines = fixture.factory().create_order_lines(fixture.roots())?;

    let elapsed = start.elapsed().as_secs_f32();

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    write_order_lines(&mut handle, &lines, fixture.policy())?;

    println!("Apportioned in {elapsed}s");

    Ok(())
}
