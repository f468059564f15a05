//! XYO wallet monitor: ETH/XYO balance polling with USD valuation.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod types;
pub mod units;
pub mod explorer;
pub mod pricing;
pub mod engine;
pub mod storage;
