//! Feedbin subscription tooling.
//!
//! The library half holds everything the `feedbin-tools` binary does so it can
//! be exercised from integration tests against mock servers.

pub mod cli;
pub mod config;
pub mod feedbin;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod secrets;
pub mod sheets;
pub mod util;
