//! Persistence layer for Modelgate.
//!
//! # Architecture
//!
//! - [`store::Store`] — SQLite pool + typed queries over accounts, models,
//!   and access grants
//! - [`billing`] — the monthly rollover that archives a period's fee into
//!   the ledger and resets the counter

pub mod billing;
pub mod store;

pub use billing::rebill_monthly;
pub use store::{NewAccessKey, NewModel, Store};
