//! Customer risk registry and security deposit ledger for the vehicle rental
//! marketplace.
//!
//! The registry decides whether a customer may book; the ledger tracks the
//! security deposit attached to each booking from hold to payout.

pub mod clock;
pub mod config;
pub mod error;
pub mod money;
pub mod rental;
pub mod telemetry;
