//! Rental trust workflows: who may book, and what happens to their deposit.

pub mod blacklist;
pub mod deposits;
mod http;
pub mod store;

pub use store::{ErrorKind, RepositoryError};
