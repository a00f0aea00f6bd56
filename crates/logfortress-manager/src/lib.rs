//! Log source management for logfortress.
//!
//! [`LogSourceManager`] is the single entry point presentation layers
//! use: it lists containers, reconciles custom sources against them,
//! registers new sources and opens live log streams.

mod enumerator;
mod manager;

pub use enumerator::{list_reconciled, list_running, Reconciled};
pub use manager::LogSourceManager;
