//! Shared types and rules for the nursery IPM platform
//!
//! This crate contains the domain models and the pure scheduling, grouping
//! and ledger rules shared between the backend and the browser (via WASM).

pub mod grouping;
pub mod ledger;
pub mod models;
pub mod planning;
pub mod types;
pub mod validation;
pub mod week;

pub use models::*;
pub use types::*;
pub use validation::*;
