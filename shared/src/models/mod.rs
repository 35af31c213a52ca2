//! Domain models for the nursery IPM subsystem

mod group;
mod program;
mod stock;
mod task;

pub use group::*;
pub use program::*;
pub use stock::*;
pub use task::*;

use thiserror::Error;

/// A stored string that does not name any known enum variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
