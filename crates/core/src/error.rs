//! Error types for the fluid simulation core.

use crate::solver::{FieldId, Slot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid configuration for `{param}`: {reason}")]
    InvalidConfig { param: &'static str, reason: String },

    #[error("{field} has no {slot} generation")]
    MissingGeneration { field: FieldId, slot: Slot },

    #[error("{field} {slot} generation read before any stage wrote it")]
    UnwrittenGeneration { field: FieldId, slot: Slot },

    #[error("{field} {slot} generation is both read and written by one kernel")]
    AliasedGenerations { field: FieldId, slot: Slot },

    #[error("Shape mismatch for {field}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        field: FieldId,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Simulation faulted earlier and must be reconfigured: {0}")]
    Faulted(String),

    #[error("GPU error: {0}")]
    Gpu(String),
}

impl SimError {
    pub(crate) fn config(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param,
            reason: reason.into(),
        }
    }

    /// Whether this error halts the tick loop until the simulation is rebuilt.
    ///
    /// Broken buffer discipline and device failures leave the fields in an
    /// unknown state. Bad input is rejected before anything is touched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingGeneration { .. }
                | Self::UnwrittenGeneration { .. }
                | Self::AliasedGenerations { .. }
                | Self::ShapeMismatch { .. }
                | Self::Faulted(_)
                | Self::Gpu(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
