//! Per-tick host input and field selection

use crate::solver::FieldId;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// What the primary button edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditMode {
    #[default]
    Density,
    Temperature,
    Fuel,
    Velocity,
}

impl EditMode {
    /// Field shown while editing in this mode
    #[must_use]
    pub fn display_field(self) -> FieldKind {
        match self {
            Self::Density => FieldKind::Density,
            Self::Temperature => FieldKind::Temperature,
            Self::Fuel => FieldKind::FuelComposite,
            Self::Velocity => FieldKind::Velocity,
        }
    }
}

/// Pointer buttons held this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointerButtons {
    /// Injects the quantity selected by the edit mode
    pub primary: bool,
    /// Pushes the fluid along the pointer motion in any mode
    pub secondary: bool,
}

/// Host input sampled once per tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickInput {
    /// Timestep in seconds
    pub dt: f32,
    /// Pointer in normalized `[-0.5, 0.5]` domain coordinates, `None` when
    /// the pointer is outside the domain
    pub pointer: Option<Vector2<f32>>,
    pub buttons: PointerButtons,
    pub mode: EditMode,
}

impl TickInput {
    /// A tick with no interaction
    #[must_use]
    pub fn idle(dt: f32) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }
}

/// Result of a successful `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every stage ran and the fields rotated
    Advanced,
    /// The simulation is paused; nothing changed
    Paused,
}

/// Fields a host can read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Density,
    Temperature,
    /// Two channels per cell
    Velocity,
    /// Two channels per cell: solid, gas
    FuelComposite,
}

impl FieldKind {
    #[must_use]
    pub fn field_id(self) -> FieldId {
        match self {
            Self::Density => FieldId::Density,
            Self::Temperature => FieldId::Temperature,
            Self::Velocity => FieldId::Velocity,
            Self::FuelComposite => FieldId::FuelComposite,
        }
    }

    #[must_use]
    pub fn channels(self) -> usize {
        self.field_id().channels()
    }
}
