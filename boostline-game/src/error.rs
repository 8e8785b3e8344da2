//! Error taxonomy for the effect engine.
//!
//! Nothing here is fatal to a running simulation: every failure degrades to
//! "no effect applied". [`Diagnostic`] values are only ever logged.
use thiserror::Error;

use crate::vehicle::VehicleId;

/// Refusals raised by a vehicle effect slot.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("an effect is already active on this vehicle")]
    AlreadyActive,
    #[error("effect stack is full ({depth} active)")]
    StackLimit { depth: usize },
}

/// Refusals raised by the trigger registry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("trigger capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },
    #[error("trigger ids exhausted")]
    IdsExhausted,
    #[error("invalid trigger tuning: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f32,
        value: f32,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{field} minimum {min:.2} exceeds maximum {max:.2}")]
    InvertedBounds {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error("JSON parse error: {0}")]
    Parse(String),
}

/// Degraded paths that are reported through `log` and never propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("booster type '{name}' not found, using default '{fallback}'")]
    UnknownPresetName { name: String, fallback: String },
    #[error("vehicle {vehicle} has no {what}; side effect skipped")]
    MissingCollaborator {
        what: &'static str,
        vehicle: VehicleId,
    },
}
