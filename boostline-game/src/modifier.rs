//! Vehicle control parameters and the modifiers that temporarily scale them.
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STEER_CEILING, DEFAULT_THROTTLE_CEILING};
use crate::trigger::TriggerId;

/// Tunable control ceilings of one vehicle.
///
/// The base values are captured at spawn and never change. The current values
/// are always derived from the base, never from their own previous value, so
/// any number of apply/revert cycles lands back on the base bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleParameters {
    base_throttle_ceiling: f32,
    base_steer_ceiling: f32,
    current_throttle_ceiling: f32,
    current_steer_ceiling: f32,
}

impl Default for VehicleParameters {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_CEILING, DEFAULT_STEER_CEILING)
    }
}

impl VehicleParameters {
    /// Snapshot the spawn-time ceilings.
    #[must_use]
    pub const fn new(throttle_ceiling: f32, steer_ceiling: f32) -> Self {
        Self {
            base_throttle_ceiling: throttle_ceiling,
            base_steer_ceiling: steer_ceiling,
            current_throttle_ceiling: throttle_ceiling,
            current_steer_ceiling: steer_ceiling,
        }
    }

    #[must_use]
    pub const fn base_throttle_ceiling(&self) -> f32 {
        self.base_throttle_ceiling
    }

    #[must_use]
    pub const fn base_steer_ceiling(&self) -> f32 {
        self.base_steer_ceiling
    }

    #[must_use]
    pub const fn current_throttle_ceiling(&self) -> f32 {
        self.current_throttle_ceiling
    }

    #[must_use]
    pub const fn current_steer_ceiling(&self) -> f32 {
        self.current_steer_ceiling
    }

    /// True when both current ceilings equal their base exactly.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_at_base(&self) -> bool {
        self.current_throttle_ceiling == self.base_throttle_ceiling
            && self.current_steer_ceiling == self.base_steer_ceiling
    }

    pub(crate) fn scale_from_base(&mut self, throttle_factor: f32, steer_factor: f32) {
        self.current_throttle_ceiling = self.base_throttle_ceiling * throttle_factor;
        self.current_steer_ceiling = self.base_steer_ceiling * steer_factor;
    }

    pub(crate) const fn restore_base(&mut self) {
        self.current_throttle_ceiling = self.base_throttle_ceiling;
        self.current_steer_ceiling = self.base_steer_ceiling;
    }
}

/// The per-trigger recipe a modifier is stamped from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModifierTemplate {
    pub throttle_multiplier: f32,
    pub steer_multiplier: f32,
    pub duration_seconds: f32,
}

impl ModifierTemplate {
    /// Stamp an immutable modifier attributed to `origin`.
    #[must_use]
    pub const fn stamp(&self, origin: TriggerId) -> EffectModifier {
        EffectModifier {
            throttle_multiplier: self.throttle_multiplier,
            steer_multiplier: self.steer_multiplier,
            duration_seconds: self.duration_seconds,
            origin,
        }
    }
}

/// A committed, immutable parameter transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectModifier {
    throttle_multiplier: f32,
    steer_multiplier: f32,
    duration_seconds: f32,
    origin: TriggerId,
}

impl EffectModifier {
    #[must_use]
    pub const fn new(
        throttle_multiplier: f32,
        steer_multiplier: f32,
        duration_seconds: f32,
        origin: TriggerId,
    ) -> Self {
        Self {
            throttle_multiplier,
            steer_multiplier,
            duration_seconds,
            origin,
        }
    }

    #[must_use]
    pub const fn throttle_multiplier(&self) -> f32 {
        self.throttle_multiplier
    }

    #[must_use]
    pub const fn steer_multiplier(&self) -> f32 {
        self.steer_multiplier
    }

    #[must_use]
    pub const fn duration_seconds(&self) -> f32 {
        self.duration_seconds
    }

    #[must_use]
    pub const fn origin(&self) -> TriggerId {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_parameters_start_at_base() {
        let params = VehicleParameters::default();
        assert!(params.is_at_base());
        assert!((params.current_throttle_ceiling() - 2000.0).abs() <= f32::EPSILON);
        assert!((params.current_steer_ceiling() - 17.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn scaling_is_relative_to_base_not_current() {
        let mut params = VehicleParameters::new(2000.0, 17.0);
        params.scale_from_base(2.0, 0.8);
        params.scale_from_base(2.0, 0.8);
        assert!((params.current_throttle_ceiling() - 4000.0).abs() <= f32::EPSILON);
        assert!(!params.is_at_base());
        params.restore_base();
        assert!(params.is_at_base());
    }

    #[test]
    fn stamp_carries_template_and_origin() {
        let template = ModifierTemplate {
            throttle_multiplier: 0.4,
            steer_multiplier: 1.0,
            duration_seconds: 3.0,
        };
        let modifier = template.stamp(TriggerId(9));
        assert_eq!(modifier.origin(), TriggerId(9));
        assert!((modifier.throttle_multiplier() - 0.4).abs() <= f32::EPSILON);
        assert!((modifier.duration_seconds() - 3.0).abs() <= f32::EPSILON);
    }
}
