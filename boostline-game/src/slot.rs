//! Per-vehicle effect slot.
//!
//! The slot is mechanism, not policy: callers pick an [`ApplyMode`] and the
//! slot enforces it. Current ceilings are recomputed from the base after
//! every change, never by dividing an old multiplier back out.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::clock::{Clock, Continuation, TimerHandle};
use crate::constants::{
    STACK_MAX_DEPTH, STACK_MAX_STEER_FACTOR, STACK_MAX_THROTTLE_FACTOR, STACK_MIN_STEER_FACTOR,
    STACK_MIN_THROTTLE_FACTOR,
};
use crate::error::{ConfigError, EffectError};
use crate::modifier::{EffectModifier, VehicleParameters};
use crate::numbers::seconds;
use crate::vehicle::VehicleId;

/// How a new modifier interacts with whatever is already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Refuse with [`EffectError::AlreadyActive`] while anything is active.
    Exclusive,
    /// Fully revert whatever is active, then apply.
    Replace,
    /// Compose with the active set, each entry keeping its own expiry.
    Stack,
}

/// Bounds on how far stacked modifiers may compound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StackPolicy {
    #[serde(default = "StackPolicy::default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "StackPolicy::default_min_throttle_factor")]
    pub min_throttle_factor: f32,
    #[serde(default = "StackPolicy::default_max_throttle_factor")]
    pub max_throttle_factor: f32,
    #[serde(default = "StackPolicy::default_min_steer_factor")]
    pub min_steer_factor: f32,
    #[serde(default = "StackPolicy::default_max_steer_factor")]
    pub max_steer_factor: f32,
}

impl Default for StackPolicy {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            min_throttle_factor: Self::default_min_throttle_factor(),
            max_throttle_factor: Self::default_max_throttle_factor(),
            min_steer_factor: Self::default_min_steer_factor(),
            max_steer_factor: Self::default_max_steer_factor(),
        }
    }
}

impl StackPolicy {
    const fn default_max_depth() -> usize {
        STACK_MAX_DEPTH
    }

    const fn default_min_throttle_factor() -> f32 {
        STACK_MIN_THROTTLE_FACTOR
    }

    const fn default_max_throttle_factor() -> f32 {
        STACK_MAX_THROTTLE_FACTOR
    }

    const fn default_min_steer_factor() -> f32 {
        STACK_MIN_STEER_FACTOR
    }

    const fn default_max_steer_factor() -> f32 {
        STACK_MAX_STEER_FACTOR
    }

    /// Validate depth and factor bounds.
    ///
    /// # Errors
    ///
    /// Returns an error when the depth is zero, a bound is not positive, or a
    /// minimum exceeds its maximum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::MinViolation {
                field: "stack.max_depth",
                min: 1.0,
                value: 0.0,
            });
        }
        for (field, min, max) in [
            (
                "stack.throttle_factor",
                self.min_throttle_factor,
                self.max_throttle_factor,
            ),
            (
                "stack.steer_factor",
                self.min_steer_factor,
                self.max_steer_factor,
            ),
        ] {
            if !(min > 0.0) {
                return Err(ConfigError::MinViolation {
                    field,
                    min: f32::EPSILON,
                    value: min,
                });
            }
            if min > max {
                return Err(ConfigError::InvertedBounds { field, min, max });
            }
        }
        Ok(())
    }

    fn clamp_throttle(&self, factor: f32) -> f32 {
        factor.clamp(self.min_throttle_factor, self.max_throttle_factor)
    }

    fn clamp_steer(&self, factor: f32) -> f32 {
        factor.clamp(self.min_steer_factor, self.max_steer_factor)
    }
}

/// A committed modifier together with the timer that will expire it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    modifier: EffectModifier,
    expiry: TimerHandle,
}

impl ActiveEffect {
    #[must_use]
    pub const fn modifier(&self) -> &EffectModifier {
        &self.modifier
    }

    #[must_use]
    pub const fn expiry(&self) -> TimerHandle {
        self.expiry
    }
}

/// Inline storage for the active set; stacks rarely exceed a few entries.
pub type ActiveEffects = SmallVec<[ActiveEffect; 4]>;

/// Result of a successful [`VehicleEffectSlot::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Expiry timer of the newly committed modifier.
    pub expiry: TimerHandle,
    /// Entries reverted to make room (non-empty only for [`ApplyMode::Replace`]).
    pub displaced: ActiveEffects,
}

/// Effect state owned by exclusively one vehicle.
///
/// Every active modifier owns exactly one pending expiry timer, so "an effect
/// is active" and "an expiry is scheduled" can never disagree.
#[derive(Debug, Clone)]
pub struct VehicleEffectSlot {
    owner: VehicleId,
    parameters: VehicleParameters,
    policy: StackPolicy,
    active: ActiveEffects,
}

impl VehicleEffectSlot {
    #[must_use]
    pub fn new(owner: VehicleId, parameters: VehicleParameters, policy: StackPolicy) -> Self {
        Self {
            owner,
            parameters,
            policy,
            active: ActiveEffects::new(),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> VehicleId {
        self.owner
    }

    #[must_use]
    pub const fn parameters(&self) -> &VehicleParameters {
        &self.parameters
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Number of modifiers currently composed.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Active entries, oldest first.
    #[must_use]
    pub fn active(&self) -> &[ActiveEffect] {
        &self.active
    }

    /// Commit `modifier` and schedule its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::AlreadyActive`] for [`ApplyMode::Exclusive`] while
    /// anything is active, and [`EffectError::StackLimit`] for
    /// [`ApplyMode::Stack`] once the policy depth is reached. A refused apply
    /// leaves the slot untouched.
    pub fn apply<C>(
        &mut self,
        modifier: EffectModifier,
        mode: ApplyMode,
        clock: &mut C,
    ) -> Result<Applied, EffectError>
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        let displaced = match mode {
            ApplyMode::Exclusive if self.is_active() => return Err(EffectError::AlreadyActive),
            ApplyMode::Stack if self.active.len() >= self.policy.max_depth => {
                return Err(EffectError::StackLimit {
                    depth: self.active.len(),
                });
            }
            ApplyMode::Replace => self.remove(clock),
            ApplyMode::Exclusive | ApplyMode::Stack => ActiveEffects::new(),
        };

        let expiry = clock.schedule_after(
            seconds(modifier.duration_seconds()),
            Continuation::EffectExpired {
                vehicle: self.owner,
            },
        );
        self.active.push(ActiveEffect { modifier, expiry });
        self.recompute();
        log::debug!(
            "vehicle {} took modifier from {} (depth {}, throttle {:.1})",
            self.owner,
            modifier.origin(),
            self.active.len(),
            self.parameters.current_throttle_ceiling()
        );
        Ok(Applied { expiry, displaced })
    }

    /// Revert everything and cancel every pending expiry. Idempotent.
    ///
    /// Returns the entries that were removed.
    pub fn remove<C>(&mut self, clock: &mut C) -> ActiveEffects
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        let removed = std::mem::take(&mut self.active);
        for entry in &removed {
            clock.cancel(entry.expiry);
        }
        self.parameters.restore_base();
        removed
    }

    /// Drop the entry whose expiry timer just fired.
    ///
    /// Stale handles (already removed or replaced) are ignored.
    pub fn expire(&mut self, handle: TimerHandle) -> Option<ActiveEffect> {
        let position = self.active.iter().position(|e| e.expiry == handle)?;
        let entry = self.active.remove(position);
        self.recompute();
        Some(entry)
    }

    fn recompute(&mut self) {
        if self.active.is_empty() {
            self.parameters.restore_base();
            return;
        }
        let (throttle, steer) = self.active.iter().fold((1.0_f32, 1.0_f32), |(t, s), e| {
            (
                t * e.modifier.throttle_multiplier(),
                s * e.modifier.steer_multiplier(),
            )
        });
        let (throttle, steer) = if self.active.len() > 1 {
            (self.policy.clamp_throttle(throttle), self.policy.clamp_steer(steer))
        } else {
            (throttle, steer)
        };
        self.parameters.scale_from_base(throttle, steer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Scheduler;
    use crate::trigger::TriggerId;

    fn slot() -> VehicleEffectSlot {
        VehicleEffectSlot::new(
            VehicleId(1),
            VehicleParameters::new(2000.0, 17.0),
            StackPolicy::default(),
        )
    }

    fn modifier(throttle: f32, origin: u32) -> EffectModifier {
        EffectModifier::new(throttle, 0.8, 3.0, TriggerId(origin))
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn repeated_cycles_restore_base_exactly() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        let multipliers = [2.0, 0.4, 1.1, 3.0, 0.33, 1.7];
        for round in 0..200_u32 {
            let pick = multipliers[round as usize % multipliers.len()];
            let mode = if round % 3 == 0 {
                ApplyMode::Stack
            } else {
                ApplyMode::Replace
            };
            slot.apply(modifier(pick, round), mode, &mut clock).unwrap();
            if round % 2 == 0 {
                slot.apply(modifier(pick, round), ApplyMode::Stack, &mut clock)
                    .unwrap();
            }
            slot.remove(&mut clock);
            assert_eq!(slot.parameters().current_throttle_ceiling(), 2000.0);
            assert_eq!(slot.parameters().current_steer_ceiling(), 17.0);
        }
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn exclusive_refuses_while_active_and_leaves_state() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        slot.apply(modifier(2.0, 1), ApplyMode::Exclusive, &mut clock)
            .unwrap();
        let before = *slot.parameters();

        let err = slot
            .apply(modifier(0.4, 2), ApplyMode::Exclusive, &mut clock)
            .unwrap_err();
        assert_eq!(err, EffectError::AlreadyActive);
        assert_eq!(*slot.parameters(), before);
        assert_eq!(slot.depth(), 1);
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn replace_reverts_and_cancels_previous_timer() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        let first = slot
            .apply(modifier(2.0, 1), ApplyMode::Exclusive, &mut clock)
            .unwrap();
        let second = slot
            .apply(modifier(0.4, 2), ApplyMode::Replace, &mut clock)
            .unwrap();

        assert_eq!(second.displaced.len(), 1);
        assert_eq!(second.displaced[0].expiry(), first.expiry);
        assert!(!clock.is_pending(first.expiry));
        assert!(clock.is_pending(second.expiry));
        assert!((slot.parameters().current_throttle_ceiling() - 800.0).abs() < 1e-3);
    }

    #[test]
    fn stacking_compounds_and_each_entry_expires_alone() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        let a = slot
            .apply(modifier(2.0, 1), ApplyMode::Stack, &mut clock)
            .unwrap();
        clock.advance(1.0);
        let b = slot
            .apply(modifier(1.5, 2), ApplyMode::Stack, &mut clock)
            .unwrap();
        assert!((slot.parameters().current_throttle_ceiling() - 6000.0).abs() < 1e-2);
        assert_ne!(a.expiry, b.expiry);

        let fired = clock.advance(2.0);
        assert_eq!(fired.len(), 1);
        assert!(slot.expire(fired[0].handle).is_some());
        assert!((slot.parameters().current_throttle_ceiling() - 3000.0).abs() < 1e-2);
        assert!(slot.expire(fired[0].handle).is_none());

        let fired = clock.advance(1.0);
        assert_eq!(fired.len(), 1);
        slot.expire(fired[0].handle);
        assert!(!slot.is_active());
        assert!(slot.parameters().is_at_base());
    }

    #[test]
    fn stacking_respects_depth_and_factor_bounds() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        for origin in 0..3 {
            slot.apply(modifier(3.0, origin), ApplyMode::Stack, &mut clock)
                .unwrap();
        }
        // 3^3 = 27 is clamped to the policy ceiling.
        assert!((slot.parameters().current_throttle_ceiling() - 16_000.0).abs() < 1e-2);

        let err = slot
            .apply(modifier(3.0, 9), ApplyMode::Stack, &mut clock)
            .unwrap_err();
        assert_eq!(err, EffectError::StackLimit { depth: 3 });
        assert_eq!(clock.pending(), 3);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut clock = Scheduler::new();
        let mut slot = slot();
        assert!(slot.remove(&mut clock).is_empty());
        slot.apply(modifier(2.0, 1), ApplyMode::Exclusive, &mut clock)
            .unwrap();
        assert_eq!(slot.remove(&mut clock).len(), 1);
        assert!(slot.remove(&mut clock).is_empty());
        assert!(slot.parameters().is_at_base());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn policy_validation_catches_bad_bounds() {
        let mut policy = StackPolicy::default();
        assert!(policy.validate().is_ok());
        policy.max_depth = 0;
        assert!(policy.validate().is_err());
        policy.max_depth = 2;
        policy.min_steer_factor = 5.0;
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvertedBounds { .. })
        ));
    }
}
