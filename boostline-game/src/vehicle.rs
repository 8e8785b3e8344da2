//! Vehicles as seen by the effect engine: an id, an exclusively owned effect
//! slot, and the optional collaborators side effects are delivered to.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::clock::{Clock, Continuation, TimerHandle};
use crate::error::{Diagnostic, EffectError};
use crate::modifier::{EffectModifier, VehicleParameters};
use crate::slot::{ActiveEffect, ApplyMode, StackPolicy, VehicleEffectSlot};
use crate::{EffectHandle, PhysicsBody, PresentationEffects, PresentationTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u32);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Vehicle {
    id: VehicleId,
    slot: VehicleEffectSlot,
    body: Option<Box<dyn PhysicsBody>>,
    /// Vehicle-bound presentation started per active modifier, keyed by the
    /// modifier's expiry timer.
    auras: SmallVec<[(TimerHandle, EffectHandle); 4]>,
}

impl fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vehicle")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("has_body", &self.body.is_some())
            .field("auras", &self.auras)
            .finish()
    }
}

impl Vehicle {
    #[must_use]
    pub fn new(id: VehicleId, parameters: VehicleParameters, policy: StackPolicy) -> Self {
        Self {
            id,
            slot: VehicleEffectSlot::new(id, parameters, policy),
            body: None,
            auras: SmallVec::new(),
        }
    }

    /// Attach the rigid body impulses are delivered to.
    #[must_use]
    pub fn with_body(mut self, body: Box<dyn PhysicsBody>) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub const fn id(&self) -> VehicleId {
        self.id
    }

    #[must_use]
    pub const fn slot(&self) -> &VehicleEffectSlot {
        &self.slot
    }

    #[must_use]
    pub const fn parameters(&self) -> &VehicleParameters {
        self.slot.parameters()
    }

    #[must_use]
    pub fn is_effect_active(&self) -> bool {
        self.slot.is_active()
    }

    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Commit a modifier through the slot and start its aura, if any.
    ///
    /// # Errors
    ///
    /// Propagates the slot's refusal; nothing is played on refusal.
    pub fn apply_effect<C, P>(
        &mut self,
        modifier: EffectModifier,
        mode: ApplyMode,
        aura: Option<&EffectHandle>,
        clock: &mut C,
        presentation: &mut P,
    ) -> Result<TimerHandle, EffectError>
    where
        C: Clock<Tag = Continuation> + ?Sized,
        P: PresentationEffects + ?Sized,
    {
        let applied = self.slot.apply(modifier, mode, clock)?;
        for entry in &applied.displaced {
            self.stop_aura(entry, presentation);
        }
        if let Some(aura) = aura {
            presentation.play(aura, PresentationTarget::Vehicle(self.id));
            self.auras.push((applied.expiry, aura.clone()));
        }
        Ok(applied.expiry)
    }

    /// Revert every active modifier and stop their auras.
    ///
    /// Returns how many modifiers were removed; zero when nothing was active.
    pub fn remove_effects<C, P>(&mut self, clock: &mut C, presentation: &mut P) -> usize
    where
        C: Clock<Tag = Continuation> + ?Sized,
        P: PresentationEffects + ?Sized,
    {
        let removed = self.slot.remove(clock);
        for entry in &removed {
            self.stop_aura(entry, presentation);
        }
        removed.len()
    }

    /// Resume an expiry continuation. Returns false for stale handles.
    pub(crate) fn expire_effect<P>(&mut self, handle: TimerHandle, presentation: &mut P) -> bool
    where
        P: PresentationEffects + ?Sized,
    {
        let Some(entry) = self.slot.expire(handle) else {
            return false;
        };
        self.stop_aura(&entry, presentation);
        log::debug!("vehicle {} effect from {} expired", self.id, entry.modifier().origin());
        true
    }

    /// Request an impulse along the body's forward axis.
    ///
    /// # Errors
    ///
    /// Returns [`Diagnostic::MissingCollaborator`] when no body is attached.
    pub fn push_forward(&mut self, magnitude: f32) -> Result<(), Diagnostic> {
        let Some(body) = self.body.as_mut() else {
            return Err(Diagnostic::MissingCollaborator {
                what: "physics body",
                vehicle: self.id,
            });
        };
        let direction = body.forward().normalized();
        body.apply_impulse(direction, magnitude);
        Ok(())
    }

    fn stop_aura<P>(&mut self, entry: &ActiveEffect, presentation: &mut P)
    where
        P: PresentationEffects + ?Sized,
    {
        if let Some(index) = self.auras.iter().position(|(h, _)| *h == entry.expiry()) {
            let (_, aura) = self.auras.remove(index);
            presentation.stop(&aura, PresentationTarget::Vehicle(self.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Scheduler;
    use crate::math::Vec3;
    use crate::recording::{PresentationCall, RecordingBody, RecordingPresentation};
    use crate::trigger::TriggerId;

    fn vehicle() -> Vehicle {
        Vehicle::new(
            VehicleId(7),
            VehicleParameters::new(2000.0, 17.0),
            StackPolicy::default(),
        )
    }

    #[test]
    fn aura_plays_on_apply_and_stops_once_on_expiry() {
        let mut clock = Scheduler::new();
        let mut fx = RecordingPresentation::default();
        let mut car = vehicle();
        let aura = EffectHandle::new("fx.boost.trail");
        let expiry = car
            .apply_effect(
                EffectModifier::new(2.0, 0.8, 3.0, TriggerId(1)),
                ApplyMode::Exclusive,
                Some(&aura),
                &mut clock,
                &mut fx,
            )
            .unwrap();

        assert!(car.expire_effect(expiry, &mut fx));
        assert!(!car.expire_effect(expiry, &mut fx));
        assert_eq!(
            fx.calls(),
            vec![
                PresentationCall::Play(aura.clone(), PresentationTarget::Vehicle(VehicleId(7))),
                PresentationCall::Stop(aura, PresentationTarget::Vehicle(VehicleId(7))),
            ]
        );
        assert!(car.parameters().is_at_base());
    }

    #[test]
    fn replace_stops_displaced_aura() {
        let mut clock = Scheduler::new();
        let mut fx = RecordingPresentation::default();
        let mut car = vehicle();
        let tint = EffectHandle::new("fx.hazard.tint");
        let trail = EffectHandle::new("fx.boost.trail");
        car.apply_effect(
            EffectModifier::new(0.4, 1.0, 3.0, TriggerId(1)),
            ApplyMode::Exclusive,
            Some(&tint),
            &mut clock,
            &mut fx,
        )
        .unwrap();
        car.apply_effect(
            EffectModifier::new(2.0, 0.8, 3.0, TriggerId(2)),
            ApplyMode::Replace,
            Some(&trail),
            &mut clock,
            &mut fx,
        )
        .unwrap();

        assert_eq!(fx.stops(), 1);
        assert_eq!(fx.plays(), 2);
        assert_eq!(car.remove_effects(&mut clock, &mut fx), 1);
        assert_eq!(fx.stops(), 2);
        assert_eq!(car.remove_effects(&mut clock, &mut fx), 0);
    }

    #[test]
    fn push_forward_uses_normalized_forward_or_reports_missing_body() {
        let mut car = vehicle();
        let err = car.push_forward(5000.0).unwrap_err();
        assert!(matches!(err, Diagnostic::MissingCollaborator { .. }));

        let body = RecordingBody::facing(Vec3::new(0.0, 0.0, 2.0));
        let log = body.log();
        let mut car = car.with_body(Box::new(body));
        car.push_forward(5000.0).unwrap();
        let impulses = log.borrow();
        assert_eq!(impulses.len(), 1);
        assert_eq!(impulses[0].0, Vec3::FORWARD);
        assert!((impulses[0].1 - 5000.0).abs() <= f32::EPSILON);
    }
}
