//! Recording collaborators for tests, demos and the scenario tester.
//!
//! Both fakes share their log through `Rc<RefCell<..>>`, so a clone handed to
//! the engine can still be inspected by the caller afterwards.
use std::cell::RefCell;
use std::rc::Rc;

use crate::math::Vec3;
use crate::{EffectHandle, PhysicsBody, PresentationEffects, PresentationTarget};

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationCall {
    Play(EffectHandle, PresentationTarget),
    Stop(EffectHandle, PresentationTarget),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPresentation {
    calls: Rc<RefCell<Vec<PresentationCall>>>,
}

impl RecordingPresentation {
    #[must_use]
    pub fn calls(&self) -> Vec<PresentationCall> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn plays(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, PresentationCall::Play(..)))
            .count()
    }

    #[must_use]
    pub fn stops(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, PresentationCall::Stop(..)))
            .count()
    }

    /// Handles started on `target` and not stopped since.
    #[must_use]
    pub fn running_on(&self, target: PresentationTarget) -> Vec<EffectHandle> {
        let mut running: Vec<EffectHandle> = Vec::new();
        for call in self.calls.borrow().iter() {
            match call {
                PresentationCall::Play(handle, at) if *at == target => running.push(handle.clone()),
                PresentationCall::Stop(handle, at) if *at == target => {
                    if let Some(index) = running.iter().position(|h| h == handle) {
                        running.remove(index);
                    }
                }
                _ => {}
            }
        }
        running
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl PresentationEffects for RecordingPresentation {
    fn play(&mut self, handle: &EffectHandle, target: PresentationTarget) {
        self.calls
            .borrow_mut()
            .push(PresentationCall::Play(handle.clone(), target));
    }

    fn stop(&mut self, handle: &EffectHandle, target: PresentationTarget) {
        self.calls
            .borrow_mut()
            .push(PresentationCall::Stop(handle.clone(), target));
    }
}

/// Impulses requested on a body: `(direction, magnitude)`.
pub type ImpulseLog = Rc<RefCell<Vec<(Vec3, f32)>>>;

#[derive(Debug, Clone)]
pub struct RecordingBody {
    forward: Vec3,
    impulses: ImpulseLog,
}

impl Default for RecordingBody {
    fn default() -> Self {
        Self::facing(Vec3::FORWARD)
    }
}

impl RecordingBody {
    #[must_use]
    pub fn facing(forward: Vec3) -> Self {
        Self {
            forward,
            impulses: Rc::default(),
        }
    }

    /// Shared handle to the impulse log.
    #[must_use]
    pub fn log(&self) -> ImpulseLog {
        Rc::clone(&self.impulses)
    }
}

impl PhysicsBody for RecordingBody {
    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn apply_impulse(&mut self, direction: Vec3, magnitude: f32) {
        self.impulses.borrow_mut().push((direction, magnitude));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleId;

    #[test]
    fn running_on_tracks_play_stop_pairs_per_target() {
        let mut fx = RecordingPresentation::default();
        let observer = fx.clone();
        let trail = EffectHandle::new("trail");
        let car = PresentationTarget::Vehicle(VehicleId(1));
        let other = PresentationTarget::Vehicle(VehicleId(2));

        fx.play(&trail, car);
        fx.play(&trail, other);
        assert_eq!(observer.running_on(car), vec![trail.clone()]);
        fx.stop(&trail, car);
        assert!(observer.running_on(car).is_empty());
        assert_eq!(observer.running_on(other).len(), 1);
        assert_eq!(observer.plays(), 2);
        assert_eq!(observer.stops(), 1);
    }
}
