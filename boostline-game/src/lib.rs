//! Boostline Effect Engine
//!
//! Platform-agnostic temporary status effects for arcade vehicles: boost pads
//! and hazards that scale a vehicle's throttle and steering ceilings for a
//! while, then revert them exactly.
//! This crate provides the timing and state machines without any scene, physics
//! or rendering dependencies; those are reached through the traits below.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod math;
pub mod modifier;
pub mod numbers;
pub mod recording;
pub mod registry;
pub mod slot;
pub mod trigger;
pub mod vehicle;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Re-export commonly used types
pub use catalog::{BoosterType, TypeCatalog};
pub use clock::{Clock, Continuation, Fired, Scheduler, TimerHandle};
pub use config::{
    AnimationConfig, EngineConfig, RegistryConfig, TriggerConfig, TriggerKind, VehicleDefaults,
    validate_tuning,
};
pub use engine::{EffectEngine, EngineEvent};
pub use error::{ConfigError, Diagnostic, EffectError, RegistryError};
pub use math::{Rgba, Vec3};
pub use modifier::{EffectModifier, ModifierTemplate, VehicleParameters};
pub use recording::{PresentationCall, RecordingBody, RecordingPresentation};
pub use registry::TriggerRegistry;
pub use slot::{ActiveEffect, ApplyMode, Applied, StackPolicy, VehicleEffectSlot};
pub use trigger::{ContactOutcome, IgnoreReason, TriggerId, TriggerInstance, VisualState};
pub use vehicle::{Vehicle, VehicleId};

/// Opaque name of a particle system, sound or other presentation asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectHandle(pub String);

impl EffectHandle {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a presentation effect is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationTarget {
    Trigger(TriggerId),
    Vehicle(VehicleId),
}

/// Identifier of whatever object touched a trigger's collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColliderRef(pub u64);

/// Trait for abstracting the rigid body an impulse is delivered to
/// Platform-specific implementations should provide this
pub trait PhysicsBody {
    /// Unit-ish forward direction of the body in world space.
    fn forward(&self) -> Vec3;

    /// Request an instantaneous impulse along `direction`.
    fn apply_impulse(&mut self, direction: Vec3, magnitude: f32);
}

/// Trait for abstracting particles and audio
/// Fire-and-forget: implementations must not fail the caller
pub trait PresentationEffects {
    fn play(&mut self, handle: &EffectHandle, target: PresentationTarget);

    fn stop(&mut self, handle: &EffectHandle, target: PresentationTarget);
}

/// Resolve the object behind a contact to the vehicle it belongs to.
pub trait VehicleLookup {
    fn find(&self, candidate: ColliderRef) -> Option<VehicleId>;
}

/// Presentation sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresentation;

impl PresentationEffects for NullPresentation {
    fn play(&mut self, _handle: &EffectHandle, _target: PresentationTarget) {}

    fn stop(&mut self, _handle: &EffectHandle, _target: PresentationTarget) {}
}

/// Parent-linked collider table.
///
/// A contact usually reports a wheel or bumper collider rather than the
/// vehicle root, so lookups walk up the parent chain until a registered
/// vehicle is found.
#[derive(Debug, Clone, Default)]
pub struct ColliderHierarchy {
    parents: HashMap<ColliderRef, ColliderRef>,
    vehicles: HashMap<ColliderRef, VehicleId>,
}

impl ColliderHierarchy {
    /// Upper bound on parent hops; guards against accidental cycles.
    const MAX_DEPTH: usize = 32;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `root` as the collider that owns `vehicle`.
    pub fn register_vehicle(&mut self, root: ColliderRef, vehicle: VehicleId) {
        self.vehicles.insert(root, vehicle);
    }

    pub fn attach(&mut self, child: ColliderRef, parent: ColliderRef) {
        self.parents.insert(child, parent);
    }

    /// Forget `vehicle` and every collider mapped to it.
    pub fn remove_vehicle(&mut self, vehicle: VehicleId) {
        self.vehicles.retain(|_, owner| *owner != vehicle);
    }
}

impl VehicleLookup for ColliderHierarchy {
    fn find(&self, candidate: ColliderRef) -> Option<VehicleId> {
        let mut current = candidate;
        for _ in 0..Self::MAX_DEPTH {
            if let Some(vehicle) = self.vehicles.get(&current) {
                return Some(*vehicle);
            }
            current = *self.parents.get(&current)?;
        }
        None
    }
}

impl VehicleLookup for HashMap<ColliderRef, VehicleId> {
    fn find(&self, candidate: ColliderRef) -> Option<VehicleId> {
        self.get(&candidate).copied()
    }
}
