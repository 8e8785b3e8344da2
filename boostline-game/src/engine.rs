//! The simulation-facing entry point.
//!
//! [`EffectEngine`] owns the shared clock, the trigger registry and every
//! vehicle, routes contacts to triggers and dispatches fired continuations
//! back to whoever scheduled them. Callers drive it with [`EffectEngine::tick`]
//! once per simulation step.
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::TypeCatalog;
use crate::clock::{Clock, Continuation, Fired, Scheduler, TimerHandle};
use crate::config::{EngineConfig, TriggerConfig};
use crate::error::{ConfigError, RegistryError};
use crate::math::Vec3;
use crate::modifier::VehicleParameters;
use crate::registry::TriggerRegistry;
use crate::trigger::{ContactOutcome, IgnoreReason, TriggerId, TriggerInstance, VisualState};
use crate::vehicle::{Vehicle, VehicleId};
use crate::{ColliderRef, PhysicsBody, PresentationEffects, VehicleLookup};

/// Something that happened while the clock advanced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    EffectExpired { vehicle: VehicleId, at: f64 },
    CooldownReady { trigger: TriggerId, at: f64 },
    Collapsed { trigger: TriggerId, at: f64 },
    Respawning { trigger: TriggerId, at: f64 },
    Reactivated { trigger: TriggerId, at: f64 },
}

impl EngineEvent {
    #[must_use]
    pub const fn at(&self) -> f64 {
        match self {
            Self::EffectExpired { at, .. }
            | Self::CooldownReady { at, .. }
            | Self::Collapsed { at, .. }
            | Self::Respawning { at, .. }
            | Self::Reactivated { at, .. } => *at,
        }
    }
}

/// Main effect engine for a single race
pub struct EffectEngine<L, P>
where
    L: VehicleLookup,
    P: PresentationEffects,
{
    config: EngineConfig,
    catalog: TypeCatalog,
    clock: Scheduler<Continuation>,
    registry: TriggerRegistry,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    next_vehicle: u32,
    lookup: L,
    presentation: P,
}

impl<L, P> EffectEngine<L, P>
where
    L: VehicleLookup,
    P: PresentationEffects,
{
    /// Create an engine with default tuning and the built-in preset catalog.
    pub fn new(lookup: L, presentation: P) -> Self {
        let config = EngineConfig::default();
        Self {
            registry: TriggerRegistry::new(config.registry, config.animation),
            config,
            catalog: TypeCatalog::default_catalog().clone(),
            clock: Scheduler::new(),
            vehicles: BTreeMap::new(),
            next_vehicle: 1,
            lookup,
            presentation,
        }
    }

    /// Create an engine from an explicit configuration and catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_config(
        config: EngineConfig,
        catalog: TypeCatalog,
        lookup: L,
        presentation: P,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: TriggerRegistry::new(config.registry, config.animation),
            config,
            catalog,
            clock: Scheduler::new(),
            vehicles: BTreeMap::new(),
            next_vehicle: 1,
            lookup,
            presentation,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn lookup(&self) -> &L {
        &self.lookup
    }

    pub const fn lookup_mut(&mut self) -> &mut L {
        &mut self.lookup
    }

    #[must_use]
    pub const fn presentation(&self) -> &P {
        &self.presentation
    }

    /// Current simulated time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.clock.pending()
    }

    /// Seconds until `handle` fires, or `None` once it fired or was cancelled.
    #[must_use]
    pub fn timer_remaining(&self, handle: TimerHandle) -> Option<f64> {
        self.clock.remaining(handle)
    }

    #[must_use]
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    #[must_use]
    pub fn trigger(&self, id: TriggerId) -> Option<&TriggerInstance> {
        self.registry.get(id)
    }

    /// Spawn a vehicle with the configured default ceilings.
    ///
    /// Returns `None` once the vehicle id space is exhausted.
    pub fn spawn_vehicle(&mut self, body: Option<Box<dyn PhysicsBody>>) -> Option<VehicleId> {
        let parameters = self.config.vehicle.parameters();
        self.spawn_vehicle_with(parameters, body)
    }

    /// Spawn a vehicle with explicit base ceilings.
    pub fn spawn_vehicle_with(
        &mut self,
        parameters: VehicleParameters,
        body: Option<Box<dyn PhysicsBody>>,
    ) -> Option<VehicleId> {
        let Some(following) = self.next_vehicle.checked_add(1) else {
            log::warn!("refusing vehicle: id space exhausted");
            return None;
        };
        let id = VehicleId(self.next_vehicle);
        self.next_vehicle = following;
        let mut vehicle = Vehicle::new(id, parameters, self.config.stack);
        if let Some(body) = body {
            vehicle = vehicle.with_body(body);
        }
        self.vehicles.insert(id, vehicle);
        log::debug!("spawned vehicle {id}");
        Some(id)
    }

    /// Remove a vehicle, reverting its effects and cancelling their timers.
    ///
    /// Returns false when the vehicle was unknown.
    pub fn despawn_vehicle(&mut self, id: VehicleId) -> bool {
        let Some(mut vehicle) = self.vehicles.remove(&id) else {
            return false;
        };
        let removed = vehicle.remove_effects(&mut self.clock, &mut self.presentation);
        log::debug!("despawned vehicle {id} with {removed} active effect(s)");
        true
    }

    /// Revert every effect on a vehicle. Returns how many were active.
    pub fn clear_effects(&mut self, id: VehicleId) -> usize {
        self.vehicles.get_mut(&id).map_or(0, |vehicle| {
            vehicle.remove_effects(&mut self.clock, &mut self.presentation)
        })
    }

    /// Resolve an overlap between `trigger` and whatever `candidate` is.
    pub fn handle_contact(&mut self, trigger: TriggerId, candidate: ColliderRef) -> ContactOutcome {
        let Some(instance) = self.registry.get_mut(trigger) else {
            return ContactOutcome::Ignored(IgnoreReason::UnknownTrigger);
        };
        let Some(vehicle) = self
            .lookup
            .find(candidate)
            .and_then(|id| self.vehicles.get_mut(&id))
        else {
            return ContactOutcome::Ignored(IgnoreReason::NotAVehicle);
        };
        instance.contact(vehicle, &mut self.clock, &mut self.presentation)
    }

    /// Advance the clock by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> Vec<EngineEvent> {
        let step = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let until = self.clock.now() + step;
        self.advance_to(until)
    }

    /// Advance the clock to `until`, dispatching every continuation that
    /// comes due on the way in due-time order. A non-finite `until` is
    /// ignored.
    pub fn advance_to(&mut self, until: f64) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if !until.is_finite() {
            log::warn!("ignoring advance to non-finite time {until}");
            return events;
        }
        while let Some(fired) = self.clock.pop_due(until) {
            if let Some(event) = self.dispatch(fired) {
                events.push(event);
            }
        }
        self.clock.settle_at(until);
        events
    }

    fn dispatch(&mut self, fired: Fired<Continuation>) -> Option<EngineEvent> {
        let at = fired.due;
        match fired.tag {
            Continuation::EffectExpired { vehicle } => {
                let owner = self.vehicles.get_mut(&vehicle)?;
                owner
                    .expire_effect(fired.handle, &mut self.presentation)
                    .then_some(EngineEvent::EffectExpired { vehicle, at })
            }
            Continuation::CooldownElapsed { trigger } => {
                let instance = self.registry.get_mut(trigger)?;
                instance
                    .on_cooldown_elapsed(fired.handle)
                    .then_some(EngineEvent::CooldownReady { trigger, at })
            }
            Continuation::CycleStep { trigger } => {
                let instance = self.registry.get_mut(trigger)?;
                match instance.on_cycle_step(fired.handle, &mut self.clock)? {
                    VisualState::Dormant => Some(EngineEvent::Collapsed { trigger, at }),
                    VisualState::Reappearing => Some(EngineEvent::Respawning { trigger, at }),
                    VisualState::Active => Some(EngineEvent::Reactivated { trigger, at }),
                    VisualState::Disappearing => None,
                }
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] for out-of-range tuning and
    /// [`RegistryError::CapacityExceeded`] when the registry is full.
    pub fn create_trigger(
        &mut self,
        config: &TriggerConfig,
        position: Vec3,
    ) -> Result<TriggerId, RegistryError> {
        self.registry.create_trigger(config, position)
    }

    /// Create a booster from the named preset of the engine's catalog.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`TriggerRegistry::create_trigger_with_type`].
    pub fn create_trigger_with_type(
        &mut self,
        name: &str,
        position: Vec3,
    ) -> Result<TriggerId, RegistryError> {
        self.registry
            .create_trigger_with_type(&self.catalog, name, position)
    }

    /// Create a booster from a preset drawn with a seeded generator.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CapacityExceeded`] when the registry is full.
    pub fn create_random_trigger(
        &mut self,
        seed: u64,
        position: Vec3,
    ) -> Result<TriggerId, RegistryError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let name = self.catalog.random(&mut rng).name.clone();
        self.create_trigger_with_type(&name, position)
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> bool {
        self.registry.remove_trigger(id, &mut self.clock)
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        self.registry.set_all_enabled(enabled);
    }

    /// # Errors
    ///
    /// Returns an error and changes nothing when the tuning is out of range.
    pub fn apply_global_tuning(
        &mut self,
        multiplier: f32,
        duration_seconds: f32,
        force: f32,
    ) -> Result<(), ConfigError> {
        self.registry
            .apply_global_tuning(multiplier, duration_seconds, force)
    }

    /// Scatter every trigger over a `level_size` square, reproducibly.
    pub fn scatter_triggers(&mut self, seed: u64, level_size: f32) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.registry.randomize_positions(&mut rng, level_size);
    }

    /// Destroy every trigger and start over with an empty registry.
    ///
    /// Returns how many timers were cancelled.
    pub fn destroy_registry(&mut self) -> usize {
        let fresh = TriggerRegistry::new(*self.registry.config(), self.config.animation);
        let old = std::mem::replace(&mut self.registry, fresh);
        old.destroy(&mut self.clock)
    }
}
