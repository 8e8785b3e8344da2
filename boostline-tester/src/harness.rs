use anyhow::{Result, bail, ensure};
use boostline_game::recording::ImpulseLog;
use boostline_game::{
    ColliderRef, ContactOutcome, EffectEngine, EngineConfig, EngineEvent, PresentationTarget,
    RecordingBody, RecordingPresentation, TriggerConfig, TriggerId, Vec3, VehicleId, VisualState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub type Engine = EffectEngine<HashMap<ColliderRef, VehicleId>, RecordingPresentation>;

/// Counters gathered over one scenario run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: usize,
    pub contacts: usize,
    pub commits: usize,
    pub events: usize,
    pub sim_seconds: f64,
}

/// An engine wired to recording collaborators, stepped at a fixed `dt` with
/// invariant checks after every step.
pub struct Harness {
    pub engine: Engine,
    pub fx: RecordingPresentation,
    impulses: BTreeMap<VehicleId, ImpulseLog>,
    colliders: BTreeMap<VehicleId, ColliderRef>,
    dt: f64,
    verbose: bool,
    summary: RunSummary,
}

impl Harness {
    pub fn new(dt: f64, verbose: bool) -> Result<Self> {
        Self::with_config(EngineConfig::default(), dt, verbose)
    }

    pub fn with_config(config: EngineConfig, dt: f64, verbose: bool) -> Result<Self> {
        ensure!(dt.is_finite() && dt > 0.0, "time step must be positive (got {dt})");
        let fx = RecordingPresentation::default();
        let engine = EffectEngine::with_config(
            config,
            boostline_game::TypeCatalog::default_catalog().clone(),
            HashMap::new(),
            fx.clone(),
        )?;
        Ok(Self {
            engine,
            fx,
            impulses: BTreeMap::new(),
            colliders: BTreeMap::new(),
            dt,
            verbose,
            summary: RunSummary::default(),
        })
    }

    pub const fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Spawn a kart with a recording body and register its root collider.
    pub fn kart(&mut self) -> Result<VehicleId> {
        let body = RecordingBody::default();
        let log = body.log();
        let Some(id) = self.engine.spawn_vehicle(Some(Box::new(body))) else {
            bail!("no vehicle ids left");
        };
        let collider = ColliderRef(u64::from(id.0) * 100);
        self.engine.lookup_mut().insert(collider, id);
        self.impulses.insert(id, log);
        self.colliders.insert(id, collider);
        Ok(id)
    }

    pub fn trigger(&mut self, config: &TriggerConfig) -> Result<TriggerId> {
        Ok(self.engine.create_trigger(config, Vec3::ZERO)?)
    }

    pub fn collider(&self, kart: VehicleId) -> Result<ColliderRef> {
        match self.colliders.get(&kart) {
            Some(collider) => Ok(*collider),
            None => bail!("kart {kart} was never spawned"),
        }
    }

    pub fn contact(&mut self, trigger: TriggerId, kart: VehicleId) -> Result<ContactOutcome> {
        let collider = self.collider(kart)?;
        let outcome = self.engine.handle_contact(trigger, collider);
        self.summary.contacts += 1;
        if outcome.is_committed() {
            self.summary.commits += 1;
        }
        if self.verbose {
            println!(
                "    t={:.3} {trigger} x kart {kart}: {outcome:?}",
                self.engine.now()
            );
        }
        Ok(outcome)
    }

    pub fn throttle(&self, kart: VehicleId) -> Result<f32> {
        match self.engine.vehicle(kart) {
            Some(vehicle) => Ok(vehicle.parameters().current_throttle_ceiling()),
            None => bail!("kart {kart} is not on the track"),
        }
    }

    pub fn impulses(&self, kart: VehicleId) -> Vec<(Vec3, f32)> {
        self.impulses
            .get(&kart)
            .map(|log| log.borrow().clone())
            .unwrap_or_default()
    }

    /// One fixed step, or less if that would pass `limit`.
    pub fn step(&mut self, limit: f64) -> Result<Vec<EngineEvent>> {
        let now = self.engine.now();
        let until = (now + self.dt).min(limit.max(now));
        let events = self.engine.advance_to(until);
        self.summary.ticks += 1;
        self.summary.events += events.len();
        self.summary.sim_seconds = until;
        for event in &events {
            log::debug!("{event:?}");
        }
        self.check_invariants()?;
        Ok(events)
    }

    /// Step until the clock reads exactly `t`.
    pub fn run_until(&mut self, t: f64) -> Result<Vec<EngineEvent>> {
        let mut events = Vec::new();
        while self.engine.now() < t {
            events.extend(self.step(t)?);
        }
        Ok(events)
    }

    pub fn run_for(&mut self, seconds: f64) -> Result<Vec<EngineEvent>> {
        let target = self.engine.now() + seconds;
        self.run_until(target)
    }

    /// Engine-wide properties that must hold after every step.
    pub fn check_invariants(&self) -> Result<()> {
        let now = self.engine.now();
        let max_depth = self.engine.config().stack.max_depth;
        for vehicle in self.engine.vehicles() {
            let slot = vehicle.slot();
            ensure!(
                slot.depth() <= max_depth,
                "t={now:.3}: vehicle {} stacked {} deep (max {max_depth})",
                vehicle.id(),
                slot.depth()
            );
            if !slot.is_active() {
                ensure!(
                    vehicle.parameters().is_at_base(),
                    "t={now:.3}: vehicle {} idle but not at base: {:?}",
                    vehicle.id(),
                    vehicle.parameters()
                );
            }
            let auras = self
                .fx
                .running_on(PresentationTarget::Vehicle(vehicle.id()))
                .len();
            ensure!(
                auras == slot.depth(),
                "t={now:.3}: vehicle {} shows {auras} aura(s) for {} effect(s)",
                vehicle.id(),
                slot.depth()
            );
        }
        for trigger in self.engine.registry() {
            let state = trigger.visual_state();
            if state != VisualState::Active {
                ensure!(
                    !trigger.collider_enabled(),
                    "t={now:.3}: {} collider live while {}",
                    trigger.id(),
                    state.key()
                );
                let remaining = trigger
                    .cycle_timer()
                    .and_then(|handle| self.engine.timer_remaining(handle));
                ensure!(
                    remaining.is_some(),
                    "t={now:.3}: {} stuck in {} with no cycle timer",
                    trigger.id(),
                    state.key()
                );
            }
            if trigger.is_cooling_down() {
                let cooldown = f64::from(trigger.cooldown_seconds());
                let remaining = trigger
                    .cooldown_timer()
                    .and_then(|handle| self.engine.timer_remaining(handle));
                match remaining {
                    Some(left) => ensure!(
                        left <= cooldown + 1e-9,
                        "t={now:.3}: {} cooldown has {left:.3}s left of {cooldown:.3}s",
                        trigger.id()
                    ),
                    None => bail!(
                        "t={now:.3}: {} cooling down with no pending timer",
                        trigger.id()
                    ),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_until_lands_exactly_on_target() {
        let mut harness = Harness::new(0.1, false).unwrap();
        harness.run_until(1.05).unwrap();
        assert!((harness.engine.now() - 1.05).abs() <= f64::EPSILON);
        assert_eq!(harness.summary().ticks, 11);
    }

    #[test]
    fn zero_step_is_refused() {
        assert!(Harness::new(0.0, false).is_err());
        assert!(Harness::new(f64::NAN, false).is_err());
    }

    #[test]
    fn invariants_hold_through_a_full_cycle() {
        let mut harness = Harness::new(0.05, false).unwrap();
        let kart = harness.kart().unwrap();
        let booster = harness.trigger(&TriggerConfig::booster()).unwrap();
        harness.contact(booster, kart).unwrap();
        harness.check_invariants().unwrap();
        let trigger = harness.engine.trigger(booster).unwrap();
        assert!(trigger.cooldown_timer().is_some());
        assert!(trigger.cycle_timer().is_some());

        harness.run_until(7.0).unwrap();
        let trigger = harness.engine.trigger(booster).unwrap();
        assert!(trigger.cooldown_timer().is_none());
        assert!(trigger.cycle_timer().is_none());
        assert!(trigger.collider_enabled());
    }

    #[test]
    fn contacts_are_counted() {
        let mut harness = Harness::new(0.1, false).unwrap();
        let kart = harness.kart().unwrap();
        let booster = harness.trigger(&TriggerConfig::booster()).unwrap();
        assert!(harness.contact(booster, kart).unwrap().is_committed());
        assert!(!harness.contact(booster, kart).unwrap().is_committed());
        let summary = harness.summary();
        assert_eq!((summary.contacts, summary.commits), (2, 1));
        assert_eq!(harness.impulses(kart).len(), 1);
    }
}
