use boostline_game::recording::ImpulseLog;
use boostline_game::{
    ColliderRef, ContactOutcome, EffectEngine, EngineEvent, IgnoreReason, PresentationTarget,
    RecordingBody, RecordingPresentation, TriggerConfig, TriggerId, Vec3, VehicleId,
    VisualState,
};
use std::collections::HashMap;

type Engine = EffectEngine<HashMap<ColliderRef, VehicleId>, RecordingPresentation>;

struct Track {
    engine: Engine,
    fx: RecordingPresentation,
}

impl Track {
    fn new() -> Self {
        let fx = RecordingPresentation::default();
        Self {
            engine: EffectEngine::new(HashMap::new(), fx.clone()),
            fx,
        }
    }

    fn kart(&mut self, collider: u64) -> (VehicleId, ImpulseLog) {
        let body = RecordingBody::default();
        let log = body.log();
        let id = self.engine.spawn_vehicle(Some(Box::new(body))).unwrap();
        self.engine.lookup_mut().insert(ColliderRef(collider), id);
        (id, log)
    }

    fn trigger(&mut self, config: &TriggerConfig) -> TriggerId {
        self.engine.create_trigger(config, Vec3::ZERO).unwrap()
    }

    fn throttle(&self, id: VehicleId) -> f32 {
        self.engine
            .vehicle(id)
            .unwrap()
            .parameters()
            .current_throttle_ceiling()
    }
}

#[test]
fn booster_doubles_throttle_then_reverts() {
    let mut track = Track::new();
    let (kart, impulses) = track.kart(1);
    // Cooldown and collider are separate gates: with a zero respawn the
    // collider is back before the 1.0s cooldown ends, so the cooldown alone
    // decides when the booster is hittable again.
    let booster = track.trigger(&TriggerConfig::booster().with_timing(1.0, 0.0));

    let outcome = track.engine.handle_contact(booster, ColliderRef(1));
    assert!(outcome.is_committed());
    assert!((track.throttle(kart) - 4000.0).abs() <= f32::EPSILON);
    {
        let impulses = impulses.borrow();
        assert_eq!(impulses.len(), 1);
        assert!((impulses[0].1 - 5000.0).abs() <= f32::EPSILON);
        assert_eq!(impulses[0].0, Vec3::FORWARD);
    }

    track.engine.advance_to(0.5);
    assert_eq!(
        track.engine.handle_contact(booster, ColliderRef(1)),
        ContactOutcome::Ignored(IgnoreReason::CoolingDown)
    );

    let events = track.engine.advance_to(1.0);
    assert!(events.contains(&EngineEvent::CooldownReady {
        trigger: booster,
        at: 1.0
    }));
    let trigger = track.engine.trigger(booster).unwrap();
    assert!(!trigger.is_cooling_down());
    assert!(trigger.collider_enabled());
    // effect window is still open; the non-stacking booster steps aside
    assert_eq!(
        track.engine.handle_contact(booster, ColliderRef(1)),
        ContactOutcome::Ignored(IgnoreReason::AlreadyAffected)
    );

    let events = track.engine.advance_to(3.0);
    assert!(events.contains(&EngineEvent::EffectExpired {
        vehicle: kart,
        at: 3.0
    }));
    assert!((track.throttle(kart) - 2000.0).abs() <= f32::EPSILON);
    assert!(track.engine.vehicle(kart).unwrap().parameters().is_at_base());
    assert_eq!(impulses.borrow().len(), 1);
}

#[test]
fn stock_respawn_keeps_collider_hidden_after_cooldown() {
    let mut track = Track::new();
    track.kart(1);
    let (other, _) = track.kart(2);
    let booster = track.trigger(&TriggerConfig::booster());
    assert!(track.engine.handle_contact(booster, ColliderRef(1)).is_committed());

    let events = track.engine.advance_to(1.0);
    assert!(events.contains(&EngineEvent::CooldownReady {
        trigger: booster,
        at: 1.0
    }));
    let trigger = track.engine.trigger(booster).unwrap();
    assert!(!trigger.is_cooling_down());
    assert!(!trigger.collider_enabled());
    assert_eq!(
        track.engine.handle_contact(booster, ColliderRef(2)),
        ContactOutcome::Ignored(IgnoreReason::Hidden)
    );

    track.engine.advance_to(6.0);
    assert!(track.engine.trigger(booster).unwrap().collider_enabled());
    assert!(track.engine.handle_contact(booster, ColliderRef(2)).is_committed());
    assert!((track.throttle(other) - 4000.0).abs() <= f32::EPSILON);
}

#[test]
fn hazard_on_boosted_kart_changes_nothing() {
    let mut track = Track::new();
    let (kart, _) = track.kart(1);
    let booster = track.trigger(&TriggerConfig::booster());
    let hazard = track.trigger(&TriggerConfig::hazard());

    assert!(track.engine.handle_contact(booster, ColliderRef(1)).is_committed());
    let before = *track.engine.vehicle(kart).unwrap().parameters();
    let pending = track.engine.pending_timers();
    track.fx.clear();

    assert_eq!(
        track.engine.handle_contact(hazard, ColliderRef(1)),
        ContactOutcome::Ignored(IgnoreReason::AlreadyAffected)
    );
    assert_eq!(*track.engine.vehicle(kart).unwrap().parameters(), before);
    assert_eq!(track.engine.pending_timers(), pending);
    assert!(track.fx.calls().is_empty());

    let trigger = track.engine.trigger(hazard).unwrap();
    assert!(!trigger.is_cooling_down());
    assert_eq!(trigger.visual_state(), VisualState::Active);

    // once the boost is gone the hazard bites
    track.engine.advance_to(3.0);
    assert!(track.engine.handle_contact(hazard, ColliderRef(1)).is_committed());
    assert!((track.throttle(kart) - 800.0).abs() < 1e-3);
    let steer = track
        .engine
        .vehicle(kart)
        .unwrap()
        .parameters()
        .current_steer_ceiling();
    assert!((steer - 17.0).abs() <= f32::EPSILON);
}

#[test]
fn cooldown_admits_one_kart_per_window() {
    let mut track = Track::new();
    let karts: Vec<_> = (0..5).map(|c| track.kart(c).0).collect();
    let booster = track.trigger(&TriggerConfig::booster().with_timing(1.0, 0.0));

    let committed = (0..5)
        .filter(|c| {
            track
                .engine
                .handle_contact(booster, ColliderRef(*c))
                .is_committed()
        })
        .count();
    assert_eq!(committed, 1);
    let boosted = karts
        .iter()
        .filter(|id| track.engine.vehicle(**id).unwrap().is_effect_active())
        .count();
    assert_eq!(boosted, 1);

    // spam every 0.25 s for the rest of the window
    for step in 1..4 {
        track.engine.advance_to(f64::from(step) * 0.25);
        for c in 1..5 {
            assert!(!track.engine.handle_contact(booster, ColliderRef(c)).is_committed());
        }
    }

    track.engine.advance_to(1.0);
    assert!(track.engine.handle_contact(booster, ColliderRef(3)).is_committed());
}

#[test]
fn stacked_boosts_compound_and_unwind_one_by_one() {
    let mut track = Track::new();
    let (kart, _) = track.kart(1);
    let stacking = TriggerConfig::booster().with_stacking(true);
    let pads: Vec<_> = (0..4).map(|_| track.trigger(&stacking)).collect();

    assert!(track.engine.handle_contact(pads[0], ColliderRef(1)).is_committed());
    track.engine.advance_to(0.5);
    assert!(track.engine.handle_contact(pads[1], ColliderRef(1)).is_committed());
    track.engine.advance_to(1.0);
    assert!(track.engine.handle_contact(pads[2], ColliderRef(1)).is_committed());
    assert!((track.throttle(kart) - 16_000.0).abs() <= f32::EPSILON);

    // depth limit: the fourth pad is refused and stays armed
    let refused = track.engine.handle_contact(pads[3], ColliderRef(1));
    assert!(matches!(
        refused,
        ContactOutcome::Ignored(IgnoreReason::Refused(_))
    ));
    assert!(track.engine.trigger(pads[3]).unwrap().collider_enabled());

    track.engine.advance_to(3.0);
    assert!((track.throttle(kart) - 8000.0).abs() <= f32::EPSILON);
    track.engine.advance_to(3.5);
    assert!((track.throttle(kart) - 4000.0).abs() <= f32::EPSILON);
    track.engine.advance_to(4.0);
    assert!(track.engine.vehicle(kart).unwrap().parameters().is_at_base());
    assert!(
        track
            .fx
            .running_on(PresentationTarget::Vehicle(kart))
            .is_empty()
    );
}

#[test]
fn visual_cycle_takes_collapse_respawn_and_grow() {
    let mut track = Track::new();
    track.kart(1);
    let booster = track.trigger(&TriggerConfig::booster());
    track.engine.handle_contact(booster, ColliderRef(1));
    let cycle = track.engine.trigger(booster).unwrap().cycle_seconds();

    let mut reactivated_at = None;
    let mut t = 0.0;
    while reactivated_at.is_none() && t < 10.0 {
        t += 1.0 / 60.0;
        for event in track.engine.advance_to(t) {
            if let EngineEvent::Reactivated { at, .. } = event {
                reactivated_at = Some(at);
            }
        }
        let trigger = track.engine.trigger(booster).unwrap();
        if reactivated_at.is_none() {
            assert!(!trigger.collider_enabled(), "collider live at {t}");
        }
    }
    let at = reactivated_at.unwrap();
    assert!((at - cycle).abs() < 1e-9);
    assert!(track.engine.trigger(booster).unwrap().collider_enabled());
}

#[test]
fn teardown_leaves_no_trigger_timers() {
    let mut track = Track::new();
    for c in 0..10 {
        track.kart(c);
    }
    let triggers: Vec<_> = (0..10)
        .map(|_| track.trigger(&TriggerConfig::booster()))
        .collect();
    for (c, trigger) in (0..10).zip(&triggers) {
        assert!(track.engine.handle_contact(*trigger, ColliderRef(c)).is_committed());
    }
    assert!(track.engine.create_trigger(&TriggerConfig::booster(), Vec3::ZERO).is_err());

    track.engine.destroy_registry();
    let events = track.engine.advance_to(30.0);
    assert!(events.iter().all(|event| matches!(event, EngineEvent::EffectExpired { .. })));
    assert_eq!(track.engine.pending_timers(), 0);
    for trigger in triggers {
        assert_eq!(
            track.engine.handle_contact(trigger, ColliderRef(0)),
            ContactOutcome::Ignored(IgnoreReason::UnknownTrigger)
        );
    }
}

#[test]
fn global_tuning_spares_running_effects() {
    let mut track = Track::new();
    let (first, _) = track.kart(1);
    let (second, _) = track.kart(2);
    let a = track.trigger(&TriggerConfig::booster());
    let b = track.trigger(&TriggerConfig::booster());

    track.engine.handle_contact(a, ColliderRef(1));
    track.engine.apply_global_tuning(3.0, 1.0, 0.0).unwrap();
    assert!((track.throttle(first) - 4000.0).abs() <= f32::EPSILON);

    track.engine.handle_contact(b, ColliderRef(2));
    assert!((track.throttle(second) - 6000.0).abs() <= f32::EPSILON);

    track.engine.advance_to(1.0);
    assert!(track.engine.vehicle(second).unwrap().parameters().is_at_base());
    assert!(!track.engine.vehicle(first).unwrap().parameters().is_at_base());
}

#[test]
fn disabled_triggers_keep_their_cycle() {
    let mut track = Track::new();
    track.kart(1);
    let booster = track.trigger(&TriggerConfig::booster());
    track.engine.handle_contact(booster, ColliderRef(1));
    let pending = track.engine.pending_timers();

    track.engine.set_all_enabled(false);
    assert_eq!(track.engine.pending_timers(), pending);
    track.engine.advance_to(10.0);
    let trigger = track.engine.trigger(booster).unwrap();
    assert_eq!(trigger.visual_state(), VisualState::Active);
    assert!(!trigger.collider_enabled());
    assert_eq!(
        track.engine.handle_contact(booster, ColliderRef(1)),
        ContactOutcome::Ignored(IgnoreReason::Disabled)
    );

    track.engine.set_all_enabled(true);
    assert!(track.engine.handle_contact(booster, ColliderRef(1)).is_committed());
}
