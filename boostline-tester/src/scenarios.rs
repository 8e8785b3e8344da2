use anyhow::{Context, Result, bail, ensure};
use boostline_game::{
    ContactOutcome, EngineConfig, EngineEvent, IgnoreReason, TriggerConfig, Vec3, VisualState,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::harness::{Harness, RunSummary};

/// Inputs shared by every scenario run.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub dt: f64,
    pub verbose: bool,
}

pub type ScenarioFn = fn(&ScenarioCtx) -> Result<RunSummary>;

pub struct Scenario {
    pub key: &'static str,
    pub description: &'static str,
    pub run: ScenarioFn,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "booster-basic",
        description: "Booster doubles throttle, pushes once, reverts at 3 s",
        run: booster_basic,
    },
    Scenario {
        key: "hazard-rejected",
        description: "Hazard on a boosted kart is ignored without side effects",
        run: hazard_rejected,
    },
    Scenario {
        key: "cooldown-spam",
        description: "Many karts hammering one booster get one commit per window",
        run: cooldown_spam,
    },
    Scenario {
        key: "stacking",
        description: "Stacking pads compound up to the depth limit and unwind",
        run: stacking,
    },
    Scenario {
        key: "visual-cycle",
        description: "Collapse, respawn and grow take exactly the configured time",
        run: visual_cycle,
    },
    Scenario {
        key: "registry-teardown",
        description: "Destroying a full registry leaves no trigger timers behind",
        run: registry_teardown,
    },
    Scenario {
        key: "random-course",
        description: "Seeded karts driving through random presets and hazards",
        run: random_course,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.key, s.description))
}

pub fn get_scenario(key: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.key == key)
}

/// Expand `all` into every scenario key, keeping explicit keys in order.
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut scenarios: Vec<String> = requested
        .iter()
        .filter(|s| s.as_str() != "all")
        .cloned()
        .collect();
    if requested.iter().any(|s| s == "all") {
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn close(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() <= expected.abs().max(1.0) * 1e-5
}

fn booster_basic(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let kart = h.kart()?;
    let booster = h.trigger(&TriggerConfig::booster())?;

    ensure!(h.contact(booster, kart)?.is_committed(), "first contact refused");
    let throttle = h.throttle(kart)?;
    ensure!(close(throttle, 4000.0), "boosted throttle {throttle}, want 4000");
    let impulses = h.impulses(kart);
    ensure!(impulses.len() == 1, "{} impulses, want 1", impulses.len());
    ensure!(close(impulses[0].1, 5000.0), "impulse {}", impulses[0].1);

    h.run_until(1.0)?;
    let trigger = h.engine.trigger(booster).context("booster vanished")?;
    ensure!(!trigger.is_cooling_down(), "cooldown still closed at 1.0 s");

    h.run_until(2.9)?;
    ensure!(close(h.throttle(kart)?, 4000.0), "boost ended early");
    h.run_until(3.0)?;
    let throttle = h.throttle(kart)?;
    ensure!(close(throttle, 2000.0), "throttle {throttle} after expiry, want 2000");
    ensure!(h.impulses(kart).len() == 1, "impulse repeated");
    Ok(h.summary())
}

fn hazard_rejected(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let kart = h.kart()?;
    let booster = h.trigger(&TriggerConfig::booster())?;
    let hazard = h.trigger(&TriggerConfig::hazard())?;

    h.contact(booster, kart)?;
    h.run_until(0.5)?;
    let before = h.throttle(kart)?;
    let pending = h.engine.pending_timers();
    let outcome = h.contact(hazard, kart)?;
    ensure!(
        outcome == ContactOutcome::Ignored(IgnoreReason::AlreadyAffected),
        "hazard outcome {outcome:?}"
    );
    ensure!(h.throttle(kart)? == before, "hazard changed the slot");
    ensure!(h.engine.pending_timers() == pending, "hazard scheduled timers");
    let trigger = h.engine.trigger(hazard).context("hazard vanished")?;
    ensure!(
        !trigger.is_cooling_down() && trigger.visual_state() == VisualState::Active,
        "rejected hazard consumed its window"
    );

    h.run_until(3.0)?;
    ensure!(h.contact(hazard, kart)?.is_committed(), "hazard refused a clean kart");
    let throttle = h.throttle(kart)?;
    ensure!(close(throttle, 800.0), "hazard throttle {throttle}, want 800");
    h.run_for(3.0)?;
    ensure!(close(h.throttle(kart)?, 2000.0), "hazard never wore off");
    Ok(h.summary())
}

fn cooldown_spam(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let mut karts = (0..6).map(|_| h.kart()).collect::<Result<Vec<_>>>()?;
    let booster = h.trigger(&TriggerConfig::booster().with_timing(1.0, 0.0))?;

    let mut committed = 0;
    while h.engine.now() < 1.0 {
        karts.shuffle(&mut rng);
        for kart in &karts {
            if h.contact(booster, *kart)?.is_committed() {
                committed += 1;
            }
        }
        h.step(1.0)?;
    }
    ensure!(committed == 1, "{committed} commits inside one cooldown window");
    let boosted = karts
        .iter()
        .filter(|kart| {
            h.engine
                .vehicle(**kart)
                .is_some_and(boostline_game::Vehicle::is_effect_active)
        })
        .count();
    ensure!(boosted == 1, "{boosted} karts boosted");

    let idle = karts
        .iter()
        .copied()
        .find(|kart| {
            h.engine
                .vehicle(*kart)
                .is_some_and(|vehicle| !vehicle.is_effect_active())
        })
        .context("no idle kart")?;
    ensure!(
        h.contact(booster, idle)?.is_committed(),
        "gate did not reopen at 1.0 s"
    );
    Ok(h.summary())
}

fn stacking(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let kart = h.kart()?;
    let pad = TriggerConfig::booster().with_stacking(true);
    let pads = (0..4)
        .map(|_| h.trigger(&pad))
        .collect::<Result<Vec<_>>>()?;

    for (i, pad) in pads.iter().take(3).enumerate() {
        h.run_until(0.5 * f64::from(u8::try_from(i)?))?;
        ensure!(h.contact(*pad, kart)?.is_committed(), "pad {i} refused");
    }
    let throttle = h.throttle(kart)?;
    ensure!(close(throttle, 16_000.0), "stacked throttle {throttle}, want 16000");
    match h.contact(pads[3], kart)? {
        ContactOutcome::Ignored(IgnoreReason::Refused(_)) => {}
        other => bail!("fourth pad: {other:?}"),
    }

    for (t, want) in [(3.0, 8000.0), (3.5, 4000.0), (4.0, 2000.0)] {
        h.run_until(t)?;
        let throttle = h.throttle(kart)?;
        ensure!(close(throttle, want), "t={t}: throttle {throttle}, want {want}");
    }
    Ok(h.summary())
}

fn visual_cycle(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let kart = h.kart()?;
    let booster = h.trigger(&TriggerConfig::booster())?;
    h.contact(booster, kart)?;
    let cycle = h
        .engine
        .trigger(booster)
        .context("booster vanished")?
        .cycle_seconds();

    let mut reactivated = None;
    while reactivated.is_none() && h.engine.now() < cycle + 1.0 {
        for event in h.step(cycle + 1.0)? {
            if let EngineEvent::Reactivated { at, .. } = event {
                reactivated = Some(at);
            }
        }
        let trigger = h.engine.trigger(booster).context("booster vanished")?;
        if reactivated.is_none() {
            ensure!(
                !trigger.collider_enabled(),
                "collider live at t={:.3}",
                h.engine.now()
            );
        }
    }
    let at = reactivated.context("booster never came back")?;
    ensure!(
        (at - cycle).abs() < 1e-9,
        "cycle took {at:.6}s, want {cycle:.6}s"
    );
    Ok(h.summary())
}

fn registry_teardown(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut h = Harness::new(ctx.dt, ctx.verbose)?;
    let max = h.engine.config().registry.max_triggers;
    for _ in 0..max {
        let kart = h.kart()?;
        let trigger = h.trigger(&TriggerConfig::booster())?;
        ensure!(h.contact(trigger, kart)?.is_committed(), "{trigger} refused");
    }
    ensure!(
        h.trigger(&TriggerConfig::booster()).is_err(),
        "registry accepted trigger {} of {max}",
        max + 1
    );

    let cancelled = h.engine.destroy_registry();
    ensure!(cancelled == 2 * max, "cancelled {cancelled} timers");
    let events = h.run_for(30.0)?;
    if let Some(stray) = events
        .iter()
        .find(|event| !matches!(event, EngineEvent::EffectExpired { .. }))
    {
        bail!("destroyed trigger still fired: {stray:?}");
    }
    ensure!(h.engine.pending_timers() == 0, "timers left behind");
    Ok(h.summary())
}

fn random_course(ctx: &ScenarioCtx) -> Result<RunSummary> {
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
    let mut config = EngineConfig::default();
    config.registry.max_triggers = 8;
    let mut h = Harness::with_config(config, ctx.dt, ctx.verbose)?;

    let karts = (0..4).map(|_| h.kart()).collect::<Result<Vec<_>>>()?;
    let mut triggers = Vec::new();
    for _ in 0..5 {
        triggers.push(h.engine.create_random_trigger(rng.r#gen(), Vec3::ZERO)?);
    }
    triggers.push(h.trigger(&TriggerConfig::hazard())?);
    triggers.push(h.trigger(&TriggerConfig::hazard().with_timing(0.5, 2.0))?);
    triggers.push(h.trigger(&TriggerConfig::booster().with_stacking(true))?);
    h.engine.scatter_triggers(rng.r#gen(), boostline_game::constants::LEVEL_SIZE);

    while h.engine.now() < 20.0 {
        for kart in &karts {
            if rng.gen_bool(0.2) {
                let pick = triggers[rng.gen_range(0..triggers.len())];
                h.contact(pick, *kart)?;
            }
        }
        h.step(20.0)?;
    }

    h.run_for(30.0)?;
    for kart in &karts {
        let vehicle = h.engine.vehicle(*kart).context("kart vanished")?;
        ensure!(
            vehicle.parameters().is_at_base(),
            "kart {kart} still modified after the course"
        );
    }
    ensure!(h.engine.pending_timers() == 0, "timers still pending");
    ensure!(
        h.engine.registry().active_count() == triggers.len(),
        "not every trigger respawned"
    );
    Ok(h.summary())
}
