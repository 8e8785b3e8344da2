//! Trigger instances: boosters and hazards placed on the track.
//!
//! A trigger runs two independent machines:
//!
//! - a cooldown gate, closed for `cooldown_seconds` after every commit, which
//!   refuses contacts regardless of what the trigger looks like;
//! - the visual cycle `Active → Disappearing → Dormant → Reappearing → Active`.
//!   The collider is live only in `Active` (and only while enabled).
//!
//! Neither machine is tied to the lifetime of the effect it handed out: the
//! vehicle's slot expires the modifier on its own timer.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::BoosterType;
use crate::clock::{Clock, Continuation, TimerHandle};
use crate::config::{AnimationConfig, TriggerConfig, TriggerKind};
use crate::error::EffectError;
use crate::math::{Rgba, Vec3};
use crate::modifier::ModifierTemplate;
use crate::numbers::{seconds, unit_progress};
use crate::slot::ApplyMode;
use crate::vehicle::{Vehicle, VehicleId};
use crate::{EffectHandle, PresentationEffects, PresentationTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub u32);

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger #{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualState {
    Active,
    /// Shrinking to zero; collider already off.
    Disappearing,
    /// Invisible, waiting for the respawn timer.
    Dormant,
    /// Growing back from zero; collider still off.
    Reappearing,
}

impl VisualState {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disappearing => "disappearing",
            Self::Dormant => "dormant",
            Self::Reappearing => "reappearing",
        }
    }
}

/// Why a contact produced no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTrigger,
    NotAVehicle,
    CoolingDown,
    Disabled,
    Hidden,
    /// Non-stacking trigger and the vehicle already carries an effect.
    AlreadyAffected,
    /// The slot refused the modifier.
    Refused(EffectError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Committed {
        vehicle: VehicleId,
        expiry: TimerHandle,
    },
    Ignored(IgnoreReason),
}

impl ContactOutcome {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TriggerInstance {
    id: TriggerId,
    kind: TriggerKind,
    position: Vec3,
    template: ModifierTemplate,
    force_magnitude: f32,
    cooldown_seconds: f32,
    respawn_seconds: f32,
    can_stack: bool,
    color: Rgba,
    trigger_effect: Option<EffectHandle>,
    sound: Option<EffectHandle>,
    vehicle_aura: Option<EffectHandle>,
    animation: AnimationConfig,
    enabled: bool,
    visual_state: VisualState,
    phase_started_at: f64,
    cooldown_timer: Option<TimerHandle>,
    /// The single outstanding timer of the visual cycle (collapse end,
    /// respawn, grow end).
    respawn_timer: Option<TimerHandle>,
}

impl TriggerInstance {
    pub(crate) fn new(
        id: TriggerId,
        config: &TriggerConfig,
        position: Vec3,
        animation: AnimationConfig,
        enabled: bool,
    ) -> Self {
        Self {
            id,
            kind: config.kind,
            position,
            template: config.template(),
            force_magnitude: config.force_magnitude,
            cooldown_seconds: config.cooldown_seconds,
            respawn_seconds: config.respawn_seconds,
            can_stack: config.can_stack,
            color: config.color,
            trigger_effect: config.trigger_effect.clone(),
            sound: config.sound.clone(),
            vehicle_aura: config.vehicle_aura.clone(),
            animation,
            enabled,
            visual_state: VisualState::Active,
            phase_started_at: 0.0,
            cooldown_timer: None,
            respawn_timer: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TriggerId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        self.kind
    }

    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    #[must_use]
    pub const fn template(&self) -> &ModifierTemplate {
        &self.template
    }

    #[must_use]
    pub const fn force_magnitude(&self) -> f32 {
        self.force_magnitude
    }

    #[must_use]
    pub const fn cooldown_seconds(&self) -> f32 {
        self.cooldown_seconds
    }

    #[must_use]
    pub const fn respawn_seconds(&self) -> f32 {
        self.respawn_seconds
    }

    #[must_use]
    pub const fn can_stack(&self) -> bool {
        self.can_stack
    }

    #[must_use]
    pub const fn color(&self) -> Rgba {
        self.color
    }

    #[must_use]
    pub const fn trigger_effect(&self) -> Option<&EffectHandle> {
        self.trigger_effect.as_ref()
    }

    #[must_use]
    pub const fn sound(&self) -> Option<&EffectHandle> {
        self.sound.as_ref()
    }

    #[must_use]
    pub const fn vehicle_aura(&self) -> Option<&EffectHandle> {
        self.vehicle_aura.as_ref()
    }

    #[must_use]
    pub const fn visual_state(&self) -> VisualState {
        self.visual_state
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a contact can currently reach this trigger at all.
    #[must_use]
    pub fn collider_enabled(&self) -> bool {
        self.enabled && self.visual_state == VisualState::Active
    }

    /// True while the cooldown gate is closed.
    #[must_use]
    pub const fn is_cooling_down(&self) -> bool {
        self.cooldown_timer.is_some()
    }

    #[must_use]
    pub const fn cooldown_timer(&self) -> Option<TimerHandle> {
        self.cooldown_timer
    }

    /// Outstanding step of the collapse, respawn and grow cycle.
    #[must_use]
    pub const fn cycle_timer(&self) -> Option<TimerHandle> {
        self.respawn_timer
    }

    #[must_use]
    pub const fn has_pending_timers(&self) -> bool {
        self.cooldown_timer.is_some() || self.respawn_timer.is_some()
    }

    /// Length of a full visual cycle started by one commit.
    #[must_use]
    pub fn cycle_seconds(&self) -> f64 {
        self.animation.collapse_seconds()
            + seconds(self.respawn_seconds)
            + self.animation.grow_seconds()
    }

    /// Mesh scale at `now`: 1 when active, 0 when dormant, lerped in between
    /// from the time elapsed in the current phase.
    #[must_use]
    pub fn visual_scale(&self, now: f64) -> f32 {
        let progress = |duration: f64| {
            if duration <= 0.0 {
                1.0
            } else {
                unit_progress((now - self.phase_started_at) / duration)
            }
        };
        match self.visual_state {
            VisualState::Active => 1.0,
            VisualState::Dormant => 0.0,
            VisualState::Disappearing => 1.0 - progress(self.animation.collapse_seconds()),
            VisualState::Reappearing => progress(self.animation.grow_seconds()),
        }
    }

    /// Resolve a contact with `vehicle`.
    ///
    /// Admissibility and commit happen in one call, so two contacts in the
    /// same step can never both pass the gate.
    pub fn contact<C, P>(
        &mut self,
        vehicle: &mut Vehicle,
        clock: &mut C,
        presentation: &mut P,
    ) -> ContactOutcome
    where
        C: Clock<Tag = Continuation> + ?Sized,
        P: PresentationEffects + ?Sized,
    {
        if self.cooldown_timer.is_some() {
            return ContactOutcome::Ignored(IgnoreReason::CoolingDown);
        }
        if !self.enabled {
            return ContactOutcome::Ignored(IgnoreReason::Disabled);
        }
        if self.visual_state != VisualState::Active {
            return ContactOutcome::Ignored(IgnoreReason::Hidden);
        }
        if !self.can_stack && vehicle.is_effect_active() {
            log::debug!(
                "{} ignored vehicle {}: effect already active",
                self.id,
                vehicle.id()
            );
            return ContactOutcome::Ignored(IgnoreReason::AlreadyAffected);
        }

        let mode = if self.can_stack {
            ApplyMode::Stack
        } else {
            ApplyMode::Exclusive
        };
        let expiry = match vehicle.apply_effect(
            self.template.stamp(self.id),
            mode,
            self.vehicle_aura.as_ref(),
            clock,
            presentation,
        ) {
            Ok(expiry) => expiry,
            Err(err) => {
                log::debug!("{} refused for vehicle {}: {err}", self.id, vehicle.id());
                return ContactOutcome::Ignored(IgnoreReason::Refused(err));
            }
        };

        if self.force_magnitude > 0.0 {
            if let Err(diagnostic) = vehicle.push_forward(self.force_magnitude) {
                log::warn!("{}: {diagnostic}", self.id);
            }
        }
        let here = PresentationTarget::Trigger(self.id);
        for handle in [self.trigger_effect.as_ref(), self.sound.as_ref()]
            .into_iter()
            .flatten()
        {
            presentation.play(handle, here);
        }

        self.cooldown_timer = Some(clock.schedule_after(
            seconds(self.cooldown_seconds),
            Continuation::CooldownElapsed { trigger: self.id },
        ));
        self.begin_phase(
            VisualState::Disappearing,
            self.animation.collapse_seconds(),
            clock,
        );
        log::info!(
            "{} ({}) committed x{:.2} for {:.1}s on vehicle {}",
            self.id,
            self.kind.key(),
            self.template.throttle_multiplier,
            self.template.duration_seconds,
            vehicle.id()
        );
        ContactOutcome::Committed {
            vehicle: vehicle.id(),
            expiry,
        }
    }

    /// Reopen the gate. Returns false for a stale handle.
    pub(crate) fn on_cooldown_elapsed(&mut self, handle: TimerHandle) -> bool {
        if self.cooldown_timer != Some(handle) {
            return false;
        }
        self.cooldown_timer = None;
        true
    }

    /// Advance the visual cycle. Returns the state entered, or `None` for a
    /// stale handle.
    pub(crate) fn on_cycle_step<C>(&mut self, handle: TimerHandle, clock: &mut C) -> Option<VisualState>
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        if self.respawn_timer != Some(handle) {
            return None;
        }
        self.respawn_timer = None;
        match self.visual_state {
            VisualState::Disappearing => {
                self.begin_phase(VisualState::Dormant, seconds(self.respawn_seconds), clock);
            }
            VisualState::Dormant => {
                self.begin_phase(VisualState::Reappearing, self.animation.grow_seconds(), clock);
            }
            VisualState::Reappearing => {
                self.visual_state = VisualState::Active;
                self.phase_started_at = clock.now();
            }
            VisualState::Active => return None,
        }
        log::debug!("{} entered {}", self.id, self.visual_state.key());
        Some(self.visual_state)
    }

    /// Cancel every outstanding timer. Returns how many were still pending.
    pub(crate) fn cancel_timers<C>(&mut self, clock: &mut C) -> usize
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        [self.cooldown_timer.take(), self.respawn_timer.take()]
            .into_iter()
            .flatten()
            .filter(|handle| clock.cancel(*handle))
            .count()
    }

    pub(crate) const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) const fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub(crate) const fn retune(&mut self, multiplier: f32, duration_seconds: f32, force: f32) {
        self.template.throttle_multiplier = multiplier;
        self.template.duration_seconds = duration_seconds;
        self.force_magnitude = force;
    }

    /// Copy a preset's tuning and presentation onto this trigger.
    pub(crate) fn adopt_type(&mut self, preset: &BoosterType) {
        self.template.throttle_multiplier = preset.multiplier;
        self.template.duration_seconds = preset.duration;
        self.force_magnitude = preset.force;
        self.cooldown_seconds = preset.cooldown;
        self.color = preset.color;
        self.sound.clone_from(&preset.sound);
        self.trigger_effect.clone_from(&preset.particles);
    }

    fn begin_phase<C>(&mut self, state: VisualState, duration: f64, clock: &mut C)
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        if let Some(stale) = self.respawn_timer.take() {
            clock.cancel(stale);
        }
        self.visual_state = state;
        self.phase_started_at = clock.now();
        self.respawn_timer = Some(clock.schedule_after(
            duration,
            Continuation::CycleStep { trigger: self.id },
        ));
    }
}
