//! Bounded collection of trigger instances.
use rand::Rng;

use crate::catalog::TypeCatalog;
use crate::clock::{Clock, Continuation};
use crate::config::{AnimationConfig, RegistryConfig, TriggerConfig, validate_tuning};
use crate::constants::SCATTER_HEIGHT;
use crate::error::{ConfigError, RegistryError};
use crate::math::Vec3;
use crate::trigger::{TriggerId, TriggerInstance};

/// Owns every trigger on the course, in creation order.
///
/// Ids are handed out monotonically and never reused, so a continuation that
/// outlives its trigger can only ever miss.
#[derive(Debug, Clone)]
pub struct TriggerRegistry {
    config: RegistryConfig,
    animation: AnimationConfig,
    triggers: Vec<TriggerInstance>,
    next_id: u32,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default(), AnimationConfig::default())
    }
}

impl TriggerRegistry {
    #[must_use]
    pub const fn new(config: RegistryConfig, animation: AnimationConfig) -> Self {
        Self {
            config,
            animation,
            triggers: Vec::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Triggers whose collider is currently live.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.triggers
            .iter()
            .filter(|trigger| trigger.collider_enabled())
            .count()
    }

    #[must_use]
    pub fn get(&self, id: TriggerId) -> Option<&TriggerInstance> {
        self.triggers.iter().find(|trigger| trigger.id() == id)
    }

    pub fn get_mut(&mut self, id: TriggerId) -> Option<&mut TriggerInstance> {
        self.triggers.iter_mut().find(|trigger| trigger.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TriggerInstance> {
        self.triggers.iter()
    }

    /// Register a new trigger at `position`.
    ///
    /// Triggers created while the registry is disabled start disabled.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] when `config` fails
    /// validation, [`RegistryError::CapacityExceeded`] once `max_triggers`
    /// are already registered and [`RegistryError::IdsExhausted`] when no
    /// unused id is left.
    pub fn create_trigger(
        &mut self,
        config: &TriggerConfig,
        position: Vec3,
    ) -> Result<TriggerId, RegistryError> {
        if let Err(err) = config.validate() {
            log::warn!("refusing {} trigger: {err}", config.kind.key());
            return Err(err.into());
        }
        if self.triggers.len() >= self.config.max_triggers {
            log::warn!(
                "refusing trigger at ({:.1}, {:.1}, {:.1}): capacity {} reached",
                position.x,
                position.y,
                position.z,
                self.config.max_triggers
            );
            return Err(RegistryError::CapacityExceeded {
                max: self.config.max_triggers,
            });
        }
        let Some(following) = self.next_id.checked_add(1) else {
            log::warn!("refusing trigger: id space exhausted");
            return Err(RegistryError::IdsExhausted);
        };
        let id = TriggerId(self.next_id);
        self.next_id = following;
        self.triggers.push(TriggerInstance::new(
            id,
            config,
            position,
            self.animation,
            self.config.enabled,
        ));
        log::debug!("created {id} ({})", config.kind.key());
        Ok(id)
    }

    /// Register a booster tuned from the preset called `name`.
    ///
    /// Unknown names fall back to the catalog default.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] when the preset's tuning is
    /// out of range, otherwise the same errors as [`Self::create_trigger`].
    pub fn create_trigger_with_type(
        &mut self,
        catalog: &TypeCatalog,
        name: &str,
        position: Vec3,
    ) -> Result<TriggerId, RegistryError> {
        let preset = catalog.by_name(name);
        preset.validate()?;
        let id = self.create_trigger(&TriggerConfig::booster(), position)?;
        if let Some(trigger) = self.get_mut(id) {
            catalog.apply(trigger, preset);
        }
        Ok(id)
    }

    /// Cancel the trigger's timers and drop it. Unknown ids are a no-op.
    ///
    /// Returns whether a trigger was removed.
    pub fn remove_trigger<C>(&mut self, id: TriggerId, clock: &mut C) -> bool
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        let Some(index) = self.triggers.iter().position(|trigger| trigger.id() == id) else {
            return false;
        };
        let mut trigger = self.triggers.remove(index);
        let cancelled = trigger.cancel_timers(clock);
        log::debug!("removed {id}, cancelled {cancelled} timer(s)");
        true
    }

    /// Toggle every trigger's collider without touching its timers.
    pub fn set_all_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        for trigger in &mut self.triggers {
            trigger.set_enabled(enabled);
        }
        log::debug!(
            "{} trigger(s) {}",
            self.triggers.len(),
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Rewrite every template. Effects already applied to vehicles keep the
    /// values they were stamped with.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves every trigger untouched when the tuning
    /// is out of range.
    pub fn apply_global_tuning(
        &mut self,
        multiplier: f32,
        duration_seconds: f32,
        force: f32,
    ) -> Result<(), ConfigError> {
        if let Err(err) = validate_tuning(multiplier, duration_seconds, force) {
            log::warn!("global tuning refused: {err}");
            return Err(err);
        }
        for trigger in &mut self.triggers {
            trigger.retune(multiplier, duration_seconds, force);
        }
        log::info!(
            "retuned {} trigger(s): x{multiplier:.2} for {duration_seconds:.1}s, force {force:.0}",
            self.triggers.len()
        );
        Ok(())
    }

    /// Scatter every trigger over a `level_size` square centred on the origin.
    pub fn randomize_positions<R>(&mut self, rng: &mut R, level_size: f32)
    where
        R: Rng + ?Sized,
    {
        let half = if level_size.is_finite() {
            level_size.abs() / 2.0
        } else {
            0.0
        };
        for trigger in &mut self.triggers {
            let (x, z) = if half > 0.0 {
                (rng.gen_range(-half..=half), rng.gen_range(-half..=half))
            } else {
                (0.0, 0.0)
            };
            trigger.set_position(Vec3::new(x, SCATTER_HEIGHT, z));
        }
    }

    /// Tear the registry down, cancelling every outstanding timer first.
    ///
    /// Returns how many timers were cancelled.
    pub fn destroy<C>(mut self, clock: &mut C) -> usize
    where
        C: Clock<Tag = Continuation> + ?Sized,
    {
        let cancelled = self
            .triggers
            .iter_mut()
            .map(|trigger| trigger.cancel_timers(clock))
            .sum();
        log::debug!(
            "registry destroyed: {} trigger(s), {cancelled} timer(s) cancelled",
            self.triggers.len()
        );
        cancelled
    }
}

impl<'a> IntoIterator for &'a TriggerRegistry {
    type Item = &'a TriggerInstance;
    type IntoIter = std::slice::Iter<'a, TriggerInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
