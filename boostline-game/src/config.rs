//! Construction-time configuration records.
//!
//! Every record has serde defaults for each field so partial JSON documents
//! fill in the stock tuning, plus a `validate` that rejects values the
//! state machines cannot honour.
use serde::{Deserialize, Serialize};

use crate::EffectHandle;
use crate::constants::{
    ANIMATION_RATE, BOOSTER_DURATION_SECONDS, BOOSTER_FORCE, BOOSTER_MULTIPLIER,
    BOOSTER_STEER_MULTIPLIER, DEFAULT_STEER_CEILING, DEFAULT_THROTTLE_CEILING, FX_BOOST_BURST,
    FX_BOOST_TRAIL, FX_HAZARD_SPARKS, FX_HAZARD_TINT, HAZARD_DURATION_SECONDS, HAZARD_MULTIPLIER,
    HAZARD_STEER_MULTIPLIER, MAX_TRIGGERS, SFX_BOOST, SFX_HAZARD, TRIGGER_COOLDOWN_SECONDS,
    TRIGGER_RESPAWN_SECONDS,
};
use crate::error::ConfigError;
use crate::math::Rgba;
use crate::modifier::{ModifierTemplate, VehicleParameters};
use crate::numbers::lerp_duration;
use crate::slot::StackPolicy;

/// Which family a trigger belongs to. Only presentation defaults differ; the
/// state machine is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Booster,
    Hazard,
}

impl TriggerKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Booster => "booster",
            Self::Hazard => "hazard",
        }
    }
}

/// Per-trigger tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(default = "TriggerConfig::default_multiplier")]
    pub multiplier: f32,
    #[serde(default = "TriggerConfig::default_steer_multiplier")]
    pub steer_multiplier: f32,
    #[serde(default = "TriggerConfig::default_duration")]
    pub duration_seconds: f32,
    #[serde(default = "TriggerConfig::default_force")]
    pub force_magnitude: f32,
    #[serde(default = "TriggerConfig::default_cooldown")]
    pub cooldown_seconds: f32,
    #[serde(default)]
    pub can_stack: bool,
    #[serde(default = "TriggerConfig::default_respawn")]
    pub respawn_seconds: f32,
    #[serde(default = "TriggerConfig::default_color")]
    pub color: Rgba,
    /// One-shot particles played at the trigger on commit.
    #[serde(default)]
    pub trigger_effect: Option<EffectHandle>,
    /// One-shot sound played at the trigger on commit.
    #[serde(default)]
    pub sound: Option<EffectHandle>,
    /// Vehicle-bound effect kept running while the modifier is active.
    #[serde(default)]
    pub vehicle_aura: Option<EffectHandle>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::booster()
    }
}

impl TriggerConfig {
    const fn default_multiplier() -> f32 {
        BOOSTER_MULTIPLIER
    }

    const fn default_steer_multiplier() -> f32 {
        BOOSTER_STEER_MULTIPLIER
    }

    const fn default_duration() -> f32 {
        BOOSTER_DURATION_SECONDS
    }

    const fn default_force() -> f32 {
        BOOSTER_FORCE
    }

    const fn default_cooldown() -> f32 {
        TRIGGER_COOLDOWN_SECONDS
    }

    const fn default_respawn() -> f32 {
        TRIGGER_RESPAWN_SECONDS
    }

    const fn default_color() -> Rgba {
        Rgba::CYAN
    }

    /// Speed booster: doubles the throttle ceiling and kicks the kart forward.
    #[must_use]
    pub fn booster() -> Self {
        Self {
            kind: TriggerKind::Booster,
            multiplier: BOOSTER_MULTIPLIER,
            steer_multiplier: BOOSTER_STEER_MULTIPLIER,
            duration_seconds: BOOSTER_DURATION_SECONDS,
            force_magnitude: BOOSTER_FORCE,
            cooldown_seconds: TRIGGER_COOLDOWN_SECONDS,
            can_stack: false,
            respawn_seconds: TRIGGER_RESPAWN_SECONDS,
            color: Rgba::CYAN,
            trigger_effect: Some(EffectHandle::new(FX_BOOST_BURST)),
            sound: Some(EffectHandle::new(SFX_BOOST)),
            vehicle_aura: Some(EffectHandle::new(FX_BOOST_TRAIL)),
        }
    }

    /// Slowing hazard: cuts the throttle ceiling, leaves steering alone and
    /// tints the vehicle until the effect wears off.
    #[must_use]
    pub fn hazard() -> Self {
        Self {
            kind: TriggerKind::Hazard,
            multiplier: HAZARD_MULTIPLIER,
            steer_multiplier: HAZARD_STEER_MULTIPLIER,
            duration_seconds: HAZARD_DURATION_SECONDS,
            force_magnitude: 0.0,
            cooldown_seconds: TRIGGER_COOLDOWN_SECONDS,
            can_stack: false,
            respawn_seconds: TRIGGER_RESPAWN_SECONDS,
            color: Rgba::YELLOW,
            trigger_effect: Some(EffectHandle::new(FX_HAZARD_SPARKS)),
            sound: Some(EffectHandle::new(SFX_HAZARD)),
            vehicle_aura: Some(EffectHandle::new(FX_HAZARD_TINT)),
        }
    }

    #[must_use]
    pub fn with_stacking(mut self, can_stack: bool) -> Self {
        self.can_stack = can_stack;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, cooldown_seconds: f32, respawn_seconds: f32) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self.respawn_seconds = respawn_seconds;
        self
    }

    /// Modifier recipe derived from this config.
    #[must_use]
    pub const fn template(&self) -> ModifierTemplate {
        ModifierTemplate {
            throttle_multiplier: self.multiplier,
            steer_multiplier: self.steer_multiplier,
            duration_seconds: self.duration_seconds,
        }
    }

    /// # Errors
    ///
    /// Returns an error when a multiplier is not positive, a duration, force
    /// or delay is negative, or a color channel leaves `0..=1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tuning(self.multiplier, self.duration_seconds, self.force_magnitude)?;
        require_positive("trigger.steer_multiplier", self.steer_multiplier)?;
        require_non_negative("trigger.cooldown_seconds", self.cooldown_seconds)?;
        require_non_negative("trigger.respawn_seconds", self.respawn_seconds)?;
        validate_color(self.color)
    }
}

/// Checks shared by trigger configs, global retuning and catalog presets.
///
/// # Errors
///
/// Returns an error when `multiplier` is not positive or `duration_seconds`
/// or `force` is negative. Non-finite values are always rejected.
pub fn validate_tuning(
    multiplier: f32,
    duration_seconds: f32,
    force: f32,
) -> Result<(), ConfigError> {
    require_positive("trigger.multiplier", multiplier)?;
    require_non_negative("trigger.duration_seconds", duration_seconds)?;
    require_non_negative("trigger.force_magnitude", force)
}

pub(crate) fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::MinViolation {
            field,
            min: f32::EPSILON,
            value,
        })
    }
}

pub(crate) fn require_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::MinViolation {
            field,
            min: 0.0,
            value,
        })
    }
}

pub(crate) fn validate_color(color: Rgba) -> Result<(), ConfigError> {
    for (field, value) in [
        ("trigger.color.r", color.r),
        ("trigger.color.g", color.g),
        ("trigger.color.b", color.b),
        ("trigger.color.a", color.a),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::RangeViolation {
                field,
                min: 0.0,
                max: 1.0,
                value,
            });
        }
    }
    Ok(())
}

/// Registry-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "RegistryConfig::default_max_triggers")]
    pub max_triggers: usize,
    #[serde(default = "RegistryConfig::default_enabled")]
    pub enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_triggers: Self::default_max_triggers(),
            enabled: Self::default_enabled(),
        }
    }
}

impl RegistryConfig {
    const fn default_max_triggers() -> usize {
        MAX_TRIGGERS
    }

    const fn default_enabled() -> bool {
        true
    }
}

/// Collapse/grow lerp speeds in progress per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "AnimationConfig::default_rate")]
    pub collapse_rate: f32,
    #[serde(default = "AnimationConfig::default_rate")]
    pub grow_rate: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            collapse_rate: Self::default_rate(),
            grow_rate: Self::default_rate(),
        }
    }
}

impl AnimationConfig {
    const fn default_rate() -> f32 {
        ANIMATION_RATE
    }

    #[must_use]
    pub fn collapse_seconds(&self) -> f64 {
        lerp_duration(self.collapse_rate)
    }

    #[must_use]
    pub fn grow_seconds(&self) -> f64 {
        lerp_duration(self.grow_rate)
    }

    /// # Errors
    ///
    /// Returns an error when either rate is not strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("animation.collapse_rate", self.collapse_rate),
            ("animation.grow_rate", self.grow_rate),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::MinViolation {
                    field,
                    min: f32::EPSILON,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Spawn-time ceilings for vehicles created without explicit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleDefaults {
    #[serde(default = "VehicleDefaults::default_throttle")]
    pub throttle_ceiling: f32,
    #[serde(default = "VehicleDefaults::default_steer")]
    pub steer_ceiling: f32,
}

impl Default for VehicleDefaults {
    fn default() -> Self {
        Self {
            throttle_ceiling: Self::default_throttle(),
            steer_ceiling: Self::default_steer(),
        }
    }
}

impl VehicleDefaults {
    const fn default_throttle() -> f32 {
        DEFAULT_THROTTLE_CEILING
    }

    const fn default_steer() -> f32 {
        DEFAULT_STEER_CEILING
    }

    #[must_use]
    pub const fn parameters(&self) -> VehicleParameters {
        VehicleParameters::new(self.throttle_ceiling, self.steer_ceiling)
    }
}

/// Everything the engine accepts at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub stack: StackPolicy,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub vehicle: VehicleDefaults,
}

impl EngineConfig {
    /// Parse and validate a JSON document; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invariant violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stack.validate()?;
        self.animation.validate()?;
        for (field, value) in [
            ("vehicle.throttle_ceiling", self.vehicle.throttle_ceiling),
            ("vehicle.steer_ceiling", self.vehicle.steer_ceiling),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::MinViolation {
                    field,
                    min: 0.0,
                    value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_stock_tuning() {
        let booster = TriggerConfig::booster();
        assert!((booster.multiplier - 2.0).abs() <= f32::EPSILON);
        assert!((booster.steer_multiplier - 0.8).abs() <= f32::EPSILON);
        assert!((booster.force_magnitude - 5000.0).abs() <= f32::EPSILON);
        assert!(!booster.can_stack);

        let hazard = TriggerConfig::hazard();
        assert_eq!(hazard.kind, TriggerKind::Hazard);
        assert!((hazard.multiplier - 0.4).abs() <= f32::EPSILON);
        assert!((hazard.steer_multiplier - 1.0).abs() <= f32::EPSILON);
        assert!(hazard.force_magnitude.abs() <= f32::EPSILON);
        assert!(hazard.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = TriggerConfig::booster();
        cfg.multiplier = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MinViolation {
                field: "trigger.multiplier",
                ..
            })
        ));
        let mut cfg = TriggerConfig::booster();
        cfg.cooldown_seconds = -1.0;
        assert!(cfg.validate().is_err());
        let mut cfg = TriggerConfig::booster();
        cfg.duration_seconds = f32::NAN;
        assert!(cfg.validate().is_err());
        let mut cfg = TriggerConfig::hazard();
        cfg.color.g = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "trigger.color.g",
                ..
            })
        ));
    }

    #[test]
    fn tuning_checks_reject_non_finite_values() {
        assert!(validate_tuning(1.5, 4.0, 1200.0).is_ok());
        assert!(validate_tuning(1.5, 0.0, 0.0).is_ok());
        assert!(matches!(
            validate_tuning(f32::NAN, 4.0, 0.0),
            Err(ConfigError::MinViolation {
                field: "trigger.multiplier",
                ..
            })
        ));
        assert!(validate_tuning(2.0, -5.0, 0.0).is_err());
        assert!(validate_tuning(2.0, 3.0, f32::INFINITY).is_err());
    }

    #[test]
    fn engine_config_fills_defaults_from_partial_json() {
        let cfg = EngineConfig::from_json(r#"{"registry":{"max_triggers":4},"stack":{}}"#)
            .expect("valid config");
        assert_eq!(cfg.registry.max_triggers, 4);
        assert!(cfg.registry.enabled);
        assert_eq!(cfg.stack, StackPolicy::default());
        assert!((cfg.animation.collapse_seconds() - 1.0 / 3.0).abs() < 1e-6);
        assert!((cfg.vehicle.throttle_ceiling - 2000.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn engine_config_reports_parse_and_range_errors() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(EngineConfig::from_json(r#"{"animation":{"collapse_rate":0.0}}"#).is_err());
    }

    #[test]
    fn trigger_config_deserializes_with_defaults() {
        let cfg: TriggerConfig =
            serde_json::from_str(r#"{"kind":"hazard","multiplier":0.5}"#).unwrap();
        assert_eq!(cfg.kind, TriggerKind::Hazard);
        assert!((cfg.multiplier - 0.5).abs() <= f32::EPSILON);
        assert!((cfg.respawn_seconds - 5.0).abs() <= f32::EPSILON);
        assert!(cfg.vehicle_aura.is_none());
    }
}
