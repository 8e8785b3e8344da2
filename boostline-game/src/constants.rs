//! Centralized default tuning for Boostline effects.
//!
//! These values give the stock kart handling. Runtime
//! overrides go through the serde-backed config records; the defaults only
//! change through reviewed code.

// Vehicle spawn -------------------------------------------------------------
pub const DEFAULT_THROTTLE_CEILING: f32 = 2000.0;
pub const DEFAULT_STEER_CEILING: f32 = 17.0;

// Booster -------------------------------------------------------------------
pub const BOOSTER_MULTIPLIER: f32 = 2.0;
/// Boosting makes the kart slightly less twitchy.
pub const BOOSTER_STEER_MULTIPLIER: f32 = 0.8;
pub const BOOSTER_DURATION_SECONDS: f32 = 3.0;
pub const BOOSTER_FORCE: f32 = 5000.0;

// Hazard --------------------------------------------------------------------
pub const HAZARD_MULTIPLIER: f32 = 0.4;
pub const HAZARD_STEER_MULTIPLIER: f32 = 1.0;
pub const HAZARD_DURATION_SECONDS: f32 = 3.0;

// Shared trigger lifecycle ---------------------------------------------------
pub const TRIGGER_COOLDOWN_SECONDS: f32 = 1.0;
pub const TRIGGER_RESPAWN_SECONDS: f32 = 5.0;
/// Scale progress per second for the collapse and grow lerps (~0.33 s).
pub const ANIMATION_RATE: f32 = 3.0;

// Registry ------------------------------------------------------------------
pub const MAX_TRIGGERS: usize = 10;
pub const LEVEL_SIZE: f32 = 100.0;
/// Height at which randomized triggers float above the track.
pub const SCATTER_HEIGHT: f32 = 0.5;

// Stacking ------------------------------------------------------------------
pub const STACK_MAX_DEPTH: usize = 3;
pub const STACK_MIN_THROTTLE_FACTOR: f32 = 0.1;
pub const STACK_MAX_THROTTLE_FACTOR: f32 = 8.0;
pub const STACK_MIN_STEER_FACTOR: f32 = 0.1;
pub const STACK_MAX_STEER_FACTOR: f32 = 4.0;

// Presentation handles -------------------------------------------------------
pub const FX_BOOST_BURST: &str = "fx.boost.burst";
pub const FX_BOOST_TRAIL: &str = "fx.boost.trail";
pub const FX_HAZARD_SPARKS: &str = "fx.hazard.sparks";
pub const FX_HAZARD_TINT: &str = "fx.hazard.tint";
pub const SFX_BOOST: &str = "sfx.items.big_mushroom";
pub const SFX_HAZARD: &str = "sfx.hazard.zap";
