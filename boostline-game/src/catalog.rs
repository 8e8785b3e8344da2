//! Named booster presets.
//!
//! Lookups never fail: an unknown name logs a diagnostic and yields the
//! default preset so a typo in level data cannot stall a race.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::EffectHandle;
use crate::config::{require_non_negative, validate_color, validate_tuning};
use crate::error::{ConfigError, Diagnostic};
use crate::math::Rgba;
use crate::trigger::TriggerInstance;

const DEFAULT_BOOSTER_TYPES: &str = include_str!("../data/booster_types.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterType {
    pub name: String,
    pub multiplier: f32,
    pub duration: f32,
    pub force: f32,
    pub cooldown: f32,
    #[serde(default)]
    pub color: Rgba,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sound: Option<EffectHandle>,
    #[serde(default)]
    pub particles: Option<EffectHandle>,
}

impl BoosterType {
    /// # Errors
    ///
    /// Returns the first tuning or color value a trigger could not honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tuning(self.multiplier, self.duration, self.force)?;
        require_non_negative("trigger.cooldown_seconds", self.cooldown)?;
        validate_color(self.color)
    }

    fn speed_boost() -> Self {
        Self {
            name: "Speed Boost".to_string(),
            multiplier: 2.0,
            duration: 3.0,
            force: 5000.0,
            cooldown: 1.0,
            color: Rgba::CYAN,
            description: "Raises the kart's top speed for 3 seconds".to_string(),
            sound: None,
            particles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    types: Vec<BoosterType>,
}

/// Ordered preset list; the first entry is the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCatalog {
    default: BoosterType,
    types: Vec<BoosterType>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::default_catalog().clone()
    }
}

impl TypeCatalog {
    /// Build from a preset list. An empty list falls back to the built-in
    /// Speed Boost so lookups always have something to return.
    #[must_use]
    pub fn new(types: Vec<BoosterType>) -> Self {
        let types = if types.is_empty() {
            vec![BoosterType::speed_boost()]
        } else {
            types
        };
        let default = types
            .first()
            .cloned()
            .unwrap_or_else(BoosterType::speed_boost);
        Self { default, types }
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog or a
    /// preset fails [`BoosterType::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let doc: CatalogDoc =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for preset in &doc.types {
            preset.validate()?;
        }
        Ok(Self::new(doc.types))
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_BOOSTER_TYPES).unwrap_or_else(|_| Self::new(Vec::new()))
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<TypeCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub const fn default_type(&self) -> &BoosterType {
        &self.default
    }

    /// Preset called `name`, or the default preset with a logged diagnostic.
    #[must_use]
    pub fn by_name(&self, name: &str) -> &BoosterType {
        if let Some(found) = self.types.iter().find(|t| t.name == name) {
            return found;
        }
        let diagnostic = Diagnostic::UnknownPresetName {
            name: name.to_string(),
            fallback: self.default.name.clone(),
        };
        log::warn!("{diagnostic}");
        &self.default
    }

    /// Uniformly random preset.
    #[must_use]
    pub fn random<R>(&self, rng: &mut R) -> &BoosterType
    where
        R: Rng + ?Sized,
    {
        if self.types.is_empty() {
            return &self.default;
        }
        let index = rng.gen_range(0..self.types.len());
        self.types.get(index).unwrap_or(&self.default)
    }

    /// Stamp a preset's tuning and presentation onto `trigger`.
    pub fn apply(&self, trigger: &mut TriggerInstance, preset: &BoosterType) {
        trigger.adopt_type(preset);
        log::debug!("{} now uses preset '{}'", trigger.id(), preset.name);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Description of `name`, falling back like [`TypeCatalog::by_name`].
    #[must_use]
    pub fn description(&self, name: &str) -> &str {
        &self.by_name(name).description
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoosterType> {
        self.types.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<'a> IntoIterator for &'a TypeCatalog {
    type Item = &'a BoosterType;
    type IntoIter = std::slice::Iter<'a, BoosterType>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
