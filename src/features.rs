//! The closed catalog of optional capabilities a compiled machine may use directly.
//!
//! Every feature starts disabled and can be enabled exactly once. Anything a machine
//! definition asks for that is not enabled gets synthesized from the primitive model by
//! the lowering engine.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::cell::Movement;
use crate::types::BuildError;

/// Prefix shared by the canonical feature names.
const FEATURE_PREFIX: &str = "feature-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Feature {
    /// One outcome shared by several explicitly listed symbols.
    #[serde(rename = "feature-multimatch")]
    MultiMatch,
    /// Multi-match transitions that leave the matched symbol unchanged.
    #[serde(rename = "feature-multimatch-no-change")]
    MultiMatchNoChange,
    /// A fallback outcome for every symbol not otherwise matched.
    #[serde(rename = "feature-wildcard")]
    Wildcard,
    /// Transitions that do not move the head.
    #[serde(rename = "feature-move-none")]
    MoveNone,
    /// Transitions that move the head more than one cell.
    #[serde(rename = "feature-move-multi")]
    MoveMulti,
    #[serde(rename = "feature-gadget-shift")]
    GadgetShift,
    #[serde(rename = "feature-gadget-first-cell-marker")]
    GadgetFirstCellMarker,
    #[serde(rename = "feature-gadget-insert-after-marker")]
    GadgetInsertAfterMarker,
    /// Real independent tapes; only effective together with `MoveNone`.
    #[serde(rename = "feature-multi-tape")]
    MultiTape,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::MultiMatch,
        Feature::MultiMatchNoChange,
        Feature::Wildcard,
        Feature::MoveNone,
        Feature::MoveMulti,
        Feature::GadgetShift,
        Feature::GadgetFirstCellMarker,
        Feature::GadgetInsertAfterMarker,
        Feature::MultiTape,
    ];

    /// The canonical name, e.g. `feature-multimatch`.
    pub fn name(self) -> &'static str {
        match self {
            Feature::MultiMatch => "feature-multimatch",
            Feature::MultiMatchNoChange => "feature-multimatch-no-change",
            Feature::Wildcard => "feature-wildcard",
            Feature::MoveNone => "feature-move-none",
            Feature::MoveMulti => "feature-move-multi",
            Feature::GadgetShift => "feature-gadget-shift",
            Feature::GadgetFirstCellMarker => "feature-gadget-first-cell-marker",
            Feature::GadgetInsertAfterMarker => "feature-gadget-insert-after-marker",
            Feature::MultiTape => "feature-multi-tape",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = BuildError;

    /// Accepts both the canonical name and the name without the `feature-` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.strip_prefix(FEATURE_PREFIX).unwrap_or(s);
        Feature::ALL
            .into_iter()
            .find(|feature| &feature.name()[FEATURE_PREFIX.len()..] == short)
            .ok_or_else(|| BuildError::UnknownFeature(s.to_string()))
    }
}

/// The set of enabled features of one machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureSet {
    enabled: BTreeSet<Feature>,
}

impl FeatureSet {
    /// Creates a feature set with every feature disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a feature set with every feature enabled.
    pub fn all() -> Self {
        Self {
            enabled: Feature::ALL.into_iter().collect(),
        }
    }

    /// Creates a feature set with the given features enabled.
    ///
    /// # Returns
    ///
    /// * `Err(BuildError::FeatureAlreadyEnabled)` if a feature is listed twice.
    pub fn with(features: &[Feature]) -> Result<Self, BuildError> {
        let mut set = Self::new();
        for &feature in features {
            set.enable(feature)?;
        }
        Ok(set)
    }

    pub fn enable(&mut self, feature: Feature) -> Result<&mut Self, BuildError> {
        if !self.enabled.insert(feature) {
            return Err(BuildError::FeatureAlreadyEnabled(feature.name().to_string()));
        }
        Ok(self)
    }

    /// Enables a feature by its canonical or short name.
    pub fn enable_by_name(&mut self, name: &str) -> Result<&mut Self, BuildError> {
        let feature = name.parse::<Feature>()?;
        self.enable(feature)
    }

    /// Checks if a feature can be used directly.
    ///
    /// Real multiple tapes are only usable when zero-distance moves are enabled too.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        if feature == Feature::MultiTape && !self.enabled.contains(&Feature::MoveNone) {
            return false;
        }
        self.enabled.contains(&feature)
    }

    pub fn is_enabled_by_name(&self, name: &str) -> Result<bool, BuildError> {
        Ok(self.is_enabled(name.parse()?))
    }

    /// Whether a movement can be registered without synthesizing extra states.
    pub fn supports_movement(&self, movement: Movement) -> bool {
        match movement.offset().unsigned_abs() {
            1 => true,
            0 => self.is_enabled(Feature::MoveNone),
            _ => self.is_enabled(Feature::MoveMulti),
        }
    }

    /// Iterates over the features that were enabled, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.enabled.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled.is_empty() {
            return f.write_str("(none)");
        }
        let names = self.iter().map(Feature::name).collect::<Vec<_>>();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_names() {
        assert_eq!(
            "feature-multimatch".parse::<Feature>().unwrap(),
            Feature::MultiMatch
        );
        assert_eq!(
            "multimatch-no-change".parse::<Feature>().unwrap(),
            Feature::MultiMatchNoChange
        );
        assert_eq!(
            "feature-gadget-insert-after-marker".parse::<Feature>().unwrap(),
            Feature::GadgetInsertAfterMarker
        );
        assert_eq!(
            "feature-teleport".parse::<Feature>(),
            Err(BuildError::UnknownFeature("feature-teleport".to_string()))
        );
    }

    #[test]
    fn test_enable_twice_fails() {
        let mut features = FeatureSet::new();
        features.enable(Feature::Wildcard).unwrap();

        assert_eq!(
            features.enable(Feature::Wildcard).unwrap_err(),
            BuildError::FeatureAlreadyEnabled("feature-wildcard".to_string())
        );
        assert!(features.enable_by_name("feature-unknown").is_err());
    }

    #[test]
    fn test_multi_tape_requires_move_none() {
        let mut features = FeatureSet::new();
        features.enable(Feature::MultiTape).unwrap();
        assert!(!features.is_enabled(Feature::MultiTape));

        features.enable(Feature::MoveNone).unwrap();
        assert!(features.is_enabled(Feature::MultiTape));
        assert!(features.is_enabled_by_name("multi-tape").unwrap());
        assert!(features.is_enabled_by_name("nonsense").is_err());
    }

    #[test]
    fn test_supports_movement() {
        let mut features = FeatureSet::new();
        assert!(features.supports_movement(Movement::R));
        assert!(features.supports_movement(Movement::L));
        assert!(!features.supports_movement(Movement::N));
        assert!(!features.supports_movement(Movement::right(2)));

        features.enable(Feature::MoveNone).unwrap();
        features.enable(Feature::MoveMulti).unwrap();
        assert!(features.supports_movement(Movement::N));
        assert!(features.supports_movement(Movement::left(3)));
    }

    #[test]
    fn test_feature_serialization() {
        let json = serde_json::to_string(&Feature::GadgetShift).unwrap();
        assert_eq!(json, "\"feature-gadget-shift\"");

        let set = FeatureSet::with(&[Feature::Wildcard, Feature::MultiMatch]).unwrap();
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"enabled":["feature-multimatch","feature-wildcard"]}"#
        );
        assert_eq!(set.to_string(), "feature-multimatch, feature-wildcard");
    }
}
