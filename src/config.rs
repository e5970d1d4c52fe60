//! Configuration types for chroma-key runs
//!
//! Every empirically tuned constant of the pipeline lives here as a default
//! so it can be overridden per run or loaded from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chroma_key::key_color::KeyColor;
use crate::error::ChromaKeyError;

/// Which primary keying pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyingStrategy {
    /// Soft difference matte, morphological refinement, unmix and despill
    #[default]
    Soft,
    /// Single hard colorkey pass with despill
    Colorkey,
}

impl std::fmt::Display for KeyingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Colorkey => write!(f, "colorkey"),
        }
    }
}

/// Corner patch used to estimate the key color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Patch side as a fraction of the image side
    pub patch_fraction: f32,
    /// Lower bound on the patch side in pixels
    pub min_patch_size: u32,
    /// Number of k-means clusters
    pub clusters: usize,
    /// k-means iteration cap
    pub max_iterations: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            patch_fraction: 0.10,
            min_patch_size: 4,
            clusters: 3,
            max_iterations: 16,
        }
    }
}

/// Parameters of the soft difference matte
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftMatteConfig {
    /// Gaussian sigma applied after auto-levelling (0 disables)
    pub blur_sigma: f32,
    /// Fraction of the range clipped to background
    pub level_low: f32,
    /// Fraction of the range above which pixels become foreground
    pub level_high: f32,
}

impl Default for SoftMatteConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            level_low: 0.05,
            level_high: 0.95,
        }
    }
}

/// Thresholds of the hard colorkey matte, as normalized color distances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorkeyConfig {
    /// Distance at or below which a pixel is background
    pub similarity: f32,
    /// Width of the transition band beyond `similarity` (0 = binary)
    pub blend: f32,
}

impl Default for ColorkeyConfig {
    fn default() -> Self {
        Self {
            similarity: 0.30,
            blend: 0.10,
        }
    }
}

/// Morphological cleanup of the matte
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Radius of the diamond structuring element
    pub radius: u8,
    /// Gaussian sigma of the final feather (0 disables)
    pub feather_sigma: f32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            radius: 1,
            feather_sigma: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmixConfig {
    /// Clamp the key's dominant channel on partially covered pixels
    pub despill: bool,
}

impl Default for UnmixConfig {
    fn default() -> Self {
        Self { despill: true }
    }
}

/// Configuration of a chroma-key run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeyConfig {
    pub strategy: KeyingStrategy,
    /// Caller-supplied key; also the sampler's last-resort answer
    pub key_color: Option<KeyColor>,
    /// Estimate the key from the image corner
    pub detect_key: bool,
    /// Match tolerance in percent of the largest RGB distance
    pub tolerance: f32,
    pub sampler: SamplerConfig,
    pub soft_matte: SoftMatteConfig,
    pub colorkey: ColorkeyConfig,
    pub refine: RefineConfig,
    pub unmix: UnmixConfig,
}

impl Default for ChromaKeyConfig {
    fn default() -> Self {
        Self {
            strategy: KeyingStrategy::default(),
            key_color: None,
            detect_key: true,
            tolerance: 10.0,
            sampler: SamplerConfig::default(),
            soft_matte: SoftMatteConfig::default(),
            colorkey: ColorkeyConfig::default(),
            refine: RefineConfig::default(),
            unmix: UnmixConfig::default(),
        }
    }
}

impl ChromaKeyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ChromaKeyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ChromaKeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            ChromaKeyError::InvalidParameter(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_strategy(mut self, strategy: KeyingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_key_color(mut self, key_color: KeyColor) -> Self {
        self.key_color = Some(key_color);
        self
    }

    pub fn with_detect_key(mut self, detect_key: bool) -> Self {
        self.detect_key = detect_key;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_soft_matte(mut self, soft_matte: SoftMatteConfig) -> Self {
        self.soft_matte = soft_matte;
        self
    }

    pub fn with_colorkey(mut self, colorkey: ColorkeyConfig) -> Self {
        self.colorkey = colorkey;
        self
    }

    pub fn with_refine(mut self, refine: RefineConfig) -> Self {
        self.refine = refine;
        self
    }

    pub fn with_unmix(mut self, unmix: UnmixConfig) -> Self {
        self.unmix = unmix;
        self
    }

    /// Key used when detection is off or fails
    pub fn default_key(&self) -> KeyColor {
        self.key_color.unwrap_or_default()
    }

    /// Rejects parameter combinations no stage can honour
    pub fn validate(&self) -> Result<(), ChromaKeyError> {
        let invalid = |msg: String| Err(ChromaKeyError::InvalidParameter(msg));

        if !(0.0..=100.0).contains(&self.tolerance) {
            return invalid(format!("tolerance must be within 0..=100, got {}", self.tolerance));
        }
        if !(self.sampler.patch_fraction > 0.0 && self.sampler.patch_fraction <= 1.0) {
            return invalid(format!(
                "sampler.patch_fraction must be within (0, 1], got {}",
                self.sampler.patch_fraction
            ));
        }
        if self.sampler.clusters == 0 {
            return invalid("sampler.clusters must be at least 1".to_string());
        }
        let SoftMatteConfig {
            blur_sigma,
            level_low,
            level_high,
        } = self.soft_matte;
        if !(0.0..=1.0).contains(&level_low) || !(0.0..=1.0).contains(&level_high) {
            return invalid("soft_matte levels must be within 0..=1".to_string());
        }
        if level_low >= level_high {
            return invalid(format!(
                "soft_matte.level_low ({level_low}) must be below level_high ({level_high})"
            ));
        }
        if !blur_sigma.is_finite() || blur_sigma < 0.0 {
            return invalid(format!("soft_matte.blur_sigma must be >= 0, got {blur_sigma}"));
        }
        if !self.refine.feather_sigma.is_finite() || self.refine.feather_sigma < 0.0 {
            return invalid(format!(
                "refine.feather_sigma must be >= 0, got {}",
                self.refine.feather_sigma
            ));
        }
        if !(0.0..=1.0).contains(&self.colorkey.similarity)
            || !(0.0..=1.0).contains(&self.colorkey.blend)
        {
            return invalid("colorkey similarity and blend must be within 0..=1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ChromaKeyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, KeyingStrategy::Soft);
        assert_eq!(config.default_key(), KeyColor::GREEN);
        assert_eq!(config.refine.radius, 1);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ChromaKeyConfig::new()
            .with_strategy(KeyingStrategy::Colorkey)
            .with_key_color(KeyColor::BLUE)
            .with_detect_key(false)
            .with_tolerance(25.0);
        assert_eq!(config.strategy, KeyingStrategy::Colorkey);
        assert_eq!(config.default_key(), KeyColor::BLUE);
        assert!(!config.detect_key);
        assert_eq!(config.tolerance, 25.0);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(ChromaKeyConfig::new().with_tolerance(150.0).validate().is_err());
        assert!(ChromaKeyConfig::new().with_tolerance(-1.0).validate().is_err());

        let inverted_levels = ChromaKeyConfig::new().with_soft_matte(SoftMatteConfig {
            level_low: 0.9,
            level_high: 0.1,
            ..SoftMatteConfig::default()
        });
        assert!(inverted_levels.validate().is_err());

        let negative_feather = ChromaKeyConfig::new().with_refine(RefineConfig {
            feather_sigma: -1.0,
            ..RefineConfig::default()
        });
        assert!(negative_feather.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ChromaKeyConfig =
            serde_json::from_str(r##"{"strategy":"colorkey","key_color":"#0000FF","refine":{"radius":2}}"##)
                .unwrap();
        assert_eq!(config.strategy, KeyingStrategy::Colorkey);
        assert_eq!(config.key_color, Some(KeyColor::BLUE));
        assert_eq!(config.refine.radius, 2);
        assert_eq!(config.refine.feather_sigma, RefineConfig::default().feather_sigma);
        assert_eq!(config.tolerance, 10.0);
    }

    #[test]
    fn from_json_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"tolerance": 20.0}"#).unwrap();
        assert_eq!(ChromaKeyConfig::from_json_file(&good).unwrap().tolerance, 20.0);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"tolerance": 200.0}"#).unwrap();
        assert!(matches!(
            ChromaKeyConfig::from_json_file(&bad),
            Err(ChromaKeyError::InvalidParameter(_))
        ));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ChromaKeyConfig::from_json_file(&missing),
            Err(ChromaKeyError::Io { .. })
        ));
    }
}
