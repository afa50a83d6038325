//! # Preprocessing Configuration Module
//!
//! This module defines the tunable constants of the preprocessing pipeline:
//! working resolution bounds, quality tier thresholds, contrast strategies,
//! local thresholding parameters and the working buffer memory limit.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

// Constants for preprocessing configuration
pub const MIN_DIMENSION: u32 = 800;
pub const MAX_DIMENSION: u32 = 2048;
pub const QUALITY_SAMPLE_SIZE: u32 = 100;
pub const MIN_QUALITY_SAMPLE_SIZE: u32 = 10;
pub const EDGE_THRESHOLD: u8 = 30;
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
pub const CLAHE_GRID_SIZE: u32 = 8;
pub const SAUVOLA_WINDOW_SIZE: u32 = 15;
pub const SAUVOLA_K: f64 = 0.2;
pub const SAUVOLA_DYNAMIC_RANGE: f64 = 128.0;
pub const MAX_BUFFER_MB: u64 = 512;

/// Working resolution bounds for the normaliser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Smaller side is enlarged up to this value
    pub min_dimension: u32,
    /// Larger side is shrunk down to this value
    pub max_dimension: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_dimension: MIN_DIMENSION,
            max_dimension: MAX_DIMENSION,
        }
    }
}

impl ScalingConfig {
    /// Validate scaling bounds
    pub fn validate(&self) -> AppResult<()> {
        if self.min_dimension == 0 {
            return Err(AppError::Config(
                "min_dimension must be greater than 0".to_string(),
            ));
        }
        if self.max_dimension < self.min_dimension {
            return Err(AppError::Config(format!(
                "max_dimension ({}) must be >= min_dimension ({})",
                self.max_dimension, self.min_dimension
            )));
        }
        Ok(())
    }
}

/// Sampling parameters and tier thresholds for the quality estimator.
///
/// Tiers are checked in order High, Medium, Low; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Maximum side of the centred sample square
    pub sample_size: u32,
    /// Below this side the image is classified Medium without sampling
    pub min_sample_size: u32,
    /// Horizontal delta above which a pixel pair counts as an edge
    pub edge_threshold: u8,
    pub high_min_contrast: f64,
    pub high_max_noise: f64,
    pub high_min_brightness: f64,
    pub high_max_brightness: f64,
    pub medium_min_contrast: f64,
    pub medium_max_noise: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sample_size: QUALITY_SAMPLE_SIZE,
            min_sample_size: MIN_QUALITY_SAMPLE_SIZE,
            edge_threshold: EDGE_THRESHOLD,
            high_min_contrast: 0.7,
            high_max_noise: 0.1,
            high_min_brightness: 50.0,
            high_max_brightness: 220.0,
            medium_min_contrast: 0.4,
            medium_max_noise: 0.25,
        }
    }
}

impl QualityConfig {
    /// Validate quality thresholds
    pub fn validate(&self) -> AppResult<()> {
        if self.min_sample_size == 0 {
            return Err(AppError::Config(
                "min_sample_size must be greater than 0".to_string(),
            ));
        }
        if self.sample_size < self.min_sample_size {
            return Err(AppError::Config(format!(
                "sample_size ({}) must be >= min_sample_size ({})",
                self.sample_size, self.min_sample_size
            )));
        }
        for (name, value) in [
            ("high_min_contrast", self.high_min_contrast),
            ("high_max_noise", self.high_max_noise),
            ("medium_min_contrast", self.medium_min_contrast),
            ("medium_max_noise", self.medium_max_noise),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if self.high_min_contrast < self.medium_min_contrast {
            return Err(AppError::Config(format!(
                "high_min_contrast ({}) must be >= medium_min_contrast ({})",
                self.high_min_contrast, self.medium_min_contrast
            )));
        }
        if self.high_max_noise > self.medium_max_noise {
            return Err(AppError::Config(format!(
                "high_max_noise ({}) must be <= medium_max_noise ({})",
                self.high_max_noise, self.medium_max_noise
            )));
        }
        if !(0.0..=255.0).contains(&self.high_min_brightness)
            || !(0.0..=255.0).contains(&self.high_max_brightness)
            || self.high_min_brightness > self.high_max_brightness
        {
            return Err(AppError::Config(format!(
                "high brightness band [{}, {}] must be an ordered range within 0-255",
                self.high_min_brightness, self.high_max_brightness
            )));
        }
        Ok(())
    }
}

/// Contrast enhancement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastConfig {
    /// Linear stretch factor for the High tier
    pub high_factor: f32,
    /// Linear stretch factor for the Medium tier
    pub medium_factor: f32,
    /// CLAHE clip limit, as a multiple of the mean bin height
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis
    pub clahe_grid_size: u32,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            high_factor: 1.1,
            medium_factor: 1.3,
            clahe_clip_limit: CLAHE_CLIP_LIMIT,
            clahe_grid_size: CLAHE_GRID_SIZE,
        }
    }
}

impl ContrastConfig {
    /// Validate contrast parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.high_factor <= 0.0 || self.medium_factor <= 0.0 {
            return Err(AppError::Config(
                "contrast factors must be greater than 0.0".to_string(),
            ));
        }
        if self.clahe_clip_limit <= 0.0 {
            return Err(AppError::Config(format!(
                "Invalid clip limit: {}. Must be > 0.0",
                self.clahe_clip_limit
            )));
        }
        if self.clahe_grid_size == 0 {
            return Err(AppError::Config(
                "clahe_grid_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Local adaptive thresholding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SauvolaConfig {
    /// Window side in pixels (odd)
    pub window_size: u32,
    /// Sensitivity to local standard deviation
    pub k: f64,
    /// Dynamic range of the standard deviation
    pub dynamic_range: f64,
}

impl Default for SauvolaConfig {
    fn default() -> Self {
        Self {
            window_size: SAUVOLA_WINDOW_SIZE,
            k: SAUVOLA_K,
            dynamic_range: SAUVOLA_DYNAMIC_RANGE,
        }
    }
}

impl SauvolaConfig {
    /// Validate thresholding parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.window_size < 3 || self.window_size % 2 == 0 {
            return Err(AppError::Config(format!(
                "window_size must be an odd number >= 3, got {}",
                self.window_size
            )));
        }
        if self.dynamic_range <= 0.0 {
            return Err(AppError::Config(
                "dynamic_range must be greater than 0.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.k) {
            return Err(AppError::Config(format!(
                "k must be between 0.0 and 1.0, got {}",
                self.k
            )));
        }
        Ok(())
    }

    /// Half of the window, in pixels
    pub fn half_window(&self) -> u32 {
        self.window_size / 2
    }
}

/// Memory limit for the large intermediate buffers of the pipeline.
///
/// The resized working image, the resampler's floating-point pass and each
/// Sauvola integral table are checked against this limit before they are
/// allocated. Oversized buffers are reported as `AllocationFailure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Largest single buffer, in megabytes
    pub max_buffer_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_buffer_mb: MAX_BUFFER_MB,
        }
    }
}

impl MemoryConfig {
    /// Validate the memory limit
    pub fn validate(&self) -> AppResult<()> {
        if self.max_buffer_mb == 0 {
            return Err(AppError::Config(
                "max_buffer_mb must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Limit in bytes
    pub fn max_buffer_bytes(&self) -> u64 {
        self.max_buffer_mb.saturating_mul(1024 * 1024)
    }
}

/// Configuration structure for the preprocessing pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub scaling: ScalingConfig,
    pub quality: QualityConfig,
    pub contrast: ContrastConfig,
    pub sauvola: SauvolaConfig,
    pub memory: MemoryConfig,
}

impl PreprocessingConfig {
    /// Load configuration from `PREPROCESS_*` environment variables.
    ///
    /// Unset variables keep their defaults; the result is validated.
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        config.scaling.min_dimension =
            env_or("PREPROCESS_MIN_DIMENSION", config.scaling.min_dimension)?;
        config.scaling.max_dimension =
            env_or("PREPROCESS_MAX_DIMENSION", config.scaling.max_dimension)?;

        config.quality.sample_size =
            env_or("PREPROCESS_QUALITY_SAMPLE_SIZE", config.quality.sample_size)?;
        config.quality.edge_threshold =
            env_or("PREPROCESS_EDGE_THRESHOLD", config.quality.edge_threshold)?;

        config.contrast.high_factor =
            env_or("PREPROCESS_HIGH_CONTRAST_FACTOR", config.contrast.high_factor)?;
        config.contrast.medium_factor =
            env_or("PREPROCESS_MEDIUM_CONTRAST_FACTOR", config.contrast.medium_factor)?;
        config.contrast.clahe_clip_limit =
            env_or("PREPROCESS_CLAHE_CLIP_LIMIT", config.contrast.clahe_clip_limit)?;
        config.contrast.clahe_grid_size =
            env_or("PREPROCESS_CLAHE_GRID_SIZE", config.contrast.clahe_grid_size)?;

        config.sauvola.window_size =
            env_or("PREPROCESS_SAUVOLA_WINDOW", config.sauvola.window_size)?;
        config.sauvola.k = env_or("PREPROCESS_SAUVOLA_K", config.sauvola.k)?;
        config.sauvola.dynamic_range =
            env_or("PREPROCESS_SAUVOLA_DYNAMIC_RANGE", config.sauvola.dynamic_range)?;

        config.memory.max_buffer_mb =
            env_or("PREPROCESS_MAX_BUFFER_MB", config.memory.max_buffer_mb)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate preprocessing configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        self.scaling.validate()?;
        self.quality.validate()?;
        self.contrast.validate()?;
        self.sauvola.validate()?;
        self.memory.validate()?;
        Ok(())
    }
}

/// Reads and parses an environment variable, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number, got '{}'", key, value))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_and_parses() {
        assert_eq!(env_or("PREPROCESS_TEST_UNSET_VALUE", 15u32).unwrap(), 15);

        env::set_var("PREPROCESS_TEST_PARSED_VALUE", " 21 ");
        assert_eq!(env_or("PREPROCESS_TEST_PARSED_VALUE", 15u32).unwrap(), 21);

        env::set_var("PREPROCESS_TEST_BAD_VALUE", "fifteen");
        let err = env_or("PREPROCESS_TEST_BAD_VALUE", 15u32).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("PREPROCESS_TEST_BAD_VALUE"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PreprocessingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scaling.min_dimension, 800);
        assert_eq!(config.scaling.max_dimension, 2048);
        assert_eq!(config.sauvola.half_window(), 7);
    }

    #[test]
    #[allow(unused_assignments)]
    fn test_scaling_config_validation() {
        let mut config = ScalingConfig::default();

        config.min_dimension = 0;
        assert!(config.validate().is_err());
        config.min_dimension = 800;

        // Test max < min
        config.max_dimension = 500;
        assert!(config.validate().is_err());
        config.max_dimension = 2048;

        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(unused_assignments)]
    fn test_quality_config_validation() {
        let mut config = QualityConfig::default();

        config.sample_size = 5;
        assert!(config.validate().is_err());
        config.sample_size = 100;

        // Test out-of-range ratio
        config.high_min_contrast = 1.5;
        assert!(config.validate().is_err());
        config.high_min_contrast = 0.7;

        // Test High stricter than Medium
        config.medium_min_contrast = 0.8;
        assert!(config.validate().is_err());
        config.medium_min_contrast = 0.4;

        config.high_max_noise = 0.3;
        assert!(config.validate().is_err());
        config.high_max_noise = 0.1;

        // Test inverted brightness band
        config.high_min_brightness = 230.0;
        assert!(config.validate().is_err());
        config.high_min_brightness = 50.0;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_contrast_config_validation() {
        let config = ContrastConfig {
            clahe_clip_limit: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ContrastConfig {
            clahe_grid_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sauvola_config_validation() {
        for window_size in [0, 1, 2, 16] {
            let config = SauvolaConfig {
                window_size,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "window {} accepted", window_size);
        }

        let config = SauvolaConfig {
            dynamic_range: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_config_validation() {
        let config = MemoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_buffer_bytes(), 512 * 1024 * 1024);

        let config = MemoryConfig { max_buffer_mb: 0 };
        assert!(config.validate().is_err());

        let config = PreprocessingConfig {
            memory: MemoryConfig { max_buffer_mb: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip_keeps_overrides() {
        let config = PreprocessingConfig {
            sauvola: SauvolaConfig {
                window_size: 21,
                ..Default::default()
            },
            ..Default::default()
        };

        let json = serde_json::to_string(&config).expect("config should serialize");
        let parsed: PreprocessingConfig =
            serde_json::from_str(&json).expect("config should deserialize");
        assert_eq!(parsed.sauvola.window_size, 21);
        assert_eq!(parsed, config);
    }
}
