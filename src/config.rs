//! # Unified Application Configuration
//!
//! This module gathers the preprocessing and observability settings into a
//! single configuration object loaded from environment variables.

use crate::errors::AppResult;
use crate::observability_config::ObservabilityConfig;
use crate::preprocessing_config::PreprocessingConfig;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Preprocessing pipeline settings
    pub preprocessing: PreprocessingConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Binaries are expected to call `dotenvy::dotenv()` first so that `.env`
    /// files are honoured.
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            preprocessing: PreprocessingConfig::from_env()?,
            observability: ObservabilityConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> AppResult<()> {
        self.preprocessing.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        let p = &self.preprocessing;
        format!(
            "Configuration: environment={}, log_level={}, dimensions={}..={}, clahe_clip={}, clahe_grid={}, sauvola_window={}, sauvola_k={}, max_buffer_mb={}",
            self.observability.environment,
            self.observability.log_level,
            p.scaling.min_dimension,
            p.scaling.max_dimension,
            p.contrast.clahe_clip_limit,
            p.contrast.clahe_grid_size,
            p.sauvola.window_size,
            p.sauvola.k,
            p.memory.max_buffer_mb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_covers_both_sections() {
        let mut config = AppConfig::default();
        config.preprocessing.sauvola.window_size = 14;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.observability.log_level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_config_summary() {
        let summary = AppConfig::default().summary();
        assert!(summary.contains("environment=development"));
        assert!(summary.contains("dimensions=800..=2048"));
        assert!(summary.contains("sauvola_window=15"));
        assert!(summary.contains("max_buffer_mb=512"));
    }
}
