//! Dataset construction parameters

use serde::{Deserialize, Serialize};

use crate::error::RetentionError;

/// Stand-in value for "has never happened" in seconds-since features (150 days)
pub const NEVER: i64 = 5 * 30 * 24 * 60 * 60;

/// Entities whose event count lies this many standard deviations away from
/// the corpus mean are dropped
pub const OUTLIERS_COEFFICIENT: f64 = 2.5;

/// Default bucket length (one day)
pub const DEFAULT_SAMPLE_PERIOD_SECS: i64 = 24 * 60 * 60;

/// Default weight of the already-smoothed neighbour in the moving averages
pub const DEFAULT_ALPHA: f64 = 0.6;

/// Default spacing of plotting rows (twelve hours)
pub const DEFAULT_PLOT_INTERVAL_SECS: i64 = 12 * 60 * 60;

/// Default time appended after the last event when plotting (one day)
pub const DEFAULT_TAIL_PADDING_SECS: i64 = 24 * 60 * 60;

/// Parameters shared by every dataset view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Bucket length for recall-score aggregation
    pub sample_period_secs: i64,
    /// Smoothing weight in `[0, 1]`
    pub alpha: f64,
    /// Spacing between plotting rows
    pub plot_interval_secs: i64,
    /// Extra time plotted after the last event
    pub tail_padding_secs: i64,
    /// Outlier filter width in standard deviations
    pub outliers_coefficient: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sample_period_secs: DEFAULT_SAMPLE_PERIOD_SECS,
            alpha: DEFAULT_ALPHA,
            plot_interval_secs: DEFAULT_PLOT_INTERVAL_SECS,
            tail_padding_secs: DEFAULT_TAIL_PADDING_SECS,
            outliers_coefficient: OUTLIERS_COEFFICIENT,
        }
    }
}

impl RetentionConfig {
    /// Check every parameter is usable
    pub fn validate(&self) -> Result<(), RetentionError> {
        validate_training_params(self.sample_period_secs, self.alpha)?;
        validate_plotting_params(self.plot_interval_secs, self.tail_padding_secs)?;
        if !self.outliers_coefficient.is_finite() || self.outliers_coefficient <= 0.0 {
            return Err(RetentionError::InvalidParameter(format!(
                "outliers_coefficient must be positive, got {}",
                self.outliers_coefficient
            )));
        }
        Ok(())
    }

    /// Load configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self, RetentionError> {
        let config: RetentionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn validate_training_params(
    sample_period: i64,
    alpha: f64,
) -> Result<(), RetentionError> {
    if sample_period <= 0 {
        return Err(RetentionError::InvalidParameter(format!(
            "sample period must be positive, got {sample_period}"
        )));
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(RetentionError::InvalidParameter(format!(
            "alpha must lie in [0, 1], got {alpha}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_plotting_params(
    interval: i64,
    tail_padding: i64,
) -> Result<(), RetentionError> {
    if interval <= 0 {
        return Err(RetentionError::InvalidParameter(format!(
            "plot interval must be positive, got {interval}"
        )));
    }
    if tail_padding < 0 {
        return Err(RetentionError::InvalidParameter(format!(
            "tail padding must not be negative, got {tail_padding}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_is_150_days() {
        assert_eq!(NEVER, 12_960_000);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RetentionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_period_secs, 86_400);
        assert_eq!(config.alpha, 0.6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RetentionConfig::from_json(r#"{ "alpha": 0.3 }"#).unwrap();
        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.sample_period_secs, DEFAULT_SAMPLE_PERIOD_SECS);
        assert_eq!(config.outliers_coefficient, OUTLIERS_COEFFICIENT);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(RetentionConfig::from_json(r#"{ "alpha": 1.5 }"#).is_err());
        assert!(RetentionConfig::from_json(r#"{ "sample_period_secs": 0 }"#).is_err());
        assert!(RetentionConfig::from_json(r#"{ "plot_interval_secs": -1 }"#).is_err());
        assert!(RetentionConfig::from_json(r#"{ "tail_padding_secs": -1 }"#).is_err());
        assert!(RetentionConfig::from_json(r#"{ "outliers_coefficient": 0.0 }"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = RetentionConfig {
            sample_period_secs: 3600,
            ..RetentionConfig::default()
        };
        let loaded = RetentionConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }
}
