//! Air-quality categorization.
//!
//! Maps a numeric value on the configured scale to exactly one
//! [`AqiCategory`]. Each threshold is the inclusive upper bound of its
//! category, so on the AQI scale 50 is `Good` and 51 is `Satisfactory`.
//!
//! # Example
//!
//! ```
//! use aeroguard_core::{AqiCategory, Scale, Thresholds};
//!
//! let thresholds = Thresholds::for_scale(Scale::Aqi);
//! assert_eq!(thresholds.evaluate_aqi(50), AqiCategory::Good);
//! assert_eq!(thresholds.evaluate_aqi(51), AqiCategory::Satisfactory);
//!
//! let pm25 = Thresholds::for_scale(Scale::Pm25);
//! assert_eq!(pm25.evaluate(30.0), AqiCategory::Good);
//! assert_eq!(pm25.evaluate(30.5), AqiCategory::Satisfactory);
//! ```

use serde::{Deserialize, Serialize};

use aeroguard_types::AqiCategory;

/// The measurement scale values are categorized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// National AQI index (0-500).
    #[default]
    Aqi,
    /// PM2.5 concentration in µg/m³.
    Pm25,
}

/// Inclusive upper bounds for each category. Above `very_poor_max` is `Severe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Upper bound for Good.
    pub good_max: f64,
    /// Upper bound for Satisfactory.
    pub satisfactory_max: f64,
    /// Upper bound for Moderate.
    pub moderate_max: f64,
    /// Upper bound for Poor.
    pub poor_max: f64,
    /// Upper bound for Very Poor.
    pub very_poor_max: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::aqi()
    }
}

impl ThresholdConfig {
    /// National AQI index breakpoints.
    pub fn aqi() -> Self {
        Self {
            good_max: 50.0,
            satisfactory_max: 100.0,
            moderate_max: 200.0,
            poor_max: 300.0,
            very_poor_max: 400.0,
        }
    }

    /// PM2.5 concentration breakpoints (µg/m³).
    pub fn pm25() -> Self {
        Self {
            good_max: 30.0,
            satisfactory_max: 60.0,
            moderate_max: 90.0,
            poor_max: 120.0,
            very_poor_max: 250.0,
        }
    }
}

/// Threshold evaluator.
#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    config: ThresholdConfig,
}

impl Thresholds {
    /// Create a new evaluator with the given configuration.
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Create an evaluator for a built-in scale.
    pub fn for_scale(scale: Scale) -> Self {
        match scale {
            Scale::Aqi => Self::new(ThresholdConfig::aqi()),
            Scale::Pm25 => Self::new(ThresholdConfig::pm25()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Categorize a value. NaN is treated as the most severe category.
    pub fn evaluate(&self, value: f64) -> AqiCategory {
        if value <= self.config.good_max {
            AqiCategory::Good
        } else if value <= self.config.satisfactory_max {
            AqiCategory::Satisfactory
        } else if value <= self.config.moderate_max {
            AqiCategory::Moderate
        } else if value <= self.config.poor_max {
            AqiCategory::Poor
        } else if value <= self.config.very_poor_max {
            AqiCategory::VeryPoor
        } else {
            AqiCategory::Severe
        }
    }

    /// Categorize an integer AQI value.
    pub fn evaluate_aqi(&self, aqi: u16) -> AqiCategory {
        self.evaluate(f64::from(aqi))
    }
}
