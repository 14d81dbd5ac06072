//! Configuration management for tempo, judging, analysis and wave pacing
//!
//! All tunables live here so they can be rebalanced from a JSON file
//! without recompiling. Every section has defaults, and missing fields
//! fall back to them, so partial config files are valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::analysis::Band;
use crate::director::{Point, WaveCategory, WaveDescriptor};
use crate::error::ConfigError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub conductor: ConductorConfig,
    pub judge: JudgeConfig,
    pub analyzer: AnalyzerConfig,
    pub director: DirectorConfig,
}

/// Declared tempo for the beat clock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Beats per minute; values <= 0 fall back to the 60 s beat sentinel
    pub bpm: f64,
    /// Beats per bar; 0 is treated as 1
    pub beats_per_bar: u32,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
        }
    }
}

/// Timing judge tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Half-width of the NORMAL window as a fraction of a beat (clamped to [0, 0.5])
    pub window: f64,
    /// Input latency calibration offset in milliseconds
    pub offset_ms: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            window: 0.12,
            offset_ms: 0.0,
        }
    }
}

/// Per-band detector tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSettings {
    /// Lower band edge in Hz
    pub lo_hz: f32,
    /// Upper band edge in Hz
    pub hi_hz: f32,
    /// Standard deviations above the rolling mean needed to declare a beat
    pub sensitivity: f32,
    /// Minimum time between two beats on this band
    pub refractory_ms: f64,
}

/// Live band analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// FFT window size used by the PCM spectrum tap
    pub fft_size: usize,
    /// Single-pole smoothing factor applied to raw band energy (weight of the previous value)
    pub smoothing: f32,
    /// Rolling history length per band used for the adaptive threshold
    pub history_len: usize,
    /// Maximum number of beat timestamps kept for nearest-beat lookups
    pub beat_log_capacity: usize,
    pub low: BandSettings,
    pub mid: BandSettings,
    pub high: BandSettings,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            smoothing: 0.7,
            history_len: 43,
            beat_log_capacity: 256,
            // Kick and bass
            low: BandSettings {
                lo_hz: 30.0,
                hi_hz: 250.0,
                sensitivity: 1.8,
                refractory_ms: 110.0,
            },
            // Snare body
            mid: BandSettings {
                lo_hz: 120.0,
                hi_hz: 600.0,
                sensitivity: 1.6,
                refractory_ms: 90.0,
            },
            // Transients and hats
            high: BandSettings {
                lo_hz: 1000.0,
                hi_hz: 12000.0,
                sensitivity: 2.0,
                refractory_ms: 60.0,
            },
        }
    }
}

impl AnalyzerConfig {
    pub fn band(&self, band: Band) -> &BandSettings {
        match band {
            Band::Low => &self.low,
            Band::Mid => &self.mid,
            Band::High => &self.high,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 16 {
            return Err(ConfigError::invalid("analyzer.fft_size", "must be at least 16"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::invalid("analyzer.smoothing", "must be in [0, 1)"));
        }
        if self.history_len < 2 {
            return Err(ConfigError::invalid("analyzer.history_len", "must be at least 2"));
        }
        if self.beat_log_capacity == 0 {
            return Err(ConfigError::invalid(
                "analyzer.beat_log_capacity",
                "must be at least 1",
            ));
        }
        for band in Band::ALL {
            let settings = self.band(band);
            let field = format!("analyzer.{}", band.as_str());
            if !(settings.lo_hz >= 0.0 && settings.lo_hz < settings.hi_hz) {
                return Err(ConfigError::invalid(field, "lo_hz must be below hi_hz"));
            }
            if !settings.sensitivity.is_finite() || settings.sensitivity < 0.0 {
                return Err(ConfigError::invalid(field, "sensitivity must be >= 0"));
            }
            if !settings.refractory_ms.is_finite() || settings.refractory_ms < 0.0 {
                return Err(ConfigError::invalid(field, "refractory_ms must be >= 0"));
            }
        }
        let ordered = self.low.lo_hz < self.mid.lo_hz
            && self.mid.lo_hz < self.high.lo_hz
            && self.low.hi_hz < self.mid.hi_hz
            && self.mid.hi_hz < self.high.hi_hz;
        if !ordered {
            return Err(ConfigError::invalid(
                "analyzer",
                "band edges must increase from low to mid to high",
            ));
        }
        Ok(())
    }
}

/// Limits applied to heavy and boss waves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeavyLimits {
    /// Pending plus active heavy waves allowed at once
    pub max_simultaneous: u32,
    /// Minimum gap between two heavy spawns
    pub cooldown_ms: f64,
    /// Trailing window for the rate cap
    pub window_ms: f64,
    /// Heavy spawns allowed inside `window_ms`
    pub max_in_window: u32,
}

impl Default for HeavyLimits {
    fn default() -> Self {
        Self {
            max_simultaneous: 1,
            cooldown_ms: 8000.0,
            window_ms: 30_000.0,
            max_in_window: 2,
        }
    }
}

/// Wave director pacing and admission control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Scheduled-but-unspawned entries allowed; beats beyond this are dropped
    pub max_queue_depth: usize,
    /// Spawn delay for descriptors that do not declare one
    pub default_delay_ms: f64,
    /// How far ahead of the spawn a telegraph fires
    pub telegraph_lead_ms: f64,
    /// Silence that triggers a fallback spawn
    pub fallback_cooldown_ms: f64,
    /// Fraction of the cooldown that must pass between two fallback firings
    pub fallback_refire_fraction: f64,
    /// Descriptor injected on silence; `None` disables fallback spawns
    pub fallback: Option<WaveDescriptor>,
    /// Permit the same descriptor twice in a row under strict admission
    pub allow_repeats: bool,
    pub heavy: HeavyLimits,
    /// Per-category cooldown since that category's last spawn
    pub category_cooldown_ms: BTreeMap<WaveCategory, f64>,
    /// Per-category base weight multiplier (missing = 1.0)
    pub category_weights: BTreeMap<WaveCategory, f64>,
    /// Stages up to and including this one boost descriptors tagged "intro"
    pub intro_stage_limit: u32,
    pub intro_boost: f64,
    /// Weight multiplier when the beat band is in a descriptor's band list
    pub band_match_boost: f64,
    /// Weight multiplier when a descriptor lists bands but not this one
    pub band_mismatch_factor: f64,
    /// Default anchor handed to the spawner and telegraph
    pub spawn_anchor: Point,
    /// Seed for reproducible selection; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        let mut category_cooldown_ms = BTreeMap::new();
        category_cooldown_ms.insert(WaveCategory::Elite, 2500.0);
        category_cooldown_ms.insert(WaveCategory::Heavy, 6000.0);
        category_cooldown_ms.insert(WaveCategory::Boss, 20_000.0);

        let mut category_weights = BTreeMap::new();
        category_weights.insert(WaveCategory::Light, 1.2);
        category_weights.insert(WaveCategory::Standard, 1.0);
        category_weights.insert(WaveCategory::Elite, 0.6);
        category_weights.insert(WaveCategory::Heavy, 0.35);
        category_weights.insert(WaveCategory::Boss, 0.1);

        Self {
            max_queue_depth: 6,
            default_delay_ms: 0.0,
            telegraph_lead_ms: 600.0,
            fallback_cooldown_ms: 4000.0,
            fallback_refire_fraction: 0.5,
            fallback: Some(WaveDescriptor::fallback_default()),
            allow_repeats: false,
            heavy: HeavyLimits::default(),
            category_cooldown_ms,
            category_weights,
            intro_stage_limit: 2,
            intro_boost: 2.0,
            band_match_boost: 1.5,
            band_mismatch_factor: 0.5,
            spawn_anchor: Point::new(0.5, 0.0),
            seed: None,
        }
    }
}

impl DirectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_depth == 0 {
            return Err(ConfigError::invalid(
                "director.max_queue_depth",
                "must be at least 1",
            ));
        }
        if !(self.fallback_cooldown_ms.is_finite() && self.fallback_cooldown_ms > 0.0) {
            return Err(ConfigError::invalid(
                "director.fallback_cooldown_ms",
                "must be a positive number",
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_refire_fraction) {
            return Err(ConfigError::invalid(
                "director.fallback_refire_fraction",
                "must be in [0, 1]",
            ));
        }
        let non_negative = [
            ("director.default_delay_ms", self.default_delay_ms),
            ("director.telegraph_lead_ms", self.telegraph_lead_ms),
            ("director.heavy.cooldown_ms", self.heavy.cooldown_ms),
            ("director.heavy.window_ms", self.heavy.window_ms),
            ("director.intro_boost", self.intro_boost),
            ("director.band_match_boost", self.band_match_boost),
            ("director.band_mismatch_factor", self.band_mismatch_factor),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be a finite value >= 0"));
            }
        }
        for (category, value) in self
            .category_cooldown_ms
            .iter()
            .chain(self.category_weights.iter())
        {
            if !value.is_finite() || *value < 0.0 {
                return Err(ConfigError::invalid(
                    format!("director.category.{}", category.as_str()),
                    "must be a finite value >= 0",
                ));
            }
        }
        Ok(())
    }

    /// Base weight multiplier for a category.
    pub fn category_weight(&self, category: WaveCategory) -> f64 {
        self.category_weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Cooldown since the category's last spawn (0 when unset).
    pub fn category_cooldown(&self, category: WaveCategory) -> f64 {
        self.category_cooldown_ms
            .get(&category)
            .copied()
            .unwrap_or(0.0)
    }
}

impl AppConfig {
    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.judge.window.is_finite() {
            return Err(ConfigError::invalid("judge.window", "must be finite"));
        }
        if !self.judge.offset_ms.is_finite() {
            return Err(ConfigError::invalid("judge.offset_ms", "must be finite"));
        }
        self.analyzer.validate()?;
        self.director.validate()
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing,
    /// malformed, or fails validation
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to load {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/director_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.conductor.bpm, 120.0);
        assert_eq!(config.conductor.beats_per_bar, 4);
        assert_eq!(config.judge.window, 0.12);
        assert_eq!(config.analyzer.history_len, 43);
        assert_eq!(config.director.max_queue_depth, 6);
        assert!(config.director.fallback.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::from_json_str(&json).unwrap();

        assert_eq!(parsed.analyzer.low, config.analyzer.low);
        assert_eq!(
            parsed.director.category_weight(WaveCategory::Heavy),
            config.director.category_weight(WaveCategory::Heavy)
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "conductor": { "bpm": 90 }, "director": { "seed": 7 } }"#)
                .unwrap();
        assert_eq!(config.conductor.bpm, 90.0);
        assert_eq!(config.conductor.beats_per_bar, 4);
        assert_eq!(config.director.seed, Some(7));
        assert_eq!(config.director.max_queue_depth, 6);
    }

    #[test]
    fn test_rejects_zero_queue_depth() {
        let err = AppConfig::from_json_str(r#"{ "director": { "max_queue_depth": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "director.max_queue_depth"));
    }

    #[test]
    fn test_rejects_unordered_bands() {
        let mut config = AppConfig::default();
        config.analyzer.mid.lo_hz = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_window_is_not_rejected() {
        // Judges clamp the window instead of refusing it
        let config = AppConfig::from_json_str(r#"{ "judge": { "window": 0.6 } }"#).unwrap();
        assert_eq!(config.judge.window, 0.6);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/definitely/not/here.json");
        assert_eq!(config.director.max_queue_depth, 6);
    }
}
