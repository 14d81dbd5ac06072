//! Wave descriptors and playlists.
//!
//! Descriptors are immutable value data loaded from JSON. The director
//! only reads them; everything it tracks about a descriptor (cooldowns,
//! pending counts) lives in its own ledger, keyed by id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::analysis::Band;
use crate::error::ConfigError;

/// Tag that marks a descriptor as an intro wave for early stages
pub const INTRO_TAG: &str = "intro";

/// 2D point in playfield coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Admission class of a wave
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WaveCategory {
    Light,
    #[default]
    Standard,
    Elite,
    Heavy,
    Boss,
}

impl WaveCategory {
    /// Heavy and boss waves share the concurrency and rate caps.
    pub fn is_heavy(self) -> bool {
        matches!(self, WaveCategory::Heavy | WaveCategory::Boss)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaveCategory::Light => "light",
            WaveCategory::Standard => "standard",
            WaveCategory::Elite => "elite",
            WaveCategory::Heavy => "heavy",
            WaveCategory::Boss => "boss",
        }
    }
}

/// Pre-spawn warning cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegraphSpec {
    /// Visual style understood by the telegraph collaborator
    pub kind: String,
    #[serde(default = "default_telegraph_duration_ms")]
    pub duration_ms: f64,
    #[serde(default = "default_one_f32")]
    pub intensity: f32,
}

fn default_telegraph_duration_ms() -> f64 {
    600.0
}

fn default_one_f32() -> f32 {
    1.0
}

fn default_count() -> u32 {
    1
}

fn default_weight() -> f64 {
    1.0
}

/// One spawnable unit of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveDescriptor {
    pub id: String,
    /// Enemy archetype handed to the spawner
    #[serde(default)]
    pub enemy_type: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_one_f32")]
    pub speed_multiplier: f32,
    #[serde(default = "default_one_f32")]
    pub hp_multiplier: f32,
    /// Formation name; geometry is the spawner's business
    #[serde(default)]
    pub formation: String,
    /// Formation-specific parameters, passed through untouched
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub telegraph: Option<TelegraphSpec>,
    #[serde(default)]
    pub audio_cue: Option<String>,
    /// Spawn delay after the triggering beat; falls back to the director default
    #[serde(default)]
    pub delay_ms: Option<f64>,
    #[serde(default)]
    pub category: WaveCategory,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Minimum time between two spawns of this descriptor
    #[serde(default)]
    pub cooldown_ms: f64,
    #[serde(default)]
    pub min_stage: Option<u32>,
    #[serde(default)]
    pub max_stage: Option<u32>,
    /// Stage this wave is tuned for; defaults to `min_stage`
    #[serde(default)]
    pub tier: Option<u32>,
    /// Bands this wave prefers to answer; empty means any
    #[serde(default)]
    pub bands: Vec<Band>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Overrides the director's spawn anchor
    #[serde(default)]
    pub anchor: Option<Point>,
}

impl WaveDescriptor {
    /// Minimal descriptor with defaults for everything but the id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enemy_type: String::new(),
            count: default_count(),
            speed_multiplier: 1.0,
            hp_multiplier: 1.0,
            formation: String::new(),
            params: BTreeMap::new(),
            telegraph: None,
            audio_cue: None,
            delay_ms: None,
            category: WaveCategory::Standard,
            weight: default_weight(),
            cooldown_ms: 0.0,
            min_stage: None,
            max_stage: None,
            tier: None,
            bands: Vec::new(),
            tags: Vec::new(),
            anchor: None,
        }
    }

    /// The descriptor injected on prolonged silence when none is configured.
    pub fn fallback_default() -> Self {
        Self {
            enemy_type: "drone".to_string(),
            count: 3,
            formation: "line".to_string(),
            category: WaveCategory::Light,
            ..Self::new("fallback")
        }
    }

    pub fn with_category(mut self, category: WaveCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: f64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_telegraph(mut self, telegraph: TelegraphSpec) -> Self {
        self.telegraph = Some(telegraph);
        self
    }

    pub fn with_stage_range(mut self, min_stage: Option<u32>, max_stage: Option<u32>) -> Self {
        self.min_stage = min_stage;
        self.max_stage = max_stage;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: f64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_bands(mut self, bands: Vec<Band>) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn is_heavy(&self) -> bool {
        self.category.is_heavy()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether `stage` lies inside the descriptor's stage range (inclusive)
    pub fn allows_stage(&self, stage: u32) -> bool {
        self.min_stage.map_or(true, |min| stage >= min)
            && self.max_stage.map_or(true, |max| stage <= max)
    }

    /// Effective spawn delay, never negative
    pub fn effective_delay_ms(&self, default_delay_ms: f64) -> f64 {
        let delay = self.delay_ms.unwrap_or(default_delay_ms);
        if delay.is_finite() {
            delay.max(0.0)
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let field = |name: &str| format!("waves.{}.{}", self.id, name);
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("waves.id", "must not be empty"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ConfigError::invalid(field("weight"), "must be a finite value >= 0"));
        }
        if !self.cooldown_ms.is_finite() || self.cooldown_ms < 0.0 {
            return Err(ConfigError::invalid(field("cooldown_ms"), "must be a finite value >= 0"));
        }
        if let (Some(min), Some(max)) = (self.min_stage, self.max_stage) {
            if min > max {
                return Err(ConfigError::invalid(field("min_stage"), "must not exceed max_stage"));
            }
        }
        Ok(())
    }
}

/// Ordered list of descriptors for one difficulty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub waves: Vec<WaveDescriptor>,
}

impl Playlist {
    pub fn new(difficulty: impl Into<String>, waves: Vec<WaveDescriptor>) -> Self {
        Self {
            difficulty: difficulty.into(),
            waves,
        }
    }

    /// Parse and validate a playlist from JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let playlist: Playlist = serde_json::from_str(json)?;
        playlist.validate()?;
        Ok(playlist)
    }

    /// Reject duplicate ids and out-of-range values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for wave in &self.waves {
            wave.validate()?;
            if !seen.insert(wave.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("waves.{}", wave.id),
                    "duplicate id",
                ));
            }
        }
        Ok(())
    }

    /// Load a playlist from JSON file
    ///
    /// # Returns
    /// The playlist, or an empty one if the file is missing or malformed.
    /// An empty playlist leaves the director in fallback-only mode.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let result = fs::read_to_string(&path)
            .map_err(|err| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                reason: err.to_string(),
            })
            .and_then(|contents| Self::from_json_str(&contents));

        match result {
            Ok(playlist) => {
                log::info!(
                    "[Playlist] Loaded {} waves ({}) from {:?}",
                    playlist.waves.len(),
                    playlist.difficulty,
                    path.as_ref()
                );
                playlist
            }
            Err(err) => {
                log::warn!(
                    "[Playlist] {}. Continuing with an empty playlist (fallback spawns only).",
                    err
                );
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }
}
