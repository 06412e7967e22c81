#![forbid(unsafe_code)]

//! Client configuration.
//!
//! Every tunable lives in one [`ClientConfig`] that loads from TOML or JSON.
//! Missing keys fall back to defaults, so an empty file is a valid config.
//!
//! ```toml
//! api_base_url = "http://127.0.0.1:8000"
//! poll_interval_ms = 1000
//!
//! [glide]
//! duration_ms = 500
//!
//! [simulation]
//! wip_limit = 5
//! complexity = { 1 = 1, 3 = 1, 5 = 1 }
//! ```
//!
//! Precedence, lowest first: defaults, file, `FLOWBOARD_API_URL`, CLI flags.

use std::collections::BTreeMap;
use std::path::Path;

use flowboard_core::GlideConfig;
use flowboard_core::animation::easing_by_name;
use flowboard_core::reconcile::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::{ClientError, Result};
use crate::wire::ConfigRequest;

/// Environment variable overriding [`ClientConfig::api_base_url`].
pub const API_URL_ENV: &str = "FLOWBOARD_API_URL";

/// Lanes whose processing complexity the server lets clients tune.
pub const COMPLEXITY_LANES: [u32; 3] = [1, 3, 5];

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Simulation server root, without trailing slash.
    pub api_base_url: String,
    /// Delay between snapshot polls.
    pub poll_interval_ms: u64,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
    /// Delay between rendered frames while watching.
    pub frame_interval_ms: u64,
    pub glide: GlideSettings,
    pub simulation: SimulationSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 1000,
            request_timeout_ms: 5000,
            frame_interval_ms: 16,
            glide: GlideSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

/// Glide animation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlideSettings {
    pub duration_ms: u64,
    /// Grace period after `duration_ms` before a glide is force-completed.
    pub fallback_margin_ms: u64,
    /// Frames to wait for the layout before giving up on an end capture.
    pub max_end_deferral_frames: u32,
    /// Clone opacity at the end of the glide; 1.0 disables fading.
    pub end_opacity: f32,
    /// CSS timing-function keyword: `linear`, `ease`, `ease-in`, `ease-out`
    /// or `ease-in-out`.
    pub easing: String,
}

impl Default for GlideSettings {
    fn default() -> Self {
        Self {
            duration_ms: 500,
            fallback_margin_ms: 200,
            max_end_deferral_frames: 3,
            end_opacity: 1.0,
            easing: "ease-in-out".to_string(),
        }
    }
}

/// Parameters pushed to the server before a simulation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Work-in-progress limit.
    pub wip_limit: u32,
    /// Seconds per simulation step.
    pub speed: f64,
    /// Lane index → complexity. Keys are lane indices written as strings, the
    /// way the server expects them.
    pub complexity: BTreeMap<String, u32>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            wip_limit: 5,
            speed: 1.0,
            complexity: COMPLEXITY_LANES
                .iter()
                .map(|lane| (lane.to_string(), 1))
                .collect(),
        }
    }
}

impl SimulationSettings {
    /// Complexity configured for `lane`, defaulting to 1.
    #[must_use]
    pub fn complexity_for(&self, lane: u32) -> u32 {
        self.complexity.get(&lane.to_string()).copied().unwrap_or(1)
    }

    /// Set the complexity of `lane`.
    pub fn set_complexity(&mut self, lane: u32, value: u32) {
        self.complexity.insert(lane.to_string(), value);
    }

    /// The set-config request body for these settings.
    #[must_use]
    pub fn to_request(&self) -> ConfigRequest {
        ConfigRequest {
            complexity: self.complexity.clone(),
            wip_limit: self.wip_limit,
            speed: self.speed,
        }
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            errors.push(format!(
                "simulation.speed must be a positive number, got {}",
                self.speed
            ));
        }
        for key in self.complexity.keys() {
            if key.parse::<u32>().is_err() {
                errors.push(format!(
                    "simulation.complexity key {key:?} is not a lane index"
                ));
            }
        }
    }
}

impl ClientConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load from a file, picking the format from its extension (`.json` is
    /// JSON, anything else TOML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Defaults, then the optional file, then the process environment.
    ///
    /// The result is not validated; callers apply their own overrides first
    /// and then call [`Self::ensure_valid`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            tracing::debug!(target: "flowboard.config", url = %url, "api url from environment");
            self.api_base_url = url;
        }
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "api_base_url must start with http:// or https://, got {:?}",
                self.api_base_url
            ));
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be > 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be > 0".to_string());
        }
        if self.frame_interval_ms == 0 {
            errors.push("frame_interval_ms must be > 0".to_string());
        }
        if easing_by_name(&self.glide.easing).is_none() {
            errors.push(format!("glide.easing {:?} is not a known curve", self.glide.easing));
        }
        if let Err(e) = self.glide_config().validate() {
            errors.push(format!("glide: {e}"));
        }
        self.simulation.validate_into(&mut errors);
        errors
    }

    /// [`Self::validate`] as a `Result`.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClientError::InvalidConfig { problems })
        }
    }

    /// Server root with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Glide playback parameters for the engine. An unknown easing name keeps
    /// the default curve; [`Self::validate`] reports it.
    #[must_use]
    pub fn glide_config(&self) -> GlideConfig {
        let mut config = GlideConfig::default()
            .with_duration(Duration::from_millis(self.glide.duration_ms))
            .with_fallback_margin(Duration::from_millis(self.glide.fallback_margin_ms))
            .with_end_opacity(self.glide.end_opacity);
        if let Some(easing) = easing_by_name(&self.glide.easing) {
            config = config.with_easing(easing);
        }
        config
    }

    /// Reconciler parameters for the engine.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            glide: self.glide_config(),
            max_end_deferral_frames: self.glide.max_end_deferral_frames,
        }
    }
}

fn read(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ClientError::MissingConfig {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}
