use std::fs;
use std::path::{Path, PathBuf};

use foundation::time::Millis;
use serde::{Deserialize, Serialize};

/// Playback-clock milliseconds per trip second at 20x real time.
pub const DEFAULT_TIME_FACTOR: f64 = 1000.0 / 20.0;
/// Visual length of the moving trace, in overlay pixels.
pub const DEFAULT_TRACE_LENGTH: f64 = 20.0;

/// What happens when a trace reaches the end of its path.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Hide the trace and drop its playback handle.
    #[default]
    OneShot,
    /// Restart the sweep immediately, forever, without the initial delay.
    Loop,
}

/// Where delay and duration come from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingPolicy {
    /// `start_offset` and the last cumulative second, scaled by `time_factor`.
    #[default]
    FromTrip,
    /// Every trip starts at once and sweeps for the same duration; trip
    /// timing metadata is ignored.
    Fixed { duration_ms: f64 },
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    QuadInOut,
    CubicInOut,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` to eased progress in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadInOut => {
                let t = t * 2.0;
                if t <= 1.0 {
                    t * t / 2.0
                } else {
                    let t = t - 1.0;
                    (t * (2.0 - t) + 1.0) / 2.0
                }
            }
            Easing::CubicInOut => {
                let t = t * 2.0;
                if t <= 1.0 {
                    t * t * t / 2.0
                } else {
                    let t = t - 2.0;
                    (t * t * t + 2.0) / 2.0
                }
            }
        }
    }
}

/// Behaviour when the viewport cannot supply a projection.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionFallback {
    /// Keep rendering with the last projection state that worked.
    #[default]
    LastKnownGood,
    /// Skip the sync and report the failure to the caller.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Playback-clock milliseconds per trip second.
    pub time_factor: f64,
    pub trace_length: f64,
    pub completion: CompletionPolicy,
    pub timing: TimingPolicy,
    pub easing: Easing,
    pub projection_fallback: ProjectionFallback,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            time_factor: DEFAULT_TIME_FACTOR,
            trace_length: DEFAULT_TRACE_LENGTH,
            completion: CompletionPolicy::OneShot,
            timing: TimingPolicy::FromTrip,
            easing: Easing::Linear,
            projection_fallback: ProjectionFallback::LastKnownGood,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid playback config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl PlaybackConfig {
    /// Real-time playback: one trip second per playback second.
    pub fn real_time() -> Self {
        Self {
            time_factor: 1000.0,
            ..Self::default()
        }
    }

    /// `speedup` trip seconds per playback second.
    pub fn with_speedup(speedup: f64) -> Self {
        Self {
            time_factor: 1000.0 / speedup,
            ..Self::default()
        }
    }

    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let payload = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&payload)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_factor.is_finite() && self.time_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "time_factor must be > 0, got {}",
                self.time_factor
            )));
        }
        if !(self.trace_length.is_finite() && self.trace_length > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "trace_length must be > 0, got {}",
                self.trace_length
            )));
        }
        match self.timing {
            TimingPolicy::Fixed { duration_ms }
                if !(duration_ms.is_finite() && duration_ms >= 0.0) =>
            {
                Err(ConfigError::Invalid(format!(
                    "fixed duration must be >= 0, got {duration_ms}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Converts trip seconds to playback-clock milliseconds.
    pub fn scale(&self, trip_seconds: f64) -> Millis {
        Millis(trip_seconds * self.time_factor)
    }
}
