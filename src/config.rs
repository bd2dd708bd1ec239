use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TRACK_LENGTH: f64 = 10000.0;
pub const MAX_SPEEDS: [f64; 6] = [67.0, 134.0, 201.0, 268.0, 335.0, 400.0];
pub const ACCELERATION: f64 = 5.0;
pub const AI_ACCELERATION_FACTOR: f64 = 1.1;
pub const SHIFT_POINTS: [f64; 5] = [0.85, 0.88, 0.9, 0.92, 0.95];
pub const LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("track length `{0}` is not a number")]
    InvalidTrackLength(String),
    #[error("track length must be a positive distance, got {0}")]
    NonPositiveTrackLength(f64),
    #[error("gear table is empty")]
    NoGears,
    #[error("max speed for gear {gear} must be positive, got {speed}")]
    InvalidMaxSpeed { gear: usize, speed: f64 },
    #[error("acceleration must be positive, got {0}")]
    InvalidAcceleration(f64),
    #[error("shift point table is empty")]
    NoShiftPoints,
}

/// Track length chosen on the intro screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackLength {
    /// Nothing was entered, the race runs on [`DEFAULT_TRACK_LENGTH`].
    Default,
    Entered(f64),
}

impl TrackLength {
    pub const fn meters(self) -> f64 {
        match self {
            Self::Default => DEFAULT_TRACK_LENGTH,
            Self::Entered(meters) => meters,
        }
    }
}

/// Parses the free-form track length entry.
///
/// An empty entry substitutes the default length. Anything else has to be a
/// positive, finite number of meters.
pub fn parse_track_length(input: &str) -> Result<TrackLength, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(TrackLength::Default);
    }

    let meters: f64 = input
        .parse()
        .map_err(|_| ConfigError::InvalidTrackLength(input.to_string()))?;

    if !meters.is_finite() || meters <= 0.0 {
        return Err(ConfigError::NonPositiveTrackLength(meters));
    }

    Ok(TrackLength::Entered(meters))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSpec {
    /// Max speed per gear, index 0 is first gear.
    pub max_speeds: Vec<f64>,
    pub acceleration: f64,
    /// Fraction of the gear's max speed at which the AI shifts up.
    pub shift_points: Vec<f64>,
}

impl Default for CarSpec {
    fn default() -> Self {
        Self {
            max_speeds: MAX_SPEEDS.to_vec(),
            acceleration: ACCELERATION,
            shift_points: SHIFT_POINTS.to_vec(),
        }
    }
}

impl CarSpec {
    pub fn with_acceleration(&self, factor: f64) -> Self {
        Self {
            acceleration: self.acceleration * factor,
            ..self.clone()
        }
    }

    pub fn gears(&self) -> u8 {
        u8::try_from(self.max_speeds.len()).unwrap_or(u8::MAX)
    }

    /// Nominal max speed for `gear`, `None` when the gear is out of range.
    pub fn max_speed(&self, gear: u8) -> Option<f64> {
        let index = usize::from(gear).checked_sub(1)?;
        self.max_speeds.get(index).copied()
    }

    pub fn shift_point(&self, gear: u8) -> f64 {
        self.shift_points
            .get(usize::from(gear.saturating_sub(1)))
            .or_else(|| self.shift_points.last())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_speeds.is_empty() {
            return Err(ConfigError::NoGears);
        }
        for (index, &speed) in self.max_speeds.iter().enumerate() {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(ConfigError::InvalidMaxSpeed {
                    gear: index + 1,
                    speed,
                });
            }
        }
        if !self.acceleration.is_finite() || self.acceleration <= 0.0 {
            return Err(ConfigError::InvalidAcceleration(self.acceleration));
        }
        if self.shift_points.is_empty() {
            return Err(ConfigError::NoShiftPoints);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub car: CarSpec,
    pub ai_acceleration_factor: f64,
    pub seed: Option<u64>,
    pub export_log: bool,
    /// Where exported race logs are written.
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            car: CarSpec::default(),
            ai_acceleration_factor: AI_ACCELERATION_FACTOR,
            seed: None,
            export_log: false,
            log_dir: PathBuf::from(LOG_DIR),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.car.validate()?;
        self.ai_car().validate()
    }

    pub fn player_car(&self) -> CarSpec {
        self.car.clone()
    }

    pub fn ai_car(&self) -> CarSpec {
        self.car.with_acceleration(self.ai_acceleration_factor)
    }
}
