use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use palette::Srgb;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

pub const MIN_COLOR_TEMPERATURE: u16 = 2700;
pub const MAX_COLOR_TEMPERATURE: u16 = 6500;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LightId(pub String);

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LightId {
    fn from(id: &str) -> Self {
        LightId(id.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn toggled(self) -> Self {
        match self {
            PowerState::On => PowerState::Off,
            PowerState::Off => PowerState::On,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

impl FromStr for PowerState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            _ => Err(ValidationError::InvalidPowerState(s.to_string())),
        }
    }
}

/// Light color, sent to the light service as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColor(pub Srgb<u8>);

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}",
            self.0.red, self.0.green, self.0.blue
        )
    }
}

impl FromStr for LightColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();

        if !hex.starts_with('#') {
            return Err(ValidationError::InvalidColor(s.to_string()));
        }

        hex.parse::<Srgb<u8>>()
            .map(LightColor)
            .map_err(|_| ValidationError::InvalidColor(s.to_string()))
    }
}

impl Serialize for LightColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Light state as last acknowledged by the light service. The light service
/// has no status endpoint, so every field stays `None` until a command for
/// it succeeds.
#[derive(Builder, Clone, Debug, Default, PartialEq)]
#[builder(setter(into, strip_option), default)]
pub struct LightState {
    pub power: Option<PowerState>,
    pub intensity: Option<u8>,
    pub color_temperature: Option<u16>,
    pub color: Option<LightColor>,
    pub schedule: Option<DateTime<Utc>>,
}

impl LightState {
    /// Fields set in `patch` replace ours, unset ones are kept.
    pub fn merge(&mut self, patch: LightState) {
        self.power = patch.power.or(self.power);
        self.intensity = patch.intensity.or(self.intensity);
        self.color_temperature = patch.color_temperature.or(self.color_temperature);
        self.color = patch.color.or(self.color);
        self.schedule = patch.schedule.or(self.schedule);
    }
}

pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidSchedule(input.to_string()))
}
