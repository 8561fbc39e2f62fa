use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Automatic,
    Manual,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Automatic => write!(f, "automatic"),
            ControlMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for ControlMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "automatic" => Ok(ControlMode::Automatic),
            "manual" => Ok(ControlMode::Manual),
            _ => Err(ValidationError::InvalidMode(s.to_string())),
        }
    }
}

// The controller lowercases modes it stores but echoes whatever it was sent.
impl<'de> Deserialize<'de> for ControlMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mode = String::deserialize(deserializer)?;
        mode.parse().map_err(serde::de::Error::custom)
    }
}

/// Device status as reported by `GET /status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Measured illuminance in lux, `None` when the sensor had no reading.
    pub current_lux: Option<f64>,

    #[serde(default)]
    pub target_lux: Option<f64>,

    /// Output duty cycle, 0 - 100 %.
    pub brightness: f64,

    pub control_mode: ControlMode,
}

/// Feedback-control law gains.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    #[serde(rename = "Kp")]
    pub kp: f64,
    #[serde(rename = "Ki")]
    pub ki: f64,
    #[serde(rename = "Kd")]
    pub kd: f64,
}

impl ControlParameters {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        ControlParameters { kp, ki, kd }
    }
}
