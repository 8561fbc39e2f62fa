use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{
    light::{
        LightColor, LightId, LightState, LightStateBuilder, PowerState, MAX_COLOR_TEMPERATURE,
        MIN_COLOR_TEMPERATURE,
    },
    status::{ControlMode, ControlParameters},
};
use crate::error::ValidationError;

/// A single operator action, sent to the controller or to the light service.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetTargetIlluminance(f64),
    SetControlParameters(ControlParameters),
    SetControlMode(ControlMode),
    SetIntensity { light: LightId, intensity: u8 },
    SetColorTemperature { light: LightId, kelvin: u16 },
    SetColor { light: LightId, color: LightColor },
    SetSchedule { light: LightId, at: DateTime<Utc> },
    ToggleState { light: LightId, state: PowerState },
}

/// The piece of remote state a command writes. Commands for the same field
/// are never in flight at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandField {
    TargetLux,
    ControlParameters,
    ControlMode,
    Power(LightId),
    Intensity(LightId),
    ColorTemperature(LightId),
    Color(LightId),
    Schedule(LightId),
}

/// Editable fields that can hold a local draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftKind {
    TargetLux,
    ControlParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Controller,
    Lights,
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;

    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }

    Ok(())
}

impl DeviceCommand {
    pub fn field(&self) -> CommandField {
        match self {
            DeviceCommand::SetTargetIlluminance(_) => CommandField::TargetLux,
            DeviceCommand::SetControlParameters(_) => CommandField::ControlParameters,
            DeviceCommand::SetControlMode(_) => CommandField::ControlMode,
            DeviceCommand::SetIntensity { light, .. } => CommandField::Intensity(light.clone()),
            DeviceCommand::SetColorTemperature { light, .. } => {
                CommandField::ColorTemperature(light.clone())
            }
            DeviceCommand::SetColor { light, .. } => CommandField::Color(light.clone()),
            DeviceCommand::SetSchedule { light, .. } => CommandField::Schedule(light.clone()),
            DeviceCommand::ToggleState { light, .. } => CommandField::Power(light.clone()),
        }
    }

    pub fn draft_kind(&self) -> Option<DraftKind> {
        match self {
            DeviceCommand::SetTargetIlluminance(_) => Some(DraftKind::TargetLux),
            DeviceCommand::SetControlParameters(_) => Some(DraftKind::ControlParameters),
            _ => None,
        }
    }

    /// The light state this command produces once acknowledged, for commands
    /// addressed to a light.
    pub fn light_patch(&self) -> Option<(LightId, LightState)> {
        let mut builder = LightStateBuilder::default();

        let light = match self {
            DeviceCommand::SetIntensity { light, intensity } => {
                builder.intensity(*intensity);
                light
            }
            DeviceCommand::SetColorTemperature { light, kelvin } => {
                builder.color_temperature(*kelvin);
                light
            }
            DeviceCommand::SetColor { light, color } => {
                builder.color(*color);
                light
            }
            DeviceCommand::SetSchedule { light, at } => {
                builder.schedule(*at);
                light
            }
            DeviceCommand::ToggleState { light, state } => {
                builder.power(*state);
                light
            }
            _ => return None,
        };

        let patch = builder.build().ok()?;

        Some((light.clone(), patch))
    }

    /// Checks values that cannot be expressed in the command's types.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DeviceCommand::SetTargetIlluminance(lux) => {
                check_range("target lux", *lux, 0.0, f64::MAX)
            }
            DeviceCommand::SetControlParameters(params) => {
                check_finite("Kp", params.kp)?;
                check_finite("Ki", params.ki)?;
                check_finite("Kd", params.kd)
            }
            DeviceCommand::SetIntensity { intensity, .. } => {
                check_range("intensity", f64::from(*intensity), 0.0, 100.0)
            }
            DeviceCommand::SetColorTemperature { kelvin, .. } => check_range(
                "color temperature",
                f64::from(*kelvin),
                f64::from(MIN_COLOR_TEMPERATURE),
                f64::from(MAX_COLOR_TEMPERATURE),
            ),
            DeviceCommand::SetControlMode(_)
            | DeviceCommand::SetColor { .. }
            | DeviceCommand::SetSchedule { .. }
            | DeviceCommand::ToggleState { .. } => Ok(()),
        }
    }

    pub fn endpoint(&self) -> (Service, &'static str) {
        match self {
            DeviceCommand::SetTargetIlluminance(_) => (Service::Controller, "/set_target_lux"),
            DeviceCommand::SetControlParameters(_) => (Service::Controller, "/set_pid"),
            DeviceCommand::SetControlMode(_) => (Service::Controller, "/set_control_mode"),
            DeviceCommand::SetIntensity { .. } => (Service::Lights, "/api/set-light-intensity"),
            DeviceCommand::SetColorTemperature { .. } => (Service::Lights, "/api/set-color-temp"),
            DeviceCommand::SetColor { .. } => (Service::Lights, "/api/set-light-color"),
            DeviceCommand::SetSchedule { .. } => (Service::Lights, "/api/set-schedule"),
            DeviceCommand::ToggleState { .. } => (Service::Lights, "/api/toggle-light"),
        }
    }

    pub fn body(&self) -> Result<Value, serde_json::Error> {
        let body = match self {
            DeviceCommand::SetTargetIlluminance(lux) => json!({ "target_lux": lux }),
            DeviceCommand::SetControlParameters(params) => serde_json::to_value(params)?,
            DeviceCommand::SetControlMode(mode) => json!({ "mode": mode }),
            DeviceCommand::SetIntensity { light, intensity } => {
                json!({ "id": light, "intensity": intensity })
            }
            DeviceCommand::SetColorTemperature { light, kelvin } => {
                json!({ "id": light, "colorTemp": kelvin })
            }
            DeviceCommand::SetColor { light, color } => json!({ "id": light, "color": color }),
            DeviceCommand::SetSchedule { light, at } => json!({
                "id": light,
                "schedule": at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            DeviceCommand::ToggleState { light, state } => json!({ "id": light, "state": state }),
        };

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::light::parse_schedule;

    fn light() -> LightId {
        LightId::from("2")
    }

    #[test]
    fn controller_commands_match_controller_api() {
        let command = DeviceCommand::SetTargetIlluminance(550.0);
        assert_eq!(command.endpoint(), (Service::Controller, "/set_target_lux"));
        assert_eq!(command.body().unwrap(), json!({"target_lux": 550.0}));

        let command = DeviceCommand::SetControlMode(ControlMode::Manual);
        assert_eq!(command.endpoint(), (Service::Controller, "/set_control_mode"));
        assert_eq!(command.body().unwrap(), json!({"mode": "manual"}));

        let command = DeviceCommand::SetControlParameters(ControlParameters::new(1.2, 0.2, 0.05));
        assert_eq!(command.endpoint(), (Service::Controller, "/set_pid"));
        assert_eq!(command.body().unwrap(), json!({"Kp": 1.2, "Ki": 0.2, "Kd": 0.05}));
    }

    #[test]
    fn light_commands_carry_the_light_id() {
        let command = DeviceCommand::SetColorTemperature {
            light: light(),
            kelvin: 4000,
        };
        assert_eq!(command.endpoint(), (Service::Lights, "/api/set-color-temp"));
        assert_eq!(command.body().unwrap(), json!({"id": "2", "colorTemp": 4000}));

        let command = DeviceCommand::SetColor {
            light: light(),
            color: "#f1c40f".parse().unwrap(),
        };
        assert_eq!(command.body().unwrap(), json!({"id": "2", "color": "#f1c40f"}));

        let command = DeviceCommand::ToggleState {
            light: light(),
            state: PowerState::On,
        };
        assert_eq!(command.endpoint(), (Service::Lights, "/api/toggle-light"));
        assert_eq!(command.body().unwrap(), json!({"id": "2", "state": "on"}));

        let command = DeviceCommand::SetSchedule {
            light: light(),
            at: parse_schedule("2026-10-16T18:30:00Z").unwrap(),
        };
        assert_eq!(
            command.body().unwrap(),
            json!({"id": "2", "schedule": "2026-10-16T18:30:00.000Z"})
        );
    }

    #[test]
    fn fields_separate_lights_and_properties() {
        let intensity = DeviceCommand::SetIntensity {
            light: light(),
            intensity: 10,
        };
        let other_light = DeviceCommand::SetIntensity {
            light: LightId::from("3"),
            intensity: 10,
        };
        let schedule = DeviceCommand::SetSchedule {
            light: light(),
            at: Utc::now(),
        };

        assert_ne!(intensity.field(), other_light.field());
        assert_ne!(intensity.field(), schedule.field());
        assert_eq!(intensity.draft_kind(), None);
        assert_eq!(
            DeviceCommand::SetTargetIlluminance(1.0).draft_kind(),
            Some(DraftKind::TargetLux)
        );
    }

    #[test]
    fn light_commands_produce_a_state_patch() {
        let command = DeviceCommand::SetColorTemperature {
            light: light(),
            kelvin: 4000,
        };

        let (id, patch) = command.light_patch().unwrap();
        assert_eq!(id, light());
        assert_eq!(patch.color_temperature, Some(4000));
        assert_eq!(patch.power, None);

        assert!(DeviceCommand::SetTargetIlluminance(500.0).light_patch().is_none());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        assert!(DeviceCommand::SetTargetIlluminance(-1.0).validate().is_err());
        assert!(DeviceCommand::SetTargetIlluminance(f64::NAN).validate().is_err());
        assert!(DeviceCommand::SetTargetIlluminance(0.0).validate().is_ok());

        let params = ControlParameters::new(1.0, f64::INFINITY, 0.0);
        assert_eq!(
            DeviceCommand::SetControlParameters(params).validate(),
            Err(ValidationError::NotFinite { field: "Ki" })
        );

        let too_bright = DeviceCommand::SetIntensity {
            light: light(),
            intensity: 101,
        };
        assert!(too_bright.validate().is_err());

        let too_warm = DeviceCommand::SetColorTemperature {
            light: light(),
            kelvin: 2000,
        };
        assert!(too_warm.validate().is_err());
    }
}
