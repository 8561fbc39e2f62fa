use crate::{
    device::{command::DeviceCommand, status::ControlMode},
    error::Rejection,
};

/// Which controls the operator may use right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub target_lux: bool,
    pub control_parameters: bool,
    pub switch_to_automatic: bool,
    pub switch_to_manual: bool,
}

/// Decides from the control mode whether a command may be sent. Pure, so it
/// can be asked again right before every dispatch.
pub struct CommandGate;

impl CommandGate {
    pub fn can_submit_target_lux(mode: ControlMode) -> bool {
        mode == ControlMode::Manual
    }

    pub fn can_submit_control_parameters() -> bool {
        true
    }

    pub fn can_submit_mode_switch(current: ControlMode, requested: ControlMode) -> bool {
        current != requested
    }

    /// `mode` is `None` until the first status has been received. Light
    /// commands do not depend on the control mode.
    pub fn check(command: &DeviceCommand, mode: Option<ControlMode>) -> Result<(), Rejection> {
        match command {
            DeviceCommand::SetTargetIlluminance(_) => {
                let mode = mode.ok_or(Rejection::ModeUnknown)?;

                if !Self::can_submit_target_lux(mode) {
                    return Err(Rejection::TargetLuxInAutomaticMode);
                }
            }
            DeviceCommand::SetControlMode(requested) => {
                let mode = mode.ok_or(Rejection::ModeUnknown)?;

                if !Self::can_submit_mode_switch(mode, *requested) {
                    return Err(Rejection::ModeAlreadyActive(mode));
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn affordances(mode: Option<ControlMode>) -> Affordances {
        match mode {
            Some(mode) => Affordances {
                target_lux: Self::can_submit_target_lux(mode),
                control_parameters: Self::can_submit_control_parameters(),
                switch_to_automatic: Self::can_submit_mode_switch(mode, ControlMode::Automatic),
                switch_to_manual: Self::can_submit_mode_switch(mode, ControlMode::Manual),
            },
            None => Affordances {
                target_lux: false,
                control_parameters: Self::can_submit_control_parameters(),
                switch_to_automatic: false,
                switch_to_manual: false,
            },
        }
    }
}
