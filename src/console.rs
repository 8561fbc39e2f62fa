//! Line based operator console: reads edits and commands from stdin, prints
//! the status view and the outcome of every dispatch.

use color_eyre::Result;
use log::{info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    device::{
        command::{DeviceCommand, DraftKind},
        light::{
            parse_schedule, LightColor, LightId, PowerState, MAX_COLOR_TEMPERATURE,
            MIN_COLOR_TEMPERATURE,
        },
        rest::{get_usage_history, Endpoints},
        status::{ControlMode, ControlParameters},
    },
    error::ValidationError,
    panel::{
        dispatcher::CommandDispatcher,
        store::{PendingEdit, StatusView},
        SharedStore,
    },
    protocols::https::HttpsClient,
    settings::LightEntry,
};

const HELP: &str = "\
status                          show current status
target <lux>                    set target illuminance (manual mode only)
pid <kp> <ki> <kd>              set control law gains
retry target|pid                resend an unsent edit
discard                         drop all unsent edits
mode automatic|manual           switch control mode
lights                          list lights
light <id> on|off|toggle        switch a light
light <id> intensity <0-100>    set intensity
light <id> temp <2700-6500>     set color temperature
light <id> color <#rrggbb>      set color
light <id> schedule <rfc3339>   set schedule
light <id> history              show usage history
help                            show this help
quit                            exit";

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown command {0:?}, try help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Show,
    Help,
    Quit,
    ListLights,
    Discard,
    /// Store the edit as a draft, then send it.
    Edit(PendingEdit),
    Retry(DraftKind),
    Send(DeviceCommand),
    Toggle(LightId),
    History(LightId),
}

fn parse_number(field: &'static str, input: &str) -> Result<f64, ValidationError> {
    input
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber {
            field,
            input: input.to_string(),
        })
}

fn parse_integer(field: &'static str, input: &str, min: i64, max: i64) -> Result<i64, ValidationError> {
    let value = input
        .parse::<i64>()
        .map_err(|_| ValidationError::NotANumber {
            field,
            input: input.to_string(),
        })?;

    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min: min as f64,
            max: max as f64,
            value: value as f64,
        });
    }

    Ok(value)
}

pub fn parse_line(line: &str, lights: &[LightEntry]) -> Result<ConsoleAction, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let action = match words.as_slice() {
        [] | ["status"] => ConsoleAction::Show,
        ["help"] => ConsoleAction::Help,
        ["quit"] | ["exit"] => ConsoleAction::Quit,
        ["lights"] => ConsoleAction::ListLights,
        ["discard"] => ConsoleAction::Discard,
        ["target", lux] => {
            ConsoleAction::Edit(PendingEdit::TargetLux(parse_number("target lux", lux)?))
        }
        ["target", ..] => return Err(ParseError::Usage("target <lux>")),
        ["pid", kp, ki, kd] => ConsoleAction::Edit(PendingEdit::ControlParameters(
            ControlParameters::new(
                parse_number("Kp", kp)?,
                parse_number("Ki", ki)?,
                parse_number("Kd", kd)?,
            ),
        )),
        ["pid", ..] => return Err(ParseError::Usage("pid <kp> <ki> <kd>")),
        ["retry", "target"] => ConsoleAction::Retry(DraftKind::TargetLux),
        ["retry", "pid"] => ConsoleAction::Retry(DraftKind::ControlParameters),
        ["retry", ..] => return Err(ParseError::Usage("retry target|pid")),
        ["mode", mode] => ConsoleAction::Send(DeviceCommand::SetControlMode(
            mode.parse::<ControlMode>()?,
        )),
        ["mode", ..] => return Err(ParseError::Usage("mode automatic|manual")),
        ["light", id, rest @ ..] => {
            let light = lights
                .iter()
                .find(|l| l.id == *id)
                .map(|l| LightId(l.id.clone()))
                .ok_or_else(|| ValidationError::UnknownLight(id.to_string()))?;

            parse_light_action(light, rest)?
        }
        [other, ..] => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(action)
}

fn parse_light_action(light: LightId, words: &[&str]) -> Result<ConsoleAction, ParseError> {
    let action = match words {
        ["toggle"] => ConsoleAction::Toggle(light),
        ["history"] => ConsoleAction::History(light),
        ["on"] | ["off"] => ConsoleAction::Send(DeviceCommand::ToggleState {
            light,
            state: words[0].parse::<PowerState>()?,
        }),
        ["intensity", value] => ConsoleAction::Send(DeviceCommand::SetIntensity {
            light,
            intensity: parse_integer("intensity", value, 0, 100)? as u8,
        }),
        ["temp", value] => ConsoleAction::Send(DeviceCommand::SetColorTemperature {
            light,
            kelvin: parse_integer(
                "color temperature",
                value,
                i64::from(MIN_COLOR_TEMPERATURE),
                i64::from(MAX_COLOR_TEMPERATURE),
            )? as u16,
        }),
        ["color", value] => ConsoleAction::Send(DeviceCommand::SetColor {
            light,
            color: value.parse::<LightColor>()?,
        }),
        ["schedule", value] => ConsoleAction::Send(DeviceCommand::SetSchedule {
            light,
            at: parse_schedule(value)?,
        }),
        _ => {
            return Err(ParseError::Usage(
                "light <id> on|off|toggle|intensity|temp|color|schedule|history",
            ))
        }
    };

    Ok(action)
}

fn fmt_lux(lux: Option<f64>) -> String {
    lux.map(|lux| format!("{lux} lx"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_view(view: &StatusView) -> String {
    let Some(status) = &view.status else {
        return "Waiting for first status from controller".to_string();
    };

    let draft_marker = |is_draft: bool| if is_draft { " (unsent)" } else { "" };
    let enabled = |enabled: bool| if enabled { "" } else { " (read-only)" };

    let parameters = view
        .control_parameters
        .map(|p| format!("Kp {} Ki {} Kd {}", p.kp, p.ki, p.kd))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "Current lux: {}\nTarget lux: {}{}{}\nBrightness: {}%\nControl mode: {}\nPID: {}{}",
        fmt_lux(status.current_lux),
        fmt_lux(view.target_lux),
        draft_marker(view.target_lux_is_draft),
        enabled(view.affordances.target_lux),
        status.brightness,
        status.control_mode,
        parameters,
        draft_marker(view.control_parameters_is_draft),
    )
}

pub struct Console {
    lights: Vec<LightEntry>,
    store: SharedStore,
    dispatcher: CommandDispatcher,
    client: HttpsClient,
    endpoints: Endpoints,
}

impl Console {
    pub fn new(
        lights: Vec<LightEntry>,
        store: &SharedStore,
        dispatcher: &CommandDispatcher,
        client: &HttpsClient,
        endpoints: &Endpoints,
    ) -> Self {
        Console {
            lights,
            store: store.clone(),
            dispatcher: dispatcher.clone(),
            client: client.clone(),
            endpoints: endpoints.clone(),
        }
    }

    /// Sends a command in the background so the console keeps reading input.
    fn spawn_dispatch(&self, command: DeviceCommand) {
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let description = format!("{:?}", command);

            match dispatcher.dispatch(command).await {
                Ok(ack) if ack.body.is_null() => println!("OK: {}", description),
                Ok(ack) => println!("OK: {} {}", description, ack.body),
                Err(e) => println!("FAILED: {}: {}", description, e),
            }
        });
    }

    async fn handle(&self, action: ConsoleAction) -> bool {
        match action {
            ConsoleAction::Show => {
                let view = self.store.read().await.view();
                println!("{}", render_view(&view));
            }
            ConsoleAction::Help => println!("{}", HELP),
            ConsoleAction::Quit => return false,
            ConsoleAction::ListLights => {
                let store = self.store.read().await;

                for light in &self.lights {
                    let state = store.light(&LightId(light.id.clone()));
                    println!("{}: {} {:?}", light.id, light.name, state);
                }
            }
            ConsoleAction::Discard => self.store.write().await.clear_drafts(),
            ConsoleAction::Edit(edit) => {
                self.store.write().await.set_draft(edit);
                self.spawn_dispatch(edit.to_command());
            }
            ConsoleAction::Retry(kind) => {
                let draft = self.store.read().await.draft(kind);

                match draft {
                    Some(edit) => self.spawn_dispatch(edit.to_command()),
                    None => println!("Nothing to resend"),
                }
            }
            ConsoleAction::Send(command) => self.spawn_dispatch(command),
            ConsoleAction::Toggle(light) => {
                // Lights start out off until the light service acknowledges otherwise.
                let current = self
                    .store
                    .read()
                    .await
                    .light(&light)
                    .and_then(|l| l.power)
                    .unwrap_or(PowerState::Off);

                self.spawn_dispatch(DeviceCommand::ToggleState {
                    light,
                    state: current.toggled(),
                });
            }
            ConsoleAction::History(light) => {
                match get_usage_history(&self.client, &self.endpoints, &light).await {
                    Ok(history) if history.is_empty() => println!("No usage history for {}", light),
                    Ok(history) => history.iter().for_each(|entry| println!("{}", entry)),
                    Err(e) => println!("FAILED: usage history for {}: {}", light, e),
                }
            }
        }

        true
    }

    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{}", HELP);

        while let Some(line) = lines.next_line().await? {
            match parse_line(&line, &self.lights) {
                Ok(action) => {
                    if !self.handle(action).await {
                        break;
                    }
                }
                Err(e) => println!("{}", e),
            }
        }

        Ok(())
    }
}

/// Logs the status view whenever something displayed changes.
pub fn start_status_log_loop(store: &SharedStore) {
    let store = store.clone();

    tokio::spawn(async move {
        let mut revisions = store.read().await.subscribe();
        let mut previous = None;

        while revisions.changed().await.is_ok() {
            let view = store.read().await.view();

            if previous.as_ref() != Some(&view) {
                info!("{}", render_view(&view).replace('\n', ", "));
                previous = Some(view);
            }
        }

        warn!("Status store closed, no longer logging status changes");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::status::DeviceStatus,
        panel::gate::CommandGate,
    };

    fn lights() -> Vec<LightEntry> {
        vec![LightEntry {
            id: "1".to_string(),
            name: "Living Room Light".to_string(),
        }]
    }

    #[test]
    fn parses_controller_edits() {
        assert_eq!(
            parse_line("target 550", &lights()),
            Ok(ConsoleAction::Edit(PendingEdit::TargetLux(550.0)))
        );
        assert_eq!(
            parse_line("pid 1.2 0.2 0.05", &lights()),
            Ok(ConsoleAction::Edit(PendingEdit::ControlParameters(
                ControlParameters::new(1.2, 0.2, 0.05)
            )))
        );
        assert_eq!(
            parse_line("mode Manual", &lights()),
            Ok(ConsoleAction::Send(DeviceCommand::SetControlMode(
                ControlMode::Manual
            )))
        );
        assert_eq!(
            parse_line("retry pid", &lights()),
            Ok(ConsoleAction::Retry(DraftKind::ControlParameters))
        );
    }

    #[test]
    fn non_numeric_input_is_a_validation_error() {
        assert_eq!(
            parse_line("target bright", &lights()),
            Err(ParseError::Validation(ValidationError::NotANumber {
                field: "target lux",
                input: "bright".to_string()
            }))
        );
        assert!(matches!(
            parse_line("pid 1 x 0", &lights()),
            Err(ParseError::Validation(_))
        ));
        assert_eq!(
            parse_line("pid 1 2", &lights()),
            Err(ParseError::Usage("pid <kp> <ki> <kd>"))
        );
    }

    #[test]
    fn parses_light_commands() {
        let light = LightId::from("1");

        assert_eq!(
            parse_line("light 1 intensity 40", &lights()),
            Ok(ConsoleAction::Send(DeviceCommand::SetIntensity {
                light: light.clone(),
                intensity: 40
            }))
        );
        assert_eq!(
            parse_line("light 1 off", &lights()),
            Ok(ConsoleAction::Send(DeviceCommand::ToggleState {
                light: light.clone(),
                state: PowerState::Off
            }))
        );
        assert_eq!(
            parse_line("light 1 toggle", &lights()),
            Ok(ConsoleAction::Toggle(light.clone()))
        );
        assert!(matches!(
            parse_line("light 1 color #f1c40f", &lights()),
            Ok(ConsoleAction::Send(DeviceCommand::SetColor { .. }))
        ));
        assert!(matches!(
            parse_line("light 1 schedule 2026-10-16T18:30:00Z", &lights()),
            Ok(ConsoleAction::Send(DeviceCommand::SetSchedule { .. }))
        ));
    }

    #[test]
    fn rejects_bad_light_input() {
        assert_eq!(
            parse_line("light 9 on", &lights()),
            Err(ParseError::Validation(ValidationError::UnknownLight(
                "9".to_string()
            )))
        );
        assert!(matches!(
            parse_line("light 1 intensity 150", &lights()),
            Err(ParseError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(matches!(
            parse_line("light 1 temp 9000", &lights()),
            Err(ParseError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(matches!(
            parse_line("light 1 color yellow", &lights()),
            Err(ParseError::Validation(ValidationError::InvalidColor(_)))
        ));
        assert_eq!(
            parse_line("dim", &lights()),
            Err(ParseError::Unknown("dim".to_string()))
        );
    }

    #[test]
    fn renders_read_only_target_in_automatic_mode() {
        let view = StatusView {
            status: Some(DeviceStatus {
                current_lux: Some(420.0),
                target_lux: Some(500.0),
                brightness: 65.0,
                control_mode: ControlMode::Automatic,
            }),
            target_lux: Some(500.0),
            target_lux_is_draft: false,
            control_parameters: None,
            control_parameters_is_draft: false,
            affordances: CommandGate::affordances(Some(ControlMode::Automatic)),
        };

        let rendered = render_view(&view);
        assert!(rendered.contains("Current lux: 420 lx"));
        assert!(rendered.contains("Target lux: 500 lx (read-only)"));
        assert!(rendered.contains("Control mode: automatic"));
    }
}
