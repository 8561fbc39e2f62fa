use std::time::Duration;

use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct ControllerSettings {
    pub base_url: String,
    pub poll_interval_ms: u64,
}

impl ControllerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct LightEntry {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct LightsSettings {
    pub base_url: String,

    #[serde(default = "default_light_entries")]
    pub devices: Vec<LightEntry>,
}

#[derive(Clone, Deserialize, Debug)]
pub struct HttpSettings {
    pub request_timeout_ms: u64,

    /// PEM encoded CA certificate to trust instead of the bundled web roots,
    /// for controllers serving a self signed certificate.
    pub ca_cert: Option<String>,
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub controller: ControllerSettings,
    pub lights: LightsSettings,
    pub http: HttpSettings,
}

fn default_light_entries() -> Vec<LightEntry> {
    [
        ("1", "Living Room Light"),
        ("2", "Bedroom Light"),
        ("3", "Kitchen Light"),
    ]
    .into_iter()
    .map(|(id, name)| LightEntry {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn settings_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
{
    config::Config::builder()
        .set_default("controller.base_url", "http://127.0.0.1:8000")?
        .set_default("controller.poll_interval_ms", 5000)?
        .set_default("lights.base_url", "http://127.0.0.1:4000")?
        .set_default("http.request_timeout_ms", 10_000)
}

pub fn read_settings() -> Result<Settings, config::ConfigError> {
    settings_builder()?
        .add_source(config::File::with_name("Settings").required(false))
        .add_source(
            config::Environment::with_prefix("LUX_PANEL")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Settings>()
}
