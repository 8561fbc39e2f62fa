use hyper::StatusCode;
use serde_json::Value;

use super::{
    command::{DeviceCommand, Service},
    light::LightId,
    status::DeviceStatus,
};
use crate::{
    error::RequestError,
    protocols::https::{mk_get_request, mk_post_request, mk_uri, HttpsClient},
};

/// Base urls of the two services a panel talks to.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub controller: String,
    pub lights: String,
}

impl Endpoints {
    fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Controller => &self.controller,
            Service::Lights => &self.lights,
        }
    }
}

/// Successful reply to a command.
#[derive(Clone, Debug, PartialEq)]
pub struct Acknowledged {
    /// Full device status, when the service echoed one back.
    pub status: Option<DeviceStatus>,
    pub body: Value,
}

pub async fn get_device_status(
    client: &HttpsClient,
    endpoints: &Endpoints,
) -> Result<DeviceStatus, RequestError> {
    let uri = mk_uri(&endpoints.controller, "/status")?;

    mk_get_request(client, &uri).await
}

pub async fn post_device_command(
    client: &HttpsClient,
    endpoints: &Endpoints,
    command: &DeviceCommand,
) -> Result<Acknowledged, RequestError> {
    let (service, path) = command.endpoint();
    let uri = mk_uri(endpoints.base_url(service), path)?;
    let body = command.body()?;

    let response: Value = mk_post_request(client, &uri, &body).await?;

    // Both services answer validation failures with {"status": "error"}, some
    // of them with a 2xx status code.
    if response.get("status").and_then(Value::as_str) == Some("error") {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        return Err(RequestError::Server {
            uri: uri.to_string(),
            status: StatusCode::OK,
            message,
        });
    }

    let status = serde_json::from_value::<DeviceStatus>(response.clone()).ok();

    Ok(Acknowledged {
        status,
        body: response,
    })
}

pub async fn get_usage_history(
    client: &HttpsClient,
    endpoints: &Endpoints,
    light: &LightId,
) -> Result<Vec<String>, RequestError> {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("id", &light.0)
        .finish();
    let uri = mk_uri(&endpoints.lights, &format!("/api/usage-history?{}", query))?;

    mk_get_request(client, &uri).await
}
