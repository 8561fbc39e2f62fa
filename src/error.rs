use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

/// Failure of a single HTTP exchange with the controller or the light service.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("could not reach {uri}: {source}")]
    Network {
        uri: String,
        #[source]
        source: hyper::Error,
    },
    #[error("request to {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
    #[error("{uri} responded with {status}: {message}")]
    Server {
        uri: String,
        status: StatusCode,
        message: String,
    },
    #[error("invalid response body from {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("invalid request uri {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },
    #[error("failed to build request: {0}")]
    Build(#[from] hyper::http::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RequestError {
    /// True when the service could not be reached at all, as opposed to the
    /// service answering with something we could not accept.
    pub fn is_network(&self) -> bool {
        matches!(self, RequestError::Network { .. } | RequestError::Timeout { .. })
    }

    /// True when the request never left this process, e.g. a malformed base url.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            RequestError::InvalidUri { .. } | RequestError::Build(_) | RequestError::Encode(_)
        )
    }
}

/// Malformed local input. Raised before any network call is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a number, got {input:?}")]
    NotANumber { field: &'static str, input: String },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("invalid color {0:?}, expected #rgb or #rrggbb")]
    InvalidColor(String),
    #[error("invalid schedule {0:?}, expected an RFC 3339 timestamp")]
    InvalidSchedule(String),
    #[error("invalid control mode {0:?}, expected automatic or manual")]
    InvalidMode(String),
    #[error("invalid light state {0:?}, expected on or off")]
    InvalidPowerState(String),
    #[error("unknown light {0:?}")]
    UnknownLight(String),
}

/// Why the current control mode does not allow a command to be sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("target illuminance can only be changed in manual mode")]
    TargetLuxInAutomaticMode,
    #[error("control mode is already {0}")]
    ModeAlreadyActive(crate::device::status::ControlMode),
    #[error("no status has been received yet, control mode is unknown")]
    ModeUnknown,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("network error: {0}")]
    Network(#[source] RequestError),
    #[error("server error: {0}")]
    Server(#[source] RequestError),
    #[error("could not prepare request: {0}")]
    Request(#[source] RequestError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("superseded by a newer command for the same field")]
    Superseded,
}

impl From<RequestError> for DispatchError {
    fn from(e: RequestError) -> Self {
        if e.is_network() {
            DispatchError::Network(e)
        } else if e.is_local() {
            DispatchError::Request(e)
        } else {
            DispatchError::Server(e)
        }
    }
}
