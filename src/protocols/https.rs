use std::{io::BufReader, time::Duration};

use color_eyre::Result;
use eyre::eyre;
use hyper::{body::Bytes, Request, Response, Uri};
use serde::{Deserialize, Serialize};
use tokio_rustls::rustls;

use crate::{error::RequestError, settings::Settings};

pub type HyperHttpsClient = hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// HTTP(S) client bound to the configured per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpsClient {
    pub client: HyperHttpsClient,
    pub timeout: Duration,
}

fn mk_tls_config(ca_cert: &str) -> Result<rustls::ClientConfig> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(ca_cert.as_bytes()))?;

    let mut roots = rustls::RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(&certs);

    if added == 0 {
        return Err(eyre!(
            "No usable certificate found in http.ca_cert. Check your http.ca_cert config."
        ));
    }

    Ok(rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

pub fn mk_https_client(settings: &Settings) -> Result<HttpsClient> {
    mk_https_client_with(settings.http.ca_cert.as_deref(), settings.http.request_timeout())
}

pub fn mk_https_client_with(ca_cert: Option<&str>, timeout: Duration) -> Result<HttpsClient> {
    // Trust the configured CA when the controller serves a self signed
    // certificate, otherwise fall back to the bundled web roots.
    let https = match ca_cert {
        Some(ca_cert) => hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(mk_tls_config(ca_cert)?)
            .https_or_http()
            .enable_http1()
            .build(),
        None => hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build(),
    };

    let client = hyper::Client::builder().build(https);

    Ok(HttpsClient { client, timeout })
}

pub fn mk_uri(base_url: &str, path: &str) -> Result<Uri, RequestError> {
    let uri = format!("{}{}", base_url.trim_end_matches('/'), path);

    uri.parse()
        .map_err(|source| RequestError::InvalidUri { uri, source })
}

async fn send(
    client: &HttpsClient,
    uri: &Uri,
    request: Request<hyper::Body>,
) -> Result<Response<Bytes>, RequestError> {
    let exchange = async {
        let result = client.client.request(request).await?;
        let (parts, body) = result.into_parts();
        let body_bytes = hyper::body::to_bytes(body).await?;

        Ok::<_, hyper::Error>(Response::from_parts(parts, body_bytes))
    };

    match tokio::time::timeout(client.timeout, exchange).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(source)) => Err(RequestError::Network {
            uri: uri.to_string(),
            source,
        }),
        Err(_) => Err(RequestError::Timeout {
            uri: uri.to_string(),
            timeout: client.timeout,
        }),
    }
}

fn decode<T: for<'a> Deserialize<'a>>(uri: &Uri, response: Response<Bytes>) -> Result<T, RequestError> {
    let status = response.status();
    let mut body_bytes = response.into_body();

    if !status.is_success() {
        return Err(RequestError::Server {
            uri: uri.to_string(),
            status,
            message: String::from_utf8_lossy(&body_bytes).into_owned(),
        });
    }

    // Some acks come back with an empty body.
    if body_bytes.is_empty() {
        body_bytes = Bytes::from_static(b"null");
    }

    let de = &mut serde_json::Deserializer::from_slice(&body_bytes);

    serde_path_to_error::deserialize(de).map_err(|source| RequestError::Decode {
        uri: uri.to_string(),
        source,
    })
}

pub async fn mk_get_request<T: for<'a> Deserialize<'a>>(
    client: &HttpsClient,
    uri: &Uri,
) -> Result<T, RequestError> {
    let request = Request::builder()
        .method("GET")
        .header("accept", "application/json")
        .uri(uri)
        .body(hyper::Body::empty())?;

    let response = send(client, uri, request).await?;

    decode(uri, response)
}

pub async fn mk_post_request<RequestBody, ResponseBody>(
    client: &HttpsClient,
    uri: &Uri,
    body: &RequestBody,
) -> Result<ResponseBody, RequestError>
where
    RequestBody: Serialize,
    ResponseBody: for<'a> Deserialize<'a>,
{
    let body = serde_json::to_string(body)?;

    let request = Request::builder()
        .method("POST")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .uri(uri)
        .body(body.into())?;

    let response = send(client, uri, request).await?;

    decode(uri, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::test_server::{unreachable_base_url, Reply, TestServer};
    use serde_json::{json, Value};

    #[test]
    fn joins_base_url_and_path() {
        let uri = mk_uri("http://127.0.0.1:8000/", "/status").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8000/status");

        let err = mk_uri("http://bad host", "/status").unwrap_err();
        assert!(err.is_local());
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn posts_json_and_decodes_reply() {
        let server = TestServer::start(|_| Reply::ok(json!({"status": "success"}))).await;
        let client = server.client();

        let uri = mk_uri(&server.base_url(), "/set_target_lux").unwrap();
        let reply: Value = mk_post_request(&client, &uri, &json!({"target_lux": 550.0}))
            .await
            .unwrap();

        assert_eq!(reply["status"], "success");

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/set_target_lux");
        assert_eq!(requests[0].body, json!({"target_lux": 550.0}));
    }

    #[tokio::test]
    async fn non_success_status_is_a_server_error() {
        let server = TestServer::start(|_| {
            Reply::status(400, json!({"status": "error", "message": "bad mode"}))
        })
        .await;
        let client = server.client();

        let uri = mk_uri(&server.base_url(), "/status").unwrap();
        let err = mk_get_request::<Value>(&client, &uri).await.unwrap_err();

        match err {
            RequestError::Server { status, message, .. } => {
                assert_eq!(status, 400);
                assert!(message.contains("bad mode"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn decode_error_names_the_failing_field() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Lux {
            current_lux: f64,
        }

        let server = TestServer::start(|_| Reply::ok(json!({"current_lux": "dark"}))).await;
        let client = server.client();

        let uri = mk_uri(&server.base_url(), "/status").unwrap();
        let err = mk_get_request::<Lux>(&client, &uri).await.unwrap_err();

        assert!(!err.is_network());
        assert!(err.to_string().contains("current_lux"));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let client = TestServer::client_with_timeout(Duration::from_secs(2));

        let uri = mk_uri(&unreachable_base_url(), "/status").unwrap();
        let err = mk_get_request::<Value>(&client, &uri).await.unwrap_err();

        assert!(err.is_network(), "{err:?}");
    }
}
