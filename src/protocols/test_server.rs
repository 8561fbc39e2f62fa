//! Throwaway local HTTP server standing in for the controller and light
//! services in tests.

use std::{
    convert::Infallible,
    net::{SocketAddr, TcpListener},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use super::https::{mk_https_client_with, HttpsClient};

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
}

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::status(200, body)
    }

    pub fn status(status: u16, body: Value) -> Self {
        Reply {
            status,
            body,
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type Handler = dyn Fn(&RecordedRequest) -> Reply + Send + Sync;

struct ServerState {
    handler: Box<Handler>,
    requests: Mutex<Vec<RecordedRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    _shutdown: oneshot::Sender<()>,
}

async fn handle(
    request: Request<Body>,
    state: Arc<ServerState>,
) -> Result<Response<Body>, Infallible> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let bytes = hyper::body::to_bytes(request.into_body())
        .await
        .unwrap_or_default();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    let recorded = RecordedRequest {
        method,
        path,
        query,
        body,
    };
    let reply = (state.handler)(&recorded);
    state.requests.lock().await.push(recorded);

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    let response = Response::builder()
        .status(reply.status)
        .header("content-type", "application/json")
        .body(Body::from(reply.body.to_string()))
        .unwrap();

    Ok(response)
}

impl TestServer {
    pub async fn start<F>(handler: F) -> TestServer
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(ServerState {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });

        let make_svc = {
            let state = state.clone();
            make_service_fn(move |_conn| {
                let state = state.clone();
                async move {
                    Ok::<_, Infallible>(service_fn(move |request| {
                        handle(request, state.clone())
                    }))
                }
            })
        };

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.with_graceful_shutdown(async move {
            rx.await.ok();
        }));

        TestServer {
            addr,
            state,
            _shutdown: tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> HttpsClient {
        TestServer::client_with_timeout(Duration::from_secs(5))
    }

    pub fn client_with_timeout(timeout: Duration) -> HttpsClient {
        mk_https_client_with(None, timeout).unwrap()
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Base url of a port nothing is listening on.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}", addr)
}
