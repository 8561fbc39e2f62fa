use std::{
    fmt::Display,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, warn};
use tokio::{sync::RwLock, task::JoinHandle, time::MissedTickBehavior};

use super::{store::Seq, SharedStore};
use crate::{
    device::{
        rest::{get_device_status, Endpoints},
        status::DeviceStatus,
    },
    protocols::https::HttpsClient,
};

/// Handle to a running poll loop.
///
/// Stopping only prevents future callbacks, requests already in flight run to
/// completion and their results are dropped. Dropping the handle stops the
/// loop as well.
pub struct PollHandle {
    stopped: Arc<AtomicBool>,
    /// Read-held by every running `on_tick`.
    callbacks: Arc<RwLock<()>>,
    ticker: JoinHandle<()>,
}

impl PollHandle {
    /// Once this returns no `on_tick` call is running and none can start.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.ticker.abort();
        let _ = self.callbacks.write().await;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.ticker.abort();
    }
}

/// Calls `fetch` right away and then once per `period`, without waiting for
/// earlier fetches to finish, and hands every successful result to `on_tick`.
/// Failed fetches are logged and skipped.
pub fn start_poll_loop<T, E, Fetch, FetchFut, Tick, TickFut>(
    period: Duration,
    fetch: Fetch,
    on_tick: Tick,
) -> PollHandle
where
    T: Send + 'static,
    E: Display + Send + 'static,
    Fetch: Fn() -> FetchFut + Send + Sync + 'static,
    FetchFut: Future<Output = Result<T, E>> + Send + 'static,
    Tick: Fn(T) -> TickFut + Send + Sync + 'static,
    TickFut: Future<Output = ()> + Send + 'static,
{
    let stopped = Arc::new(AtomicBool::new(false));
    let callbacks = Arc::new(RwLock::new(()));
    let on_tick = Arc::new(on_tick);

    let ticker = {
        let stopped = stopped.clone();
        let callbacks = callbacks.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if stopped.load(Ordering::SeqCst) {
                    break;
                }

                let response = fetch();
                let stopped = stopped.clone();
                let callbacks = callbacks.clone();
                let on_tick = on_tick.clone();

                tokio::spawn(async move {
                    match response.await {
                        Ok(value) => {
                            let _running = callbacks.read().await;

                            if stopped.load(Ordering::SeqCst) {
                                debug!("Discarding poll result that arrived after the poller was stopped");
                                return;
                            }

                            on_tick(value).await;
                        }
                        Err(e) => {
                            warn!("Polling failed, keeping last known status: {}", e);
                        }
                    }
                });
            }
        })
    };

    PollHandle {
        stopped,
        callbacks,
        ticker,
    }
}

/// Periodically polls the controller's status into the store.
pub fn start_status_poll_loop(
    client: &HttpsClient,
    endpoints: &Endpoints,
    store: &SharedStore,
    period: Duration,
) -> PollHandle {
    let client = client.clone();
    let endpoints = endpoints.clone();
    let fetch_store = store.clone();
    let tick_store = store.clone();

    start_poll_loop(
        period,
        move || {
            let client = client.clone();
            let endpoints = endpoints.clone();
            let store = fetch_store.clone();

            async move {
                let issued = store.write().await.issue();
                let status = get_device_status(&client, &endpoints).await?;

                Ok::<(DeviceStatus, Seq), crate::error::RequestError>((status, issued))
            }
        },
        move |(status, issued)| {
            let store = tick_store.clone();

            async move {
                debug!("Polled status: {:?}", status);
                store.write().await.apply_polled(status, issued);
            }
        },
    )
}
