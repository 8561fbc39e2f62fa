use std::sync::Arc;

use color_eyre::Result;
use console::{start_status_log_loop, Console};
use device::rest::Endpoints;
use log::info;
use panel::{
    dispatcher::CommandDispatcher, polling::start_status_poll_loop, store::StatusStore,
    SharedStore,
};
use protocols::https::mk_https_client;
use tokio::sync::RwLock;

use crate::settings::read_settings;

mod console;
mod device;
mod error;
mod panel;
mod protocols;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let settings = read_settings()?;
    let https_client = mk_https_client(&settings)?;
    let endpoints = Endpoints {
        controller: settings.controller.base_url.clone(),
        lights: settings.lights.base_url.clone(),
    };

    let store: SharedStore = Arc::new(RwLock::new(StatusStore::new()));
    let dispatcher = CommandDispatcher::new(&https_client, &endpoints, &store);

    info!(
        "Polling {} every {:?}",
        settings.controller.base_url,
        settings.controller.poll_interval()
    );

    let poller = start_status_poll_loop(
        &https_client,
        &endpoints,
        &store,
        settings.controller.poll_interval(),
    );
    start_status_log_loop(&store);

    let console = Console::new(
        settings.lights.devices.clone(),
        &store,
        &dispatcher,
        &https_client,
        &endpoints,
    );

    tokio::select! {
        result = console.run() => result?,
        result = tokio::signal::ctrl_c() => result?,
    }

    poller.stop().await;
    store.write().await.clear_drafts();

    Ok(())
}
