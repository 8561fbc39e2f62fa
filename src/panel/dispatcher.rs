use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::{debug, error, info};
use tokio::sync::Mutex;

use super::{gate::CommandGate, SharedStore};
use crate::{
    device::{
        command::{CommandField, DeviceCommand},
        rest::{post_device_command, Acknowledged, Endpoints},
    },
    error::DispatchError,
    protocols::https::HttpsClient,
};

/// Per-field queue. `latest` is the stamp of the most recent submission for
/// the field; a queued command whose stamp is older by the time its turn
/// comes has been superseded.
#[derive(Default)]
struct FieldQueue {
    turn: Mutex<()>,
    latest: AtomicU64,
}

/// Sends commands to the controller and the light service, one at a time per
/// field, and folds successful acknowledgements back into the store.
#[derive(Clone)]
pub struct CommandDispatcher {
    client: HttpsClient,
    endpoints: Endpoints,
    store: SharedStore,
    queues: Arc<Mutex<HashMap<CommandField, Arc<FieldQueue>>>>,
}

impl CommandDispatcher {
    pub fn new(client: &HttpsClient, endpoints: &Endpoints, store: &SharedStore) -> Self {
        CommandDispatcher {
            client: client.clone(),
            endpoints: endpoints.clone(),
            store: store.clone(),
            queues: Default::default(),
        }
    }

    async fn queue(&self, field: &CommandField) -> Arc<FieldQueue> {
        let mut queues = self.queues.lock().await;
        queues.entry(field.clone()).or_default().clone()
    }

    pub async fn dispatch(&self, command: DeviceCommand) -> Result<Acknowledged, DispatchError> {
        command.validate()?;

        let queue = self.queue(&command.field()).await;
        let submitted = self.store.write().await.issue();
        queue.latest.fetch_max(submitted.0, Ordering::SeqCst);

        let _turn = queue.turn.lock().await;

        if queue.latest.load(Ordering::SeqCst) != submitted.0 {
            debug!("Dropping {:?}, superseded by a newer command", command);
            return Err(DispatchError::Superseded);
        }

        // Polls may have changed the mode since the command was submitted.
        let sent = {
            let mut store = self.store.write().await;
            CommandGate::check(&command, store.control_mode())?;
            store.issue()
        };

        let ack = match post_device_command(&self.client, &self.endpoints, &command).await {
            Ok(ack) => ack,
            Err(e) => {
                error!("Failed to send {:?}: {}", command, e);
                return Err(e.into());
            }
        };

        let mut store = self.store.write().await;

        if let Some(kind) = command.draft_kind() {
            store.settle_draft(kind, sent);
        }

        store.record_acknowledged(&command, sent);

        if let Some(status) = &ack.status {
            if !store.apply_acknowledged(status.clone(), sent) {
                debug!("Ignoring status in ack of {:?}, a newer poll is displayed", command);
            }
        }

        info!("{:?} acknowledged", command);

        Ok(ack)
    }
}
