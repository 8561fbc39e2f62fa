use std::sync::Arc;

use tokio::sync::RwLock;

use self::store::StatusStore;

pub mod dispatcher;
pub mod gate;
pub mod polling;
pub mod store;

pub type SharedStore = Arc<RwLock<StatusStore>>;
