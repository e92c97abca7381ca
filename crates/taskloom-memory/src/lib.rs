pub mod flow;
pub mod mem;
pub mod store;

use std::sync::Arc;

use taskloom_core::config::{MemoryConfig, StorageBackend};
use taskloom_core::error::Result;
use taskloom_core::traits::FlowStorage;
use taskloom_core::types::RunId;

pub use flow::FlowMemory;
pub use mem::InMemoryStorage;
pub use store::SqliteStorage;

/// Open the storage backend selected by `[memory]` config for one run.
pub fn open_storage(config: &MemoryConfig, run_id: &RunId) -> Result<Arc<dyn FlowStorage>> {
    match config.backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryStorage::new())),
        StorageBackend::Sqlite => Ok(Arc::new(
            SqliteStorage::open(&config.resolved_path())?.with_run(run_id.0.clone()),
        )),
    }
}
