use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use taskloom_core::error::Result;
use taskloom_core::traits::FlowStorage;
use taskloom_core::types::{EdgeLabel, EntryData, FlowEntry, NodeId};

/// Append-only record of data handed between nodes along edges.
///
/// Each entry is keyed by the exact `(caller, callee, label)` triple and is
/// never overwritten. Cloning a `FlowMemory` shares the underlying storage.
#[derive(Clone)]
pub struct FlowMemory {
    storage: Arc<dyn FlowStorage>,
}

impl FlowMemory {
    pub fn new(storage: Arc<dyn FlowStorage>) -> Self {
        Self { storage }
    }

    /// Record `data` passed from `caller` to `callee` under `label`.
    pub async fn add_entry(
        &self,
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
        data: EntryData,
    ) -> Result<()> {
        debug!(caller = %caller, callee = %callee, label = %label, "Flow entry written");
        self.storage
            .add_entry(FlowEntry {
                caller,
                callee,
                label,
                data,
                timestamp: Utc::now(),
            })
            .await
    }

    /// Data stored under exactly `(caller, callee, label)`.
    pub async fn get_data(
        &self,
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
    ) -> Result<Option<EntryData>> {
        Ok(self
            .storage
            .get_entry(caller, callee, label)
            .await?
            .map(|entry| entry.data))
    }

    pub async fn get_entries_by_caller(&self, caller: NodeId) -> Result<Vec<FlowEntry>> {
        self.storage.entries_by_caller(caller).await
    }

    pub async fn get_entries_by_callee(&self, callee: NodeId) -> Result<Vec<FlowEntry>> {
        self.storage.entries_by_callee(callee).await
    }

    /// Project entries onto the named fields (`caller`, `callee`, `label`,
    /// `data`, `timestamp`). Unknown field names are skipped.
    pub fn entries_mask(entries: &[FlowEntry], keys: &[&str]) -> Result<Vec<EntryData>> {
        entries
            .iter()
            .map(|entry| {
                let value = serde_json::to_value(entry)?;
                let mut projected = EntryData::new();
                if let serde_json::Value::Object(fields) = value {
                    for key in keys {
                        if let Some(v) = fields.get(*key) {
                            projected.insert((*key).to_string(), v.clone());
                        }
                    }
                }
                Ok(projected)
            })
            .collect()
    }
}
