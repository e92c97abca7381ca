use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use futures::future::BoxFuture;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::FlowStorage;
use taskloom_core::types::{EdgeLabel, FlowEntry, NodeId};

type EntryKey = (NodeId, NodeId, EdgeLabel);

#[derive(Default)]
struct Inner {
    entries: Vec<FlowEntry>,
    by_key: HashMap<EntryKey, usize>,
    by_caller: HashMap<NodeId, Vec<usize>>,
    by_callee: HashMap<NodeId, Vec<usize>>,
}

/// Process-local flow storage: an append-only vector plus key, caller and
/// callee indices into it.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FlowStorage for InMemoryStorage {
    fn add_entry(&self, entry: FlowEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut inner = self.lock();
            let key = (entry.caller, entry.callee, entry.label);
            if inner.by_key.contains_key(&key) {
                return Err(TaskloomError::DuplicateEntry {
                    caller: entry.caller,
                    callee: entry.callee,
                    label: entry.label,
                });
            }

            let idx = inner.entries.len();
            inner.by_key.insert(key, idx);
            inner.by_caller.entry(entry.caller).or_default().push(idx);
            inner.by_callee.entry(entry.callee).or_default().push(idx);
            inner.entries.push(entry);
            Ok(())
        })
    }

    fn get_entry(
        &self,
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
    ) -> BoxFuture<'_, Result<Option<FlowEntry>>> {
        Box::pin(async move {
            let inner = self.lock();
            Ok(inner
                .by_key
                .get(&(caller, callee, label))
                .map(|&idx| inner.entries[idx].clone()))
        })
    }

    fn entries_by_caller(&self, caller: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>> {
        Box::pin(async move {
            let inner = self.lock();
            Ok(collect(&inner, inner.by_caller.get(&caller)))
        })
    }

    fn entries_by_callee(&self, callee: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>> {
        Box::pin(async move {
            let inner = self.lock();
            Ok(collect(&inner, inner.by_callee.get(&callee)))
        })
    }
}

fn collect(inner: &Inner, indices: Option<&Vec<usize>>) -> Vec<FlowEntry> {
    indices
        .map(|ids| ids.iter().map(|&i| inner.entries[i].clone()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(caller: u64, callee: u64, label: EdgeLabel, value: &str) -> FlowEntry {
        let mut data = serde_json::Map::new();
        data.insert("value".into(), serde_json::json!(value));
        FlowEntry {
            caller: NodeId(caller),
            callee: NodeId(callee),
            label,
            data,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_indices_keep_write_order() {
        let store = InMemoryStorage::new();
        store.add_entry(entry(1, 2, EdgeLabel::Default, "a")).await.unwrap();
        store.add_entry(entry(1, 3, EdgeLabel::Default, "b")).await.unwrap();
        store.add_entry(entry(4, 3, EdgeLabel::Approve, "c")).await.unwrap();

        let by_caller = store.entries_by_caller(NodeId(1)).await.unwrap();
        let callees: Vec<NodeId> = by_caller.iter().map(|e| e.callee).collect();
        assert_eq!(callees, vec![NodeId(2), NodeId(3)]);

        let by_callee = store.entries_by_callee(NodeId(3)).await.unwrap();
        let callers: Vec<NodeId> = by_callee.iter().map(|e| e.caller).collect();
        assert_eq!(callers, vec![NodeId(1), NodeId(4)]);

        assert!(store.entries_by_caller(NodeId(9)).await.unwrap().is_empty());
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = InMemoryStorage::new();
        store.add_entry(entry(1, 2, EdgeLabel::Default, "a")).await.unwrap();
        let err = store
            .add_entry(entry(1, 2, EdgeLabel::Default, "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskloomError::DuplicateEntry { .. }));

        // A different label is a different key.
        store.add_entry(entry(1, 2, EdgeLabel::Reject, "c")).await.unwrap();
        let kept = store
            .get_entry(NodeId(1), NodeId(2), EdgeLabel::Default)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.data["value"], "a");
    }
}
