use crate::id_list::CompactIdList;
use crate::tree::SerializedTree;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use stubscope_api::models::{FileId, IndexKey, IndexValue};
use stubscope_api::{ApiError, ApiResult, StubIndexUpdater, StubStorage};

/// Tree store keyed by file id.
#[derive(Default)]
pub struct MemoryStubStorage {
    trees: DashMap<FileId, Arc<SerializedTree>>,
}

impl MemoryStubStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl StubStorage<SerializedTree> for MemoryStubStorage {
    fn load(&self, file_id: FileId) -> ApiResult<Option<Arc<SerializedTree>>> {
        Ok(self.trees.get(&file_id).map(|t| t.value().clone()))
    }

    fn add(&self, file_id: FileId, tree: Arc<SerializedTree>) -> ApiResult<()> {
        if self.trees.contains_key(&file_id) {
            return Err(ApiError::Storage(format!(
                "file {} already has stored stubs",
                file_id
            )));
        }
        self.trees.insert(file_id, tree);
        Ok(())
    }

    fn update(&self, file_id: FileId, tree: Arc<SerializedTree>) -> ApiResult<()> {
        match self.trees.get_mut(&file_id) {
            Some(mut slot) => {
                *slot = tree;
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("stubs of file {}", file_id))),
        }
    }

    fn remove(&self, file_id: FileId) -> ApiResult<()> {
        self.trees
            .remove(&file_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("stubs of file {}", file_id)))
    }

    fn file_ids(&self) -> ApiResult<Vec<FileId>> {
        let mut ids: Vec<FileId> = self.trees.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Global `key -> value -> files` index maintained from forward-index deltas.
#[derive(Default)]
pub struct MemoryStubIndex {
    entries: DashMap<IndexKey, HashMap<IndexValue, BTreeSet<FileId>>>,
}

impl MemoryStubIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_for(&self, key: &IndexKey, value: &IndexValue) -> Vec<FileId> {
        self.entries
            .get(key)
            .and_then(|values| values.get(value).map(|files| files.iter().copied().collect()))
            .unwrap_or_default()
    }

    /// Values currently associated with at least one file, sorted.
    pub fn values(&self, key: &IndexKey) -> Vec<IndexValue> {
        let mut values: Vec<IndexValue> = self
            .entries
            .get(key)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default();
        values.sort();
        values
    }
}

impl StubIndexUpdater<CompactIdList> for MemoryStubIndex {
    fn update_index(
        &self,
        key: &IndexKey,
        file_id: FileId,
        old: &HashMap<IndexValue, CompactIdList>,
        new: &HashMap<IndexValue, CompactIdList>,
    ) -> ApiResult<()> {
        let mut values = self.entries.entry(key.clone()).or_default();

        for value in old.keys().filter(|v| !new.contains_key(*v)) {
            if let Some(files) = values.get_mut(value) {
                files.remove(&file_id);
                if files.is_empty() {
                    values.remove(value);
                }
            }
        }
        for value in new.keys().filter(|v| !old.contains_key(*v)) {
            values.entry(value.clone()).or_default().insert(file_id);
        }

        let now_empty = values.is_empty();
        drop(values);
        if now_empty {
            self.entries.remove_if(key, |_, values| values.is_empty());
        }
        Ok(())
    }
}
