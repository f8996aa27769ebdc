//! Per-file incremental diff between the stored and the freshly built tree.

use crate::error::Result;
use crate::id_list::CompactIdList;
use crate::tree::forward_index::{EMPTY_FORWARD_INDEX, EMPTY_VALUE_MAP};
use crate::tree::{ForwardIndex, SerializedTree, TreeEquality, ValueMap};
use std::collections::HashSet;
use std::sync::Arc;
use stubscope_api::models::{FileId, IndexKey};
use stubscope_api::{StubIndexUpdater, StubStorage};

/// One `(key, old, new)` triple handed to the index updater.
#[derive(Debug, PartialEq)]
pub struct IndexDelta<'a> {
    pub key: &'a IndexKey,
    pub old: &'a ValueMap,
    pub new: &'a ValueMap,
}

/// Every key present on either side, exactly once. A side lacking the key
/// contributes an empty map.
pub fn diff_forward_indices<'a>(
    old: &'a ForwardIndex,
    new: &'a ForwardIndex,
) -> Vec<IndexDelta<'a>> {
    let mut seen: HashSet<&IndexKey> = HashSet::with_capacity(old.len() + new.len());
    old.keys()
        .chain(new.keys())
        .filter(|key| seen.insert(*key))
        .map(|key| IndexDelta {
            key,
            old: old.get(key).unwrap_or(&*EMPTY_VALUE_MAP),
            new: new.get(key).unwrap_or(&*EMPTY_VALUE_MAP),
        })
        .collect()
}

/// Diff state for one file: its id and whatever tree storage held for it.
pub struct StubTreeDiff {
    file_id: FileId,
    current: Option<Arc<SerializedTree>>,
}

impl StubTreeDiff {
    pub fn new(file_id: FileId, current: Option<Arc<SerializedTree>>) -> Self {
        Self { file_id, current }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Bring storage and the index in line with `new`. Returns whether anything changed.
    ///
    /// Both forward indices are decoded before anything is touched, so a
    /// malformed sidecar leaves storage as it was. The index is updated first;
    /// if that or the storage write fails, the index is rolled back and the
    /// stored tree restored.
    pub fn differentiate(
        &self,
        new: Option<Arc<SerializedTree>>,
        storage: &dyn StubStorage<SerializedTree>,
        index: &dyn StubIndexUpdater<CompactIdList>,
    ) -> Result<bool> {
        let file_id = self.file_id;
        match (self.current.as_ref(), new) {
            (None, None) => {
                tracing::trace!("File {} has no stubs before or after", file_id);
                Ok(false)
            }
            (Some(old), None) => {
                let old_index = old.forward_index()?;
                tracing::debug!("Removing stubs of file {}", file_id);
                self.commit(old_index, &EMPTY_FORWARD_INDEX, index, || {
                    Ok(storage.remove(file_id)?)
                })?;
                Ok(true)
            }
            (None, Some(new)) => {
                let new_index = new.forward_index()?;
                tracing::debug!("Adding stubs of file {}", file_id);
                self.commit(&EMPTY_FORWARD_INDEX, new_index, index, || {
                    Ok(storage.add(file_id, new.clone())?)
                })?;
                Ok(true)
            }
            (Some(old), Some(new)) => {
                if old.compare(&new) == TreeEquality::Equal {
                    tracing::trace!("Stubs of file {} are unchanged", file_id);
                    return Ok(false);
                }
                let old_index = old.forward_index()?;
                let new_index = new.forward_index()?;
                tracing::debug!(
                    "Replacing stubs of file {} ({} -> {} bytes)",
                    file_id,
                    old.tree_len(),
                    new.tree_len()
                );
                self.commit(old_index, new_index, index, || {
                    storage.remove(file_id)?;
                    if let Err(e) = storage.add(file_id, new.clone()) {
                        if let Err(restore) = storage.add(file_id, old.clone()) {
                            tracing::error!(
                                "Lost stored stubs of file {}: {}",
                                file_id,
                                restore
                            );
                        }
                        return Err(e.into());
                    }
                    Ok(())
                })?;
                Ok(true)
            }
        }
    }

    fn commit(
        &self,
        old: &ForwardIndex,
        new: &ForwardIndex,
        index: &dyn StubIndexUpdater<CompactIdList>,
        store: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let Err(e) = self.update_index(old, new, index).and_then(|()| store()) else {
            return Ok(());
        };
        tracing::warn!("Rolling back index of file {}: {}", self.file_id, e);
        if let Err(undo) = self.update_index(new, old, index) {
            tracing::error!("Index of file {} may be stale: {}", self.file_id, undo);
        }
        Err(e)
    }

    fn update_index(
        &self,
        old: &ForwardIndex,
        new: &ForwardIndex,
        index: &dyn StubIndexUpdater<CompactIdList>,
    ) -> Result<()> {
        for delta in diff_forward_indices(old, new) {
            index.update_index(delta.key, self.file_id, delta.old, delta.new)?;
        }
        Ok(())
    }
}
