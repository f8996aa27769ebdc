use crate::diff::StubTreeDiff;
use crate::error::{Result, StubIndexError};
use crate::id_list::CompactIdList;
use crate::serialization::SerializationManager;
use crate::tree::{ForwardIndexCodec, SerializedTree};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use stubscope_api::models::{FileId, StubNode};
use stubscope_api::{StubIndexUpdater, StubStorage};

pub type TreeStorage = dyn StubStorage<SerializedTree>;
pub type TreeIndex = dyn StubIndexUpdater<CompactIdList>;

/// Drives parsed stub trees through serialization, storage and the index.
#[derive(Clone)]
pub struct StubUpdater {
    manager: Arc<SerializationManager>,
    codec: Arc<dyn ForwardIndexCodec>,
    storage: Arc<TreeStorage>,
    index: Arc<TreeIndex>,
}

/// Outcome of one [`StubUpdater::index_all`] batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub changed: Vec<FileId>,
    pub unchanged: Vec<FileId>,
    pub failed: Vec<(FileId, StubIndexError)>,
}

impl StubUpdater {
    pub fn new(
        manager: Arc<SerializationManager>,
        codec: Arc<dyn ForwardIndexCodec>,
        storage: Arc<TreeStorage>,
        index: Arc<TreeIndex>,
    ) -> Self {
        Self {
            manager,
            codec,
            storage,
            index,
        }
    }

    pub fn manager(&self) -> &Arc<SerializationManager> {
        &self.manager
    }

    pub fn codec(&self) -> &Arc<dyn ForwardIndexCodec> {
        &self.codec
    }

    pub fn storage(&self) -> &Arc<TreeStorage> {
        &self.storage
    }

    /// Index the latest parse of one file. `None` means the file has no stubs
    /// any more. Returns whether storage or the index changed.
    pub fn index_file(&self, file_id: FileId, root: Option<StubNode>) -> Result<bool> {
        let new = root
            .map(|root| SerializedTree::from_stub(root, &self.manager, self.codec.clone()))
            .transpose()?
            .map(Arc::new);
        let current = self.storage.load(file_id)?;

        StubTreeDiff::new(file_id, current).differentiate(new, &*self.storage, &*self.index)
    }

    /// Index a batch in parallel. A file listed twice keeps its last entry,
    /// so no two workers ever diff the same file.
    pub fn index_all(&self, batch: Vec<(FileId, Option<StubNode>)>) -> BatchReport {
        let mut latest: HashMap<FileId, Option<StubNode>> = HashMap::with_capacity(batch.len());
        for (file_id, root) in batch {
            latest.insert(file_id, root);
        }
        tracing::info!("Indexing stubs of {} files", latest.len());

        let mut outcomes: Vec<(FileId, Result<bool>)> = latest
            .into_par_iter()
            .map(|(file_id, root)| (file_id, self.index_file(file_id, root)))
            .collect();
        outcomes.sort_by_key(|(file_id, _)| *file_id);
        self.manager.flush();

        let mut report = BatchReport::default();
        for (file_id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.changed.push(file_id),
                Ok(false) => report.unchanged.push(file_id),
                Err(e) => {
                    tracing::warn!("Failed to index stubs of file {}: {}", file_id, e);
                    report.failed.push((file_id, e));
                }
            }
        }
        tracing::info!(
            "Stub indexing finished: {} changed, {} unchanged, {} failed",
            report.changed.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        report
    }

    /// Rewrite every stored tree into `target`'s id space and return an updater
    /// bound to it. Files whose trees cannot be read are skipped and reported.
    /// Storage is only written once every other tree has been rewritten.
    pub fn migrate(
        &self,
        target: Arc<SerializationManager>,
        target_codec: Arc<dyn ForwardIndexCodec>,
    ) -> Result<(StubUpdater, Vec<FileId>)> {
        self.manager.share_serializers_with(&target);

        let mut skipped = Vec::new();
        let file_ids = self.storage.file_ids()?;
        let mut moved = Vec::with_capacity(file_ids.len());
        for &file_id in &file_ids {
            let Some(tree) = self.storage.load(file_id)? else {
                continue;
            };
            match tree.re_serialize(
                &self.manager,
                &target,
                &**tree.index_codec(),
                target_codec.clone(),
            ) {
                Ok(tree) => moved.push((file_id, Arc::new(tree))),
                Err(StubIndexError::SerializationUnavailable) => {
                    return Err(StubIndexError::SerializationUnavailable);
                }
                Err(e) => {
                    tracing::warn!("Skipping stubs of file {} during migration: {}", file_id, e);
                    skipped.push(file_id);
                }
            }
        }
        target.flush();

        let migrated = moved.len();
        for (file_id, tree) in moved {
            self.storage.update(file_id, tree)?;
        }
        tracing::info!(
            "Migrated stubs of {} files ({} skipped)",
            migrated,
            skipped.len()
        );

        let updater = StubUpdater::new(
            target,
            target_codec,
            self.storage.clone(),
            self.index.clone(),
        );
        Ok((updater, skipped))
    }

    /// Repair a corrupted manager. Trees stored before the repair use the
    /// discarded id space, so they are dropped together with their index
    /// entries. Returns the files that need reindexing.
    pub fn recover(&self) -> Result<Vec<FileId>> {
        if !self.manager.is_corrupted() {
            return Ok(Vec::new());
        }
        self.manager.repair()?;
        let stale = self.storage.file_ids()?;
        for &file_id in &stale {
            let current = self.storage.load(file_id)?;
            StubTreeDiff::new(file_id, current).differentiate(
                None,
                &*self.storage,
                &*self.index,
            )?;
        }
        if !stale.is_empty() {
            tracing::warn!(
                "Dropped stubs of {} files after dictionary repair; they need reindexing",
                stale.len()
            );
        }
        Ok(stale)
    }
}
