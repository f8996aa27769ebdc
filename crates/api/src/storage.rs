use crate::error::ApiResult;
use crate::models::{FileId, IndexKey, IndexValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Persistent per-file blob store consulted and mutated by the diff engine.
///
/// `T` is the stored tree representation.
pub trait StubStorage<T>: Send + Sync {
    /// Previously stored tree for this file, if any.
    fn load(&self, file_id: FileId) -> ApiResult<Option<Arc<T>>>;

    fn add(&self, file_id: FileId, tree: Arc<T>) -> ApiResult<()>;

    /// In-place replacement. The per-file diff replaces changed trees with
    /// `remove` followed by `add`; bulk migration uses this.
    fn update(&self, file_id: FileId, tree: Arc<T>) -> ApiResult<()>;

    fn remove(&self, file_id: FileId) -> ApiResult<()>;

    /// Every file with a stored tree.
    fn file_ids(&self) -> ApiResult<Vec<FileId>>;
}

/// Persistent key -> file index maintained from forward-index snapshots.
///
/// `L` is the per-value occurrence list.
pub trait StubIndexUpdater<L>: Send + Sync {
    fn update_index(
        &self,
        key: &IndexKey,
        file_id: FileId,
        old: &HashMap<IndexValue, L>,
        new: &HashMap<IndexValue, L>,
    ) -> ApiResult<()>;
}
