#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use stubscope_api::models::{FileId, IndexKey, IndexValue, StubField, StubNode};
use stubscope_api::{ApiError, ApiResult, StubIndexUpdater, StubStorage};
use stubscope_core::dictionary::{DictionaryStorage, MemoryDictionaryStorage, NameDictionary};
use stubscope_core::{CompactIdList, MemoryStubStorage, SerializationManager, SerializedTree};
use stubscope_plugin::FieldStubSerializer;

pub const FILE: &str = "test.FILE";
pub const CLASS: &str = "test.CLASS";
pub const METHOD: &str = "test.METHOD";

pub fn by_name() -> IndexKey {
    IndexKey::new("test.byName")
}

pub fn by_arity() -> IndexKey {
    IndexKey::new("test.byArity")
}

pub fn register_test_serializers(manager: &SerializationManager) {
    manager.register(Arc::new(FieldStubSerializer::new(FILE)));
    manager.register(Arc::new(
        FieldStubSerializer::new(CLASS).indexing(0, by_name()),
    ));
    manager.register(Arc::new(
        FieldStubSerializer::new(METHOD)
            .indexing(0, by_name())
            .indexing(2, by_arity()),
    ));
}

pub fn test_manager() -> SerializationManager {
    let manager = SerializationManager::in_memory();
    register_test_serializers(&manager);
    manager
}

pub fn class(name: &str) -> StubNode {
    StubNode::new(CLASS).with_field(StubField::name(name))
}

pub fn method(name: &str, arity: i64) -> StubNode {
    StubNode::new(METHOD)
        .with_field(StubField::name(name))
        .with_field(StubField::Bool(false))
        .with_field(StubField::Int(arity))
        .with_field(StubField::text("void()"))
}

pub fn file_with(children: Vec<StubNode>) -> StubNode {
    children
        .into_iter()
        .fold(StubNode::new(FILE), StubNode::with_child)
}

/// Switches that make [`FlakyDictionaryStorage`] fail on demand.
#[derive(Default)]
pub struct Faults {
    pub names: AtomicBool,
    pub destroy: AtomicBool,
    pub destroys: AtomicUsize,
    /// A single name whose enumeration fails.
    pub poisoned: Mutex<Option<String>>,
}

fn injected() -> io::Error {
    io::Error::other("injected dictionary failure")
}

pub struct FlakyDictionary {
    inner: Arc<dyn NameDictionary>,
    faults: Arc<Faults>,
}

impl FlakyDictionary {
    fn check(&self) -> io::Result<()> {
        if self.faults.names.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(())
    }
}

impl NameDictionary for FlakyDictionary {
    fn enumerate(&self, name: &str) -> io::Result<u32> {
        self.check()?;
        if self.faults.poisoned.lock().as_deref() == Some(name) {
            return Err(injected());
        }
        self.inner.enumerate(name)
    }

    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>> {
        self.check()?;
        self.inner.value_of(id)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_dirty(&self) -> bool {
        true
    }

    fn flush(&self) -> io::Result<()> {
        self.check()
    }

    fn close(&self) -> io::Result<()> {
        self.inner.close()
    }
}

/// Memory-backed dictionary storage with injectable I/O failures.
pub struct FlakyDictionaryStorage {
    inner: MemoryDictionaryStorage,
    pub faults: Arc<Faults>,
}

impl FlakyDictionaryStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryDictionaryStorage::new(),
            faults: Arc::new(Faults::default()),
        }
    }
}

impl DictionaryStorage for FlakyDictionaryStorage {
    fn open(&self) -> io::Result<Arc<dyn NameDictionary>> {
        Ok(Arc::new(FlakyDictionary {
            inner: self.inner.open()?,
            faults: self.faults.clone(),
        }))
    }

    fn destroy(&self) -> io::Result<()> {
        if self.faults.destroy.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.faults.destroys.fetch_add(1, Ordering::SeqCst);
        self.inner.destroy()
    }

    fn describe(&self) -> String {
        "flaky memory".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Add(FileId),
    Update(FileId),
    Remove(FileId),
}

/// [`MemoryStubStorage`] that records every mutation.
#[derive(Default)]
pub struct RecordingStorage {
    pub inner: MemoryStubStorage,
    pub ops: Mutex<Vec<StorageOp>>,
    pub fail_next_add: AtomicBool,
}

impl RecordingStorage {
    pub fn take_ops(&self) -> Vec<StorageOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

impl StubStorage<SerializedTree> for RecordingStorage {
    fn load(&self, file_id: FileId) -> ApiResult<Option<Arc<SerializedTree>>> {
        self.inner.load(file_id)
    }

    fn add(&self, file_id: FileId, tree: Arc<SerializedTree>) -> ApiResult<()> {
        self.ops.lock().push(StorageOp::Add(file_id));
        if self.fail_next_add.swap(false, Ordering::SeqCst) {
            return Err(ApiError::Storage("injected add failure".to_string()));
        }
        self.inner.add(file_id, tree)
    }

    fn update(&self, file_id: FileId, tree: Arc<SerializedTree>) -> ApiResult<()> {
        self.ops.lock().push(StorageOp::Update(file_id));
        self.inner.update(file_id, tree)
    }

    fn remove(&self, file_id: FileId) -> ApiResult<()> {
        self.ops.lock().push(StorageOp::Remove(file_id));
        self.inner.remove(file_id)
    }

    fn file_ids(&self) -> ApiResult<Vec<FileId>> {
        self.inner.file_ids()
    }
}

pub type ValueIds = HashMap<IndexValue, Vec<i32>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCall {
    pub key: IndexKey,
    pub file_id: FileId,
    pub old: ValueIds,
    pub new: ValueIds,
}

/// Index updater that only records its calls.
#[derive(Default)]
pub struct RecordingIndex {
    pub calls: Mutex<Vec<IndexCall>>,
}

impl RecordingIndex {
    pub fn take_calls(&self) -> Vec<IndexCall> {
        let mut calls = std::mem::take(&mut *self.calls.lock());
        calls.sort_by(|a, b| (a.file_id, &a.key).cmp(&(b.file_id, &b.key)));
        calls
    }
}

fn plain(values: &HashMap<IndexValue, CompactIdList>) -> ValueIds {
    values
        .iter()
        .map(|(value, ids)| (value.clone(), ids.iter().collect()))
        .collect()
}

pub fn value_ids(entries: &[(&str, &[i32])]) -> ValueIds {
    entries
        .iter()
        .map(|(value, ids)| (IndexValue::from(*value), ids.to_vec()))
        .collect()
}

impl StubIndexUpdater<CompactIdList> for RecordingIndex {
    fn update_index(
        &self,
        key: &IndexKey,
        file_id: FileId,
        old: &HashMap<IndexValue, CompactIdList>,
        new: &HashMap<IndexValue, CompactIdList>,
    ) -> ApiResult<()> {
        self.calls.lock().push(IndexCall {
            key: key.clone(),
            file_id,
            old: plain(old),
            new: plain(new),
        });
        Ok(())
    }
}
