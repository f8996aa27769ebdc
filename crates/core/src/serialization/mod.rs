//! Serialization manager: name dictionary, serializer registry and the
//! stub tree stream format built on top of them.
//!
//! Tree stream, pre-order: `varint(runtime id) | payload | varint(child count)`
//! per node, children following their parent.
//!
//! Dictionary I/O failures never escape as I/O errors. They flip a sticky
//! `corrupted` flag that every later call observes as
//! [`StubIndexError::SerializationUnavailable`] until [`SerializationManager::repair`] runs.

pub mod registry;

pub use registry::SerializerRegistry;

use crate::config::StubIndexConfig;
use crate::dictionary::{
    DictionaryStorage, FileDictionaryStorage, MemoryDictionaryStorage, MemoryNameDictionary,
    NameDictionary, StringPool,
};
use crate::error::{Result, StubIndexError};
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stubscope_api::models::StubNode;
use stubscope_plugin::varint::encode_varint;
use stubscope_plugin::{
    CodecError, NameEnumerator, SerializerFactory, StubInput, StubOutput, StubSerializer,
};

pub struct SerializationManager {
    storage: Arc<dyn DictionaryStorage>,
    dictionary: RwLock<Arc<dyn NameDictionary>>,
    registry: SerializerRegistry,
    strings: StringPool,
    corrupted: AtomicBool,
}

/// Adapts the dictionary to the enumerator seam used by serializers.
struct DictionaryNames<'a>(&'a dyn NameDictionary);

impl NameEnumerator for DictionaryNames<'_> {
    fn enumerate(&self, name: &str) -> io::Result<u32> {
        self.0.enumerate(name)
    }

    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>> {
        self.0.value_of(id)
    }
}

impl SerializationManager {
    /// Open the dictionary behind `storage`. A dictionary that fails to open is
    /// treated as corrupted and rebuilt once before giving up.
    pub fn open(storage: Arc<dyn DictionaryStorage>) -> Result<Self> {
        match storage.open() {
            Ok(dictionary) => Ok(Self::with_dictionary(storage, dictionary)),
            Err(e) => {
                tracing::error!(
                    "Failed to open name dictionary {}: {}",
                    storage.describe(),
                    e
                );
                let placeholder = Arc::new(MemoryNameDictionary::new());
                let manager = Self::with_dictionary(storage, placeholder);
                manager.corrupted.store(true, Ordering::SeqCst);
                manager.repair()?;
                Ok(manager)
            }
        }
    }

    pub fn open_in(config: &StubIndexConfig) -> Result<Self> {
        Self::open(Arc::new(FileDictionaryStorage::new(config.dictionary_path())))
    }

    /// Manager over a process-local dictionary.
    pub fn in_memory() -> Self {
        let storage = Arc::new(MemoryDictionaryStorage::new());
        let dictionary = storage.open_memory();
        Self::with_dictionary(storage, dictionary)
    }

    fn with_dictionary(
        storage: Arc<dyn DictionaryStorage>,
        dictionary: Arc<dyn NameDictionary>,
    ) -> Self {
        Self {
            storage,
            dictionary: RwLock::new(dictionary),
            registry: SerializerRegistry::new(),
            strings: StringPool::new(),
            corrupted: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn intern_string(&self, s: &str) -> Arc<str> {
        self.strings.intern_str(s)
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted.load(Ordering::SeqCst)
    }

    fn name_storage_crashed(&self, err: &io::Error) {
        if !self.corrupted.swap(true, Ordering::SeqCst) {
            tracing::error!(
                "Name dictionary {} is corrupted: {}",
                self.storage.describe(),
                err
            );
        }
    }

    /// Translate dictionary failures into the sticky flag.
    fn absorb(&self, err: StubIndexError) -> StubIndexError {
        match err {
            StubIndexError::Codec(CodecError::Names(io)) | StubIndexError::Io(io) => {
                self.name_storage_crashed(&io);
                StubIndexError::SerializationUnavailable
            }
            other => other,
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_corrupted() {
            return Err(StubIndexError::SerializationUnavailable);
        }
        Ok(())
    }

    /// Register a serializer under its stable external id. Dictionary failures
    /// mark the manager corrupted and are otherwise swallowed; the id is
    /// assigned again on repair.
    pub fn register_serializer(&self, external_id: &str, factory: SerializerFactory) {
        let name = self.registry.register(external_id, factory);
        if self.is_corrupted() {
            return;
        }
        let dictionary = self.dictionary.read();
        match dictionary.enumerate(&name) {
            Ok(id) => self.registry.assign_id(name, id),
            Err(e) => self.name_storage_crashed(&e),
        }
    }

    pub fn register(&self, serializer: Arc<dyn StubSerializer>) {
        let external_id = serializer.external_id().to_string();
        self.register_serializer(&external_id, Arc::new(move || serializer.clone()));
    }

    /// Register every serializer known here in `target` as well.
    pub fn share_serializers_with(&self, target: &SerializationManager) {
        for name in self.registry.names() {
            if let Some(factory) = self.registry.factory(&name) {
                target.register_serializer(&name, factory);
            }
        }
    }

    pub fn serializer_for(&self, stub_type: &str) -> Result<Arc<dyn StubSerializer>> {
        self.registry
            .serializer(stub_type)
            .ok_or_else(|| StubIndexError::UnregisteredStubType(stub_type.to_string()))
    }

    pub fn runtime_id(&self, stub_type: &str) -> Result<u32> {
        self.ensure_available()?;
        let dictionary = self.dictionary.read();
        self.runtime_id_in(&**dictionary, stub_type)
            .map_err(|e| self.absorb(e))
    }

    fn runtime_id_in(&self, dictionary: &dyn NameDictionary, stub_type: &str) -> Result<u32> {
        if let Some(id) = self.registry.id_of(stub_type) {
            return Ok(id);
        }
        if !self.registry.is_registered(stub_type) {
            return Err(StubIndexError::UnregisteredStubType(stub_type.to_string()));
        }
        // Registered while the dictionary was unavailable.
        let id = dictionary.enumerate(stub_type)?;
        self.registry.assign_id(Arc::from(stub_type), id);
        Ok(id)
    }

    pub fn external_id(&self, runtime_id: u32) -> Result<Option<Arc<str>>> {
        self.ensure_available()?;
        let dictionary = self.dictionary.read();
        self.name_in(&**dictionary, runtime_id)
            .map_err(|e| self.absorb(e))
    }

    fn name_in(
        &self,
        dictionary: &dyn NameDictionary,
        runtime_id: u32,
    ) -> Result<Option<Arc<str>>> {
        if let Some(name) = self.registry.name_of(runtime_id) {
            return Ok(Some(name));
        }
        Ok(dictionary.value_of(runtime_id)?)
    }

    fn resolve_in(
        &self,
        dictionary: &dyn NameDictionary,
        runtime_id: u32,
    ) -> Result<Arc<dyn StubSerializer>> {
        let Some(name) = self.name_in(dictionary, runtime_id)? else {
            return Err(StubIndexError::SerializerNotFound {
                id: runtime_id,
                name: None,
            });
        };
        let serializer =
            self.registry
                .serializer(&name)
                .ok_or_else(|| StubIndexError::SerializerNotFound {
                    id: runtime_id,
                    name: Some(name.to_string()),
                })?;
        if self.registry.id_of(&name).is_none() {
            self.registry.assign_id(name, runtime_id);
        }
        Ok(serializer)
    }

    pub fn registered_ids(&self) -> Vec<(u32, Arc<str>)> {
        self.registry.ids()
    }

    /// Write `root` in this manager's id space.
    pub fn serialize(&self, root: &StubNode, out: &mut Vec<u8>) -> Result<()> {
        self.ensure_available()?;
        let dictionary = self.dictionary.read();
        let result = self.write_node(&**dictionary, root, out);
        result.map_err(|e| {
            let e = self.absorb(e);
            if matches!(e, StubIndexError::SerializationUnavailable) {
                out.clear();
            }
            e
        })
    }

    fn write_node(
        &self,
        dictionary: &dyn NameDictionary,
        node: &StubNode,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let id = self.runtime_id_in(dictionary, &node.stub_type)?;
        let serializer = self.serializer_for(&node.stub_type)?;
        encode_varint(id as u64, out);
        let names = DictionaryNames(dictionary);
        serializer.serialize(node, &mut StubOutput::new(out, &names))?;
        encode_varint(node.children.len() as u64, out);
        for child in &node.children {
            self.write_node(dictionary, child, out)?;
        }
        Ok(())
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<StubNode> {
        self.ensure_available()?;
        let dictionary = self.dictionary.read();
        let names = DictionaryNames(&**dictionary);
        let mut input = StubInput::new(bytes, &names, &self.strings);
        let root = self
            .read_node(&**dictionary, &mut input)
            .map_err(|e| self.absorb(e))?;
        if !input.is_eof() {
            return Err(CodecError::Malformed(format!(
                "{} trailing bytes after stub tree",
                bytes.len() - input.position()
            ))
            .into());
        }
        Ok(root)
    }

    fn read_node(
        &self,
        dictionary: &dyn NameDictionary,
        input: &mut StubInput<'_>,
    ) -> Result<StubNode> {
        let id = input.read_u32()?;
        let serializer = self.resolve_in(dictionary, id)?;
        let mut node = serializer.deserialize(input)?;
        let child_count = input.read_varint()? as usize;
        node.children.reserve(child_count.min(1024));
        for _ in 0..child_count {
            node.children.push(self.read_node(dictionary, input)?);
        }
        Ok(node)
    }

    /// Rewrite a tree from this manager's id space into `target`'s, one node
    /// payload at a time.
    pub fn re_serialize(
        &self,
        bytes: &[u8],
        out: &mut Vec<u8>,
        target: &SerializationManager,
    ) -> Result<()> {
        self.ensure_available()?;
        target.ensure_available()?;
        let source_dict = self.dictionary.read();
        // `target` may be `self`; a plain second read could queue behind a repair.
        let target_dict = target.dictionary.read_recursive();
        let names = DictionaryNames(&**source_dict);
        let mut input = StubInput::new(bytes, &names, &self.strings);

        let result = self.copy_node(&**source_dict, &mut input, target, &**target_dict, out);
        if let Err(e) = result {
            // Attribute name-table failures to whichever side raised them.
            return Err(match e {
                CopyError::Source(e) => self.absorb(e),
                CopyError::Target(e) => {
                    out.clear();
                    target.absorb(e)
                }
            });
        }
        if !input.is_eof() {
            return Err(CodecError::Malformed("trailing bytes after stub tree".to_string()).into());
        }
        Ok(())
    }

    fn copy_node(
        &self,
        source_dict: &dyn NameDictionary,
        input: &mut StubInput<'_>,
        target: &SerializationManager,
        target_dict: &dyn NameDictionary,
        out: &mut Vec<u8>,
    ) -> std::result::Result<(), CopyError> {
        let id = input.read_u32().map_err(|e| CopyError::Source(e.into()))?;
        let serializer = self.resolve_in(source_dict, id).map_err(CopyError::Source)?;
        let payload = serializer
            .deserialize(input)
            .map_err(|e| CopyError::Source(e.into()))?;

        let target_id = target
            .runtime_id_in(target_dict, &payload.stub_type)
            .map_err(CopyError::Target)?;
        let target_serializer = target
            .serializer_for(&payload.stub_type)
            .map_err(CopyError::Target)?;
        encode_varint(target_id as u64, out);
        let target_names = DictionaryNames(target_dict);
        target_serializer
            .serialize(&payload, &mut StubOutput::new(out, &target_names))
            .map_err(|e| CopyError::Target(e.into()))?;

        let child_count = input.read_varint().map_err(|e| CopyError::Source(e.into()))?;
        encode_varint(child_count, out);
        for _ in 0..child_count {
            self.copy_node(source_dict, input, target, target_dict, out)?;
        }
        Ok(())
    }

    /// Rebuild a corrupted dictionary from scratch. No-op when not corrupted.
    ///
    /// Serializer ids are reassigned, so trees written before the repair are stale.
    pub fn repair(&self) -> Result<()> {
        let mut dictionary = self.dictionary.write();
        if !self.is_corrupted() {
            return Ok(());
        }

        tracing::warn!("Repairing name dictionary {}", self.storage.describe());
        if let Err(e) = dictionary.close() {
            tracing::debug!("Ignoring close failure of corrupted dictionary: {}", e);
        }
        self.storage.destroy().map_err(StubIndexError::Repair)?;
        let fresh = self.storage.open().map_err(StubIndexError::Repair)?;

        self.registry.clear_ids();
        let names = self.registry.names();
        for name in &names {
            let id = fresh.enumerate(name).map_err(StubIndexError::Repair)?;
            self.registry.assign_id(name.clone(), id);
        }
        fresh.flush().map_err(StubIndexError::Repair)?;

        *dictionary = fresh;
        self.corrupted.store(false, Ordering::SeqCst);
        tracing::info!(
            "Name dictionary {} rebuilt with {} serializers",
            self.storage.describe(),
            names.len()
        );
        Ok(())
    }

    /// Push pending dictionary writes to disk.
    pub fn flush(&self) {
        if self.is_corrupted() {
            return;
        }
        let dictionary = self.dictionary.read();
        if dictionary.is_dirty()
            && let Err(e) = dictionary.flush()
        {
            self.name_storage_crashed(&e);
        }
    }

    pub fn close(&self) {
        self.flush();
        if let Err(e) = self.dictionary.read().close() {
            self.name_storage_crashed(&e);
        }
    }

    /// Indented, human-readable rendering of a serialized tree. Falls back to
    /// hex when the bytes cannot be decoded.
    pub fn dump(&self, bytes: &[u8]) -> String {
        match self.deserialize(bytes) {
            Ok(root) => {
                let mut s = String::new();
                dump_node(&root, 0, &mut s);
                s
            }
            Err(e) => format!("<undecodable: {}> {}", e, hex::encode(bytes)),
        }
    }
}

enum CopyError {
    Source(StubIndexError),
    Target(StubIndexError),
}

fn dump_node(node: &StubNode, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{}{} {:?}", "  ".repeat(depth), node.stub_type, node.fields);
    for child in &node.children {
        dump_node(child, depth + 1, out);
    }
}
