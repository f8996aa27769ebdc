//! Content-addressable serialized stub tree with its forward-index sidecar.

pub mod codec;
pub mod forward_index;
pub mod hash;

pub use codec::{BinaryIndexCodec, ForwardIndexCodec};
pub use forward_index::{ForwardIndex, ValueMap, build_forward_index};
pub use hash::{ContentHash, HASH_ALGORITHM};

use crate::error::Result;
use crate::serialization::SerializationManager;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use stubscope_api::models::StubNode;

/// Result of comparing two serialized trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEquality {
    Equal,
    Different,
    /// Same digest, different bytes. Treated as different.
    HashCollision,
}

pub struct SerializedTree {
    tree_bytes: Box<[u8]>,
    index_bytes: Box<[u8]>,
    index_codec: Arc<dyn ForwardIndexCodec>,
    forward_index: OnceCell<ForwardIndex>,
    live_root: Mutex<Option<StubNode>>,
    content_hash: OnceCell<ContentHash>,
}

impl SerializedTree {
    /// Serialize a freshly built stub tree and compute its forward index.
    ///
    /// The root is kept so the first indexing consumer can skip decoding.
    pub fn from_stub(
        root: StubNode,
        manager: &SerializationManager,
        index_codec: Arc<dyn ForwardIndexCodec>,
    ) -> Result<Self> {
        let mut tree_bytes = Vec::new();
        manager.serialize(&root, &mut tree_bytes)?;

        let forward_index = build_forward_index(&root, manager)?;
        let index_bytes = index_codec.encode(&forward_index)?;

        Ok(Self {
            tree_bytes: tree_bytes.into_boxed_slice(),
            index_bytes: index_bytes.into_boxed_slice(),
            index_codec,
            forward_index: OnceCell::with_value(forward_index),
            live_root: Mutex::new(Some(root)),
            content_hash: OnceCell::new(),
        })
    }

    /// Wrap previously persisted bytes.
    pub fn from_bytes(
        tree_bytes: Vec<u8>,
        index_bytes: Vec<u8>,
        index_codec: Arc<dyn ForwardIndexCodec>,
    ) -> Self {
        Self {
            tree_bytes: tree_bytes.into_boxed_slice(),
            index_bytes: index_bytes.into_boxed_slice(),
            index_codec,
            forward_index: OnceCell::new(),
            live_root: Mutex::new(None),
            content_hash: OnceCell::new(),
        }
    }

    pub fn tree_bytes(&self) -> &[u8] {
        &self.tree_bytes
    }

    pub fn tree_len(&self) -> usize {
        self.tree_bytes.len()
    }

    pub fn index_bytes(&self) -> &[u8] {
        &self.index_bytes
    }

    pub fn index_len(&self) -> usize {
        self.index_bytes.len()
    }

    pub fn index_codec(&self) -> &Arc<dyn ForwardIndexCodec> {
        &self.index_codec
    }

    pub fn has_live_root(&self) -> bool {
        self.live_root.lock().is_some()
    }

    /// The stub tree. An indexing caller takes the retained root once;
    /// everyone else decodes the bytes.
    pub fn get_stub(&self, manager: &SerializationManager, for_indexing: bool) -> Result<StubNode> {
        if for_indexing && let Some(root) = self.live_root.lock().take() {
            return Ok(root);
        }
        manager.deserialize(&self.tree_bytes)
    }

    pub fn forward_index(&self) -> Result<&ForwardIndex> {
        self.forward_index
            .get_or_try_init(|| self.index_codec.decode(&self.index_bytes))
    }

    pub fn content_hash(&self) -> ContentHash {
        *self
            .content_hash
            .get_or_init(|| ContentHash::of(&self.tree_bytes))
    }

    /// Digest first, then the full byte comparison. Matching digests over
    /// different bytes are reported and count as different.
    pub fn compare(&self, other: &SerializedTree) -> TreeEquality {
        if std::ptr::eq(self, other) {
            return TreeEquality::Equal;
        }
        if self.tree_len() != other.tree_len() || self.content_hash() != other.content_hash() {
            return TreeEquality::Different;
        }
        if self.tree_bytes == other.tree_bytes {
            return TreeEquality::Equal;
        }

        tracing::warn!(
            "Stub tree hash collision ({}): {} shared by\n  {}\nand\n  {}",
            HASH_ALGORITHM,
            self.content_hash(),
            hex::encode(&self.tree_bytes),
            hex::encode(&other.tree_bytes)
        );
        TreeEquality::HashCollision
    }

    /// Same as [`compare`](Self::compare), with readable dumps in the collision report.
    pub fn compare_with_dump(
        &self,
        other: &SerializedTree,
        manager: &SerializationManager,
    ) -> TreeEquality {
        let result = self.compare(other);
        if result == TreeEquality::HashCollision {
            tracing::warn!(
                "Colliding stub trees:\n{}\n---\n{}",
                manager.dump(&self.tree_bytes),
                manager.dump(&other.tree_bytes)
            );
        }
        result
    }

    /// Rewrite into `to`'s id space. Index bytes are reused when both codecs
    /// agree and re-encoded otherwise.
    pub fn re_serialize(
        &self,
        from: &SerializationManager,
        to: &SerializationManager,
        from_codec: &dyn ForwardIndexCodec,
        to_codec: Arc<dyn ForwardIndexCodec>,
    ) -> Result<SerializedTree> {
        let mut tree_bytes = Vec::with_capacity(self.tree_len());
        from.re_serialize(&self.tree_bytes, &mut tree_bytes, to)?;

        let index_bytes = if from_codec.codec_id() == to_codec.codec_id() {
            self.index_bytes.to_vec()
        } else {
            let index = from_codec.decode(&self.index_bytes)?;
            to_codec.encode(&index)?
        };

        Ok(SerializedTree::from_bytes(tree_bytes, index_bytes, to_codec))
    }

    #[cfg(test)]
    pub(crate) fn force_content_hash(&self, hash: ContentHash) {
        let _ = self.content_hash.set(hash);
    }
}

impl PartialEq for SerializedTree {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == TreeEquality::Equal
    }
}

impl fmt::Debug for SerializedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedTree")
            .field("tree_len", &self.tree_len())
            .field("index_len", &self.index_len())
            .field("index_codec", &self.index_codec.codec_id())
            .field("content_hash", &self.content_hash.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_list::CompactIdList;
    use stubscope_api::models::{IndexKey, IndexValue, StubField};
    use stubscope_plugin::FieldStubSerializer;

    fn manager() -> SerializationManager {
        let manager = SerializationManager::in_memory();
        manager.register(Arc::new(FieldStubSerializer::new("test.FILE")));
        manager.register(Arc::new(
            FieldStubSerializer::new("test.CLASS").indexing(0, IndexKey::new("byName")),
        ));
        manager
    }

    fn file_with(names: &[&str]) -> StubNode {
        names.iter().fold(StubNode::new("test.FILE"), |file, name| {
            file.with_child(StubNode::new("test.CLASS").with_field(StubField::name(name)))
        })
    }

    fn codec() -> Arc<dyn ForwardIndexCodec> {
        Arc::new(BinaryIndexCodec::new())
    }

    #[test]
    fn test_identical_trees_are_equal() {
        let manager = manager();
        let a = SerializedTree::from_stub(file_with(&["Foo", "Bar"]), &manager, codec()).unwrap();
        let b = SerializedTree::from_stub(file_with(&["Foo", "Bar"]), &manager, codec()).unwrap();
        assert_eq!(a.compare(&b), TreeEquality::Equal);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_forced_hash_collision_is_not_equal() {
        let manager = manager();
        let a = SerializedTree::from_stub(file_with(&["Foo"]), &manager, codec()).unwrap();
        let b = SerializedTree::from_stub(file_with(&["Baz"]), &manager, codec()).unwrap();
        assert_eq!(a.tree_len(), b.tree_len());

        let shared = ContentHash([7; 32]);
        a.force_content_hash(shared);
        b.force_content_hash(shared);

        assert_eq!(a.compare_with_dump(&b, &manager), TreeEquality::HashCollision);
        assert_ne!(a, b);
    }

    #[test]
    fn test_live_root_is_consumed_once() {
        let manager = manager();
        let root = file_with(&["Foo"]);
        let tree = SerializedTree::from_stub(root.clone(), &manager, codec()).unwrap();

        assert!(tree.has_live_root());
        assert_eq!(tree.get_stub(&manager, false).unwrap(), root);
        assert!(tree.has_live_root());

        assert_eq!(tree.get_stub(&manager, true).unwrap(), root);
        assert!(!tree.has_live_root());
        assert_eq!(tree.get_stub(&manager, true).unwrap(), root);
    }

    #[test]
    fn test_forward_index_from_persisted_bytes() {
        let manager = manager();
        let built = SerializedTree::from_stub(file_with(&["Foo", "Bar", "Foo"]), &manager, codec())
            .unwrap();
        let restored = SerializedTree::from_bytes(
            built.tree_bytes().to_vec(),
            built.index_bytes().to_vec(),
            codec(),
        );

        let index = restored.forward_index().unwrap();
        let by_name = &index[&IndexKey::new("byName")];
        assert_eq!(by_name[&IndexValue::from("Foo")], CompactIdList::from([1, 3].as_slice()));
        assert_eq!(by_name[&IndexValue::from("Bar")], CompactIdList::from([2].as_slice()));
        assert_eq!(index, built.forward_index().unwrap());
        assert_eq!(restored, built);
    }

    #[test]
    fn test_re_serialize_into_fresh_id_space() {
        let source = manager();
        // Occupy low ids in the target so runtime ids differ.
        let target = SerializationManager::in_memory();
        target.register(Arc::new(FieldStubSerializer::new("unrelated")));
        source.share_serializers_with(&target);

        let root = file_with(&["Foo", "Bar"]);
        let tree = SerializedTree::from_stub(root.clone(), &source, codec()).unwrap();
        let moved = tree
            .re_serialize(&source, &target, &BinaryIndexCodec, codec())
            .unwrap();

        assert_ne!(moved.tree_bytes(), tree.tree_bytes());
        assert_eq!(moved.index_bytes(), tree.index_bytes());
        assert_eq!(moved.get_stub(&target, false).unwrap(), root);
    }
}
