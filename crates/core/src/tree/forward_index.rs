use crate::error::{Result, StubIndexError};
use crate::id_list::CompactIdList;
use crate::serialization::SerializationManager;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use stubscope_api::models::{IndexKey, IndexValue, StubNode};
use stubscope_plugin::IndexSink;

/// Occurrences of each value of one index category within one file.
pub type ValueMap = HashMap<IndexValue, CompactIdList>;

/// Per-file forward index: category -> value -> stub ordinals.
pub type ForwardIndex = HashMap<IndexKey, ValueMap>;

pub(crate) static EMPTY_VALUE_MAP: Lazy<ValueMap> = Lazy::new(HashMap::new);
pub(crate) static EMPTY_FORWARD_INDEX: Lazy<ForwardIndex> = Lazy::new(HashMap::new);

#[derive(Default)]
struct ForwardIndexBuilder {
    index: ForwardIndex,
    ordinal: i32,
}

impl IndexSink for ForwardIndexBuilder {
    fn occurrence(&mut self, key: &IndexKey, value: IndexValue) {
        let ids = self
            .index
            .entry(key.clone())
            .or_default()
            .entry(value)
            .or_default();
        // Ordinals arrive in pre-order, so duplicates are always adjacent.
        if ids.last() != Some(self.ordinal) {
            ids.add(self.ordinal);
        }
    }
}

/// Ask every node's serializer for its occurrences, keyed by pre-order ordinal.
pub fn build_forward_index(
    root: &StubNode,
    manager: &SerializationManager,
) -> Result<ForwardIndex> {
    let mut builder = ForwardIndexBuilder::default();
    let mut failure: Option<StubIndexError> = None;

    root.walk(&mut |ordinal, node| {
        if failure.is_some() {
            return;
        }
        match manager.serializer_for(&node.stub_type) {
            Ok(serializer) => {
                builder.ordinal = ordinal as i32;
                serializer.index_stub(node, &mut builder);
            }
            Err(e) => failure = Some(e),
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    let mut index = builder.index;
    for values in index.values_mut() {
        values.shrink_to_fit();
        for ids in values.values_mut() {
            ids.trim_to_size();
        }
    }
    Ok(index)
}
