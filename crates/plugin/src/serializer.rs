use crate::codec::{StubInput, StubOutput};
use crate::error::CodecError;
use crate::indexing::IndexSink;
use stubscope_api::models::StubNode;

/// Encoder/decoder pair for one stub type, resolved through the serializer registry.
///
/// Only the node's own payload passes through a serializer; the tree
/// structure around it is written by the serialization manager.
pub trait StubSerializer: Send + Sync {
    /// Stable, human-assigned identifier persisted in the name dictionary.
    fn external_id(&self) -> &str;

    fn serialize(&self, node: &StubNode, out: &mut StubOutput<'_>) -> Result<(), CodecError>;

    /// Decode a payload into a node without children.
    fn deserialize(&self, input: &mut StubInput<'_>) -> Result<StubNode, CodecError>;

    /// Report the index occurrences this stub contributes.
    fn index_stub(&self, _node: &StubNode, _sink: &mut dyn IndexSink) {
        // Default: contributes nothing
    }
}
