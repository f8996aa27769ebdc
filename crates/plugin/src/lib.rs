use std::sync::Arc;

pub mod codec;
pub mod error;
pub mod field;
pub mod indexing;
pub mod interner;
pub mod serializer;
pub mod varint;

pub use codec::{StubInput, StubOutput};
pub use error::CodecError;
pub use field::FieldStubSerializer;
pub use indexing::IndexSink;
pub use interner::{NameEnumerator, StringInterner};
pub use serializer::StubSerializer;

/// Deferred serializer construction. Registered up front, instantiated on first use.
pub type SerializerFactory = Arc<dyn Fn() -> Arc<dyn StubSerializer> + Send + Sync>;
