pub mod config;
pub mod diff;
pub mod dictionary;
pub mod error;
pub mod id_list;
pub mod indexer;
pub mod logging;
pub mod serialization;
pub mod storage;
pub mod tree;

pub use config::StubIndexConfig;
pub use diff::{IndexDelta, StubTreeDiff, diff_forward_indices};
pub use error::{Result, StubIndexError};
pub use id_list::CompactIdList;
pub use indexer::{BatchReport, StubUpdater};
pub use serialization::SerializationManager;
pub use storage::{MemoryStubIndex, MemoryStubStorage};
pub use tree::{BinaryIndexCodec, ForwardIndex, ForwardIndexCodec, SerializedTree, TreeEquality};
