//! In-process implementations of the storage and index collaborators.

pub mod memory;

pub use memory::{MemoryStubIndex, MemoryStubStorage};
