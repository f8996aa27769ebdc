//! Persistent string <-> id dictionary backing stub names and serializer ids.

pub mod file;
pub mod memory;
pub mod pool;

pub use file::{FileDictionaryStorage, FileNameDictionary};
pub use memory::{MemoryDictionaryStorage, MemoryNameDictionary};
pub use pool::StringPool;

use std::io;
use std::sync::Arc;

/// Append-only string enumerator. Ids start at 1 and are never reused.
pub trait NameDictionary: Send + Sync {
    /// Id of `name`, assigning the next free id on first sight.
    fn enumerate(&self, name: &str) -> io::Result<u32>;

    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_dirty(&self) -> bool;

    fn flush(&self) -> io::Result<()>;

    /// Release underlying resources. Further writes fail.
    fn close(&self) -> io::Result<()>;
}

/// Where a dictionary lives. Repair destroys and reopens through this.
pub trait DictionaryStorage: Send + Sync {
    fn open(&self) -> io::Result<Arc<dyn NameDictionary>>;

    /// Delete the dictionary together with every auxiliary file it owns.
    fn destroy(&self) -> io::Result<()>;

    fn describe(&self) -> String;
}
