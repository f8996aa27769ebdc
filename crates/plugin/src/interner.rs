use std::io;
use std::sync::Arc;

/// Persistent string <-> id mapping used for stub names.
///
/// Id 0 is reserved for "no name"; real ids start at 1.
pub trait NameEnumerator: Send + Sync {
    /// Id for `name`, assigning a fresh one if needed.
    fn enumerate(&self, name: &str) -> io::Result<u32>;

    /// Name previously assigned to `id`.
    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>>;
}

/// Canonicalizes decoded strings so repeated names share one allocation.
pub trait StringInterner: Send + Sync {
    fn intern(&self, s: &str) -> Arc<str>;
}
