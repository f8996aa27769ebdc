use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fmt;

pub const HASH_ALGORITHM: &str = "SHA-256";

/// Digest of a serialized stub tree. Only an equality pre-filter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

thread_local! {
    static HASHER: RefCell<Sha256> = RefCell::new(Sha256::new());
}

impl ContentHash {
    /// Hash `bytes` with this thread's private digest context.
    pub fn of(bytes: &[u8]) -> Self {
        HASHER.with(|hasher| {
            let mut hasher = hasher.borrow_mut();
            hasher.update(bytes);
            let digest = hasher.finalize_reset();
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest);
            ContentHash(out)
        })
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            ContentHash::of(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_context_is_reset_between_calls() {
        let first = ContentHash::of(b"stub");
        let second = ContentHash::of(b"stub");
        assert_eq!(first, second);
        assert_ne!(first, ContentHash::of(b"stubs"));
    }

    #[test]
    fn test_threads_agree() {
        let expected = ContentHash::of(b"shared input");
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| ContentHash::of(b"shared input")))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
