use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use stubscope_plugin::StringInterner;

/// Interning pool for strings decoded from stub trees.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: DashMap<Arc<str>, ()>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_str(&self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return existing.key().clone();
        }
        let interned: Arc<str> = Arc::from(s);
        match self.strings.entry(interned.clone()) {
            Entry::Occupied(e) => e.key().clone(),
            Entry::Vacant(e) => {
                e.insert(());
                interned
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl StringInterner for StringPool {
    fn intern(&self, s: &str) -> Arc<str> {
        self.intern_str(s)
    }
}
