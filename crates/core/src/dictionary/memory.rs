use super::{DictionaryStorage, NameDictionary};
use lasso::{Key, Spur, ThreadedRodeo};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Non-persistent dictionary. Also the in-memory mirror of [`super::FileNameDictionary`].
#[derive(Debug, Default)]
pub struct MemoryNameDictionary {
    rodeo: ThreadedRodeo,
}

impl MemoryNameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<u32> {
        self.rodeo.get(name).map(|spur| spur.into_usize() as u32 + 1)
    }

    pub(crate) fn intern(&self, name: &str) -> u32 {
        self.rodeo.get_or_intern(name).into_usize() as u32 + 1
    }

    pub(crate) fn resolve(&self, id: u32) -> Option<Arc<str>> {
        let spur = Spur::try_from_usize(id.checked_sub(1)? as usize)?;
        self.rodeo.try_resolve(&spur).map(Arc::from)
    }
}

impl NameDictionary for MemoryNameDictionary {
    fn enumerate(&self, name: &str) -> io::Result<u32> {
        Ok(self.intern(name))
    }

    fn value_of(&self, id: u32) -> io::Result<Option<Arc<str>>> {
        Ok(self.resolve(id))
    }

    fn len(&self) -> usize {
        self.rodeo.len()
    }

    fn is_dirty(&self) -> bool {
        false
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps one [`MemoryNameDictionary`] alive between `open` calls until destroyed.
#[derive(Default)]
pub struct MemoryDictionaryStorage {
    current: Mutex<Option<Arc<MemoryNameDictionary>>>,
}

impl MemoryDictionaryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_memory(&self) -> Arc<MemoryNameDictionary> {
        let mut current = self.current.lock();
        current
            .get_or_insert_with(|| Arc::new(MemoryNameDictionary::new()))
            .clone()
    }
}

impl DictionaryStorage for MemoryDictionaryStorage {
    fn open(&self) -> io::Result<Arc<dyn NameDictionary>> {
        Ok(self.open_memory())
    }

    fn destroy(&self) -> io::Result<()> {
        self.current.lock().take();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_stable() {
        let dict = MemoryNameDictionary::new();
        assert_eq!(dict.enumerate("a").unwrap(), 1);
        assert_eq!(dict.enumerate("b").unwrap(), 2);
        assert_eq!(dict.enumerate("a").unwrap(), 1);
        assert_eq!(dict.id_of("c"), None);
        assert_eq!(dict.value_of(2).unwrap().as_deref(), Some("b"));
        assert_eq!(dict.value_of(0).unwrap(), None);
        assert_eq!(dict.value_of(9).unwrap(), None);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_storage_reopens_same_dictionary_until_destroyed() {
        let storage = MemoryDictionaryStorage::new();
        storage.open().unwrap().enumerate("kept").unwrap();
        assert_eq!(storage.open().unwrap().value_of(1).unwrap().as_deref(), Some("kept"));

        storage.destroy().unwrap();
        assert!(storage.open().unwrap().is_empty());
    }
}
