use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use stubscope_plugin::{SerializerFactory, StubSerializer};

/// A registered serializer that is only built when first needed.
pub(crate) struct LazySerializer {
    factory: SerializerFactory,
    instance: OnceCell<Arc<dyn StubSerializer>>,
}

impl LazySerializer {
    fn new(factory: SerializerFactory) -> Self {
        Self {
            factory,
            instance: OnceCell::new(),
        }
    }

    fn get(&self) -> Arc<dyn StubSerializer> {
        self.instance.get_or_init(|| (self.factory)()).clone()
    }
}

/// External id <-> runtime id table plus the serializers behind it.
///
/// Runtime ids come from the name dictionary; this table only caches them
/// and forgets them when the dictionary is rebuilt.
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: DashMap<Arc<str>, Arc<LazySerializer>>,
    name_to_id: DashMap<Arc<str>, u32>,
    id_to_name: DashMap<u32, Arc<str>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the factory for `external_id`. A later registration replaces the factory.
    pub fn register(&self, external_id: &str, factory: SerializerFactory) -> Arc<str> {
        let name = self
            .name_to_id
            .get(external_id)
            .map(|e| e.key().clone())
            .unwrap_or_else(|| Arc::from(external_id));
        self.serializers
            .insert(name.clone(), Arc::new(LazySerializer::new(factory)));
        name
    }

    pub fn assign_id(&self, name: Arc<str>, id: u32) {
        self.id_to_name.insert(id, name.clone());
        self.name_to_id.insert(name, id);
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).map(|e| *e.value())
    }

    pub fn name_of(&self, id: u32) -> Option<Arc<str>> {
        self.id_to_name.get(&id).map(|e| e.value().clone())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.serializers.contains_key(name)
    }

    pub fn serializer(&self, name: &str) -> Option<Arc<dyn StubSerializer>> {
        let lazy = self.serializers.get(name).map(|e| e.value().clone())?;
        Some(lazy.get())
    }

    pub(crate) fn factory(&self, name: &str) -> Option<SerializerFactory> {
        self.serializers.get(name).map(|e| e.value().factory.clone())
    }

    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.serializers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn ids(&self) -> Vec<(u32, Arc<str>)> {
        let mut ids: Vec<(u32, Arc<str>)> = self
            .id_to_name
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        ids.sort_unstable_by_key(|(id, _)| *id);
        ids
    }

    pub fn clear_ids(&self) {
        self.name_to_id.clear();
        self.id_to_name.clear();
    }
}
