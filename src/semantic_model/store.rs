use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::notify::{ChangeNotifier, SubscriptionId};

use super::entities::SemanticModelEntity;
use super::value_objects::EntityId;

/// Delta published by an [`EntityStore`] after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityChange {
    pub updated: Vec<SemanticModelEntity>,
    pub removed: Vec<EntityId>,
}

impl EntityChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// Identifiers touched by the change, updated ones first.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.updated
            .iter()
            .map(|entity| entity.id().to_string())
            .chain(self.removed.iter().cloned())
            .collect()
    }
}

/// Flat map of entities owned by one semantic model.
///
/// Listeners receive the exact delta of each [`EntityStore::change`] call and
/// observe the store already mutated.
pub struct EntityStore {
    name: String,
    entities: RwLock<BTreeMap<EntityId, SemanticModelEntity>>,
    notifier: ChangeNotifier<EntityChange>,
}

impl EntityStore {
    /// Creates an empty store labelled with a human readable model name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: RwLock::new(BTreeMap::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Creates a store pre-populated with entities, without notifying anyone.
    #[must_use]
    pub fn with_entities<I>(name: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = SemanticModelEntity>,
    {
        let store = Self::new(name);
        {
            let mut guard = store.write_guard();
            for entity in entities {
                guard.insert(entity.id().to_string(), entity);
            }
        }
        store
    }

    /// Parses a JSON array of tagged entities into a new store.
    pub fn from_json(name: impl Into<String>, json: &str) -> crate::Result<Self> {
        let entities: Vec<SemanticModelEntity> = serde_json::from_str(json)?;
        Ok(Self::with_entities(name, entities))
    }

    /// Reads a JSON array of tagged entities from disk.
    pub fn from_json_file(name: impl Into<String>, path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(name, &content)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merges `updated`, deletes `removed` and notifies listeners with the delta.
    pub fn change(&self, updated: Vec<SemanticModelEntity>, removed: Vec<EntityId>) {
        let change = EntityChange { updated, removed };
        if change.is_empty() {
            return;
        }
        {
            let mut guard = self.write_guard();
            for entity in &change.updated {
                guard.insert(entity.id().to_string(), entity.clone());
            }
            for id in &change.removed {
                guard.remove(id);
            }
        }
        tracing::trace!(
            model = %self.name,
            updated = change.updated.len(),
            removed = change.removed.len(),
            "entity_store_changed"
        );
        self.notifier.publish(change);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<SemanticModelEntity> {
        self.read_guard().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read_guard().contains_key(id)
    }

    /// Returns a snapshot of every entity ordered by identifier.
    #[must_use]
    pub fn entities(&self) -> BTreeMap<EntityId, SemanticModelEntity> {
        self.read_guard().clone()
    }

    /// Finds the first entity carrying the supplied IRI.
    #[must_use]
    pub fn find_by_iri(&self, iri: &str) -> Option<SemanticModelEntity> {
        self.read_guard()
            .values()
            .find(|entity| entity.iri() == Some(iri))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    pub fn subscribe_to_changes<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EntityChange) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeMap<EntityId, SemanticModelEntity>> {
        self.entities.read().expect("entity store poisoned")
    }

    fn write_guard(
        &self,
    ) -> RwLockWriteGuard<'_, BTreeMap<EntityId, SemanticModelEntity>> {
        self.entities.write().expect("entity store poisoned")
    }
}
