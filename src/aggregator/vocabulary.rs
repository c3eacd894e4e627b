//! Leaf aggregator over a plain vocabulary store.

use std::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;

use super::{
    search::{rank, SearchMatcher},
    AggregatedChange, AggregatedEntity, ChangeListener, ExternalEntityWrapped,
    HierarchyPlacement, LocalEntityWrapped, OriginatingAction, SemanticModelAggregator,
    SurroundingsDirection,
};
use crate::{
    errors::Error,
    notify::{ChangeNotifier, SubscriptionId},
    semantic_model::{EntityChange, EntityId, EntityStore, Operation, OperationResult},
    Result,
};

/// Construction parameters of a [`VocabularyAggregator`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VocabularyAggregatorConfig {
    /// Token appended to vocabulary chains, defaults to the store name.
    pub vocabulary_token: Option<String>,
    /// Whether [`SemanticModelAggregator::exec_operation`] may edit the store.
    pub can_modify: bool,
}

/// Exposes every entity of a vocabulary store unchanged.
///
/// A vocabulary has no profiling structure, so hierarchy and surroundings
/// queries return everything it holds.
pub struct VocabularyAggregator {
    store: Arc<EntityStore>,
    token: String,
    can_modify: bool,
    notifier: ChangeNotifier<AggregatedChange>,
    store_subscription: SubscriptionId,
}

impl VocabularyAggregator {
    #[must_use]
    pub fn new(store: Arc<EntityStore>, config: VocabularyAggregatorConfig) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let store_subscription = store.subscribe_to_changes(move |change| {
                if let Some(aggregator) = weak.upgrade() {
                    aggregator.on_store_change(change);
                }
            });
            Self {
                token: config
                    .vocabulary_token
                    .unwrap_or_else(|| store.name().to_string()),
                can_modify: config.can_modify,
                store,
                notifier: ChangeNotifier::new(),
                store_subscription,
            }
        })
    }

    /// Store backing this aggregator.
    #[must_use]
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    fn wrap(&self, entity: AggregatedEntity) -> LocalEntityWrapped {
        LocalEntityWrapped::new(entity, vec![self.token.clone()])
    }

    fn candidate(&self, entity: AggregatedEntity) -> ExternalEntityWrapped {
        ExternalEntityWrapped {
            aggregated_entity: entity,
            vocabulary_chain: vec![self.token.clone()],
            originating_model: vec![OriginatingAction::UseAsIs],
        }
    }

    fn all_candidates(&self) -> Vec<ExternalEntityWrapped> {
        self.store
            .entities()
            .into_values()
            .map(|entity| self.candidate(AggregatedEntity::from_raw(entity)))
            .collect()
    }

    fn on_store_change(&self, change: &EntityChange) {
        let updated = change
            .updated
            .iter()
            .map(|entity| {
                (
                    entity.id().to_string(),
                    self.wrap(AggregatedEntity::from_raw(entity.clone())),
                )
            })
            .collect();
        let aggregated = AggregatedChange {
            updated,
            removed: change.removed.clone(),
        };
        tracing::trace!(
            model = %self.token,
            updated = aggregated.updated.len(),
            removed = aggregated.removed.len(),
            "vocabulary_changed"
        );
        self.notifier.publish(aggregated);
    }

    /// Returns the candidate's entity when it exists in this vocabulary.
    fn existing(&self, candidate: &ExternalEntityWrapped) -> Result<LocalEntityWrapped> {
        self.get_local_entity(candidate.id())
            .ok_or_else(|| Error::unresolved(candidate.id()))
    }
}

impl Drop for VocabularyAggregator {
    fn drop(&mut self) {
        self.store.unsubscribe(self.store_subscription);
    }
}

#[async_trait]
impl SemanticModelAggregator for VocabularyAggregator {
    fn vocabulary_token(&self) -> &str {
        &self.token
    }

    fn get_aggregated_entities(&self) -> BTreeMap<EntityId, LocalEntityWrapped> {
        self.store
            .entities()
            .into_iter()
            .map(|(id, entity)| (id, self.wrap(AggregatedEntity::from_raw(entity))))
            .collect()
    }

    fn get_local_entity(&self, id: &str) -> Option<LocalEntityWrapped> {
        self.store
            .get(id)
            .map(|entity| self.wrap(AggregatedEntity::from_raw(entity)))
    }

    fn subscribe_to_changes(&self, listener: ChangeListener) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    fn exec_operation(&self, operation: Operation) -> Result<OperationResult> {
        if !self.can_modify {
            return Err(Error::permission_denied(operation.name(), &self.token));
        }
        self.store.execute(operation)
    }

    async fn search(&self, query: &str) -> Result<Vec<ExternalEntityWrapped>> {
        let matcher = SearchMatcher::new(query);
        let hits = self
            .store
            .entities()
            .into_iter()
            .filter_map(|(id, entity)| {
                let entity = AggregatedEntity::from_raw(entity);
                let score = matcher.score_entity(&entity)?;
                Some((score, id, self.candidate(entity)))
            })
            .collect();
        Ok(rank(hits))
    }

    async fn get_surroundings(&self, _id: &str) -> Result<Vec<ExternalEntityWrapped>> {
        Ok(self.all_candidates())
    }

    async fn get_hierarchy(&self, _id: &str) -> Result<Option<Vec<ExternalEntityWrapped>>> {
        Ok(Some(self.all_candidates()))
    }

    async fn get_hierarchy_for_lookup(
        &self,
        id: &str,
    ) -> Result<Option<BTreeMap<EntityId, LocalEntityWrapped>>> {
        if !self.store.contains(id) {
            return Ok(None);
        }
        Ok(Some(self.get_aggregated_entities()))
    }

    async fn external_entity_to_local_for_search(
        &self,
        candidate: &ExternalEntityWrapped,
    ) -> Result<LocalEntityWrapped> {
        self.existing(candidate)
    }

    async fn external_entity_to_local_for_surroundings(
        &self,
        _from_entity: &str,
        candidate: &ExternalEntityWrapped,
        _direction: SurroundingsDirection,
    ) -> Result<LocalEntityWrapped> {
        self.existing(candidate)
    }

    async fn external_entity_to_local_for_hierarchy_extension(
        &self,
        _from_entity: &str,
        candidate: &ExternalEntityWrapped,
        _placement: HierarchyPlacement,
    ) -> Result<LocalEntityWrapped> {
        self.existing(candidate)
    }
}
