//! Aggregator over a queryable external vocabulary and its local cache.
//!
//! Only entities explicitly selected through bridging land in the cache.
//! Whenever an entity is cached because of a relationship or hierarchy
//! extension, the generalization path that makes it reachable is cached with
//! it, so the cache is always a generalization-consistent subgraph of the
//! source.

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
    semantic_model::{
        copy_inheritance, EntityChange, EntityId, EntityStore, Iri, Operation, OperationResult,
        SemanticModelEntity,
    },
    Result,
};

/// Queryable external vocabulary, typically backed by a SPARQL endpoint or
/// a remote model repository.
#[async_trait]
pub trait ExternalSemanticModelSource: Send + Sync {
    /// Classes whose label matches `query`.
    async fn search(&self, query: &str) -> Result<Vec<SemanticModelEntity>>;

    /// Relationships touching `iri` and the classes at their other ends.
    async fn get_surroundings(&self, iri: &Iri) -> Result<Vec<SemanticModelEntity>>;

    /// Classes and generalizations above and below `iri`.
    async fn get_full_hierarchy(&self, iri: &Iri) -> Result<Vec<SemanticModelEntity>>;
}

/// Construction parameters of a [`CachedExternalAggregator`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalAggregatorConfig {
    /// Token appended to vocabulary chains, defaults to the cache name.
    pub vocabulary_token: Option<String>,
    /// Whether operations may be executed directly against the cache.
    pub can_modify: bool,
}

pub struct CachedExternalAggregator {
    source: Arc<dyn ExternalSemanticModelSource>,
    cache: Arc<EntityStore>,
    token: String,
    can_modify: bool,
    notifier: ChangeNotifier<AggregatedChange>,
    cache_subscription: SubscriptionId,
}

impl CachedExternalAggregator {
    #[must_use]
    pub fn new(
        source: Arc<dyn ExternalSemanticModelSource>,
        cache: Arc<EntityStore>,
        config: ExternalAggregatorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let cache_subscription = cache.subscribe_to_changes(move |change| {
                if let Some(aggregator) = weak.upgrade() {
                    aggregator.on_cache_change(change);
                }
            });
            Self {
                source,
                token: config
                    .vocabulary_token
                    .unwrap_or_else(|| cache.name().to_string()),
                can_modify: config.can_modify,
                cache,
                notifier: ChangeNotifier::new(),
                cache_subscription,
            }
        })
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<EntityStore> {
        &self.cache
    }

    fn wrap(&self, entity: AggregatedEntity) -> LocalEntityWrapped {
        LocalEntityWrapped::new(entity, vec![self.token.clone()])
    }

    fn candidate(&self, entity: SemanticModelEntity) -> ExternalEntityWrapped {
        ExternalEntityWrapped {
            aggregated_entity: AggregatedEntity::from_raw(entity),
            vocabulary_chain: vec![self.token.clone()],
            originating_model: vec![OriginatingAction::UseAsIs],
        }
    }

    fn on_cache_change(&self, change: &EntityChange) {
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
        self.notifier.publish(AggregatedChange {
            updated,
            removed: change.removed.clone(),
        });
    }

    /// IRI of a cached entity.
    fn cached_iri(&self, id: &str) -> Result<Option<Iri>> {
        let Some(entity) = self.cache.get(id) else {
            return Ok(None);
        };
        entity.iri().map(Iri::new).transpose().map_err(Error::from)
    }

    fn require_cached_iri(&self, id: &str) -> Result<Iri> {
        self.cached_iri(id)?.ok_or_else(|| Error::unresolved(id))
    }

    /// Adds the entities the cache does not hold yet, in one change.
    fn cache_missing(&self, entities: Vec<SemanticModelEntity>) {
        let mut missing: Vec<SemanticModelEntity> = Vec::new();
        for entity in entities {
            if !self.cache.contains(entity.id())
                && !missing.iter().any(|known| known.id() == entity.id())
            {
                missing.push(entity);
            }
        }
        if missing.is_empty() {
            return;
        }
        tracing::info!(
            model = %self.token,
            ids = ?missing.iter().map(SemanticModelEntity::id).collect::<Vec<_>>(),
            "external_entity_materialized"
        );
        self.cache.change(missing, Vec::new());
    }

    fn local_or_unresolved(&self, id: &str) -> Result<LocalEntityWrapped> {
        self.get_local_entity(id)
            .ok_or_else(|| Error::unresolved(id))
    }

    fn materialize_class(&self, candidate: &ExternalEntityWrapped) -> Result<LocalEntityWrapped> {
        let AggregatedEntity::Class(class) = &candidate.aggregated_entity else {
            return Err(Error::unexpected_kind(candidate.id(), "class"));
        };
        if let Some(iri) = &class.iri {
            Iri::new(iri.as_str())?;
            if let Some(existing) = self.cache.find_by_iri(iri) {
                return self.local_or_unresolved(existing.id());
            }
        }
        self.cache_missing(vec![SemanticModelEntity::Class(class.clone())]);
        self.local_or_unresolved(&class.id)
    }
}

impl Drop for CachedExternalAggregator {
    fn drop(&mut self) {
        self.cache.unsubscribe(self.cache_subscription);
    }
}

#[async_trait]
impl SemanticModelAggregator for CachedExternalAggregator {
    fn vocabulary_token(&self) -> &str {
        &self.token
    }

    fn get_aggregated_entities(&self) -> BTreeMap<EntityId, LocalEntityWrapped> {
        self.cache
            .entities()
            .into_iter()
            .map(|(id, entity)| (id, self.wrap(AggregatedEntity::from_raw(entity))))
            .collect()
    }

    fn get_local_entity(&self, id: &str) -> Option<LocalEntityWrapped> {
        self.cache
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
        self.cache.execute(operation)
    }

    async fn search(&self, query: &str) -> Result<Vec<ExternalEntityWrapped>> {
        let matcher = SearchMatcher::new(query);
        let hits = self
            .source
            .search(query)
            .await?
            .into_iter()
            .filter(|entity| matches!(entity, SemanticModelEntity::Class(_)))
            .map(|entity| {
                let candidate = self.candidate(entity);
                let score = matcher
                    .score_entity(&candidate.aggregated_entity)
                    .unwrap_or_default();
                (score, candidate.id().to_string(), candidate)
            })
            .collect();
        Ok(rank(hits))
    }

    async fn get_surroundings(&self, id: &str) -> Result<Vec<ExternalEntityWrapped>> {
        let Some(iri) = self.cached_iri(id)? else {
            return Ok(Vec::new());
        };
        let entities = self.source.get_surroundings(&iri).await?;
        Ok(entities
            .into_iter()
            .map(|entity| self.candidate(entity))
            .collect())
    }

    async fn get_hierarchy(&self, id: &str) -> Result<Option<Vec<ExternalEntityWrapped>>> {
        let Some(iri) = self.cached_iri(id)? else {
            return Ok(None);
        };
        let entities = self.source.get_full_hierarchy(&iri).await?;
        Ok(Some(
            entities
                .into_iter()
                .map(|entity| self.candidate(entity))
                .collect(),
        ))
    }

    async fn get_hierarchy_for_lookup(
        &self,
        id: &str,
    ) -> Result<Option<BTreeMap<EntityId, LocalEntityWrapped>>> {
        if !self.cache.contains(id) {
            return Ok(None);
        }
        Ok(Some(self.get_aggregated_entities()))
    }

    async fn external_entity_to_local_for_search(
        &self,
        candidate: &ExternalEntityWrapped,
    ) -> Result<LocalEntityWrapped> {
        self.materialize_class(candidate)
    }

    async fn external_entity_to_local_for_surroundings(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        direction: SurroundingsDirection,
    ) -> Result<LocalEntityWrapped> {
        let AggregatedEntity::Relationship(relationship) = &candidate.aggregated_entity else {
            return Err(Error::unexpected_kind(candidate.id(), "relationship"));
        };
        if self.cache.contains(&relationship.id) {
            return self.local_or_unresolved(&relationship.id);
        }

        let from_iri = self.require_cached_iri(from_entity)?;
        let concept_at = |index: usize| {
            relationship
                .ends
                .get(index)
                .and_then(|end| end.concept.clone())
                .ok_or_else(|| Error::unresolved(&relationship.id))
        };
        let own_concept = concept_at(direction.own_end())?;
        let other_concept = concept_at(direction.other_end())?;

        let mut known = self.source.get_surroundings(&from_iri).await?;
        let mut to_cache: Vec<SemanticModelEntity> = Vec::new();

        if own_concept != from_entity {
            // The relationship is declared on an ancestor of `from_entity`.
            let (child, parent) = (from_entity, own_concept.as_str());
            let hierarchy = self.source.get_full_hierarchy(&from_iri).await?;
            let path = copy_inheritance(&hierarchy, child, parent).ok_or_else(|| {
                Error::MalformedGeneralizationChain {
                    from: child.to_string(),
                    to: parent.to_string(),
                }
            })?;
            to_cache.extend(path);
            known.extend(hierarchy);
        }

        if !self.cache.contains(&other_concept) {
            let other = known
                .into_iter()
                .find(|entity| {
                    entity.id() == other_concept
                        && matches!(entity, SemanticModelEntity::Class(_))
                })
                .ok_or_else(|| Error::unresolved(&other_concept))?;
            to_cache.push(other);
        }

        to_cache.push(SemanticModelEntity::Relationship(relationship.clone()));
        self.cache_missing(to_cache);
        self.local_or_unresolved(&relationship.id)
    }

    async fn external_entity_to_local_for_hierarchy_extension(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        placement: HierarchyPlacement,
    ) -> Result<LocalEntityWrapped> {
        let from_iri = self.require_cached_iri(from_entity)?;
        let hierarchy = self.source.get_full_hierarchy(&from_iri).await?;
        let (child, parent) = placement.order(from_entity, candidate.id());
        let path = copy_inheritance(&hierarchy, child, parent).ok_or_else(|| {
            Error::MalformedGeneralizationChain {
                from: child.to_string(),
                to: parent.to_string(),
            }
        })?;
        self.cache_missing(path);
        self.local_or_unresolved(candidate.id())
    }
}
