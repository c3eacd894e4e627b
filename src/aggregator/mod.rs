//! Aggregation of semantic models into a single, always-consistent view.
//!
//! Three variants implement [`SemanticModelAggregator`]:
//!
//! * [`VocabularyAggregator`] wraps a plain vocabulary store as a leaf.
//! * [`CachedExternalAggregator`] wraps a queryable external source plus a
//!   local cache store.
//! * [`ApplicationProfileAggregator`] owns an editable profile store on top of
//!   any other aggregator and incrementally recomputes the effective value of
//!   every profile whenever one of its dependencies changes.
//!
//! Aggregators compose by holding an `Arc<dyn SemanticModelAggregator>` to the
//! layer below them and subscribing to its change notifications.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    notify::SubscriptionId,
    semantic_model::{
        EntityId, LanguageString, Operation, OperationResult, SemanticModelClass,
        SemanticModelEntity, SemanticModelGeneralization, SemanticModelRelationship,
    },
    Result,
};

pub mod dependency;
pub mod external;
pub mod merge;
pub mod profile;
mod search;
pub mod vocabulary;

pub use dependency::DependencyTracker;
pub use external::{CachedExternalAggregator, ExternalAggregatorConfig, ExternalSemanticModelSource};
pub use merge::{
    AggregatedClassProfile, AggregatedRelationshipEndProfile, AggregatedRelationshipProfile,
    ProfileMergeEngine,
};
pub use profile::{ApplicationProfileAggregator, ProfileAggregatorConfig, RecomputationReport};
pub use vocabulary::{VocabularyAggregator, VocabularyAggregatorConfig};

/// Effective value of an entity after aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AggregatedEntity {
    Class(SemanticModelClass),
    Relationship(SemanticModelRelationship),
    Generalization(SemanticModelGeneralization),
    ClassProfile(AggregatedClassProfile),
    RelationshipProfile(AggregatedRelationshipProfile),
}

impl AggregatedEntity {
    /// Wraps an entity as is, without resolving any profiling.
    #[must_use]
    pub fn from_raw(entity: SemanticModelEntity) -> Self {
        match entity {
            SemanticModelEntity::Class(class) => Self::Class(class),
            SemanticModelEntity::Relationship(relationship) => Self::Relationship(relationship),
            SemanticModelEntity::Generalization(generalization) => {
                Self::Generalization(generalization)
            }
            SemanticModelEntity::ClassProfile(profile) => {
                Self::ClassProfile(AggregatedClassProfile::unresolved(profile))
            }
            SemanticModelEntity::RelationshipProfile(profile) => {
                Self::RelationshipProfile(AggregatedRelationshipProfile::unresolved(profile))
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Class(entity) => &entity.id,
            Self::Relationship(entity) => &entity.id,
            Self::Generalization(entity) => &entity.id,
            Self::ClassProfile(entity) => &entity.id,
            Self::RelationshipProfile(entity) => &entity.id,
        }
    }

    /// Label of classes and class profiles.
    #[must_use]
    pub fn class_name(&self) -> Option<&LanguageString> {
        match self {
            Self::Class(class) => Some(&class.name),
            Self::ClassProfile(profile) => Some(&profile.name),
            _ => None,
        }
    }

    /// Class identifiers referenced by each end of a relationship or relationship profile.
    #[must_use]
    pub fn end_concepts(&self) -> Vec<Option<EntityId>> {
        match self {
            Self::Relationship(relationship) => relationship
                .ends
                .iter()
                .map(|end| end.concept.clone())
                .collect(),
            Self::RelationshipProfile(profile) => {
                profile.ends.iter().map(|end| end.concept.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn as_generalization(&self) -> Option<&SemanticModelGeneralization> {
        match self {
            Self::Generalization(generalization) => Some(generalization),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_class_profile(&self) -> Option<&AggregatedClassProfile> {
        match self {
            Self::ClassProfile(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Aggregated entity together with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntityWrapped {
    pub aggregated_entity: AggregatedEntity,
    /// Names of the models traversed to reach the entity, outermost last.
    pub vocabulary_chain: Vec<String>,
    /// Contributors the entity was aggregated from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<LocalEntityWrapped>,
}

impl LocalEntityWrapped {
    #[must_use]
    pub fn new(aggregated_entity: AggregatedEntity, vocabulary_chain: Vec<String>) -> Self {
        Self {
            aggregated_entity,
            vocabulary_chain,
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.aggregated_entity.id()
    }
}

/// Step describing how a candidate entity gets materialized in a model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum OriginatingAction {
    /// The entity already exists in the model.
    UseAsIs,
    /// Profile an entity that already exists in the model.
    CreateProfileFromProfile,
    /// Materialize the entity upstream first, then profile the result.
    CreateNewProfile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        derived_from: Option<Box<ExternalEntityWrapped>>,
    },
}

/// Candidate entity returned by search, surroundings or hierarchy queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEntityWrapped {
    pub aggregated_entity: AggregatedEntity,
    pub vocabulary_chain: Vec<String>,
    /// Actions to replay, innermost model first; the last one belongs to the
    /// aggregator the candidate was obtained from.
    pub originating_model: Vec<OriginatingAction>,
}

impl ExternalEntityWrapped {
    #[must_use]
    pub fn id(&self) -> &str {
        self.aggregated_entity.id()
    }

    /// Splits off the action addressed to the current aggregator.
    pub(crate) fn split_action(&self) -> Result<(&OriginatingAction, ExternalEntityWrapped)> {
        let (action, rest) = self.originating_model.split_last().ok_or_else(|| {
            crate::Error::MissingOriginatingAction {
                id: self.id().to_string(),
            }
        })?;
        let mut upstream = self.clone();
        upstream.originating_model = rest.to_vec();
        if upstream.vocabulary_chain.len() > 1 {
            upstream.vocabulary_chain.pop();
        }
        Ok((action, upstream))
    }

    /// Candidate to hand to the upstream aggregator for a `CreateNewProfile` step.
    pub(crate) fn upstream_candidate(&self) -> Result<ExternalEntityWrapped> {
        let (action, stripped) = self.split_action()?;
        match action {
            OriginatingAction::CreateNewProfile {
                derived_from: Some(original),
            } => Ok((**original).clone()),
            _ => Ok(stripped),
        }
    }
}

/// Batched change published by aggregators once a recomputation settles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedChange {
    pub updated: BTreeMap<EntityId, LocalEntityWrapped>,
    pub removed: Vec<EntityId>,
}

impl AggregatedChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// Identifiers touched by the change.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.updated
            .keys()
            .cloned()
            .chain(self.removed.iter().cloned())
            .collect()
    }
}

/// Listener receiving aggregated changes.
pub type ChangeListener = Box<dyn Fn(&AggregatedChange) + Send + Sync>;

/// Which end of a relationship the bridged-from entity sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurroundingsDirection {
    /// The entity is the domain of the relationship.
    Outgoing,
    /// The entity is the range of the relationship.
    Incoming,
}

impl SurroundingsDirection {
    /// Index of the end the bridged-from entity sits on.
    #[must_use]
    pub fn own_end(self) -> usize {
        match self {
            Self::Outgoing => 0,
            Self::Incoming => 1,
        }
    }

    /// Index of the opposite end.
    #[must_use]
    pub fn other_end(self) -> usize {
        1 - self.own_end()
    }
}

/// Position of a hierarchy extension candidate relative to the extended class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HierarchyPlacement {
    /// The candidate becomes a parent of the extended class.
    Parent,
    /// The candidate becomes a child of the extended class.
    Child,
}

impl HierarchyPlacement {
    /// Returns `(child, parent)` for the extended class and the candidate.
    #[must_use]
    pub fn order<'a>(self, extended: &'a str, candidate: &'a str) -> (&'a str, &'a str) {
        match self {
            Self::Parent => (extended, candidate),
            Self::Child => (candidate, extended),
        }
    }
}

/// Capabilities shared by every aggregator variant.
///
/// Queries and bridging may reach a network-backed source and are therefore
/// asynchronous. Bridging is not re-entrant: callers must not mutate the same
/// store while a bridging call is in flight.
#[async_trait]
pub trait SemanticModelAggregator: Send + Sync {
    /// Human readable model name appended to vocabulary chains.
    fn vocabulary_token(&self) -> &str;

    /// Full current snapshot of aggregated entities.
    fn get_aggregated_entities(&self) -> BTreeMap<EntityId, LocalEntityWrapped>;

    fn get_local_entity(&self, id: &str) -> Option<LocalEntityWrapped>;

    fn subscribe_to_changes(&self, listener: ChangeListener) -> SubscriptionId;

    fn unsubscribe(&self, subscription: SubscriptionId) -> bool;

    /// Executes an operation against the store owned by the aggregator.
    fn exec_operation(&self, operation: Operation) -> Result<OperationResult>;

    /// Case-insensitive label search returning candidates ranked by relevance.
    async fn search(&self, query: &str) -> Result<Vec<ExternalEntityWrapped>>;

    /// Relationships touching `id` and the classes at their opposite ends.
    async fn get_surroundings(&self, id: &str) -> Result<Vec<ExternalEntityWrapped>>;

    /// Candidates for extending the hierarchy of `id`, or `None` when unknown.
    async fn get_hierarchy(&self, id: &str) -> Result<Option<Vec<ExternalEntityWrapped>>>;

    /// Local hierarchy of `id` keyed by entity id, or `None` when `id` is not local.
    async fn get_hierarchy_for_lookup(
        &self,
        id: &str,
    ) -> Result<Option<BTreeMap<EntityId, LocalEntityWrapped>>>;

    /// Materializes a search candidate in this model.
    async fn external_entity_to_local_for_search(
        &self,
        candidate: &ExternalEntityWrapped,
    ) -> Result<LocalEntityWrapped>;

    /// Materializes a relationship found in the surroundings of `from_entity`.
    async fn external_entity_to_local_for_surroundings(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        direction: SurroundingsDirection,
    ) -> Result<LocalEntityWrapped>;

    /// Materializes a class found in the hierarchy of `from_entity`.
    async fn external_entity_to_local_for_hierarchy_extension(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        placement: HierarchyPlacement,
    ) -> Result<LocalEntityWrapped>;
}
