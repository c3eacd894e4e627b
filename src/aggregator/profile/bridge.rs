//! Materialization of candidates into the profile store.
//!
//! A candidate's action chain is replayed from the outermost step: a
//! `CreateNewProfile` step first asks the upstream aggregator to materialize
//! the entity on its side, then profiles the result locally. Bridging is not
//! atomic; a failure may leave the entities created so far in place.

use super::ApplicationProfileAggregator;
use crate::{
    aggregator::{
        AggregatedEntity, ExternalEntityWrapped, HierarchyPlacement, LocalEntityWrapped,
        OriginatingAction, SemanticModelAggregator, SurroundingsDirection,
    },
    errors::Error,
    semantic_model::{
        EntityId, Operation, SemanticModelClassProfile, SemanticModelEntity,
        SemanticModelGeneralization, SemanticModelRelationshipEndProfile,
        SemanticModelRelationshipProfile,
    },
    Result,
};

impl ApplicationProfileAggregator {
    pub(super) async fn bridge_for_search(
        &self,
        candidate: &ExternalEntityWrapped,
    ) -> Result<LocalEntityWrapped> {
        self.ensure_editable("external-entity-to-local-for-search")?;
        let (action, _) = candidate.split_action()?;
        match action {
            OriginatingAction::UseAsIs => self.local_or_unresolved(candidate.id()),
            OriginatingAction::CreateProfileFromProfile => {
                let id = self.create_class_profile(candidate.id())?;
                self.local_or_unresolved(&id)
            }
            OriginatingAction::CreateNewProfile { .. } => {
                let upstream_candidate = candidate.upstream_candidate()?;
                let upstream_local = self
                    .upstream
                    .external_entity_to_local_for_search(&upstream_candidate)
                    .await?;
                let id = self.create_class_profile(upstream_local.id())?;
                self.local_or_unresolved(&id)
            }
        }
    }

    pub(super) async fn bridge_for_surroundings(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        direction: SurroundingsDirection,
    ) -> Result<LocalEntityWrapped> {
        self.ensure_editable("external-entity-to-local-for-surroundings")?;
        let (action, _) = candidate.split_action()?;
        match action {
            OriginatingAction::UseAsIs => self.local_or_unresolved(candidate.id()),
            OriginatingAction::CreateProfileFromProfile => {
                let concepts = candidate.aggregated_entity.end_concepts();
                let id = self.create_relationship_profile(candidate.id(), &concepts)?;
                self.local_or_unresolved(&id)
            }
            OriginatingAction::CreateNewProfile { .. } => {
                let upstream_candidate = candidate.upstream_candidate()?;
                let upstream_from = self.upstream_counterpart(from_entity)?;
                let upstream_relationship = self
                    .upstream
                    .external_entity_to_local_for_surroundings(
                        &upstream_from,
                        &upstream_candidate,
                        direction,
                    )
                    .await?;

                let other_upstream = upstream_relationship
                    .aggregated_entity
                    .end_concepts()
                    .get(direction.other_end())
                    .cloned()
                    .flatten()
                    .ok_or_else(|| Error::unresolved(upstream_relationship.id()))?;
                let own_local = self.ensure_local_profile_of(from_entity)?;
                let other_local = self.ensure_local_profile_of(&other_upstream)?;

                let mut concepts = vec![None, None];
                concepts[direction.own_end()] = Some(own_local);
                concepts[direction.other_end()] = Some(other_local);
                let id = self.create_relationship_profile(upstream_relationship.id(), &concepts)?;
                self.local_or_unresolved(&id)
            }
        }
    }

    pub(super) async fn bridge_for_hierarchy_extension(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        placement: HierarchyPlacement,
    ) -> Result<LocalEntityWrapped> {
        self.ensure_editable("external-entity-to-local-for-hierarchy-extension")?;
        let (action, _) = candidate.split_action()?;
        let target = match action {
            OriginatingAction::UseAsIs => self.local_or_unresolved(candidate.id())?.id().to_string(),
            OriginatingAction::CreateProfileFromProfile => {
                self.create_class_profile(candidate.id())?
            }
            OriginatingAction::CreateNewProfile { .. } => {
                let upstream_candidate = candidate.upstream_candidate()?;
                let upstream_from = self.upstream_counterpart(from_entity)?;
                let upstream_local = self
                    .upstream
                    .external_entity_to_local_for_hierarchy_extension(
                        &upstream_from,
                        &upstream_candidate,
                        placement,
                    )
                    .await?;
                self.ensure_local_profile_of(upstream_local.id())?
            }
        };

        let (child, parent) = placement.order(from_entity, &target);
        if !self.has_generalization(child, parent) {
            self.store.execute(Operation::CreateGeneralization {
                generalization: SemanticModelGeneralization::new("", child, parent),
            })?;
        }
        self.local_or_unresolved(&target)
    }

    fn local_or_unresolved(&self, id: &str) -> Result<LocalEntityWrapped> {
        self.get_local_entity(id)
            .ok_or_else(|| Error::unresolved(id))
    }

    /// Creates a class profile inheriting name and description from `profiled`.
    fn create_class_profile(&self, profiled: &str) -> Result<EntityId> {
        let profile = SemanticModelClassProfile::new("", [profiled])
            .with_name_from_profiled(profiled)
            .with_description_from_profiled(profiled);
        let result = self
            .store
            .execute(Operation::CreateClassProfile { profile })?;
        result
            .created_id()
            .map(str::to_string)
            .ok_or_else(|| Error::unresolved(profiled))
    }

    /// Creates a relationship profile of `profiled` whose ends point at `concepts`.
    fn create_relationship_profile(
        &self,
        profiled: &str,
        concepts: &[Option<EntityId>],
    ) -> Result<EntityId> {
        let end = |index: usize| {
            let mut end = SemanticModelRelationshipEndProfile::new([profiled]);
            end.concept = concepts.get(index).cloned().flatten();
            end
        };
        let range = end(1).with_name_from_profiled(profiled);
        let profile = SemanticModelRelationshipProfile::new("", end(0), range);
        let result = self
            .store
            .execute(Operation::CreateRelationshipProfile { profile })?;
        result
            .created_id()
            .map(str::to_string)
            .ok_or_else(|| Error::unresolved(profiled))
    }

    /// Local class profile of `id`, created when none exists yet.
    ///
    /// Returns `id` itself when it is already local.
    fn ensure_local_profile_of(&self, id: &str) -> Result<EntityId> {
        if self.is_local(id) {
            return Ok(id.to_string());
        }
        let existing = self.store.entities().into_values().find_map(|entity| match entity {
            SemanticModelEntity::ClassProfile(profile)
                if profile.profiling.iter().any(|profiled| profiled == id) =>
            {
                Some(profile.id)
            }
            _ => None,
        });
        match existing {
            Some(profile) => Ok(profile),
            None => self.create_class_profile(id),
        }
    }

    /// Upstream entity standing for `id`: the first external entity a local
    /// profile profiles, or `id` itself when it is not local.
    fn upstream_counterpart(&self, id: &str) -> Result<EntityId> {
        if !self.is_local(id) {
            return Ok(id.to_string());
        }
        let profiling = match self.get_local_entity(id).map(|wrapped| wrapped.aggregated_entity) {
            Some(AggregatedEntity::ClassProfile(profile)) => profile.profiling,
            _ => Vec::new(),
        };
        profiling
            .into_iter()
            .find(|profiled| !self.is_local(profiled))
            .ok_or_else(|| Error::unresolved(id))
    }

    fn has_generalization(&self, child: &str, parent: &str) -> bool {
        self.store.entities().values().any(|entity| {
            matches!(
                entity,
                SemanticModelEntity::Generalization(generalization)
                    if generalization.child == child && generalization.parent == parent
            )
        })
    }
}
