//! Surroundings and hierarchy queries over the local profile model.

use std::collections::{BTreeMap, BTreeSet};

use super::ApplicationProfileAggregator;
use crate::{
    aggregator::{
        AggregatedEntity, ExternalEntityWrapped, LocalEntityWrapped, OriginatingAction,
        SemanticModelAggregator,
    },
    semantic_model::{EntityId, SemanticModelGeneralization},
    Result,
};

/// Identifier of a generalization implied by a profiling link.
fn implicit_generalization_id(child: &str, parent: &str) -> String {
    format!("implicit-generalization:{child}:{parent}")
}

impl ApplicationProfileAggregator {
    /// Relationships touching a local entity and the entities at their other
    /// ends. When editable, the upstream surroundings of every external entity
    /// profiled by `id` are offered as well.
    pub(super) async fn local_surroundings(&self, id: &str) -> Result<Vec<ExternalEntityWrapped>> {
        let entities = self.get_aggregated_entities();
        let editable = self.config.is_editable();

        let mut seen: BTreeSet<EntityId> = BTreeSet::new();
        let mut results = Vec::new();
        for wrapped in entities.values() {
            let concepts = wrapped.aggregated_entity.end_concepts();
            if !concepts.iter().any(|concept| concept.as_deref() == Some(id)) {
                continue;
            }
            results.push(Self::local_candidate(wrapped, OriginatingAction::UseAsIs));
            if editable {
                results.push(Self::local_candidate(
                    wrapped,
                    OriginatingAction::CreateProfileFromProfile,
                ));
            }
            seen.insert(wrapped.id().to_string());

            for other in concepts.into_iter().flatten() {
                if other == id || !seen.insert(other.clone()) {
                    continue;
                }
                let resolved = entities
                    .get(&other)
                    .cloned()
                    .or_else(|| self.upstream.get_local_entity(&other));
                if let Some(resolved) = resolved {
                    results.push(Self::local_candidate(&resolved, OriginatingAction::UseAsIs));
                }
            }
        }

        if editable {
            let profiled = entities
                .get(id)
                .and_then(|wrapped| wrapped.aggregated_entity.as_class_profile())
                .map(|profile| profile.profiling.clone())
                .unwrap_or_default();
            for target in profiled {
                if self.is_local(&target) {
                    continue;
                }
                for hit in self.upstream.get_surroundings(&target).await? {
                    if seen.insert(hit.id().to_string()) {
                        results.push(self.upstream_candidate(hit));
                    }
                }
            }
        }

        Ok(results)
    }

    /// Hierarchy candidates of a local entity.
    ///
    /// Entries owned by this model are offered as is; entries pulled from
    /// upstream are offered for profiling when editable and skipped otherwise.
    pub(super) async fn local_hierarchy(
        &self,
        id: &str,
    ) -> Result<Option<Vec<ExternalEntityWrapped>>> {
        let Some(hierarchy) = self.hierarchy_for_lookup(id).await? else {
            return Ok(None);
        };
        let editable = self.config.is_editable();
        let mut results = Vec::new();
        for (entity_id, wrapped) in hierarchy {
            if self.is_local(&entity_id) || entity_id.starts_with("implicit-generalization:") {
                results.push(Self::local_candidate(&wrapped, OriginatingAction::UseAsIs));
            } else if editable {
                let upstream = ExternalEntityWrapped {
                    aggregated_entity: wrapped.aggregated_entity,
                    vocabulary_chain: wrapped.vocabulary_chain,
                    originating_model: vec![OriginatingAction::UseAsIs],
                };
                results.push(self.upstream_candidate(upstream));
            }
        }
        Ok(Some(results))
    }

    /// Local hierarchy of `id` keyed by entity id, merged with the upstream
    /// hierarchy of every external entity profiled on the way up.
    pub(super) async fn hierarchy_for_lookup(
        &self,
        id: &str,
    ) -> Result<Option<BTreeMap<EntityId, LocalEntityWrapped>>> {
        let entities = self.get_aggregated_entities();
        let Some(root) = entities.get(id) else {
            return Ok(None);
        };

        let generalizations: Vec<(&LocalEntityWrapped, &SemanticModelGeneralization)> = entities
            .values()
            .filter_map(|wrapped| {
                let generalization = wrapped.aggregated_entity.as_generalization()?;
                Some((wrapped, generalization))
            })
            .collect();

        let mut result: BTreeMap<EntityId, LocalEntityWrapped> = BTreeMap::new();
        result.insert(id.to_string(), root.clone());

        let add_implicit = |result: &mut BTreeMap<EntityId, LocalEntityWrapped>,
                            child: &str,
                            parent: &str| {
            let explicit = generalizations
                .iter()
                .any(|(_, g)| g.child == child && g.parent == parent);
            if explicit {
                return;
            }
            let generalization = SemanticModelGeneralization::new(
                implicit_generalization_id(child, parent),
                child,
                parent,
            );
            result.insert(
                generalization.id.clone(),
                self.wrap(AggregatedEntity::Generalization(generalization)),
            );
        };

        // Downward: sub-profiles and specializations.
        let mut visited: BTreeSet<&str> = BTreeSet::from([id]);
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            for (child_id, child) in &entities {
                let profiles_current = child
                    .aggregated_entity
                    .as_class_profile()
                    .is_some_and(|profile| profile.profiling.iter().any(|p| p == current));
                if !profiles_current {
                    continue;
                }
                result.insert(child_id.clone(), child.clone());
                add_implicit(&mut result, child_id.as_str(), current);
                if visited.insert(child_id.as_str()) {
                    stack.push(child_id.as_str());
                }
            }
            for (wrapped, generalization) in generalizations.iter().filter(|(_, g)| g.parent == current) {
                result.insert(generalization.id.clone(), (*wrapped).clone());
                if let Some(child) = entities.get(&generalization.child) {
                    result.insert(generalization.child.clone(), child.clone());
                    if visited.insert(generalization.child.as_str()) {
                        stack.push(generalization.child.as_str());
                    }
                }
            }
        }

        // Upward: profiled entities and generalizations.
        let mut external: Vec<(&str, &str)> = Vec::new();
        let mut visited: BTreeSet<&str> = BTreeSet::from([id]);
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            let Some(wrapped) = entities.get(current) else {
                continue;
            };
            if let Some(profile) = wrapped.aggregated_entity.as_class_profile() {
                for parent in &profile.profiling {
                    match entities.get(parent) {
                        Some(parent_entity) => {
                            result.insert(parent.clone(), parent_entity.clone());
                            add_implicit(&mut result, current, parent.as_str());
                            if visited.insert(parent.as_str()) {
                                stack.push(parent.as_str());
                            }
                        }
                        None if !self.store.contains(parent) => {
                            external.push((current, parent.as_str()));
                        }
                        None => {}
                    }
                }
            }
            for (wrapped, generalization) in generalizations.iter().filter(|(_, g)| g.child == current) {
                result.insert(generalization.id.clone(), (*wrapped).clone());
                if let Some(parent) = entities.get(&generalization.parent) {
                    result.insert(generalization.parent.clone(), parent.clone());
                    if visited.insert(generalization.parent.as_str()) {
                        stack.push(generalization.parent.as_str());
                    }
                }
            }
        }

        for (profile, target) in external {
            let Some(upstream) = self.upstream.get_hierarchy_for_lookup(target).await? else {
                continue;
            };
            for (upstream_id, wrapped) in upstream {
                result.entry(upstream_id).or_insert(wrapped);
            }
            add_implicit(&mut result, profile, target);
        }

        Ok(Some(result))
    }
}
