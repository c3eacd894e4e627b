//! Application profile aggregator.
//!
//! Owns an editable profile store layered on top of exactly one upstream
//! aggregator. Every change of either side seeds a recomputation pass that
//! walks the [`DependencyTracker`] from the touched ids to every profile
//! transitively depending on them, re-merges each profile with its resolved
//! contributors and publishes one batched [`AggregatedChange`].

mod bridge;
mod lookup;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    search::{rank, SearchMatcher},
    AggregatedChange, AggregatedEntity, ChangeListener, DependencyTracker, ExternalEntityWrapped,
    HierarchyPlacement, LocalEntityWrapped, OriginatingAction, ProfileMergeEngine,
    SemanticModelAggregator, SurroundingsDirection,
};
use crate::{
    errors::Error,
    notify::{ChangeNotifier, SubscriptionId},
    semantic_model::{EntityId, EntityStore, Operation, OperationResult, SemanticModelEntity},
    Result,
};

/// Capabilities of an [`ApplicationProfileAggregator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileAggregatorConfig {
    /// Token appended to vocabulary chains.
    pub vocabulary_token: String,
    /// Operations may be executed against the profile store.
    pub can_modify: bool,
    /// Entities may be pulled in from the upstream aggregator.
    pub can_add_entities: bool,
    /// Hides vocabulary entities of the profile store that are not profiles.
    pub allow_only_profiled_entities: bool,
}

impl Default for ProfileAggregatorConfig {
    fn default() -> Self {
        Self {
            vocabulary_token: String::from("application profile"),
            can_modify: true,
            can_add_entities: true,
            allow_only_profiled_entities: false,
        }
    }
}

impl ProfileAggregatorConfig {
    /// Both capabilities are required to add anything new.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.can_modify && self.can_add_entities
    }
}

/// Statistics of the last recomputation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputationReport {
    /// Number of work-list pops.
    pub visited: usize,
    pub updated: usize,
    pub removed: usize,
    /// Profiling references that resolved neither locally nor upstream.
    pub unresolved: usize,
    /// Profiling cycles met during the pass, each starting and ending with
    /// the profile being aggregated.
    pub cycles: Vec<Vec<EntityId>>,
}

#[derive(Default)]
struct State {
    tracker: DependencyTracker,
    aggregated: BTreeMap<EntityId, LocalEntityWrapped>,
    last_report: RecomputationReport,
}

/// Contributors of one profile.
#[derive(Default)]
struct Resolution {
    contributors: Vec<LocalEntityWrapped>,
    cyclic: bool,
}

/// Outcome of looking up one profiling target.
enum Target {
    Resolved(LocalEntityWrapped),
    /// A local profile without an aggregated value yet.
    Pending,
    Missing,
}

pub struct ApplicationProfileAggregator {
    store: Arc<EntityStore>,
    upstream: Arc<dyn SemanticModelAggregator>,
    config: ProfileAggregatorConfig,
    merge: ProfileMergeEngine,
    state: Mutex<State>,
    notifier: ChangeNotifier<AggregatedChange>,
    store_subscription: SubscriptionId,
    upstream_subscription: SubscriptionId,
}

impl ApplicationProfileAggregator {
    /// Wires the aggregator to its store and upstream and aggregates the
    /// current store content.
    #[must_use]
    pub fn new(
        store: Arc<EntityStore>,
        upstream: Arc<dyn SemanticModelAggregator>,
        config: ProfileAggregatorConfig,
    ) -> Arc<Self> {
        let aggregator = Arc::new_cyclic(|this: &Weak<Self>| {
            let weak = this.clone();
            let store_subscription = store.subscribe_to_changes(move |change| {
                if let Some(aggregator) = weak.upgrade() {
                    aggregator.recompute(change.ids());
                }
            });
            let weak = this.clone();
            let upstream_subscription =
                upstream.subscribe_to_changes(Box::new(move |change: &AggregatedChange| {
                    if let Some(aggregator) = weak.upgrade() {
                        aggregator.recompute(change.ids());
                    }
                }));
            Self {
                store,
                upstream,
                config,
                merge: ProfileMergeEngine::new(),
                state: Mutex::new(State::default()),
                notifier: ChangeNotifier::new(),
                store_subscription,
                upstream_subscription,
            }
        });
        aggregator.recompute(aggregator.store.entities().into_keys().collect());
        aggregator
    }

    #[must_use]
    pub fn config(&self) -> &ProfileAggregatorConfig {
        &self.config
    }

    /// Profile store owned by this aggregator.
    #[must_use]
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    #[must_use]
    pub fn upstream(&self) -> &Arc<dyn SemanticModelAggregator> {
        &self.upstream
    }

    #[must_use]
    pub fn last_report(&self) -> RecomputationReport {
        self.state_guard().last_report.clone()
    }

    /// Profiles currently depending on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<EntityId> {
        self.state_guard().tracker.get_by_second(id)
    }

    /// Entities `id` currently depends on.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> Vec<EntityId> {
        self.state_guard().tracker.get_by_first(id)
    }

    fn state_guard(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("profile aggregator state poisoned")
    }

    fn wrap(&self, entity: AggregatedEntity) -> LocalEntityWrapped {
        LocalEntityWrapped::new(entity, vec![self.config.vocabulary_token.clone()])
    }

    /// Whether `id` lives in this profile model rather than upstream.
    fn is_local(&self, id: &str) -> bool {
        self.store.contains(id) || self.state_guard().aggregated.contains_key(id)
    }

    fn ensure_editable(&self, operation: &str) -> Result<()> {
        if self.config.is_editable() {
            Ok(())
        } else {
            Err(Error::permission_denied(
                operation,
                &self.config.vocabulary_token,
            ))
        }
    }

    /// Runs one recomputation pass seeded with `seeds` and publishes its delta.
    fn recompute(&self, seeds: Vec<EntityId>) {
        let (change, report) = {
            let mut state = self.state_guard();
            let mut report = RecomputationReport::default();

            let mut forced: BTreeSet<EntityId> = seeds.iter().cloned().collect();
            let mut queued = forced.clone();
            let mut stack: Vec<EntityId> = forced.iter().rev().cloned().collect();
            let mut before: BTreeMap<EntityId, Option<LocalEntityWrapped>> = BTreeMap::new();

            while let Some(id) = stack.pop() {
                queued.remove(&id);
                report.visited += 1;

                let previous = state.aggregated.get(&id).cloned();
                before
                    .entry(id.clone())
                    .or_insert_with(|| previous.clone());

                let next = self.aggregate_one(&mut state, &id, &mut report);
                let changed = previous != next;
                match next {
                    Some(wrapped) => {
                        state.aggregated.insert(id.clone(), wrapped);
                    }
                    None => {
                        state.aggregated.remove(&id);
                    }
                }

                // Seeds always notify their dependents once; everything else
                // only when its value moved.
                if forced.remove(&id) || changed {
                    for dependent in state.tracker.get_by_second(&id) {
                        if queued.insert(dependent.clone()) {
                            stack.push(dependent);
                        }
                    }
                }
            }

            let mut change = AggregatedChange::default();
            for (id, previous) in before {
                match (previous, state.aggregated.get(&id)) {
                    (previous, Some(current)) if previous.as_ref() != Some(current) => {
                        change.updated.insert(id, current.clone());
                    }
                    (Some(_), None) => change.removed.push(id),
                    _ => {}
                }
            }
            report.updated = change.updated.len();
            report.removed = change.removed.len();
            state.last_report = report.clone();
            (change, report)
        };

        tracing::debug!(
            model = %self.config.vocabulary_token,
            visited = report.visited,
            updated = report.updated,
            removed = report.removed,
            unresolved = report.unresolved,
            cycles = report.cycles.len(),
            "profile_recomputed"
        );

        if !change.is_empty() {
            self.notifier.publish(change);
        }
    }

    /// Computes the aggregated value of `id`, refreshing its dependency edges.
    fn aggregate_one(
        &self,
        state: &mut State,
        id: &str,
        report: &mut RecomputationReport,
    ) -> Option<LocalEntityWrapped> {
        let Some(entity) = self.store.get(id) else {
            state.tracker.delete_first(id);
            return None;
        };

        match entity {
            SemanticModelEntity::Class(_) | SemanticModelEntity::Relationship(_) => {
                state.tracker.delete_first(id);
                if self.config.allow_only_profiled_entities {
                    return None;
                }
                Some(self.wrap(AggregatedEntity::from_raw(entity)))
            }
            SemanticModelEntity::Generalization(_) => {
                state.tracker.delete_first(id);
                Some(self.wrap(AggregatedEntity::from_raw(entity)))
            }
            SemanticModelEntity::ClassProfile(profile) => {
                state
                    .tracker
                    .override_by_first(id, profile.profiling.iter().cloned());
                let resolution = self.resolve_contributors(state, id, &profile.profiling, report);
                if resolution.contributors.is_empty()
                    && !profile.profiling.is_empty()
                    && !resolution.cyclic
                {
                    return None;
                }
                let refs: Vec<&AggregatedEntity> = resolution
                    .contributors
                    .iter()
                    .map(|wrapped| &wrapped.aggregated_entity)
                    .collect();
                let aggregated = self.merge.aggregate_class_profile(&profile, &refs);
                Some(self.with_sources(
                    AggregatedEntity::ClassProfile(aggregated),
                    resolution.contributors,
                ))
            }
            SemanticModelEntity::RelationshipProfile(profile) => {
                let profiling = profile.profiling();
                state.tracker.override_by_first(id, profiling.iter().cloned());
                let resolution = self.resolve_contributors(state, id, &profiling, report);
                if resolution.contributors.is_empty() && !profiling.is_empty() && !resolution.cyclic
                {
                    return None;
                }
                let refs: Vec<&AggregatedEntity> = resolution
                    .contributors
                    .iter()
                    .map(|wrapped| &wrapped.aggregated_entity)
                    .collect();
                let aggregated = self.merge.aggregate_relationship_profile(&profile, &refs);
                Some(self.with_sources(
                    AggregatedEntity::RelationshipProfile(aggregated),
                    resolution.contributors,
                ))
            }
        }
    }

    fn with_sources(
        &self,
        entity: AggregatedEntity,
        contributors: Vec<LocalEntityWrapped>,
    ) -> LocalEntityWrapped {
        let mut wrapped = self.wrap(entity);
        wrapped.sources = contributors
            .into_iter()
            .map(|mut source| {
                source.sources.clear();
                source
            })
            .collect();
        wrapped
    }

    fn resolve_contributors(
        &self,
        state: &State,
        owner: &str,
        profiling: &[EntityId],
        report: &mut RecomputationReport,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        for target in profiling {
            if let Some(path) = state.tracker.find_path(target, owner) {
                let mut cycle = vec![owner.to_string()];
                cycle.extend(path);
                let error = Error::CycleDetected {
                    path: cycle.clone(),
                };
                tracing::warn!(profile = owner, error = %error, "profiling_cycle_detected");
                report.cycles.push(cycle);
                resolution.cyclic = true;
                continue;
            }
            match self.resolve_target(state, target) {
                Target::Resolved(contributor) => resolution.contributors.push(contributor),
                // Retried through the tracker edge once the profile is computed.
                Target::Pending => {}
                Target::Missing => {
                    tracing::warn!(
                        profile = owner,
                        reference = %target,
                        "profile_reference_unresolved"
                    );
                    report.unresolved += 1;
                }
            }
        }
        resolution
    }

    /// Looks a profiling target up in the aggregated view, then among the raw
    /// vocabulary entities of the store, then upstream.
    ///
    /// A local profile missing from the aggregated view is not computed yet
    /// or withheld, and is reported as pending rather than missing.
    fn resolve_target(&self, state: &State, target: &str) -> Target {
        if let Some(local) = state.aggregated.get(target) {
            return Target::Resolved(local.clone());
        }
        match self.store.get(target) {
            Some(entity) if entity.is_profile() => Target::Pending,
            Some(entity) => Target::Resolved(self.wrap(AggregatedEntity::from_raw(entity))),
            None => self
                .upstream
                .get_local_entity(target)
                .map_or(Target::Missing, Target::Resolved),
        }
    }

    /// Local entity as a candidate carrying `action`.
    fn local_candidate(
        wrapped: &LocalEntityWrapped,
        action: OriginatingAction,
    ) -> ExternalEntityWrapped {
        ExternalEntityWrapped {
            aggregated_entity: wrapped.aggregated_entity.clone(),
            vocabulary_chain: wrapped.vocabulary_chain.clone(),
            originating_model: vec![action],
        }
    }

    /// Re-wraps an upstream candidate so that selecting it creates a new
    /// local profile.
    fn upstream_candidate(&self, hit: ExternalEntityWrapped) -> ExternalEntityWrapped {
        let mut vocabulary_chain = hit.vocabulary_chain.clone();
        vocabulary_chain.push(self.config.vocabulary_token.clone());
        let mut originating_model = hit.originating_model.clone();
        let aggregated_entity = hit.aggregated_entity.clone();
        originating_model.push(OriginatingAction::CreateNewProfile {
            derived_from: Some(Box::new(hit)),
        });
        ExternalEntityWrapped {
            aggregated_entity,
            vocabulary_chain,
            originating_model,
        }
    }
}

impl Drop for ApplicationProfileAggregator {
    fn drop(&mut self) {
        self.store.unsubscribe(self.store_subscription);
        self.upstream.unsubscribe(self.upstream_subscription);
    }
}

#[async_trait]
impl SemanticModelAggregator for ApplicationProfileAggregator {
    fn vocabulary_token(&self) -> &str {
        &self.config.vocabulary_token
    }

    fn get_aggregated_entities(&self) -> BTreeMap<EntityId, LocalEntityWrapped> {
        self.state_guard().aggregated.clone()
    }

    fn get_local_entity(&self, id: &str) -> Option<LocalEntityWrapped> {
        self.state_guard().aggregated.get(id).cloned()
    }

    fn subscribe_to_changes(&self, listener: ChangeListener) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    fn exec_operation(&self, operation: Operation) -> Result<OperationResult> {
        if !self.config.can_modify {
            return Err(Error::permission_denied(
                operation.name(),
                &self.config.vocabulary_token,
            ));
        }
        self.store.execute(operation)
    }

    async fn search(&self, query: &str) -> Result<Vec<ExternalEntityWrapped>> {
        let matcher = SearchMatcher::new(query);
        let editable = self.config.is_editable();

        let mut hits = Vec::new();
        for (id, wrapped) in self.get_aggregated_entities() {
            let Some(score) = matcher.score_entity(&wrapped.aggregated_entity) else {
                continue;
            };
            hits.push((
                score,
                id.clone(),
                Self::local_candidate(&wrapped, OriginatingAction::UseAsIs),
            ));
            if editable {
                hits.push((
                    score,
                    id,
                    Self::local_candidate(&wrapped, OriginatingAction::CreateProfileFromProfile),
                ));
            }
        }
        let mut results = rank(hits);

        if editable {
            let upstream = self.upstream.search(query).await?;
            results.extend(upstream.into_iter().map(|hit| self.upstream_candidate(hit)));
        }
        Ok(results)
    }

    async fn get_surroundings(&self, id: &str) -> Result<Vec<ExternalEntityWrapped>> {
        if self.is_local(id) {
            return self.local_surroundings(id).await;
        }
        if !self.config.is_editable() {
            return Ok(Vec::new());
        }
        let upstream = self.upstream.get_surroundings(id).await?;
        Ok(upstream
            .into_iter()
            .map(|hit| self.upstream_candidate(hit))
            .collect())
    }

    async fn get_hierarchy(&self, id: &str) -> Result<Option<Vec<ExternalEntityWrapped>>> {
        if self.is_local(id) {
            return self.local_hierarchy(id).await;
        }
        if !self.config.is_editable() {
            return Ok(None);
        }
        Ok(self.upstream.get_hierarchy(id).await?.map(|hierarchy| {
            hierarchy
                .into_iter()
                .map(|hit| self.upstream_candidate(hit))
                .collect()
        }))
    }

    async fn get_hierarchy_for_lookup(
        &self,
        id: &str,
    ) -> Result<Option<BTreeMap<EntityId, LocalEntityWrapped>>> {
        self.hierarchy_for_lookup(id).await
    }

    async fn external_entity_to_local_for_search(
        &self,
        candidate: &ExternalEntityWrapped,
    ) -> Result<LocalEntityWrapped> {
        self.bridge_for_search(candidate).await
    }

    async fn external_entity_to_local_for_surroundings(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        direction: SurroundingsDirection,
    ) -> Result<LocalEntityWrapped> {
        self.bridge_for_surroundings(from_entity, candidate, direction)
            .await
    }

    async fn external_entity_to_local_for_hierarchy_extension(
        &self,
        from_entity: &str,
        candidate: &ExternalEntityWrapped,
        placement: HierarchyPlacement,
    ) -> Result<LocalEntityWrapped> {
        self.bridge_for_hierarchy_extension(from_entity, candidate, placement)
            .await
    }
}

#[cfg(test)]
mod tests;
