mod support;

use std::sync::Arc;

use semantic_aggregator::{
    aggregator::{
        AggregatedEntity, ApplicationProfileAggregator, CachedExternalAggregator,
        ExternalAggregatorConfig, ExternalEntityWrapped, HierarchyPlacement, OriginatingAction,
        ProfileAggregatorConfig, SemanticModelAggregator, SurroundingsDirection,
    },
    semantic_model::{EntityStore, SemanticModelEntity},
    Error,
};
use support::InMemorySource;

struct Setup {
    cache: Arc<EntityStore>,
    profiles: Arc<EntityStore>,
    aggregator: Arc<ApplicationProfileAggregator>,
}

fn setup(config: ProfileAggregatorConfig) -> Setup {
    let cache = Arc::new(EntityStore::new("dcat"));
    let external = CachedExternalAggregator::new(
        Arc::new(InMemorySource::dcat()),
        Arc::clone(&cache),
        ExternalAggregatorConfig::default(),
    );
    let profiles = Arc::new(EntityStore::new("dcat-ap"));
    let aggregator = ApplicationProfileAggregator::new(Arc::clone(&profiles), external, config);
    Setup {
        cache,
        profiles,
        aggregator,
    }
}

fn find<'a>(candidates: &'a [ExternalEntityWrapped], id: &str) -> &'a ExternalEntityWrapped {
    candidates
        .iter()
        .find(|candidate| candidate.id() == id)
        .expect("expected candidate to exist")
}

/// Profiles the external `dataset` class and returns the new local profile id.
async fn profile_dataset(aggregator: &ApplicationProfileAggregator) -> String {
    let hits = aggregator.search("dataset").await.expect("search");
    let local = aggregator
        .external_entity_to_local_for_search(find(&hits, "dataset"))
        .await
        .expect("dataset bridged");
    local.id().to_string()
}

#[tokio::test]
async fn search_hit_from_external_source_becomes_local_profile() {
    let Setup {
        cache,
        profiles,
        aggregator,
    } = setup(ProfileAggregatorConfig::default());

    let hits = aggregator.search("dataset").await.expect("search");
    let dataset = find(&hits, "dataset");
    assert_eq!(dataset.vocabulary_chain, vec!["dcat", "application profile"]);
    assert!(matches!(
        dataset.originating_model.as_slice(),
        [
            OriginatingAction::UseAsIs,
            OriginatingAction::CreateNewProfile { derived_from: Some(_) }
        ]
    ));

    let local = aggregator
        .external_entity_to_local_for_search(dataset)
        .await
        .expect("bridged");

    assert!(cache.contains("dataset"));
    assert_eq!(cache.len(), 1);
    assert_eq!(profiles.len(), 1);
    let AggregatedEntity::ClassProfile(profile) = &local.aggregated_entity else {
        panic!("bridging should create a class profile");
    };
    assert_eq!(profile.profiling, vec!["dataset"]);
    assert_eq!(profile.name.get("en").map(String::as_str), Some("Dataset"));
    assert_eq!(profile.concept_iris, vec![format!("{}dataset", support::DCAT)]);

    let again = aggregator.search("dataset").await.expect("search");
    let reprofile = again
        .iter()
        .find(|hit| {
            hit.id() == local.id()
                && hit.originating_model == vec![OriginatingAction::CreateProfileFromProfile]
        })
        .expect("local profile can be profiled again");
    let nested = aggregator
        .external_entity_to_local_for_search(reprofile)
        .await
        .expect("profile of profile");
    let AggregatedEntity::ClassProfile(nested) = &nested.aggregated_entity else {
        panic!("bridging should create a class profile");
    };
    assert_eq!(nested.profiling, vec![local.id().to_string()]);
    assert_eq!(nested.concept_iris, profile.concept_iris);
}

#[tokio::test]
async fn inherited_relationship_is_bridged_with_its_generalization_path() {
    let Setup { cache, aggregator, .. } = setup(ProfileAggregatorConfig::default());
    let dataset_profile = profile_dataset(&aggregator).await;

    let surroundings = aggregator
        .get_surroundings(&dataset_profile)
        .await
        .expect("surroundings");
    let publisher = find(&surroundings, "publisher");
    assert!(matches!(
        publisher.originating_model.last(),
        Some(OriginatingAction::CreateNewProfile { .. })
    ));

    let local = aggregator
        .external_entity_to_local_for_surroundings(
            &dataset_profile,
            publisher,
            SurroundingsDirection::Outgoing,
        )
        .await
        .expect("relationship bridged");

    for id in ["dataset", "resource", "g-dataset", "agent", "publisher"] {
        assert!(cache.contains(id), "{id} should be cached");
    }
    assert!(!cache.contains("catalog"));

    let AggregatedEntity::RelationshipProfile(relationship) = &local.aggregated_entity else {
        panic!("bridging should create a relationship profile");
    };
    assert_eq!(relationship.ends[0].concept.as_deref(), Some(dataset_profile.as_str()));
    let agent_profile = relationship.ends[1].concept.clone().expect("range concept");
    assert_ne!(agent_profile, "agent");
    assert_eq!(
        aggregator
            .get_local_entity(&agent_profile)
            .and_then(|wrapped| wrapped.aggregated_entity.class_name().cloned())
            .and_then(|name| name.get("en").cloned())
            .as_deref(),
        Some("Agent")
    );
    assert_eq!(relationship.ends[1].name.get("en").map(String::as_str), Some("publisher"));

    let local_surroundings = aggregator
        .get_surroundings(&dataset_profile)
        .await
        .expect("surroundings");
    let ids: Vec<&str> = local_surroundings
        .iter()
        .filter(|candidate| candidate.originating_model == vec![OriginatingAction::UseAsIs])
        .map(ExternalEntityWrapped::id)
        .collect();
    assert!(ids.contains(&local.id()));
    assert!(ids.contains(&agent_profile.as_str()));
}

#[tokio::test]
async fn hierarchy_extension_adds_parent_profile_and_generalization() {
    let Setup {
        cache,
        profiles,
        aggregator,
    } = setup(ProfileAggregatorConfig::default());
    let dataset_profile = profile_dataset(&aggregator).await;

    let hierarchy = aggregator
        .get_hierarchy("dataset")
        .await
        .expect("hierarchy")
        .expect("dataset is cached upstream");
    let resource = find(&hierarchy, "resource");

    let parent = aggregator
        .external_entity_to_local_for_hierarchy_extension(
            &dataset_profile,
            resource,
            HierarchyPlacement::Parent,
        )
        .await
        .expect("hierarchy extended");

    assert!(cache.contains("resource"));
    assert!(cache.contains("g-dataset"));
    let generalization = profiles
        .entities()
        .into_values()
        .find_map(|entity| match entity {
            SemanticModelEntity::Generalization(generalization) => Some(generalization),
            _ => None,
        })
        .expect("generalization created");
    assert_eq!(generalization.child, dataset_profile);
    assert_eq!(generalization.parent, parent.id());

    let lookup = aggregator
        .get_hierarchy_for_lookup(&dataset_profile)
        .await
        .expect("lookup")
        .expect("local");
    assert!(lookup.contains_key(parent.id()));
    assert!(lookup.contains_key(&generalization.id));
    assert!(!lookup.contains_key(&format!(
        "implicit-generalization:{dataset_profile}:{}",
        parent.id()
    )));
}

#[tokio::test]
async fn read_only_profile_refuses_to_bridge() {
    let Setup { aggregator, .. } = setup(ProfileAggregatorConfig {
        can_add_entities: false,
        ..ProfileAggregatorConfig::default()
    });

    assert!(aggregator.search("dataset").await.expect("search").is_empty());
    assert!(aggregator
        .get_surroundings("dataset")
        .await
        .expect("surroundings")
        .is_empty());
    assert!(aggregator.get_hierarchy("dataset").await.expect("hierarchy").is_none());

    let candidate = ExternalEntityWrapped {
        aggregated_entity: AggregatedEntity::from_raw(support::class("dataset", "Dataset")),
        vocabulary_chain: vec!["dcat".into(), "application profile".into()],
        originating_model: vec![
            OriginatingAction::UseAsIs,
            OriginatingAction::CreateNewProfile { derived_from: None },
        ],
    };
    let err = aggregator
        .external_entity_to_local_for_search(&candidate)
        .await
        .expect_err("not editable");
    assert!(matches!(err, Error::PermissionDenied { .. }));
}

#[tokio::test]
async fn evicting_cached_class_withholds_its_profiles() {
    let Setup { cache, aggregator, .. } = setup(ProfileAggregatorConfig::default());
    let dataset_profile = profile_dataset(&aggregator).await;
    assert!(aggregator.get_local_entity(&dataset_profile).is_some());

    cache.change(vec![], vec!["dataset".into()]);

    assert!(aggregator.get_local_entity(&dataset_profile).is_none());
    assert_eq!(aggregator.last_report().removed, 1);
    assert_eq!(aggregator.dependents_of("dataset"), vec![dataset_profile]);
}

#[tokio::test]
async fn source_failure_surfaces_from_profile_search() {
    let Setup { aggregator, .. } = setup(ProfileAggregatorConfig::default());

    let err = aggregator
        .search(support::UNREACHABLE)
        .await
        .expect_err("source failure");
    assert!(matches!(err, Error::Source(_)));
}
