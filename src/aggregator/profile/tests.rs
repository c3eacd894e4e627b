use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use super::{ApplicationProfileAggregator, ProfileAggregatorConfig};
use crate::aggregator::{
    AggregatedChange, AggregatedEntity, OriginatingAction, SemanticModelAggregator,
    VocabularyAggregator, VocabularyAggregatorConfig,
};
use crate::errors::Error;
use crate::semantic_model::{
    language_string, EntityStore, Operation, SemanticModelClass, SemanticModelClassProfile,
    SemanticModelEntity,
};

struct Fixture {
    vocabulary: Arc<EntityStore>,
    profiles: Arc<EntityStore>,
    aggregator: Arc<ApplicationProfileAggregator>,
}

fn fixture(profile_entities: Vec<SemanticModelEntity>, config: ProfileAggregatorConfig) -> Fixture {
    let vocabulary = Arc::new(EntityStore::with_entities(
        "dcat",
        [
            SemanticModelEntity::from(SemanticModelClass::new("c1").with_name("en", "Dataset")),
            SemanticModelClass::new("c2").with_name("en", "Catalog").into(),
        ],
    ));
    let upstream = VocabularyAggregator::new(
        Arc::clone(&vocabulary),
        VocabularyAggregatorConfig::default(),
    );
    let profiles = Arc::new(EntityStore::with_entities("profile", profile_entities));
    let aggregator = ApplicationProfileAggregator::new(Arc::clone(&profiles), upstream, config);
    Fixture {
        vocabulary,
        profiles,
        aggregator,
    }
}

fn profile_of(id: &str, profiled: &str) -> SemanticModelEntity {
    SemanticModelClassProfile::new(id, [profiled])
        .with_name_from_profiled(profiled)
        .into()
}

fn record(aggregator: &ApplicationProfileAggregator) -> Arc<Mutex<Vec<AggregatedChange>>> {
    let received: Arc<Mutex<Vec<AggregatedChange>>> = Arc::default();
    let sink = Arc::clone(&received);
    aggregator.subscribe_to_changes(Box::new(move |change: &AggregatedChange| {
        sink.lock().expect("sink").push(change.clone());
    }));
    received
}

fn name_of(aggregator: &ApplicationProfileAggregator, id: &str) -> Option<String> {
    let wrapped = aggregator.get_local_entity(id)?;
    wrapped
        .aggregated_entity
        .class_name()
        .and_then(|name| name.get("en").cloned())
}

#[test]
fn vocabulary_rename_reaches_profile() {
    let Fixture {
        vocabulary,
        aggregator,
        ..
    } = fixture(vec![profile_of("p1", "c1")], ProfileAggregatorConfig::default());
    assert_eq!(name_of(&aggregator, "p1").as_deref(), Some("Dataset"));

    let received = record(&aggregator);
    vocabulary.change(
        vec![SemanticModelClass::new("c1").with_name("en", "Dataset2").into()],
        vec![],
    );

    let received = received.lock().expect("sink");
    assert_eq!(received.len(), 1);
    let AggregatedEntity::ClassProfile(profile) = &received[0].updated["p1"].aggregated_entity else {
        panic!("p1 should be a class profile");
    };
    assert_eq!(profile.name, language_string("en", "Dataset2"));
    assert_eq!(name_of(&aggregator, "p1").as_deref(), Some("Dataset2"));
}

#[test]
fn removal_propagates_through_profile_chain_once() {
    let Fixture {
        vocabulary,
        aggregator,
        ..
    } = fixture(
        vec![profile_of("p", "c1"), profile_of("q", "p")],
        ProfileAggregatorConfig::default(),
    );
    assert_eq!(name_of(&aggregator, "q").as_deref(), Some("Dataset"));

    let received = record(&aggregator);
    vocabulary.change(vec![], vec!["c1".into()]);

    let received = received.lock().expect("sink");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].removed, vec!["p", "q"]);
    assert!(received[0].updated.is_empty());
    assert!(aggregator.get_local_entity("q").is_none());
}

#[test]
fn dependency_edges_follow_profiling_lists() {
    let Fixture { aggregator, .. } =
        fixture(vec![profile_of("p", "c1")], ProfileAggregatorConfig::default());
    assert_eq!(aggregator.dependents_of("c1"), vec!["p"]);

    aggregator
        .exec_operation(Operation::ModifyClassProfile {
            profile: SemanticModelClassProfile::new("p", ["c2"]),
        })
        .expect("modified");

    assert!(aggregator.dependents_of("c1").is_empty());
    assert_eq!(aggregator.dependents_of("c2"), vec!["p"]);
    assert_eq!(aggregator.dependencies_of("p"), vec!["c2"]);

    aggregator
        .exec_operation(Operation::DeleteEntity { id: "p".into() })
        .expect("deleted");
    assert!(aggregator.dependents_of("c2").is_empty());
    assert!(aggregator.get_local_entity("p").is_none());
}

#[test]
fn unchanged_recomputation_publishes_nothing() {
    let Fixture {
        profiles,
        aggregator,
        ..
    } = fixture(vec![profile_of("p", "c1")], ProfileAggregatorConfig::default());
    let before = aggregator.get_local_entity("p");
    let received = record(&aggregator);

    profiles.change(vec![profile_of("p", "c1")], vec![]);

    assert!(received.lock().expect("sink").is_empty());
    assert_eq!(aggregator.get_local_entity("p"), before);
    assert_eq!(aggregator.last_report().visited, 1);
}

#[test]
fn raw_entities_hidden_when_only_profiles_allowed() {
    let config = ProfileAggregatorConfig {
        allow_only_profiled_entities: true,
        ..ProfileAggregatorConfig::default()
    };
    let Fixture { aggregator, .. } = fixture(
        vec![
            SemanticModelClass::new("local").with_name("en", "Local").into(),
            profile_of("p", "local"),
        ],
        config,
    );

    assert!(aggregator.get_local_entity("local").is_none());
    assert_eq!(name_of(&aggregator, "p").as_deref(), Some("Local"));
}

#[test]
fn profiling_cycle_is_reported_and_terminates() {
    let Fixture { aggregator, .. } = fixture(
        vec![
            SemanticModelClassProfile::new("a", ["b"])
                .with_name("en", "A")
                .into(),
            SemanticModelClassProfile::new("b", ["a", "c1"])
                .with_name("en", "B")
                .into(),
        ],
        ProfileAggregatorConfig::default(),
    );

    assert_eq!(name_of(&aggregator, "a").as_deref(), Some("A"));
    assert_eq!(name_of(&aggregator, "b").as_deref(), Some("B"));
    assert!(!aggregator.last_report().cycles.is_empty());
    assert!(aggregator
        .last_report()
        .cycles
        .iter()
        .all(|cycle| cycle.first() == cycle.last()));
}

#[test]
fn dangling_profile_appears_once_target_exists() {
    let Fixture {
        vocabulary,
        aggregator,
        ..
    } = fixture(vec![profile_of("p", "late")], ProfileAggregatorConfig::default());
    assert!(aggregator.get_local_entity("p").is_none());
    assert_eq!(aggregator.last_report().unresolved, 1);

    let received = record(&aggregator);
    vocabulary.change(
        vec![SemanticModelClass::new("late").with_name("en", "Late").into()],
        vec![],
    );

    assert_eq!(name_of(&aggregator, "p").as_deref(), Some("Late"));
    let received = received.lock().expect("sink");
    assert!(received[0].updated.contains_key("p"));
}

#[test]
fn profile_loaded_before_its_target_profile_is_not_unresolved() {
    let Fixture { aggregator, .. } = fixture(
        vec![profile_of("a", "b"), profile_of("b", "c1")],
        ProfileAggregatorConfig::default(),
    );

    assert_eq!(name_of(&aggregator, "a").as_deref(), Some("Dataset"));
    let report = aggregator.last_report();
    assert_eq!(report.unresolved, 0);
    assert!(report.cycles.is_empty());
}

#[test]
fn only_the_missing_reference_of_a_chain_is_unresolved() {
    let Fixture { aggregator, .. } = fixture(
        vec![profile_of("a", "b"), profile_of("b", "late")],
        ProfileAggregatorConfig::default(),
    );

    assert!(aggregator.get_local_entity("a").is_none());
    assert!(aggregator.get_local_entity("b").is_none());
    assert_eq!(aggregator.last_report().unresolved, 1);
}

#[test]
fn operations_require_modify_capability() {
    let config = ProfileAggregatorConfig {
        can_modify: false,
        ..ProfileAggregatorConfig::default()
    };
    let Fixture { aggregator, .. } = fixture(vec![], config);
    let err = aggregator
        .exec_operation(Operation::CreateClassProfile {
            profile: SemanticModelClassProfile::new("", ["c1"]),
        })
        .expect_err("read only");
    assert!(matches!(err, Error::PermissionDenied { ref operation, .. } if operation == "create-class-profile"));
}

#[test]
fn listener_mutations_are_delivered_after_current_batch() {
    let Fixture {
        vocabulary,
        profiles,
        aggregator,
    } = fixture(vec![profile_of("p", "c1")], ProfileAggregatorConfig::default());

    let deliveries: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let in_listener = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let reacted = Arc::new(AtomicBool::new(false));
    {
        let deliveries = Arc::clone(&deliveries);
        let in_listener = Arc::clone(&in_listener);
        let overlapped = Arc::clone(&overlapped);
        let reacted = Arc::clone(&reacted);
        let profiles = Arc::clone(&profiles);
        aggregator.subscribe_to_changes(Box::new(move |change: &AggregatedChange| {
            if in_listener.swap(true, Ordering::SeqCst) {
                overlapped.store(true, Ordering::SeqCst);
            }
            deliveries.lock().expect("deliveries").push(change.ids());
            if !reacted.swap(true, Ordering::SeqCst) {
                profiles.change(vec![profile_of("q", "p")], vec![]);
            }
            in_listener.store(false, Ordering::SeqCst);
        }));
    }

    vocabulary.change(
        vec![SemanticModelClass::new("c1").with_name("en", "Data").into()],
        vec![],
    );

    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(
        *deliveries.lock().expect("deliveries"),
        vec![vec!["p".to_string()], vec!["q".to_string()]]
    );
    assert_eq!(name_of(&aggregator, "q").as_deref(), Some("Data"));
}

#[tokio::test]
async fn search_offers_local_and_upstream_candidates() {
    let Fixture { aggregator, .. } =
        fixture(vec![profile_of("p", "c1")], ProfileAggregatorConfig::default());

    let hits = aggregator.search("dataset").await.expect("search");
    let summary: Vec<(&str, &OriginatingAction)> = hits
        .iter()
        .map(|hit| (hit.id(), hit.originating_model.last().expect("action")))
        .collect();

    assert_eq!(summary.len(), 3);
    assert_eq!(summary[0], ("p", &OriginatingAction::UseAsIs));
    assert_eq!(summary[1], ("p", &OriginatingAction::CreateProfileFromProfile));
    assert_eq!(summary[2].0, "c1");
    assert!(matches!(
        summary[2].1,
        OriginatingAction::CreateNewProfile {
            derived_from: Some(_)
        }
    ));
    assert_eq!(hits[2].vocabulary_chain, vec!["dcat", "application profile"]);
}

#[tokio::test]
async fn read_only_search_stays_local() {
    let config = ProfileAggregatorConfig {
        can_add_entities: false,
        ..ProfileAggregatorConfig::default()
    };
    let Fixture { aggregator, .. } = fixture(vec![profile_of("p", "c1")], config);

    let hits = aggregator.search("data").await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].originating_model, vec![OriginatingAction::UseAsIs]);

    let err = aggregator
        .external_entity_to_local_for_search(&hits[0])
        .await
        .expect_err("not editable");
    assert!(matches!(err, Error::PermissionDenied { .. }));
}

#[tokio::test]
async fn hierarchy_lookup_synthesizes_implicit_generalizations() {
    let Fixture { aggregator, .. } = fixture(
        vec![profile_of("p1", "c1"), profile_of("p2", "p1")],
        ProfileAggregatorConfig::default(),
    );

    let hierarchy = aggregator
        .get_hierarchy_for_lookup("p2")
        .await
        .expect("lookup")
        .expect("p2 is local");

    for id in [
        "p1",
        "p2",
        "c1",
        "implicit-generalization:p2:p1",
        "implicit-generalization:p1:c1",
    ] {
        assert!(hierarchy.contains_key(id), "{id} missing from hierarchy");
    }
    let from_p1 = aggregator
        .get_hierarchy_for_lookup("p1")
        .await
        .expect("lookup")
        .expect("p1 is local");
    assert!(from_p1.contains_key("p2"));
    assert!(aggregator
        .get_hierarchy_for_lookup("c1")
        .await
        .expect("lookup")
        .is_none());
}
