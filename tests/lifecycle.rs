//! Lifecycle integration tests
//!
//! Drives the DataVolume controller end to end against the in-memory store
//! with scripted phase progressions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio_util::sync::CancellationToken;

use datavolume_provider::adapters::{
    InMemoryDataVolumeStore, InMemoryEventCollector, ReadBehaviour, StoreCall,
};
use datavolume_provider::crd::{DataVolume, DataVolumePhase};
use datavolume_provider::domain::LifecycleEvent;
use datavolume_provider::schema::{
    expand_data_volume, HttpSourceBlock, MetadataBlock, ResourceRequirementsBlock, SourceBlock,
    SpecBlock, VolumeClaimSpecBlock,
};
use datavolume_provider::{
    DataVolumeConfig, DataVolumeResource, Error, PollSchedule, ProviderConfig, ResourceState,
};

const ID: &str = "default/fedora";

// =============================================================================
// Fixtures
// =============================================================================

fn http_config(name: &str) -> DataVolumeConfig {
    DataVolumeConfig {
        metadata: vec![MetadataBlock {
            name: name.to_string(),
            labels: BTreeMap::from([("os".to_string(), "fedora".to_string())]),
            ..Default::default()
        }],
        spec: vec![SpecBlock {
            source: vec![SourceBlock {
                http: vec![HttpSourceBlock {
                    url: "https://example.com/fedora.qcow2".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            pvc: vec![VolumeClaimSpecBlock {
                access_modes: vec!["ReadWriteOnce".to_string()],
                resources: vec![ResourceRequirementsBlock {
                    requests: BTreeMap::from([("storage".to_string(), "10Gi".to_string())]),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            content_type: "kubevirt".to_string(),
        }],
        status: vec![],
    }
}

struct Harness {
    store: Arc<InMemoryDataVolumeStore>,
    events: Arc<InMemoryEventCollector>,
    resource: DataVolumeResource,
}

fn harness_with(store: InMemoryDataVolumeStore, config: ProviderConfig) -> Harness {
    let store = Arc::new(store);
    let events = Arc::new(InMemoryEventCollector::new());
    let resource = DataVolumeResource::new(store.clone(), events.clone(), config);
    Harness {
        store,
        events,
        resource,
    }
}

fn fast_config() -> ProviderConfig {
    ProviderConfig::default()
        .with_create_timeout(Duration::from_secs(5))
        .with_delete_timeout(Duration::from_secs(5))
        .with_poll(PollSchedule::Fixed(Duration::from_millis(5)))
}

fn harness() -> Harness {
    harness_with(InMemoryDataVolumeStore::new(), fast_config())
}

fn seed(store: &InMemoryDataVolumeStore, name: &str) {
    store
        .insert(expand_data_volume(&http_config(name)).unwrap())
        .unwrap();
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn create_converges_after_three_polls() {
    let h = harness();
    h.store.script_reads(
        ID,
        [
            ReadBehaviour::NotFound,
            ReadBehaviour::Phase(DataVolumePhase::ImportInProgress),
            ReadBehaviour::Phase(DataVolumePhase::Succeeded),
        ],
    );

    let mut state = ResourceState::new(http_config("fedora"));
    h.resource.create(&mut state).await.unwrap();

    assert_eq!(state.id.as_deref(), Some(ID));
    assert_eq!(h.store.read_count(ID), 3);
    assert_eq!(state.config.status[0].phase, "Succeeded");
    assert_eq!(state.config.metadata[0].namespace, "default");
    assert!(!state.config.metadata[0].uid.is_empty());

    assert_eq!(
        h.events.event_types(),
        vec!["CreateSubmitted", "PhaseObserved", "PhaseObserved", "Converged"]
    );
    assert_matches!(
        h.events.events_of_type("Converged").as_slice(),
        [LifecycleEvent::Converged { polls: 3, .. }]
    );
}

#[tokio::test]
async fn create_submits_without_status() {
    let h = harness();
    h.store
        .script_reads(ID, [ReadBehaviour::Phase(DataVolumePhase::Succeeded)]);

    let mut config = http_config("fedora");
    config.status = vec![datavolume_provider::schema::StatusBlock {
        phase: "Succeeded".to_string(),
        progress: "100.0%".to_string(),
    }];
    let mut state = ResourceState::new(config);
    h.resource.create(&mut state).await.unwrap();

    assert_eq!(state.config.status[0].progress, "");
}

#[tokio::test]
async fn create_reports_failed_phase() {
    let h = harness();
    h.store.script_reads(
        ID,
        [
            ReadBehaviour::Phase(DataVolumePhase::ImportInProgress),
            ReadBehaviour::Phase(DataVolumePhase::Failed),
        ],
    );

    let mut state = ResourceState::new(http_config("fedora"));
    let err = h.resource.create(&mut state).await.unwrap_err();

    assert_matches!(err, Error::ConvergenceFailure { ref state, .. } if state == "Failed");
    assert!(!err.is_timeout());
    // The object exists remotely, so the id stays recorded
    assert_eq!(state.id.as_deref(), Some(ID));
    assert_eq!(h.events.events_of_type("ConvergenceFailed").len(), 1);

    // State reflects the last observed object, not the requested config
    assert!(!state.config.metadata[0].uid.is_empty());
    assert_eq!(state.config.metadata[0].generation, 1);
    assert_eq!(state.config.status[0].phase, "Failed");
}

#[tokio::test]
async fn create_times_out_while_creating() {
    let h = harness_with(
        InMemoryDataVolumeStore::new(),
        fast_config().with_create_timeout(Duration::from_millis(100)),
    );
    // Unscripted reads return the stored object, whose phase stays unset

    let mut state = ResourceState::new(http_config("fedora"));
    let err = h.resource.create(&mut state).await.unwrap_err();

    assert!(err.is_timeout());
    assert_matches!(err, Error::ConvergenceTimeout { ref state, .. } if state == "Creating");
    assert!(!state.config.metadata[0].resource_version.is_empty());
    assert_matches!(
        h.events.events_of_type("ConvergenceTimedOut").as_slice(),
        [LifecycleEvent::ConvergenceTimedOut { timeout_ms: 100, .. }]
    );
}

#[tokio::test]
async fn create_aborts_on_read_error() {
    let h = harness();
    h.store
        .script_reads(ID, [ReadBehaviour::Failure("etcd unavailable".to_string())]);

    let mut state = ResourceState::new(http_config("fedora"));
    let err = h.resource.create(&mut state).await.unwrap_err();

    assert_matches!(err, Error::Kube(kube::Error::Api(ref e)) if e.code == 500);
    assert_eq!(h.store.read_count(ID), 1);
}

#[tokio::test]
async fn create_tolerates_errors_within_budget() {
    let h = harness_with(
        InMemoryDataVolumeStore::new(),
        fast_config().with_max_consecutive_errors(1),
    );
    h.store.script_reads(
        ID,
        [
            ReadBehaviour::Failure("etcd unavailable".to_string()),
            ReadBehaviour::Phase(DataVolumePhase::Succeeded),
        ],
    );

    let mut state = ResourceState::new(http_config("fedora"));
    h.resource.create(&mut state).await.unwrap();
    assert_eq!(h.store.read_count(ID), 2);
}

#[tokio::test]
async fn create_rejects_invalid_config_before_remote_calls() {
    let h = harness();
    let mut config = http_config("fedora");
    config.spec[0].source[0].http.clear();

    let mut state = ResourceState::new(config);
    let err = h.resource.create(&mut state).await.unwrap_err();

    assert_matches!(err, Error::Validation(_));
    assert!(h.store.calls().is_empty());
    assert!(state.id.is_none());
}

#[tokio::test]
async fn create_requires_metadata_block() {
    let h = harness();
    let mut config = http_config("fedora");
    config.metadata.clear();

    let err = h
        .resource
        .create(&mut ResourceState::new(config))
        .await
        .unwrap_err();

    assert_matches!(err, Error::Validation(msg) if msg.contains("metadata"));
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn create_rejects_bad_claim_spec() {
    let h = harness();
    let mut config = http_config("fedora");
    config.spec[0].pvc[0].access_modes = vec!["ReadWriteSometimes".to_string()];

    let err = h
        .resource
        .create(&mut ResourceState::new(config))
        .await
        .unwrap_err();

    assert_matches!(err, Error::Validation(msg) if msg.contains("ReadWriteSometimes"));
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn create_conflict_leaves_no_id() {
    let h = harness();
    seed(&h.store, "fedora");

    let mut state = ResourceState::new(http_config("fedora"));
    let err = h.resource.create(&mut state).await.unwrap_err();

    assert_matches!(err, Error::Kube(kube::Error::Api(ref e)) if e.code == 409);
    assert!(state.id.is_none());
}

#[tokio::test]
async fn create_takes_identity_from_server() {
    let h = harness();
    let mut config = http_config("");
    config.metadata[0].generate_name = "fedora-".to_string();
    let mut state = ResourceState::new(config);

    let created = tokio::spawn({
        let store = h.store.clone();
        async move {
            // Wait for the generated name to appear, then let it succeed
            loop {
                let calls = store.calls();
                if let Some(StoreCall::Create(id)) = calls.first() {
                    store.script_reads(id, [ReadBehaviour::Phase(DataVolumePhase::Succeeded)]);
                    return id.clone();
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    });

    h.resource.create(&mut state).await.unwrap();
    let id = created.await.unwrap();

    assert!(id.starts_with("default/fedora-"));
    assert_eq!(state.id.as_deref(), Some(id.as_str()));
    assert_eq!(state.config.metadata[0].name, id.trim_start_matches("default/"));
}

#[tokio::test]
async fn create_can_be_cancelled() {
    let token = CancellationToken::new();
    let store = Arc::new(InMemoryDataVolumeStore::new());
    let resource = DataVolumeResource::new(
        store.clone(),
        Arc::new(InMemoryEventCollector::new()),
        fast_config(),
    )
    .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    let mut state = ResourceState::new(http_config("fedora"));
    let err = resource.create(&mut state).await.unwrap_err();
    canceller.await.unwrap();

    assert_matches!(err, Error::Cancelled { .. });
    assert_eq!(state.id.as_deref(), Some(ID));
    assert_eq!(
        state.config.metadata[0].uid,
        store.get(ID).unwrap().metadata.uid.unwrap()
    );
}

// =============================================================================
// Read / Import
// =============================================================================

#[tokio::test]
async fn read_refreshes_state() {
    let h = harness();
    seed(&h.store, "fedora");
    h.store
        .script_reads(ID, [ReadBehaviour::Phase(DataVolumePhase::Succeeded)]);

    let mut state = ResourceState::with_id(ID);
    h.resource.read(&mut state).await.unwrap();

    assert_eq!(state.config.metadata[0].name, "fedora");
    assert_eq!(state.config.spec[0].content_type, "kubevirt");
    assert_eq!(state.config.status[0].phase, "Succeeded");
}

#[tokio::test]
async fn read_missing_object_is_not_found() {
    let h = harness();
    let err = h
        .resource
        .read(&mut ResourceState::with_id("default/ghost"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn read_tolerates_unsupported_source_kind() {
    let h = harness();
    let blank: DataVolume = serde_json::from_value(serde_json::json!({
        "apiVersion": "cdi.kubevirt.io/v1alpha1",
        "kind": "DataVolume",
        "metadata": {"name": "scratch", "namespace": "default"},
        "spec": {
            "source": {"blank": {}},
            "pvc": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": "1Gi"}}
            }
        },
        "status": {"phase": "Succeeded", "progress": "N/A"}
    }))
    .unwrap();
    h.store.insert(blank).unwrap();

    let mut state = ResourceState::with_id("default/scratch");
    h.resource.read(&mut state).await.unwrap();

    assert_eq!(state.config.metadata[0].name, "scratch");
    assert_eq!(state.config.spec[0].source, vec![SourceBlock::default()]);
    assert_eq!(state.config.spec[0].pvc[0].access_modes, vec!["ReadWriteOnce"]);
    assert_eq!(state.config.status[0].phase, "Succeeded");
    assert_matches!(h.resource.exists("default/scratch").await, (true, None));
}

#[tokio::test]
async fn import_adopts_existing_object() {
    let h = harness();
    seed(&h.store, "fedora");

    let state = h.resource.import(ID).await.unwrap();

    assert_eq!(state.id.as_deref(), Some(ID));
    assert_eq!(
        state.config.spec[0].source[0].http[0].url,
        "https://example.com/fedora.qcow2"
    );
    assert_eq!(state.config.spec[0].pvc[0].access_modes, vec!["ReadWriteOnce"]);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn update_patches_metadata_only() {
    let h = harness();
    seed(&h.store, "fedora");
    let mut state = h.resource.import(ID).await.unwrap();

    let mut desired = state.config.clone();
    desired.metadata[0].labels =
        BTreeMap::from([("os".to_string(), "fedora-39".to_string())]);
    desired.metadata[0]
        .annotations
        .insert("example.com/owner".to_string(), "platform".to_string());
    desired.spec[0].source[0].http[0].url = "https://example.com/other.qcow2".to_string();

    h.resource.update(&mut state, &desired).await.unwrap();

    let stored = h.store.get(ID).unwrap();
    assert_eq!(stored.metadata.labels.unwrap()["os"], "fedora-39");
    assert_eq!(
        stored.metadata.annotations.unwrap()["example.com/owner"],
        "platform"
    );

    // Spec changes are not resubmitted
    assert_eq!(
        state.config.spec[0].source[0].http[0].url,
        "https://example.com/fedora.qcow2"
    );
    assert_eq!(state.config.metadata[0].labels["os"], "fedora-39");

    match h.events.events_of_type("MetadataPatched").as_slice() {
        [LifecycleEvent::MetadataPatched { paths, .. }] => {
            let mut paths = paths.clone();
            paths.sort();
            assert_eq!(paths, vec!["/metadata/annotations", "/metadata/labels/os"]);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn update_rejects_identity_change() {
    let h = harness();
    seed(&h.store, "fedora");
    let mut state = h.resource.import(ID).await.unwrap();

    let mut renamed = state.config.clone();
    renamed.metadata[0].name = "centos".to_string();
    renamed.metadata[0]
        .labels
        .insert("os".to_string(), "centos".to_string());
    let err = h.resource.update(&mut state, &renamed).await.unwrap_err();
    assert_matches!(err, Error::Validation(msg) if msg.contains("name"));

    let mut moved = state.config.clone();
    moved.metadata[0].namespace = "images".to_string();
    let err = h.resource.update(&mut state, &moved).await.unwrap_err();
    assert_matches!(err, Error::Validation(msg) if msg.contains("namespace"));

    assert!(!h
        .store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::Update(_))));
    assert_eq!(state.id.as_deref(), Some(ID));
    assert_eq!(state.config.metadata[0].name, "fedora");
}

#[tokio::test]
async fn update_removes_all_labels() {
    let h = harness();
    seed(&h.store, "fedora");
    let mut state = h.resource.import(ID).await.unwrap();

    let mut desired = state.config.clone();
    desired.metadata[0].labels.clear();
    h.resource.update(&mut state, &desired).await.unwrap();

    assert!(h.store.get(ID).unwrap().metadata.labels.is_none());
    assert!(state.config.metadata[0].labels.is_empty());
}

#[tokio::test]
async fn update_without_changes_skips_patch() {
    let h = harness();
    seed(&h.store, "fedora");
    let mut state = h.resource.import(ID).await.unwrap();

    let desired = state.config.clone();
    h.resource.update(&mut state, &desired).await.unwrap();

    assert!(!h
        .store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::Update(_))));
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn delete_waits_for_disappearance() {
    let h = harness_with(InMemoryDataVolumeStore::new().with_deletion_lag(2), fast_config());
    seed(&h.store, "fedora");

    let mut state = ResourceState::with_id(ID);
    h.resource.delete(&mut state).await.unwrap();

    assert!(state.id.is_none());
    assert_eq!(h.store.read_count(ID), 3);
    assert!(!h.store.contains(ID));
    assert_matches!(
        h.events.events_of_type("Deleted").as_slice(),
        [LifecycleEvent::Deleted { polls: 3, .. }]
    );
}

#[tokio::test]
async fn delete_tolerates_missing_object() {
    let h = harness();
    let mut state = ResourceState::with_id("default/ghost");

    h.resource.delete(&mut state).await.unwrap();

    assert!(state.id.is_none());
    assert_eq!(h.store.read_count("default/ghost"), 1);
}

#[tokio::test]
async fn delete_aborts_on_read_error() {
    let h = harness_with(InMemoryDataVolumeStore::new().with_deletion_lag(5), fast_config());
    seed(&h.store, "fedora");
    h.store
        .script_reads(ID, [ReadBehaviour::Failure("etcd unavailable".to_string())]);

    let mut state = ResourceState::with_id(ID);
    let err = h.resource.delete(&mut state).await.unwrap_err();

    assert_matches!(err, Error::Kube(_));
    assert_eq!(state.id.as_deref(), Some(ID));
}

#[tokio::test]
async fn delete_times_out() {
    let h = harness_with(
        InMemoryDataVolumeStore::new().with_deletion_lag(u32::MAX),
        fast_config().with_delete_timeout(Duration::from_millis(50)),
    );
    seed(&h.store, "fedora");

    let mut state = ResourceState::with_id(ID);
    let err = h.resource.delete(&mut state).await.unwrap_err();

    assert_matches!(err, Error::ConvergenceTimeout { ref state, .. } if state == "Deleting");
    assert_eq!(state.id.as_deref(), Some(ID));
}

// =============================================================================
// Exists
// =============================================================================

#[tokio::test]
async fn exists_maps_read_results() {
    let h = harness();

    assert_matches!(h.resource.exists(ID).await, (false, None));

    seed(&h.store, "fedora");
    assert_matches!(h.resource.exists(ID).await, (true, None));

    h.store
        .script_reads(ID, [ReadBehaviour::Failure("etcd unavailable".to_string())]);
    assert_matches!(h.resource.exists(ID).await, (true, Some(Error::Kube(_))));
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn malformed_id_fails_before_remote_calls() {
    let h = harness();
    let bad = "novalidseparator";

    let err = h
        .resource
        .read(&mut ResourceState::with_id(bad))
        .await
        .unwrap_err();
    assert_matches!(err, Error::MalformedIdentity(ref id) if id == bad);

    let err = h
        .resource
        .update(&mut ResourceState::with_id(bad), &http_config("fedora"))
        .await
        .unwrap_err();
    assert_matches!(err, Error::MalformedIdentity(_));

    let err = h
        .resource
        .delete(&mut ResourceState::with_id(bad))
        .await
        .unwrap_err();
    assert_matches!(err, Error::MalformedIdentity(_));

    assert_matches!(
        h.resource.exists(bad).await,
        (false, Some(Error::MalformedIdentity(_)))
    );

    assert!(h.store.calls().is_empty());
}
