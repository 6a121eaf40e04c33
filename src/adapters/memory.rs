//! In-memory DataVolume Store
//!
//! Scriptable implementation of the `DataVolumeStore` port. Reads can be
//! scripted per object to replay phase progressions, disappearances and
//! server failures, and deletions can lag behind the delete request the way
//! finalizers make them lag on a real cluster.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use kube::core::ErrorResponse;
use parking_lot::Mutex;

use crate::crd::{DataVolume, DataVolumePhase};
use crate::domain::ports::DataVolumeStore;
use crate::error::{Error, Result};
use crate::identity::build_id;

/// How the next read of an object behaves.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadBehaviour {
    /// Return the stored object unchanged
    Stored,
    /// Move the stored object to this phase, then return it
    Phase(DataVolumePhase),
    /// Report the object as absent without touching it
    NotFound,
    /// Fail with a server error carrying this message
    Failure(String),
}

/// A call received by the store, keyed by `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create(String),
    Read(String),
    Update(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, DataVolume>,
    scripts: HashMap<String, VecDeque<ReadBehaviour>>,
    /// Reads left before a deleted object disappears
    terminating: HashMap<String, u32>,
    deletion_lag: u32,
    create_failure: Option<String>,
    resource_version: u64,
    calls: Vec<StoreCall>,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// DataVolume store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDataVolumeStore {
    state: Mutex<State>,
}

impl InMemoryDataVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep deleted objects visible for `reads` further reads.
    pub fn with_deletion_lag(self, reads: u32) -> Self {
        self.state.lock().deletion_lag = reads;
        self
    }

    /// Seed an object as if it had been created earlier.
    pub fn insert(&self, mut dv: DataVolume) -> Result<String> {
        let id = dv.resource_id()?.to_string();
        let mut state = self.state.lock();
        dv.metadata.resource_version = Some(state.next_resource_version());
        dv.metadata.uid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        state.objects.insert(id.clone(), dv);
        Ok(id)
    }

    /// Queue read behaviours for `id`. Once the queue drains, reads return
    /// the stored object.
    pub fn script_reads(&self, id: &str, reads: impl IntoIterator<Item = ReadBehaviour>) {
        self.state
            .lock()
            .scripts
            .entry(id.to_string())
            .or_default()
            .extend(reads);
    }

    /// Reject the next create call with a server error.
    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.state.lock().create_failure = Some(message.into());
    }

    pub fn get(&self, id: &str) -> Option<DataVolume> {
        self.state.lock().objects.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().objects.contains_key(id)
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Number of reads received for `id`.
    pub fn read_count(&self, id: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Read(r) if r == id))
            .count()
    }
}

fn api_error(code: u16, reason: &str, message: impl Into<String>) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.into(),
        reason: reason.to_string(),
        code,
    }))
}

fn not_found(namespace: &str, name: &str) -> Error {
    Error::NotFound {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl DataVolumeStore for InMemoryDataVolumeStore {
    async fn create_data_volume(&self, dv: &DataVolume) -> Result<DataVolume> {
        let mut created = dv.clone();
        let namespace = created
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| Error::Validation("metadata.namespace is not set".to_string()))?;

        let name = match (
            created.metadata.name.as_deref().filter(|n| !n.is_empty()),
            created.metadata.generate_name.as_deref(),
        ) {
            (Some(name), _) => name.to_string(),
            (None, Some(prefix)) if !prefix.is_empty() => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("{}{}", prefix, &suffix[..5])
            }
            _ => {
                return Err(api_error(
                    422,
                    "Invalid",
                    "name or generateName is required",
                ))
            }
        };
        let id = build_id(&namespace, &name);

        let mut state = self.state.lock();
        state.calls.push(StoreCall::Create(id.clone()));

        if let Some(message) = state.create_failure.take() {
            return Err(api_error(500, "InternalError", message));
        }
        if state.objects.contains_key(&id) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("datavolumes.cdi.kubevirt.io {:?} already exists", name),
            ));
        }

        created.metadata.name = Some(name);
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.metadata.generation = Some(1);
        created.metadata.resource_version = Some(state.next_resource_version());

        state.objects.insert(id, created.clone());
        Ok(created)
    }

    async fn read_data_volume(&self, namespace: &str, name: &str) -> Result<DataVolume> {
        let id = build_id(namespace, name);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.push(StoreCall::Read(id.clone()));

        if let Some(remaining) = state.terminating.get_mut(&id) {
            if *remaining == 0 {
                state.terminating.remove(&id);
                state.objects.remove(&id);
                return Err(not_found(namespace, name));
            }
            *remaining -= 1;
        }

        let behaviour = state
            .scripts
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ReadBehaviour::Stored);

        match behaviour {
            ReadBehaviour::Stored => state
                .objects
                .get(&id)
                .cloned()
                .ok_or_else(|| not_found(namespace, name)),
            ReadBehaviour::Phase(phase) => {
                let dv = state
                    .objects
                    .get_mut(&id)
                    .ok_or_else(|| not_found(namespace, name))?;
                dv.status.get_or_insert_with(Default::default).phase = phase;
                Ok(dv.clone())
            }
            ReadBehaviour::NotFound => Err(not_found(namespace, name)),
            ReadBehaviour::Failure(message) => Err(api_error(500, "InternalError", message)),
        }
    }

    async fn update_data_volume(
        &self,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<DataVolume> {
        let id = build_id(namespace, name);

        let mut state = self.state.lock();
        state.calls.push(StoreCall::Update(id.clone()));

        let current = state
            .objects
            .get(&id)
            .ok_or_else(|| not_found(namespace, name))?;

        let mut doc = serde_json::to_value(current)?;
        json_patch::patch(&mut doc, &patch.0)
            .map_err(|e| api_error(422, "Invalid", e.to_string()))?;

        let mut updated: DataVolume = serde_json::from_value(doc)?;
        updated.metadata.resource_version = Some(state.next_resource_version());
        state.objects.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_data_volume(&self, namespace: &str, name: &str) -> Result<()> {
        let id = build_id(namespace, name);
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Delete(id.clone()));

        if !state.objects.contains_key(&id) || state.terminating.contains_key(&id) {
            return Err(not_found(namespace, name));
        }

        if state.deletion_lag == 0 {
            state.objects.remove(&id);
        } else {
            let lag = state.deletion_lag;
            state.terminating.insert(id, lag);
        }
        Ok(())
    }
}
