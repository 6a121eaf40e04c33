//! DataVolume lifecycle controller
//!
//! Implements Create, Read, Update, Delete, Exists and Import against a
//! [`DataVolumeStore`], keeping the local [`ResourceState`] in sync.
//!
//! # Create
//!
//! ```text
//! validate → expand → strip status → create → record id → Create-Wait → flatten
//! ```
//!
//! Create-Wait polls until the phase is `Succeeded` or `Failed`. An object
//! that is not visible yet counts as still creating. The id and the created
//! object are recorded before waiting, so a failed or timed out wait leaves
//! the last observed object in the state for a later Update or Delete.
//!
//! # Delete
//!
//! ```text
//! delete → Delete-Wait → clear id
//! ```
//!
//! Delete-Wait polls until the object is no longer found.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ResourceState;
use crate::config::ProviderConfig;
use crate::crd::{DataVolume, DataVolumePhase};
use crate::domain::events::LifecycleEvent;
use crate::domain::ports::{DataVolumeStore, EventPublisher};
use crate::error::{Error, Result};
use crate::identity::{parse_id, ResourceId};
use crate::schema::{
    expand_data_volume, flatten_data_volume, patch_metadata, patch_paths, DataVolumeConfig,
    MetadataBlock, DEFAULT_NAMESPACE,
};
use crate::waiter::{Refresh, StateChangeConf};

/// Pending label of Create-Wait
pub const STATE_CREATING: &str = "Creating";

/// Pending label of Delete-Wait
pub const STATE_DELETING: &str = "Deleting";

/// JSON pointer of the object metadata in patch documents
const METADATA_PATH: &str = "/metadata/";

/// Lifecycle controller for DataVolume resources
pub struct DataVolumeResource {
    store: Arc<dyn DataVolumeStore>,
    events: Arc<dyn EventPublisher>,
    config: ProviderConfig,
    cancellation: Option<CancellationToken>,
}

impl DataVolumeResource {
    pub fn new(
        store: Arc<dyn DataVolumeStore>,
        events: Arc<dyn EventPublisher>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
            cancellation: None,
        }
    }

    /// Abort in-flight waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn wait_conf(&self, id: &ResourceId, timeout: Duration) -> StateChangeConf {
        StateChangeConf::new(format!("DataVolume {}", id), timeout)
            .schedule(self.config.poll)
            .max_consecutive_errors(self.config.max_consecutive_errors)
            .cancellation(self.cancellation.clone())
    }

    /// Submit the configured DataVolume and wait for it to be populated.
    #[instrument(skip(self, state))]
    pub async fn create(&self, state: &mut ResourceState) -> Result<()> {
        state.config.validate()?;

        let mut dv = expand_data_volume(&state.config)?;
        dv.status = None;

        info!(
            namespace = ?dv.metadata.namespace,
            name = ?dv.metadata.name,
            "Creating new data volume"
        );
        let created = self.store.create_data_volume(&dv).await?;
        let id = created.resource_id()?;
        state.set_id(&id);
        state.config = flatten_data_volume(&created);

        let source = created
            .spec
            .source
            .as_ref()
            .map(|s| s.kind())
            .unwrap_or_default();
        info!(id = %id, source = source, "Submitted new data volume");
        publish(
            self.events.as_ref(),
            LifecycleEvent::create_submitted(id.to_string(), source),
        )
        .await;

        let conf = self
            .wait_conf(&id, self.config.timeouts.create)
            .pending([STATE_CREATING])
            .failure([DataVolumePhase::Failed.as_str()]);

        let store = self.store.as_ref();
        let events = self.events.as_ref();
        let id_str = id.to_string();
        let (id_ref, namespace, name) = (id_str.as_str(), id.namespace.as_str(), id.name.as_str());
        let last_observed = Mutex::new(None::<DataVolume>);
        let last = &last_observed;

        let result = conf
            .wait_for_state(move || async move {
                let observed = store.read_data_volume(namespace, name).await;
                if let Ok(dv) = &observed {
                    *last.lock() = Some(dv.clone());
                    publish(
                        events,
                        LifecycleEvent::phase_observed(id_ref, dv.phase().as_str(), dv.progress()),
                    )
                    .await;
                }
                creation_state(observed)
            })
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(dv) = last_observed.lock().take() {
                    state.config = flatten_data_volume(&dv);
                }
                self.report_wait_failure(&id_str, &e, self.config.timeouts.create)
                    .await;
                return Err(e);
            }
        };

        let dv = outcome
            .value
            .ok_or_else(|| Error::Internal(format!("create wait for {} returned no object", id)))?;
        info!(id = %id, polls = outcome.polls, "Data volume populated");
        publish(
            self.events.as_ref(),
            LifecycleEvent::converged(id_ref, dv.phase().as_str(), outcome.polls, outcome.elapsed),
        )
        .await;

        state.config = flatten_data_volume(&dv);
        Ok(())
    }

    /// Refresh the local configuration from the cluster.
    #[instrument(skip(self, state), fields(id = ?state.id))]
    pub async fn read(&self, state: &mut ResourceState) -> Result<()> {
        let id = parse_id(state.id.as_deref().unwrap_or_default())?;

        info!(name = %id.name, "Reading data volume");
        let dv = self.store.read_data_volume(&id.namespace, &id.name).await?;
        debug!(phase = %dv.phase(), "Received data volume");

        state.config = flatten_data_volume(&dv);
        Ok(())
    }

    /// Patch labels and annotations from the recorded state to `desired`,
    /// then refresh. Spec fields are never resubmitted, and the name and
    /// namespace cannot change.
    #[instrument(skip(self, state, desired), fields(id = ?state.id))]
    pub async fn update(&self, state: &mut ResourceState, desired: &DataVolumeConfig) -> Result<()> {
        let id = parse_id(state.id.as_deref().unwrap_or_default())?;
        desired.validate()?;

        let desired_meta = desired.metadata_block();
        check_identity_unchanged(&id, &desired_meta)?;

        let patch = patch_metadata(METADATA_PATH, &state.config.metadata_block(), &desired_meta);
        let paths = patch_paths(&patch);

        if paths.is_empty() {
            debug!("No metadata changes to submit");
        } else {
            info!(operations = ?paths, "Updating data volume");
            self.store
                .update_data_volume(&id.namespace, &id.name, &patch)
                .await?;
            publish(
                self.events.as_ref(),
                LifecycleEvent::metadata_patched(id.to_string(), paths),
            )
            .await;
        }

        self.read(state).await
    }

    /// Delete the DataVolume and wait until it is gone.
    #[instrument(skip(self, state), fields(id = ?state.id))]
    pub async fn delete(&self, state: &mut ResourceState) -> Result<()> {
        let id = parse_id(state.id.as_deref().unwrap_or_default())?;

        info!(name = %id.name, "Deleting data volume");
        match self.store.delete_data_volume(&id.namespace, &id.name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Data volume already absent"),
            Err(e) => return Err(e),
        }
        publish(
            self.events.as_ref(),
            LifecycleEvent::delete_submitted(id.to_string()),
        )
        .await;

        let conf = self
            .wait_conf(&id, self.config.timeouts.delete)
            .pending([STATE_DELETING])
            .absent_is_done(true);

        let store = self.store.as_ref();
        let (namespace, name) = (id.namespace.as_str(), id.name.as_str());

        let outcome = match conf
            .wait_for_state(move || async move {
                deletion_state(store.read_data_volume(namespace, name).await)
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_wait_failure(&id.to_string(), &e, self.config.timeouts.delete)
                    .await;
                return Err(e);
            }
        };

        info!(name = %id.name, polls = outcome.polls, "Data volume deleted");
        publish(
            self.events.as_ref(),
            LifecycleEvent::deleted(id.to_string(), outcome.polls),
        )
        .await;

        state.clear_id();
        Ok(())
    }

    /// Check whether the DataVolume behind `id` exists.
    ///
    /// Any read failure other than not-found reports `true` together with
    /// the error, so a transient failure never looks like a deletion.
    #[instrument(skip(self))]
    pub async fn exists(&self, id: &str) -> (bool, Option<Error>) {
        let id = match parse_id(id) {
            Ok(id) => id,
            Err(e) => return (false, Some(e)),
        };

        info!(name = %id.name, "Checking data volume");
        match self.store.read_data_volume(&id.namespace, &id.name).await {
            Ok(_) => (true, None),
            Err(e) if e.is_not_found() => (false, None),
            Err(e) => {
                debug!(error = %e, "Received error");
                (true, Some(e))
            }
        }
    }

    /// Adopt an existing DataVolume into a fresh state.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<ResourceState> {
        let mut state = ResourceState::with_id(id);
        self.read(&mut state).await?;
        Ok(state)
    }

    async fn report_wait_failure(&self, id: &str, err: &Error, timeout: Duration) {
        let event = match err {
            Error::ConvergenceFailure { state, .. } => {
                LifecycleEvent::convergence_failed(id, state.as_str())
            }
            Error::ConvergenceTimeout { state, .. } => {
                LifecycleEvent::convergence_timed_out(id, state.as_str(), timeout)
            }
            _ => return,
        };
        publish(self.events.as_ref(), event).await;
    }
}

impl std::fmt::Debug for DataVolumeResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataVolumeResource")
            .field("config", &self.config)
            .finish()
    }
}

/// Event delivery never fails an operation.
async fn publish(events: &dyn EventPublisher, event: LifecycleEvent) {
    if let Err(e) = events.publish(event).await {
        warn!(error = %e, "Failed to publish lifecycle event");
    }
}

/// Name and namespace are fixed at creation. An empty name is allowed for
/// objects created from `generate_name`.
fn check_identity_unchanged(id: &ResourceId, desired: &MetadataBlock) -> Result<()> {
    let namespace = if desired.namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        desired.namespace.as_str()
    };
    if namespace != id.namespace {
        return Err(Error::Validation(format!(
            "metadata.0.namespace: cannot change from {:?} to {:?}",
            id.namespace, namespace
        )));
    }
    if !desired.name.is_empty() && desired.name != id.name {
        return Err(Error::Validation(format!(
            "metadata.0.name: cannot change from {:?} to {:?}",
            id.name, desired.name
        )));
    }
    Ok(())
}

/// Map a read during Create-Wait to a wait state.
fn creation_state(observed: Result<DataVolume>) -> Result<Refresh<DataVolume>> {
    match observed {
        Err(e) if e.is_not_found() => {
            debug!("Data volume is not created yet");
            Ok(Refresh::empty(STATE_CREATING))
        }
        Err(e) => Err(e),
        Ok(dv) => match dv.phase() {
            DataVolumePhase::Succeeded => Ok(Refresh::new(dv, DataVolumePhase::Succeeded.as_str())),
            DataVolumePhase::Failed => Ok(Refresh::new(dv, DataVolumePhase::Failed.as_str())),
            phase => {
                debug!(phase = %phase, "Data volume is being created");
                Ok(Refresh::new(dv, STATE_CREATING))
            }
        },
    }
}

/// Map a read during Delete-Wait to a wait state.
fn deletion_state(observed: Result<DataVolume>) -> Result<Refresh<DataVolume>> {
    let dv = observed?;
    debug!(name = ?dv.metadata.name, "Data volume is being deleted");
    Ok(Refresh::new(dv, STATE_DELETING))
}
