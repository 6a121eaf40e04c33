//! Namespaced object metadata block
//!
//! Shared between every namespaced resource: identity fields the user sets,
//! plus server-computed fields that are only ever flattened.

use std::collections::BTreeMap;

use json_patch::Patch;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Namespace used when the configuration leaves it empty.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Standard object metadata of a namespaced resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetadataBlock {
    /// Name of the object, unique within its namespace
    pub name: String,

    /// Prefix the server uses to generate a unique name when `name` is empty
    pub generate_name: String,

    /// Namespace of the object, `default` when empty
    pub namespace: String,

    /// Map of string keys and values used to organize and select objects
    pub labels: BTreeMap<String, String>,

    /// Unstructured key/value map stored with the object
    pub annotations: BTreeMap<String, String>,

    /// Sequence number of the desired state (computed)
    pub generation: i64,

    /// Opaque version of the object, used for optimistic concurrency (computed)
    pub resource_version: String,

    /// Unique identifier assigned by the server (computed)
    pub uid: String,
}

/// Keys Kubernetes components write for their own bookkeeping. These are
/// never reflected into configuration so they cannot show up as drift.
pub fn is_internal_key(key: &str) -> bool {
    key.contains("kubernetes.io/") || key.contains("k8s.io/")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn non_empty_map(m: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!m.is_empty()).then(|| m.clone())
}

fn without_internal_keys(m: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
    m.into_iter()
        .flatten()
        .filter(|(k, _)| !is_internal_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build object metadata from the (at most one) metadata block.
pub fn expand_metadata(blocks: &[MetadataBlock]) -> ObjectMeta {
    let Some(block) = blocks.first() else {
        return ObjectMeta {
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            ..Default::default()
        };
    };

    ObjectMeta {
        name: non_empty(&block.name),
        generate_name: non_empty(&block.generate_name),
        namespace: Some(non_empty(&block.namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())),
        labels: non_empty_map(&block.labels),
        annotations: non_empty_map(&block.annotations),
        ..Default::default()
    }
}

/// Flatten object metadata into a single metadata block.
pub fn flatten_metadata(meta: &ObjectMeta) -> Vec<MetadataBlock> {
    vec![MetadataBlock {
        name: meta.name.clone().unwrap_or_default(),
        generate_name: meta.generate_name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        labels: without_internal_keys(meta.labels.as_ref()),
        annotations: without_internal_keys(meta.annotations.as_ref()),
        generation: meta.generation.unwrap_or_default(),
        resource_version: meta.resource_version.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
    }]
}

/// Build JSON patch operations for the labels and annotations that differ
/// between the prior and desired metadata. `path_prefix` is the JSON pointer
/// of the metadata object, e.g. `/metadata/`.
///
/// A map the server does not have yet is added whole and a map that becomes
/// empty is removed whole; otherwise keys are added, replaced or removed
/// one by one.
pub fn patch_metadata(path_prefix: &str, prior: &MetadataBlock, desired: &MetadataBlock) -> Patch {
    json_patch::diff(
        &tracked_fields(path_prefix, prior),
        &tracked_fields(path_prefix, desired),
    )
}

/// Labels and annotations nested under `path_prefix`, omitting empty maps
/// the way the server does.
fn tracked_fields(path_prefix: &str, block: &MetadataBlock) -> Value {
    let mut fields = Map::new();
    for (key, map) in [("labels", &block.labels), ("annotations", &block.annotations)] {
        if !map.is_empty() {
            fields.insert(key.to_string(), json!(map));
        }
    }

    path_prefix
        .split('/')
        .filter(|token| !token.is_empty())
        .rev()
        .fold(Value::Object(fields), |inner, token| {
            let mut outer = Map::new();
            outer.insert(token.to_string(), inner);
            Value::Object(outer)
        })
}
