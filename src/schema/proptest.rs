//! Property-Based Tests for State Conversion
//!
//! # Test Properties
//!
//! 1. **Round-trip**: expand(flatten(dv)) preserves metadata identity,
//!    source, claim spec and content type
//! 2. **Idempotent flatten**: flattening twice yields identical documents
//! 3. **Stable re-flatten**: flatten(expand(flatten(dv))) = flatten(dv) for
//!    the fields the configuration controls

#![cfg(test)]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use proptest::prelude::*;

use super::{expand_data_volume, flatten_data_volume};
use crate::crd::{
    ContentType, DataVolume, DataVolumePhase, DataVolumeSource, DataVolumeSourceHttp,
    DataVolumeSourcePvc, DataVolumeSpec, DataVolumeStatus,
};

// =============================================================================
// Property Strategies
// =============================================================================

fn dns_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,14}[a-z0-9]"
}

fn optional_name() -> impl Strategy<Value = Option<String>> {
    prop::option::of(dns_name())
}

fn labels() -> impl Strategy<Value = Option<BTreeMap<String, String>>> {
    prop::option::of(prop::collection::btree_map(dns_name(), "[a-z0-9]{1,8}", 1..4))
}

fn source_strategy() -> impl Strategy<Value = DataVolumeSource> {
    prop_oneof![
        ("[a-z]{3,10}", optional_name(), optional_name()).prop_map(|(host, secret, certs)| {
            DataVolumeSource::Http(DataVolumeSourceHttp {
                url: format!("https://{}.example.com/disk.img", host),
                secret_ref: secret,
                cert_config_map: certs,
            })
        }),
        (dns_name(), optional_name()).prop_map(|(namespace, name)| {
            DataVolumeSource::Pvc(DataVolumeSourcePvc { namespace, name })
        }),
    ]
}

fn quantity() -> impl Strategy<Value = String> {
    (1u32..2048, prop::sample::select(vec!["", "Ki", "Mi", "Gi", "Ti", "M", "G"]))
        .prop_map(|(n, suffix)| format!("{}{}", n, suffix))
}

fn claim_strategy() -> impl Strategy<Value = PersistentVolumeClaimSpec> {
    (
        prop::option::of(prop::sample::subsequence(
            vec!["ReadWriteOnce", "ReadOnlyMany", "ReadWriteMany"],
            1..=3,
        )),
        prop::option::of(quantity()),
        optional_name(),
        prop::option::of(prop::sample::select(vec!["Filesystem", "Block"])),
    )
        .prop_map(|(modes, storage, class, mode)| PersistentVolumeClaimSpec {
            access_modes: modes.map(|m| m.into_iter().map(String::from).collect()),
            resources: storage.map(|s| VolumeResourceRequirements {
                requests: Some([("storage".to_string(), Quantity(s))].into()),
                limits: None,
            }),
            storage_class_name: class,
            volume_mode: mode.map(String::from),
            ..Default::default()
        })
}

fn data_volume_strategy() -> impl Strategy<Value = DataVolume> {
    (
        dns_name(),
        dns_name(),
        labels(),
        source_strategy(),
        claim_strategy(),
        prop::option::of(prop::sample::select(ContentType::ALL.to_vec())),
        prop::sample::select(DataVolumePhase::ALL.to_vec()),
    )
        .prop_map(|(name, namespace, labels, source, pvc, content_type, phase)| {
            let mut dv = DataVolume::new(
                &name,
                DataVolumeSpec {
                    source: Some(source),
                    pvc,
                    content_type,
                },
            );
            dv.metadata = ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels,
                ..Default::default()
            };
            dv.status = Some(DataVolumeStatus {
                phase,
                progress: String::new(),
            });
            dv
        })
}

// =============================================================================
// Round-trip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: expand(flatten(dv)) preserves every field the configuration controls.
    #[test]
    fn prop_round_trip_preserves_controlled_fields(dv in data_volume_strategy()) {
        let expanded = expand_data_volume(&flatten_data_volume(&dv))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(&expanded.metadata.name, &dv.metadata.name);
        prop_assert_eq!(&expanded.metadata.namespace, &dv.metadata.namespace);
        prop_assert_eq!(&expanded.metadata.labels, &dv.metadata.labels);
        prop_assert_eq!(&expanded.spec.source, &dv.spec.source);
        prop_assert_eq!(&expanded.spec.pvc, &dv.spec.pvc);
        prop_assert_eq!(expanded.spec.content_type, dv.spec.content_type);
    }

    /// Property: flattening the same object twice is identical.
    #[test]
    fn prop_flatten_idempotent(dv in data_volume_strategy()) {
        prop_assert_eq!(flatten_data_volume(&dv), flatten_data_volume(&dv));
    }

    /// Property: re-flattening an expanded document reproduces it.
    #[test]
    fn prop_reflatten_stable(dv in data_volume_strategy()) {
        let first = flatten_data_volume(&dv);
        let second = flatten_data_volume(
            &expand_data_volume(&first).map_err(|e| TestCaseError::fail(e.to_string()))?,
        );

        prop_assert_eq!(&second.spec, &first.spec);
        prop_assert_eq!(&second.status, &first.status);
        prop_assert_eq!(&second.metadata[0].name, &first.metadata[0].name);
        prop_assert_eq!(&second.metadata[0].labels, &first.metadata[0].labels);
    }
}
