//! Custom Resource Definitions
//!
//! This module contains the CDI resources managed by the provider.

mod data_volume;

pub use data_volume::{
    ContentType, DataVolume, DataVolumePhase, DataVolumeSource, DataVolumeSourceHttp,
    DataVolumeSourcePvc, DataVolumeSpec, DataVolumeStatus,
};
