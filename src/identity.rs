//! Resource identity codec
//!
//! A DataVolume is addressed remotely by its `(namespace, name)` pair. The
//! provider keeps that pair locally as a single `namespace/name` string.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::error::{Error, Result};

/// Separator between namespace and name in a resource id.
pub const ID_SEPARATOR: char = '/';

/// Identity key of a DataVolume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Derive the identity from object metadata.
    ///
    /// Fails when either the namespace or the name is missing, which happens
    /// for objects the API server has not assigned a name to yet.
    pub fn from_meta(meta: &ObjectMeta) -> Result<Self> {
        match (meta.namespace.as_deref(), meta.name.as_deref()) {
            (Some(ns), Some(name)) if !ns.is_empty() && !name.is_empty() => {
                Ok(Self::new(ns, name))
            }
            _ => Err(Error::MalformedIdentity(format!(
                "{}{}{}",
                meta.namespace.as_deref().unwrap_or_default(),
                ID_SEPARATOR,
                meta.name.as_deref().unwrap_or_default()
            ))),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, ID_SEPARATOR, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_id(s)
    }
}

/// Join namespace and name into a resource id.
pub fn build_id(namespace: &str, name: &str) -> String {
    format!("{}{}{}", namespace, ID_SEPARATOR, name)
}

/// Split a resource id into its namespace and name.
pub fn parse_id(id: &str) -> Result<ResourceId> {
    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    match parts.as_slice() {
        [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
            Ok(ResourceId::new(*namespace, *name))
        }
        _ => Err(Error::MalformedIdentity(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_build_and_parse() {
        let id = build_id("images", "fedora");
        assert_eq!(id, "images/fedora");

        let parsed = parse_id(&id).unwrap();
        assert_eq!(parsed, ResourceId::new("images", "fedora"));
        assert_eq!(parsed.to_string(), id);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["novalidseparator", "", "/", "ns/", "/name", "a/b/c"] {
            assert_matches!(parse_id(bad), Err(Error::MalformedIdentity(s)) if s == bad);
        }
    }

    #[test]
    fn test_from_str() {
        let id: ResourceId = "default/dv".parse().unwrap();
        assert_eq!(id.namespace, "default");
        assert_eq!(id.name, "dv");
        assert!("default".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_from_meta() {
        let meta = ObjectMeta {
            name: Some("dv".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        };
        assert_eq!(
            ResourceId::from_meta(&meta).unwrap(),
            ResourceId::new("default", "dv")
        );

        let unnamed = ObjectMeta {
            generate_name: Some("dv-".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        };
        assert_matches!(
            ResourceId::from_meta(&unnamed),
            Err(Error::MalformedIdentity(_))
        );
    }
}
