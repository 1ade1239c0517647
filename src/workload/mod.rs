//! Typed workload specification structures.
//!
//! These are the shapes the upstream document loader hands to the engine once
//! decoding and schema validation have already happened. The engine trusts the
//! structure but still re-checks the one field it cannot work without: a
//! non-empty `metadata.name` string ([`WorkloadSpec::name`]).
//!
//! Field names follow the document format exactly (`apiVersion`,
//! `targetPort`, `read_only`, ...) so a spec survives a serialize/deserialize
//! round trip byte-for-byte in key terms. Free-form sections (workload
//! metadata, resource metadata and params) are kept as dynamic
//! [`serde_json::Value`] trees because callers address into them with
//! `${...}` placeholder paths rather than typed access.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single validated workload document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// The declared document version, e.g. `plait.dev/v1`.
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,

    /// Workload metadata. Must contain a non-empty `name` string; anything
    /// else in here is available to `${metadata...}` placeholders.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Optional network service exposed by the workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSpec>,

    /// Containers by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: BTreeMap<String, ContainerSpec>,

    /// Declared resource dependencies by local name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceSpec>,
}

impl WorkloadSpec {
    /// The workload name from `metadata.name`, if it is a non-empty string.
    ///
    /// Upstream validation guarantees this exists, but the engine re-checks
    /// defensively since the name keys every other structure.
    pub fn name(&self) -> Option<&str> {
        self.metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
    }
}

/// A declared resource dependency of a workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// The resource type, e.g. `postgres` or `volume`. Drives provisioner
    /// selection downstream.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Optional resource class, a caller-defined specialization of the type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Optional explicit id. When set, every workload declaring a resource
    /// with the same type, class, and id shares a single resource instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Free-form metadata attached to the declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Free-form provisioning parameters. May contain `${resources...}` and
    /// `${metadata...}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

/// The network service section of a workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Published ports by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, ServicePort>,
}

/// One published service port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
    /// The public port number.
    pub port: u16,

    /// The container port to forward to, defaulting to `port` downstream.
    #[serde(
        rename = "targetPort",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_port: Option<u16>,

    /// The transport protocol, e.g. `TCP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// One container within a workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// The container image reference.
    pub image: String,

    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Entrypoint arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Environment variables. Values may contain placeholders.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Files mounted into the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ContainerFile>,

    /// Volumes mounted into the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<ContainerVolume>,
}

/// A file projected into a container at a target path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerFile {
    /// Absolute path of the file inside the container.
    pub target: String,

    /// Optional octal mode string, e.g. `"0644"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Path of a source file relative to the workload document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Inline content. May contain placeholders unless `no_expand` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Disables placeholder expansion for this file's content.
    #[serde(
        rename = "noExpand",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub no_expand: Option<bool>,
}

/// A volume mounted into a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerVolume {
    /// The volume source, commonly a `${resources.<name>}` placeholder.
    pub source: String,

    /// Mount path inside the container.
    pub target: String,

    /// Optional sub-path within the volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Mount read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(name: &str) -> WorkloadSpec {
        let mut spec = WorkloadSpec::default();
        spec.metadata.insert("name".into(), json!(name));
        spec
    }

    #[test]
    fn name_returns_the_metadata_name() {
        assert_eq!(named("web").name(), Some("web"));
    }

    #[test]
    fn name_rejects_missing_empty_and_non_string() {
        assert_eq!(WorkloadSpec::default().name(), None);
        assert_eq!(named("").name(), None);
        let mut spec = WorkloadSpec::default();
        spec.metadata.insert("name".into(), json!(42));
        assert_eq!(spec.name(), None);
    }

    #[test]
    fn resource_spec_round_trips_document_field_names() {
        let raw = json!({
            "type": "postgres",
            "class": "large",
            "id": "shared-db",
            "params": {"extensions": ["uuid-ossp"]}
        });
        let res: ResourceSpec = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(res.resource_type, "postgres");
        assert_eq!(res.class.as_deref(), Some("large"));
        assert_eq!(res.id.as_deref(), Some("shared-db"));
        assert_eq!(serde_json::to_value(&res).unwrap(), raw);
    }

    #[test]
    fn container_port_uses_camel_case_target_port() {
        let port: ServicePort =
            serde_json::from_value(json!({"port": 80, "targetPort": 8080})).unwrap();
        assert_eq!(port.target_port, Some(8080));
    }
}
