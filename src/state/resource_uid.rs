//! Canonical resource identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The globally unique identifier of a resource, with the string form
/// `<type>.<class>#<id>`.
///
/// The id segment is either the declaration's explicit id, shared across
/// every workload that names it, or `<workload>.<resource>` scoping the
/// resource to a single workload's declaration. Always construct through
/// [`ResourceUid::new`]; the accessors split on the first `.` and first `#`,
/// so raw type and class values must not contain those characters (upstream
/// schema validation enforces this).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUid(String);

impl ResourceUid {
    /// Derive the uid for a resource declared in a workload. `class` defaults
    /// to `"default"` when not provided.
    pub fn new(
        workload_name: &str,
        res_name: &str,
        res_type: &str,
        res_class: Option<&str>,
        res_id: Option<&str>,
    ) -> Self {
        let class = res_class.unwrap_or("default");
        match res_id {
            Some(id) => Self(format!("{res_type}.{class}#{id}")),
            None => Self(format!("{res_type}.{class}#{workload_name}.{res_name}")),
        }
    }

    /// The resource type segment.
    pub fn res_type(&self) -> &str {
        &self.0[..self.0.find('.').unwrap_or(0)]
    }

    /// The resource class segment, `"default"` unless declared otherwise.
    pub fn class(&self) -> &str {
        let start = self.0.find('.').map_or(0, |i| i + 1);
        let end = self.0.find('#').unwrap_or(self.0.len());
        &self.0[start..end]
    }

    /// The identity segment, either the explicit id or
    /// `<workload>.<resource>`.
    pub fn id(&self) -> &str {
        let start = self.0.find('#').map_or(0, |i| i + 1);
        &self.0[start..]
    }

    /// The full `type.class#id` string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_without_id_scopes_to_the_workload() {
        let uid = ResourceUid::new("my-workload", "db", "postgres", None, None);
        assert_eq!(uid.as_str(), "postgres.default#my-workload.db");
        assert_eq!(uid.res_type(), "postgres");
        assert_eq!(uid.class(), "default");
        assert_eq!(uid.id(), "my-workload.db");
    }

    #[test]
    fn uid_with_class_and_id_round_trips() {
        let uid = ResourceUid::new("my-workload", "db", "postgres", Some("large"), Some("shared"));
        assert_eq!(uid.as_str(), "postgres.large#shared");
        assert_eq!(uid.res_type(), "postgres");
        assert_eq!(uid.class(), "large");
        assert_eq!(uid.id(), "shared");
    }

    #[test]
    fn explicit_id_is_identical_across_workloads() {
        let a = ResourceUid::new("w1", "db", "postgres", None, Some("shared"));
        let b = ResourceUid::new("w2", "data", "postgres", None, Some("shared"));
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_a_plain_string() {
        let uid = ResourceUid::new("w", "r", "volume", None, None);
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"volume.default#w.r\"");
        let back: ResourceUid = serde_json::from_str("\"volume.default#w.r\"").unwrap();
        assert_eq!(back, uid);
    }
}
