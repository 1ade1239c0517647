//! Error types for the plait engine.
//!
//! Every public operation in this crate returns [`PlaitError`] on failure. The
//! variants map one-to-one onto the failure modes of the engine:
//!
//! - **Workload accumulation**: [`PlaitError::MissingWorkloadName`]
//! - **Resource priming**: [`PlaitError::ConflictingDefinition`]
//! - **Dependency extraction**: [`PlaitError::DanglingReference`]
//! - **Placeholder resolution**: [`PlaitError::UnsupportedReferenceRoot`],
//!   [`PlaitError::UnknownResource`], [`PlaitError::InvalidReference`]
//! - **Ordering**: [`PlaitError::CycleDetected`]
//! - **Output lookup**: [`PlaitError::LookupKeyNotFound`],
//!   [`PlaitError::LookupNotAMap`], [`PlaitError::NoLookupKeys`]
//!
//! None of these failures leave partial state behind: every mutating operation
//! on [`crate::state::State`] builds its result in a fresh copy, so the value
//! the caller already holds stays valid whenever an error is returned.
//!
//! Multiple placeholder failures inside a single string are aggregated into
//! one [`PlaitError::Aggregated`] rather than short-circuiting on the first,
//! so a user fixing a broken document sees every bad reference at once.

use thiserror::Error;

use crate::state::ResourceUid;

/// The error type for all fallible operations in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaitError {
    /// The workload specification has no usable `metadata.name`.
    #[error("metadata: name: is missing or is not a string")]
    MissingWorkloadName,

    /// Two declarations of the same resource uid disagree on a non-empty
    /// field. `field` is either `"params"` or `"metadata"`.
    #[error("resource '{uid}': multiple definitions with different {field}")]
    ConflictingDefinition { uid: ResourceUid, field: &'static str },

    /// A resource's params reference a resource name that is not declared in
    /// the same workload. Wraps the underlying reference error with the
    /// declaring workload and resource for context.
    #[error("workload '{workload}' resource '{resource}': {source}")]
    DanglingReference {
        workload: String,
        resource: String,
        source: Box<PlaitError>,
    },

    /// Inner error for [`PlaitError::DanglingReference`]: the named resource
    /// does not exist in the declaring workload.
    #[error("refers to unknown resource name '{name}'")]
    UnknownResourceName { name: String },

    /// A placeholder's first path segment is neither `metadata` nor
    /// `resources`.
    #[error("invalid ref '{reference}': unknown reference root, use $$ to escape the substitution")]
    UnsupportedReferenceRoot { reference: String },

    /// A `resources.<name>` placeholder names a resource with no known output
    /// lookup.
    #[error("invalid ref '{reference}': no known resource '{name}'")]
    UnknownResource { reference: String, name: String },

    /// A placeholder has a valid root but not enough path segments to look
    /// anything up.
    #[error("invalid ref '{reference}': requires at least a {what} to lookup")]
    ReferenceMissingKey {
        reference: String,
        what: &'static str,
    },

    /// A placeholder failed to resolve against its context.
    #[error("invalid ref '{reference}': {source}")]
    InvalidReference {
        reference: String,
        source: Box<PlaitError>,
    },

    /// The dependency graph between resources has no valid evaluation order.
    #[error("a cycle exists involving resource param placeholders")]
    CycleDetected,

    /// A lookup was attempted with an empty key path.
    #[error("at least one lookup key is required")]
    NoLookupKeys,

    /// An output lookup addressed a key that does not exist at that level.
    #[error("key '{key}' not found")]
    LookupKeyNotFound { key: String },

    /// An output lookup tried to traverse through a value that is not a map.
    #[error("cannot lookup key '{key}', context is not a map")]
    LookupNotAMap { key: String },

    /// No workload with this name has been accumulated into the state.
    #[error("workload '{workload}': does not exist")]
    UnknownWorkload { workload: String },

    /// A declared resource has no corresponding primed state entry.
    #[error("workload '{workload}': resource '{resource}' ({uid}) is not primed")]
    ResourceNotPrimed {
        workload: String,
        resource: String,
        uid: ResourceUid,
    },

    /// A custom un-escaper rejected an escape sequence.
    #[error("failed to unescape '{fragment}': {source}")]
    UnEscape {
        fragment: String,
        source: Box<PlaitError>,
    },

    /// An override path addressed the root node itself.
    #[error("cannot change root node")]
    OverrideRootNode,

    /// An override path segment could not be parsed as an array index.
    #[error("failed to parse '{segment}' as array index")]
    InvalidArrayIndex { segment: String },

    /// An override array index is outside the bounds of the array.
    #[error("cannot {action} '{index}' in array: out of range")]
    ArrayIndexOutOfRange { action: &'static str, index: i64 },

    /// An override path tried to traverse through a scalar value.
    #[error("{segment}: cannot set path in non-map/non-array")]
    NotAContainer { segment: String },

    /// A nested value failed and the map key or array index is prepended for
    /// context, mirroring the path down the structure.
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<PlaitError>,
    },

    /// Several independent failures inside a single string substitution.
    #[error("{}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Aggregated { errors: Vec<PlaitError> },

    /// A resolved placeholder value could not be rendered to JSON text.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl PlaitError {
    /// Wrap this error with a path-segment context, used while recursing
    /// through nested maps and arrays.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Collapse a list of errors into a single error. Returns `None` for an
    /// empty list and unwraps a single-element list to the error itself.
    pub fn aggregate(mut errors: Vec<PlaitError>) -> Option<PlaitError> {
        match errors.len() {
            0 => None,
            1 => Some(errors.remove(0)),
            _ => Some(PlaitError::Aggregated { errors }),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = PlaitError> = std::result::Result<T, E>;
