//! The accumulated engine state: workloads, resources, and shared data.
//!
//! [`State`] is the aggregate that downstream tooling builds up by calling
//! [`State::with_workload`] once per document, then primes with
//! [`State::with_primed_resources`], orders with
//! [`State::get_sorted_resource_uids`], and finally reads back through
//! [`State::get_resource_outputs_for_workload`] while provisioning.
//!
//! Every mutator takes `&self` and returns a fresh `State`; the receiver is
//! never modified, so callers can hold any number of snapshots concurrently
//! and an error from any operation leaves the prior snapshot fully intact.
//! Workloads are keyed by name and resources by [`ResourceUid`] in ordered
//! maps, which makes iteration order, conflict detection, and the serialized
//! form reproducible across runs.
//!
//! The three `Extras` type parameters let an embedding tool attach its own
//! state at the state, workload, and resource levels; they are serialized
//! inline at the same level as the built-in fields. Use [`NoExtras`] for
//! levels that need nothing.

mod resource_uid;


use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::{PlaitError, Result};
use crate::subst::{Substituter, lookup_path, split_ref_parts};
use crate::workload::WorkloadSpec;

pub use resource_uid::ResourceUid;

/// A deferred output resolver, taking a key path into a resource's outputs.
///
/// `Option<OutputLookupFn>` on [`ResourceState`] selects between static
/// outputs and lazy resolution at construction time.
pub type OutputLookupFn = Arc<dyn Fn(&[&str]) -> Result<Value> + Send + Sync>;

/// Placeholder extras type for levels that carry no extra fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoExtras {}

/// The root aggregate of accumulated workloads and primed resources.
///
/// Designed to be serialized wholesale between invocations of a CLI-style
/// tool; the field names (`workloads`, `resources`, `shared_state`) and the
/// `type.class#id` resource key form are the stable wire surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State<SE = NoExtras, WE = NoExtras, RE = NoExtras> {
    /// Accumulated workloads by name.
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadState<WE>>,

    /// Primed resources by uid.
    #[serde(default)]
    pub resources: BTreeMap<ResourceUid, ResourceState<RE>>,

    /// An opaque bag shared between provisioners; this engine never reads or
    /// writes it.
    #[serde(default)]
    pub shared_state: Map<String, Value>,

    /// Embedding-tool fields, serialized inline.
    #[serde(flatten)]
    pub extras: SE,
}

/// Per-workload state: the resolved spec, its source file if known, and any
/// embedding-tool extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadState<WE> {
    /// The final workload spec after all overrides have been applied.
    pub spec: WorkloadSpec,

    /// The source document path, kept so relative file references inside the
    /// spec can be resolved by upstream tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Embedding-tool fields, serialized inline.
    #[serde(flatten)]
    pub extras: WE,
}

/// Tracked state for one primed resource instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResourceState<RE> {
    /// A process-generated instance identifier, assigned once at first
    /// priming and stable for the life of the resource.
    pub guid: String,

    /// Denormalized copy of the uid's type segment.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Denormalized copy of the uid's class segment.
    pub class: String,

    /// Denormalized copy of the uid's id segment.
    pub id: String,

    /// Metadata from the currently adopted declaration.
    pub metadata: Option<Map<String, Value>>,

    /// Params from the currently adopted declaration.
    pub params: Option<Map<String, Value>>,

    /// Which workload's declaration currently owns metadata and params.
    pub source_workload: String,

    /// The resolved provisioner handler identifier; opaque to this engine,
    /// set and read by the embedding tool.
    #[serde(rename = "provisioner")]
    pub provisioner_uri: String,

    /// Provisioner-internal state persisted between runs.
    pub state: Map<String, Value>,

    /// Last resolved output values. May contain secrets; callers decide how
    /// to persist it.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,

    /// Lazy output resolver supplied by in-process provisioners. When
    /// present it is always preferred over [`Self::outputs`]. Never
    /// serialized.
    #[serde(skip)]
    pub output_lookup_fn: Option<OutputLookupFn>,

    /// Embedding-tool fields, serialized inline.
    #[serde(flatten)]
    pub extras: RE,
}

impl<RE: fmt::Debug> fmt::Debug for ResourceState<RE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceState")
            .field("guid", &self.guid)
            .field("resource_type", &self.resource_type)
            .field("class", &self.class)
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .field("params", &self.params)
            .field("source_workload", &self.source_workload)
            .field("provisioner_uri", &self.provisioner_uri)
            .field("state", &self.state)
            .field("outputs", &self.outputs)
            .field("output_lookup_fn", &self.output_lookup_fn.as_ref().map(|_| "<fn>"))
            .field("extras", &self.extras)
            .finish()
    }
}

impl<RE> ResourceState<RE> {
    /// Look up a value in this resource's outputs by a key path.
    ///
    /// Delegates entirely to the lazy resolver when one is set; otherwise
    /// walks the static outputs map one key at a time. A lookup must name at
    /// least one key.
    pub fn output_lookup(&self, keys: &[&str]) -> Result<Value> {
        if let Some(lookup) = &self.output_lookup_fn {
            return lookup(keys);
        }
        if keys.is_empty() {
            return Err(PlaitError::NoLookupKeys);
        }
        lookup_path(&self.outputs, keys)
    }
}

impl<SE: Clone, WE: Clone, RE: Clone> State<SE, WE, RE> {
    /// Return a new state with the workload added, replacing any existing
    /// workload of the same name. Fails if the spec's `metadata.name` is
    /// missing, empty, or not a string.
    pub fn with_workload(
        &self,
        spec: WorkloadSpec,
        file: Option<PathBuf>,
        extras: WE,
    ) -> Result<Self> {
        let name = spec.name().ok_or(PlaitError::MissingWorkloadName)?.to_string();
        let mut out = self.clone();
        out.workloads.insert(name, WorkloadState { spec, file, extras });
        Ok(out)
    }

    /// Return a new state in which every resource declared by any workload
    /// has a state entry with an assigned guid.
    ///
    /// Workloads and resource names are visited in sorted order so guid
    /// assignment and conflict detection are reproducible. A resource seen
    /// for the first time in this pass adopts the declaring workload's
    /// metadata and params wholesale; a later declaration of the same uid
    /// within the pass must agree with the currently adopted values, with an
    /// empty side always deferring to a non-empty one. Conflicting non-empty
    /// declarations abort the whole pass.
    pub fn with_primed_resources(&self) -> Result<Self>
    where
        RE: Default,
    {
        let mut out = self.clone();
        let mut touched: BTreeSet<ResourceUid> = BTreeSet::new();

        for (workload_name, workload) in &self.workloads {
            for (res_name, res) in &workload.spec.resources {
                let uid = ResourceUid::new(
                    workload_name,
                    res_name,
                    &res.resource_type,
                    res.class.as_deref(),
                    res.id.as_deref(),
                );
                match out.resources.entry(uid.clone()) {
                    Entry::Vacant(entry) => {
                        tracing::debug!("priming new resource '{uid}' from workload '{workload_name}'");
                        entry.insert(ResourceState {
                            guid: Uuid::new_v4().to_string(),
                            resource_type: uid.res_type().to_string(),
                            class: uid.class().to_string(),
                            id: uid.id().to_string(),
                            metadata: res.metadata.clone(),
                            params: res.params.clone(),
                            source_workload: workload_name.clone(),
                            provisioner_uri: String::new(),
                            state: Map::new(),
                            outputs: Map::new(),
                            output_lookup_fn: None,
                            extras: RE::default(),
                        });
                        touched.insert(uid);
                    }
                    Entry::Occupied(mut entry) if !touched.contains(&uid) => {
                        // first encounter this pass of a previously primed
                        // resource: the new declaration wins
                        let existing = entry.get_mut();
                        existing.metadata = res.metadata.clone();
                        existing.params = res.params.clone();
                        existing.source_workload = workload_name.clone();
                        touched.insert(uid);
                    }
                    Entry::Occupied(mut entry) => {
                        // shared resource declared more than once this pass:
                        // compare against the currently adopted values
                        let existing = entry.get_mut();
                        if let Some(params) = &res.params {
                            if existing.params.as_ref().is_some_and(|p| p != params) {
                                return Err(PlaitError::ConflictingDefinition {
                                    uid,
                                    field: "params",
                                });
                            }
                            existing.params = Some(params.clone());
                            existing.source_workload = workload_name.clone();
                        }
                        if let Some(metadata) = &res.metadata {
                            if existing.metadata.as_ref().is_some_and(|m| m != metadata) {
                                return Err(PlaitError::ConflictingDefinition {
                                    uid,
                                    field: "metadata",
                                });
                            }
                            existing.metadata = Some(metadata.clone());
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// The set of resource uids that `res_name`'s params reference through
    /// `${resources.<name>...}` placeholders. References must name a resource
    /// declared in the same workload.
    fn resource_dependencies(
        &self,
        workload_name: &str,
        res_name: &str,
    ) -> Result<BTreeSet<ResourceUid>> {
        let workload = &self.workloads[workload_name];
        let Some(params) = &workload.spec.resources[res_name].params else {
            return Ok(BTreeSet::new());
        };

        let mut deps = BTreeSet::new();
        let result = Substituter::new(|reference: &str| {
            let parts = split_ref_parts(reference);
            if parts.len() > 1 && parts[0] == "resources" {
                match workload.spec.resources.get(&parts[1]) {
                    Some(target) => {
                        deps.insert(ResourceUid::new(
                            workload_name,
                            &parts[1],
                            &target.resource_type,
                            target.class.as_deref(),
                            target.id.as_deref(),
                        ));
                    }
                    None => {
                        return Err(PlaitError::UnknownResourceName {
                            name: parts[1].clone(),
                        });
                    }
                }
            }
            // collection mode: echo the reference back, nothing is resolved
            Ok(reference.to_string())
        })
        .substitute(&Value::Object(params.clone()));

        match result {
            Ok(_) => Ok(deps),
            Err(err) => Err(PlaitError::DanglingReference {
                workload: workload_name.to_string(),
                resource: res_name.to_string(),
                source: Box::new(err),
            }),
        }
    }

    /// A topological ordering of every declared resource uid such that each
    /// uid follows all uids its params depend on.
    ///
    /// Kahn's algorithm over the extracted dependency sets; each round drains
    /// the whole ready frontier in lexicographic uid order, so the result is
    /// deterministic. Fails with [`PlaitError::CycleDetected`] when no valid
    /// order exists, returning no partial ordering.
    pub fn get_sorted_resource_uids(&self) -> Result<Vec<ResourceUid>> {
        let mut ready: BTreeSet<ResourceUid> = BTreeSet::new();
        let mut incoming: BTreeMap<ResourceUid, BTreeSet<ResourceUid>> = BTreeMap::new();

        for (workload_name, workload) in &self.workloads {
            for (res_name, res) in &workload.spec.resources {
                let deps = self.resource_dependencies(workload_name, res_name)?;
                let uid = ResourceUid::new(
                    workload_name,
                    res_name,
                    &res.resource_type,
                    res.class.as_deref(),
                    res.id.as_deref(),
                );
                if deps.is_empty() {
                    ready.insert(uid);
                } else {
                    tracing::debug!(
                        "resource '{uid}' waits on {:?}",
                        deps.iter().map(ResourceUid::as_str).collect::<Vec<_>>()
                    );
                    incoming.insert(uid, deps);
                }
            }
        }

        let mut output = Vec::with_capacity(ready.len() + incoming.len());
        while !ready.is_empty() {
            // drain the whole frontier in sorted order before recomputing
            let frontier: Vec<ResourceUid> = std::mem::take(&mut ready).into_iter().collect();
            output.extend(frontier.iter().cloned());
            for resolved in &frontier {
                incoming.retain(|uid, deps| {
                    deps.remove(resolved);
                    if deps.is_empty() {
                        ready.insert(uid.clone());
                        false
                    } else {
                        true
                    }
                });
            }
        }

        if !incoming.is_empty() {
            return Err(PlaitError::CycleDetected);
        }
        Ok(output)
    }

    /// An output lookup function per resource name declared in the given
    /// workload, for building placeholder resolution contexts.
    ///
    /// Fails if the workload does not exist or any of its resources has not
    /// been primed.
    pub fn get_resource_outputs_for_workload(
        &self,
        workload_name: &str,
    ) -> Result<BTreeMap<String, OutputLookupFn>>
    where
        RE: Send + Sync + 'static,
    {
        let workload = self
            .workloads
            .get(workload_name)
            .ok_or_else(|| PlaitError::UnknownWorkload {
                workload: workload_name.to_string(),
            })?;

        let mut out: BTreeMap<String, OutputLookupFn> = BTreeMap::new();
        for (res_name, res) in &workload.spec.resources {
            let uid = ResourceUid::new(
                workload_name,
                res_name,
                &res.resource_type,
                res.class.as_deref(),
                res.id.as_deref(),
            );
            let state = self.resources.get(&uid).ok_or_else(|| {
                PlaitError::ResourceNotPrimed {
                    workload: workload_name.to_string(),
                    resource: res_name.clone(),
                    uid: uid.clone(),
                }
            })?;
            let state = state.clone();
            let lookup: OutputLookupFn = Arc::new(move |keys: &[&str]| state.output_lookup(keys));
            out.insert(res_name.clone(), lookup);
        }
        Ok(out)
    }
}
