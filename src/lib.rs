//! plait - state and resolution engine for declarative workload specifications
//!
//! plait is the library underneath compose-style workload tooling: callers
//! load one or more workload documents (a named set of containers plus the
//! backing resources they depend on), accumulate them into a single
//! [`state::State`], and let the engine assign stable resource identities,
//! resolve `${...}` placeholder references, and compute a safe provisioning
//! order. The engine never provisions anything itself and never touches the
//! network or filesystem; it computes, and the embedding tool acts.
//!
//! # Core Modules
//!
//! - [`state`] - the immutable-by-convention [`state::State`] aggregate,
//!   resource identity ([`state::ResourceUid`]), priming and deduplication,
//!   dependency extraction, and the deterministic topological sort
//! - [`subst`] - the `${...}` placeholder engine with `$$` escaping and
//!   recursive substitution through nested document trees
//! - [`workload`] - the typed, already-validated workload specification
//!   handed in by the document loader
//! - [`overrides`] - copy-on-write helpers for applying `--override` style
//!   patches to decoded documents
//! - [`core`] - the [`core::PlaitError`] failure taxonomy
//!
//! # Flow
//!
//! ```rust
//! use plait::state::{NoExtras, State};
//! use plait::workload::WorkloadSpec;
//!
//! # fn main() -> Result<(), plait::core::PlaitError> {
//! let doc: WorkloadSpec = serde_json::from_value(serde_json::json!({
//!     "apiVersion": "plait.dev/v1",
//!     "metadata": {"name": "hello"},
//!     "containers": {"main": {"image": "busybox"}},
//!     "resources": {
//!         "db": {"type": "postgres"},
//!         "dns": {"type": "dns", "params": {"host": "${resources.db.host}"}}
//!     }
//! })).unwrap();
//!
//! let state: State = State::default()
//!     .with_workload(doc, None, NoExtras {})?
//!     .with_primed_resources()?;
//!
//! // db sorts before dns because dns's params reference db's outputs
//! let order = state.get_sorted_resource_uids()?;
//! assert_eq!(order[0].as_str(), "postgres.default#hello.db");
//! assert_eq!(order[1].as_str(), "dns.default#hello.dns");
//! # Ok(())
//! # }
//! ```
//!
//! From here the embedding tool walks the order, provisions each resource,
//! writes outputs back onto the matching [`state::ResourceState`], and uses
//! [`state::State::get_resource_outputs_for_workload`] together with
//! [`subst::build_substitution_function`] to resolve the next resource's
//! params.

pub mod core;
pub mod overrides;
pub mod state;
pub mod subst;
pub mod workload;
