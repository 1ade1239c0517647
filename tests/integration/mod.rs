//! Integration tests exercising the full accumulate -> prime -> sort ->
//! resolve flow the way an embedding tool drives it.

mod end_to_end;
mod persistence;

use std::sync::Once;

use plait::state::{NoExtras, State};
use plait::workload::WorkloadSpec;

pub type TestState = State<NoExtras, NoExtras, NoExtras>;

static TRACING: Once = Once::new();

/// Parse a YAML workload document and accumulate it into the state.
pub fn add_workload(state: &TestState, yaml: &str) -> TestState {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
    let spec: WorkloadSpec = serde_yaml::from_str(yaml).expect("fixture yaml decodes");
    state
        .with_workload(spec, None, NoExtras {})
        .expect("workload accepted")
}
