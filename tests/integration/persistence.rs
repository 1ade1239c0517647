//! Round-tripping the state aggregate through its persisted YAML form.

use anyhow::Result;
use serde_json::json;

use plait::state::ResourceUid;

use super::{TestState, add_workload};

#[test]
fn state_survives_a_yaml_round_trip() -> Result<()> {
    let mut state = add_workload(
        &TestState::default(),
        r"
metadata:
  name: eg
containers:
  main:
    image: busybox
resources:
  db:
    type: postgres
    class: large
    id: shared
    params:
      size: 10
",
    )
    .with_primed_resources()?;

    let uid = state.resources.keys().next().cloned().unwrap();
    {
        let db = state.resources.get_mut(&uid).unwrap();
        db.provisioner_uri = "template://default/postgres".into();
        db.state.insert("password".into(), json!("hunter2"));
        db.outputs.insert("host".into(), json!("db.internal"));
    }
    state.shared_state.insert("generation".into(), json!(3));

    let yaml = serde_yaml::to_string(&state)?;
    assert!(yaml.contains("postgres.large#shared"), "resource keyed by uid string:\n{yaml}");
    assert!(yaml.contains("source_workload: eg"), "wire names are stable:\n{yaml}");
    assert!(yaml.contains("provisioner: template://default/postgres"));

    let back: TestState = serde_yaml::from_str(&yaml)?;
    let db = &back.resources[&uid];
    assert_eq!(db.guid, state.resources[&uid].guid);
    assert_eq!(db.resource_type, "postgres");
    assert_eq!(db.class, "large");
    assert_eq!(db.id, "shared");
    assert_eq!(db.state["password"], json!("hunter2"));
    assert_eq!(db.outputs["host"], json!("db.internal"));
    assert_eq!(back.shared_state["generation"], json!(3));
    assert!(db.output_lookup_fn.is_none(), "deferred resolvers are never persisted");

    // the restored state keeps working
    let order = back.get_sorted_resource_uids()?;
    assert_eq!(order.iter().map(ResourceUid::as_str).collect::<Vec<_>>(), vec!["postgres.large#shared"]);
    Ok(())
}
