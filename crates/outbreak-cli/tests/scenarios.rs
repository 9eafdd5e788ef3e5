mod common;

use common::{change_rows, summary_rows, ManifestBuilder};
use serde_json::json;

#[test]
fn single_infection_transitions_target_and_logs_contact() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({
        "states": [
            {"id": "S", "susceptibility": 1.0, "infectivity": 0.0},
            {"id": "I", "susceptibility": 0.0, "infectivity": 1.0}
        ],
        "initial_state": "S",
        "transmissions": [
            {"id": "S_I", "entry_state": "S", "contact_state": "I", "exit_state": "I", "transmissibility": 1000.0}
        ]
    });
    let network = json!({
        "nodes": [
            {"id": 1, "health_state": "S"},
            {"id": 2, "health_state": "I"}
        ],
        "edges": [
            {"target_id": 1, "source_id": 2, "duration": 1.0, "weight": 1.0}
        ]
    });
    let manifest = ManifestBuilder { end_tick: 0, ..Default::default() }.build(dir.path(), &disease, &network, &[]);
    outbreak_cli::run(&manifest).unwrap();

    let changes = change_rows(&manifest.output);
    assert_eq!(changes, vec!["0,1,I,2".to_string()]);

    let summary = summary_rows(&manifest.summary_output);
    // tick, S[current], S[in], S[out], I[current], I[in], I[out], seed
    assert_eq!(summary[0], vec!["0", "0", "0", "1", "2", "1", "0", "42"]);
}

#[test]
fn delayed_action_fires_after_its_delay_elapses() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({
        "states": [{"id": "S", "susceptibility": 1.0, "infectivity": 0.0}],
        "initial_state": "S"
    });
    let network = json!({"nodes": [{"id": 1, "health_state": "S"}]});
    let intervention = json!({
        "variables": [
            {"id": "v", "scope": "local", "initial_value": {"kind": "int", "value": 0}}
        ],
        "actions": [
            {"id": "inc_v", "delay": 3, "operations": [
                {"target": {"kind": "variable", "name": "v"}, "operator": {"kind": "add"}, "source": {"kind": "literal", "value": {"kind": "number", "value": 1.0}}}
            ]}
        ],
        "triggers": [
            {"condition": {"kind": "comparison", "op": "eq", "left": {"kind": "observable", "observable": {"kind": "current_tick"}}, "right": {"kind": "literal", "value": {"kind": "int", "value": 0}}}, "action": "inc_v"}
        ]
    });
    let manifest = ManifestBuilder { end_tick: 3, ..Default::default() }.build(dir.path(), &disease, &network, &[intervention]);
    outbreak_cli::run(&manifest).unwrap();

    let summary = summary_rows(&manifest.summary_output);
    // tick, S[current], S[in], S[out], v, seed
    for tick in 0..3 {
        assert_eq!(summary[tick][4], "0", "v should still be at its initial value before the delay elapses");
    }
    assert_eq!(summary[3][4], "1");
}

#[test]
fn higher_priority_action_runs_last_and_wins() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({"states": [{"id": "S", "susceptibility": 1.0, "infectivity": 0.0}], "initial_state": "S"});
    let network = json!({"nodes": [{"id": 1, "health_state": "S"}]});
    let intervention = json!({
        "variables": [{"id": "v", "scope": "local", "initial_value": {"kind": "int", "value": 0}}],
        "actions": [
            {"id": "lo", "priority": 1.0, "operations": [
                {"target": {"kind":"variable","name":"v"}, "operator": {"kind":"assign"}, "source": {"kind":"literal","value":{"kind":"number","value":1.0}}}
            ]},
            {"id": "hi", "priority": 2.0, "operations": [
                {"target": {"kind":"variable","name":"v"}, "operator": {"kind":"assign"}, "source": {"kind":"literal","value":{"kind":"number","value":2.0}}}
            ]}
        ],
        "triggers": [
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "lo"},
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "hi"}
        ]
    });
    let manifest = ManifestBuilder::default().build(dir.path(), &disease, &network, &[intervention]);
    outbreak_cli::run(&manifest).unwrap();
    let summary = summary_rows(&manifest.summary_output);
    assert_eq!(summary[0][4], "2");
}

#[test]
fn stale_progression_is_dropped_after_state_at_schedule_changes() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({
        "states": [
            {"id": "S", "susceptibility": 1.0, "infectivity": 0.0},
            {"id": "I", "susceptibility": 0.0, "infectivity": 1.0},
            {"id": "R", "susceptibility": 0.0, "infectivity": 0.0}
        ],
        "initial_state": "S",
        "progressions": [
            {"id": "I_to_R", "entry_state": "I", "exit_state": "R", "propensity": 1.0, "dwell_time": {"kind": "fixed", "value": 5}}
        ]
    });
    let network = json!({"nodes": [{"id": 1, "health_state": "S"}]});
    let intervention = json!({
        "sets": [{"name": "AllNodes", "scope": "local", "content": {"kind": "all_nodes"}}],
        "actions": [
            {"id": "go_i", "condition": {"kind":"comparison","op":"eq","left":{"kind":"observable","observable":{"kind":"current_tick"}},"right":{"kind":"literal","value":{"kind":"int","value":0}}},
             "operations": [{"target":{"kind":"node_property","property":"healthState"}, "operator":{"kind":"assign"}, "source":{"kind":"literal","value":{"kind":"health_state","state":"I"}}}]},
            {"id": "go_s", "condition": {"kind":"comparison","op":"eq","left":{"kind":"observable","observable":{"kind":"current_tick"}},"right":{"kind":"literal","value":{"kind":"int","value":2}}},
             "operations": [{"target":{"kind":"node_property","property":"healthState"}, "operator":{"kind":"assign"}, "source":{"kind":"literal","value":{"kind":"health_state","state":"S"}}}]}
        ],
        "triggers": [
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "go_i", "target_set": "AllNodes"},
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "go_s", "target_set": "AllNodes"}
        ]
    });
    let manifest = ManifestBuilder { end_tick: 6, ..Default::default() }.build(dir.path(), &disease, &network, &[intervention]);
    outbreak_cli::run(&manifest).unwrap();

    let summary = summary_rows(&manifest.summary_output);
    // tick, S[cur],S[in],S[out], I[cur],I[in],I[out], R[cur],R[in],R[out], seed
    assert_eq!(summary[5][7], "0", "the stale progression must not move the node into R");
    assert_eq!(summary[6][1], "1", "the node settles back in S once the stale action is dropped");

    let changes = change_rows(&manifest.output);
    assert!(!changes.iter().any(|row| row.starts_with("5,")), "a stale progression must not log a change row");
}

#[test]
fn global_variable_under_contention_across_two_processes() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({"states": [{"id": "S", "susceptibility": 1.0, "infectivity": 0.0}], "initial_state": "S"});
    let network = json!({"nodes": [{"id": 1, "health_state": "S"}, {"id": 2, "health_state": "S"}]});
    let intervention = json!({
        "variables": [{"id": "v", "scope": "global", "initial_value": {"kind": "int", "value": 1}, "reset_period": 2}],
        "sets": [{"name": "AllNodes", "scope": "local", "content": {"kind": "all_nodes"}}],
        "actions": [
            {"id": "mul2", "condition": {"kind":"comparison","op":"eq","left":{"kind":"observable","observable":{"kind":"current_tick"}},"right":{"kind":"literal","value":{"kind":"int","value":1}}},
             "operations": [{"target":{"kind":"variable","name":"v"}, "operator":{"kind":"mul"}, "source":{"kind":"literal","value":{"kind":"number","value":2.0}}}]}
        ],
        "triggers": [
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "mul2", "target_set": "AllNodes"}
        ]
    });
    let manifest = ManifestBuilder { processes: 2, end_tick: 1, ..Default::default() }.build(dir.path(), &disease, &network, &[intervention]);
    outbreak_cli::run(&manifest).unwrap();

    let summary = summary_rows(&manifest.summary_output);
    // tick, S[cur],S[in],S[out], v, seed
    assert_eq!(summary[0][4], "1", "reset seeds the global variable before either rank's multiply can run");
    assert_eq!(summary[1][4], "4", "both ranks' multiply apply exactly once each, order-independent");
}

#[test]
fn set_membership_persists_across_ticks_without_further_transmissions() {
    let dir = tempfile::tempdir().unwrap();
    let disease = json!({
        "states": [
            {"id": "S", "susceptibility": 1.0, "infectivity": 0.0},
            {"id": "I", "susceptibility": 0.0, "infectivity": 1.0}
        ],
        "initial_state": "S"
    });
    let network = json!({"nodes": [{"id": 1, "health_state": "S"}, {"id": 2, "health_state": "S"}]});
    let intervention = json!({
        "variables": [{"id": "infected_count", "scope": "local", "initial_value": {"kind": "int", "value": 0}}],
        "sets": [
            {"name": "Infected", "scope": "local", "content": {"kind": "node_property_cmp", "property": "healthState", "op": "eq", "value": {"kind": "literal", "value": {"kind": "health_state", "state": "I"}}}},
            {"name": "SeedNode", "scope": "local", "content": {"kind": "node_property_cmp", "property": "id", "op": "eq", "value": {"kind": "literal", "value": {"kind": "id", "value": 1}}}}
        ],
        "actions": [
            {"id": "seed_infection", "condition": {"kind":"comparison","op":"eq","left":{"kind":"observable","observable":{"kind":"current_tick"}},"right":{"kind":"literal","value":{"kind":"int","value":0}}},
             "operations": [{"target":{"kind":"node_property","property":"healthState"}, "operator":{"kind":"assign"}, "source":{"kind":"literal","value":{"kind":"health_state","state":"I"}}}]},
            {"id": "record_count", "operations": [{"target":{"kind":"variable","name":"infected_count"}, "operator":{"kind":"assign"}, "source":{"kind":"size_of","set":"Infected"}}]}
        ],
        "triggers": [
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "seed_infection", "target_set": "SeedNode"},
            {"condition": {"kind":"value","value":{"kind":"literal","value":{"kind":"bool","value":true}}}, "action": "record_count"}
        ]
    });
    let manifest = ManifestBuilder { end_tick: 2, ..Default::default() }.build(dir.path(), &disease, &network, &[intervention]);
    outbreak_cli::run(&manifest).unwrap();

    let summary = summary_rows(&manifest.summary_output);
    // tick, S[cur],S[in],S[out], I[cur],I[in],I[out], infected_count, seed
    assert_eq!(summary[0][7], "0", "the recorded size lags a tick behind the seeding action, like every set read");
    assert_eq!(summary[1][7], "1");
    assert_eq!(summary[2][7], "1", "no further transmissions occur, so the collector-tracked set stays put");
}
