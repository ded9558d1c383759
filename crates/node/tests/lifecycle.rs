//! Full experiment lifecycle: layout in, VNF-BR out.
//!
//! Player, manager and agent run in-process over the in-memory transport;
//! the agent's prober is a real child process. The descriptor sweeps one
//! input list of length two with three trials per instance, so the final
//! profile must hold two reports of three trials each.

mod common;

use benchnet_core::{Event, EventHandler};
use benchnet_messages::{Envelope, Layout, LayoutRef, Payload, Request, Response, ResponseKind};
use benchnet_node::{Agent, Manager, Player, ToolEntry};
use benchnet_types::{Contact, Identity, Role};
use common::TestNet;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const PLAYER_URL: &str = "http://127.0.0.1:8990";
const MANAGER_URL: &str = "http://127.0.0.1:8989";
const AGENT_URL: &str = "http://127.0.0.1:8988";
const CALLBACK: &str = "http://127.0.0.1:9099/collect";

const DESCRIPTOR_TEMPLATE: &str = r#"
id: "001"
name: latency sweep
author: benchnet
version: "0.1"
description: round trip latency against the target
experiments:
  trials: 3
  tests: 1
environment:
  deploy: false
targets:
  - id: sut
proceedings:
  agents:
    - id: agent-1
      probers:
        - id: "10"
          name: ping
          parameters:
            - input: target
              value: "127.0.0.1"
            - input: rate
              value: {{rate}}
scenario:
  nodes: []
  links: []
"#;

const PROBER_SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = "--info" ]; then
  echo '{"id": "10", "name": "ping", "parameters": {"target": "--target", "rate": "--rate"}, "metrics": ["rtt_avg"]}'
else
  echo "{\"rtt_avg\": 0.42, \"rate\": $2}"
fi
"#;

fn write_prober(dir: &Path) -> PathBuf {
    let path = dir.join("prober_ping");
    std::fs::write(&path, PROBER_SCRIPT).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_layout_to_vnfbr() {
    let dir = tempfile::tempdir().unwrap();
    let prober = write_prober(dir.path());
    let template = dir.path().join("vnf-bd-001.yaml");
    std::fs::write(&template, DESCRIPTOR_TEMPLATE).unwrap();

    let mut catalog = HashMap::new();
    catalog.insert("001".to_string(), template);
    let mut player = Player::new(
        Identity::local(PLAYER_URL, "player-1", Role::Player),
        catalog,
    );
    let mut manager = Manager::new(Identity::local(MANAGER_URL, "mgr-1", Role::Manager));
    let mut agent = Agent::new(
        Identity::local(AGENT_URL, "agent-1", Role::Agent),
        vec![ToolEntry {
            id: "10".into(),
            name: Some("ping".into()),
            path: prober,
        }],
    );

    let external = {
        let mut net = TestNet::new(vec![
            (PLAYER_URL.into(), &mut player as &mut dyn EventHandler),
            (MANAGER_URL.into(), &mut manager as &mut dyn EventHandler),
            (AGENT_URL.into(), &mut agent as &mut dyn EventHandler),
        ]);
        net.raise(
            PLAYER_URL,
            Event::Greetings {
                contacts: vec![Contact::Nested {
                    address: MANAGER_URL.into(),
                    contacts: vec![AGENT_URL.into()],
                }],
                hello: None,
            },
        );

        let mut inputs = Map::new();
        inputs.insert("rate".into(), json!([10, 20]));
        let mut layout = Envelope::request_with_id(
            "layout-9",
            Request::Layout(Layout {
                vnf_bd: LayoutRef {
                    id: "001".into(),
                    inputs,
                },
                callback: Some(CALLBACK.into()),
            }),
        );
        layout.received_via("10.0.0.77", "911");
        net.raise(PLAYER_URL, Event::Message(layout))
    };

    assert!(player.is_available(), "player released after the experiment");

    assert_eq!(external.len(), 1, "exactly the vnf-br leaves the harness");
    let vnfbr = &external[0];
    assert_eq!(vnfbr.id, "layout-9");
    assert_eq!(vnfbr.destination.as_deref(), Some(CALLBACK));
    assert_eq!(vnfbr.response_kind(), Some(ResponseKind::Vnfbr));
    let Payload::Response(Response::Vnfbr(body)) = &vnfbr.payload else {
        panic!("expected a vnfbr response");
    };

    assert_eq!(body.vnfbd["id"], json!("001"));
    assert_eq!(body.vnfpp["id"], json!("001"));
    assert_eq!(body.vnfpp["instance"], json!("layout-9"));

    let reports = body.vnfpp["reports"].as_array().expect("profile list");
    assert_eq!(reports.len(), 2, "one profile per swept input");

    let mut rates = Vec::new();
    for report in reports {
        rates.push(report["inputs"]["rate"].clone());
        let snapshots = report["snapshots"].as_array().expect("snapshot list");
        assert_eq!(snapshots.len(), 3, "one snapshot per trial");
        let trials: Vec<Value> = snapshots.iter().map(|s| s["trial"].clone()).collect();
        assert_eq!(trials, vec![json!(0), json!(1), json!(2)]);
        for snapshot in snapshots {
            assert_eq!(snapshot["component"], json!("agent-1"));
            let evaluation = &snapshot["evaluations"][0];
            assert_eq!(evaluation["tool"], json!("10"));
            assert_eq!(evaluation["metrics"]["rtt_avg"], json!(0.42));
            // The swept parameter reached the tool's command line.
            assert_eq!(evaluation["metrics"]["rate"], report["inputs"]["rate"]);
        }
    }
    rates.sort_by_key(|rate| rate.as_i64());
    assert_eq!(rates, vec![json!(10), json!(20)]);
}
