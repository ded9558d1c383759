//! VNF-PP: the post-processed profile compiled from trial reports.

use crate::multiplex;
use benchnet_messages::{Evaluation, Report, Snapshot};
use serde_json::{json, Map, Value};
use tracing::info;

struct Entry {
    inputs: Map<String, Value>,
    report: Report,
}

/// Accumulates one report per descriptor instance and compiles them into
/// per-instance profiles keyed by the swept input values.
#[derive(Default)]
pub struct VnfPp {
    id: Option<String>,
    instance: Option<String>,
    input_paths: Vec<Vec<String>>,
    entries: Vec<Entry>,
    profiles: Vec<Value>,
}

impl VnfPp {
    pub fn new(id: impl Into<String>) -> Self {
        VnfPp {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Record which input paths were swept, from the descriptor's base
    /// inputs. Compiled profiles name each swept input by its joined path.
    pub fn parse_inputs(&mut self, inputs: &Map<String, Value>) {
        self.input_paths = multiplex::list_paths(inputs)
            .into_iter()
            .map(|(path, _)| path)
            .collect();
    }

    /// Add one instance's aggregated report together with the instance
    /// inputs it ran under.
    pub fn add_report(&mut self, inputs: Map<String, Value>, report: Report) {
        self.entries.push(Entry { inputs, report });
    }

    pub fn reports(&self) -> usize {
        self.entries.len()
    }

    fn filter_evaluation(evaluation: &Evaluation) -> Value {
        json!({
            "id": evaluation.id,
            "tool": evaluation.tool,
            "type": evaluation.kind,
            "metrics": evaluation.metrics,
        })
    }

    fn filter_snapshot(snapshot: &Snapshot) -> Value {
        let evaluations: Vec<Value> = snapshot
            .evaluations
            .iter()
            .map(Self::filter_evaluation)
            .collect();
        json!({
            "component": snapshot.component,
            "role": snapshot.role,
            "trial": snapshot.trial,
            "evaluations": evaluations,
        })
    }

    fn filter_inputs(&self, inputs: &Map<String, Value>) -> Map<String, Value> {
        let mut filtered = Map::new();
        for path in &self.input_paths {
            let name = path.join("_");
            let value = multiplex::get_path(inputs, path)
                .cloned()
                .unwrap_or(Value::Null);
            filtered.insert(name, value);
        }
        filtered
    }

    /// Compile every collected report into its profile.
    pub fn compile(&mut self, layout_id: impl Into<String>) {
        info!(reports = self.entries.len(), "compiling vnf-pp");
        self.instance = Some(layout_id.into());
        for entry in &self.entries {
            let snapshots: Vec<Value> = entry
                .report
                .snapshots
                .iter()
                .map(Self::filter_snapshot)
                .collect();
            self.profiles.push(json!({
                "component": entry.report.component,
                "test": entry.report.test,
                "snapshots": snapshots,
                "inputs": self.filter_inputs(&entry.inputs),
            }));
        }
    }

    /// The compiled profile set, embedded in a VNF-BR.
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "instance": self.instance,
            "reports": self.profiles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchnet_messages::Evaluation;
    use benchnet_types::Role;

    #[test]
    fn test_compiled_profile_names_swept_inputs() {
        let base: Map<String, Value> = match json!({"sut": {"cpu": [1, 2]}, "rate": 10}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let instance: Map<String, Value> = match json!({"sut": {"cpu": 2}, "rate": 10}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let mut vnfpp = VnfPp::new("001");
        vnfpp.parse_inputs(&base);

        let report = Report {
            component: Some("mgr-1".into()),
            role: Some(Role::Manager),
            test: 0,
            snapshots: vec![Snapshot {
                component: Some("agent-1".into()),
                role: Some(Role::Agent),
                trial: 2,
                evaluations: vec![Evaluation {
                    id: "1".into(),
                    tool: Some("ping".into()),
                    metrics: Some(json!({"rtt_avg": 0.4})),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        vnfpp.add_report(instance, report);
        vnfpp.compile("layout-1");

        let value = vnfpp.to_value();
        let profile = &value["reports"][0];
        assert_eq!(profile["inputs"]["sut_cpu"], json!(2));
        assert_eq!(profile["snapshots"][0]["trial"], json!(2));
        assert_eq!(
            profile["snapshots"][0]["evaluations"][0]["metrics"]["rtt_avg"],
            json!(0.4)
        );
    }
}
