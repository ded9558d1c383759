//! The VNF-BD benchmark descriptor and its instance cursor.

use crate::error::DescriptorError;
use crate::matching::{self, ComponentMapping};
use crate::multiplex;
use crate::template;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First instance id handed out by the multiplexing cursor.
pub const INSTANCE_ID_BASE: u64 = 500;

const MANDATORY_FIELDS: [&str; 9] = [
    "id",
    "name",
    "author",
    "version",
    "description",
    "experiments",
    "environment",
    "targets",
    "proceedings",
];

/// A loaded benchmark descriptor.
///
/// One `VnfBd` is loaded per `layout` request and expanded into instances
/// by [`VnfBd::multiplex_parameters`]; each instance is itself a `VnfBd`,
/// re-rendered from the same template against one unique input set.
#[derive(Debug, Clone)]
pub struct VnfBd {
    data: Map<String, Value>,
    inputs: Map<String, Value>,
    template: Option<PathBuf>,
    instance_id: Option<u64>,
    test_id: u64,
    mux: BTreeMap<u64, Map<String, Value>>,
    cursor: u64,
    first_input: bool,
    deployed: bool,
    informed: bool,
}

impl VnfBd {
    /// Render the template at `path` against `inputs` and validate the
    /// resulting descriptor.
    pub fn load(path: &Path, inputs: Map<String, Value>) -> Result<Self, DescriptorError> {
        let data = template::parse(path, &inputs)?;
        let mut descriptor = Self::from_value(data, inputs)?;
        descriptor.template = Some(path.to_path_buf());
        Ok(descriptor)
    }

    /// Validate an already-parsed descriptor mapping.
    pub fn from_value(
        data: Map<String, Value>,
        inputs: Map<String, Value>,
    ) -> Result<Self, DescriptorError> {
        for field in MANDATORY_FIELDS {
            if !data.contains_key(field) {
                return Err(DescriptorError::MissingField(field));
            }
        }
        let scenario = data
            .get("scenario")
            .ok_or(DescriptorError::MissingField("scenario"))?;
        for field in ["nodes", "links"] {
            if scenario.get(field).is_none() {
                return Err(DescriptorError::MissingScenarioField(field));
            }
        }
        debug!("descriptor contains every mandatory field");
        Ok(VnfBd {
            data,
            inputs,
            template: None,
            instance_id: None,
            test_id: 0,
            mux: BTreeMap::new(),
            cursor: INSTANCE_ID_BASE,
            first_input: true,
            deployed: false,
            informed: false,
        })
    }

    pub fn template_path(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    /// Descriptor id from the template (`vnf-bd` catalog id).
    pub fn descriptor_id(&self) -> Option<String> {
        match self.data.get("id") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        }
    }

    /// Instance id assigned by the multiplexing cursor; None on the parent
    /// descriptor.
    pub fn instance_id(&self) -> Option<u64> {
        self.instance_id
    }

    pub fn set_instance_id(&mut self, id: u64) {
        self.instance_id = Some(id);
    }

    pub fn test_id(&self) -> u64 {
        self.test_id
    }

    pub fn set_test_id(&mut self, test_id: u64) {
        self.test_id = test_id;
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    pub fn trials(&self) -> u64 {
        self.data
            .get("experiments")
            .and_then(|experiments| experiments.get("trials"))
            .and_then(Value::as_u64)
            .unwrap_or(1)
    }

    pub fn tests(&self) -> u64 {
        self.data
            .get("experiments")
            .and_then(|experiments| experiments.get("tests"))
            .and_then(Value::as_u64)
            .unwrap_or(1)
    }

    pub fn deployed(&self) -> bool {
        self.deployed
    }

    pub fn ack_deploy(&mut self) {
        self.deployed = true;
    }

    pub fn informed(&self) -> bool {
        self.informed
    }

    pub fn ack_info(&mut self) {
        self.informed = true;
    }

    /// Whether the environment asks for a deploy round before tasking.
    pub fn needs_deploy(&self) -> bool {
        self.data
            .get("environment")
            .and_then(|environment| environment.get("deploy"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The environment's plugin entry and the scenario topology handed to
    /// the deploy collaborator.
    pub fn deployment(&self) -> (Value, Value) {
        let plugin = self
            .data
            .get("environment")
            .and_then(|environment| environment.get("plugin"))
            .cloned()
            .unwrap_or(Value::Null);
        let topology = self.data.get("scenario").cloned().unwrap_or(Value::Null);
        (plugin, topology)
    }

    pub fn proceedings(&self) -> &Value {
        self.data.get("proceedings").unwrap_or(&Value::Null)
    }

    /// Full descriptor content, for embedding in a VNF-BR.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Match this descriptor's requirements against one manager's
    /// advertised structure.
    pub fn satisfy(&self, available: &Value) -> Option<ComponentMapping> {
        matching::satisfy(self.proceedings(), available)
    }

    /// Expand the base inputs into the instance input sequence: Cartesian
    /// product over list-valued fields, repeated per test, ids assigned
    /// from [`INSTANCE_ID_BASE`]. Resets the cursor.
    pub fn multiplex_parameters(&mut self) {
        let unique_inputs = multiplex::mix_inputs(&self.inputs);
        let tests = self.tests();
        self.mux.clear();
        let mut next_id = INSTANCE_ID_BASE;
        for unique in &unique_inputs {
            for test in 0..tests {
                let mut stamped = unique.clone();
                stamped.insert("test".into(), Value::from(test));
                self.mux.insert(next_id, stamped);
                next_id += 1;
            }
        }
        self.cursor = INSTANCE_ID_BASE;
        self.first_input = true;
        info!(
            tests,
            total = self.mux.len(),
            "descriptor inputs multiplexed"
        );
    }

    /// Id the cursor currently points at.
    pub fn current_input_id(&self) -> u64 {
        self.cursor
    }

    /// Whether another instance input remains after the current cursor.
    pub fn has_next_input(&self) -> bool {
        let candidate = if self.first_input {
            self.cursor
        } else {
            self.cursor + 1
        };
        self.mux.contains_key(&candidate)
    }

    /// Advance the cursor and return the next instance input, stamped with
    /// its id. The cursor is stateful: the first call yields the base id,
    /// later calls advance by one.
    pub fn next_input(&mut self) -> Option<Map<String, Value>> {
        let candidate = if self.first_input {
            self.first_input = false;
            self.cursor
        } else {
            self.cursor + 1
        };
        let input = self.mux.get(&candidate)?;
        let mut next = input.clone();
        next.insert("id".into(), Value::from(candidate));
        self.cursor = candidate;
        debug!(id = candidate, "descriptor next input");
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn base_descriptor() -> Map<String, Value> {
        match json!({
            "id": "001",
            "name": "latency sweep",
            "author": "benchnet",
            "version": "0.1",
            "description": "round trip latency against the target",
            "experiments": {"trials": 3, "tests": 1},
            "environment": {"deploy": false, "plugin": null},
            "targets": [{"id": "sut"}],
            "proceedings": {"agents": [], "monitors": []},
            "scenario": {"nodes": [], "links": []}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn inputs_with_list() -> Map<String, Value> {
        match json!({"rate": [10, 20]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_mandatory_fields_enforced() {
        let mut data = base_descriptor();
        data.remove("proceedings");
        assert!(matches!(
            VnfBd::from_value(data, Map::new()),
            Err(DescriptorError::MissingField("proceedings"))
        ));

        let mut data = base_descriptor();
        data["scenario"] = json!({"nodes": []});
        assert!(matches!(
            VnfBd::from_value(data, Map::new()),
            Err(DescriptorError::MissingScenarioField("links"))
        ));
    }

    #[test]
    fn test_cursor_is_stateful_and_finite() {
        // One list of length 2 and tests=1: exactly two instances.
        let mut vnfbd = VnfBd::from_value(base_descriptor(), inputs_with_list()).unwrap();
        vnfbd.multiplex_parameters();
        assert_eq!(vnfbd.trials(), 3);

        assert!(vnfbd.has_next_input());
        let first = vnfbd.next_input().unwrap();
        assert_eq!(first["id"], json!(INSTANCE_ID_BASE));
        assert_eq!(first["test"], json!(0));

        assert!(vnfbd.has_next_input());
        let second = vnfbd.next_input().unwrap();
        assert_eq!(second["id"], json!(INSTANCE_ID_BASE + 1));
        assert_ne!(first["rate"], second["rate"]);

        assert!(!vnfbd.has_next_input());
        assert!(vnfbd.next_input().is_none());

        // Re-multiplexing restarts the cursor from the base id.
        vnfbd.multiplex_parameters();
        assert_eq!(vnfbd.next_input().unwrap()["id"], json!(INSTANCE_ID_BASE));
    }

    #[test]
    fn test_tests_counter_multiplies_instances() {
        let mut data = base_descriptor();
        data["experiments"] = json!({"trials": 1, "tests": 3});
        let mut vnfbd = VnfBd::from_value(data, inputs_with_list()).unwrap();
        vnfbd.multiplex_parameters();

        let mut seen = Vec::new();
        while let Some(input) = vnfbd.next_input() {
            seen.push((input["id"].clone(), input["test"].clone()));
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], (json!(500), json!(0)));
        assert_eq!(seen[2], (json!(502), json!(2)));
        assert_eq!(seen[3], (json!(503), json!(0)));
    }
}
