//! Capability matching: descriptor requirements against a manager's
//! advertised agents and monitors.

use benchnet_messages::ToolSelection;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// The components a manager contributes to a task: component id mapped to
/// the tools (with resolved parameters) it must run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ComponentMapping {
    pub agents: BTreeMap<String, Vec<ToolSelection>>,
    pub monitors: BTreeMap<String, Vec<ToolSelection>>,
}

/// Normalized id of a component or tool entry; descriptor ids may be
/// numbers or strings.
fn entry_id(entry: &Value) -> Option<String> {
    match entry.get("id") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn as_list(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Required tool parameters arrive as `[{input, value}]` pairs; flatten to
/// a name → value map.
fn required_parameters(tool: &Value) -> Map<String, Value> {
    let mut parameters = Map::new();
    for entry in as_list(tool.get("parameters")) {
        if let Some(Value::String(name)) = entry.get("input") {
            parameters.insert(
                name.clone(),
                entry.get("value").cloned().unwrap_or(Value::Null),
            );
        }
    }
    parameters
}

fn advertises_parameter(available: &Value, name: &str) -> bool {
    match available.get("parameters") {
        Some(Value::Object(map)) => map.contains_key(name),
        Some(Value::Array(list)) => list.iter().any(|p| p.as_str() == Some(name)),
        _ => false,
    }
}

/// Match one component's required tool list against an advertised tool set
/// (keyed by tool id). Every required tool id must be advertised and every
/// required parameter name must be among the tool's parameters; a required
/// `instances` count replicates the selection.
fn match_tools(required: &[Value], available: &Value) -> Option<Vec<ToolSelection>> {
    let advertised = available.as_object()?;
    if !required
        .iter()
        .all(|tool| entry_id(tool).is_some_and(|id| advertised.contains_key(&id)))
    {
        return None;
    }

    let mut selections = Vec::new();
    let mut acked_ids = Vec::new();
    for tool in required {
        let id = entry_id(tool)?;
        let advertised_tool = advertised.get(&id)?;
        let parameters = required_parameters(tool);
        if !parameters
            .keys()
            .all(|name| advertises_parameter(advertised_tool, name))
        {
            continue;
        }
        let instances = tool
            .get("instances")
            .and_then(Value::as_u64)
            .filter(|count| *count > 0)
            .unwrap_or(1);
        let selection = ToolSelection {
            id: id.clone(),
            name: tool
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            parameters,
        };
        for _ in 0..instances {
            selections.push(selection.clone());
        }
        acked_ids.push(id);
    }

    if required
        .iter()
        .all(|tool| entry_id(tool).is_some_and(|id| acked_ids.contains(&id)))
    {
        Some(selections)
    } else {
        None
    }
}

/// One-to-one assignment of required components to available ones.
///
/// A required id that matches an available id exactly is bound to that
/// component only; otherwise the not-yet-selected available components are
/// scanned in order and the first satisfying one wins.
fn match_components(
    required: &[Value],
    available: &[Value],
    tool_key: &str,
) -> Option<BTreeMap<String, Vec<ToolSelection>>> {
    let mut selected: BTreeMap<String, Vec<ToolSelection>> = BTreeMap::new();
    let mut assigned: BTreeMap<String, String> = BTreeMap::new();

    for requirement in required {
        let Some(req_id) = entry_id(requirement) else {
            continue;
        };
        let req_tools = as_list(requirement.get(tool_key));
        let exact = available
            .iter()
            .find(|candidate| entry_id(candidate).as_deref() == Some(req_id.as_str()));

        if let Some(candidate) = exact {
            if assigned.contains_key(&req_id) || assigned.values().any(|id| *id == req_id) {
                continue;
            }
            let advertised = candidate.get(tool_key).cloned().unwrap_or(Value::Null);
            if let Some(tools) = match_tools(req_tools, &advertised) {
                selected.insert(req_id.clone(), tools);
                assigned.insert(req_id.clone(), req_id.clone());
            } else {
                debug!(component = %req_id, "exact candidate does not satisfy required tools");
            }
        } else {
            for candidate in available {
                let Some(candidate_id) = entry_id(candidate) else {
                    continue;
                };
                if assigned.contains_key(&req_id) || assigned.values().any(|id| *id == candidate_id)
                {
                    continue;
                }
                let advertised = candidate.get(tool_key).cloned().unwrap_or(Value::Null);
                if let Some(tools) = match_tools(req_tools, &advertised) {
                    selected.insert(req_id.clone(), tools);
                    assigned.insert(req_id.clone(), candidate_id);
                    break;
                }
            }
        }
    }

    let all_assigned = required
        .iter()
        .all(|requirement| entry_id(requirement).is_some_and(|id| assigned.contains_key(&id)));
    if all_assigned {
        Some(selected)
    } else {
        debug!("not every required component found a satisfying candidate");
        None
    }
}

fn check_nodes(available: &Value, proceedings: &Value, kind: &str) -> (bool, bool) {
    let required = as_list(proceedings.get(kind));
    let advertised = as_list(available.get(kind));
    if required.is_empty() {
        (false, true)
    } else {
        (true, required.len() <= advertised.len())
    }
}

/// Decide whether one manager's advertised structure satisfies the
/// descriptor's proceedings; None when it cannot.
pub fn satisfy(proceedings: &Value, available: &Value) -> Option<ComponentMapping> {
    let (need_agents, enough_agents) = check_nodes(available, proceedings, "agents");
    let (need_monitors, enough_monitors) = check_nodes(available, proceedings, "monitors");
    debug!(
        need_agents,
        enough_agents, need_monitors, enough_monitors, "matching manager structure"
    );
    if !(enough_agents && enough_monitors) {
        return None;
    }

    let mut mapping = ComponentMapping::default();
    if need_agents {
        mapping.agents = match_components(
            as_list(proceedings.get("agents")),
            as_list(available.get("agents")),
            "probers",
        )?;
    }
    if need_monitors {
        mapping.monitors = match_components(
            as_list(proceedings.get("monitors")),
            as_list(available.get("monitors")),
            "listeners",
        )?;
    }
    Some(mapping)
}
