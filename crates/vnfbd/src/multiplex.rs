//! Combinatorial expansion of descriptor inputs.
//!
//! Any list-valued leaf in the input structure is a sweep axis: the
//! expansion takes the Cartesian product across every discovered list and
//! produces one input set per combination, with the chosen element
//! substituted at each list's path.

use serde_json::{Map, Value};

/// Every path through nested objects that ends at a list value, paired with
/// that list's elements. Nested-object paths come before same-level lists,
/// and within a level keys are visited in map order, so the result is
/// deterministic for a given input.
pub fn list_paths(inputs: &Map<String, Value>) -> Vec<(Vec<String>, Vec<Value>)> {
    let mut paths = Vec::new();
    for (key, value) in inputs {
        if let Value::Object(nested) = value {
            for (mut sub_path, values) in list_paths(nested) {
                sub_path.insert(0, key.clone());
                paths.push((sub_path, values));
            }
        }
    }
    for (key, value) in inputs {
        if let Value::Array(items) = value {
            paths.push((vec![key.clone()], items.clone()));
        }
    }
    paths
}

/// The value at `path` inside `inputs`, if present.
pub fn get_path<'a>(inputs: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = inputs.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(nested) => get_path(nested, rest),
        _ => None,
    }
}

fn set_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [leaf] => {
            target.insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(nested)) = target.get_mut(head) {
                set_path(nested, rest, value);
            }
        }
    }
}

fn cartesian(lists: &[Vec<Value>]) -> Vec<Vec<Value>> {
    lists.iter().fold(vec![Vec::new()], |combos, list| {
        combos
            .iter()
            .flat_map(|combo| {
                list.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.push(value.clone());
                    next
                })
            })
            .collect()
    })
}

/// Expand `inputs` into one unique input set per combination of list values.
/// Inputs without any list value expand to a single copy of themselves.
pub fn mix_inputs(inputs: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let paths = list_paths(inputs);
    if paths.is_empty() {
        return vec![inputs.clone()];
    }
    let lists: Vec<Vec<Value>> = paths.iter().map(|(_, values)| values.clone()).collect();
    cartesian(&lists)
        .into_iter()
        .map(|combo| {
            let mut filled = inputs.clone();
            for ((path, _), value) in paths.iter().zip(combo) {
                set_path(&mut filled, path, value);
            }
            filled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_paths_reach_nested_lists() {
        let inputs = object(json!({
            "sut": {"resources": {"cpu": [1, 2]}},
            "rate": [10, 20, 30],
            "name": "fixed"
        }));
        let paths = list_paths(&inputs);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].0, vec!["sut", "resources", "cpu"]);
        assert_eq!(paths[1].0, vec!["rate"]);
    }

    #[test]
    fn test_mix_cardinality_is_list_product() {
        let inputs = object(json!({
            "a": [1, 2],
            "b": {"c": [10, 20, 30]},
            "fixed": true
        }));
        let mixed = mix_inputs(&inputs);
        assert_eq!(mixed.len(), 6);
        // Every combination substitutes scalars at both paths.
        for unique in &mixed {
            assert!(unique["a"].is_number());
            assert!(unique["b"]["c"].is_number());
            assert_eq!(unique["fixed"], json!(true));
        }
        // Deterministic: same input, same order.
        assert_eq!(mix_inputs(&inputs), mixed);
    }

    #[test]
    fn test_mix_without_lists_is_identity() {
        let inputs = object(json!({"a": 1, "b": {"c": "x"}}));
        let mixed = mix_inputs(&inputs);
        assert_eq!(mixed, vec![inputs]);
    }
}
