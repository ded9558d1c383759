//! Descriptor template rendering.
//!
//! Templates are YAML files with `{{ key }}` placeholders substituted from a
//! flat key/value input context before parsing. Unknown placeholders are
//! left in place so a template with unset optional inputs still parses.

use crate::error::DescriptorError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Substitute `{{ key }}` placeholders in `template` from `inputs`.
///
/// String values are inserted verbatim; everything else is inserted as its
/// JSON rendering, which YAML accepts inline.
pub fn render(template: &str, inputs: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match inputs.get(key) {
                    Some(Value::String(text)) => out.push_str(text),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render the template at `path` against `inputs` and parse it as YAML.
pub fn parse(path: &Path, inputs: &Map<String, Value>) -> Result<Map<String, Value>, DescriptorError> {
    debug!(path = %path.display(), "parsing descriptor template");
    let template = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rendered = render(&template, inputs);
    let value: Value = serde_yaml::from_str(&rendered)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DescriptorError::NotAMapping),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("inputs must be an object"),
        }
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let context = inputs(json!({"rate": 100, "host": "10.0.0.1"}));
        let rendered = render("target: {{ host }}\nrate: {{rate}}\n", &context);
        assert_eq!(rendered, "target: 10.0.0.1\nrate: 100\n");
    }

    #[test]
    fn test_render_keeps_unknown_keys() {
        let context = inputs(json!({}));
        assert_eq!(render("x: {{ missing }}", &context), "x: {{ missing }}");
        assert_eq!(render("left open {{", &context), "left open {{");
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vnf-bd-000.yaml");
        std::fs::write(&path, "- just\n- a\n- list\n").unwrap();
        assert!(matches!(
            parse(&path, &Map::new()),
            Err(DescriptorError::NotAMapping)
        ));
    }
}
