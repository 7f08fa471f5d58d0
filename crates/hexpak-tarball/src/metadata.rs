//! Normalization of decoded package metadata.
//!
//! Published packages span a decade of client versions, so several legacy
//! shapes survive on the wire. Normalization reshapes them into the forms
//! current callers expect.

use std::collections::BTreeMap;

use crate::terms::Value;

/// Filenames at the package root that identify a build tool.
const BUILD_TOOL_FILES: &[(&str, &str)] = &[
    ("mix.exs", "mix"),
    ("rebar.config", "rebar3"),
    ("rebar", "rebar3"),
    ("Makefile", "make"),
    ("Makefile.win", "make"),
];

/// Apply all normalization rules to a decoded metadata mapping.
pub fn normalize(mut metadata: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    if let Some(requirements) = metadata.remove("requirements") {
        metadata.insert(
            "requirements".to_string(),
            normalize_requirements(requirements),
        );
    }

    for key in ["links", "extra"] {
        if let Some(value) = metadata.remove(key) {
            metadata.insert(key.to_string(), coerce_map(value));
        }
    }

    guess_build_tools(&mut metadata);
    metadata
}

/// Reshape the `requirements` value into `{name => requirement-mapping}`.
///
/// Two legacy list shapes are accepted: a list of mappings each carrying a
/// `name` entry, and a list of `{name, requirement}` 2-tuples. A mapping
/// passes through; a list in neither shape is left untouched.
fn normalize_requirements(value: Value) -> Value {
    match &value {
        Value::List(items) => match requirements_from_list(items) {
            Some(requirements) => Value::Map(requirements),
            // Unknown shape: hand the list back untouched.
            None => value,
        },
        _ => value,
    }
}

fn requirements_from_list(items: &[Value]) -> Option<BTreeMap<String, Value>> {
    let mut requirements = BTreeMap::new();
    for item in items {
        if let Some(mut mapping) = as_map(item) {
            if let Some(Value::Binary(name)) = mapping.remove("name") {
                requirements.insert(name, Value::Map(mapping));
                continue;
            }
        }

        if let Value::Tuple(pair) = item {
            if let [Value::Binary(name), requirement] = pair.as_slice() {
                requirements.insert(name.clone(), coerce_map(requirement.clone()));
                continue;
            }
        }

        return None;
    }
    Some(requirements)
}

/// Coerce a list of 2-tuples into a mapping; other values pass through.
fn coerce_map(value: Value) -> Value {
    match as_map(&value) {
        Some(mapping) => Value::Map(mapping),
        None => value,
    }
}

/// View a value as a string-keyed mapping, accepting both the mapping form
/// and the pair-list wire form.
fn as_map(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Map(mapping) => Some(mapping.clone()),
        Value::List(items) => {
            let mut mapping = BTreeMap::new();
            for item in items {
                let Value::Tuple(pair) = item else {
                    return None;
                };
                match pair.as_slice() {
                    [Value::Binary(key), v] | [Value::Atom(key), v] => {
                        mapping.insert(key.clone(), v.clone());
                    }
                    _ => return None,
                }
            }
            Some(mapping)
        }
        _ => None,
    }
}

/// Fill in `build_tools` from the root-level filenames in `files` when the
/// key is absent. The result is sorted and deduplicated, and may be empty.
fn guess_build_tools(metadata: &mut BTreeMap<String, Value>) {
    if metadata.contains_key("build_tools") {
        return;
    }

    let mut tools: Vec<&str> = Vec::new();
    if let Some(Value::List(files)) = metadata.get("files") {
        for file in files {
            let Some(path) = file.as_binary() else {
                continue;
            };
            if path.contains('/') {
                continue;
            }
            if let Some((_, tool)) = BUILD_TOOL_FILES
                .iter()
                .copied()
                .find(|(name, _)| *name == path)
            {
                tools.push(tool);
            }
        }
    }
    tools.sort_unstable();
    tools.dedup();

    metadata.insert(
        "build_tools".to_string(),
        Value::List(tools.into_iter().map(Value::binary).collect()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: Value) -> Value {
        Value::Tuple(vec![Value::binary(key), value])
    }

    #[test]
    fn requirements_from_named_mappings() {
        // [[{"name","decimal"},{"requirement","~> 1.0"}]]
        let input = Value::List(vec![Value::List(vec![
            pair("name", Value::binary("decimal")),
            pair("requirement", Value::binary("~> 1.0")),
        ])]);

        let mut metadata = BTreeMap::new();
        metadata.insert("requirements".to_string(), input);
        let normalized = normalize(metadata);

        let Some(Value::Map(requirements)) = normalized.get("requirements") else {
            panic!("requirements should normalize to a mapping");
        };
        let Some(Value::Map(decimal)) = requirements.get("decimal") else {
            panic!("decimal entry should be a mapping");
        };
        assert_eq!(decimal.get("requirement"), Some(&Value::binary("~> 1.0")));
        assert!(!decimal.contains_key("name"));
    }

    #[test]
    fn requirements_from_name_value_pairs() {
        // [{"decimal",[{"requirement","~> 1.0"},{"optional",false}]}]
        let input = Value::List(vec![pair(
            "decimal",
            Value::List(vec![
                pair("requirement", Value::binary("~> 1.0")),
                pair("optional", Value::Atom("false".to_string())),
            ]),
        )]);

        let mut metadata = BTreeMap::new();
        metadata.insert("requirements".to_string(), input);
        let normalized = normalize(metadata);

        let Some(Value::Map(requirements)) = normalized.get("requirements") else {
            panic!("requirements should normalize to a mapping");
        };
        let Some(Value::Map(decimal)) = requirements.get("decimal") else {
            panic!("decimal entry should be a mapping");
        };
        assert_eq!(decimal.get("requirement"), Some(&Value::binary("~> 1.0")));
        assert_eq!(
            decimal.get("optional"),
            Some(&Value::Atom("false".to_string()))
        );
    }

    #[test]
    fn requirements_mapping_passes_through() {
        let mut entry = BTreeMap::new();
        entry.insert("requirement".to_string(), Value::binary("~> 2.0"));
        let mut requirements = BTreeMap::new();
        requirements.insert("ecto".to_string(), Value::Map(entry));

        let mut metadata = BTreeMap::new();
        metadata.insert("requirements".to_string(), Value::Map(requirements.clone()));
        let normalized = normalize(metadata);
        assert_eq!(
            normalized.get("requirements"),
            Some(&Value::Map(requirements))
        );
    }

    #[test]
    fn unknown_requirement_shape_is_left_alone() {
        let input = Value::List(vec![Value::Int(1)]);
        let mut metadata = BTreeMap::new();
        metadata.insert("requirements".to_string(), input.clone());
        let normalized = normalize(metadata);
        assert_eq!(normalized.get("requirements"), Some(&input));
    }

    #[test]
    fn links_pair_list_becomes_mapping() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "links".to_string(),
            Value::List(vec![pair("GitHub", Value::binary("https://github.com/x"))]),
        );
        let normalized = normalize(metadata);

        let Some(Value::Map(links)) = normalized.get("links") else {
            panic!("links should normalize to a mapping");
        };
        assert_eq!(
            links.get("GitHub"),
            Some(&Value::binary("https://github.com/x"))
        );
    }

    #[test]
    fn non_pair_links_value_is_untouched() {
        let mut metadata = BTreeMap::new();
        metadata.insert("links".to_string(), Value::binary("not-a-list"));
        let normalized = normalize(metadata);
        assert_eq!(normalized.get("links"), Some(&Value::binary("not-a-list")));
    }

    #[test]
    fn build_tools_guessed_from_root_files() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "files".to_string(),
            Value::List(vec![
                Value::binary("mix.exs"),
                Value::binary("src/a.erl"),
            ]),
        );
        let normalized = normalize(metadata);
        assert_eq!(
            normalized.get("build_tools"),
            Some(&Value::List(vec![Value::binary("mix")]))
        );
    }

    #[test]
    fn build_tools_sorted_and_deduplicated() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "files".to_string(),
            Value::List(vec![
                Value::binary("rebar.config"),
                Value::binary("Makefile"),
                Value::binary("rebar"),
            ]),
        );
        let normalized = normalize(metadata);
        assert_eq!(
            normalized.get("build_tools"),
            Some(&Value::List(vec![
                Value::binary("make"),
                Value::binary("rebar3"),
            ]))
        );
    }

    #[test]
    fn nested_build_tool_files_do_not_count() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "files".to_string(),
            Value::List(vec![Value::binary("sub/mix.exs")]),
        );
        let normalized = normalize(metadata);
        assert_eq!(
            normalized.get("build_tools"),
            Some(&Value::List(Vec::new()))
        );
    }

    #[test]
    fn explicit_build_tools_not_overwritten() {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "build_tools".to_string(),
            Value::List(vec![Value::binary("gradle")]),
        );
        metadata.insert(
            "files".to_string(),
            Value::List(vec![Value::binary("mix.exs")]),
        );
        let normalized = normalize(metadata);
        assert_eq!(
            normalized.get("build_tools"),
            Some(&Value::List(vec![Value::binary("gradle")]))
        );
    }

    #[test]
    fn missing_files_yields_empty_build_tools() {
        let normalized = normalize(BTreeMap::new());
        assert_eq!(
            normalized.get("build_tools"),
            Some(&Value::List(Vec::new()))
        );
    }
}
