use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

const ENV_PREFIX: &str = "TROLLEY_POLICY__";

/// Builtin defaults, then the file (when given and present), then the
/// environment. Every overlay records its provenance on the snapshot.
pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    let mut value =
        serde_json::to_value(&snapshot).map_err(|err| PolicyError::Invalid(err.to_string()))?;

    if let Some(path) = path {
        if path.exists() {
            let overlays = overlays_from_file(path)?;
            if !overlays.is_empty() {
                apply_overlays(&mut value, &mut snapshot, overlays, PolicySource::File)?;
            }
        }
    }

    let env_overlays = overlays_from_env();
    if !env_overlays.is_empty() {
        apply_overlays(&mut value, &mut snapshot, env_overlays, PolicySource::Env)?;
    }

    let provenance = snapshot.provenance.clone();
    let rev = snapshot.rev;
    let mut merged: PolicySnapshot =
        serde_json::from_value(value).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    merged.provenance = provenance;
    merged.rev = rev;
    Ok(merged)
}

fn apply_overlays(
    value: &mut Value,
    snapshot: &mut PolicySnapshot,
    overlays: Vec<(String, Value)>,
    source: PolicySource,
) -> Result<(), PolicyError> {
    for (path, leaf) in overlays {
        debug!(target: "policy", %path, ?source, "overlay applied");
        set_path(value, &path, leaf)?;
        snapshot.set_provenance(&path, source);
    }
    snapshot.rev += 1;
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<(String, Value)>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(err.to_string()))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, None))
}

fn overlays_from_env() -> Vec<(String, Value)> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push((path, parse_env_value(&raw)));
        }
    }
    overlays.sort_by(|a, b| a.0.cmp(&b.0));
    overlays
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key_segment}"),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix)));
            }
            result
        }
        other => match prefix {
            Some(prefix) => vec![(prefix, other)],
            None => Vec::new(),
        },
    }
}

fn set_path(root: &mut Value, path: &str, leaf: Value) -> Result<(), PolicyError> {
    let mut cursor = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let map = cursor
            .as_object_mut()
            .ok_or_else(|| PolicyError::Invalid(format!("policy path '{path}' is not a section")))?;
        if i + 1 == segments.len() {
            map.insert(segment.to_string(), leaf);
            return Ok(());
        }
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    Ok(())
}

fn bootstrap_builtin_provenance(snapshot: &mut PolicySnapshot) -> Result<(), PolicyError> {
    let mut overlays = Vec::new();
    for (section, value) in [
        ("exec", serde_json::to_value(&snapshot.exec)),
        ("verify", serde_json::to_value(&snapshot.verify)),
        ("queue", serde_json::to_value(&snapshot.queue)),
    ] {
        let value = value.map_err(|err| PolicyError::Invalid(err.to_string()))?;
        overlays.extend(flatten_value(value, Some(section.to_string())));
    }
    for (path, _) in overlays {
        snapshot.set_provenance(&path, PolicySource::Builtin);
    }
    Ok(())
}
