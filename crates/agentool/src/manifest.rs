//! Tool manifest types.
//!
//! A manifest (`agent.json`) describes a tool's identity, interface schemas,
//! declared runtime and entrypoint. Only `entrypoint.command` is required;
//! every other field is read best-effort, so a malformed optional field is
//! treated as absent rather than failing the load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ToolError, ToolResult};

/// A tool manifest loaded from `agent.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    /// Package name (e.g. `@zack/summarize`). Empty when not declared.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Semantic version string. Empty when not declared.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema-shaped description of the request payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    /// JSON-Schema-shaped description of the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    /// Declared interpreter runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeDecl>,
    /// How to launch the tool.
    pub entrypoint: Entrypoint,
}

/// Declared runtime (`{"type": "node", "version": ">=18"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDecl {
    /// Interpreter family (`node`, `python`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Informational version constraint. Not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Launch description for a tool process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    /// Interpreter command (e.g. `node`, `python3`).
    pub command: String,
    /// Arguments passed after the command.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory relative to the tool directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Declared timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Extra environment for the child process.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Manifest {
    /// Read and minimally validate the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Manifest`] if the file cannot be read, is not a
    /// JSON object, or lacks a string `entrypoint.command`.
    pub fn read(path: &Path) -> ToolResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ToolError::Manifest {
            path: path.to_path_buf(),
            message: format!("failed to read: {e}"),
        })?;
        let manifest = Self::parse(&content, path)?;
        debug!(
            path = %path.display(),
            name = %manifest.name,
            command = %manifest.entrypoint.command,
            "Read tool manifest"
        );
        Ok(manifest)
    }

    /// Parse manifest text. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Manifest`] for invalid JSON, a non-object
    /// document, or a missing `entrypoint.command`.
    pub fn parse(content: &str, path: &Path) -> ToolResult<Self> {
        let invalid = |message: String| ToolError::Manifest {
            path: path.to_path_buf(),
            message,
        };

        let doc: Value =
            serde_json::from_str(content).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
        let Value::Object(doc) = doc else {
            return Err(invalid("manifest must be a JSON object".into()));
        };

        let entry = doc.get("entrypoint");
        let command = entry
            .and_then(|e| e.get("command"))
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| invalid("missing required field 'entrypoint.command'".into()))?;

        let entrypoint = Entrypoint {
            command: command.to_string(),
            args: entry
                .and_then(|e| e.get("args"))
                .and_then(Value::as_array)
                .map(|args| args.iter().filter_map(scalar_to_string).collect())
                .unwrap_or_default(),
            cwd: entry
                .and_then(|e| e.get("cwd"))
                .and_then(Value::as_str)
                .map(PathBuf::from),
            timeout_ms: entry.and_then(|e| e.get("timeout_ms")).and_then(Value::as_u64),
            env: entry
                .and_then(|e| e.get("env"))
                .and_then(Value::as_object)
                .map(|env| {
                    env.iter()
                        .filter_map(|(k, v)| Some((k.clone(), scalar_to_string(v)?)))
                        .collect()
                })
                .unwrap_or_default(),
        };

        let string_field = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            name: string_field("name").unwrap_or_default(),
            version: string_field("version").unwrap_or_default(),
            description: string_field("description"),
            inputs: doc.get("inputs").filter(|v| v.is_object()).cloned(),
            outputs: doc.get("outputs").filter(|v| v.is_object()).cloned(),
            runtime: doc
                .get("runtime")
                .and_then(|r| serde_json::from_value(r.clone()).ok()),
            entrypoint,
        })
    }
}

/// Strings pass through; numbers and booleans are rendered; anything else is
/// dropped.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ToolResult<Manifest> {
        Manifest::parse(json, Path::new("/t/agent.json"))
    }

    #[test]
    fn full_manifest() {
        let m = parse(
            r#"{
                "name": "@zack/summarize",
                "version": "0.1.0",
                "description": "Summarize text",
                "inputs": {"type": "object", "properties": {"text": {"type": "string"}}},
                "outputs": {"type": "object"},
                "runtime": {"type": "node", "version": ">=18"},
                "entrypoint": {
                    "command": "node",
                    "args": ["index.js", 3],
                    "cwd": "dist",
                    "timeout_ms": 5000,
                    "env": {"MODE": "fast", "LEVEL": 2}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(m.name, "@zack/summarize");
        assert_eq!(m.version, "0.1.0");
        assert_eq!(m.runtime.as_ref().unwrap().kind, "node");
        assert_eq!(m.entrypoint.args, vec!["index.js", "3"]);
        assert_eq!(m.entrypoint.cwd, Some(PathBuf::from("dist")));
        assert_eq!(m.entrypoint.timeout_ms, Some(5000));
        assert_eq!(m.entrypoint.env.get("LEVEL").map(String::as_str), Some("2"));
    }

    #[test]
    fn minimal_manifest() {
        let m = parse(r#"{"entrypoint": {"command": "python3"}}"#).unwrap();
        assert_eq!(m.entrypoint.command, "python3");
        assert!(m.entrypoint.args.is_empty());
        assert!(m.name.is_empty());
        assert!(m.runtime.is_none());
    }

    #[test]
    fn name_and_version_are_optional_on_the_way_out() {
        let m = parse(r#"{"entrypoint": {"command": "node", "args": ["index.js"]}}"#).unwrap();
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            serde_json::json!({"entrypoint": {"command": "node", "args": ["index.js"]}})
        );
    }

    #[test]
    fn missing_command_is_rejected() {
        let err = parse(r#"{"name": "x", "entrypoint": {"args": []}}"#).unwrap_err();
        assert!(err.to_string().contains("entrypoint.command"));
        assert!(parse(r#"{"entrypoint": {"command": 7}}"#).is_err());
        assert!(parse(r#"{"entrypoint": {"command": "  "}}"#).is_err());
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, ToolError::Manifest { .. }));
        assert!(parse("[1, 2]").is_err());
    }

    #[test]
    fn malformed_optional_fields_are_ignored() {
        let m = parse(
            r#"{
                "name": 42,
                "inputs": "not a schema",
                "runtime": "node",
                "entrypoint": {"command": "node", "args": "index.js", "timeout_ms": -1}
            }"#,
        )
        .unwrap();
        assert!(m.name.is_empty());
        assert!(m.inputs.is_none());
        assert!(m.runtime.is_none());
        assert!(m.entrypoint.args.is_empty());
        assert!(m.entrypoint.timeout_ms.is_none());
    }

    #[test]
    fn read_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.json");
        std::fs::write(&path, r#"{"entrypoint": {"command": "node"}}"#).unwrap();
        assert_eq!(Manifest::read(&path).unwrap().entrypoint.command, "node");

        let missing = Manifest::read(&tmp.path().join("nope.json")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }
}
