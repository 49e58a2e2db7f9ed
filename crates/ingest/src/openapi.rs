//! OpenAPI ingestion (`/sync/openapi`, spec SPEC_FULL.md §4.4 sibling).
//!
//! Each operation (method + path) becomes an asset whose FQN is
//! `{method}:{path}`, e.g. `get:/users/{id}`, and whose schema is the JSON
//! Schema of its 2xx response body (falling back to its request body, then
//! to its parameter list if neither declares a schema).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::type_map;

#[derive(Debug, Deserialize, Default)]
pub struct OpenApiDocument {
    #[serde(default)]
    pub paths: HashMap<String, PathItem>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PathItem {
    pub get: Option<Operation>,
    pub post: Option<Operation>,
    pub put: Option<Operation>,
    pub patch: Option<Operation>,
    pub delete: Option<Operation>,
}

impl PathItem {
    fn operations(&self) -> Vec<(&'static str, &Operation)> {
        let mut out = Vec::new();
        if let Some(op) = &self.get {
            out.push(("get", op));
        }
        if let Some(op) = &self.post {
            out.push(("post", op));
        }
        if let Some(op) = &self.put {
            out.push(("put", op));
        }
        if let Some(op) = &self.patch {
            out.push(("patch", op));
        }
        if let Some(op) = &self.delete {
            out.push(("delete", op));
        }
        out
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Operation {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: HashMap<String, ResponseDef>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Value>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RequestBody {
    #[serde(default)]
    pub content: HashMap<String, MediaType>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ResponseDef {
    #[serde(default)]
    pub content: HashMap<String, MediaType>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MediaType {
    pub schema: Option<Value>,
}

/// One ingestible operation, ready to become an asset + contract schema.
pub struct OperationEntry {
    pub fqn: String,
    pub method: String,
    pub path: String,
    pub description: String,
    pub tags: Vec<String>,
    pub schema: Value,
}

fn rewrite_schema_types(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                if key == "type" {
                    if let Some(t) = value.as_str() {
                        out.insert(key.clone(), json!(type_map::json_schema_type(t)));
                        continue;
                    }
                }
                out.insert(key.clone(), rewrite_schema_types(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(rewrite_schema_types).collect()),
        other => other.clone(),
    }
}

fn schema_from_parameters(parameters: &[ParameterDef]) -> Value {
    let mut properties = serde_json::Map::new();
    for param in parameters {
        let base_type = param
            .schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string");
        properties.insert(param.name.clone(), json!({ "type": type_map::json_schema_type(base_type) }));
    }
    json!({ "type": "object", "properties": properties })
}

fn pick_response_schema(op: &Operation) -> Option<Value> {
    let mut keys: Vec<&String> = op.responses.keys().collect();
    keys.sort();
    for key in &keys {
        if key.starts_with('2') {
            if let Some(schema) = op.responses[*key].content.values().find_map(|m| m.schema.clone()) {
                return Some(schema);
            }
        }
    }
    None
}

/// Flatten an OpenAPI document into one entry per operation.
pub fn operations(doc: &OpenApiDocument) -> Vec<OperationEntry> {
    let mut entries = Vec::new();
    for (path, item) in &doc.paths {
        for (method, op) in item.operations() {
            let schema = pick_response_schema(op)
                .or_else(|| op.request_body.as_ref().and_then(|b| b.content.values().find_map(|m| m.schema.clone())))
                .map(|s| rewrite_schema_types(&s))
                .unwrap_or_else(|| schema_from_parameters(&op.parameters));

            entries.push(OperationEntry {
                fqn: format!("{method}:{path}"),
                method: method.to_string(),
                path: path.clone(),
                description: if op.description.is_empty() { op.summary.clone() } else { op.description.clone() },
                tags: op.tags.clone(),
                schema,
            });
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_fqn_is_method_colon_path() {
        let doc: OpenApiDocument = serde_json::from_value(json!({
            "paths": {
                "/users/{id}": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {"type": "object", "properties": {"id": {"type": "integer"}}}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
        .unwrap();

        let ops = operations(&doc);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].fqn, "get:/users/{id}");
        assert_eq!(ops[0].schema["properties"]["id"]["type"], json!("integer"));
    }

    #[test]
    fn missing_schema_falls_back_to_parameters() {
        let doc: OpenApiDocument = serde_json::from_value(json!({
            "paths": {
                "/search": {
                    "get": {
                        "parameters": [{"name": "q", "in": "query", "schema": {"type": "string"}}],
                        "responses": {"204": {}}
                    }
                }
            }
        }))
        .unwrap();

        let ops = operations(&doc);
        assert_eq!(ops[0].schema["properties"]["q"]["type"], json!("string"));
    }
}
