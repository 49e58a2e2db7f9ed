//! GraphQL SDL ingestion (`/sync/graphql`, spec SPEC_FULL.md §4.4 sibling).
//!
//! Walks the `Query` and `Mutation` root types of a schema document and
//! turns each field into an asset, the way `tessera-ingest::openapi` turns
//! each operation into one. No general-purpose SDL parser is pulled in for
//! this; the grammar this module needs (root type bodies, field names,
//! scalar/list/non-null wrappers) is small enough to scan directly.

use serde_json::{json, Value};

use crate::type_map;

/// One root-level query or mutation field.
pub struct FieldEntry {
    pub fqn: String,
    pub root: &'static str,
    pub field_name: String,
    pub schema: Value,
}

fn graphql_scalar_to_json_type(name: &str) -> &'static str {
    match name {
        "ID" | "String" => "string",
        "Int" => "integer",
        "Float" => "number",
        "Boolean" => "boolean",
        other => type_map::json_schema_type(other),
    }
}

/// Strip `!` (non-null) and `[...]` (list) wrappers down to the base type
/// name, tracking whether the field is a list.
fn unwrap_type(raw: &str) -> (String, bool) {
    let trimmed = raw.trim().trim_end_matches('!');
    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let inner = inner.trim_end_matches('!');
        (inner.to_string(), true)
    } else {
        (trimmed.to_string(), false)
    }
}

/// Extract the `{ ... }` body of `type <name> { ... }` for a given root type.
fn extract_type_body<'a>(sdl: &'a str, type_name: &str) -> Option<&'a str> {
    let marker = format!("type {type_name}");
    let start = sdl.find(&marker)?;
    let brace_start = sdl[start..].find('{')? + start;
    let mut depth = 0usize;
    for (offset, ch) in sdl[brace_start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&sdl[brace_start + 1..brace_start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_fields(body: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name_part, type_part)) = line.split_once(':') else { continue };
        let name = name_part.split('(').next().unwrap_or(name_part).trim();
        if name.is_empty() {
            continue;
        }
        fields.push((name.to_string(), type_part.trim().to_string()));
    }
    fields
}

/// Flatten a schema document's `Query`/`Mutation` root fields into one entry
/// per field.
pub fn fields(sdl: &str) -> Vec<FieldEntry> {
    let mut out = Vec::new();
    for root in ["Query", "Mutation"] {
        let Some(body) = extract_type_body(sdl, root) else { continue };
        for (name, raw_type) in parse_fields(body) {
            let (base_type, is_list) = unwrap_type(&raw_type);
            let json_type = graphql_scalar_to_json_type(&base_type);
            let schema = if is_list {
                json!({ "type": "array", "items": { "type": json_type } })
            } else {
                json!({ "type": json_type })
            };
            out.push(FieldEntry {
                fqn: format!("{}:{}", root.to_lowercase(), name),
                root,
                field_name: name,
                schema,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_query_field_maps_to_json_type() {
        let sdl = "type Query {\n  userCount: Int\n}\n";
        let entries = fields(sdl);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fqn, "query:userCount");
        assert_eq!(entries[0].schema["type"], json!("integer"));
    }

    #[test]
    fn list_field_becomes_json_array() {
        let sdl = "type Query {\n  users(limit: Int): [User!]!\n}\n";
        let entries = fields(sdl);
        assert_eq!(entries[0].schema["type"], json!("array"));
    }

    #[test]
    fn mutation_fields_are_included() {
        let sdl = "type Query { ping: Boolean }\ntype Mutation { createUser(name: String!): ID }\n";
        let entries = fields(sdl);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].fqn, "mutation:createUser");
    }
}
