//! Fixed external-type → JSON-Schema mapping table (spec §6).
//!
//! Shared by the dbt, OpenAPI, and GraphQL ingestion paths so a `varchar(255)`
//! column and a `string` OpenAPI parameter land on the same JSON Schema
//! `"type"` value. Matching is case-insensitive; a parenthesized suffix such
//! as `numeric(10,2)` is stripped before lookup.

/// Map an external column/field type name to its JSON Schema `"type"`.
/// Unrecognized types fall back to `"string"`, matching the reference
/// behavior of treating unknown types as opaque text rather than rejecting
/// the column outright.
pub fn json_schema_type(external_type: &str) -> &'static str {
    let lower = external_type.to_ascii_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    match base {
        "string" | "text" | "varchar" | "char" | "character varying" => "string",

        "integer" | "int" | "bigint" | "smallint" | "int64" | "int32" => "integer",

        "number" | "numeric" | "decimal" | "float" | "double" | "real" | "float64" => "number",

        "boolean" | "bool" => "boolean",

        "date" | "datetime" | "timestamp" | "timestamp_ntz" | "timestamp_tz" | "time" => "string",

        "json" | "jsonb" | "variant" | "object" => "object",

        "array" => "array",

        _ => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parenthesized_precision() {
        assert_eq!(json_schema_type("varchar(255)"), "string");
        assert_eq!(json_schema_type("numeric(10,2)"), "number");
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(json_schema_type("VARCHAR"), "string");
        assert_eq!(json_schema_type("BigInt"), "integer");
    }

    #[test]
    fn unknown_type_falls_back_to_string() {
        assert_eq!(json_schema_type("geography"), "string");
    }
}
