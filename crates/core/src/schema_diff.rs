//! Structural diff of two JSON-Schema-like documents and compatibility
//! classification (spec §4.1).
//!
//! Ported in meaning from the reference `SchemaDiff` implementation: same
//! change kinds, same breaking-set-per-mode mapping, same classification
//! rule. Pure and side-effect free.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::domain::CompatibilityMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PropertyAdded,
    PropertyRemoved,
    PropertyRenamed,
    TypeChanged,
    TypeWidened,
    TypeNarrowed,
    RequiredAdded,
    RequiredRemoved,
    EnumValuesAdded,
    EnumValuesRemoved,
    ConstraintTightened,
    ConstraintRelaxed,
    DefaultAdded,
    DefaultRemoved,
    DefaultChanged,
    NullableAdded,
    NullableRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Patch,
    Minor,
    Major,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingChange {
    pub kind: ChangeKind,
    pub path: String,
    pub message: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl BreakingChange {
    fn new(
        kind: ChangeKind,
        path: impl Into<String>,
        message: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
            old_value,
            new_value,
        }
    }
}

fn backward_breaking() -> &'static [ChangeKind] {
    use ChangeKind::*;
    &[
        PropertyRemoved,
        PropertyRenamed,
        TypeChanged,
        TypeNarrowed,
        RequiredAdded,
        EnumValuesRemoved,
        ConstraintTightened,
        DefaultRemoved,
        NullableRemoved,
    ]
}

fn forward_breaking() -> &'static [ChangeKind] {
    use ChangeKind::*;
    &[
        PropertyAdded,
        PropertyRenamed,
        TypeChanged,
        TypeWidened,
        RequiredRemoved,
        EnumValuesAdded,
        ConstraintRelaxed,
        DefaultAdded,
        NullableAdded,
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiffResult {
    pub changes: Vec<BreakingChange>,
    pub change_type: ChangeType,
}

impl Default for ChangeType {
    fn default() -> Self {
        ChangeType::Patch
    }
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Breaking changes under the given compatibility mode (spec §4.1).
    pub fn breaking_for_mode(&self, mode: CompatibilityMode) -> Vec<&BreakingChange> {
        let breaking_kinds: HashSet<ChangeKind> = match mode {
            CompatibilityMode::None => return Vec::new(),
            CompatibilityMode::Backward => backward_breaking().iter().copied().collect(),
            CompatibilityMode::Forward => forward_breaking().iter().copied().collect(),
            CompatibilityMode::Full => backward_breaking()
                .iter()
                .chain(forward_breaking())
                .copied()
                .collect(),
        };
        self.changes
            .iter()
            .filter(|c| breaking_kinds.contains(&c.kind))
            .collect()
    }

    pub fn is_compatible(&self, mode: CompatibilityMode) -> bool {
        self.breaking_for_mode(mode).is_empty()
    }
}

/// Type hierarchy widening pairs: (narrow, wide).
const TYPE_WIDENING: &[(&str, &str)] = &[("integer", "number")];

const RELAX_ON_INCREASE: &[&str] = &["maxLength", "maxItems", "maximum", "exclusiveMaximum"];
const RELAX_ON_DECREASE: &[&str] = &["minLength", "minItems", "minimum", "exclusiveMinimum"];

pub struct SchemaDiff<'a> {
    old: &'a Value,
    new: &'a Value,
    changes: Vec<BreakingChange>,
}

impl<'a> SchemaDiff<'a> {
    pub fn new(old: &'a Value, new: &'a Value) -> Self {
        Self {
            old,
            new,
            changes: Vec::new(),
        }
    }

    pub fn diff(mut self) -> DiffResult {
        let old = self.old;
        let new = self.new;
        self.diff_object(old, new, "");
        let change_type = Self::classify(&self.changes);
        DiffResult {
            changes: self.changes,
            change_type,
        }
    }

    fn classify(changes: &[BreakingChange]) -> ChangeType {
        if changes.is_empty() {
            return ChangeType::Patch;
        }
        let backward: HashSet<ChangeKind> = backward_breaking().iter().copied().collect();
        if changes.iter().any(|c| backward.contains(&c.kind)) {
            return ChangeType::Major;
        }
        let additions = [
            ChangeKind::PropertyAdded,
            ChangeKind::EnumValuesAdded,
            ChangeKind::NullableAdded,
            ChangeKind::DefaultAdded,
        ];
        if changes.iter().any(|c| additions.contains(&c.kind)) {
            return ChangeType::Minor;
        }
        ChangeType::Patch
    }

    fn diff_object(&mut self, old: &Value, new: &Value, path: &str) {
        let old_props = old.get("properties").and_then(Value::as_object);
        let new_props = new.get("properties").and_then(Value::as_object);
        let props_path = join(path, "properties");
        self.diff_properties(old_props, new_props, &props_path);

        let old_required: HashSet<String> = old
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let new_required: HashSet<String> = new
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        self.diff_required(&old_required, &new_required, path);

        self.diff_type(old, new, path);
        self.diff_constraints(old, new, path);
        self.diff_enum(old, new, path);
        self.diff_default(old, new, path);
        self.diff_nullable(old, new, path);

        if old.get("type").and_then(Value::as_str) == Some("array")
            && new.get("type").and_then(Value::as_str) == Some("array")
        {
            let empty = Value::Object(Default::default());
            let old_items = old.get("items").unwrap_or(&empty);
            let new_items = new.get("items").unwrap_or(&empty);
            if old.get("items").is_some() || new.get("items").is_some() {
                self.diff_object(old_items, new_items, &join(path, "items"));
            }
        }
    }

    fn diff_properties(
        &mut self,
        old_props: Option<&serde_json::Map<String, Value>>,
        new_props: Option<&serde_json::Map<String, Value>>,
        path: &str,
    ) {
        let empty = serde_json::Map::new();
        let old_props = old_props.unwrap_or(&empty);
        let new_props = new_props.unwrap_or(&empty);

        let old_keys: HashSet<&String> = old_props.keys().collect();
        let new_keys: HashSet<&String> = new_props.keys().collect();

        for key in old_keys.difference(&new_keys) {
            self.changes.push(BreakingChange::new(
                ChangeKind::PropertyRemoved,
                join(path, key),
                format!("Property '{key}' was removed"),
                Some(old_props[*key].clone()),
                None,
            ));
        }

        for key in new_keys.difference(&old_keys) {
            self.changes.push(BreakingChange::new(
                ChangeKind::PropertyAdded,
                join(path, key),
                format!("Property '{key}' was added"),
                None,
                Some(new_props[*key].clone()),
            ));
        }

        for key in old_keys.intersection(&new_keys) {
            self.diff_object(&old_props[*key], &new_props[*key], &join(path, key));
        }
    }

    fn diff_required(&mut self, old_req: &HashSet<String>, new_req: &HashSet<String>, path: &str) {
        if old_req.is_empty() && new_req.is_empty() {
            return;
        }
        let req_path = join(path, "required");
        let old_vec: Vec<&str> = old_req.iter().map(String::as_str).collect();
        let new_vec: Vec<&str> = new_req.iter().map(String::as_str).collect();

        for field in new_req.difference(old_req) {
            self.changes.push(BreakingChange::new(
                ChangeKind::RequiredAdded,
                &req_path,
                format!("Field '{field}' is now required"),
                Some(serde_json::json!(old_vec)),
                Some(serde_json::json!(new_vec)),
            ));
        }
        for field in old_req.difference(new_req) {
            self.changes.push(BreakingChange::new(
                ChangeKind::RequiredRemoved,
                &req_path,
                format!("Field '{field}' is no longer required"),
                Some(serde_json::json!(old_vec)),
                Some(serde_json::json!(new_vec)),
            ));
        }
    }

    fn diff_type(&mut self, old: &Value, new: &Value, path: &str) {
        let old_type = old.get("type").and_then(Value::as_str);
        let new_type = new.get("type").and_then(Value::as_str);
        let (Some(old_type), Some(new_type)) = (old_type, new_type) else {
            return;
        };
        if old_type == new_type {
            return;
        }
        let type_path = join(path, "type");
        let kind = if TYPE_WIDENING.contains(&(old_type, new_type)) {
            ChangeKind::TypeWidened
        } else if TYPE_WIDENING.contains(&(new_type, old_type)) {
            ChangeKind::TypeNarrowed
        } else {
            ChangeKind::TypeChanged
        };
        let verb = match kind {
            ChangeKind::TypeWidened => "widened",
            ChangeKind::TypeNarrowed => "narrowed",
            _ => "changed",
        };
        self.changes.push(BreakingChange::new(
            kind,
            type_path,
            format!("Type {verb} from '{old_type}' to '{new_type}'"),
            Some(Value::String(old_type.to_string())),
            Some(Value::String(new_type.to_string())),
        ));
    }

    fn diff_constraints(&mut self, old: &Value, new: &Value, path: &str) {
        let all: Vec<&str> = RELAX_ON_INCREASE
            .iter()
            .chain(RELAX_ON_DECREASE)
            .chain(std::iter::once(&"pattern"))
            .copied()
            .collect();

        for constraint in all {
            let old_val = old.get(constraint);
            let new_val = new.get(constraint);
            if old_val == new_val {
                continue;
            }
            let constraint_path = join(path, constraint);

            match (old_val, new_val) {
                (Some(ov), None) => self.changes.push(BreakingChange::new(
                    ChangeKind::ConstraintRelaxed,
                    &constraint_path,
                    format!("Constraint '{constraint}' was removed"),
                    Some(ov.clone()),
                    None,
                )),
                (None, Some(nv)) => self.changes.push(BreakingChange::new(
                    ChangeKind::ConstraintTightened,
                    &constraint_path,
                    format!("Constraint '{constraint}' was added with value {nv}"),
                    None,
                    Some(nv.clone()),
                )),
                (Some(ov), Some(nv)) if constraint == "pattern" => {
                    self.changes.push(BreakingChange::new(
                        ChangeKind::ConstraintTightened,
                        &constraint_path,
                        format!("Pattern changed from '{ov}' to '{nv}'"),
                        Some(ov.clone()),
                        Some(nv.clone()),
                    ))
                }
                (Some(ov), Some(nv)) => {
                    let (of, nf) = match (ov.as_f64(), nv.as_f64()) {
                        (Some(a), Some(b)) => (a, b),
                        _ => continue,
                    };
                    let relaxed = if RELAX_ON_INCREASE.contains(&constraint) {
                        nf > of
                    } else {
                        nf < of
                    };
                    let kind = if relaxed {
                        ChangeKind::ConstraintRelaxed
                    } else {
                        ChangeKind::ConstraintTightened
                    };
                    let verb = if relaxed { "relaxed" } else { "tightened" };
                    self.changes.push(BreakingChange::new(
                        kind,
                        &constraint_path,
                        format!("Constraint '{constraint}' {verb} from {ov} to {nv}"),
                        Some(ov.clone()),
                        Some(nv.clone()),
                    ));
                }
                (None, None) => {}
            }
        }
    }

    fn diff_enum(&mut self, old: &Value, new: &Value, path: &str) {
        let to_set = |v: &Value| -> HashSet<String> {
            v.get("enum")
                .and_then(Value::as_array)
                .map(|a| a.iter().map(|x| x.to_string()).collect())
                .unwrap_or_default()
        };
        let old_enum = to_set(old);
        let new_enum = to_set(new);
        if old_enum.is_empty() && new_enum.is_empty() {
            return;
        }
        let enum_path = join(path, "enum");
        let added: Vec<&String> = new_enum.difference(&old_enum).collect();
        let removed: Vec<&String> = old_enum.difference(&new_enum).collect();

        if !added.is_empty() {
            self.changes.push(BreakingChange::new(
                ChangeKind::EnumValuesAdded,
                &enum_path,
                format!("Enum values added: {added:?}"),
                Some(serde_json::json!(old_enum.iter().collect::<Vec<_>>())),
                Some(serde_json::json!(new_enum.iter().collect::<Vec<_>>())),
            ));
        }
        if !removed.is_empty() {
            self.changes.push(BreakingChange::new(
                ChangeKind::EnumValuesRemoved,
                &enum_path,
                format!("Enum values removed: {removed:?}"),
                Some(serde_json::json!(old_enum.iter().collect::<Vec<_>>())),
                Some(serde_json::json!(new_enum.iter().collect::<Vec<_>>())),
            ));
        }
    }

    fn diff_default(&mut self, old: &Value, new: &Value, path: &str) {
        let has_old = old.get("default").is_some();
        let has_new = new.get("default").is_some();
        if !has_old && !has_new {
            return;
        }
        let default_path = join(path, "default");
        let old_default = old.get("default");
        let new_default = new.get("default");

        match (has_old, has_new) {
            (true, false) => self.changes.push(BreakingChange::new(
                ChangeKind::DefaultRemoved,
                &default_path,
                format!("Default value removed (was {})", old_default.unwrap()),
                old_default.cloned(),
                None,
            )),
            (false, true) => self.changes.push(BreakingChange::new(
                ChangeKind::DefaultAdded,
                &default_path,
                format!("Default value added: {}", new_default.unwrap()),
                None,
                new_default.cloned(),
            )),
            (true, true) if old_default != new_default => {
                self.changes.push(BreakingChange::new(
                    ChangeKind::DefaultChanged,
                    &default_path,
                    format!(
                        "Default value changed from {} to {}",
                        old_default.unwrap(),
                        new_default.unwrap()
                    ),
                    old_default.cloned(),
                    new_default.cloned(),
                ))
            }
            _ => {}
        }
    }

    fn diff_nullable(&mut self, old: &Value, new: &Value, path: &str) {
        let old_nullable = old.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        let new_nullable = new.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        if old_nullable == new_nullable {
            return;
        }
        let nullable_path = join(path, "nullable");
        if new_nullable && !old_nullable {
            self.changes.push(BreakingChange::new(
                ChangeKind::NullableAdded,
                nullable_path,
                "Field is now nullable",
                Some(Value::Bool(false)),
                Some(Value::Bool(true)),
            ));
        } else {
            self.changes.push(BreakingChange::new(
                ChangeKind::NullableRemoved,
                nullable_path,
                "Field is no longer nullable",
                Some(Value::Bool(true)),
                Some(Value::Bool(false)),
            ));
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

pub fn diff_schemas(old: &Value, new: &Value) -> DiffResult {
    SchemaDiff::new(old, new).diff()
}

pub fn check_compatibility(
    old: &Value,
    new: &Value,
    mode: CompatibilityMode,
) -> (bool, Vec<BreakingChange>) {
    let result = diff_schemas(old, new);
    let breaking: Vec<BreakingChange> = result
        .breaking_for_mode(mode)
        .into_iter()
        .cloned()
        .collect();
    (breaking.is_empty(), breaking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders_v1() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "total": {"type": "number"}
            },
            "required": ["id"]
        })
    }

    #[test]
    fn diff_is_reflexive() {
        let s = orders_v1();
        let result = diff_schemas(&s, &s);
        assert!(!result.has_changes());
        assert_eq!(result.change_type, ChangeType::Patch);
    }

    #[test]
    fn property_added_is_asymmetric_with_removed() {
        let old = orders_v1();
        let mut new = orders_v1();
        new["properties"]["created_at"] = json!({"type": "string"});

        let forward = diff_schemas(&old, &new);
        assert!(forward
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::PropertyAdded && c.path == "properties.created_at"));

        let backward = diff_schemas(&new, &old);
        assert!(backward
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::PropertyRemoved && c.path == "properties.created_at"));
    }

    #[test]
    fn additions_alone_are_backward_compatible() {
        let old = orders_v1();
        let mut new = orders_v1();
        new["properties"]["created_at"] = json!({"type": "string", "default": "now", "nullable": true});
        new["properties"]["status"] = json!({"type": "string", "enum": ["a", "b"]});

        let result = diff_schemas(&old, &new);
        assert!(result.is_compatible(CompatibilityMode::Backward));
        assert_eq!(result.change_type, ChangeType::Minor);
    }

    #[test]
    fn removing_a_property_is_major_and_backward_breaking() {
        let old = orders_v1();
        let mut new = orders_v1();
        new["properties"].as_object_mut().unwrap().remove("total");

        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Major);
        assert!(!result.is_compatible(CompatibilityMode::Backward));
        assert_eq!(result.breaking_for_mode(CompatibilityMode::Backward).len(), 1);
        assert_eq!(
            result.breaking_for_mode(CompatibilityMode::Backward)[0].kind,
            ChangeKind::PropertyRemoved
        );
    }

    #[test]
    fn widening_int_to_number_is_not_backward_breaking() {
        let old = orders_v1();
        let mut new = orders_v1();
        new["properties"]["id"] = json!({"type": "number"});

        let result = diff_schemas(&old, &new);
        assert!(result.changes.iter().any(|c| c.kind == ChangeKind::TypeWidened));
        assert!(result.is_compatible(CompatibilityMode::Backward));
        assert!(!result.is_compatible(CompatibilityMode::Forward));
    }

    #[test]
    fn tightening_constraint_is_backward_breaking() {
        let old = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let new = json!({"type": "object", "properties": {"name": {"type": "string", "maxLength": 10}}});

        let result = diff_schemas(&old, &new);
        assert_eq!(result.changes[0].kind, ChangeKind::ConstraintTightened);
        assert!(!result.is_compatible(CompatibilityMode::Backward));
    }

    #[test]
    fn none_mode_never_breaks() {
        let old = orders_v1();
        let mut new = orders_v1();
        new["properties"].as_object_mut().unwrap().remove("total");
        let result = diff_schemas(&old, &new);
        assert!(result.is_compatible(CompatibilityMode::None));
    }

    #[test]
    fn recurses_into_array_items() {
        let old = json!({"type": "array", "items": {"type": "object", "properties": {"x": {"type": "integer"}}}});
        let new = json!({"type": "array", "items": {"type": "object", "properties": {"x": {"type": "string"}}}});
        let result = diff_schemas(&old, &new);
        assert!(result.changes.iter().any(|c| c.path == "items.properties.x.type"));
    }
}
