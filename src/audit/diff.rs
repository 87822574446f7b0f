//! Field-level diffing of before/after JSON snapshots.

use serde::{Deserialize, Serialize};

/// One changed field between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub data_type: String,
}

/// Compare two JSON object snapshots field by field. Fields present in only
/// one side diff against `null`. Non-object inputs produce no changes.
pub fn calculate_field_changes(
    before: &serde_json::Value,
    after: &serde_json::Value,
) -> Vec<FieldChange> {
    let (Some(before_map), Some(after_map)) = (before.as_object(), after.as_object()) else {
        return Vec::new();
    };

    let mut fields: Vec<&String> = before_map.keys().chain(after_map.keys()).collect();
    fields.sort();
    fields.dedup();

    let mut changes = Vec::new();
    for field in fields {
        let old_value = before_map
            .get(field)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let new_value = after_map
            .get(field)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        if old_value != new_value {
            let data_type = json_type_name(if new_value.is_null() {
                &old_value
            } else {
                &new_value
            });
            changes.push(FieldChange {
                field: field.clone(),
                old_value,
                new_value,
                data_type: data_type.to_string(),
            });
        }
    }

    changes
}

/// Names of the changed fields, for the `modified_fields` column.
pub fn modified_field_names(changes: &[FieldChange]) -> Vec<String> {
    changes.iter().map(|c| c.field.clone()).collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
