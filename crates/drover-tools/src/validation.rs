//! Tool argument validation.
//!
//! Enforces the JSON-Schema subset tool schemas actually use: `type`,
//! `required`, `enum`, `properties`, `items`, and — the hard rule —
//! `additionalProperties=false` by default, so unknown keys never reach
//! `execute`.

use serde_json::{Map, Value};

use drover_core::tools::ToolParameterSchema;

/// Validate `arguments` against a tool's parameter schema.
///
/// Returns `Err(message)` on the first violation. Arguments that pass are
/// safe to hand to `execute`.
pub fn validate_arguments(
    schema: &ToolParameterSchema,
    arguments: &Map<String, Value>,
) -> Result<(), String> {
    let schema = schema.normalized();

    // Unknown keys are a hard error unless the schema opted out.
    if schema.additional_properties == Some(false) {
        let known = schema.properties.as_ref();
        for key in arguments.keys() {
            let recognized = known.is_some_and(|p| p.contains_key(key));
            if !recognized {
                return Err(format!("unknown argument key: {key:?}"));
            }
        }
    }

    if let Some(required) = &schema.required {
        for key in required {
            if !arguments.contains_key(key) {
                return Err(format!("missing required argument: {key:?}"));
            }
        }
    }

    if let Some(properties) = &schema.properties {
        for (key, value) in arguments {
            if let Some(prop_schema) = properties.get(key) {
                validate_value(value, prop_schema, key)?;
            }
        }
    }

    Ok(())
}

/// Validate a single value against a property schema.
fn validate_value(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(value, expected) {
            return Err(format!(
                "argument {path:?} has wrong type: expected {expected}, got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("argument {path:?} is not one of the allowed values"));
        }
    }

    match value {
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_value(item, item_schema, &format!("{path}[{i}]"))?;
                }
            }
        }
        Value::Object(map) => {
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                let closed = schema
                    .get("additionalProperties")
                    .and_then(Value::as_bool)
                    == Some(false);
                for (key, nested) in map {
                    match properties.get(key) {
                        Some(nested_schema) => {
                            validate_value(nested, nested_schema, &format!("{path}.{key}"))?;
                        }
                        None if closed => {
                            return Err(format!("unknown argument key: {path:?}.{key}"));
                        }
                        None => {}
                    }
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
