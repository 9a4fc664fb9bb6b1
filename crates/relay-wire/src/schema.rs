//! Tool input-schema cleanup.
//!
//! Some upstream model families (Gemini-class) reject JSON Schema keywords
//! the Anthropic clients routinely emit. The cleanup strips `$schema` and
//! `additionalProperties` everywhere, and drops `format` from string-typed
//! schemas unless it is one of the accepted values.

use serde_json::Value;

const ACCEPTED_STRING_FORMATS: &[&str] = &["date-time", "enum"];

/// Recursively clean a tool input schema.
#[must_use]
pub fn clean_tool_schema(schema: &Value) -> Value {
    match schema {
        Value::Array(items) => Value::Array(items.iter().map(clean_tool_schema).collect()),
        Value::Object(map) => {
            let mut cleaned = serde_json::Map::new();
            for (key, value) in map {
                if key == "$schema" || key == "additionalProperties" {
                    continue;
                }
                let _ = cleaned.insert(key.clone(), clean_tool_schema(value));
            }

            let is_string_type =
                cleaned.get("type").and_then(Value::as_str) == Some("string");
            if is_string_type {
                let drop_format = cleaned
                    .get("format")
                    .and_then(Value::as_str)
                    .is_some_and(|f| !ACCEPTED_STRING_FORMATS.contains(&f));
                if drop_format {
                    let _ = cleaned.remove("format");
                }
            }

            Value::Object(cleaned)
        }
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_schema_and_additional_properties() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "properties": {"d": {"type": "string", "format": "email"}}
        });
        let cleaned = clean_tool_schema(&schema);
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {"d": {"type": "string"}}
            })
        );
    }

    #[test]
    fn strips_nested_additional_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "inner": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {"x": {"type": "number"}}
                }
            }
        });
        let cleaned = clean_tool_schema(&schema);
        assert!(cleaned["properties"]["inner"].get("additionalProperties").is_none());
        assert_eq!(cleaned["properties"]["inner"]["properties"]["x"]["type"], "number");
    }

    #[test]
    fn keeps_date_time_format() {
        let schema = json!({"type": "string", "format": "date-time"});
        assert_eq!(clean_tool_schema(&schema), schema);
    }

    #[test]
    fn keeps_enum_format() {
        let schema = json!({"type": "string", "format": "enum"});
        assert_eq!(clean_tool_schema(&schema), schema);
    }

    #[test]
    fn drops_unaccepted_format_only_on_strings() {
        let schema = json!({"type": "number", "format": "double"});
        // Non-string types keep their format untouched.
        assert_eq!(clean_tool_schema(&schema), schema);
    }

    #[test]
    fn cleans_inside_arrays() {
        let schema = json!({
            "anyOf": [
                {"type": "string", "format": "uri"},
                {"type": "object", "additionalProperties": true}
            ]
        });
        let cleaned = clean_tool_schema(&schema);
        assert!(cleaned["anyOf"][0].get("format").is_none());
        assert!(cleaned["anyOf"][1].get("additionalProperties").is_none());
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(clean_tool_schema(&json!(true)), json!(true));
        assert_eq!(clean_tool_schema(&json!("x")), json!("x"));
        assert_eq!(clean_tool_schema(&Value::Null), Value::Null);
    }
}
