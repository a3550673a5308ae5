//! JSON Schema clean-up for providers that accept only an OpenAPI subset.
//!
//! MCP servers publish full JSON Schema (often generated, with `$schema`,
//! `additionalProperties`, `exclusiveMinimum`, …).  Gemini rejects function
//! declarations that carry keywords outside its `Schema` object, so tool
//! parameters pass through [`sanitize_gemini_schema`] before being sent.

use serde_json::{Map, Value};

/// Keywords Gemini's `Schema` object understands.
const GEMINI_SCHEMA_KEYS: &[&str] = &[
    "type",
    "format",
    "title",
    "description",
    "nullable",
    "enum",
    "maxItems",
    "minItems",
    "properties",
    "required",
    "minProperties",
    "maxProperties",
    "minLength",
    "maxLength",
    "pattern",
    "example",
    "anyOf",
    "propertyOrdering",
    "default",
    "items",
    "minimum",
    "maximum",
];

/// String formats Gemini accepts; any other `format` is dropped.
const GEMINI_STRING_FORMATS: &[&str] = &["enum", "date-time"];

/// Return a copy of `schema` restricted to the keywords Gemini accepts.
///
/// - unknown keywords are removed at every nesting level;
/// - `"type": ["string", "null"]` collapses to `"type": "string"` plus
///   `"nullable": true`;
/// - `required` entries that name a missing property are dropped.
pub fn sanitize_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(sanitize_object(obj)),
        other => other.clone(),
    }
}

fn sanitize_object(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();

    for (key, value) in obj {
        if !GEMINI_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "properties" => {
                if let Value::Object(props) = value {
                    let cleaned: Map<String, Value> = props
                        .iter()
                        .map(|(name, s)| (name.clone(), sanitize_gemini_schema(s)))
                        .collect();
                    out.insert(key.clone(), Value::Object(cleaned));
                }
            }
            "items" => {
                out.insert(key.clone(), sanitize_gemini_schema(value));
            }
            "anyOf" => {
                if let Value::Array(variants) = value {
                    let cleaned = variants.iter().map(sanitize_gemini_schema).collect();
                    out.insert(key.clone(), Value::Array(cleaned));
                }
            }
            "type" => match value {
                Value::Array(types) => {
                    let mut nullable = false;
                    let mut chosen = None;
                    for t in types.iter().filter_map(Value::as_str) {
                        if t == "null" {
                            nullable = true;
                        } else if chosen.is_none() {
                            chosen = Some(t.to_string());
                        }
                    }
                    if let Some(t) = chosen {
                        out.insert("type".into(), Value::String(t));
                    }
                    if nullable {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            },
            "format" => {
                let keep = value
                    .as_str()
                    .map(|f| GEMINI_STRING_FORMATS.contains(&f) || !is_string_type(obj))
                    .unwrap_or(false);
                if keep {
                    out.insert(key.clone(), value.clone());
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    if let (Some(Value::Array(required)), Some(Value::Object(props))) =
        (out.get("required").cloned(), out.get("properties"))
    {
        let kept: Vec<Value> = required
            .into_iter()
            .filter(|r| r.as_str().map(|n| props.contains_key(n)).unwrap_or(false))
            .collect();
        out.insert("required".into(), Value::Array(kept));
    }

    out
}

fn is_string_type(obj: &Map<String, Value>) -> bool {
    match obj.get("type") {
        Some(Value::String(t)) => t == "string",
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some("string")),
        _ => false,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
