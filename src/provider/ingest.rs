use crate::models::MetricCounts;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static METRIC_PAYLOAD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let count = json!({
        "anyOf": [
            { "type": "integer", "minimum": 0 },
            { "type": "string", "pattern": "^[0-9]+$" }
        ]
    });
    json!({
        "type": "object",
        "properties": {
            "views": count,
            "likes": count,
            "comments": count
        },
        "required": ["views"]
    })
});

pub fn metric_payload_schema() -> &'static Value {
    &METRIC_PAYLOAD_SCHEMA
}

// Hidden likes/comments are omitted by the provider and read as zero; anything present must be a valid count.
pub fn parse_metric_payload(payload: &Value) -> Result<MetricCounts, String> {
    let errors = validate_against_schema(payload, metric_payload_schema())?;
    if !errors.is_empty() {
        return Err(errors.join("; "));
    }

    Ok(MetricCounts {
        views: read_count(payload, "views")?.unwrap_or(0),
        likes: read_count(payload, "likes")?.unwrap_or(0),
        comments: read_count(payload, "comments")?.unwrap_or(0),
    })
}

fn validate_against_schema(value: &Value, schema: &Value) -> Result<Vec<String>, String> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|error| format!("Failed to compile metrics payload schema: {}", error))?;

    let errors = compiled
        .validate(value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok(errors)
}

fn read_count(payload: &Value, key: &str) -> Result<Option<i64>, String> {
    match payload.get(key) {
        None => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{} is out of range", key)),
        Some(Value::String(raw)) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("{} is out of range", key)),
        Some(other) => Err(format!("{} has unexpected type: {}", key, other)),
    }
}
