//! Conversion between plain JSON documents and the typed value encoding used
//! by the Firestore REST API (`{"stringValue": "..."}`, `{"mapValue": ...}`).

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value, json};

use crate::store::{Document, StoreError};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_map(map) } }),
    }
}

fn encode_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Encode a top-level document body. Firestore documents are always maps.
pub fn encode_fields(data: &Value) -> Result<Map<String, Value>, StoreError> {
    match data {
        Value::Object(map) => Ok(encode_map(map)),
        other => Err(StoreError::Malformed(format!(
            "document body must be an object, got {other}"
        ))),
    }
}

pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some((tag, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(StoreError::Malformed(format!("untyped value {value}")));
    };
    match tag.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed(tag, inner)),
        "integerValue" => {
            // Sent as a decimal string, but accept bare numbers too.
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| malformed(tag, inner))
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| malformed(tag, inner)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(tag, inner)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values: &[Value] = match inner.get("values") {
                Some(Value::Array(values)) => values.as_slice(),
                None => &[],
                Some(other) => return Err(malformed(tag, other)),
            };
            values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields),
            None => Ok(Value::Object(Map::new())),
            Some(other) => Err(malformed(tag, other)),
        },
        other => Err(StoreError::Malformed(format!("unknown value type {other}"))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Value, StoreError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

/// Decode a REST document resource (`name`, `fields`, `createTime`).
pub fn decode_document(resource: &Value) -> Result<Document, StoreError> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("document without a name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();

    let data = match resource.get("fields") {
        Some(Value::Object(fields)) => decode_fields(fields)?,
        None => Value::Object(Map::new()),
        Some(other) => return Err(malformed("fields", other)),
    };

    let create_time = resource
        .get("createTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(Document {
        id,
        data,
        create_time,
    })
}

fn malformed(tag: &str, value: &Value) -> StoreError {
    StoreError::Malformed(format!("bad {tag}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_history_entry() {
        let data = json!({
            "questionId": "T001",
            "isCorrect": false,
            "attempts": 2,
            "tags": ["pointers"]
        });
        let fields = encode_fields(&data).unwrap();
        assert_eq!(fields["questionId"], json!({"stringValue": "T001"}));
        assert_eq!(fields["isCorrect"], json!({"booleanValue": false}));
        assert_eq!(fields["attempts"], json!({"integerValue": "2"}));
        assert_eq!(
            fields["tags"],
            json!({"arrayValue": {"values": [{"stringValue": "pointers"}]}})
        );
    }

    #[test]
    fn test_encode_rejects_non_object_body() {
        assert!(encode_fields(&json!(["a"])).is_err());
    }

    #[test]
    fn test_decode_reverses_encode() {
        let data = json!({
            "question": "What is a pointer?",
            "options": ["a", "b", "c", "d"],
            "nested": {"score": 1.5, "none": null}
        });
        let fields = encode_fields(&data).unwrap();
        assert_eq!(decode_fields(&fields).unwrap(), data);
    }

    #[test]
    fn test_decode_document_resource() {
        let resource = json!({
            "name": "projects/p/databases/(default)/documents/artifacts/app/users/u/quizHistory/abc123",
            "fields": {
                "isCorrect": {"booleanValue": true},
                "timestamp": {"timestampValue": "2024-05-01T10:00:00Z"}
            },
            "createTime": "2024-05-01T10:00:00.123456Z",
            "updateTime": "2024-05-01T10:00:00.123456Z"
        });
        let doc = decode_document(&resource).unwrap();
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.data["isCorrect"], json!(true));
        assert_eq!(doc.data["timestamp"], json!("2024-05-01T10:00:00Z"));
        assert!(doc.create_time.is_some());
    }

    #[test]
    fn test_empty_array_and_map_values() {
        assert_eq!(decode_value(&json!({"arrayValue": {}})).unwrap(), json!([]));
        assert_eq!(decode_value(&json!({"mapValue": {}})).unwrap(), json!({}));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        assert!(matches!(
            decode_value(&json!({"weirdValue": 1})),
            Err(StoreError::Malformed(_))
        ));
    }
}
