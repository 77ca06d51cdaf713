//! Value model helpers for schemaless documents.
//!
//! Documents are open mappings of arbitrary depth, represented as [`Bson`].
//! This module holds the explicit recursive traversals the rest of the crate
//! relies on:
//!
//! - dotted-path access ([`get_path`], [`set_path`], [`remove_path`])
//! - conversion to and from extended JSON ([`to_json`], [`from_json`])
//! - ordering classes for keyset comparisons ([`TypeClass`])
//! - string truncation for caller-facing output ([`truncate_strings`])
//!
//! Extended JSON follows the MongoDB conventions for the handful of types
//! that JSON cannot carry natively: `{"$date": "<rfc3339>"}`,
//! `{"$oid": "<hex>"}`, `{"$uuid": "<hyphenated>"}`,
//! `{"$numberLong": "<n>"}` and `{"$numberDouble": "NaN"}`.

use base64::{Engine, engine::general_purpose::STANDARD};
use bson::{Binary, Bson, DateTime, Document, Uuid, oid::ObjectId, spec::BinarySubtype};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

/// How 64-bit integers are rendered by [`to_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMode {
    /// Every BSON type survives a round trip through [`from_json`].
    Canonical,
    /// 64-bit integers are rendered as plain JSON numbers.
    Relaxed,
}

/// Looks up a value by dotted path (`"author.name"`).
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Sets a value by dotted path, creating intermediate documents as needed.
///
/// Non-document values in the way are replaced.
pub fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

/// Removes a value by dotted path and prunes parents left empty by the removal.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => {
            let child = document.get_mut(head)?.as_document_mut()?;
            let removed = remove_path(child, rest);

            if removed.is_some() && child.is_empty() {
                document.remove(head);
            }

            removed
        }
    }
}

/// Ordering class of a scalar value.
///
/// Stores only order values within one class (a string never compares
/// greater than a number), so keyset comparisons are only meaningful when the
/// cursor value and the page values share a class. Null, arrays and
/// documents have no class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Number,
    String,
    Date,
    Boolean,
    ObjectId,
    Uuid,
}

impl TypeClass {
    pub fn of(value: &Bson) -> Option<TypeClass> {
        match value {
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Some(TypeClass::Number),
            Bson::String(_) => Some(TypeClass::String),
            Bson::DateTime(_) => Some(TypeClass::Date),
            Bson::Boolean(_) => Some(TypeClass::Boolean),
            Bson::ObjectId(_) => Some(TypeClass::ObjectId),
            Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes }) if bytes.len() == 16 => {
                Some(TypeClass::Uuid)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeClass::Number => "number",
            TypeClass::String => "string",
            TypeClass::Date => "date",
            TypeClass::Boolean => "boolean",
            TypeClass::ObjectId => "objectId",
            TypeClass::Uuid => "uuid",
        }
    }
}

/// Sort bracket of a value in the store's cross-type order.
///
/// Sorting places every value of a lower bracket before any value of a
/// higher one, while range comparisons never match across brackets. Missing
/// fields sort with null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeBracket {
    Null,
    Number,
    String,
    Document,
    Array,
    Binary,
    ObjectId,
    Boolean,
    Date,
    /// Timestamps, regexes, code and the min/max keys.
    Other,
}

impl TypeBracket {
    pub const ALL: [TypeBracket; 10] = [
        TypeBracket::Null,
        TypeBracket::Number,
        TypeBracket::String,
        TypeBracket::Document,
        TypeBracket::Array,
        TypeBracket::Binary,
        TypeBracket::ObjectId,
        TypeBracket::Boolean,
        TypeBracket::Date,
        TypeBracket::Other,
    ];

    pub fn of(value: &Bson) -> TypeBracket {
        match value {
            Bson::Null | Bson::Undefined => TypeBracket::Null,
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => TypeBracket::Number,
            Bson::String(_) | Bson::Symbol(_) => TypeBracket::String,
            Bson::Document(_) => TypeBracket::Document,
            Bson::Array(_) => TypeBracket::Array,
            Bson::Binary(_) => TypeBracket::Binary,
            Bson::ObjectId(_) => TypeBracket::ObjectId,
            Bson::Boolean(_) => TypeBracket::Boolean,
            Bson::DateTime(_) => TypeBracket::Date,
            _ => TypeBracket::Other,
        }
    }

    /// Brackets that sort strictly after this one.
    pub fn after(self) -> Vec<TypeBracket> {
        TypeBracket::ALL.into_iter().filter(|bracket| *bracket > self).collect()
    }

    /// Brackets that sort strictly before this one.
    pub fn before(self) -> Vec<TypeBracket> {
        TypeBracket::ALL.into_iter().filter(|bracket| *bracket < self).collect()
    }
}

/// Human readable BSON type name, used in error messages.
pub fn type_name(value: &Bson) -> &'static str {
    match TypeClass::of(value) {
        Some(class) => class.name(),
        None => match value {
            Bson::Null => "null",
            Bson::Array(_) => "array",
            Bson::Document(_) => "document",
            Bson::Binary(_) => "binary",
            _ => "unsupported",
        },
    }
}

/// Extracts a UUID from a BSON binary value of subtype 4.
pub fn as_uuid(value: &Bson) -> Option<Uuid> {
    match value {
        Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes }) => {
            let bytes: [u8; 16] = bytes.as_slice().try_into().ok()?;
            Some(Uuid::from_bytes(bytes))
        }
        _ => None,
    }
}

/// Converts a BSON value into extended JSON.
pub fn to_json(value: &Bson, mode: JsonMode) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(value) => Value::Bool(*value),
        Bson::Int32(value) => Value::from(*value),
        Bson::Int64(value) => match mode {
            JsonMode::Canonical => tagged("$numberLong", Value::String(value.to_string())),
            JsonMode::Relaxed => Value::from(*value),
        },
        Bson::Double(value) => match Number::from_f64(*value) {
            Some(number) => Value::Number(number),
            None => tagged("$numberDouble", Value::String(non_finite_name(*value).to_string())),
        },
        Bson::String(value) => Value::String(value.clone()),
        Bson::DateTime(value) => tagged("$date", Value::String(rfc3339(value))),
        Bson::ObjectId(value) => tagged("$oid", Value::String(value.to_hex())),
        Bson::Binary(binary) => match as_uuid(value) {
            Some(uuid) => tagged("$uuid", Value::String(uuid.to_string())),
            None => tagged(
                "$binary",
                Value::Object(Map::from_iter([
                    ("base64".to_string(), Value::String(STANDARD.encode(&binary.bytes))),
                    (
                        "subType".to_string(),
                        Value::String(format!("{:02x}", u8::from(binary.subtype))),
                    ),
                ])),
            ),
        },
        Bson::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| to_json(item, mode))
                .collect(),
        ),
        Bson::Document(document) => Value::Object(
            document
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value, mode)))
                .collect(),
        ),
        other => Value::String(other.to_string()),
    }
}

/// Converts extended JSON into a BSON value.
///
/// Plain integers become `Int32` when they fit and `Int64` otherwise. Objects
/// whose single key is one of the recognized `$` type wrappers are decoded
/// into the wrapped type; malformed wrappers are reported as errors.
pub fn from_json(value: &Value) -> Result<Bson, String> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(value) => Bson::Boolean(*value),
        Value::Number(number) => number_to_bson(number)?,
        Value::String(value) => Bson::String(value.clone()),
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => match wrapped_value(map) {
            Some(result) => result?,
            None => Bson::Document(
                map.iter()
                    .map(|(key, value)| from_json(value).map(|value| (key.clone(), value)))
                    .collect::<Result<Document, _>>()?,
            ),
        },
    })
}

/// Returns true when the JSON object is a single-key extended JSON type wrapper.
pub fn is_type_wrapper(map: &Map<String, Value>) -> bool {
    map.len() == 1
        && map.keys().all(|key| {
            matches!(
                key.as_str(),
                "$date" | "$oid" | "$uuid" | "$numberLong" | "$numberInt" | "$numberDouble" | "$binary"
            )
        })
}

/// Truncates every string longer than `max_chars` characters, recursively.
///
/// Truncated strings end with `...`. Returns the number of strings shortened.
pub fn truncate_strings(value: &mut Bson, max_chars: usize) -> usize {
    match value {
        Bson::String(text) => match text.char_indices().nth(max_chars) {
            Some((cut, _)) => {
                text.truncate(cut);
                text.push_str("...");
                1
            }
            None => 0,
        },
        Bson::Array(items) => items
            .iter_mut()
            .map(|item| truncate_strings(item, max_chars))
            .sum(),
        Bson::Document(document) => document
            .iter_mut()
            .map(|(_, item)| truncate_strings(item, max_chars))
            .sum(),
        _ => 0,
    }
}

fn tagged(tag: &str, value: Value) -> Value {
    Value::Object(Map::from_iter([(tag.to_string(), value)]))
}

fn rfc3339(value: &DateTime) -> String {
    value
        .to_chrono()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_finite_name(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn number_to_bson(number: &Number) -> Result<Bson, String> {
    if let Some(value) = number.as_i64() {
        return Ok(match i32::try_from(value) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(value),
        });
    }

    number
        .as_f64()
        .map(Bson::Double)
        .ok_or_else(|| format!("number {number} is out of range"))
}

fn wrapped_value(map: &Map<String, Value>) -> Option<Result<Bson, String>> {
    if !is_type_wrapper(map) {
        return None;
    }

    let (tag, inner) = map.iter().next()?;

    Some(match (tag.as_str(), inner) {
        ("$date", Value::String(text)) => chrono::DateTime::parse_from_rfc3339(text)
            .map(|parsed| Bson::DateTime(DateTime::from_chrono(parsed)))
            .map_err(|e| format!("invalid $date '{text}': {e}")),
        ("$date", Value::Number(number)) => number
            .as_i64()
            .map(|millis| Bson::DateTime(DateTime::from_millis(millis)))
            .ok_or_else(|| format!("invalid $date milliseconds {number}")),
        ("$date", Value::Object(nested)) => match nested.get("$numberLong") {
            Some(Value::String(text)) => text
                .parse::<i64>()
                .map(|millis| Bson::DateTime(DateTime::from_millis(millis)))
                .map_err(|e| format!("invalid $date milliseconds '{text}': {e}")),
            _ => Err("invalid $date wrapper".to_string()),
        },
        ("$oid", Value::String(text)) => ObjectId::parse_str(text)
            .map(Bson::ObjectId)
            .map_err(|e| format!("invalid $oid '{text}': {e}")),
        ("$uuid", Value::String(text)) => Uuid::parse_str(text)
            .map(Bson::from)
            .map_err(|e| format!("invalid $uuid '{text}': {e}")),
        ("$numberLong", Value::String(text)) => text
            .parse::<i64>()
            .map(Bson::Int64)
            .map_err(|e| format!("invalid $numberLong '{text}': {e}")),
        ("$numberInt", Value::String(text)) => text
            .parse::<i32>()
            .map(Bson::Int32)
            .map_err(|e| format!("invalid $numberInt '{text}': {e}")),
        ("$numberDouble", Value::String(text)) => match text.as_str() {
            "NaN" => Ok(Bson::Double(f64::NAN)),
            "Infinity" => Ok(Bson::Double(f64::INFINITY)),
            "-Infinity" => Ok(Bson::Double(f64::NEG_INFINITY)),
            other => other
                .parse::<f64>()
                .map(Bson::Double)
                .map_err(|e| format!("invalid $numberDouble '{other}': {e}")),
        },
        ("$binary", Value::Object(nested)) => binary_from_json(nested),
        (tag, _) => Err(format!("invalid {tag} wrapper")),
    })
}

fn binary_from_json(map: &Map<String, Value>) -> Result<Bson, String> {
    let (Some(Value::String(encoded)), Some(Value::String(subtype))) =
        (map.get("base64"), map.get("subType"))
    else {
        return Err("invalid $binary wrapper".to_string());
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid $binary payload: {e}"))?;
    let subtype = u8::from_str_radix(subtype, 16)
        .map_err(|e| format!("invalid $binary subType '{subtype}': {e}"))?;

    Ok(Bson::Binary(Binary { subtype: BinarySubtype::from(subtype), bytes }))
}

/// Serde adapter that stores a [`Bson`] field as canonical extended JSON.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Wrapper {
///     #[serde(with = "keypage_core::value::ext_json")]
///     value: Bson,
/// }
/// ```
pub mod ext_json {
    use bson::Bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
    use serde_json::Value;

    use super::{JsonMode, from_json, to_json};

    pub fn serialize<S: Serializer>(value: &Bson, serializer: S) -> Result<S::Ok, S::Error> {
        to_json(value, JsonMode::Canonical).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bson, D::Error> {
        from_json(&Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}
