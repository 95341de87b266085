//! Field values and content items.
//!
//! # Design
//! Content is data, not a compile-time type: a `ContentItem` is an ordered
//! map from field name to a `FieldValue`, one variant per `FieldType`.
//! Values go over the wire as plain JSON scalars. Decoding never guesses a
//! date out of a string; `FieldValue::as_date` parses on demand.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Number,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar value stored in a content field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl FieldValue {
    /// Whether this value may be stored in a field of type `ty`.
    ///
    /// `Null` matches nothing; callers decide whether absence is allowed.
    pub fn matches(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (FieldValue::Text(_), FieldType::String | FieldType::Text) => true,
            (FieldValue::Number(n), FieldType::Number) => n.is_finite(),
            (FieldValue::Boolean(_), FieldType::Boolean) => true,
            (FieldValue::Date(_), FieldType::Date) => true,
            (FieldValue::Text(s), FieldType::Date) => parse_date(s).is_some(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a timestamp, parsing RFC 3339 text if needed.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Largest integer magnitude an `f64` holds without rounding.
    pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

    /// Integer conversion that fails instead of rounding past ±2^53.
    pub fn from_i64_exact(n: i64) -> Option<Self> {
        (n.unsigned_abs() <= Self::MAX_SAFE_INTEGER as u64).then(|| FieldValue::Number(n as f64))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::Date(_) => "date",
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Number(n) if !n.is_finite() => Err(S::Error::custom(format!(
                "number {n} cannot be represented in JSON"
            ))),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Boolean(b)),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| format!("number {n} is out of range")),
            Value::String(s) => Ok(FieldValue::Text(s)),
            Value::Array(_) => Err("arrays are not valid field values".to_string()),
            Value::Object(_) => Err("objects are not valid field values".to_string()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

/// Numbers are stored as `f64`; integers beyond ±2^53 are rounded. Use
/// [`FieldValue::from_i64_exact`] to reject those instead.
impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(f64::from(n))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

/// One record of a collection.
///
/// `id` is assigned by the backend and is `None` before creation. It is
/// never sent in a request body. `fields` is ordered by key, so bodies list
/// fields alphabetically rather than in insertion order; the backend treats
/// field order as insignificant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl ContentItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn field_type_uses_lowercase_names() {
        assert_eq!(serde_json::to_value(FieldType::Boolean).unwrap(), "boolean");
        let ty: FieldType = serde_json::from_str(r#""date""#).unwrap();
        assert_eq!(ty, FieldType::Date);
        assert!(serde_json::from_str::<FieldType>(r#""integer""#).is_err());
    }

    #[test]
    fn values_match_their_types() {
        assert!(FieldValue::from("hi").matches(FieldType::String));
        assert!(FieldValue::from("hi").matches(FieldType::Text));
        assert!(FieldValue::from(3).matches(FieldType::Number));
        assert!(FieldValue::from(false).matches(FieldType::Boolean));
        assert!(!FieldValue::from(false).matches(FieldType::String));
        assert!(!FieldValue::Number(f64::NAN).matches(FieldType::Number));
        assert!(!FieldValue::Null.matches(FieldType::Text));
    }

    #[test]
    fn date_accepts_rfc3339_text() {
        assert!(FieldValue::from("2024-05-01T12:00:00Z").matches(FieldType::Date));
        assert!(!FieldValue::from("yesterday").matches(FieldType::Date));
        let d = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(FieldValue::Date(d).matches(FieldType::Date));
        assert_eq!(FieldValue::from("2024-05-01T12:00:00Z").as_date(), Some(d));
    }

    #[test]
    fn dates_serialize_as_rfc3339() {
        let d = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(FieldValue::Date(d)).unwrap();
        assert_eq!(json, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn non_finite_numbers_do_not_encode() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = serde_json::to_string(&FieldValue::Number(n)).unwrap_err();
            assert!(err.to_string().contains("cannot be represented"));
        }
        assert_eq!(serde_json::to_string(&FieldValue::Number(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&FieldValue::Null).unwrap(), "null");
    }

    #[test]
    fn exact_integers_stop_at_two_to_the_53() {
        let max = FieldValue::MAX_SAFE_INTEGER;
        assert_eq!(FieldValue::from_i64_exact(max), Some(FieldValue::Number(max as f64)));
        assert_eq!(FieldValue::from_i64_exact(-max), Some(FieldValue::Number(-max as f64)));
        assert_eq!(FieldValue::from_i64_exact(max + 1), None);
        assert_eq!(FieldValue::from_i64_exact(i64::MIN), None);
    }

    #[test]
    fn decoding_rejects_nested_values() {
        assert!(serde_json::from_str::<FieldValue>("[1,2]").is_err());
        assert!(serde_json::from_str::<FieldValue>(r#"{"a":1}"#).is_err());
        let text: FieldValue = serde_json::from_str(r#""2024-05-01T12:00:00Z""#).unwrap();
        assert!(matches!(text, FieldValue::Text(_)));
    }

    #[test]
    fn content_item_splits_id_from_fields() {
        let item: ContentItem =
            serde_json::from_str(r#"{"id":"abc","title":"Hello","published":true}"#).unwrap();
        assert_eq!(item.id(), Some("abc"));
        assert_eq!(item.get("title"), Some(&FieldValue::from("Hello")));
        assert_eq!(item.get("published").and_then(FieldValue::as_bool), Some(true));
        assert!(!item.fields.contains_key("id"));
    }

    #[test]
    fn content_item_fields_serialize_in_key_order() {
        let item = ContentItem::new().with("title", "Hello").with("author", "ann").with("body", "x");
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"author":"ann","body":"x","title":"Hello"}"#);
    }

    #[test]
    fn content_item_never_serializes_id() {
        let mut item = ContentItem::new().with("title", "Hello");
        item.id = Some("abc".to_string());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({"title": "Hello"}));
    }
}
