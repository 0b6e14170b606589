//! Dynamically typed property values.
//!
//! Resource properties are arbitrary nested data whose shape depends on the
//! resource type, so they are carried as a tagged variant rather than a fixed
//! schema. On the wire a value is plain JSON, with two reserved encodings for
//! values that only exist inside the engine: unknowns (computed values not yet
//! resolved during a preview) and secrets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Mapping from property name to value.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Wire encoding of a value that is not known until the update runs.
pub const UNKNOWN_SENTINEL: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Key marking a JSON object as an encoded special value.
pub const SIGNATURE_KEY: &str = "4dabf18193072939515e22adb298388d";

/// Signature identifying an encoded secret.
pub const SECRET_SIGNATURE: &str = "1b47061264138c4ac30d75fd1eb44270";

const SECRET_VALUE_KEY: &str = "value";

/// A single property value.
///
/// # Example
///
/// ```
/// use policy_analyzer::PropertyValue;
///
/// let value: PropertyValue = serde_json::from_str(r#"{"acl": "private"}"#).unwrap();
/// let acl = value.as_object().and_then(|map| map.get("acl"));
/// assert_eq!(acl.and_then(PropertyValue::as_str), Some("private"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum PropertyValue {
    /// Absent or explicit null.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    ///
    /// Integers keep their exact `i64` or `u64` value. `NaN` and the
    /// infinities have no JSON form, so converting them yields [`Self::Null`].
    Number(Number),
    /// String scalar.
    String(String),
    /// Ordered sequence.
    Array(Vec<PropertyValue>),
    /// Nested mapping.
    Object(PropertyMap),
    /// Value computed during the update and therefore unknown in a preview.
    Unknown,
    /// Sensitive value that must not be displayed.
    Secret(Box<PropertyValue>),
}

impl PropertyValue {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub const fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the numeric payload as a float, if this is a number.
    ///
    /// Integers beyond 2^53 are rounded; use [`Self::as_i64`] or
    /// [`Self::as_u64`] for exact values.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Returns the payload if this is an integer that fits in `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(number) => number.as_i64(),
            _ => None,
        }
    }

    /// Returns the payload if this is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(number) => number.as_u64(),
            _ => None,
        }
    }

    /// Returns the elements, if this is a sequence.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a mapping.
    #[must_use]
    pub const fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns `true` for null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for a value unknown during a preview.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` for a secret.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    /// Strips any secret wrappers and returns the underlying value.
    #[must_use]
    pub fn reveal(&self) -> &Self {
        match self {
            Self::Secret(inner) => inner.reveal(),
            other => other,
        }
    }

    /// Looks up a nested value by a dotted path such as `tags.owner`.
    ///
    /// Secrets along the path are looked through.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Self> {
        path.split('.')
            .try_fold(self, |current, segment| current.reveal().as_object()?.get(segment))
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number),
            Value::String(text) if text == UNKNOWN_SENTINEL => Self::Unknown,
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => object_from_json(map),
        }
    }
}

fn object_from_json(mut map: Map<String, Value>) -> PropertyValue {
    let is_secret = map
        .get(SIGNATURE_KEY)
        .and_then(Value::as_str)
        .is_some_and(|signature| signature == SECRET_SIGNATURE);
    if is_secret {
        let inner = map
            .remove(SECRET_VALUE_KEY)
            .map_or(PropertyValue::Null, PropertyValue::from);
        return PropertyValue::Secret(Box::new(inner));
    }
    PropertyValue::Object(
        map.into_iter()
            .map(|(key, item)| (key, PropertyValue::from(item)))
            .collect(),
    )
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Self::Null,
            PropertyValue::Bool(flag) => Self::Bool(flag),
            PropertyValue::Number(number) => Self::Number(number),
            PropertyValue::String(text) => Self::String(text),
            PropertyValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            PropertyValue::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
            PropertyValue::Unknown => Self::String(UNKNOWN_SENTINEL.to_owned()),
            PropertyValue::Secret(inner) => {
                let mut map = Map::new();
                map.insert(
                    SIGNATURE_KEY.to_owned(),
                    Self::String(SECRET_SIGNATURE.to_owned()),
                );
                map.insert(SECRET_VALUE_KEY.to_owned(), Self::from(*inner));
                Self::Object(map)
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<f64> for PropertyValue {
    fn from(number: f64) -> Self {
        Number::from_f64(number).map_or(Self::Null, Self::Number)
    }
}

impl From<i64> for PropertyValue {
    fn from(number: i64) -> Self {
        Self::Number(number.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(number: u64) -> Self {
        Self::Number(number.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(text: &str) -> Self {
        Self::String(text.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<Vec<Self>> for PropertyValue {
    fn from(items: Vec<Self>) -> Self {
        Self::Array(items)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        Self::Object(map)
    }
}

impl<K: Into<String>, V: Into<Self>> FromIterator<(K, V)> for PropertyValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
