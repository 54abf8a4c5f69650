//! In-memory representation of JSON values

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use duplicate::duplicate_item;
use indexmap::IndexMap;
use thiserror::Error;

use super::number::{format_f64, is_valid_json_number};
use crate::ErrorKind;

/// Type of a JSON value
#[derive(PartialEq, Eq, Clone, Copy, Hash, strum::Display, Debug)]
pub enum ValueType {
    /// JSON array: `[ ... ]`
    Array,
    /// JSON object: `{ ... }`
    Object,
    /// JSON string value: `"..."`
    String,
    /// JSON number value: `123.4e+10`
    Number,
    /// JSON boolean value: `true` or `false`
    Boolean,
    /// JSON null value: `null`
    Null,
}

/// Members of a JSON object, in document order
///
/// Member names are unique. Inserting an existing name replaces the value but keeps the
/// position of the first occurrence.
pub type JsonObject = IndexMap<String, JsonValue>;

/// A JSON number, stored as its textual representation
///
/// The text always satisfies the JSON number grammar. Keeping the text allows numbers of
/// arbitrary size and precision to be decoded and encoded again without loss.
#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub struct JsonNumber(String);

/// Error returned when parsing a [`JsonNumber`] from a string which is not a valid JSON number
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("invalid JSON number: {0}")]
pub struct InvalidNumberError(String);

impl JsonNumber {
    /// Creates a number from text which is known to be a valid JSON number
    pub(crate) fn from_valid_text(text: String) -> Self {
        debug_assert!(is_valid_json_number(&text), "invalid number: {text}");
        JsonNumber(text)
    }

    /// Creates a number from a finite `f64`
    ///
    /// Returns `None` for NaN and infinity, which JSON cannot represent.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() {
            Some(JsonNumber(format_f64(value)))
        } else {
            None
        }
    }

    /// Gets the number text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the number as `i64`
    ///
    /// Returns `None` if the number has a fraction or exponent part, or is out of range.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Parses the number as `u64`
    ///
    /// Returns `None` if the number has a fraction or exponent part, is negative or is out of range.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Parses the number as `f64`
    ///
    /// Returns `None` if the number is too large to be represented as finite `f64`. Precision
    /// might be lost for numbers which have no exact `f64` representation.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl FromStr for JsonNumber {
    type Err = InvalidNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_json_number(s) {
            Ok(JsonNumber(s.to_owned()))
        } else {
            Err(InvalidNumberError(s.to_owned()))
        }
    }
}

impl Display for JsonNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize])]
impl From<type_template> for JsonNumber {
    fn from(value: type_template) -> Self {
        JsonNumber(value.to_string())
    }
}

/// A JSON value
///
/// Values form a tree which is exclusively owned by its root. Note that equality of objects
/// does not consider member order; use [`object_keys`](Self::object_keys) to compare it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum JsonValue {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(JsonNumber),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<JsonValue>),
    /// JSON object
    Object(JsonObject),
}

/// Error when accessing a [`JsonValue`] in a way which does not fit the value
#[non_exhaustive]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum AccessError {
    /// The value has a different type than required by the accessor
    #[error("expected JSON {expected} but found JSON {actual}")]
    TypeMismatch {
        /// Type required by the accessor
        expected: ValueType,
        /// Actual type of the value
        actual: ValueType,
    },
    /// Array index is outside of the array bounds
    #[error("index {index} is out of bounds for JSON array of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the array
        len: usize,
    },
    /// Number cannot be represented by the requested Rust type
    #[error("JSON number {number} cannot be represented as {target}")]
    NumberOutOfRange {
        /// Text of the number
        number: String,
        /// Name of the requested Rust type
        target: &'static str,
    },
}

impl AccessError {
    /// Gets the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            AccessError::IndexOutOfRange { .. } | AccessError::NumberOutOfRange { .. } => {
                ErrorKind::RangeError
            }
        }
    }
}

impl JsonValue {
    /// Gets the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            JsonValue::Null => ValueType::Null,
            JsonValue::Bool(_) => ValueType::Boolean,
            JsonValue::Number(_) => ValueType::Number,
            JsonValue::String(_) => ValueType::String,
            JsonValue::Array(_) => ValueType::Array,
            JsonValue::Object(_) => ValueType::Object,
        }
    }

    fn type_mismatch<T>(&self, expected: ValueType) -> Result<T, AccessError> {
        Err(AccessError::TypeMismatch {
            expected,
            actual: self.value_type(),
        })
    }

    /// Whether this value is JSON null
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    /// Gets the value of a boolean
    pub fn as_bool(&self) -> Result<bool, AccessError> {
        match self {
            JsonValue::Bool(value) => Ok(*value),
            _ => self.type_mismatch(ValueType::Boolean),
        }
    }

    /// Gets the number, including its exact text
    pub fn as_number(&self) -> Result<&JsonNumber, AccessError> {
        match self {
            JsonValue::Number(value) => Ok(value),
            _ => self.type_mismatch(ValueType::Number),
        }
    }

    /// Gets the value of a number as `f64`
    ///
    /// Fails with [`AccessError::NumberOutOfRange`] if the number exceeds the `f64` range.
    pub fn as_f64(&self) -> Result<f64, AccessError> {
        let number = self.as_number()?;
        number.as_f64().ok_or_else(|| AccessError::NumberOutOfRange {
            number: number.to_string(),
            target: "f64",
        })
    }

    /// Gets the value of a number as `i64`
    ///
    /// Fails with [`AccessError::NumberOutOfRange`] if the number is not an integer in the `i64` range.
    pub fn as_i64(&self) -> Result<i64, AccessError> {
        let number = self.as_number()?;
        number.as_i64().ok_or_else(|| AccessError::NumberOutOfRange {
            number: number.to_string(),
            target: "i64",
        })
    }

    /// Gets the value of a number as `u64`
    ///
    /// Fails with [`AccessError::NumberOutOfRange`] if the number is not an integer in the `u64` range.
    pub fn as_u64(&self) -> Result<u64, AccessError> {
        let number = self.as_number()?;
        number.as_u64().ok_or_else(|| AccessError::NumberOutOfRange {
            number: number.to_string(),
            target: "u64",
        })
    }

    /// Gets the value of a string
    pub fn as_str(&self) -> Result<&str, AccessError> {
        match self {
            JsonValue::String(value) => Ok(value),
            _ => self.type_mismatch(ValueType::String),
        }
    }

    /// Gets the items of an array
    pub fn as_array(&self) -> Result<&[JsonValue], AccessError> {
        match self {
            JsonValue::Array(items) => Ok(items),
            _ => self.type_mismatch(ValueType::Array),
        }
    }

    /// Gets the members of an object
    pub fn as_object(&self) -> Result<&JsonObject, AccessError> {
        match self {
            JsonValue::Object(members) => Ok(members),
            _ => self.type_mismatch(ValueType::Object),
        }
    }

    /// Gets the member names of an object in document order
    ///
    /// For duplicate names in the decoded document the name appears once, at the position of
    /// its first occurrence.
    pub fn object_keys(&self) -> Result<impl Iterator<Item = &str> + '_, AccessError> {
        Ok(self.as_object()?.keys().map(String::as_str))
    }

    /// Gets the value of an object member
    ///
    /// Returns `Ok(None)` if the object has no member with that name.
    pub fn get(&self, key: &str) -> Result<Option<&JsonValue>, AccessError> {
        Ok(self.as_object()?.get(key))
    }

    /// Gets the number of items of an array
    pub fn array_len(&self) -> Result<usize, AccessError> {
        Ok(self.as_array()?.len())
    }

    /// Gets the array item at `index`
    ///
    /// Fails with [`AccessError::IndexOutOfRange`] if the index is not within the array bounds.
    pub fn array_get(&self, index: usize) -> Result<&JsonValue, AccessError> {
        let items = self.as_array()?;
        items.get(index).ok_or(AccessError::IndexOutOfRange {
            index,
            len: items.len(),
        })
    }
}

impl Drop for JsonValue {
    /// Drops nested arrays and objects iteratively, without using the call stack
    fn drop(&mut self) {
        let mut pending = match self {
            JsonValue::Array(items) if !items.is_empty() => std::mem::take(items),
            JsonValue::Object(members) if !members.is_empty() => {
                members.drain(..).map(|(_, value)| value).collect()
            }
            _ => return,
        };
        // Children are emptied before they are dropped, so their own drop returns immediately
        while let Some(mut value) = pending.pop() {
            match &mut value {
                JsonValue::Array(items) => pending.append(items),
                JsonValue::Object(members) => {
                    pending.extend(members.drain(..).map(|(_, value)| value))
                }
                _ => {}
            }
        }
    }
}

impl Display for JsonValue {
    /// Formats the value as compact JSON
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&super::encode(self)))
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<JsonNumber> for JsonValue {
    fn from(value: JsonNumber) -> Self {
        JsonValue::Number(value)
    }
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [u64]; [i64]; [u128]; [i128]; [usize]; [isize])]
impl From<type_template> for JsonValue {
    fn from(value: type_template) -> Self {
        JsonValue::Number(JsonNumber::from(value))
    }
}

#[duplicate_item(type_template; [f32]; [f64])]
impl From<type_template> for JsonValue {
    /// Converts a float to a JSON number; NaN and infinity become [`JsonValue::Null`]
    fn from(value: type_template) -> Self {
        match JsonNumber::from_f64(f64::from(value)) {
            Some(number) => JsonValue::Number(number),
            None => JsonValue::Null,
        }
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_owned())
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(value: Vec<JsonValue>) -> Self {
        JsonValue::Array(value)
    }
}

impl From<JsonObject> for JsonValue {
    fn from(value: JsonObject) -> Self {
        JsonValue::Object(value)
    }
}

impl<T: Into<JsonValue>> From<Option<T>> for JsonValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(JsonValue::Null, Into::into)
    }
}

impl FromIterator<JsonValue> for JsonValue {
    fn from_iter<I: IntoIterator<Item = JsonValue>>(iter: I) -> Self {
        JsonValue::Array(iter.into_iter().collect())
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for JsonValue {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        JsonValue::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample_object() -> JsonValue {
        [
            ("b", JsonValue::from(1)),
            ("a", JsonValue::from("text")),
            ("c", JsonValue::from(vec![JsonValue::Null, JsonValue::from(true)])),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn value_types() {
        assert_eq!(ValueType::Null, JsonValue::Null.value_type());
        assert_eq!(ValueType::Boolean, JsonValue::from(false).value_type());
        assert_eq!(ValueType::Number, JsonValue::from(1u8).value_type());
        assert_eq!(ValueType::String, JsonValue::from("").value_type());
        assert_eq!(ValueType::Array, JsonValue::Array(Vec::new()).value_type());
        assert_eq!(ValueType::Object, sample_object().value_type());
        assert_eq!("Boolean", ValueType::Boolean.to_string());
    }

    #[test]
    fn accessors() -> TestResult {
        let object = sample_object();
        assert_eq!(vec!["b", "a", "c"], object.object_keys()?.collect::<Vec<_>>());
        assert_eq!(Some(&JsonValue::from(1)), object.get("b")?);
        assert_eq!(None, object.get("missing")?);
        assert_eq!(1, object.get("b")?.ok_or("missing member")?.as_i64()?);

        let array = object.get("c")?.ok_or("missing member")?;
        assert_eq!(2, array.array_len()?);
        assert!(array.array_get(0)?.is_null());
        assert_eq!(true, array.array_get(1)?.as_bool()?);
        Ok(())
    }

    #[test]
    fn accessor_errors() {
        let object = sample_object();
        let error = object.as_str().unwrap_err();
        assert_eq!(
            AccessError::TypeMismatch {
                expected: ValueType::String,
                actual: ValueType::Object
            },
            error
        );
        assert_eq!(ErrorKind::TypeMismatch, error.kind());
        assert_eq!("expected JSON String but found JSON Object", error.to_string());

        let array = JsonValue::from(vec![JsonValue::Null]);
        let error = array.array_get(1).unwrap_err();
        assert_eq!(AccessError::IndexOutOfRange { index: 1, len: 1 }, error);
        assert_eq!(ErrorKind::RangeError, error.kind());

        assert_eq!(
            ErrorKind::TypeMismatch,
            array.get("a").unwrap_err().kind()
        );
        assert_eq!(
            ErrorKind::TypeMismatch,
            JsonValue::Null.array_len().unwrap_err().kind()
        );
    }

    #[test]
    fn numbers() -> TestResult {
        let number: JsonNumber = "12.5e1".parse()?;
        assert_eq!("12.5e1", number.as_str());
        assert_eq!(Some(125.0), number.as_f64());
        assert_eq!(None, number.as_i64());

        assert!("01".parse::<JsonNumber>().is_err());
        assert_eq!(
            "invalid JSON number: NaN",
            "NaN".parse::<JsonNumber>().unwrap_err().to_string()
        );

        let value = JsonValue::from(u64::MAX);
        assert_eq!(u64::MAX, value.as_u64()?);
        assert_eq!(ErrorKind::RangeError, value.as_i64().unwrap_err().kind());

        let huge = JsonValue::Number("1e400".parse()?);
        assert_eq!(ErrorKind::RangeError, huge.as_f64().unwrap_err().kind());

        assert_eq!(JsonValue::Null, JsonValue::from(f64::NAN));
        assert_eq!("1.5", JsonValue::from(1.5).as_number()?.as_str());
        assert_eq!(JsonValue::Null, JsonValue::from(None::<bool>));
        Ok(())
    }

    #[test]
    fn drop_deeply_nested() {
        let mut value = JsonValue::Null;
        for i in 0..1_000_000 {
            value = if i % 2 == 0 {
                JsonValue::Array(vec![JsonValue::from(i), value])
            } else {
                [("key", value)].into_iter().collect()
            };
        }
        drop(value);
    }

    #[test]
    fn display() {
        assert_eq!(r#"{"b":1,"a":"text","c":[null,true]}"#, sample_object().to_string());
    }
}
