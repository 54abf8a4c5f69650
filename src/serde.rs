//! Provides integration with [Serde](https://docs.rs/serde/latest/serde/)
//!
//! This module implements [`Serialize`] and [`Deserialize`] for [`JsonValue`], so decoded
//! values can be converted to and from any Serde data format, and Serde data structures can be
//! converted to a `JsonValue` for use with the [`JsonEncoder`](crate::json::JsonEncoder).
//!
//! To enable this optional integration, specify the `serde` feature in your `Cargo.toml` file
//! for the dependency on this crate:
//! ```toml
//! [dependencies]
//! textstream = { version = "...", features = ["serde"] }
//! ```
//!
//! Numbers are serialized as `i64` or `u64` if they are integers in that range, and as `f64`
//! otherwise. Numbers outside of the `f64` range cannot be serialized.

use std::fmt::Formatter;

use serde::{
    de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor},
    ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer},
};

use crate::json::{JsonNumber, JsonObject, JsonValue};

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Bool(value) => serializer.serialize_bool(*value),
            JsonValue::Number(number) => serialize_number(number, serializer),
            JsonValue::String(value) => serializer.serialize_str(value),
            JsonValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, value) in members {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

fn serialize_number<S: Serializer>(number: &JsonNumber, serializer: S) -> Result<S::Ok, S::Error> {
    if let Some(value) = number.as_i64() {
        serializer.serialize_i64(value)
    } else if let Some(value) = number.as_u64() {
        serializer.serialize_u64(value)
    } else if let Some(value) = number.as_f64() {
        serializer.serialize_f64(value)
    } else {
        Err(S::Error::custom(format!(
            "number {number} cannot be represented as f64"
        )))
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = JsonValue;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(JsonValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        JsonValue::deserialize(deserializer)
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_i128<E: serde::de::Error>(self, v: i128) -> Result<Self::Value, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<Self::Value, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        match JsonNumber::from_f64(v) {
            Some(number) => Ok(JsonValue::Number(number)),
            None => Err(E::custom(format!("non-finite number {v}"))),
        }
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut members = JsonObject::new();
        while let Some((name, value)) = map.next_entry::<String, JsonValue>()? {
            members.insert(name, value);
        }
        Ok(JsonValue::Object(members))
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::decode;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn serialize() -> TestResult {
        let value = decode(br#"{"b":[1,-2,1.5,18446744073709551615],"a":null,"c":"text","d":true}"#)?;
        assert_eq!(
            r#"{"b":[1,-2,1.5,18446744073709551615],"a":null,"c":"text","d":true}"#,
            serde_json::to_string(&value)?
        );
        Ok(())
    }

    #[test]
    fn serialize_out_of_range() -> TestResult {
        let value = decode(b"1e400")?;
        assert!(serde_json::to_string(&value).is_err());
        Ok(())
    }

    #[test]
    fn deserialize() -> TestResult {
        let value: JsonValue =
            serde_json::from_str(r#"{"z":[1,-2,2.5,true,null],"a":{"nested":"x"}}"#)?;
        assert_eq!(vec!["z", "a"], value.object_keys()?.collect::<Vec<_>>());
        assert_eq!(
            decode(br#"{"z":[1,-2,2.5,true,null],"a":{"nested":"x"}}"#)?,
            value
        );
        Ok(())
    }

    #[test]
    fn from_serde_data_structure() -> TestResult {
        #[derive(serde::Serialize)]
        struct Data {
            id: u32,
            tags: Vec<&'static str>,
            score: Option<f64>,
        }

        // Convert through serde_json's value, which implements `Deserializer`
        let json_value = serde_json::to_value(Data {
            id: 7,
            tags: vec!["a", "b"],
            score: None,
        })?;
        let value = JsonValue::deserialize(json_value)?;
        assert_eq!(decode(br#"{"id":7,"tags":["a","b"],"score":null}"#)?, value);
        Ok(())
    }
}
