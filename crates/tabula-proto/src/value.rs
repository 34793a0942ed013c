//! Runtime values used as query operands and result cells.

use serde::{Deserialize, Serialize};

/// A runtime value carried by query constants and result rows.
///
/// Arrays are typed per element kind so that a value never nests another
/// value; `IN` operands and array columns use them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float32(#[serde(with = "float::single")] f32),
    /// 64-bit floating point.
    Float64(#[serde(with = "float::double")] f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of 32-bit integers.
    Int32Array(Vec<i32>),
    /// Array of 64-bit integers.
    Int64Array(Vec<i64>),
    /// Array of 64-bit floats.
    Float64Array(#[serde(with = "float::array")] Vec<f64>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of UUIDs.
    UuidArray(Vec<[u8; 16]>),
}

impl Value {
    /// Stable one-byte discriminant, used when values are hashed.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Null => 0x00,
            Value::Bool(_) => 0x01,
            Value::Int32(_) => 0x02,
            Value::Int64(_) => 0x03,
            Value::Float32(_) => 0x04,
            Value::Float64(_) => 0x05,
            Value::String(_) => 0x06,
            Value::Bytes(_) => 0x07,
            Value::Timestamp(_) => 0x08,
            Value::Uuid(_) => 0x09,
            Value::BoolArray(_) => 0x20,
            Value::Int32Array(_) => 0x21,
            Value::Int64Array(_) => 0x22,
            Value::Float64Array(_) => 0x23,
            Value::StringArray(_) => 0x24,
            Value::UuidArray(_) => 0x25,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::Int32Array(_)
                | Value::Int64Array(_)
                | Value::Float64Array(_)
                | Value::StringArray(_)
                | Value::UuidArray(_)
        )
    }

    /// Number of elements for array values, `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::BoolArray(v) => Some(v.len()),
            Value::Int32Array(v) => Some(v.len()),
            Value::Int64Array(v) => Some(v.len()),
            Value::Float64Array(v) => Some(v.len()),
            Value::StringArray(v) => Some(v.len()),
            Value::UuidArray(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64, widening 32-bit floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Float32(f) => Some(*f as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as UUID.
    pub fn as_uuid(&self) -> Option<&[u8; 16]> {
        match self {
            Value::Uuid(u) => Some(u),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BoolArray(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::Int32Array(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int64Array(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Float64Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StringArray(v.into_iter().map(String::from).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// JSON has no literal for non-finite floats. Finite values stay numbers;
/// `NaN`, `inf` and `-inf` are written as strings.
mod float {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    struct Float(f64);

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    impl Serialize for Float {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self.0 {
                v if v.is_nan() => serializer.serialize_str("NaN"),
                v if v == f64::INFINITY => serializer.serialize_str("inf"),
                v if v == f64::NEG_INFINITY => serializer.serialize_str("-inf"),
                v => serializer.serialize_f64(v),
            }
        }
    }

    impl<'de> Deserialize<'de> for Float {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match Repr::deserialize(deserializer)? {
                Repr::Number(v) => Ok(Float(v)),
                Repr::Text(text) => match text.as_str() {
                    "NaN" => Ok(Float(f64::NAN)),
                    "inf" => Ok(Float(f64::INFINITY)),
                    "-inf" => Ok(Float(f64::NEG_INFINITY)),
                    other => Err(D::Error::custom(format!("invalid float '{other}'"))),
                },
            }
        }
    }

    pub(super) mod single {
        use super::*;

        pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
            if value.is_finite() {
                serializer.serialize_f32(*value)
            } else {
                Float(f64::from(*value)).serialize(serializer)
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
            Float::deserialize(deserializer).map(|f| f.0 as f32)
        }
    }

    pub(super) mod double {
        use super::*;

        pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            Float(*value).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            Float::deserialize(deserializer).map(|f| f.0)
        }
    }

    pub(super) mod array {
        use super::*;

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| Float(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<f64>, D::Error> {
            let values = Vec::<Float>::deserialize(deserializer)?;
            Ok(values.into_iter().map(|f| f.0).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = "PAID".into();
        assert_eq!(v, Value::String("PAID".into()));

        let v: Value = None::<i32>.into();
        assert_eq!(v, Value::Null);

        let v: Value = vec!["a", "b"].into();
        assert_eq!(v.array_len(), Some(2));
        assert!(v.is_array());
    }

    #[test]
    fn test_tags_are_distinct() {
        let values = [
            Value::Null,
            Value::Bool(false),
            Value::Int32(0),
            Value::Int64(0),
            Value::Float32(0.0),
            Value::Float64(0.0),
            Value::String(String::new()),
            Value::Bytes(vec![]),
            Value::Timestamp(0),
            Value::Uuid([0; 16]),
            Value::BoolArray(vec![]),
            Value::Int32Array(vec![]),
            Value::Int64Array(vec![]),
            Value::Float64Array(vec![]),
            Value::StringArray(vec![]),
            Value::UuidArray(vec![]),
        ];
        let mut tags: Vec<u8> = values.iter().map(Value::tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), values.len());
    }

    #[test]
    fn test_value_json_shape() {
        let json = serde_json::to_string(&Value::Int32(7)).unwrap();
        assert_eq!(json, r#"{"Int32":7}"#);

        let back: Value = serde_json::from_str(r#"{"String":"x"}"#).unwrap();
        assert_eq!(back, Value::String("x".into()));
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        for value in [
            Value::Float64(f64::INFINITY),
            Value::Float64(f64::NEG_INFINITY),
            Value::Float32(f32::INFINITY),
            Value::Float64(2.5),
            Value::Float32(0.25),
            Value::Float64Array(vec![1.0, f64::NEG_INFINITY, 3.5]),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "{json}");
        }

        let json = serde_json::to_string(&Value::Float64(f64::NAN)).unwrap();
        assert_eq!(json, r#"{"Float64":"NaN"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert!(back.as_f64().is_some_and(f64::is_nan));

        assert_eq!(
            serde_json::to_string(&Value::Float64(1.5)).unwrap(),
            r#"{"Float64":1.5}"#
        );
        assert!(serde_json::from_str::<Value>(r#"{"Float64":"big"}"#).is_err());
    }
}
