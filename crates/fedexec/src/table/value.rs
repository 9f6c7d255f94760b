use std::fmt;

use serde::{Deserialize, Serialize};

/// A single dynamically typed value in a row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Normalized key used when comparing values across join sides.
    ///
    /// Returns `None` for values that never compare equal to anything (nulls
    /// and NaNs).
    pub fn join_key(&self) -> Option<JoinKey> {
        match self {
            Value::Null => None,
            Value::Boolean(v) => Some(JoinKey::Boolean(*v)),
            Value::Int64(v) => Some(JoinKey::Int64(*v)),
            Value::Float64(v) => {
                if v.is_nan() {
                    return None;
                }
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 {
                    // Integral floats join against integers. Also folds -0.0
                    // into 0.
                    return Some(JoinKey::Int64(*v as i64));
                }
                Some(JoinKey::Float64(v.to_bits()))
            }
            Value::Utf8(v) => Some(JoinKey::Utf8(v.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v:?}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Hashable, normalized form of a non-null value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    Boolean(bool),
    Int64(i64),
    /// Bit pattern of a non-integral, non-NaN float.
    Float64(u64),
    Utf8(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_matches_int() {
        assert_eq!(Value::Int64(3).join_key(), Value::Float64(3.0).join_key());
        assert_eq!(
            Value::Float64(-0.0).join_key(),
            Value::Float64(0.0).join_key()
        );
        assert_ne!(Value::Int64(3).join_key(), Value::Float64(3.5).join_key());
    }

    #[test]
    fn null_and_nan_have_no_key() {
        assert_eq!(None, Value::Null.join_key());
        assert_eq!(None, Value::Float64(f64::NAN).join_key());
    }

    #[test]
    fn string_does_not_match_number() {
        assert_ne!(Value::from("1").join_key(), Value::Int64(1).join_key());
    }

    #[test]
    fn deserialize_untagged() {
        let vals: Vec<Value> = serde_json::from_str(r#"[null, true, 4, 1.5, "a"]"#).unwrap();
        assert_eq!(
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Int64(4),
                Value::Float64(1.5),
                Value::Utf8("a".to_string()),
            ],
            vals
        );
    }
}
