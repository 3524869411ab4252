use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A runtime value passed to entity resolution as context data.
///
/// Context data is JSON-shaped: callers can set it from native Rust values
/// via the `From` conversions and the [`data!`](crate::data) macro, or feed
/// decoded JSON through the `serde_json::Value` conversion.
///
/// # Example
///
/// ```
/// use l20n::{Data, data};
///
/// let args = data! { "unread" => 3, "user" => "Alice" };
/// assert_eq!(args["unread"], Data::Num(3.0));
/// assert_eq!(args["user"].as_str(), Some("Alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    /// An absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Num(f64),
    /// A string.
    Str(String),
    /// An ordered list. Lists cannot be dereferenced by expressions.
    List(Vec<Data>),
    /// A nested object, dereferenced by property access (`$user.name`).
    Map(BTreeMap<String, Data>),
}

impl Data {
    /// Get this value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Data::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a member of a map value.
    pub fn get(&self, key: &str) -> Option<&Data> {
        match self {
            Data::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// A short name for this value's type, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "boolean",
            Data::Num(_) => "number",
            Data::Str(_) => "string",
            Data::List(_) => "array",
            Data::Map(_) => "object",
        }
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Data::Bool(b)
    }
}

impl From<i32> for Data {
    fn from(n: i32) -> Self {
        Data::Num(f64::from(n))
    }
}

impl From<i64> for Data {
    fn from(n: i64) -> Self {
        Data::Num(n as f64)
    }
}

impl From<u32> for Data {
    fn from(n: u32) -> Self {
        Data::Num(f64::from(n))
    }
}

impl From<u64> for Data {
    fn from(n: u64) -> Self {
        Data::Num(n as f64)
    }
}

impl From<usize> for Data {
    fn from(n: usize) -> Self {
        Data::Num(n as f64)
    }
}

impl From<f32> for Data {
    fn from(n: f32) -> Self {
        Data::Num(f64::from(n))
    }
}

impl From<f64> for Data {
    fn from(n: f64) -> Self {
        Data::Num(n)
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Str(s.to_string())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Str(s)
    }
}

impl From<Vec<Data>> for Data {
    fn from(list: Vec<Data>) -> Self {
        Data::List(list)
    }
}

impl From<BTreeMap<String, Data>> for Data {
    fn from(map: BTreeMap<String, Data>) -> Self {
        Data::Map(map)
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Data::Null,
            serde_json::Value::Bool(b) => Data::Bool(b),
            serde_json::Value::Number(n) => Data::Num(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Data::Str(s),
            serde_json::Value::Array(items) => {
                Data::List(items.into_iter().map(Data::from).collect())
            }
            serde_json::Value::Object(fields) => Data::Map(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Data::from(value)))
                    .collect(),
            ),
        }
    }
}
