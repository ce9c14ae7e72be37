use serde::de::DeserializeOwned;
use serde_json::Value;

/// A PATCH field that may be absent, explicitly null, or set.
#[derive(Debug, PartialEq)]
pub enum Nullable<T> {
    Omitted,
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    /// `None` leaves the column alone, `Some(None)` clears it.
    pub fn into_change(self) -> Option<Option<T>> {
        match self {
            Nullable::Omitted => None,
            Nullable::Null => Some(None),
            Nullable::Value(value) => Some(Some(value)),
        }
    }
}

pub fn classify_nullable<T: DeserializeOwned>(body: &Value, field: &str) -> Result<Nullable<T>, String> {
    match body.get(field) {
        None => Ok(Nullable::Omitted),
        Some(Value::Null) => Ok(Nullable::Null),
        Some(value) => serde_json::from_value(value.clone())
            .map(Nullable::Value)
            .map_err(|err| format!("invalid `{field}`: {err}")),
    }
}
