//! Event payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional argument carried by a dispatched event.
///
/// Handlers always receive a `&Payload`; a handler that takes no argument
/// simply ignores it. JSON `null` converts to [`Payload::None`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    None,
    Value(Value),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.value()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            other => Self::Value(other),
        }
    }
}

impl From<Option<Value>> for Payload {
    fn from(value: Option<Value>) -> Self {
        value.map(Payload::from).unwrap_or_default()
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Self::None
    }
}

macro_rules! payload_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

payload_from!(bool, i32, i64, u32, u64, f32, f64, String, &str);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_becomes_none() {
        assert!(Payload::from(Value::Null).is_none());
        assert!(Payload::from(None::<Value>).is_none());
        assert!(Payload::from(()).is_none());
    }

    #[test]
    fn scalar_accessors() {
        assert_eq!(Payload::from(10).as_i64(), Some(10));
        assert_eq!(Payload::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Payload::from(true).as_bool(), Some(true));
        assert_eq!(Payload::from("go").as_str(), Some("go"));
        assert_eq!(Payload::None.as_i64(), None);
    }

    #[test]
    fn decode_structured_payload() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Hit {
            damage: u32,
        }

        let payload = Payload::from(json!({ "damage": 7 }));
        assert_eq!(payload.decode::<Hit>(), Some(Hit { damage: 7 }));
        assert_eq!(Payload::None.decode::<Hit>(), None);
    }
}
