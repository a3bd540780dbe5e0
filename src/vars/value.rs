//! Concrete variable values.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A zero-argument function producing a value on every call.
pub type Computed = Arc<dyn Fn() -> VarValue + Send + Sync>;

/// A variable's value.
///
/// Only [`VarValue::Text`], [`VarValue::Integer`], [`VarValue::Float`],
/// [`VarValue::Bool`] and [`VarValue::Map`] survive into the saved snapshot.
#[derive(Clone)]
pub enum VarValue {
    /// Plain text.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String-keyed mapping.
    Map(BTreeMap<String, VarValue>),
    /// Ordered sequence; never persisted.
    List(Vec<VarValue>),
    /// Re-evaluated on every read.
    Dynamic(Computed),
}

impl VarValue {
    /// Wrap a closure as a dynamic value.
    pub fn dynamic(f: impl Fn() -> Self + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// Evaluate dynamic values; everything else is returned as-is.
    #[must_use]
    pub fn resolved(&self) -> Self {
        match self {
            Self::Dynamic(f) => f().resolved(),
            other => other.clone(),
        }
    }

    /// Borrow the text of a [`VarValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// A copy containing only the parts that may be persisted.
    ///
    /// Lists, dynamic values and non-finite floats yield `None`; maps keep
    /// their persistable entries and drop the rest.
    #[must_use]
    pub fn persistable(&self) -> Option<Self> {
        match self {
            Self::Text(_) | Self::Integer(_) | Self::Bool(_) => Some(self.clone()),
            Self::Float(f) => f.is_finite().then_some(Self::Float(*f)),
            Self::Map(map) => Some(Self::Map(
                map.iter()
                    .filter_map(|(k, v)| v.persistable().map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Self::List(_) | Self::Dynamic(_) => None,
        }
    }

    /// Convert to JSON for the saved snapshot.
    ///
    /// Returns `None` for values [`Self::persistable`] would drop.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value;
        match self.persistable()? {
            Self::Text(s) => Some(Value::String(s)),
            Self::Integer(i) => Some(Value::from(i)),
            Self::Float(f) => serde_json::Number::from_f64(f).map(Value::Number),
            Self::Bool(b) => Some(Value::Bool(b)),
            Self::Map(map) => Some(Value::Object(
                map.into_iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k, v)))
                    .collect(),
            )),
            Self::List(_) | Self::Dynamic(_) => None,
        }
    }

    /// Convert from snapshot JSON; arrays and nulls are not representable.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::Object(map) => Some(Self::Map(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Value::Array(_) | Value::Null => None,
        }
    }

    /// Interpret a typed-in answer, keeping the type of `like` where the
    /// text parses as that type.
    #[must_use]
    pub fn parse_like(answer: &str, like: Option<&Self>) -> Self {
        match like.map(Self::resolved) {
            Some(Self::Integer(_)) => answer
                .trim()
                .parse()
                .map_or_else(|_| Self::Text(answer.to_string()), Self::Integer),
            Some(Self::Float(_)) => answer
                .trim()
                .parse()
                .map_or_else(|_| Self::Text(answer.to_string()), Self::Float),
            Some(Self::Bool(_)) => match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" => Self::Bool(true),
                "n" | "no" | "false" => Self::Bool(false),
                _ => Self::Text(answer.to_string()),
            },
            _ => Self::Text(answer.to_string()),
        }
    }
}

impl fmt::Debug for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Dynamic(c) => write!(f, "{}", c()),
        }
    }
}

impl PartialEq for VarValue {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dynamic(a), Self::Dynamic(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for VarValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for VarValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for VarValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<BTreeMap<String, Self>> for VarValue {
    fn from(m: BTreeMap<String, Self>) -> Self {
        Self::Map(m)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_and_dynamics_are_not_persistable() {
        assert!(VarValue::List(vec!["a".into()]).persistable().is_none());
        assert!(VarValue::dynamic(|| "x".into()).persistable().is_none());
        assert!(VarValue::Float(f64::NAN).persistable().is_none());
    }

    #[test]
    fn maps_drop_unpersistable_entries() {
        let map = VarValue::Map(BTreeMap::from([
            ("keep".to_string(), VarValue::Integer(1)),
            ("drop".to_string(), VarValue::List(vec![])),
        ]));
        assert_eq!(
            map.persistable().unwrap(),
            VarValue::Map(BTreeMap::from([("keep".to_string(), VarValue::Integer(1))]))
        );
    }

    #[test]
    fn json_conversion_keeps_scalar_types() {
        let value = VarValue::Map(BTreeMap::from([
            ("port".to_string(), VarValue::Integer(5432)),
            ("ratio".to_string(), VarValue::Float(0.5)),
            ("ssl".to_string(), VarValue::from(true)),
            ("host".to_string(), VarValue::from("db")),
        ]));
        let json = value.to_json().unwrap();
        assert_eq!(json, json!({"port": 5432, "ratio": 0.5, "ssl": true, "host": "db"}));
        assert_eq!(VarValue::from_json(&json).unwrap(), value);
    }

    #[test]
    fn from_json_rejects_arrays_and_null() {
        assert!(VarValue::from_json(&json!([1, 2])).is_none());
        assert!(VarValue::from_json(&json!(null)).is_none());
    }

    #[test]
    fn dynamic_resolves_on_each_call() {
        let counter = Arc::new(std::sync::atomic::AtomicI64::new(0));
        let c = Arc::clone(&counter);
        let value = VarValue::dynamic(move || {
            VarValue::Integer(c.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1)
        });
        assert_eq!(value.resolved(), VarValue::Integer(1));
        assert_eq!(value.resolved(), VarValue::Integer(2));
    }

    #[test]
    fn parse_like_follows_default_type() {
        assert_eq!(
            VarValue::parse_like("42", Some(&VarValue::Integer(1))),
            VarValue::Integer(42)
        );
        assert_eq!(
            VarValue::parse_like("yes", Some(&VarValue::Bool(false))),
            VarValue::Bool(true)
        );
        assert_eq!(
            VarValue::parse_like("forty", Some(&VarValue::Integer(1))),
            VarValue::from("forty")
        );
        assert_eq!(VarValue::parse_like("7", None), VarValue::from("7"));
    }

    #[test]
    fn display_renders_nested_values() {
        let value = VarValue::Map(BTreeMap::from([
            ("a".to_string(), VarValue::List(vec![VarValue::Integer(1), VarValue::Integer(2)])),
            ("b".to_string(), VarValue::from("x")),
        ]));
        assert_eq!(value.to_string(), "{a: [1, 2], b: x}");
    }
}
