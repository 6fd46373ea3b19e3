#![forbid(unsafe_code)]

//! Dynamically typed values flowing through bindings.
//!
//! [`Value`] is what every getter returns and every setter accepts. Scalars
//! compare by value; objects compare by identity (same allocation).
//!
//! [`WeakValue`] is the cache-friendly twin of [`Value`]: it holds object
//! payloads weakly so the engine never extends an object's lifetime by
//! remembering it.

use std::fmt;
use std::rc::Rc;

use crate::error::{BindError, Result};
use crate::object::{ObjectRef, WeakObject, same_object};

/// Declared type of a member, used for default values and coercion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Untyped; accepts anything and defaults to null.
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Str,
    Object,
}

impl ValueKind {
    /// The value a member of this kind reads as when its source is unreachable.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Any | Self::Str | Self::Object => Value::Null,
        }
    }

    /// Whether `value` can be passed to a parameter of this kind without
    /// conversion.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Str | Self::Object, Value::Null) => true,
            (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_) | Value::Int(_))
            | (Self::Str, Value::Str(_))
            | (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(ObjectRef),
}

impl Value {
    /// Wrap any bindable object.
    pub fn object<T: crate::object::Bindable>(object: Rc<T>) -> Self {
        Self::Object(object)
    }

    /// The kind this value carries at runtime (`Any` for null).
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Any,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Object(_) => ValueKind::Object,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is the zero value of its own kind (null, false, 0, 0.0).
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(x) => *x == 0.0,
            Self::Str(_) | Self::Object(_) => false,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Coerce to `kind`.
    ///
    /// Null becomes the kind's default. Numbers, booleans and strings convert
    /// between each other where the conversion is lossless or conventional
    /// (floats round to the nearest integer, strings are parsed after
    /// trimming). Objects only convert to `Object` or `Any`.
    pub fn convert_to(&self, kind: ValueKind) -> Result<Value> {
        let mismatch = || BindError::TypeMismatch {
            expected: kind,
            found: self.kind(),
        };
        if let Self::Null = self {
            return Ok(kind.default_value());
        }
        match kind {
            ValueKind::Any => Ok(self.clone()),
            ValueKind::Bool => match self {
                Self::Bool(b) => Ok(Self::Bool(*b)),
                Self::Int(i) => Ok(Self::Bool(*i != 0)),
                Self::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Self::Bool(true)),
                    "false" => Ok(Self::Bool(false)),
                    _ => Err(mismatch()),
                },
                _ => Err(mismatch()),
            },
            ValueKind::Int => match self {
                Self::Int(i) => Ok(Self::Int(*i)),
                Self::Bool(b) => Ok(Self::Int(i64::from(*b))),
                Self::Float(x) if x.is_finite() => Ok(Self::Int(x.round() as i64)),
                Self::Str(s) => s.trim().parse().map(Self::Int).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            ValueKind::Float => match self {
                Self::Float(x) => Ok(Self::Float(*x)),
                Self::Int(i) => Ok(Self::Float(*i as f64)),
                Self::Bool(b) => Ok(Self::Float(if *b { 1.0 } else { 0.0 })),
                Self::Str(s) => s.trim().parse().map(Self::Float).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            ValueKind::Str => match self {
                Self::Object(_) => Err(mismatch()),
                Self::Str(s) => Ok(Self::Str(Rc::clone(s))),
                other => Ok(Self::from(other.to_string())),
            },
            ValueKind::Object => match self {
                Self::Object(o) => Ok(Self::Object(Rc::clone(o))),
                _ => Err(mismatch()),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Object(o) => write!(f, "Object({})", o.descriptor().name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Object(o) => f.write_str(o.descriptor().name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A [`Value`] that holds objects weakly.
#[derive(Clone, Default)]
pub enum WeakValue {
    #[default]
    Null,
    /// Any non-object value.
    Scalar(Value),
    Object(WeakObject),
}

impl WeakValue {
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Object(o) => Self::Object(Rc::downgrade(o)),
            other => Self::Scalar(other.clone()),
        }
    }

    /// Recover the strong value; `None` when the object has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null),
            Self::Scalar(v) => Some(v.clone()),
            Self::Object(w) => w.upgrade().map(Value::Object),
        }
    }

    /// Value-equality for scalars, identity for live objects. A dead object
    /// never matches anything.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null) => true,
            (Self::Scalar(a), b) => a == b,
            (Self::Object(w), Value::Object(o)) => {
                w.upgrade().is_some_and(|live| same_object(&live, o))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Scalar(v) => write!(f, "{v:?}"),
            Self::Object(w) => {
                if w.strong_count() > 0 {
                    f.write_str("Object(<live>)")
                } else {
                    f.write_str("Object(<dead>)")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_converts_to_kind_default() {
        assert_eq!(Value::Null.convert_to(ValueKind::Int).unwrap(), Value::Int(0));
        assert_eq!(
            Value::Null.convert_to(ValueKind::Bool).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(Value::Null.convert_to(ValueKind::Str).unwrap(), Value::Null);
    }

    #[test]
    fn numeric_and_string_coercions() {
        assert_eq!(
            Value::from("42").convert_to(ValueKind::Int).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            Value::Float(2.6).convert_to(ValueKind::Int).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            Value::Int(7).convert_to(ValueKind::Str).unwrap(),
            Value::from("7")
        );
        assert_eq!(
            Value::from(" TRUE ").convert_to(ValueKind::Bool).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn impossible_coercion_is_type_mismatch() {
        let err = Value::from("abc").convert_to(ValueKind::Int).unwrap_err();
        assert_eq!(
            err,
            BindError::TypeMismatch {
                expected: ValueKind::Int,
                found: ValueKind::Str
            }
        );
    }

    #[test]
    fn accepts_widens_int_to_float_only() {
        assert!(ValueKind::Float.accepts(&Value::Int(1)));
        assert!(!ValueKind::Int.accepts(&Value::Float(1.0)));
        assert!(ValueKind::Str.accepts(&Value::Null));
        assert!(!ValueKind::Int.accepts(&Value::Null));
    }

    #[test]
    fn is_default_per_kind() {
        assert!(Value::Null.is_default());
        assert!(Value::Int(0).is_default());
        assert!(!Value::Int(1).is_default());
        assert!(!Value::from("").is_default());
    }

    #[test]
    fn weak_value_scalar_matches_by_value() {
        let w = WeakValue::from_value(&Value::from("a"));
        assert!(w.matches(&Value::from("a")));
        assert!(!w.matches(&Value::from("b")));
        assert!(WeakValue::Null.matches(&Value::Null));
    }
}
