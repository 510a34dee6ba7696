//! Dynamic values flowing through a proxy call
//!
//! Arguments and results of proxied methods are carried as [`Value`]s.
//! Every parameter and return slot of a method signature is described by
//! a [`TypeRef`], which decides whether a given value is acceptable.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::InvocationError;

/// Identity of an object taking part in a call (proxies and receivers)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Generate a new unique ObjectId
    pub fn new() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create an ObjectId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        ObjectId(id)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Static type of a parameter or return slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// No value (only `Value::Null` fits)
    Void,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float (integers widen)
    Float,
    /// UTF-8 string
    Str,
    /// List of values
    List,
    /// Object reference
    Object,
    /// Anything
    Any,
}

impl TypeRef {
    /// Short lowercase name used in signatures and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            TypeRef::Void => "void",
            TypeRef::Bool => "bool",
            TypeRef::Int => "int",
            TypeRef::Float => "float",
            TypeRef::Str => "str",
            TypeRef::List => "list",
            TypeRef::Object => "object",
            TypeRef::Any => "any",
        }
    }

    /// Whether `value` may be passed where this type is expected.
    ///
    /// Reference types (`str`, `list`, `object`) accept null.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Any, _) => true,
            (TypeRef::Void, Value::Null) => true,
            (TypeRef::Str | TypeRef::List | TypeRef::Object, Value::Null) => true,
            (TypeRef::Bool, Value::Bool(_)) => true,
            (TypeRef::Int, Value::Int(_)) => true,
            (TypeRef::Float, Value::Float(_) | Value::Int(_)) => true,
            (TypeRef::Str, Value::Str(_)) => true,
            (TypeRef::List, Value::List(_)) => true,
            (TypeRef::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed argument or result
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// List
    List(Vec<Value>),
    /// Reference to an object by identity
    Object(ObjectId),
}

impl Value {
    /// The runtime type of this value (`Void` for null)
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Value::Null => TypeRef::Void,
            Value::Bool(_) => TypeRef::Bool,
            Value::Int(_) => TypeRef::Int,
            Value::Float(_) => TypeRef::Float,
            Value::Str(_) => TypeRef::Str,
            Value::List(_) => TypeRef::List,
            Value::Object(_) => TypeRef::Object,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as object reference
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Borrow as string, failing with a type mismatch otherwise
    pub fn expect_str(&self) -> Result<&str, InvocationError> {
        self.as_str().ok_or_else(|| self.mismatch(TypeRef::Str))
    }

    /// Read as integer, failing with a type mismatch otherwise
    pub fn expect_int(&self) -> Result<i64, InvocationError> {
        self.as_int().ok_or_else(|| self.mismatch(TypeRef::Int))
    }

    /// Read as bool, failing with a type mismatch otherwise
    pub fn expect_bool(&self) -> Result<bool, InvocationError> {
        self.as_bool().ok_or_else(|| self.mismatch(TypeRef::Bool))
    }

    fn mismatch(&self, expected: TypeRef) -> InvocationError {
        InvocationError::TypeMismatch {
            expected,
            got: self.type_ref(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(id) => write!(f, "object@{}", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl TryFrom<Value> for String {
    type Error = InvocationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch(TypeRef::Str)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = InvocationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.expect_int()
    }
}

impl TryFrom<Value> for bool {
    type Error = InvocationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.expect_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ids_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(ObjectId::from_u64(a.as_u64()), a);
    }

    #[test]
    fn test_type_accepts() {
        assert!(TypeRef::Str.accepts(&Value::from("x")));
        assert!(TypeRef::Str.accepts(&Value::Null));
        assert!(!TypeRef::Str.accepts(&Value::Int(1)));
        assert!(TypeRef::Float.accepts(&Value::Int(1)));
        assert!(!TypeRef::Int.accepts(&Value::Float(1.0)));
        assert!(!TypeRef::Int.accepts(&Value::Null));
        assert!(TypeRef::Void.accepts(&Value::Null));
        assert!(TypeRef::Any.accepts(&Value::List(vec![])));
    }

    #[test]
    fn test_expect_conversions() {
        assert_eq!(Value::from("hi").expect_str().unwrap(), "hi");
        assert_eq!(Value::from(7).expect_int().unwrap(), 7);

        let err = Value::Bool(true).expect_str().unwrap_err();
        assert!(matches!(
            err,
            InvocationError::TypeMismatch {
                expected: TypeRef::Str,
                got: TypeRef::Bool
            }
        ));
    }

    #[test]
    fn test_try_from_string() {
        let s: String = Value::from("abc").try_into().unwrap();
        assert_eq!(s, "abc");

        let err: Result<String, _> = Value::Int(3).try_into();
        assert!(err.is_err());
    }

    #[test]
    fn test_display() {
        let v = Value::List(vec![Value::Int(1), Value::from("a"), Value::Null]);
        assert_eq!(v.to_string(), "[1, a, null]");
        assert_eq!(TypeRef::Float.to_string(), "float");
    }
}
