//! Dynamically typed argument and return values.
//!
//! Operations selected at runtime exchange their arguments and results as
//! [`Value`]s. Each value remembers the [`TypeInfo`] of what it wraps so the
//! dispatch verifier can check it against a formal parameter type and report
//! readable type names when it does not fit.

use std::any::{Any, TypeId};
use std::fmt;

/// Runtime type metadata: the `TypeId` plus a printable name.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

/// Marker type standing behind [`TypeInfo::any`].
struct Wildcard;

impl TypeInfo {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// A formal type that accepts an argument of any type.
    pub fn any() -> Self {
        Self {
            id: TypeId::of::<Wildcard>(),
            name: "any",
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_any(&self) -> bool {
        self.id == TypeId::of::<Wildcard>()
    }

    /// Whether a value of type `actual` may be passed where `self` is expected.
    pub fn accepts(&self, actual: &TypeInfo) -> bool {
        self.is_any() || self.id == actual.id
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type-erased value that can cross into and out of an actor.
pub struct Value {
    inner: Box<dyn Any + Send>,
    type_info: TypeInfo,
}

/// An ordered list of values, used for both arguments and results.
pub type Values = Vec<Value>;

impl Value {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take the wrapped value out, or get the `Value` back if it holds another type.
    pub fn downcast<T: Any>(self) -> Result<T, Value> {
        let type_info = self.type_info;
        self.inner
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|inner| Value { inner, type_info })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_info)
            .finish()
    }
}

/// Build a [`Values`] list from plain expressions.
///
/// ```
/// let args = cloister::values![4, String::from("four")];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::new($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_returns_value_on_mismatch() {
        let value = Value::new(7_i32);
        let value = value.downcast::<String>().unwrap_err();
        assert_eq!(value.type_info(), TypeInfo::of::<i32>());
        assert_eq!(value.downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn test_wildcard_accepts_everything() {
        let any = TypeInfo::any();
        assert!(any.accepts(&TypeInfo::of::<String>()));
        assert!(any.accepts(&TypeInfo::of::<()>()));
        assert!(!TypeInfo::of::<u8>().accepts(&TypeInfo::of::<i32>()));
    }

    #[test]
    fn test_values_macro() {
        let values = crate::values![1_u8, "two"];
        assert!(values[0].is::<u8>());
        assert_eq!(values[1].downcast_ref::<&'static str>(), Some(&"two"));
        assert!(crate::values![].is_empty());
    }
}
