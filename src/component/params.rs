//! Component parameters.
//!
//! Parameters are passed by name, as in markup attributes. Values are a
//! closed set of primitive kinds plus two escape hatches: a
//! [`RenderFragment`] for child content and a shared [`Any`] object for
//! everything else (services, channels, test doubles).

use super::builder::RenderFragment;
use crate::error::{Error, Result};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single parameter value.
#[derive(Clone)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Child content rendered by the receiving component.
    Fragment(RenderFragment),
    /// An arbitrary shared value, compared by identity.
    Object(Arc<dyn Any + Send + Sync>),
}

impl ParamValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Fragment(_) => "render fragment",
            Self::Object(_) => "object",
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Fragment(a), Self::Fragment(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "Bool({v})"),
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Text(v) => write!(f, "Text({v:?})"),
            Self::Fragment(_) => f.write_str("Fragment(..)"),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

macro_rules! param_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    Self::Int(i64::from(v))
                }
            }

            impl FromParam for $ty {
                fn from_param(value: &ParamValue) -> Option<Self> {
                    match value {
                        ParamValue::Int(v) => <$ty>::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

param_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<RenderFragment> for ParamValue {
    fn from(v: RenderFragment) -> Self {
        Self::Fragment(v)
    }
}

/// Conversion from a [`ParamValue`] to a concrete type.
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParam for usize {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Self::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromParam for f64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            ParamValue::Int(v) => Some(*v as Self),
            _ => None,
        }
    }
}

impl FromParam for String {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromParam for RenderFragment {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Fragment(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

/// Named parameters for a component.
///
/// ```
/// use rendertest::Parameters;
///
/// let params = Parameters::new().add("Title", "Inbox").add("Unread", 3);
/// assert_eq!(params.get::<String>("Title").unwrap().as_deref(), Some("Inbox"));
/// assert_eq!(params.require::<i64>("Unread").unwrap(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, ParamValue>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter.
    #[must_use]
    pub fn add(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Add a shared object parameter.
    #[must_use]
    pub fn add_object<T: Any + Send + Sync>(self, name: impl Into<String>, value: Arc<T>) -> Self {
        self.add(name, ParamValue::Object(value))
    }

    /// Add child content under the conventional `ChildContent` name.
    #[must_use]
    pub fn child_content<F>(self, fragment: F) -> Self
    where
        F: Fn(&mut super::RenderTreeBuilder) + Send + Sync + 'static,
    {
        let fragment: RenderFragment = Arc::new(fragment);
        self.add(CHILD_CONTENT, fragment)
    }

    /// Insert every parameter of `other`, replacing existing names.
    pub fn merge(&mut self, other: &Self) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Typed lookup. `Ok(None)` when absent, an error when of another kind.
    pub fn get<T: FromParam>(&self, name: &str) -> Result<Option<T>> {
        self.values
            .get(name)
            .map(|value| {
                T::from_param(value).ok_or_else(|| Error::Parameter {
                    name: name.to_string(),
                    message: format!(
                        "expected {}, found {}",
                        std::any::type_name::<T>(),
                        value.kind()
                    ),
                })
            })
            .transpose()
    }

    /// Typed lookup of a parameter that must be present.
    pub fn require<T: FromParam>(&self, name: &str) -> Result<T> {
        self.get(name)?.ok_or_else(|| Error::Parameter {
            name: name.to_string(),
            message: "required parameter was not supplied".to_string(),
        })
    }

    /// Lookup of a shared object parameter by its concrete type.
    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Object(object)) => Arc::clone(object)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| Error::Parameter {
                    name: name.to_string(),
                    message: format!("expected object of type {}", std::any::type_name::<T>()),
                }),
            Some(other) => Err(Error::Parameter {
                name: name.to_string(),
                message: format!("expected object, found {}", other.kind()),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Conventional name of the child content parameter.
pub const CHILD_CONTENT: &str = "ChildContent";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let params = Parameters::new()
            .add("Count", 3)
            .add("Label", "go")
            .add("Enabled", true)
            .add("Ratio", 0.5);

        assert_eq!(params.get::<i32>("Count").unwrap(), Some(3));
        assert_eq!(params.get::<u8>("Count").unwrap(), Some(3));
        assert_eq!(params.get::<String>("Label").unwrap().as_deref(), Some("go"));
        assert!(params.require::<bool>("Enabled").unwrap());
        assert!((params.require::<f64>("Ratio").unwrap() - 0.5).abs() < f64::EPSILON);
        assert_eq!(params.get::<String>("Missing").unwrap(), None);
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let params = Parameters::new().add("Count", "three");
        let err = params.get::<i64>("Count").unwrap_err();
        assert!(matches!(err, Error::Parameter { ref name, .. } if name == "Count"));
        assert!(err.to_string().contains("found text"));
    }

    #[test]
    fn test_require_reports_missing() {
        let err = Parameters::new().require::<i64>("Id").unwrap_err();
        assert!(err.to_string().contains("required parameter"));
    }

    #[test]
    fn test_object_parameters_compare_by_identity() {
        let shared = Arc::new(String::from("service"));
        let a = Parameters::new().add_object("Svc", Arc::clone(&shared));
        let b = Parameters::new().add_object("Svc", Arc::clone(&shared));
        let c = Parameters::new().add_object("Svc", Arc::new(String::from("service")));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let svc = a.object::<String>("Svc").unwrap().unwrap();
        assert_eq!(svc.as_str(), "service");
        assert!(a.object::<u32>("Svc").is_err());
    }

    #[test]
    fn test_merge_replaces_existing() {
        let mut params = Parameters::new().add("A", 1).add("B", 2);
        params.merge(&Parameters::new().add("B", 20).add("C", 30));
        assert_eq!(params.get::<i64>("A").unwrap(), Some(1));
        assert_eq!(params.get::<i64>("B").unwrap(), Some(20));
        assert_eq!(params.len(), 3);
    }
}
