#![forbid(unsafe_code)]

//! Prop declarations: what a component accepts from its parent.
//!
//! A [`PropDecl`] names a prop on both sides of the bridge. `field_name` is
//! the name in the host component, and `property_name` is the runtime-side
//! name used by templates and [`Runtime::route_change`](crate::Runtime::route_change).
//! It can also carry a declared [`PropKind`], a required flag, a default
//! value and a custom validator.
//!
//! Kind checks and validators only ever produce warnings: a failing value is
//! still delivered to the child, and the failure is reported on the child's
//! error channel.

use std::fmt;
use std::rc::Rc;

use super::PropValue;
use crate::error::{Result, SyncError};

/// Native value kind of a prop, as seen by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropKind {
    Number,
    Boolean,
    String,
    Array,
    Object,
}

impl PropKind {
    /// Kind of a host type, following the usual mapping: integers and
    /// floats are `Number`, `bool` is `Boolean`, strings and `char` are
    /// `String`, sequences are `Array`.
    #[must_use]
    pub const fn of<T: NativeKind + ?Sized>() -> Self {
        T::KIND
    }

    /// Kind of a runtime value; `None` for null.
    #[must_use]
    pub fn of_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Null => None,
            PropValue::Bool(_) => Some(Self::Boolean),
            PropValue::Number(_) => Some(Self::Number),
            PropValue::String(_) => Some(Self::String),
            PropValue::Array(_) => Some(Self::Array),
            PropValue::Object(_) => Some(Self::Object),
        }
    }

    /// Whether `value` satisfies this kind. Null satisfies every kind;
    /// presence is checked separately through `required`.
    #[must_use]
    pub fn matches(self, value: &PropValue) -> bool {
        Self::of_value(value).is_none_or(|kind| kind == self)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Array => "Array",
            Self::Object => "Object",
        }
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host types with a known runtime kind.
///
/// Implement this for your own structs to declare them as
/// [`PropKind::Object`] (or anything else) in [`PropDecl::typed`].
pub trait NativeKind {
    const KIND: PropKind;
}

macro_rules! native_kind {
    ($kind:ident: $($ty:ty),+ $(,)?) => {
        $(impl NativeKind for $ty {
            const KIND: PropKind = PropKind::$kind;
        })+
    };
}

native_kind!(Number: i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);
native_kind!(Boolean: bool);
native_kind!(String: String, str, char);

impl<T> NativeKind for Vec<T> {
    const KIND: PropKind = PropKind::Array;
}

impl<T> NativeKind for [T] {
    const KIND: PropKind = PropKind::Array;
}

impl<T, const N: usize> NativeKind for [T; N] {
    const KIND: PropKind = PropKind::Array;
}

impl<T: NativeKind> NativeKind for Option<T> {
    const KIND: PropKind = T::KIND;
}

impl<K, V> NativeKind for std::collections::BTreeMap<K, V> {
    const KIND: PropKind = PropKind::Object;
}

impl<K, V, S> NativeKind for std::collections::HashMap<K, V, S> {
    const KIND: PropKind = PropKind::Object;
}

/// Custom prop validator. Returning `false` rejects the value.
pub type PropValidator = Rc<dyn Fn(&PropValue) -> bool>;

/// Declaration of one prop on a component.
#[derive(Clone)]
pub struct PropDecl {
    field_name: String,
    property_name: String,
    required: bool,
    kind: Option<PropKind>,
    default: Option<PropValue>,
    validator: Option<PropValidator>,
}

impl fmt::Debug for PropDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropDecl")
            .field("field_name", &self.field_name)
            .field("property_name", &self.property_name)
            .field("required", &self.required)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl PropDecl {
    /// Declare a prop whose runtime name equals its field name.
    #[must_use]
    pub fn new(field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        Self {
            property_name: field_name.clone(),
            field_name,
            required: false,
            kind: None,
            default: None,
            validator: None,
        }
    }

    /// Declare a prop and check its values against the kind of `T`.
    #[must_use]
    pub fn typed<T: NativeKind + ?Sized>(field_name: impl Into<String>) -> Self {
        Self::new(field_name).kind(T::KIND)
    }

    /// Use a different runtime-side name.
    #[must_use]
    pub fn renamed(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = property_name.into();
        self
    }

    /// Mark the prop as required: mounting without a source fails.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check values against `kind`.
    #[must_use]
    pub fn kind(mut self, kind: PropKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Value used when the parent provides no source.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<PropValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a custom validator.
    #[must_use]
    pub fn validator(mut self, f: impl Fn(&PropValue) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn declared_kind(&self) -> Option<PropKind> {
        self.kind
    }

    #[must_use]
    pub fn declared_default(&self) -> Option<&PropValue> {
        self.default.as_ref()
    }

    /// Check `value` against the declared kind, the required flag and the
    /// validator.
    pub fn validate(&self, value: &PropValue) -> Result<()> {
        if self.required && value.is_null() {
            return Err(self.invalid("required prop is null".to_string()));
        }
        if let Some(kind) = self.kind.filter(|kind| !kind.matches(value)) {
            let got = PropKind::of_value(value).map_or("Null", PropKind::as_str);
            return Err(self.invalid(format!("expected {kind}, got {got}")));
        }
        if self.validator.as_ref().is_some_and(|validator| !validator(value)) {
            return Err(self.invalid("custom validator rejected the value".to_string()));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> SyncError {
        SyncError::InvalidProp {
            prop: self.property_name.clone(),
            reason,
        }
    }
}
