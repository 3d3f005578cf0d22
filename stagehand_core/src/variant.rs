// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tagged-union values for configuration, properties, and event payloads.
//!
//! A [`Variant`] holds exactly one of: null, bool, integer, real, string,
//! array, object, opaque reference, or error. Cloning is deep for strings,
//! arrays, and objects and shallow for [`Opaque`](Variant::Opaque)
//! references, which share the referenced value.
//!
//! Accessors are strict: asking for the wrong kind returns a
//! [`VariantError::TypeMismatch`]. The only implicit conversions are the
//! widening chain `bool -> int -> real -> string`.

use alloc::borrow::ToOwned;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

/// The discriminant of a [`Variant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantKind {
    /// [`Variant::Null`].
    Null,
    /// [`Variant::Bool`].
    Bool,
    /// [`Variant::Int`].
    Int,
    /// [`Variant::Real`].
    Real,
    /// [`Variant::String`].
    String,
    /// [`Variant::Array`].
    Array,
    /// [`Variant::Object`].
    Object,
    /// [`Variant::Opaque`].
    Opaque,
    /// [`Variant::Error`].
    Error,
}

impl VariantKind {
    /// Returns a lowercase name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Real => "real",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a [`Variant`] accessor does not match the active kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    /// The value holds a different kind than the one requested.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the caller asked for.
        expected: VariantKind,
        /// Kind actually stored.
        found: VariantKind,
    },
}

/// A shared, type-erased reference carried by [`Variant::Opaque`].
///
/// Cloning an `OpaqueRef` clones the pointer, never the referenced value.
#[derive(Clone)]
pub struct OpaqueRef(Rc<dyn Any>);

impl OpaqueRef {
    /// Wraps a value in a new shared reference.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Returns the referenced value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Returns `true` if both references point at the same value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live clones of this reference.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueRef({:p})", Rc::as_ptr(&self.0))
    }
}

/// A dynamically typed value.
#[derive(Clone, Debug, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Real(f64),
    /// An owned string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Self>),
    /// String-keyed fields, iterated in key order.
    Object(BTreeMap<String, Self>),
    /// A shared reference to a host value.
    Opaque(OpaqueRef),
    /// An error message carried as a value.
    Error(String),
}

impl Variant {
    /// Builds an object from `(key, value)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an error value.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Returns the active kind.
    #[must_use]
    pub const fn kind(&self) -> VariantKind {
        match self {
            Self::Null => VariantKind::Null,
            Self::Bool(_) => VariantKind::Bool,
            Self::Int(_) => VariantKind::Int,
            Self::Real(_) => VariantKind::Real,
            Self::String(_) => VariantKind::String,
            Self::Array(_) => VariantKind::Array,
            Self::Object(_) => VariantKind::Object,
            Self::Opaque(_) => VariantKind::Opaque,
            Self::Error(_) => VariantKind::Error,
        }
    }

    /// Returns `true` for [`Variant::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean value.
    pub fn as_bool(&self) -> Result<bool, VariantError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.mismatch(VariantKind::Bool)),
        }
    }

    /// Returns the integer value, widening `bool` to `0`/`1`.
    pub fn as_int(&self) -> Result<i64, VariantError> {
        match self {
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Int(i) => Ok(*i),
            other => Err(other.mismatch(VariantKind::Int)),
        }
    }

    /// Returns the real value, widening `bool` and `int`.
    pub fn as_real(&self) -> Result<f64, VariantError> {
        match self {
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Ok(*i as f64),
            Self::Real(r) => Ok(*r),
            other => Err(other.mismatch(VariantKind::Real)),
        }
    }

    /// Returns the string slice. No widening; see [`to_text`](Self::to_text).
    pub fn as_str(&self) -> Result<&str, VariantError> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.mismatch(VariantKind::String)),
        }
    }

    /// Renders a scalar as a string, widening `bool`, `int`, and `real`.
    pub fn to_text(&self) -> Result<String, VariantError> {
        match self {
            Self::Bool(b) => Ok(if *b { "true".to_owned() } else { "false".to_owned() }),
            Self::Int(i) => Ok(format!("{i}")),
            Self::Real(r) => Ok(format!("{r}")),
            Self::String(s) => Ok(s.clone()),
            other => Err(other.mismatch(VariantKind::String)),
        }
    }

    /// Returns the array elements.
    pub fn as_array(&self) -> Result<&[Self], VariantError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(other.mismatch(VariantKind::Array)),
        }
    }

    /// Returns the object fields.
    pub fn as_object(&self) -> Result<&BTreeMap<String, Self>, VariantError> {
        match self {
            Self::Object(fields) => Ok(fields),
            other => Err(other.mismatch(VariantKind::Object)),
        }
    }

    /// Returns the object fields mutably.
    pub fn as_object_mut(&mut self) -> Result<&mut BTreeMap<String, Self>, VariantError> {
        match self {
            Self::Object(fields) => Ok(fields),
            other => Err(other.mismatch(VariantKind::Object)),
        }
    }

    /// Returns the opaque reference.
    pub fn as_opaque(&self) -> Result<&OpaqueRef, VariantError> {
        match self {
            Self::Opaque(r) => Ok(r),
            other => Err(other.mismatch(VariantKind::Opaque)),
        }
    }

    /// Returns the error message.
    pub fn as_error(&self) -> Result<&str, VariantError> {
        match self {
            Self::Error(msg) => Ok(msg),
            other => Err(other.mismatch(VariantKind::Error)),
        }
    }

    /// Looks up an object field. Returns `None` for non-objects and missing keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    fn mismatch(&self, expected: VariantKind) -> VariantError {
        VariantError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for Variant {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<OpaqueRef> for Variant {
    fn from(value: OpaqueRef) -> Self {
        Self::Opaque(value)
    }
}
