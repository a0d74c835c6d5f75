// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::any::{Any, TypeId};
use std::path::PathBuf;

use bytes::Bytes;

use crate::body::{Part, RequestBody};

/// One call-time argument. Bindings consume these positionally; the variant
/// must match what the binding role accepts, anything else is a parameter
/// error at build time.
pub enum ArgValue {
    Null,
    Scalar(String),
    /// Raw string-to-scalar map, order preserved.
    Map(Vec<(String, String)>),
    Bytes(Bytes),
    File(PathBuf),
    Body(RequestBody),
    Part(Part),
    /// Converter-mediated value; resolved through the request-body
    /// converter registry by its type id.
    Typed {
        value: Box<dyn Any + Send>,
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl ArgValue {
    pub fn typed<T: Send + 'static>(value: T) -> Self {
        ArgValue::Typed {
            value: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn scalar(value: impl ToString) -> Self {
        ArgValue::Scalar(value.to_string())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ArgValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// Short human name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Scalar(_) => "scalar",
            ArgValue::Map(_) => "map",
            ArgValue::Bytes(_) => "bytes",
            ArgValue::File(_) => "file",
            ArgValue::Body(_) => "body",
            ArgValue::Part(_) => "part",
            ArgValue::Typed { type_name, .. } => type_name,
        }
    }
}

impl std::fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::Null => f.write_str("Null"),
            ArgValue::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            ArgValue::Map(m) => f.debug_tuple("Map").field(m).finish(),
            ArgValue::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ArgValue::File(p) => f.debug_tuple("File").field(p).finish(),
            ArgValue::Body(_) => f.write_str("Body(..)"),
            ArgValue::Part(p) => f.debug_tuple("Part").field(&p.name()).finish(),
            ArgValue::Typed { type_name, .. } => {
                f.debug_tuple("Typed").field(type_name).finish()
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Scalar(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Scalar(value)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ArgValue {
            fn from(value: $ty) -> Self {
                ArgValue::Scalar(value.to_string())
            }
        })*
    };
}

scalar_from!(i32, i64, u32, u64, usize, f32, f64, bool);

impl From<Vec<(String, String)>> for ArgValue {
    fn from(value: Vec<(String, String)>) -> Self {
        ArgValue::Map(value)
    }
}

impl From<Bytes> for ArgValue {
    fn from(value: Bytes) -> Self {
        ArgValue::Bytes(value)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(value: Vec<u8>) -> Self {
        ArgValue::Bytes(Bytes::from(value))
    }
}

impl From<PathBuf> for ArgValue {
    fn from(value: PathBuf) -> Self {
        ArgValue::File(value)
    }
}

impl From<RequestBody> for ArgValue {
    fn from(value: RequestBody) -> Self {
        ArgValue::Body(value)
    }
}

impl From<Part> for ArgValue {
    fn from(value: Part) -> Self {
        ArgValue::Part(value)
    }
}

impl<T> From<Option<T>> for ArgValue
where
    T: Into<ArgValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => ArgValue::Null,
        }
    }
}
