// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::any::{Any, TypeId};
use std::sync::Arc;

use bytes::Bytes;

use crate::body::RequestBody;
use crate::errors::ConversionError;
use crate::response::ResponseBody;

/// Turns a typed argument into a request body.
pub trait RequestConverter: Send + Sync {
    fn convert(&self, value: Box<dyn Any + Send>) -> Result<RequestBody, String>;
}

impl std::fmt::Debug for dyn RequestConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RequestConverter")
    }
}

/// Turns raw response bytes into a typed value.
pub trait ResponseConverter: Send + Sync {
    fn convert(&self, body: ResponseBody) -> Result<Box<dyn Any + Send>, String>;
}

/// Pluggable converter source. `None` means "not mine, try the next
/// factory"; exhausting all factories is a fatal conversion error.
pub trait ConverterFactory: Send + Sync {
    fn request_body_converter(&self, type_id: TypeId) -> Option<Arc<dyn RequestConverter>>;
    fn response_body_converter(&self, type_id: TypeId) -> Option<Arc<dyn ResponseConverter>>;
}

/// Ordered factory list. The built-in identity factory is always consulted
/// first, user factories follow in registration order.
pub struct ConverterRegistry {
    factories: Vec<Arc<dyn ConverterFactory>>,
}

impl ConverterRegistry {
    pub fn new(user_factories: Vec<Arc<dyn ConverterFactory>>) -> Self {
        let mut factories: Vec<Arc<dyn ConverterFactory>> =
            vec![Arc::new(BuiltinConverterFactory)];
        factories.extend(user_factories);
        Self { factories }
    }

    pub fn request_converter(
        &self,
        type_id: TypeId,
        type_name: &str,
        method: &str,
    ) -> Result<Arc<dyn RequestConverter>, ConversionError> {
        self.factories
            .iter()
            .find_map(|f| f.request_body_converter(type_id))
            .ok_or_else(|| ConversionError::NoRequestConverter {
                method: method.to_string(),
                type_name: type_name.to_string(),
            })
    }

    pub fn response_converter(
        &self,
        type_id: TypeId,
        type_name: &str,
        method: &str,
    ) -> Result<Arc<dyn ResponseConverter>, ConversionError> {
        self.factories
            .iter()
            .find_map(|f| f.response_body_converter(type_id))
            .ok_or_else(|| ConversionError::NoResponseConverter {
                method: method.to_string(),
                type_name: type_name.to_string(),
            })
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

struct FnRequestConverter<F>(F);

impl<F> RequestConverter for FnRequestConverter<F>
where
    F: Fn(Box<dyn Any + Send>) -> Result<RequestBody, String> + Send + Sync,
{
    fn convert(&self, value: Box<dyn Any + Send>) -> Result<RequestBody, String> {
        (self.0)(value)
    }
}

struct FnResponseConverter<F>(F);

impl<F> ResponseConverter for FnResponseConverter<F>
where
    F: Fn(ResponseBody) -> Result<Box<dyn Any + Send>, String> + Send + Sync,
{
    fn convert(&self, body: ResponseBody) -> Result<Box<dyn Any + Send>, String> {
        (self.0)(body)
    }
}

fn downcast<T: 'static>(value: Box<dyn Any + Send>) -> Result<T, String> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| format!("expected {}", std::any::type_name::<T>()))
}

/// Identity conversions for the plain types the runtime understands
/// without a user-provided factory.
pub struct BuiltinConverterFactory;

impl ConverterFactory for BuiltinConverterFactory {
    fn request_body_converter(&self, type_id: TypeId) -> Option<Arc<dyn RequestConverter>> {
        if type_id == TypeId::of::<String>() {
            Some(Arc::new(FnRequestConverter(|v| {
                downcast::<String>(v).map(RequestBody::text)
            })))
        } else if type_id == TypeId::of::<Vec<u8>>() {
            Some(Arc::new(FnRequestConverter(|v| {
                downcast::<Vec<u8>>(v).map(|b| RequestBody::raw(None, b))
            })))
        } else if type_id == TypeId::of::<Bytes>() {
            Some(Arc::new(FnRequestConverter(|v| {
                downcast::<Bytes>(v).map(|b| RequestBody::raw(None, b))
            })))
        } else if type_id == TypeId::of::<RequestBody>() {
            Some(Arc::new(FnRequestConverter(downcast::<RequestBody>)))
        } else {
            None
        }
    }

    fn response_body_converter(&self, type_id: TypeId) -> Option<Arc<dyn ResponseConverter>> {
        if type_id == TypeId::of::<String>() {
            Some(Arc::new(FnResponseConverter(|body: ResponseBody| {
                Ok(Box::new(body.text().into_owned()) as Box<dyn Any + Send>)
            })))
        } else if type_id == TypeId::of::<Vec<u8>>() {
            Some(Arc::new(FnResponseConverter(|body: ResponseBody| {
                Ok(Box::new(body.bytes().to_vec()) as Box<dyn Any + Send>)
            })))
        } else if type_id == TypeId::of::<Bytes>() {
            Some(Arc::new(FnResponseConverter(|body: ResponseBody| {
                Ok(Box::new(body.bytes().clone()) as Box<dyn Any + Send>)
            })))
        } else if type_id == TypeId::of::<ResponseBody>() {
            Some(Arc::new(FnResponseConverter(|body: ResponseBody| {
                Ok(Box::new(body) as Box<dyn Any + Send>)
            })))
        } else if type_id == TypeId::of::<()>() {
            Some(Arc::new(FnResponseConverter(|_| {
                Ok(Box::new(()) as Box<dyn Any + Send>)
            })))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_string_round_trip() {
        let registry = ConverterRegistry::default();
        let request = registry
            .request_converter(TypeId::of::<String>(), "String", "m")
            .unwrap();
        let body = request.convert(Box::new("hi".to_string())).unwrap();
        assert_eq!(body.content_length(), Some(2));

        let response = registry
            .response_converter(TypeId::of::<String>(), "String", "m")
            .unwrap();
        let value = response
            .convert(ResponseBody::new(None, &b"out"[..]))
            .unwrap();
        assert_eq!(*value.downcast::<String>().unwrap(), "out");
    }

    #[test]
    fn unknown_type_names_method_and_type() {
        struct Unregistered;
        let registry = ConverterRegistry::default();
        let err = registry
            .request_converter(TypeId::of::<Unregistered>(), "Unregistered", "Api.fetch")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Unregistered"));
        assert!(text.contains("Api.fetch"));
    }

    #[test]
    fn user_factory_consulted_after_builtin() {
        struct Custom;
        struct CustomFactory;
        impl ConverterFactory for CustomFactory {
            fn request_body_converter(
                &self,
                type_id: TypeId,
            ) -> Option<Arc<dyn RequestConverter>> {
                (type_id == TypeId::of::<Custom>()).then(|| {
                    Arc::new(FnRequestConverter(|_| Ok(RequestBody::text("custom"))))
                        as Arc<dyn RequestConverter>
                })
            }
            fn response_body_converter(
                &self,
                _type_id: TypeId,
            ) -> Option<Arc<dyn ResponseConverter>> {
                None
            }
        }

        let registry = ConverterRegistry::new(vec![Arc::new(CustomFactory)]);
        let converter = registry
            .request_converter(TypeId::of::<Custom>(), "Custom", "m")
            .unwrap();
        let body = converter.convert(Box::new(Custom)).unwrap();
        assert_eq!(body.content_length(), Some(6));
    }
}
