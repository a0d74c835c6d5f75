// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::args::ArgValue;
use crate::body::{FormBody, MultipartBody, Part, RequestBody};
use crate::convert::ConverterRegistry;
use crate::errors::{ConfigError, HttpError};
use crate::headers::Headers;
use crate::method::HttpMethod;
use crate::request::{append_query, join_url, Request};

/// Path values that would collapse into a `.` or `..` segment, including
/// their percent-encoded spellings.
static PATH_TRAVERSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*/)?(\.|%2e|%2E){1,2}(/.*)?$").unwrap()
});

/// Role of one declared parameter. Map-shaped roles carry no name; the
/// argument supplies the keys.
#[derive(Debug, Clone)]
pub enum ParamSpec {
    /// Substituted into a `{name}` placeholder of the path template.
    Path { name: String, encoded: bool },
    /// Form field, or query parameter on bodiless verbs.
    Field { name: String, encoded: bool },
    FieldMap { encoded: bool },
    Header { name: String },
    HeaderMap,
    /// Opaque request body, at most one per method.
    Body,
    Part { name: String },
    PartMap,
}

/// Declarative description of one endpoint method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    name: String,
    verb: HttpMethod,
    path: String,
    headers: Vec<String>,
    multipart: bool,
    base_url: Option<String>,
    params: Vec<ParamSpec>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, verb: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb,
            path: path.into(),
            headers: Vec::new(),
            multipart: false,
            base_url: None,
            params: Vec::new(),
        }
    }

    /// Adds a static `"Name: value"` header string.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    /// Absolute value replaces the configured root, relative is appended.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A named set of endpoint methods sharing a base-URL rule.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    name: String,
    base_url: Option<String>,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            methods: Vec::new(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find(&self, method: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == method)
    }
}

/// Compiled, immutable form of one method. Built once per
/// `(service, method)` pair and cached.
#[derive(Debug)]
pub struct MethodTemplate {
    service: String,
    method: String,
    verb: HttpMethod,
    path: String,
    static_headers: Vec<(String, String)>,
    multipart: bool,
    base_overrides: Vec<String>,
    bindings: Vec<ParamSpec>,
}

impl MethodTemplate {
    fn compile(service: &ServiceDescriptor, method: &MethodDescriptor) -> Result<Self, ConfigError> {
        let qualified = format!("{}.{}", service.name, method.name);

        let mut static_headers = Vec::with_capacity(method.headers.len());
        for header in &method.headers {
            let parsed = header.split_once(':').and_then(|(name, value)| {
                let name = name.trim();
                let value = value.trim();
                (!name.is_empty() && !value.is_empty())
                    .then(|| (name.to_string(), value.to_string()))
            });
            match parsed {
                Some(pair) => static_headers.push(pair),
                None => {
                    return Err(ConfigError::HeaderFormat {
                        header: header.clone(),
                        method: qualified,
                    });
                }
            }
        }

        if method.multipart && method.verb != HttpMethod::Post {
            return Err(ConfigError::MultipartRequiresPost {
                verb: method.verb.to_string(),
                method: qualified,
            });
        }

        let mut bodies = 0usize;
        let mut has_field = false;
        let mut has_part = false;
        for param in &method.params {
            match param {
                ParamSpec::Body => bodies += 1,
                ParamSpec::Field { .. } | ParamSpec::FieldMap { .. } => has_field = true,
                ParamSpec::Part { .. } | ParamSpec::PartMap => has_part = true,
                ParamSpec::Path { name, .. } => {
                    let placeholder = format!("{{{}}}", name);
                    if !method.path.contains(&placeholder) {
                        return Err(ConfigError::MissingPlaceholder {
                            name: name.clone(),
                            method: qualified,
                        });
                    }
                }
                _ => {}
            }
        }
        if bodies > 1 {
            return Err(ConfigError::MultipleBodies { method: qualified });
        }
        if bodies > 0 && has_field {
            return Err(ConfigError::BodyWithField { method: qualified });
        }
        if bodies > 0 && method.multipart {
            return Err(ConfigError::BodyWithMultipart { method: qualified });
        }
        if has_field && method.multipart {
            return Err(ConfigError::FieldWithMultipart { method: qualified });
        }
        if has_part && !method.multipart {
            return Err(ConfigError::PartWithoutMultipart { method: qualified });
        }

        let mut base_overrides = Vec::new();
        if let Some(base) = &service.base_url {
            base_overrides.push(base.clone());
        }
        if let Some(base) = &method.base_url {
            base_overrides.push(base.clone());
        }

        debug!(method = %qualified, "compiled method template");

        Ok(Self {
            service: service.name.clone(),
            method: method.name.clone(),
            verb: method.verb,
            path: method.path.clone(),
            static_headers,
            multipart: method.multipart,
            base_overrides,
            bindings: method.params.clone(),
        })
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }

    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    fn parameter_error(&self, index: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Parameter {
            index,
            method: self.qualified_name(),
            message: message.into(),
        }
    }

    /// Applies the bindings to call-time arguments and assembles the
    /// concrete request against `root`.
    pub fn build_request(
        &self,
        root: &str,
        args: Vec<ArgValue>,
        converters: &ConverterRegistry,
    ) -> Result<Request, HttpError> {
        if args.len() != self.bindings.len() {
            return Err(ConfigError::ArgumentCount {
                method: self.qualified_name(),
                expected: self.bindings.len(),
                actual: args.len(),
            }
            .into());
        }

        let mut path = self.path.clone();
        let mut headers = Headers::new();
        for (name, value) in &self.static_headers {
            headers.add(name.clone(), value.clone());
        }
        let mut form = FormBody::new();
        let mut parts: Vec<Part> = Vec::new();
        let mut body: Option<RequestBody> = None;

        for (index, (binding, arg)) in self.bindings.iter().zip(args).enumerate() {
            match binding {
                ParamSpec::Path { name, encoded } => {
                    let value = match arg {
                        ArgValue::Scalar(v) => v,
                        ArgValue::Null => {
                            return Err(self
                                .parameter_error(index, "path value must not be null")
                                .into());
                        }
                        other => {
                            return Err(self
                                .parameter_error(
                                    index,
                                    format!("path value must be a scalar, got {}", other.kind()),
                                )
                                .into());
                        }
                    };
                    let value = if *encoded {
                        urlencoding::encode(&value).into_owned()
                    } else {
                        value
                    };
                    if PATH_TRAVERSAL.is_match(&value) {
                        return Err(ConfigError::PathTraversal {
                            value,
                            method: self.qualified_name(),
                        }
                        .into());
                    }
                    path = path.replace(&format!("{{{}}}", name), &value);
                }
                ParamSpec::Field { name, encoded } => match arg {
                    ArgValue::Null => {}
                    ArgValue::Scalar(v) => form.add(name.clone(), v, *encoded),
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("field value must be a scalar, got {}", other.kind()),
                            )
                            .into());
                    }
                },
                ParamSpec::FieldMap { encoded } => match arg {
                    ArgValue::Null => {}
                    ArgValue::Map(entries) => {
                        for (name, value) in entries {
                            form.add(name, value, *encoded);
                        }
                    }
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("field map must be a string map, got {}", other.kind()),
                            )
                            .into());
                    }
                },
                ParamSpec::Header { name } => match arg {
                    ArgValue::Null => {}
                    ArgValue::Scalar(v) => headers.add(name.clone(), v),
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("header value must be a scalar, got {}", other.kind()),
                            )
                            .into());
                    }
                },
                ParamSpec::HeaderMap => match arg {
                    ArgValue::Null => {}
                    ArgValue::Map(entries) => {
                        for (name, value) in entries {
                            headers.add(name, value);
                        }
                    }
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("header map must be a string map, got {}", other.kind()),
                            )
                            .into());
                    }
                },
                ParamSpec::Body => {
                    body = Some(self.body_from_arg(index, arg, converters)?);
                }
                ParamSpec::Part { name } => match arg {
                    ArgValue::Null => {}
                    ArgValue::Scalar(v) => parts.push(Part::text(name.clone(), v)),
                    ArgValue::Bytes(b) => parts.push(Part::bytes(name.clone(), b)),
                    ArgValue::File(p) => parts.push(Part::file(name.clone(), p)),
                    ArgValue::Body(b) => parts.push(Part::body(name.clone(), b)),
                    ArgValue::Part(p) => parts.push(p),
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("part value not supported: {}", other.kind()),
                            )
                            .into());
                    }
                },
                ParamSpec::PartMap => match arg {
                    ArgValue::Null => {}
                    ArgValue::Map(entries) => {
                        for (name, value) in entries {
                            parts.push(Part::text(name, value));
                        }
                    }
                    other => {
                        return Err(self
                            .parameter_error(
                                index,
                                format!("part map must be a string map, got {}", other.kind()),
                            )
                            .into());
                    }
                },
            }
        }

        // Final body selection: explicit body wins, then multipart parts,
        // then form fields (query string on bodiless verbs), then an empty
        // body on POST-like verbs.
        let body = if let Some(body) = body {
            Some(body)
        } else if self.multipart {
            let mut multipart = MultipartBody::new();
            for part in parts {
                multipart.add(part);
            }
            Some(RequestBody::Multipart(multipart))
        } else if !form.is_empty() {
            if self.verb.has_body() {
                Some(RequestBody::Form(form))
            } else {
                path = append_query(&path, &form.encode());
                None
            }
        } else if self.verb.has_body() {
            Some(RequestBody::empty())
        } else {
            None
        };

        let base = self
            .base_overrides
            .iter()
            .fold(root.to_string(), |acc, over| join_url(&acc, over));

        let mut builder = Request::builder(self.service.clone(), self.verb, base)
            .method_name(self.qualified_name())
            .relative_path(path)
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        Ok(builder.build())
    }

    fn body_from_arg(
        &self,
        index: usize,
        arg: ArgValue,
        converters: &ConverterRegistry,
    ) -> Result<RequestBody, HttpError> {
        match arg {
            ArgValue::Body(body) => Ok(body),
            ArgValue::Bytes(bytes) => Ok(RequestBody::raw(None, bytes)),
            ArgValue::Scalar(text) => Ok(RequestBody::text(text)),
            ArgValue::Typed {
                value,
                type_id,
                type_name,
            } => {
                let method = self.qualified_name();
                let converter = converters.request_converter(type_id, type_name, &method)?;
                converter
                    .convert(value)
                    .map_err(|message| crate::errors::ConversionError::Failed { method, message }.into())
            }
            ArgValue::Null => {
                Err(self.parameter_error(index, "body value must not be null").into())
            }
            other => Err(self
                .parameter_error(index, format!("body value not supported: {}", other.kind()))
                .into()),
        }
    }
}

/// Per-client template cache. Steady-state lookups take the read lock only;
/// a miss recompiles under the write lock with a re-check, so concurrent
/// first calls converge on one stored instance.
#[derive(Default)]
pub struct TemplateCache {
    inner: RwLock<HashMap<(String, String), Arc<MethodTemplate>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn obtain(
        &self,
        service: &ServiceDescriptor,
        method: &str,
    ) -> Result<Arc<MethodTemplate>, ConfigError> {
        let key = (service.name.clone(), method.to_string());
        if let Some(template) = self.inner.read().get(&key) {
            return Ok(template.clone());
        }
        let mut map = self.inner.write();
        if let Some(template) = map.get(&key) {
            return Ok(template.clone());
        }
        let descriptor = service
            .find(method)
            .ok_or_else(|| ConfigError::UnknownMethod {
                service: service.name.clone(),
                method: method.to_string(),
            })?;
        let template = Arc::new(MethodTemplate::compile(service, descriptor)?);
        map.insert(key, template.clone());
        Ok(template)
    }
}
