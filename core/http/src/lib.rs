// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! Declarative HTTP client runtime.
//!
//! Services are described once as [`descriptor::ServiceDescriptor`]s; the
//! [`client::Client`] compiles each method into a cached
//! [`descriptor::MethodTemplate`], assembles a concrete [`request::Request`]
//! from call-time arguments, and runs it through the interceptor chain down
//! to a [`transport::Transport`].

pub mod args;
pub mod body;
pub mod client;
pub mod content_type;
pub mod convert;
pub mod descriptor;
pub mod errors;
pub mod headers;
pub mod interceptor;
pub mod method;
pub mod request;
pub mod response;
pub mod transport;

pub use args::ArgValue;
pub use body::{FormBody, MultipartBody, Part, RequestBody};
pub use client::{Client, ClientBuilder};
pub use content_type::ContentType;
pub use convert::{ConverterFactory, ConverterRegistry, RequestConverter, ResponseConverter};
pub use descriptor::{MethodDescriptor, MethodTemplate, ParamSpec, ServiceDescriptor, TemplateCache};
pub use errors::{ConfigError, ConversionError, HttpError};
pub use headers::Headers;
pub use interceptor::{Chain, GzipInterceptor, Interceptor};
pub use method::HttpMethod;
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBody, ResponseBuilder};
pub use transport::{TcpTransport, Transport, TransportConfig};
