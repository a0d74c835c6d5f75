// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! Facade over the yuzu crates: the declarative HTTP client runtime
//! (`yuzu-http`), the cancellable event pipeline (`yuzu-disposer`) and the
//! logging interceptor (`yuzu-log`), plus the adapter joining the first two.

use std::sync::Arc;

pub use yuzu_disposer::{
    Accepter, BoxError, CallbackAccepter, CancelSignal, Disposer, EndState, ManualSignal,
    Registration, Scheduler, TokenSignal,
};
pub use yuzu_http::{
    ArgValue, Chain, Client, ClientBuilder, ConfigError, ContentType, ConversionError,
    ConverterFactory, FormBody, GzipInterceptor, Headers, HttpError, HttpMethod, Interceptor,
    MethodDescriptor, MultipartBody, ParamSpec, Part, Request, RequestBody, Response,
    ResponseBody, ServiceDescriptor, TcpTransport, Transport, TransportConfig,
};
pub use yuzu_log::{LogConfig, LogInterceptor, LogLevel};

pub mod prelude {
    pub use crate::{
        Accepter, ArgValue, CallbackAccepter, Client, Disposer, EndState, HttpError, HttpMethod,
        MethodDescriptor, ParamSpec, Scheduler, ServiceDescriptor,
    };
    pub use crate::invoke_disposer;
}

/// Wraps a typed invocation as a pipeline leaf.
///
/// Nothing happens until the returned [`Disposer`] is subscribed; the
/// blocking compile-build-dispatch call then runs inside the leaf's `call`
/// phase on whatever context transmission was scheduled on, and a failure
/// is funnelled into `on_error`.
pub fn invoke_disposer<R: Send + 'static>(
    client: Arc<Client>,
    service: impl Into<String>,
    method: impl Into<String>,
    args: Vec<ArgValue>,
) -> Disposer<R> {
    let service = service.into();
    let method = method.into();
    Disposer::defer(move || {
        client
            .invoke_as::<R>(&service, &method, args)
            .map_err(|error| Box::new(error) as BoxError)
    })
}
