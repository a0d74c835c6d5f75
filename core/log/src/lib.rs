// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! Logging interceptor for the HTTP runtime.
//!
//! Tags every request with an `X-Call-Id` header when one is not already
//! present, then logs the exchange through `tracing` at the configured
//! verbosity. Failures are logged and rethrown, never swallowed.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use yuzu_http::{Chain, HttpError, Interceptor, Response};

const MAX_LOGGED_BODY: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Log nothing.
    None,
    /// Request line and response code with elapsed time.
    #[default]
    Basic,
    /// `Basic` plus request and response headers.
    Headers,
    /// `Headers` plus printable bodies, truncated.
    Body,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

pub struct LogInterceptor {
    level: LogLevel,
}

impl LogInterceptor {
    pub fn new(config: LogConfig) -> Self {
        Self {
            level: config.level,
        }
    }

    pub fn with_level(level: LogLevel) -> Self {
        Self { level }
    }

    fn log_body(direction: &str, call_id: &str, len: usize, printable: Option<&str>) {
        match printable {
            Some(text) => debug!(call_id, "{} body ({} bytes): {}", direction, len, text),
            None => debug!(call_id, "{} body ({} bytes, binary)", direction, len),
        }
    }
}

impl Interceptor for LogInterceptor {
    fn intercept(&self, chain: Chain<'_>) -> Result<Response, HttpError> {
        if self.level == LogLevel::None {
            let request = chain.request().clone();
            return chain.proceed(request);
        }

        let mut request = chain.request().clone();
        if !request.headers().contains("X-Call-Id") {
            request = request
                .into_builder()
                .set_header("X-Call-Id", Uuid::new_v4().to_string())
                .build();
        }
        let call_id = request
            .headers()
            .get("X-Call-Id")
            .unwrap_or_default()
            .to_string();

        debug!(call_id, "--> {} {}", request.verb(), request.url());
        if self.level >= LogLevel::Headers {
            for (name, value) in request.headers().iter() {
                debug!(call_id, "--> {}: {}", name, value);
            }
        }
        if self.level >= LogLevel::Body {
            if let Some(body) = request.body() {
                let mut bytes = Vec::new();
                match body.write_to(&mut bytes) {
                    Ok(()) => {
                        let printable = (bytes.len() <= MAX_LOGGED_BODY)
                            .then(|| std::str::from_utf8(&bytes).ok())
                            .flatten();
                        Self::log_body("-->", &call_id, bytes.len(), printable);
                    }
                    Err(error) => {
                        warn!(call_id, "request body not loggable: {}", error);
                    }
                }
            }
        }

        let started = Instant::now();
        let result = chain.proceed(request);
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(response) => {
                debug!(
                    call_id,
                    "<-- {} {} ({} ms, {} bytes)",
                    response.code(),
                    response.request().url(),
                    elapsed_ms,
                    response.body().len()
                );
                if self.level >= LogLevel::Headers {
                    for (name, value) in response.headers().iter() {
                        debug!(call_id, "<-- {}: {}", name, value);
                    }
                }
                if self.level >= LogLevel::Body && !response.body().is_empty() {
                    let body = response.body();
                    let printable = (body.len() <= MAX_LOGGED_BODY)
                        .then(|| std::str::from_utf8(body.bytes()).ok())
                        .flatten();
                    Self::log_body("<--", &call_id, body.len(), printable);
                }
            }
            Err(error) => {
                warn!(call_id, "<-- failed after {} ms: {}", elapsed_ms, error);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_test::traced_test;
    use yuzu_http::{
        Client, HttpMethod, MethodDescriptor, Request, ResponseBody, ServiceDescriptor, Transport,
    };

    struct StubTransport;

    impl Transport for StubTransport {
        fn execute(&self, request: &Request) -> Result<Response, HttpError> {
            assert!(request.headers().contains("X-Call-Id"));
            Ok(yuzu_http::Response::builder(request.clone(), 200)
                .header("Content-Type", "application/json")
                .body(ResponseBody::new(None, &b"{\"ok\":true}"[..]))
                .build())
        }
    }

    fn client(level: LogLevel) -> Client {
        Client::builder("http://host")
            .service(
                ServiceDescriptor::new("Api")
                    .method(MethodDescriptor::new("ping", HttpMethod::Get, "ping")),
            )
            .interceptor(Arc::new(LogInterceptor::with_level(level)))
            .transport(Arc::new(StubTransport))
            .build()
            .unwrap()
    }

    #[traced_test]
    #[test]
    fn basic_level_logs_request_line_and_status() {
        client(LogLevel::Basic).invoke("Api", "ping", vec![]).unwrap();
        assert!(logs_contain("--> GET http://host/ping"));
        assert!(logs_contain("<-- 200"));
    }

    #[traced_test]
    #[test]
    fn body_level_logs_response_body() {
        client(LogLevel::Body).invoke("Api", "ping", vec![]).unwrap();
        assert!(logs_contain("{\"ok\":true}"));
        assert!(logs_contain("Content-Type: application/json"));
    }

    #[traced_test]
    #[test]
    fn none_level_stays_silent_and_injects_nothing() {
        struct NoIdTransport;
        impl Transport for NoIdTransport {
            fn execute(&self, request: &Request) -> Result<Response, HttpError> {
                assert!(!request.headers().contains("X-Call-Id"));
                Ok(yuzu_http::Response::builder(request.clone(), 200).build())
            }
        }
        let client = Client::builder("http://host")
            .service(
                ServiceDescriptor::new("Api")
                    .method(MethodDescriptor::new("ping", HttpMethod::Get, "ping")),
            )
            .interceptor(Arc::new(LogInterceptor::with_level(LogLevel::None)))
            .transport(Arc::new(NoIdTransport))
            .build()
            .unwrap();
        client.invoke("Api", "ping", vec![]).unwrap();
        assert!(!logs_contain("-->"));
    }

    #[traced_test]
    #[test]
    fn failures_are_logged_and_rethrown() {
        struct FailingTransport;
        impl Transport for FailingTransport {
            fn execute(&self, request: &Request) -> Result<Response, HttpError> {
                Err(HttpError::TimeOut {
                    url: request.url().to_string(),
                })
            }
        }
        let client = Client::builder("http://host")
            .service(
                ServiceDescriptor::new("Api")
                    .method(MethodDescriptor::new("ping", HttpMethod::Get, "ping")),
            )
            .interceptor(Arc::new(LogInterceptor::with_level(LogLevel::Basic)))
            .transport(Arc::new(FailingTransport))
            .build()
            .unwrap();
        let err = client.invoke("Api", "ping", vec![]).unwrap_err();
        assert!(matches!(err, HttpError::TimeOut { .. }));
        assert!(logs_contain("<-- failed"));
    }
}
