// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::errors::HttpError;
use crate::request::Request;
use crate::response::{Response, ResponseBody};
use crate::transport::Transport;

/// Middleware step. May rewrite the request before handing it down with
/// `proceed`, rewrite the response on the way back, or short-circuit
/// without proceeding. Failures must propagate or be translated, never
/// swallowed.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, chain: Chain<'_>) -> Result<Response, HttpError>;
}

/// Handle to the rest of the chain. Consuming `proceed` enforces at most
/// one downstream call per interceptor.
pub struct Chain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
    request: Request,
}

impl<'a> Chain<'a> {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn proceed(mut self, request: Request) -> Result<Response, HttpError> {
        self.request = request;
        self.run()
    }

    fn run(self) -> Result<Response, HttpError> {
        match self.interceptors.split_first() {
            Some((head, rest)) => head.intercept(Chain {
                interceptors: rest,
                transport: self.transport,
                request: self.request,
            }),
            None => self.transport.execute(&self.request),
        }
    }
}

/// Runs `request` through `interceptors` in declaration order, ending at
/// the transport.
pub(crate) fn dispatch(
    interceptors: &[Arc<dyn Interceptor>],
    transport: &dyn Transport,
    request: Request,
) -> Result<Response, HttpError> {
    Chain {
        interceptors,
        transport,
        request,
    }
    .run()
}

/// Injects `Accept-Encoding: gzip` when the caller asked for no encoding
/// of its own, and transparently inflates a gzip response body. Skipped
/// when the request already carries `Accept-Encoding` or `Range`.
pub struct GzipInterceptor;

impl Interceptor for GzipInterceptor {
    fn intercept(&self, chain: Chain<'_>) -> Result<Response, HttpError> {
        let request = chain.request().clone();
        let transparent = !request.headers().contains("Accept-Encoding")
            && !request.headers().contains("Range");
        let request = if transparent {
            request
                .into_builder()
                .set_header("Accept-Encoding", "gzip")
                .build()
        } else {
            request
        };

        let response = chain.proceed(request)?;
        let gzipped = response
            .headers()
            .get("Content-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));
        if !(transparent && gzipped && response.has_body_data()) {
            return Ok(response);
        }

        let mut inflated = Vec::new();
        let mut decoder = GzDecoder::new(response.body().bytes().as_ref());
        decoder
            .read_to_end(&mut inflated)
            .map_err(|source| HttpError::Read {
                url: response.request().url().to_string(),
                source,
            })?;
        debug!(
            wire_len = response.body().len(),
            inflated_len = inflated.len(),
            "inflated gzip response body"
        );
        let content_type = response.body().content_type().cloned();
        Ok(response
            .into_builder()
            .remove_header("Content-Encoding")
            .remove_header("Content-Length")
            .body(ResponseBody::new(content_type, inflated))
            .build())
    }
}
