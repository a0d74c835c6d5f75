// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;

use crate::content_type::ContentType;
use crate::headers::Headers;
use crate::request::Request;

/// Response payload bytes plus the content type they were delivered with.
#[derive(Debug, Clone, Default)]
pub struct ResponseBody {
    content_type: Option<ContentType>,
    data: Bytes,
}

impl ResponseBody {
    pub fn new(content_type: Option<ContentType>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            data: data.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// A fully read wire response, paired with the request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    request: Request,
    code: u16,
    message: String,
    headers: Headers,
    body: ResponseBody,
}

impl Response {
    pub fn builder(request: Request, code: u16) -> ResponseBuilder {
        ResponseBuilder {
            request,
            code,
            message: String::new(),
            headers: Headers::new(),
            body: ResponseBody::empty(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.code)
    }

    /// Whether the wire framing announced body bytes: a positive
    /// `Content-Length` or chunked transfer encoding.
    pub fn has_body_data(&self) -> bool {
        if let Some(value) = self.headers.get("Content-Length") {
            if let Ok(len) = value.trim().parse::<u64>() {
                return len > 0;
            }
        }
        self.headers
            .get("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    }

    /// Reopens the response for rewriting; used by interceptors on the way
    /// back up the chain.
    pub fn into_builder(self) -> ResponseBuilder {
        ResponseBuilder {
            request: self.request,
            code: self.code,
            message: self.message,
            headers: self.headers,
            body: self.body,
        }
    }
}

pub struct ResponseBuilder {
    request: Request,
    code: u16,
    message: String,
    headers: Headers,
    body: ResponseBody,
}

impl ResponseBuilder {
    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Response {
        Response {
            request: self.request,
            code: self.code,
            message: self.message,
            headers: self.headers,
            body: self.body,
        }
    }
}
