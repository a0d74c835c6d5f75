// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::OnceCell;

use crate::body::RequestBody;
use crate::headers::Headers;
use crate::method::HttpMethod;

/// A concrete wire request. Immutable once built; the full URL is joined
/// lazily from its base and relative components on first use.
#[derive(Debug, Clone)]
pub struct Request {
    service: String,
    method_name: String,
    verb: HttpMethod,
    headers: Headers,
    base_url: String,
    relative_path: String,
    body: Option<RequestBody>,
    url: OnceCell<String>,
}

impl Request {
    pub fn builder(
        service: impl Into<String>,
        verb: HttpMethod,
        base_url: impl Into<String>,
    ) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                service: service.into(),
                method_name: String::new(),
                verb,
                headers: Headers::new(),
                base_url: base_url.into(),
                relative_path: String::new(),
                body: None,
                url: OnceCell::new(),
            },
        }
    }

    /// Service the request was compiled from, for diagnostics.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn url(&self) -> &str {
        self.url
            .get_or_init(|| join_url(&self.base_url, &self.relative_path))
    }

    /// Reopens the request for rewriting; used by interceptors.
    pub fn into_builder(mut self) -> RequestBuilder {
        self.url = OnceCell::new();
        RequestBuilder { request: self }
    }
}

/// Accumulating builder, consumed exactly once by `build`.
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn method_name(mut self, name: impl Into<String>) -> Self {
        self.request.method_name = name.into();
        self
    }

    pub fn relative_path(mut self, path: impl Into<String>) -> Self {
        self.request.relative_path = path.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.request.base_url = base_url.into();
        self
    }

    /// Replaces all values of a header.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.set(name, value);
        self
    }

    /// Appends a header value.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.add(name, value);
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.request.headers.remove(name);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers = headers;
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.request.body = Some(body);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

/// Joins the configured base with a relative path. An absolute relative
/// value replaces the base outright.
pub(crate) fn join_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    let mut url = base.trim_end_matches('/').to_string();
    url.push('/');
    url.push_str(relative.trim_start_matches('/'));
    url
}

/// Appends an encoded query to a path. The separator depends on where `?`
/// sits: absent means `?`, trailing means nothing, anywhere else means `&`.
pub(crate) fn append_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let separator = match path.find('?') {
        None => "?",
        Some(index) if index == path.len() - 1 => "",
        Some(_) => "&",
    };
    format!("{}{}{}", path, separator, query)
}
