// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Unified error type of the HTTP runtime.
///
/// Transport failures are mapped into one of the typed kinds instead of
/// leaking raw I/O errors; descriptor and converter problems surface as the
/// [`ConfigError`] and [`ConversionError`] families, which indicate
/// programming errors and are never retried.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("malformed url {url}: {source}")]
    UrlParse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to open connection for {url}: {message}")]
    OpenConnect { url: String, message: String },
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o failure sending request body to {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o failure reading response from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out talking to {url}")]
    TimeOut { url: String },
    #[error("http {code} error for url {url}")]
    Code { code: u16, url: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("http request failed for {url}: {message}")]
    Unknown { url: String, message: String },
}

/// Descriptor-compile-time and request-build-time programming errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("base url must be http or https, got: {0}")]
    InvalidBaseUrl(String),
    #[error("no service named {service} is registered")]
    UnknownService { service: String },
    #[error("service {service} declares no method named {method}")]
    UnknownMethod { service: String, method: String },
    #[error("check static header format (expected \"Name: value\") for {header:?} on {method}")]
    HeaderFormat { header: String, method: String },
    #[error("multipart methods must use POST, {method} declares {verb}")]
    MultipartRequiresPost { verb: String, method: String },
    #[error("a body parameter cannot be combined with field parameters on {method}")]
    BodyWithField { method: String },
    #[error("only one body parameter can be declared on {method}")]
    MultipleBodies { method: String },
    #[error("a body parameter cannot be declared on multipart method {method}")]
    BodyWithMultipart { method: String },
    #[error("field parameters are invalid on multipart method {method}, use parts")]
    FieldWithMultipart { method: String },
    #[error("part parameters require the multipart flag on {method}")]
    PartWithoutMultipart { method: String },
    #[error("path template of {method} has no {{{name}}} placeholder")]
    MissingPlaceholder { name: String, method: String },
    #[error("path parameters must not perform path traversal ('.' or '..'): {value:?} on {method}")]
    PathTraversal { value: String, method: String },
    #[error("{method} takes {expected} arguments, got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid argument #{index} of {method}: {message}")]
    Parameter {
        index: usize,
        method: String,
        message: String,
    },
}

/// Converter resolution and execution failures.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("no request body converter for type {type_name} on {method}")]
    NoRequestConverter {
        method: String,
        type_name: String,
    },
    #[error("no response body converter for type {type_name} on {method}")]
    NoResponseConverter {
        method: String,
        type_name: String,
    },
    #[error("response converter produced a value of the wrong type for {method} (expected {type_name})")]
    TypeMismatch {
        method: String,
        type_name: String,
    },
    #[error("converter failed on {method}: {message}")]
    Failed { method: String, message: String },
}
