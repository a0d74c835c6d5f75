// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::PathBuf;

use bytes::Bytes;
use uuid::Uuid;

use crate::content_type::ContentType;

/// Request payload. Built once by the request builder, immutable afterwards.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Raw {
        content_type: Option<ContentType>,
        data: Bytes,
    },
    Form(FormBody),
    Multipart(MultipartBody),
}

impl RequestBody {
    pub fn raw(content_type: Option<ContentType>, data: impl Into<Bytes>) -> Self {
        RequestBody::Raw {
            content_type,
            data: data.into(),
        }
    }

    pub fn empty() -> Self {
        RequestBody::Raw {
            content_type: None,
            data: Bytes::new(),
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        RequestBody::Raw {
            content_type: Some(ContentType::text_plain()),
            data: Bytes::from(data.into()),
        }
    }

    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            RequestBody::Raw { content_type, .. } => content_type.clone(),
            RequestBody::Form(_) => Some(ContentType::form()),
            RequestBody::Multipart(multipart) => Some(
                ContentType::multipart_form_data()
                    .with_parameter("boundary", multipart.boundary()),
            ),
        }
    }

    /// Byte length when known up front. `None` forces chunked framing.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            RequestBody::Raw { data, .. } => Some(data.len() as u64),
            RequestBody::Form(form) => Some(form.encode().len() as u64),
            RequestBody::Multipart(multipart) => multipart.content_length(),
        }
    }

    pub fn write_to(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        match self {
            RequestBody::Raw { data, .. } => writer.write_all(data),
            RequestBody::Form(form) => writer.write_all(form.encode().as_bytes()),
            RequestBody::Multipart(multipart) => multipart.write_to(writer),
        }
    }
}

/// `application/x-www-form-urlencoded` field list. Fields keep their
/// declaration order; the encode flag percent-encodes one pair.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    fields: Vec<FormField>,
}

#[derive(Debug, Clone)]
struct FormField {
    name: String,
    value: String,
    encoded: bool,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>, encoded: bool) {
        self.fields.push(FormField {
            name: name.into(),
            value: value.into(),
            encoded,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `name=value` pairs joined by `&`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            if !out.is_empty() {
                out.push('&');
            }
            if field.encoded {
                out.push_str(&urlencoding::encode(&field.name));
                out.push('=');
                out.push_str(&urlencoding::encode(&field.value));
            } else {
                out.push_str(&field.name);
                out.push('=');
                out.push_str(&field.value);
            }
        }
        out
    }
}

/// One named section of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<ContentType>,
    value: PartValue,
}

#[derive(Debug, Clone)]
enum PartValue {
    Text(String),
    Bytes(Bytes),
    File(PathBuf),
    Body(Box<RequestBody>),
}

impl Part {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            value: PartValue::Text(value.into()),
        }
    }

    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: Some(ContentType::octet_stream()),
            value: PartValue::Bytes(data.into()),
        }
    }

    /// The part's filename defaults to the path's final component.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            name: name.into(),
            filename,
            content_type: Some(ContentType::octet_stream()),
            value: PartValue::File(path),
        }
    }

    pub fn body(name: impl Into<String>, body: RequestBody) -> Self {
        let content_type = body.content_type();
        Self {
            name: name.into(),
            filename: None,
            content_type,
            value: PartValue::Body(Box::new(body)),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn header_block(&self) -> String {
        let mut block = String::new();
        block.push_str("Content-Disposition: form-data; name=\"");
        block.push_str(&self.name);
        block.push('"');
        if let Some(filename) = &self.filename {
            block.push_str("; filename=\"");
            block.push_str(filename);
            block.push('"');
        }
        block.push_str("\r\n");
        if let Some(content_type) = &self.content_type {
            block.push_str("Content-Type: ");
            block.push_str(content_type.value());
            block.push_str("\r\n");
        }
        if matches!(self.value, PartValue::Bytes(_) | PartValue::File(_)) {
            block.push_str("Content-Transfer-Encoding: binary\r\n");
        }
        if let Some(len) = self.value_length() {
            block.push_str(&format!("Content-Length: {}\r\n", len));
        }
        block.push_str("\r\n");
        block
    }

    fn value_length(&self) -> Option<u64> {
        match &self.value {
            PartValue::Text(text) => Some(text.len() as u64),
            PartValue::Bytes(data) => Some(data.len() as u64),
            PartValue::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            PartValue::Body(body) => body.content_length(),
        }
    }

    fn write_value(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        match &self.value {
            PartValue::Text(text) => writer.write_all(text.as_bytes()),
            PartValue::Bytes(data) => writer.write_all(data),
            PartValue::File(path) => {
                let mut file = std::fs::File::open(path)?;
                std::io::copy(&mut file, writer).map(|_| ())
            }
            PartValue::Body(body) => body.write_to(writer),
        }
    }
}

/// Boundary-delimited `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: Uuid::new_v4().simple().to_string(),
            parts: Vec::new(),
        }
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn add(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn content_length(&self) -> Option<u64> {
        let mut total = 0u64;
        for part in &self.parts {
            let value_len = part.value_length()?;
            // "--boundary\r\n" + headers + value + "\r\n"
            total += 2 + self.boundary.len() as u64 + 2;
            total += part.header_block().len() as u64;
            total += value_len + 2;
        }
        // "--boundary--\r\n"
        total += 2 + self.boundary.len() as u64 + 4;
        Some(total)
    }

    pub fn write_to(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        for part in &self.parts {
            write!(writer, "--{}\r\n", self.boundary)?;
            writer.write_all(part.header_block().as_bytes())?;
            part.write_value(writer)?;
            writer.write_all(b"\r\n")?;
        }
        write!(writer, "--{}--\r\n", self.boundary)?;
        Ok(())
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}
