// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

/// A `Content-Type` header value with helpers for the parameters the
/// runtime cares about (charset, multipart boundary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    value: String,
}

impl ContentType {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn form() -> Self {
        Self::new("application/x-www-form-urlencoded;charset=utf-8")
    }

    pub fn multipart_form_data() -> Self {
        Self::new("multipart/form-data")
    }

    pub fn text_plain() -> Self {
        Self::new("text/plain;charset=utf-8")
    }

    pub fn octet_stream() -> Self {
        Self::new("application/octet-stream")
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Media type without parameters.
    pub fn mime(&self) -> &str {
        self.value
            .split(';')
            .next()
            .unwrap_or(&self.value)
            .trim()
    }

    /// Value of one `name=value` parameter, if present.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.value.split(';').skip(1).find_map(|part| {
            let (key, value) = part.split_once('=')?;
            if key.trim().eq_ignore_ascii_case(name) {
                Some(value.trim().trim_matches('"'))
            } else {
                None
            }
        })
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns a copy with `;name=value` appended.
    pub fn with_parameter(&self, name: &str, value: &str) -> Self {
        Self::new(format!("{};{}={}", self.value, name, value))
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_strips_parameters() {
        assert_eq!(ContentType::form().mime(), "application/x-www-form-urlencoded");
        assert_eq!(ContentType::new("text/html").mime(), "text/html");
    }

    #[test]
    fn parameters_are_case_insensitive_and_unquoted() {
        let ct = ContentType::new("multipart/form-data; Boundary=\"abc123\"");
        assert_eq!(ct.parameter("boundary"), Some("abc123"));
        assert_eq!(ContentType::form().charset(), Some("utf-8"));
    }

    #[test]
    fn with_parameter_appends() {
        let ct = ContentType::multipart_form_data().with_parameter("boundary", "xyz");
        assert_eq!(ct.value(), "multipart/form-data;boundary=xyz");
        assert_eq!(ct.parameter("boundary"), Some("xyz"));
    }
}
