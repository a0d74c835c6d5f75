// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::OnceCell;

use crate::content_type::ContentType;

/// Case-insensitive header multimap. Insertion order is preserved per key,
/// lookups ignore ASCII case. The content type is derived from the last
/// `Content-Type` value seen and memoized until the map is mutated.
#[derive(Debug, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
    content_type: OnceCell<Option<ContentType>>,
}

impl Clone for Headers {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            content_type: OnceCell::new(),
        }
    }
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value for `name` with a single one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
        self.content_type = OnceCell::new();
    }

    /// Appends a value, keeping any existing ones for the same key.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
        self.content_type = OnceCell::new();
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.content_type = OnceCell::new();
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Last value for `name`, if any.
    pub fn get_last(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type
            .get_or_init(|| self.get_last("Content-Type").map(ContentType::new))
            .as_ref()
    }
}

impl std::fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in &self.entries {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case_and_preserve_order() {
        let mut headers = Headers::new();
        headers.set("X-Foo", "a");
        headers.add("x-foo", "b");
        assert_eq!(headers.get_all("X-FOO"), vec!["a", "b"]);
        assert_eq!(headers.get("x-Foo"), Some("a"));
        assert_eq!(headers.get_last("x-foo"), Some("b"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut headers = Headers::new();
        headers.add("Accept", "text/html");
        headers.add("accept", "application/json");
        headers.set("ACCEPT", "*/*");
        assert_eq!(headers.get_all("accept"), vec!["*/*"]);
    }

    #[test]
    fn remove_deletes_every_case_variant() {
        let mut headers = Headers::new();
        headers.add("Cookie", "a=1");
        headers.add("cookie", "b=2");
        headers.remove("COOKIE");
        assert!(!headers.contains("cookie"));
        assert!(headers.is_empty());
    }

    #[test]
    fn content_type_tracks_last_value_across_mutation() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.content_type().map(ContentType::mime), Some("text/plain"));
        headers.add("content-type", "application/json");
        assert_eq!(
            headers.content_type().map(ContentType::mime),
            Some("application/json")
        );
        headers.remove("content-type");
        assert!(headers.content_type().is_none());
    }
}
