//! Media type values

use std::fmt;

/// A `Content-Type` value, stored lowercased with surrounding spaces removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType(String);

impl ContentType {
    /// `application/octet-stream`
    pub const OCTET_STREAM: &'static str = "application/octet-stream";
    /// `application/x-www-form-urlencoded`
    pub const FORM: &'static str = "application/x-www-form-urlencoded";
    /// `application/json`
    pub const JSON: &'static str = "application/json";
    /// `text/plain; charset=utf-8`
    pub const TEXT_UTF8: &'static str = "text/plain; charset=utf-8";

    /// Parse a media type, normalizing case
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_ascii_lowercase())
    }

    /// Full value including parameters
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `type/subtype` part without parameters
    pub fn essence(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }

    /// Whether the essence equals `other`'s essence
    pub fn matches(&self, other: &str) -> bool {
        self.essence() == ContentType::new(other).essence()
    }

    /// The `charset` parameter, if any
    pub fn charset(&self) -> Option<&str> {
        self.0.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim() == "charset" {
                Some(value.trim().trim_matches('"'))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        ContentType::new(value)
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        ContentType::new(value)
    }
}
