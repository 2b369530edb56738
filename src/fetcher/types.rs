use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Identifies one transfer in the downloader's in-flight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the transport knows once the response header has arrived.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub url_final: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
}

/// Open Graph data scanned from the head of one document.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// URL after redirects.
    pub resolved_url: Url,
    /// Canonical URL declared by `og:url`, or the resolved URL.
    pub permanent_url: Url,
    /// Lower-cased property names to decoded values; the first occurrence wins.
    pub properties: BTreeMap<String, String>,
    /// Image URLs in document order; the first one is the primary image.
    pub image_urls: Vec<Url>,
    /// Text of the `<title>` element.
    pub title: Option<String>,
    pub charset: String,
    /// Set when the head never closed and the size bound cut the scan short.
    pub truncated: bool,
    pub fetched_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    /// Value of the first property in `properties` that is present.
    pub fn first_of(&self, properties: &[&str]) -> Option<&str> {
        properties.iter().find_map(|property| self.get(property))
    }

    /// The declared `og:type`, lower-cased.
    pub fn declared_type(&self) -> Option<String> {
        self.get("og:type").map(str::to_lowercase)
    }
}
