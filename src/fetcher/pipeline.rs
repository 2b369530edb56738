use chrono::Utc;
use encoding_rs::Encoding;
use std::collections::BTreeMap;
use url::Url;

use crate::fetcher::{
    errors::FetchError,
    types::{ResponseHead, ScanResult},
};
use crate::scanner::{ScanBuffer, charset};

const DOCUMENT_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml"];

const IMAGE_PROPERTIES: [&str; 5] = [
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];

/// A missing content type is accepted; anything present must name an HTML
/// document.
pub fn accepts_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(content_type) => {
            let content_type = content_type.to_lowercase();
            DOCUMENT_CONTENT_TYPES
                .iter()
                .any(|accepted| content_type.contains(accepted))
        }
    }
}

/// Encoding announced by the response header, if it names one.
pub fn header_encoding(head: &ResponseHead) -> Option<&'static Encoding> {
    head.content_type
        .as_deref()
        .and_then(charset::encoding_from_content_type)
}

pub fn build_scan_result(head: &ResponseHead, buffer: ScanBuffer) -> Result<ScanResult, FetchError> {
    let truncated = buffer.reached_limit();
    let charset = buffer.encoding().name().to_string();
    let (entries, title) = buffer.into_parts();

    if entries.is_empty() && title.is_none() {
        return Err(FetchError::NoMetadata);
    }

    let resolved_url = head.url_final.clone();
    let mut properties = BTreeMap::new();
    let mut image_urls: Vec<Url> = Vec::new();

    for entry in entries {
        if IMAGE_PROPERTIES.contains(&entry.property.as_str())
            && let Some(image_url) = resolve_http_url(&resolved_url, &entry.content)
            && !image_urls.contains(&image_url)
        {
            image_urls.push(image_url);
        }
        properties.entry(entry.property).or_insert(entry.content);
    }

    let permanent_url = properties
        .get("og:url")
        .and_then(|declared| resolve_http_url(&resolved_url, declared))
        .unwrap_or_else(|| resolved_url.clone());

    Ok(ScanResult {
        resolved_url,
        permanent_url,
        properties,
        image_urls,
        title,
        charset,
        truncated,
        fetched_at: Utc::now(),
    })
}

fn resolve_http_url(base: &Url, value: &str) -> Option<Url> {
    let url = base.join(value).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
