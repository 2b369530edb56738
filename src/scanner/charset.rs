use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

/// Encoding named by the `charset` parameter of a `Content-Type` value, such
/// as the one in a response header or a `<meta http-equiv>` tag.
pub fn encoding_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let captures = CHARSET_REGEX.captures(content_type)?;
    encoding_for_label(captures.get(1)?.as_str())
}

pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().to_lowercase().as_bytes())
}

/// Decodes `bytes`, replacing malformed sequences instead of failing.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (decoded, _encoding, _had_errors) = encoding.decode(bytes);
    decoded.into_owned()
}
