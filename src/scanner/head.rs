use encoding_rs::Encoding;
use serde::Serialize;

use crate::scanner::{
    charset,
    entities::resolve_entities,
    tag::{self, Attribute, Markup},
};

/// Upper bound on buffered bytes before the head is considered complete.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 256 * 1024;

/// Elements whose content is raw text and may legally contain `<` or `>`.
const RAW_TEXT_ELEMENTS: [&[u8]; 4] = [b"title", b"script", b"style", b"noscript"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadState {
    OutsideHead,
    InsideHead,
    Complete,
}

/// A `(property, content)` pair read from a `<meta>` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEntry {
    pub property: String,
    pub content: String,
}

/// Accumulates the body of one transfer and scans it for the document head.
///
/// Feed it with [`ScanBuffer::append`] as chunks arrive. The scan resumes from
/// the last fully consumed tag, so a tag, attribute value or entity split
/// across chunks is only interpreted once all of it has arrived.
#[derive(Debug)]
pub struct ScanBuffer {
    bytes: Vec<u8>,
    cursor: usize,
    state: HeadState,
    head_start: Option<usize>,
    head: Option<String>,
    title: Option<String>,
    entries: Vec<MetaEntry>,
    encoding: &'static Encoding,
    /// Set when the transport named the charset; in-document declarations
    /// are then ignored.
    encoding_fixed: bool,
    max_bytes: usize,
    reached_limit: bool,
}

impl ScanBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cursor: 0,
            state: HeadState::OutsideHead,
            head_start: None,
            head: None,
            title: None,
            entries: Vec::new(),
            encoding: encoding_rs::UTF_8,
            encoding_fixed: false,
            max_bytes,
            reached_limit: false,
        }
    }

    /// Decodes with `encoding`, the charset announced by the response header.
    /// It takes precedence over `<meta charset>` and `http-equiv` tags.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self.encoding_fixed = true;
        self
    }

    /// Appends a chunk and scans as far as the buffered bytes allow.
    /// Once the head is complete further chunks are ignored.
    pub fn append(&mut self, chunk: &[u8]) -> HeadState {
        if self.is_complete() {
            return self.state;
        }

        let room = self.max_bytes.saturating_sub(self.bytes.len());
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
        self.scan();

        if !self.is_complete() && self.bytes.len() >= self.max_bytes {
            self.reached_limit = true;
            self.complete_at(self.bytes.len());
        }

        self.state
    }

    /// Ends the scan with whatever has been collected, for bodies that end
    /// before the head is closed.
    pub fn finish(&mut self) {
        if !self.is_complete() {
            self.complete_at(self.bytes.len());
        }
    }

    pub fn state(&self) -> HeadState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == HeadState::Complete
    }

    /// True when completion was forced by the size bound rather than by markup.
    pub fn reached_limit(&self) -> bool {
        self.reached_limit
    }

    /// Text of the head section. `None` until the head is complete.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn entries(&self) -> &[MetaEntry] {
        &self.entries
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn into_parts(self) -> (Vec<MetaEntry>, Option<String>) {
        (self.entries, self.title)
    }

    fn scan(&mut self) {
        while !self.is_complete() {
            let Some(offset) = self.bytes[self.cursor..].iter().position(|&b| b == b'<') else {
                self.cursor = self.bytes.len();
                return;
            };
            let lt = self.cursor + offset;

            let Some((markup, end)) = tag::read_markup(&self.bytes, lt) else {
                self.cursor = lt;
                return;
            };

            match markup {
                Markup::Open { name, attrs } => {
                    let name = self.bytes[name].to_ascii_lowercase();
                    match name.as_slice() {
                        b"head" => self.open_head(end),
                        b"body" => {
                            self.complete_at(lt);
                            return;
                        }
                        b"meta" => {
                            self.open_head(lt);
                            self.record_meta(attrs.start, attrs.end);
                        }
                        raw if RAW_TEXT_ELEMENTS.iter().any(|element| *element == raw) => {
                            let Some((content_end, element_end)) = self.find_element_end(raw, end)
                            else {
                                self.cursor = lt;
                                return;
                            };
                            if raw == b"title" && self.title.is_none() {
                                self.record_title(end, content_end);
                            }
                            self.cursor = element_end;
                            continue;
                        }
                        _ => {}
                    }
                }
                Markup::Close { name } => {
                    if self.bytes[name].eq_ignore_ascii_case(b"head") {
                        self.complete_at(lt);
                        return;
                    }
                }
                Markup::Comment | Markup::Other => {}
            }

            self.cursor = end;
        }
    }

    fn open_head(&mut self, at: usize) {
        if self.state == HeadState::OutsideHead {
            self.state = HeadState::InsideHead;
            self.head_start = Some(at);
        }
    }

    /// Finds the closing tag of a raw text element whose content starts at
    /// `from`. Returns where the content ends and where the closing tag ends.
    fn find_element_end(&self, name: &[u8], from: usize) -> Option<(usize, usize)> {
        let mut closing = Vec::with_capacity(name.len() + 2);
        closing.extend_from_slice(b"</");
        closing.extend_from_slice(name);

        let content_end = tag::find_ignore_case(&self.bytes, &closing, from)?;
        let gt = self.bytes[content_end..].iter().position(|&b| b == b'>')?;
        Some((content_end, content_end + gt + 1))
    }

    fn record_title(&mut self, start: usize, end: usize) {
        let raw = charset::decode(&self.bytes[start..end], self.encoding);
        let title = resolve_entities(&raw)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !title.is_empty() {
            self.title = Some(title);
        }
    }

    fn record_meta(&mut self, start: usize, end: usize) {
        let attrs = tag::parse_attributes(&self.bytes[start..end]);
        let encoding = self.encoding;

        if let Some(switched) = declared_encoding(&attrs, encoding) {
            if !self.encoding_fixed {
                self.encoding = switched;
            }
            return;
        }

        let key = attr(&attrs, "property").or_else(|| {
            attr(&attrs, "name").filter(|name| {
                name.contains(&b':') || name.eq_ignore_ascii_case(b"description")
            })
        });
        let (Some(key), Some(content)) = (key, attr(&attrs, "content")) else {
            return;
        };

        let property = charset::decode(key, encoding).trim().to_lowercase();
        let content = resolve_entities(&charset::decode(content, encoding))
            .trim()
            .to_string();
        if property.is_empty() || content.is_empty() {
            return;
        }

        self.entries.push(MetaEntry { property, content });
    }

    fn complete_at(&mut self, end: usize) {
        let start = self.head_start.unwrap_or(end).min(end);
        self.head = Some(charset::decode(&self.bytes[start..end], self.encoding));
        self.state = HeadState::Complete;
        self.cursor = end;

        // Nothing reads the raw bytes past this point.
        self.bytes = Vec::new();
    }
}

fn attr<'a>(attrs: &[Attribute<'a>], name: &str) -> Option<&'a [u8]> {
    attrs.iter().find(|a| a.name == name).map(|a| a.value)
}

/// Encoding declared by `<meta charset>` or `<meta http-equiv="content-type">`.
fn declared_encoding(
    attrs: &[Attribute<'_>],
    current: &'static Encoding,
) -> Option<&'static Encoding> {
    if let Some(label) = attr(attrs, "charset") {
        return charset::encoding_for_label(&charset::decode(label, current));
    }

    let http_equiv = attr(attrs, "http-equiv")?;
    if !http_equiv.eq_ignore_ascii_case(b"content-type") {
        return None;
    }
    let content = attr(attrs, "content")?;
    charset::encoding_from_content_type(&charset::decode(content, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
        "<meta charset=\"utf-8\">\n",
        "<!-- <meta property=\"og:title\" content=\"commented out\"> -->\n",
        "<title>Tom &amp; Jerry   \n  | Site</title>\n",
        "<script>if (a < b && c > d) { document.write('</head>'.slice(0)); }</script>\n",
        "<meta property=\"og:title\" content=\"Tom &amp; Jerry &#8364;\" />\n",
        "<meta content='An &quot;epic&quot; chase > everything' property='og:description'>\n",
        "<meta name=\"twitter:creator\" content=\"@tom\">\n",
        "<meta name=\"viewport\" content=\"width=device-width\">\n",
        "<meta property=\"og:image\" content=\"https://example.com/a.jpg\">\n",
        "<meta property=\"og:image\" content=\"https://example.com/b.jpg\">\n",
        "</head>\n<body><meta property=\"og:title\" content=\"in body\"></body></html>",
    );

    fn scan_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> ScanBuffer {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        for chunk in chunks {
            buffer.append(chunk);
        }
        buffer
    }

    fn pairs(buffer: &ScanBuffer) -> Vec<(&str, &str)> {
        buffer
            .entries()
            .iter()
            .map(|e| (e.property.as_str(), e.content.as_str()))
            .collect()
    }

    #[test]
    fn test_extracts_meta_entries_from_head() {
        let buffer = scan_chunks([PAGE.as_bytes()]);

        assert!(buffer.is_complete());
        assert!(!buffer.reached_limit());
        assert_eq!(
            pairs(&buffer),
            vec![
                ("og:title", "Tom & Jerry €"),
                ("og:description", "An \"epic\" chase > everything"),
                ("twitter:creator", "@tom"),
                ("og:image", "https://example.com/a.jpg"),
                ("og:image", "https://example.com/b.jpg"),
            ]
        );
        assert_eq!(buffer.title(), Some("Tom & Jerry | Site"));
    }

    #[test]
    fn test_head_text_stops_at_closing_tag() {
        let buffer = scan_chunks([PAGE.as_bytes()]);
        let head = buffer.head().unwrap();

        assert!(head.starts_with("\n<meta charset"));
        assert!(head.trim_end().ends_with("b.jpg\">"));
        assert!(!head.contains("<body>"));
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let whole = scan_chunks([PAGE.as_bytes()]);
        let bytes = PAGE.as_bytes();

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            let parts = scan_chunks([a, b]);
            assert_eq!(parts.entries(), whole.entries(), "split at {split}");
            assert_eq!(parts.title(), whole.title(), "split at {split}");
            assert_eq!(parts.head(), whole.head(), "split at {split}");
        }

        let single_bytes = scan_chunks(bytes.chunks(1));
        assert_eq!(single_bytes.entries(), whole.entries());
        assert_eq!(single_bytes.head(), whole.head());
    }

    #[test]
    fn test_head_not_complete_before_closing_tag() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        let state = buffer.append(b"<html><head><meta property=\"og:title\" content=\"x\">");

        assert_eq!(state, HeadState::InsideHead);
        assert_eq!(buffer.head(), None);
        assert_eq!(buffer.entries().len(), 1);

        assert_eq!(buffer.append(b"</he"), HeadState::InsideHead);
        assert_eq!(buffer.append(b"ad>"), HeadState::Complete);
    }

    #[test]
    fn test_complete_is_final() {
        let mut buffer = scan_chunks([PAGE.as_bytes()]);
        let head = buffer.head().map(str::to_owned);
        let entries = buffer.entries().to_vec();

        let state = buffer.append(b"<head><meta property=\"og:type\" content=\"x\"></head>");
        buffer.finish();

        assert_eq!(state, HeadState::Complete);
        assert_eq!(buffer.head().map(str::to_owned), head);
        assert_eq!(buffer.entries(), entries.as_slice());
    }

    #[test]
    fn test_header_tag_is_not_head() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<header>nav</header>");
        assert_eq!(buffer.state(), HeadState::OutsideHead);
    }

    #[test]
    fn test_body_tag_closes_head() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<head><meta property=\"og:title\" content=\"Open\"><body><p>hi");
        assert!(buffer.is_complete());
        assert_eq!(pairs(&buffer), vec![("og:title", "Open")]);
    }

    #[test]
    fn test_meta_without_head_tag_opens_head() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<html><meta property=\"og:title\" content=\"Implicit\"></head>");
        assert!(buffer.is_complete());
        assert_eq!(pairs(&buffer), vec![("og:title", "Implicit")]);
        assert!(buffer.head().unwrap().starts_with("<meta"));
    }

    #[test]
    fn test_size_bound_forces_completion() {
        let mut buffer = ScanBuffer::new(64);
        buffer.append(b"<head><meta property=\"og:title\" content=\"kept\">");
        assert!(!buffer.is_complete());

        buffer.append(&[b' '; 100]);
        assert!(buffer.is_complete());
        assert!(buffer.reached_limit());
        assert_eq!(pairs(&buffer), vec![("og:title", "kept")]);
        assert_eq!(buffer.head().unwrap().len(), 64 - "<head>".len());
    }

    #[test]
    fn test_finish_without_head_close() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<head><meta property=\"og:title\" content=\"short\"><meta prop");
        buffer.finish();

        assert!(buffer.is_complete());
        assert!(!buffer.reached_limit());
        assert_eq!(pairs(&buffer), vec![("og:title", "short")]);
    }

    #[test]
    fn test_meta_charset_switches_encoding() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<head><meta charset=\"iso-8859-1\"><meta property=\"og:title\" content=\"Caf\xe9\"></head>");

        assert_eq!(buffer.encoding(), encoding_rs::WINDOWS_1252);
        assert_eq!(pairs(&buffer), vec![("og:title", "Café")]);
    }

    #[test]
    fn test_http_equiv_switches_encoding() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(
            b"<head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"><title>\x80</title></head>",
        );

        assert_eq!(buffer.title(), Some("€"));
        assert!(buffer.entries().is_empty());
    }

    #[test]
    fn test_header_encoding_beats_meta_charset() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES).with_encoding(encoding_rs::UTF_8);
        buffer.append(
            "<head><meta charset=\"iso-8859-1\"><meta property=\"og:title\" content=\"Café\"></head>"
                .as_bytes(),
        );

        assert_eq!(buffer.encoding(), encoding_rs::UTF_8);
        assert_eq!(pairs(&buffer), vec![("og:title", "Café")]);

        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES).with_encoding(encoding_rs::WINDOWS_1252);
        buffer.append(
            b"<head><meta http-equiv=\"content-type\" content=\"text/html; charset=utf-8\"><title>\x80</title></head>",
        );
        assert_eq!(buffer.title(), Some("€"));
    }

    #[test]
    fn test_header_encoding_is_used() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES).with_encoding(encoding_rs::WINDOWS_1252);
        buffer.append(b"<head><meta property=\"og:title\" content=\"\xe9t\xe9\"></head>");
        assert_eq!(pairs(&buffer), vec![("og:title", "été")]);
    }

    #[test]
    fn test_meta_without_content_or_key_is_skipped() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(concat!(
            "<head>",
            "<meta property=\"og:title\">",
            "<meta content=\"orphan\">",
            "<meta name=\"keywords\" content=\"a,b\">",
            "<meta name=\"Description\" content=\"plain description\">",
            "<meta property=\"OG:Site_Name\" content=\" Example \">",
            "<meta property=\"og:url\" content=\"   \">",
            "</head>"
        ).as_bytes());

        assert_eq!(
            pairs(&buffer),
            vec![
                ("description", "plain description"),
                ("og:site_name", "Example"),
            ]
        );
    }

    #[test]
    fn test_unterminated_script_waits_for_more_data() {
        let mut buffer = ScanBuffer::new(DEFAULT_MAX_HEAD_BYTES);
        buffer.append(b"<head><script>var s = '</head>'");
        // `</head>` inside a script element is text, the element is still open.
        assert!(!buffer.is_complete());

        buffer.append(b";</script><meta property=\"og:type\" content=\"article\"></head>");
        assert!(buffer.is_complete());
        assert_eq!(pairs(&buffer), vec![("og:type", "article")]);
    }

    #[cfg(feature = "fuzz")]
    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_append_never_panics(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
                let mut buffer = ScanBuffer::new(1024);
                buffer.append(&data);
                buffer.finish();
                prop_assert!(buffer.is_complete());
            }

            #[test]
            fn test_chunking_does_not_change_entries(
                splits in proptest::collection::vec(0..PAGE.len(), 0..8)
            ) {
                let mut splits = splits;
                splits.sort_unstable();
                splits.dedup();

                let bytes = PAGE.as_bytes();
                let mut chunks = Vec::new();
                let mut start = 0;
                for split in splits {
                    chunks.push(&bytes[start..split]);
                    start = split;
                }
                chunks.push(&bytes[start..]);

                let whole = scan_chunks([bytes]);
                let pieces = scan_chunks(chunks);
                prop_assert_eq!(pairs(&whole), pairs(&pieces));
                prop_assert_eq!(whole.title(), pieces.title());
            }
        }
    }
}
