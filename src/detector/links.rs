use linkify::{LinkFinder, LinkKind};
use std::ops::Range;
use url::Url;

/// Suffixes that make a scheme-less `name.suffix` a file name rather than a
/// host. Hosts starting with `www.` are accepted regardless.
const FILE_EXTENSIONS: [&str; 48] = [
    "bak", "c", "cfg", "conf", "cpp", "css", "csv", "db", "dll", "doc", "docx", "exe", "gif",
    "go", "gz", "h", "htm", "html", "ini", "java", "jpeg", "jpg", "js", "json", "kt", "lock",
    "log", "md", "mov", "mp3", "mp4", "pdf", "php", "png", "ppt", "py", "rb", "rs", "sh", "sql",
    "svg", "swift", "tar", "toml", "ts", "txt", "xml", "zip",
];

/// A URL found in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLink {
    /// Absolute URL to fetch. Scheme-less matches get `http://`.
    pub url: Url,
    /// The URL exactly as written in the text.
    pub original: String,
    /// Byte range of `original` in the text.
    pub range: Range<usize>,
    /// Offset of `original` in the text, in Unicode scalar values.
    pub offset: usize,
    /// Offset of `original` in the text, in UTF-16 code units. Differs from
    /// `offset` when the text before the link holds characters outside the
    /// Basic Multilingual Plane, such as most emoji.
    pub utf16_offset: usize,
}

/// All http(s) links in `text`, in order of appearance.
pub fn detect_links(text: &str) -> Vec<DetectedLink> {
    detect_links_filtered(text, |_, _, _| true)
}

/// Like [`detect_links`], with `filter` able to veto individual matches. It
/// receives the parsed URL, its byte range and the whole text.
pub fn detect_links_filtered<F>(text: &str, filter: F) -> Vec<DetectedLink>
where
    F: Fn(&Url, Range<usize>, &str) -> bool,
{
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);
    finder.url_must_have_scheme(false);

    finder
        .links(text)
        .filter_map(|link| {
            let url = parse_link(link.as_str())?;
            let prefix = &text[..link.start()];
            let range = link.start()..link.end();
            if !filter(&url, range.clone(), text) {
                return None;
            }
            Some(DetectedLink {
                url,
                original: link.as_str().to_string(),
                offset: prefix.chars().count(),
                utf16_offset: prefix.encode_utf16().count(),
                range,
            })
        })
        .collect()
}

fn parse_link(raw: &str) -> Option<Url> {
    if raw.contains("://") {
        let url = Url::parse(raw).ok()?;
        return matches!(url.scheme(), "http" | "https").then_some(url);
    }

    let url = Url::parse(&format!("http://{raw}")).ok()?;
    looks_like_host(url.host_str()?).then_some(url)
}

/// Whether a host found without a scheme is plausibly a web host and not a
/// file name like `notes.txt` or `main.rs`.
fn looks_like_host(host: &str) -> bool {
    if host.starts_with("www.") {
        return true;
    }
    let Some((_, suffix)) = host.rsplit_once('.') else {
        return false;
    };
    if suffix.starts_with("xn--") {
        return true;
    }
    suffix.len() >= 2
        && suffix.bytes().all(|b| b.is_ascii_alphabetic())
        && !FILE_EXTENSIONS.contains(&suffix)
}
