//! Byte-level markup reader used by the head scanner.
//!
//! Everything here works on positions into the scan buffer and never looks
//! past its end: when the closing `>` of an item has not arrived yet the
//! reader returns `None` and the caller retries once more bytes are in.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// `<name ...>`. `attrs` covers the bytes between the name and `>`.
    Open {
        name: Range<usize>,
        attrs: Range<usize>,
    },
    Close {
        name: Range<usize>,
    },
    Comment,
    /// Doctype, processing instruction or a `<` that does not start a tag.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: String,
    pub value: &'a [u8],
}

/// Reads the markup item starting at `buf[start]`, which must be `<`.
/// Returns the item and the offset just past it.
pub fn read_markup(buf: &[u8], start: usize) -> Option<(Markup, usize)> {
    debug_assert_eq!(buf.get(start), Some(&b'<'));
    let rest = &buf[start..];

    if rest.len() < 2 {
        return None;
    }

    if rest.starts_with(b"<!--") {
        let close = find(buf, b"-->", start + 4)?;
        return Some((Markup::Comment, close + 3));
    }
    if b"<!--".starts_with(rest) {
        return None;
    }

    match rest[1] {
        b'!' | b'?' => {
            let gt = find(buf, b">", start + 2)?;
            Some((Markup::Other, gt + 1))
        }
        b'/' => {
            let name = name_range(buf, start + 2);
            if name.end == buf.len() {
                return None;
            }
            let gt = find(buf, b">", name.end)?;
            Some((Markup::Close { name }, gt + 1))
        }
        b if b.is_ascii_alphabetic() => {
            let name = name_range(buf, start + 1);
            if name.end == buf.len() {
                return None;
            }
            let gt = find_tag_end(buf, name.end)?;
            Some((
                Markup::Open {
                    attrs: name.end..gt,
                    name,
                },
                gt + 1,
            ))
        }
        _ => Some((Markup::Other, start + 1)),
    }
}

/// Locates the `>` closing a start tag, skipping over quoted attribute values.
/// A quote only opens a value when it directly follows `=`, so stray
/// apostrophes in unquoted values do not derail the search.
pub fn find_tag_end(buf: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut last = 0u8;

    for (i, &b) in buf.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'>' => return Some(i),
            None if (b == b'"' || b == b'\'') && last == b'=' => quote = Some(b),
            None => {}
        }
        if !b.is_ascii_whitespace() {
            last = b;
        }
    }

    None
}

/// Parses `name=value` pairs out of the attribute section of a start tag.
/// Names are lower-cased; values are returned raw.
pub fn parse_attributes(attrs: &[u8]) -> Vec<Attribute<'_>> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < attrs.len() {
        while i < attrs.len() && (attrs[i].is_ascii_whitespace() || attrs[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < attrs.len()
            && !attrs[i].is_ascii_whitespace()
            && !matches!(attrs[i], b'=' | b'/' | b'>')
        {
            i += 1;
        }
        if i == name_start {
            // Stray `=`: skip it rather than loop forever.
            i += 1;
            continue;
        }
        let name = String::from_utf8_lossy(&attrs[name_start..i]).to_ascii_lowercase();

        while i < attrs.len() && attrs[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= attrs.len() || attrs[i] != b'=' {
            out.push(Attribute { name, value: &[] });
            continue;
        }
        i += 1;
        while i < attrs.len() && attrs[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match attrs.get(i) {
            Some(&q @ (b'"' | b'\'')) => {
                let start = i + 1;
                let end = attrs[start..]
                    .iter()
                    .position(|&b| b == q)
                    .map_or(attrs.len(), |p| start + p);
                i = (end + 1).min(attrs.len());
                &attrs[start..end]
            }
            _ => {
                let start = i;
                while i < attrs.len() && !attrs[i].is_ascii_whitespace() {
                    i += 1;
                }
                &attrs[start..i]
            }
        };

        out.push(Attribute { name, value });
    }

    out
}

/// Case-insensitive search for an ASCII `needle` starting at `from`.
pub fn find_ignore_case(buf: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() || needle.len() > buf.len() - from {
        return None;
    }
    buf[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| from + p)
}

fn find(buf: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() || needle.len() > buf.len() - from {
        return None;
    }
    buf[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn name_range(buf: &[u8], from: usize) -> Range<usize> {
    let len = buf[from.min(buf.len())..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_'))
        .count();
    from..from + len
}
