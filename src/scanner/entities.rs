use std::borrow::Cow;

/// Longest reference we try to match, `&#x10FFFF;` included.
const MAX_REFERENCE_LEN: usize = 10;

/// Replaces XML/HTML character references with the characters they stand for.
///
/// Only well-formed references are consumed. Anything else, including a lone
/// `&` or a reference that never reaches its `;`, is copied through verbatim.
pub fn resolve_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        match decode_reference(candidate) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the reference at the start of `input` (which begins with `&`).
/// Returns the character and the number of bytes consumed, `;` included.
fn decode_reference(input: &str) -> Option<(char, usize)> {
    let window = &input.as_bytes()[..input.len().min(MAX_REFERENCE_LEN + 1)];
    let semi = window.iter().position(|&b| b == b';')?;
    let body = &input[1..semi];

    let ch = if let Some(numeric) = body.strip_prefix('#') {
        decode_numeric(numeric)?
    } else {
        named_entity(body)?
    };

    Some((ch, semi + 1))
}

fn decode_numeric(numeric: &str) -> Option<char> {
    let code = match numeric.strip_prefix(['x', 'X']) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !numeric.is_empty() && numeric.bytes().all(|b| b.is_ascii_digit()) => {
            numeric.parse().ok()?
        }
        None => return None,
    };

    if code == 0 {
        return None;
    }
    char::from_u32(code)
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
