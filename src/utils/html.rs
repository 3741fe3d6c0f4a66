//! HTML entity helpers.
//!
//! `tl` hands out attribute values exactly as written in the document, so a
//! captured `href="/a?x=1&amp;y=2"` must be unescaped before it is resolved as
//! a URL, while the raw form is what appears in the text to be rewritten.

use std::borrow::Cow;

/// Raw value of attribute `key`, matched ASCII case-insensitively.
///
/// `tl` keeps attribute names as written, so `<A HREF="/a">` is only found
/// by comparing names. The value borrows from the parsed document; a value
/// that is not valid UTF-8 is skipped.
pub fn attr<'t>(tag: &'t tl::HTMLTag, key: &'static str) -> Option<&'t [u8]> {
    let attributes = tag.attributes();
    if let Some(value) = attributes.get(key).flatten() {
        return Some(value.as_bytes());
    }
    attributes.iter().find_map(|(name, value)| match value? {
        Cow::Borrowed(value) if name.eq_ignore_ascii_case(key) => Some(value.as_bytes()),
        _ => None,
    })
}

/// Decode named and numeric character references.
///
/// Unknown or malformed entities are kept verbatim.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        // Entities are short; anything longer is a bare ampersand
        let semi = after.find(';').filter(|&i| i > 0 && i <= 10);
        let Some(semi) = semi else {
            result.push('&');
            rest = after;
            continue;
        };

        let entity = &after[..semi];
        match decode_entity(entity) {
            Some(c) => result.push(c),
            None => {
                result.push('&');
                result.push_str(entity);
                result.push(';');
            }
        }
        rest = &after[semi + 1..];
    }
    result.push_str(rest);

    Cow::Owned(result)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse().ok(),
            };
            code.and_then(char::from_u32)
        }
    }
}
