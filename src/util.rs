//! Small helpers shared across modules.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding
/// 3. Falls back to Windows-1252 (common in legacy exports)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Upgrade a plain `http://` URL to `https://`.
///
/// The hosting platform refuses mixed content, and legacy series were often
/// authored before https was the norm.
pub fn upgrade_https(url: &str) -> String {
    let url = url.trim();
    match url.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => {
            format!("https://{}", &url[7..])
        }
        _ => url.to_string(),
    }
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Treat empty or whitespace-only strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_bom() {
        let bytes = b"\xEF\xBB\xBF{\"a\":1}";
        assert_eq!(decode_text(bytes, None), "{\"a\":1}");
    }

    #[test]
    fn test_decode_falls_back_to_cp1252() {
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte
        let bytes = b"caf\xE9";
        assert_eq!(decode_text(bytes, None), "café");
    }

    #[test]
    fn test_upgrade_https() {
        assert_eq!(upgrade_https("http://a.b/c.png"), "https://a.b/c.png");
        assert_eq!(upgrade_https("HTTP://a.b/"), "https://a.b/");
        assert_eq!(upgrade_https("https://a.b/"), "https://a.b/");
        assert_eq!(upgrade_https("//cdn/x.png"), "//cdn/x.png");
        assert_eq!(upgrade_https("http"), "http");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
