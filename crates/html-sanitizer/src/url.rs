//! The URL protocol filter of SPEC_FULL §4.5.

use percent_encoding::{AsciiSet, CONTROLS};
use rustc_hash::FxHashSet;

/// Characters percent-encoded unconditionally, wherever they occur in the
/// value.
const ALWAYS_ENCODE: &AsciiSet = &CONTROLS.add(b'(').add(b')').add(b'{').add(b'}');

/// Colon lookalikes that, if left bare in scheme position, could be
/// misread by a downstream consumer as introducing a protocol.
const COLON_LOOKALIKES: [char; 4] = ['\u{0589}', '\u{05C3}', '\u{2236}', '\u{FF1A}'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPolicy {
    allowed_schemes: FxHashSet<Box<str>>,
}

impl UrlPolicy {
    pub fn new(allowed_schemes: impl IntoIterator<Item = impl Into<Box<str>>>) -> Self {
        Self {
            allowed_schemes: allowed_schemes.into_iter().map(|s| lowercase(&s.into())).collect(),
        }
    }

    fn allows_protocol_relative(&self) -> bool {
        self.allowed_schemes.contains("http") && self.allowed_schemes.contains("https")
    }

    /// Returns the normalized value if the URL's scheme (or its absence) is
    /// acceptable, or `None` if the value must be dropped.
    pub fn apply(&self, value: &str) -> Option<String> {
        let trimmed = trim_html_whitespace(value);

        let scheme_end = trimmed.find([':', '/', '#', '?']);
        match scheme_end {
            Some(i) if trimmed.as_bytes()[i] == b':' => {
                let scheme = lowercase(&trimmed[..i]);
                if !self.allowed_schemes.contains(scheme.as_str()) {
                    return None;
                }
            }
            _ => {
                if trimmed.starts_with("//") && !self.allows_protocol_relative() {
                    return None;
                }
            }
        }

        Some(normalize(trimmed, scheme_end))
    }
}

fn lowercase(s: &str) -> Box<str> {
    s.to_ascii_lowercase().into_boxed_str()
}

fn trim_html_whitespace(value: &str) -> &str {
    value.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c'))
}

/// Percent-encodes `( ) { }` everywhere, colon-lookalikes only while still
/// in scheme position (before the first `/ # ? :`), and any control
/// character (`<= U+0020`) everywhere.
fn normalize(value: &str, scheme_end: Option<usize>) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.char_indices() {
        let in_scheme_position = match scheme_end {
            Some(end) => i < end,
            None => true,
        };
        if in_scheme_position && COLON_LOOKALIKES.contains(&c) {
            percent_encode_char(&mut out, c);
            continue;
        }
        if (c as u32) <= 0x20 || (c.is_ascii() && ALWAYS_ENCODE.contains(c as u8)) {
            percent_encode_char(&mut out, c);
            continue;
        }
        out.push(c);
    }
    out
}

fn percent_encode_char(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).as_bytes() {
        out.push('%');
        out.push_str(&format!("{byte:02X}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_only() -> UrlPolicy {
        UrlPolicy::new(["http", "https"])
    }

    #[test]
    fn rejects_disallowed_scheme() {
        assert_eq!(http_only().apply("javascript:alert(1)"), None);
    }

    #[test]
    fn scheme_compared_case_insensitively_value_preserved() {
        assert_eq!(
            http_only().apply("HTTP://Example.COM/%41"),
            Some("HTTP://Example.COM/%41".to_string())
        );
    }

    #[test]
    fn protocol_relative_allowed_when_both_schemes_allowed() {
        assert_eq!(http_only().apply("//example.com/x"), Some("//example.com/x".to_string()));
    }

    #[test]
    fn protocol_relative_rejected_when_https_not_allowed() {
        let http_only_scheme = UrlPolicy::new(["http"]);
        assert_eq!(http_only_scheme.apply("//example.com/x"), None);
    }

    #[test]
    fn relative_path_with_no_scheme_is_allowed() {
        assert_eq!(http_only().apply("/a/b?c=1#d"), Some("/a/b?c=1#d".to_string()));
    }

    #[test]
    fn parens_and_braces_always_percent_encoded() {
        assert_eq!(http_only().apply("/a(b){c}"), Some("/a%28b%29%7Bc%7D".to_string()));
    }

    #[test]
    fn whitespace_is_trimmed_before_scheme_detection() {
        assert_eq!(
            http_only().apply("  http://x.example/  "),
            Some("http://x.example/".to_string())
        );
    }
}
