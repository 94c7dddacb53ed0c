//! `decodeHtml` and the three-context output encoder of SPEC_FULL §4.4.

use unicode_normalization::UnicodeNormalization;

pub use entities::HtmlContext as DecodeContext;

/// Decodes named/numeric character references via the `entities` crate,
/// then elides any code unit outside the XML `Char` production that was
/// already present literally in the source (the `entities` crate only
/// excludes code points introduced *through* a numeric reference).
pub fn decode_html(ctx: &DecodeContext, input: &[u8]) -> Box<[u8]> {
    let decoded = entities::decode(ctx, input);
    strip_xml_excluded(&decoded)
}

fn strip_xml_excluded(input: &[u8]) -> Box<[u8]> {
    let text = String::from_utf8_lossy(input);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if !entities::is_xml_excluded_code_point(c as u32) {
            out.push(c);
        }
    }
    out.into_bytes().into_boxed_slice()
}

/// The three output contexts of §4.4, distinguished only by their `{{`
/// defeat replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeContext {
    Attribute,
    Rcdata,
    Pcdata,
}

fn brace_replacement(ctx: EncodeContext) -> &'static str {
    match ctx {
        EncodeContext::Attribute | EncodeContext::Rcdata => "{\u{200B}",
        EncodeContext::Pcdata => "{<!-- -->",
    }
}

pub fn encode_html_attrib_onto(input: &str, out: &mut String) {
    encode_onto(EncodeContext::Attribute, input, out);
}

pub fn encode_rcdata_onto(input: &str, out: &mut String) {
    encode_onto(EncodeContext::Rcdata, input, out);
}

pub fn encode_pcdata_onto(input: &str, out: &mut String) {
    encode_onto(EncodeContext::Pcdata, input, out);
}

pub fn encode_onto(ctx: EncodeContext, input: &str, out: &mut String) {
    let normalized = normalize_newlines(input);
    let chars: Vec<char> = normalized.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '{' && chars.get(i + 1) == Some(&'{') {
            out.push_str(brace_replacement(ctx));
            i += 1;
            continue;
        }
        encode_char(out, c);
        i += 1;
    }
}

fn encode_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' | '\'' | '+' | '=' | '@' | '`' => push_numeric(out, c),
        c if entities::is_xml_excluded_code_point(c as u32) => {}
        c if !c.is_ascii() && ((c as u32) > 0xFFFF || is_unicode_hazard(c)) => push_numeric(out, c),
        _ => out.push(c),
    }
}

fn push_numeric(out: &mut String, c: char) {
    out.push_str("&#");
    out.push_str(&(c as u32).to_string());
    out.push(';');
}

/// Whether `c`'s Unicode NFKD decomposition contains an ASCII syntax
/// character, meaning a downstream HTML/JS parser could mistake the
/// "plain text" character for a real delimiter once decomposed (fullwidth
/// and small-form variants, Greek letters that decompose to punctuation,
/// superscript operators, and a handful of letterlike symbols).
fn is_unicode_hazard(c: char) -> bool {
    matches!(
        c,
        '\u{37E}'
            | '\u{1FEF}'
            | '\u{207A}'
            | '\u{207C}'
            | '\u{2100}'
            | '\u{2101}'
            | '\u{2105}'
            | '\u{2106}'
            | '\u{FF01}'..='\u{FF5E}'
            | '\u{FE50}'..='\u{FE6F}'
    ) || c.nfkd().any(|d| d.is_ascii_punctuation() && d != c)
}

fn normalize_newlines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}
