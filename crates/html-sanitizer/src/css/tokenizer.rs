//! A lossy, normalizing CSS component-value tokenizer (§4.6). Unlike a
//! conforming CSS tokenizer it never errors: brackets left open are closed
//! at end of input, stray closers are dropped, and a handful of
//! markup-lookalike sequences (`<!--`, HTML comments) are treated as
//! whitespace rather than tokenized as CSS.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssToken {
    Ident(String),
    Function(String),
    AtKeyword(String),
    Hash(String),
    String(String),
    /// Already percent-encoded per the RFC 3986 unreserved set plus the
    /// extra characters §4.6 names (`: / ? # [ ] @ ! $ & + , ; = %`).
    Url(String),
    Number(String),
    Percentage(String),
    Dimension(String, String),
    Delim(char),
    Comma,
    Colon,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Whitespace,
}

/// Everything outside the RFC 3986 unreserved set, minus the extra
/// characters §4.6 lists as safe to leave bare inside `url(...)`.
const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

fn percent_encode_url(s: &str) -> String {
    utf8_percent_encode(s, URL_SAFE).to_string()
}

pub fn tokenize(input: &str) -> Vec<CssToken> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut out = Vec::new();
    let mut bracket_stack: Vec<CssToken> = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            while i < len && chars[i].is_whitespace() {
                i += 1;
            }
            push_whitespace(&mut out);
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(len);
            push_whitespace(&mut out);
            continue;
        }

        if matches_str(&chars, i, "<!--") {
            i += 4;
            push_whitespace(&mut out);
            continue;
        }
        if matches_str(&chars, i, "-->") {
            i += 3;
            push_whitespace(&mut out);
            continue;
        }

        if c == '\'' || c == '"' {
            let (s, next) = scan_string(&chars, i, c);
            out.push(CssToken::String(s));
            i = next;
            continue;
        }

        if c == '#' {
            let (name, next) = scan_ident_like(&chars, i + 1);
            if name.is_empty() {
                out.push(CssToken::Delim('#'));
                i += 1;
            } else {
                out.push(CssToken::Hash(name.to_ascii_lowercase()));
                i = next;
            }
            continue;
        }

        if c == '@' {
            let (name, next) = scan_ident_like(&chars, i + 1);
            if name.is_empty() {
                out.push(CssToken::Delim('@'));
                i += 1;
            } else {
                out.push(CssToken::AtKeyword(name.to_ascii_lowercase()));
                i = next;
            }
            continue;
        }

        if c.is_ascii_digit() || starts_number(&chars, i) {
            let (token, next) = scan_number(&chars, i);
            out.push(token);
            i = next;
            continue;
        }

        if is_ident_start(c) || c == '\\' {
            let (name, next) = scan_ident_like(&chars, i);
            if chars.get(next) == Some(&'(') {
                let lower = name.to_ascii_lowercase();
                if lower == "url" {
                    let (content, after) = scan_url_args(&chars, next + 1);
                    out.push(CssToken::Url(content));
                    i = after;
                } else {
                    out.push(CssToken::Function(lower.clone()));
                    bracket_stack.push(CssToken::Function(lower));
                    i = next + 1;
                }
            } else {
                out.push(CssToken::Ident(name.to_ascii_lowercase()));
                i = next;
            }
            continue;
        }

        match c {
            '(' => {
                out.push(CssToken::LeftParen);
                bracket_stack.push(CssToken::LeftParen);
                i += 1;
            }
            ')' => {
                if matches!(bracket_stack.last(), Some(CssToken::LeftParen) | Some(CssToken::Function(_))) {
                    bracket_stack.pop();
                    out.push(CssToken::RightParen);
                }
                i += 1;
            }
            '[' => {
                out.push(CssToken::LeftBracket);
                bracket_stack.push(CssToken::LeftBracket);
                i += 1;
            }
            ']' => {
                if matches!(bracket_stack.last(), Some(CssToken::LeftBracket)) {
                    bracket_stack.pop();
                    out.push(CssToken::RightBracket);
                }
                i += 1;
            }
            '{' => {
                out.push(CssToken::LeftBrace);
                bracket_stack.push(CssToken::LeftBrace);
                i += 1;
            }
            '}' => {
                if matches!(bracket_stack.last(), Some(CssToken::LeftBrace)) {
                    bracket_stack.pop();
                    out.push(CssToken::RightBrace);
                }
                i += 1;
            }
            ',' => {
                out.push(CssToken::Comma);
                i += 1;
            }
            ':' => {
                out.push(CssToken::Colon);
                i += 1;
            }
            ';' => {
                out.push(CssToken::Semicolon);
                i += 1;
            }
            _ => {
                out.push(CssToken::Delim(c));
                i += 1;
            }
        }
    }

    while let Some(open) = bracket_stack.pop() {
        out.push(match open {
            CssToken::LeftParen | CssToken::Function(_) => CssToken::RightParen,
            CssToken::LeftBracket => CssToken::RightBracket,
            CssToken::LeftBrace => CssToken::RightBrace,
            _ => continue,
        });
    }

    out
}

fn push_whitespace(out: &mut Vec<CssToken>) {
    if out.is_empty() || matches!(out.last(), Some(CssToken::Whitespace)) {
        return;
    }
    out.push(CssToken::Whitespace);
}

fn matches_str(chars: &[char], at: usize, s: &str) -> bool {
    let mut offset = 0;
    for expected in s.chars() {
        match chars.get(at + offset) {
            Some(c) if *c == expected => offset += 1,
            _ => return false,
        }
    }
    true
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

fn consume_escape(chars: &[char], backslash_at: usize) -> (Option<char>, usize) {
    let mut i = backslash_at + 1;
    if i >= chars.len() {
        return (None, i);
    }
    if chars[i].is_ascii_hexdigit() {
        let digits_start = i;
        while i < chars.len() && i - digits_start < 6 && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        let hex: String = chars[digits_start..i].iter().collect();
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        if i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        return (char::from_u32(code), i);
    }
    (Some(chars[i]), i + 1)
}

fn scan_ident_like(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut out = String::new();
    while i < chars.len() {
        if chars[i] == '\\' {
            let (c, next) = consume_escape(chars, i);
            if let Some(c) = c {
                out.push(c);
            }
            i = next;
        } else if is_ident_char(chars[i]) {
            out.push(chars[i]);
            i += 1;
        } else {
            break;
        }
    }
    (out, i)
}

fn scan_string(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut i = start + 1;
    let mut out = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            i += 1;
            break;
        }
        if c == '\n' {
            break;
        }
        if c == '\\' {
            if chars.get(i + 1) == Some(&'\n') {
                i += 2;
                continue;
            }
            let (decoded, next) = consume_escape(chars, i);
            if let Some(d) = decoded {
                out.push(d);
            }
            i = next;
            continue;
        }
        out.push(c);
        i += 1;
    }
    (out, i)
}

fn starts_number(chars: &[char], i: usize) -> bool {
    match chars[i] {
        '.' => chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()),
        '+' | '-' => match chars.get(i + 1) {
            Some(d) if d.is_ascii_digit() => true,
            Some('.') => chars.get(i + 2).is_some_and(|d| d.is_ascii_digit()),
            _ => false,
        },
        _ => false,
    }
}

fn scan_number(chars: &[char], start: usize) -> (CssToken, usize) {
    let mut i = start;
    if matches!(chars[i], '+' | '-') {
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+') | Some('-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
            while chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
                j += 1;
            }
            i = j;
        }
    }
    let number_text: String = chars[start..i].iter().collect();
    if chars.get(i) == Some(&'%') {
        return (CssToken::Percentage(number_text), i + 1);
    }
    if i < chars.len() && (is_ident_start(chars[i]) || chars[i] == '\\') {
        let (unit, next) = scan_ident_like(chars, i);
        return (CssToken::Dimension(number_text, unit.to_ascii_lowercase()), next);
    }
    (CssToken::Number(number_text), i)
}

/// Scans the argument of a `url(...)` token, which may be a quoted string
/// or a bare unquoted run up to the closing paren. Returns content already
/// percent-encoded per §4.6.
fn scan_url_args(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i], '\'' | '"') {
        let (content, after_str) = scan_string(chars, i, chars[i]);
        let mut j = after_str;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        let close = if j < chars.len() && chars[j] == ')' { j + 1 } else { j };
        return (percent_encode_url(&content), close);
    }
    let mut out = String::new();
    while i < chars.len() && chars[i] != ')' {
        if chars[i] == '\\' {
            let (c, next) = consume_escape(chars, i);
            if let Some(c) = c {
                out.push(c);
            }
            i = next;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    let close = if i < chars.len() { i + 1 } else { i };
    (percent_encode_url(out.trim()), close)
}

/// Hex-escapes control characters and `< > & " ' \` for safe single-quoted
/// re-serialization, matching the fixed escape table of §4.6.
pub fn escape_string_body(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\a "),
            '\x0c' => out.push_str("\\c "),
            '\r' => out.push_str("\\d "),
            '"' => out.push_str("\\22 "),
            '&' => out.push_str("\\26 "),
            '\'' => out.push_str("\\27 "),
            '<' => out.push_str("\\3c "),
            '>' => out.push_str("\\3e "),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0 "),
            c if (c as u32) < 0x20 && c != '\t' => {
                out.push('\\');
                out.push_str(&format!("{:x} ", c as u32));
            }
            _ => out.push(c),
        }
    }
    out
}
