//! The CSS styling policy of §4.6: a per-property whitelist schema applied
//! to a `style` attribute's tokenized value.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::tokenizer::{escape_string_body, tokenize, CssToken};
use crate::error::PolicyBuildError;

pub mod bits {
    pub const UNRESERVED_WORD: u16 = 1 << 0;
    pub const URL: u16 = 1 << 1;
    pub const QUANTITY: u16 = 1 << 2;
    pub const NEGATIVE: u16 = 1 << 3;
    pub const STRING: u16 = 1 << 4;
    pub const HASH_VALUE: u16 = 1 << 5;
}

/// What a property's value is allowed to contain: a bitmask of token
/// kinds, a fixed set of allowed keyword literals, and a map of allowed
/// function names to the sub-schema governing their arguments (e.g.
/// `rgb(...)`).
#[derive(Clone, Default)]
pub struct PropertySchema {
    pub bits: u16,
    pub literals: FxHashSet<Box<str>>,
    pub fn_keys: FxHashMap<Box<str>, PropertySchema>,
}

impl PropertySchema {
    pub fn new(bits: u16) -> Self {
        Self {
            bits,
            literals: FxHashSet::default(),
            fn_keys: FxHashMap::default(),
        }
    }

    pub fn with_literals(mut self, literals: impl IntoIterator<Item = impl Into<Box<str>>>) -> Self {
        self.literals = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_function(mut self, name: &str, sub_schema: PropertySchema) -> Self {
        self.fn_keys.insert(name.into(), sub_schema);
        self
    }
}

type UrlRewriter = dyn Fn(&str) -> Option<String> + Send + Sync;

pub struct StylingPolicy {
    properties: FxHashMap<Box<str>, PropertySchema>,
    url_rewriter: Arc<UrlRewriter>,
}

impl StylingPolicy {
    pub fn builder(url_rewriter: Arc<UrlRewriter>) -> StylingPolicyBuilder {
        StylingPolicyBuilder {
            properties: FxHashMap::default(),
            url_rewriter,
        }
    }

    /// Filters a `style` attribute's full value, one declaration at a
    /// time. A property with no schema entry is dropped entirely; a
    /// property whose value has nothing left after filtering is rewound
    /// and discarded along with its heading (§4.6).
    pub fn apply(&self, style_value: &str) -> String {
        let tokens = tokenize(style_value);
        let declarations = split_declarations(&tokens);

        let mut kept = Vec::new();
        for decl in declarations {
            if let Some(rendered) = self.filter_declaration(decl) {
                kept.push(rendered);
            }
        }
        guard_against_markup_lookalikes(&kept.join("; "))
    }

    fn filter_declaration(&self, decl: &[CssToken]) -> Option<String> {
        let mut idx = skip_whitespace(decl, 0);
        let CssToken::Ident(prop) = decl.get(idx)? else {
            return None;
        };
        let prop_lower = prop.to_ascii_lowercase();
        idx += 1;
        idx = skip_whitespace(decl, idx);
        if decl.get(idx) != Some(&CssToken::Colon) {
            return None;
        }
        idx += 1;

        let schema = self.properties.get(prop_lower.as_str())?;
        let value_tokens = &decl[idx..];
        let filtered = filter_tokens(value_tokens, schema, self.url_rewriter.as_ref());
        let has_content = filtered
            .iter()
            .any(|t| !matches!(t, CssToken::Whitespace | CssToken::Comma));
        if !has_content {
            return None;
        }

        let value = render_tokens(&hoist_string_runs(filtered, schema));
        Some(format!("{prop_lower}:{}", value.trim()))
    }
}

pub struct StylingPolicyBuilder {
    properties: FxHashMap<Box<str>, PropertySchema>,
    url_rewriter: Arc<UrlRewriter>,
}

impl StylingPolicyBuilder {
    pub fn allow_property(&mut self, name: &str, schema: PropertySchema) -> &mut Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Like [`Self::allow_property`], but fails if `name` is already
    /// registered rather than silently overwriting it.
    pub fn try_define_property(&mut self, name: &str, schema: PropertySchema) -> Result<&mut Self, PolicyBuildError> {
        if self.properties.contains_key(name) {
            return Err(PolicyBuildError::DuplicateCssSchema { property: name.to_string() });
        }
        self.properties.insert(name.into(), schema);
        Ok(self)
    }

    pub fn build(self) -> StylingPolicy {
        StylingPolicy {
            properties: self.properties,
            url_rewriter: self.url_rewriter,
        }
    }
}

fn skip_whitespace(tokens: &[CssToken], mut idx: usize) -> usize {
    while matches!(tokens.get(idx), Some(CssToken::Whitespace)) {
        idx += 1;
    }
    idx
}

fn split_declarations(tokens: &[CssToken]) -> Vec<&[CssToken]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate() {
        match t {
            CssToken::LeftParen | CssToken::LeftBracket | CssToken::LeftBrace | CssToken::Function(_) => depth += 1,
            CssToken::RightParen | CssToken::RightBracket | CssToken::RightBrace => depth -= 1,
            CssToken::Semicolon if depth == 0 => {
                out.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        out.push(&tokens[start..]);
    }
    out
}

fn find_matching_paren(tokens: &[CssToken], open_index: usize) -> usize {
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate().skip(open_index) {
        match t {
            CssToken::Function(_) | CssToken::LeftParen => depth += 1,
            CssToken::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len().saturating_sub(1)
}

fn matches_leaf(token: &CssToken, schema: &PropertySchema, rewriter: &UrlRewriter) -> Option<CssToken> {
    match token {
        CssToken::Ident(name) => {
            if schema.literals.contains(name.as_str()) || schema.bits & bits::UNRESERVED_WORD != 0 {
                Some(token.clone())
            } else {
                None
            }
        }
        CssToken::Number(n) if schema.bits & bits::QUANTITY != 0 => {
            if n.starts_with('-') && schema.bits & bits::NEGATIVE == 0 {
                None
            } else {
                Some(token.clone())
            }
        }
        CssToken::Percentage(_) | CssToken::Dimension(_, _) if schema.bits & bits::QUANTITY != 0 => Some(token.clone()),
        CssToken::String(_) if schema.bits & bits::STRING != 0 => Some(token.clone()),
        CssToken::Hash(_) if schema.bits & bits::HASH_VALUE != 0 => Some(token.clone()),
        CssToken::Url(content) if schema.bits & bits::URL != 0 => rewriter(content).map(CssToken::Url),
        CssToken::Comma | CssToken::Colon | CssToken::Whitespace => Some(token.clone()),
        _ => None,
    }
}

fn filter_tokens(tokens: &[CssToken], schema: &PropertySchema, rewriter: &UrlRewriter) -> Vec<CssToken> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CssToken::Function(name) => {
                let close = find_matching_paren(tokens, i);
                if let Some(sub_schema) = schema.fn_keys.get(name.as_str()) {
                    let inner = filter_tokens(&tokens[i + 1..close], sub_schema, rewriter);
                    let has_content = inner.iter().any(|t| !matches!(t, CssToken::Whitespace | CssToken::Comma));
                    if has_content {
                        out.push(CssToken::Function(name.clone()));
                        out.extend(inner);
                        out.push(CssToken::RightParen);
                    }
                }
                i = close + 1;
            }
            other => {
                if let Some(kept) = matches_leaf(other, schema, rewriter) {
                    out.push(kept);
                }
                i += 1;
            }
        }
    }
    trim_structural_edges(out)
}

fn trim_structural_edges(mut tokens: Vec<CssToken>) -> Vec<CssToken> {
    while matches!(tokens.first(), Some(CssToken::Whitespace) | Some(CssToken::Comma)) {
        tokens.remove(0);
    }
    while matches!(tokens.last(), Some(CssToken::Whitespace) | Some(CssToken::Comma)) {
        tokens.pop();
    }
    tokens
}

/// Consecutive allowed identifiers in a string-accepting property are
/// hoisted into a single quoted string (§4.6), e.g. an unquoted
/// `font-family: Arial Black` becomes `'Arial Black'`.
fn hoist_string_runs(tokens: Vec<CssToken>, schema: &PropertySchema) -> Vec<CssToken> {
    if schema.bits & bits::STRING == 0 {
        return tokens;
    }
    let mut out = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let flush = |run: &mut Vec<String>, out: &mut Vec<CssToken>| {
        if run.len() > 1 {
            out.push(CssToken::String(run.join(" ")));
        } else if let Some(word) = run.pop() {
            out.push(CssToken::Ident(word));
        }
        run.clear();
    };
    for token in tokens {
        match token {
            CssToken::Ident(word) if !schema.literals.contains(word.as_str()) => run.push(word),
            CssToken::Whitespace if !run.is_empty() => continue,
            other => {
                flush(&mut run, &mut out);
                out.push(other);
            }
        }
    }
    flush(&mut run, &mut out);
    out
}

fn render_tokens(tokens: &[CssToken]) -> String {
    let mut out = String::new();
    for t in tokens {
        match t {
            CssToken::Ident(s) => out.push_str(s),
            CssToken::Function(s) => {
                out.push_str(s);
                out.push('(');
            }
            CssToken::AtKeyword(s) => {
                out.push('@');
                out.push_str(s);
            }
            CssToken::Hash(s) => {
                out.push('#');
                out.push_str(s);
            }
            CssToken::String(s) => {
                out.push('\'');
                out.push_str(&escape_string_body(s));
                out.push('\'');
            }
            CssToken::Url(s) => {
                out.push_str("url('");
                out.push_str(s);
                out.push_str("')");
            }
            CssToken::Number(s) => out.push_str(s),
            CssToken::Percentage(s) => {
                out.push_str(s);
                out.push('%');
            }
            CssToken::Dimension(v, u) => {
                out.push_str(v);
                out.push_str(u);
            }
            CssToken::Delim(c) => out.push(*c),
            CssToken::Comma => out.push(','),
            CssToken::Colon => out.push(':'),
            CssToken::Semicolon => out.push(';'),
            CssToken::LeftParen => out.push('('),
            CssToken::RightParen => out.push(')'),
            CssToken::LeftBracket => out.push('['),
            CssToken::RightBracket => out.push(']'),
            CssToken::LeftBrace => out.push('{'),
            CssToken::RightBrace => out.push('}'),
            CssToken::Whitespace => out.push(' '),
        }
    }
    out
}

/// A last-pass guard against the fixed set of markup-lookalike substrings
/// §4.6 forbids anywhere in the final output, regardless of how an
/// individual token ended up producing one.
fn guard_against_markup_lookalikes(s: &str) -> String {
    const NEEDLES: [&str; 5] = ["<!--", "-->", "<![cdata[", "]]>", "</style"];
    let chars: Vec<char> = s.chars().collect();
    let lower: Vec<char> = s.to_ascii_lowercase().chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    'outer: while i < chars.len() {
        for needle in NEEDLES {
            let needle_chars: Vec<char> = needle.chars().collect();
            if lower[i..].starts_with(needle_chars.as_slice()) {
                out.push('\\');
                out.push_str(&format!("{:x} ", chars[i] as u32));
                i += 1;
                continue 'outer;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
