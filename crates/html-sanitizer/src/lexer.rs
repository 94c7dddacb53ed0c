//! The two-layer pull tokenizer of SPEC_FULL §4.1.
//!
//! The inner splitter and the outer attribute-reclassifying FSM
//! (`OUTSIDE_TAG → IN_TAG → SAW_NAME → SAW_EQ`) are combined into a single
//! `Lexer` that yields [`Token`]s directly in their final, reclassified
//! form: tag bodies are already split into `AttrName`/`AttrValue`/`QString`
//! spans by the time a token reaches a consumer. `Ignorable` tokens are
//! produced internally (presumptuous `<>`/`</>` tags, for instance) and are
//! dropped before they ever escape the iterator.
//!
//! [`Lexer`] never fails: malformed input always degrades to `Text`, never
//! to an error.

use std::collections::VecDeque;

use crate::names::{self, TextEscapingMode};
use crate::str_fns::strpos;
use crate::token::{Token, TokenType};
use crate::{strcspn, strspn};

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    queue: VecDeque<Token>,
    escape_exempt: Option<(Box<str>, TextEscapingMode)>,
    lookahead: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            queue: VecDeque::new(),
            escape_exempt: None,
            lookahead: None,
        }
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    /// Groups the raw token stream into the tag-level events the policy
    /// engine consumes.
    pub fn events(self) -> TagEvents<'a> {
        TagEvents { lexer: self }
    }

    fn pull_non_ignorable(&mut self) -> Option<Token> {
        loop {
            if self.queue.is_empty() {
                if self.pos >= self.input.len() && self.escape_exempt.is_none() {
                    return None;
                }
                self.step();
                continue;
            }
            let tok = self.queue.pop_front().unwrap();
            if tok.kind != TokenType::Ignorable {
                return Some(tok);
            }
        }
    }

    fn next_non_ignorable(&mut self) -> Option<Token> {
        self.lookahead.take().or_else(|| self.pull_non_ignorable())
    }

    fn peek_non_ignorable(&mut self) -> Option<Token> {
        if self.lookahead.is_none() {
            self.lookahead = self.pull_non_ignorable();
        }
        self.lookahead
    }

    /// Advances the lexer by exactly one "macro step": either a text run, a
    /// markup declaration, a tag (with all its attributes and its closer),
    /// or a span of escape-exempt content. Pushes one or more tokens onto
    /// `queue` and/or advances `pos`.
    fn step(&mut self) {
        if let Some((name, mode)) = self.escape_exempt.take() {
            self.lex_escape_exempt_content(&name, mode);
            return;
        }

        let len = self.input.len();
        if self.pos >= len {
            return;
        }

        match self.find_tag_open(self.pos) {
            None => {
                self.queue.push_back(Token::new(self.pos, len, TokenType::Text));
                self.pos = len;
            }
            Some(lt) => {
                if lt > self.pos {
                    self.queue.push_back(Token::new(self.pos, lt, TokenType::Text));
                    self.pos = lt;
                    return;
                }
                self.lex_markup_at_lt();
            }
        }
    }

    /// Finds the next `<` that could plausibly open a real token: one
    /// followed by `!`, `/`, `?`, `%`, or an ASCII letter. Any other `<` is
    /// part of ordinary text (e.g. "<3"), per the tag-open-state pre-check.
    fn find_tag_open(&self, from: usize) -> Option<usize> {
        let mut at = from;
        loop {
            let rel = memchr::memchr(b'<', &self.input[at..])?;
            let lt = at + rel;
            match self.input.get(lt + 1) {
                Some(b'!' | b'/' | b'?' | b'%') => return Some(lt),
                Some(c) if c.is_ascii_alphabetic() => return Some(lt),
                _ => at = lt + 1,
            }
        }
    }

    fn lex_markup_at_lt(&mut self) {
        let at = self.pos;
        match self.input.get(at + 1) {
            Some(b'!') => self.lex_markup_declaration(),
            Some(b'?') => self.lex_qmark_meta(),
            Some(b'%') => self.lex_server_code(),
            Some(b'/') => self.lex_tag(true),
            Some(c) if c.is_ascii_alphabetic() => self.lex_tag(false),
            _ => {
                self.queue.push_back(Token::new(at, at + 1, TokenType::Ignorable));
                self.pos = at + 1;
            }
        }
    }

    fn lex_markup_declaration(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;

        if input[at + 2..].starts_with(b"--") {
            return self.lex_comment();
        }
        if len > at + 9 && input[at + 2..at + 9].eq_ignore_ascii_case(b"DOCTYPE") {
            return self.lex_doctype();
        }
        if len > at + 9 && &input[at + 2..at + 9] == b"[CDATA[" {
            return self.lex_cdata_section();
        }

        // Anything else is an incorrectly-opened ("bogus") comment: skip to the nearest `>`.
        match memchr::memchr(b'>', &input[at..]) {
            Some(rel) => {
                let end = at + rel + 1;
                self.queue.push_back(Token::new(at, end, TokenType::Comment));
                self.pos = end;
            }
            None => {
                self.queue.push_back(Token::new(at, len, TokenType::Comment));
                self.pos = len;
            }
        }
    }

    fn lex_comment(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;

        let mut closer_at = at + 4;
        if closer_at >= len {
            self.queue.push_back(Token::new(at, len, TokenType::Comment));
            self.pos = len;
            return;
        }

        // Abruptly-closed comments: a run of dashes followed immediately by `>`.
        let dash_run = strspn!(input, b'-', closer_at);
        if closer_at + dash_run < len && input[closer_at + dash_run] == b'>' {
            let end = closer_at + dash_run + 1;
            self.queue.push_back(Token::new(at, end, TokenType::Comment));
            self.pos = end;
            return;
        }

        loop {
            match strpos(input, b"--", closer_at) {
                None => {
                    self.queue.push_back(Token::new(at, len, TokenType::Comment));
                    self.pos = len;
                    return;
                }
                Some(dd) => {
                    if dd + 2 < len && input[dd + 2] == b'>' {
                        let end = dd + 3;
                        self.queue.push_back(Token::new(at, end, TokenType::Comment));
                        self.pos = end;
                        return;
                    }
                    if dd + 3 < len && input[dd + 2] == b'!' && input[dd + 3] == b'>' {
                        let end = dd + 4;
                        self.queue.push_back(Token::new(at, end, TokenType::Comment));
                        self.pos = end;
                        return;
                    }
                    closer_at = dd + 1;
                }
            }
        }
    }

    fn lex_doctype(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;
        match strpos(input, b">", at + 9) {
            Some(c) => {
                self.queue.push_back(Token::new(at, c + 1, TokenType::Directive));
                self.pos = c + 1;
            }
            None => {
                self.queue.push_back(Token::new(at, len, TokenType::Directive));
                self.pos = len;
            }
        }
    }

    fn lex_cdata_section(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;
        match strpos(input, b"]]>", at + 9) {
            Some(c) => {
                self.queue.push_back(Token::new(at, c + 3, TokenType::Cdata));
                self.pos = c + 3;
            }
            None => {
                self.queue.push_back(Token::new(at, len, TokenType::Cdata));
                self.pos = len;
            }
        }
    }

    fn lex_qmark_meta(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;
        match memchr::memchr(b'>', &input[at..]) {
            Some(rel) => {
                let end = at + rel + 1;
                self.queue.push_back(Token::new(at, end, TokenType::QMarkMeta));
                self.pos = end;
            }
            None => {
                self.queue.push_back(Token::new(at, len, TokenType::QMarkMeta));
                self.pos = len;
            }
        }
    }

    /// Server-code spans, `<% ... %>`. A dangling (unterminated) span is
    /// recovered at EOF, per the lexer's "never fails" contract.
    fn lex_server_code(&mut self) {
        let input = self.input;
        let len = input.len();
        let at = self.pos;
        match strpos(input, b"%>", at + 2) {
            Some(c) => {
                let end = c + 2;
                self.queue.push_back(Token::new(at, end, TokenType::ServerCode));
                self.pos = end;
            }
            None => {
                self.queue.push_back(Token::new(at, len, TokenType::ServerCode));
                self.pos = len;
            }
        }
    }

    fn lex_tag(&mut self, is_closing: bool) {
        let input = self.input;
        let len = input.len();
        let tag_open_at = self.pos;
        let name_at = if is_closing { tag_open_at + 2 } else { tag_open_at + 1 };

        if name_at >= len || !input[name_at].is_ascii_alphabetic() {
            // `<>` / `</>`: the "presumptuous empty tag", interpreted as plaintext.
            let end = (tag_open_at + if is_closing { 3 } else { 2 }).min(len);
            self.queue.push_back(Token::new(tag_open_at, end, TokenType::Ignorable));
            self.pos = end;
            return;
        }

        let name_len = strspn!(input, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b':', name_at);
        let name_end = name_at + name_len;
        self.queue.push_back(Token::new(tag_open_at, name_end, TokenType::TagBegin));
        self.pos = name_end;

        let lower_name = String::from_utf8_lossy(&input[name_at..name_end]).to_ascii_lowercase();

        loop {
            self.pos += strspn!(input, b' ' | b'\t' | 0x0c | b'\r' | b'\n' | b'/', self.pos);
            if self.pos >= len {
                self.queue.push_back(Token::new(self.pos, len, TokenType::Ignorable));
                return;
            }
            if input[self.pos] == b'>' {
                let end = self.pos + 1;
                self.queue.push_back(Token::new(self.pos, end, TokenType::TagEnd));
                self.pos = end;
                break;
            }
            if !self.lex_attribute() {
                break;
            }
        }

        if !is_closing {
            let mode = names::text_escaping_mode(&lower_name);
            if mode != TextEscapingMode::Pcdata {
                self.escape_exempt = Some((lower_name.into_boxed_str(), mode));
            }
        }
    }

    /// Returns `false` when the document ended mid-attribute (dangling
    /// construct recovery: parsing simply stops, matching the lexer's
    /// "never fails" contract).
    fn lex_attribute(&mut self) -> bool {
        let input = self.input;
        let len = input.len();
        let name_start = self.pos;

        let starts_with_equal = input[self.pos] == b'=';
        let shift = if starts_with_equal { 1 } else { 0 };
        let name_len = shift
            + strcspn!(
                input,
                b'=' | b'/' | b'>' | b' ' | b'\t' | 0x0c | b'\r' | b'\n',
                self.pos + shift
            );
        if name_len == 0 {
            // Defensive: avoid an infinite loop on unexpected input.
            self.pos += 1;
            return self.pos < len;
        }

        let name_end = name_start + name_len;
        if name_end >= len {
            self.queue.push_back(Token::new(name_start, len, TokenType::Ignorable));
            self.pos = len;
            return false;
        }
        self.queue.push_back(Token::new(name_start, name_end, TokenType::AttrName));
        self.pos = name_end;

        self.skip_plain_whitespace();
        if self.pos >= len {
            return false;
        }
        if input[self.pos] != b'=' {
            return true; // valueless attribute
        }
        self.pos += 1;
        self.skip_plain_whitespace();
        if self.pos >= len {
            return false;
        }

        match input[self.pos] {
            quote @ (b'\'' | b'"') => {
                let value_start = self.pos + 1;
                match strpos(input, &[quote], value_start) {
                    Some(end_quote) => {
                        self.queue
                            .push_back(Token::new(value_start, end_quote, TokenType::QString));
                        self.pos = end_quote + 1;
                        true
                    }
                    None => {
                        self.queue.push_back(Token::new(value_start, len, TokenType::QString));
                        self.pos = len;
                        false
                    }
                }
            }
            _ => {
                let value_start = self.pos;
                let value_len = self.scan_unquoted_attr_value(value_start);
                self.queue
                    .push_back(Token::new(value_start, value_start + value_len, TokenType::AttrValue));
                self.pos = value_start + value_len;
                true
            }
        }
    }

    /// Unquoted attribute values merge with following whitespace/text
    /// rather than stopping at the first space, per §4.1's adjacent-text
    /// merging rule, unless that would swallow end-of-file, a
    /// valueless-attribute name, `/>`, or the start of a new `name=` pair.
    fn scan_unquoted_attr_value(&self, start: usize) -> usize {
        let input = self.input;
        let len = input.len();
        let mut at = start + strcspn!(input, b'>' | b' ' | b'\t' | 0x0c | b'\r' | b'\n', start);

        loop {
            let ws_len = strspn!(input, b' ' | b'\t' | 0x0c | b'\r' | b'\n', at);
            if ws_len == 0 {
                break;
            }
            let word_start = at + ws_len;
            if word_start >= len || input[word_start] == b'>' {
                break;
            }
            if word_start + 1 < len && input[word_start] == b'/' && input[word_start + 1] == b'>' {
                break;
            }
            let word_len = strcspn!(
                input,
                b'=' | b'/' | b'>' | b' ' | b'\t' | 0x0c | b'\r' | b'\n',
                word_start
            );
            if word_len == 0 {
                break;
            }
            if word_start + word_len < len && input[word_start + word_len] == b'=' {
                break;
            }
            let lower_word = input[word_start..word_start + word_len].to_ascii_lowercase();
            if names::is_valueless_attribute(&String::from_utf8_lossy(&lower_word)) {
                break;
            }
            at = word_start + word_len;
        }

        at - start
    }

    fn skip_plain_whitespace(&mut self) {
        self.pos += strspn!(self.input, b' ' | b'\t' | 0x0c | b'\r' | b'\n', self.pos);
    }

    /// Scans escape-exempt element content for its matching close tag,
    /// honoring `<!-- -->` escaping spans for `script`/`style`. Emits one
    /// `Unescaped` (or `Text`, for RCDATA) token for the content and leaves
    /// `pos` at the start of the closing tag, to be lexed normally on the
    /// next step.
    fn lex_escape_exempt_content(&mut self, lower_name: &str, mode: TextEscapingMode) {
        let input = self.input;
        let len = input.len();
        let start = self.pos;

        if mode == TextEscapingMode::PlainText {
            if start < len {
                self.queue.push_back(Token::new(start, len, TokenType::Unescaped));
            }
            self.pos = len;
            return;
        }

        let honor_escaping_spans = mode == TextEscapingMode::CdataSometimes;
        let content_end =
            find_closing_tag_start(input, lower_name, start, honor_escaping_spans).unwrap_or(len);

        if content_end > start {
            let kind = if mode == TextEscapingMode::Rcdata {
                TokenType::Text
            } else {
                TokenType::Unescaped
            };
            self.queue.push_back(Token::new(start, content_end, kind));
        }
        self.pos = content_end;
    }
}

/// Finds the byte offset of a `</name` close-tag lookalike (properly
/// terminated by whitespace, `/`, `>`, or EOF), skipping over any that fall
/// inside an unterminated `<!-- -->` escaping span when `honor_escaping_spans`.
fn find_closing_tag_start(
    input: &[u8],
    lower_name: &str,
    from: usize,
    honor_escaping_spans: bool,
) -> Option<usize> {
    let len = input.len();
    let mut closer_name = Vec::with_capacity(lower_name.len() + 2);
    closer_name.extend_from_slice(b"</");
    closer_name.extend_from_slice(lower_name.as_bytes());

    let mut at = from;
    loop {
        let rel = memchr::memchr(b'<', &input[at..])?;
        let lt = at + rel;

        if honor_escaping_spans && input[lt..].starts_with(b"<!--") {
            // Everything until the matching `-->` is tolerated, including
            // close-tag lookalikes. An unterminated span has no closer at all.
            let close_at = strpos(input, b"-->", lt + 4)?;
            at = close_at + 3;
            continue;
        }

        if lt + closer_name.len() <= len && input[lt..lt + closer_name.len()].eq_ignore_ascii_case(&closer_name) {
            let after = lt + closer_name.len();
            if after >= len || matches!(input[after], b' ' | b'\t' | b'\r' | b'\n' | 0x0c | b'/' | b'>') {
                return Some(lt);
            }
        }

        at = lt + 1;
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let mut current = self.next_non_ignorable()?;

        if matches!(current.kind, TokenType::Text | TokenType::Unescaped) {
            while let Some(peeked) = self.peek_non_ignorable() {
                if peeked.kind == current.kind && peeked.start == current.end {
                    current.end = peeked.end;
                    self.lookahead = None;
                } else {
                    break;
                }
            }
        }

        Some(current)
    }
}

/// A tag-level event assembled from a run of lexer tokens: either a chunk of
/// content, or a fully-parsed open/close tag with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexEvent {
    Text(Box<[u8]>),
    Unescaped(Box<[u8]>),
    Comment(Box<[u8]>),
    OpenTag {
        /// The name exactly as the author typed it (not yet canonicalized).
        name: Box<[u8]>,
        /// Flat, ordered `(name, value)` pairs, also not yet canonicalized
        /// or entity-decoded.
        attrs: Vec<(Box<[u8]>, Box<[u8]>)>,
        self_closing: bool,
    },
    CloseTag {
        name: Box<[u8]>,
    },
}

/// Groups a [`Lexer`]'s token stream into [`LexEvent`]s for the policy
/// engine. Comments, DOCTYPEs, CDATA lookalikes, and other non-tag,
/// non-text tokens are collapsed: only `Comment` is surfaced (as the
/// closest analogue of "markup the policy engine doesn't otherwise act
/// on"), everything else is skipped.
pub struct TagEvents<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Iterator for TagEvents<'a> {
    type Item = LexEvent;

    fn next(&mut self) -> Option<LexEvent> {
        loop {
            let tok = self.lexer.next()?;
            let input = self.lexer.input;
            match tok.kind {
                TokenType::Text => return Some(LexEvent::Text(tok.text(input).into())),
                TokenType::Unescaped => return Some(LexEvent::Unescaped(tok.text(input).into())),
                TokenType::Comment => return Some(LexEvent::Comment(tok.text(input).into())),
                TokenType::Directive
                | TokenType::Cdata
                | TokenType::QMarkMeta
                | TokenType::ServerCode => continue,
                TokenType::TagBegin => return Some(self.assemble_tag(tok)),
                TokenType::AttrName | TokenType::AttrValue | TokenType::QString | TokenType::TagEnd => {
                    // Only reachable if a tag's internal tokens are ever
                    // pulled outside of `assemble_tag`, which doesn't happen
                    // in normal operation.
                    continue;
                }
                TokenType::Ignorable => unreachable!("Lexer never yields Ignorable"),
            }
        }
    }
}

impl<'a> TagEvents<'a> {
    fn assemble_tag(&mut self, begin: Token) -> LexEvent {
        let input = self.lexer.input;
        let begin_text = begin.text(input);
        let is_closing = begin_text.first() == Some(&b'/');
        let name_start = if is_closing { 1 } else { 0 };
        let name: Box<[u8]> = begin_text[name_start..].into();

        if is_closing {
            // Drain (and discard) any attribute-like tokens up to the closer.
            while let Some(tok) = self.lexer.next() {
                if tok.kind == TokenType::TagEnd {
                    break;
                }
            }
            return LexEvent::CloseTag { name };
        }

        let mut attrs = Vec::new();
        let mut self_closing = false;
        let mut pending_name: Option<Box<[u8]>> = None;

        while let Some(tok) = self.lexer.next() {
            match tok.kind {
                TokenType::AttrName => {
                    if let Some(n) = pending_name.take() {
                        attrs.push((n, Box::from(&b""[..])));
                    }
                    pending_name = Some(tok.text(input).into());
                }
                TokenType::AttrValue | TokenType::QString => {
                    let value = tok.text(input).into();
                    if let Some(n) = pending_name.take() {
                        attrs.push((n, value));
                    }
                }
                TokenType::TagEnd => {
                    if let Some(n) = pending_name.take() {
                        attrs.push((n, Box::from(&b""[..])));
                    }
                    self_closing = input.get(tok.start.wrapping_sub(1)) == Some(&b'/');
                    break;
                }
                _ => {}
            }
        }

        LexEvent::OpenTag {
            name,
            attrs,
            self_closing,
        }
    }
}
