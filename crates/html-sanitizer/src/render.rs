//! The normalizing renderer of SPEC_FULL §4.3: a stateful, single-writer
//! [`EventSink`] that turns the policy engine's canonical event stream into
//! well-formed HTML5 ∩ XML text.
//!
//! Not thread-safe; a `Renderer` owns per-run buffers (the CDATA body
//! accumulator, open/closed flags) that never escape a single sanitize call.

use std::io::Write;

use crate::encode::{self};
use crate::error::SinkError;
use crate::names::{self, TextEscapingMode};
use crate::sink::{ChangeListener, EventSink, LoggingChangeListener, SanitizeReport};
use crate::str_fns::strpos;

pub struct Renderer<W: Write> {
    writer: W,
    closed: bool,
    /// Count of open, non-void elements emitted so far but not yet closed.
    /// A `close_tag` that would underflow this has no matching `open_tag`
    /// and is the sink-level contract violation of §7 "Fatal conditions".
    open_depth: usize,
    /// The element name exactly as typed (drives escaping-mode decisions;
    /// `plaintext` is special regardless of its rendered spelling).
    cdata_original_name: Option<Box<str>>,
    /// The name that will actually appear in the closing tag (after the
    /// `xmp/listing/plaintext → pre` substitution); this is what the
    /// close-ability hazard scan looks for.
    cdata_rendered_name: Option<Box<str>>,
    pending_unescaped: Option<String>,
    escaping_mode: Option<TextEscapingMode>,
    listener: Box<dyn ChangeListener>,
}

impl<W: Write> Renderer<W> {
    pub fn new(writer: W) -> Self {
        Self::with_listener(writer, Box::new(LoggingChangeListener))
    }

    pub fn with_listener(writer: W, listener: Box<dyn ChangeListener>) -> Self {
        Self {
            writer,
            closed: false,
            open_depth: 0,
            cdata_original_name: None,
            cdata_rendered_name: None,
            pending_unescaped: None,
            escaping_mode: None,
            listener,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn report(&mut self, report: SanitizeReport) {
        self.listener.on_report(report);
    }

    fn write_raw(&mut self, s: &str) -> Result<(), SinkError> {
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> EventSink for Renderer<W> {
    fn open_document(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn open_tag(&mut self, name: &str, attrs: &[(Box<str>, Box<str>)]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::UsedAfterClose);
        }
        if self.pending_unescaped.is_some() {
            self.report(SanitizeReport::CdataHazard { tag_name: name.into() });
            return Ok(());
        }

        let rendered_name = names::raw_text_synonym(name).unwrap_or(name);
        if !names::is_valid_html_name(rendered_name) {
            self.report(SanitizeReport::ElementDeferred { tag_name: name.into() });
            return Ok(());
        }

        let mut tag = String::with_capacity(16);
        tag.push('<');
        tag.push_str(rendered_name);
        for (attr_name, value) in attrs {
            if !names::is_valid_html_name(attr_name) {
                continue;
            }
            tag.push(' ');
            tag.push_str(attr_name);
            tag.push_str("=\"");
            encode::encode_html_attrib_onto(value, &mut tag);
            if value.contains('`') {
                // Defeats IE8 quirks-mode innerHTML reserialization.
                tag.push(' ');
            }
            tag.push('"');
        }

        let void = names::is_void_element(rendered_name);
        if void {
            tag.push_str(" />");
        } else {
            tag.push('>');
        }
        self.write_raw(&tag)?;

        if void {
            return Ok(());
        }
        self.open_depth += 1;

        let mode = names::text_escaping_mode(name);
        self.escaping_mode = Some(mode);
        match mode {
            TextEscapingMode::Cdata | TextEscapingMode::CdataSometimes | TextEscapingMode::PlainText => {
                self.cdata_original_name = Some(name.into());
                self.cdata_rendered_name = Some(rendered_name.into());
                self.pending_unescaped = Some(String::new());
            }
            _ => {
                self.cdata_original_name = None;
                self.cdata_rendered_name = None;
            }
        }
        Ok(())
    }

    fn text(&mut self, chunk: &str) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::UsedAfterClose);
        }
        if let Some(buf) = self.pending_unescaped.as_mut() {
            buf.push_str(chunk);
            return Ok(());
        }
        let mut encoded = String::with_capacity(chunk.len());
        match self.escaping_mode {
            Some(TextEscapingMode::Rcdata) => encode::encode_rcdata_onto(chunk, &mut encoded),
            _ => encode::encode_pcdata_onto(chunk, &mut encoded),
        }
        self.write_raw(&encoded)
    }

    fn close_tag(&mut self, name: &str) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::UsedAfterClose);
        }
        match self.open_depth.checked_sub(1) {
            Some(depth) => self.open_depth = depth,
            None => return Err(SinkError::UnbalancedClose),
        }
        let rendered_name = names::raw_text_synonym(name).unwrap_or(name).to_string();

        if let Some(original) = self.cdata_original_name.take() {
            self.cdata_rendered_name = None;
            let body = self.pending_unescaped.take().unwrap_or_default();
            self.escaping_mode = None;

            if &*original == "plaintext" {
                // PLAINTEXT never closes: emit the buffered text verbatim and stop.
                return self.write_raw(&body);
            }

            let stripped = strip_banned_code_units(&body);
            match find_cdata_hazard(&stripped, &rendered_name) {
                Some(_) => self.report(SanitizeReport::CdataHazard { tag_name: original }),
                None => self.write_raw(&stripped)?,
            }
        } else {
            self.escaping_mode = None;
        }

        self.write_raw(&format!("</{rendered_name}>"))
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.cdata_original_name.take().is_some() {
            self.cdata_rendered_name = None;
            // A CDATA element left open at document end (malformed input,
            // or `plaintext`): emit the buffered body verbatim, matching
            // the lexer's own dangling-construct recovery (§4.1).
            let body = self.pending_unescaped.take().unwrap_or_default();
            self.write_raw(&body)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn strip_banned_code_units(input: &str) -> String {
    input.chars().filter(|c| !entities::is_xml_excluded_code_point(*c as u32)).collect()
}

/// A buffer is safe for `<style>`/`<script>`-like content iff every
/// `<!--` has a matching `-->` with no nesting, and no unescaped close-tag
/// lookalike appears outside such a span. For `script` specifically, a
/// close-tag lookalike *inside* an escaping span is tolerated (the
/// real-world `<script><!--document.write('<script>f()</script>');-->`
/// pattern); for every other CDATA element any embedded close tag is
/// fatal regardless of escaping spans. Returns the offset of the first
/// hazard, if any.
fn find_cdata_hazard(body: &str, rendered_name: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut closer = Vec::with_capacity(rendered_name.len() + 2);
    closer.extend_from_slice(b"</");
    closer.extend_from_slice(rendered_name.as_bytes());
    let tolerate_in_span = rendered_name.eq_ignore_ascii_case("script");

    let mut at = 0;
    loop {
        let lt = at + memchr::memchr(b'<', &bytes[at..])?;

        if bytes[lt..].starts_with(b"<!--") {
            return match strpos(bytes, b"-->", lt + 4) {
                Some(close_at) => {
                    let span_body = &bytes[lt + 4..close_at];
                    if strpos(span_body, b"<!--", 0).is_some() {
                        return Some(lt); // nested escaping span
                    }
                    if !tolerate_in_span {
                        if let Some(rel) = find_closer(span_body, &closer) {
                            return Some(lt + 4 + rel);
                        }
                    }
                    at = close_at + 3;
                    continue;
                }
                None => Some(lt), // unterminated escaping span
            };
        }

        if lt + closer.len() <= len && bytes[lt..lt + closer.len()].eq_ignore_ascii_case(&closer) {
            let after = lt + closer.len();
            if after >= len || matches!(bytes[after], b' ' | b'\t' | b'\r' | b'\n' | 0x0c | b'/' | b'>') {
                return Some(lt);
            }
        }

        at = lt + 1;
    }
}

fn find_closer(haystack: &[u8], closer: &[u8]) -> Option<usize> {
    let len = haystack.len();
    let mut at = 0;
    loop {
        let lt = at + memchr::memchr(b'<', &haystack[at..])?;
        if lt + closer.len() <= len && haystack[lt..lt + closer.len()].eq_ignore_ascii_case(closer) {
            let after = lt + closer.len();
            if after >= len || matches!(haystack[after], b' ' | b'\t' | b'\r' | b'\n' | 0x0c | b'/' | b'>') {
                return Some(lt);
            }
        }
        at = lt + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Renderer<Vec<u8>>) -> Result<(), SinkError>) -> String {
        let mut r = Renderer::new(Vec::new());
        f(&mut r).unwrap();
        r.close_document().unwrap();
        String::from_utf8(r.into_inner()).unwrap()
    }

    #[test]
    fn void_element_self_closes() {
        let out = render(|r| r.open_tag("br", &[]));
        assert_eq!(out, "<br />");
    }

    #[test]
    fn attribute_with_backtick_gets_trailing_space() {
        let out = render(|r| r.open_tag("a", &[("title".into(), "a`b".into())]));
        assert_eq!(out, "<a title=\"a&#96;b \">");
    }

    #[test]
    fn xmp_renders_as_pre_but_keeps_cdata_content_model() {
        let out = render(|r| {
            r.open_tag("xmp", &[])?;
            r.text("<div>&amp;</div>")?;
            r.close_tag("xmp")
        });
        assert_eq!(out, "<pre><div>&amp;</div></pre>");
    }

    #[test]
    fn script_escaping_span_survives_close_check() {
        let out = render(|r| {
            r.open_tag("script", &[])?;
            r.text("<!--document.write('<script>f()</script>');-->")?;
            r.close_tag("script")
        });
        assert_eq!(out, "<script><!--document.write('<script>f()</script>');--></script>");
    }

    #[test]
    fn script_body_with_unescaped_closer_is_suppressed() {
        let out = render(|r| {
            r.open_tag("script", &[])?;
            r.text("</script>")?;
            r.close_tag("script")
        });
        assert_eq!(out, "<script></script>");
    }

    #[test]
    fn plaintext_never_closes() {
        let out = render(|r| {
            r.open_tag("plaintext", &[])?;
            r.text("rest of the document")
        });
        assert_eq!(out, "<pre>rest of the document");
    }

    #[test]
    fn invalid_element_name_is_rejected() {
        let out = render(|r| r.open_tag(":bad", &[]));
        assert_eq!(out, "");
    }

    #[test]
    fn writes_after_close_fail_fast() {
        let mut r = Renderer::new(Vec::new());
        r.close().unwrap();
        assert!(matches!(r.open_tag("p", &[]), Err(SinkError::UsedAfterClose)));
        assert!(matches!(r.text("hi"), Err(SinkError::UsedAfterClose)));
        assert!(matches!(r.close_tag("p"), Err(SinkError::UsedAfterClose)));
    }

    #[test]
    fn close_tag_with_no_matching_open_tag_is_unbalanced() {
        let mut r = Renderer::new(Vec::new());
        assert!(matches!(r.close_tag("p"), Err(SinkError::UnbalancedClose)));
    }
}
