//! The stack-based `openTag`/`closeTag`/`text`/`closeDocument` algorithm of
//! SPEC_FULL §4.2, driving a [`EventSink`] from a [`LexEvent`] stream.

use crate::encode::{decode_html, DecodeContext};
use crate::error::SinkError;
use crate::lexer::LexEvent;
use crate::names;
use crate::sink::{ChangeListener, EventSink, LoggingChangeListener, SanitizeReport};

use super::factory::PolicyFactory;

/// One open-element stack entry: the name as canonicalized at `openTag`
/// time, and the name it was actually emitted under, or `None` if the
/// element was deferred (so its content can still be tracked for
/// `closeTag` matching without ever reaching the sink).
type StackEntry = (Box<str>, Option<Box<str>>);

pub struct Engine<'f> {
    factory: &'f PolicyFactory,
    listener: Box<dyn ChangeListener>,
    stack: Vec<StackEntry>,
    /// Count of currently-open deferred elements whose content model is
    /// `SKIPPABLE_ELEMENT_CONTENT` (§4.2's Defer path): text is suppressed
    /// entirely while this is nonzero.
    skip_depth: usize,
    /// §3's second, independent suppression mechanism: true once the
    /// nearest *emitted* ancestor (the stack's top non-deferred entry, or
    /// the document root) is not a `textContainers` member. Recomputed
    /// after every push/pop in `open_tag`/`close_tag`; unrelated to
    /// `skip_depth`, which only tracks deferred `SKIPPABLE_ELEMENT_CONTENT`.
    outside_text_container: bool,
}

impl<'f> Engine<'f> {
    pub fn new(factory: &'f PolicyFactory) -> Self {
        Self::with_listener(factory, Box::new(LoggingChangeListener))
    }

    pub fn with_listener(factory: &'f PolicyFactory, listener: Box<dyn ChangeListener>) -> Self {
        Self {
            factory,
            listener,
            stack: Vec::new(),
            skip_depth: 0,
            outside_text_container: false,
        }
    }

    fn report(&mut self, report: SanitizeReport) {
        self.listener.on_report(report);
    }

    pub fn run(mut self, events: impl Iterator<Item = LexEvent>, sink: &mut dyn EventSink) -> Result<(), SinkError> {
        sink.open_document()?;
        for event in events {
            match event {
                LexEvent::OpenTag { name, attrs, .. } => self.open_tag(&name, attrs, sink)?,
                LexEvent::CloseTag { name } => self.close_tag(&name, sink)?,
                LexEvent::Text(bytes) => self.text(&bytes, sink)?,
                LexEvent::Unescaped(bytes) => self.raw_text(&bytes, sink)?,
                LexEvent::Comment(_) => {}
            }
        }
        self.close_document(sink)
    }

    fn text(&mut self, bytes: &[u8], sink: &mut dyn EventSink) -> Result<(), SinkError> {
        if self.skip_depth > 0 || self.outside_text_container {
            return Ok(());
        }
        let decoded = decode_html(&DecodeContext::BodyText, bytes);
        sink.text(&String::from_utf8_lossy(&decoded))
    }

    /// CDATA element content (`<script>`/`<style>` bodies and the like):
    /// never entity-decoded, passed through exactly as the author wrote it.
    fn raw_text(&mut self, bytes: &[u8], sink: &mut dyn EventSink) -> Result<(), SinkError> {
        if self.skip_depth > 0 || self.outside_text_container {
            return Ok(());
        }
        sink.text(&String::from_utf8_lossy(bytes))
    }

    /// Recomputes `outside_text_container` from the new top of the stack
    /// (§3's `topNonNullAdjustedName`), ignoring deferred entries (whose
    /// `None` adjusted name means they never reached the sink and so never
    /// became the ambient container). An empty stack is the document root,
    /// which always permits text.
    fn recompute_text_container(&mut self) {
        self.outside_text_container = match self.stack.iter().rev().find_map(|(_, adjusted)| adjusted.as_deref()) {
            Some(name) => !self.factory.is_text_container(name),
            None => false,
        };
    }

    fn open_tag(
        &mut self,
        raw_name: &[u8],
        raw_attrs: Vec<(Box<[u8]>, Box<[u8]>)>,
        sink: &mut dyn EventSink,
    ) -> Result<(), SinkError> {
        let input_name = names::canonicalize_element_name(raw_name);

        // Step 1: element policy lookup.
        let Some(element_policy) = self.factory.element_policy(&input_name).cloned() else {
            self.report(SanitizeReport::ElementDeferred { tag_name: input_name.clone() });
            return self.defer(input_name);
        };

        // Steps 2-3: per-attribute filter, then dedup keeping the first
        // occurrence. A bitmask of first-byte occurrences (for lowercase
        // ASCII names, the overwhelming common case) short-circuits the
        // exact-match scan; namespaced and mixed-case names always fall
        // back to it.
        let mut seen_first_byte: u128 = 0;
        let mut attrs: Vec<(Box<str>, Box<str>)> = Vec::with_capacity(raw_attrs.len());
        for (raw_attr_name, raw_value) in &raw_attrs {
            let attr_name = names::canonicalize_attribute_name(raw_attr_name);

            let first = attr_name.as_bytes().first().copied().unwrap_or(0);
            let bit: u128 = if first.is_ascii_lowercase() { 1 << (first - b'a') } else { 0 };
            let maybe_dup = bit == 0 || (seen_first_byte & bit) != 0;
            if maybe_dup && attrs.iter().any(|(n, _)| *n == attr_name) {
                continue;
            }
            seen_first_byte |= bit;

            let decoded = decode_html(&DecodeContext::Attribute, raw_value);
            let value = String::from_utf8_lossy(&decoded).into_owned();

            match self.factory.filter_attribute(&input_name, &attr_name, &value) {
                Some(kept) => attrs.push((attr_name, kept)),
                None => self.report(SanitizeReport::AttributeDropped {
                    tag_name: input_name.clone(),
                    attribute_name: attr_name,
                }),
            }
        }

        // Step 4: the element policy itself, over the filtered/deduped
        // attributes; may rename the element or reject it outright.
        let Some(adjusted) = element_policy.apply(&input_name, &mut attrs) else {
            self.report(SanitizeReport::ElementDeferred { tag_name: input_name.clone() });
            return self.defer(input_name);
        };

        // Step 5: canonicalize the possibly-renamed element.
        let adjusted = names::canonicalize_element_name(adjusted.as_bytes());

        // Step 6: skipIfEmpty defers an element whose final attribute list
        // came up empty.
        if attrs.is_empty() && self.factory.skip_if_empty(&adjusted) {
            return self.defer(input_name);
        }

        // Step 7: emit, or push onto the stack awaiting its close tag. Void
        // elements are complete in a single event and never pushed.
        if names::is_void_element(&adjusted) {
            return sink.open_tag(&adjusted, &attrs);
        }

        self.stack.push((input_name, Some(adjusted.clone())));
        self.recompute_text_container();
        sink.open_tag(&adjusted, &attrs)
    }

    fn defer(&mut self, input_name: Box<str>) -> Result<(), SinkError> {
        if names::is_skippable_element_content(&input_name) {
            self.skip_depth += 1;
        }
        self.stack.push((input_name, None));
        Ok(())
    }

    fn close_tag(&mut self, raw_name: &[u8], sink: &mut dyn EventSink) -> Result<(), SinkError> {
        let input_name = names::canonicalize_element_name(raw_name);

        // Scan the stack top-down for the nearest matching open element; a
        // stray close tag with no match anywhere is simply ignored.
        let Some(pos) = self.stack.iter().rposition(|(name, _)| *name == input_name) else {
            return Ok(());
        };

        for (name, adjusted) in self.stack.split_off(pos).into_iter().rev() {
            if adjusted.is_none() && names::is_skippable_element_content(&name) {
                self.skip_depth = self.skip_depth.saturating_sub(1);
            }
            if let Some(adjusted) = adjusted {
                sink.close_tag(&adjusted)?;
            }
        }
        self.recompute_text_container();
        Ok(())
    }

    fn close_document(&mut self, sink: &mut dyn EventSink) -> Result<(), SinkError> {
        for (_, adjusted) in std::mem::take(&mut self.stack).into_iter().rev() {
            if let Some(adjusted) = adjusted {
                sink.close_tag(&adjusted)?;
            }
        }
        self.skip_depth = 0;
        self.outside_text_container = false;
        sink.close_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::policy::UrlAttributePolicy;
    use crate::sink::DebugSink;
    use crate::url::UrlPolicy;
    use std::sync::Arc;

    fn run(factory: &PolicyFactory, html: &str) -> Vec<String> {
        let mut sink = DebugSink::default();
        let events = Lexer::new(html.as_bytes()).events();
        Engine::new(factory).run(events, &mut sink).unwrap();
        sink.events
    }

    #[test]
    fn allowed_element_with_no_attribute_policy_strips_attributes() {
        let factory = PolicyFactory::builder().allow_element("b").build();
        let out = run(&factory, r#"<b class="x">hi</b>"#);
        assert_eq!(out, vec!["openDocument", "openTag b ", "text \"hi\"", "closeTag b", "closeDocument"]);
    }

    #[test]
    fn element_with_no_policy_is_deferred_but_its_text_survives() {
        let factory = PolicyFactory::builder().build();
        let out = run(&factory, "<fake>hi</fake>");
        assert_eq!(out, vec!["openDocument", "text \"hi\"", "closeDocument"]);
    }

    #[test]
    fn script_content_is_skipped_entirely_when_script_itself_is_deferred() {
        let factory = PolicyFactory::builder().build();
        let out = run(&factory, "<script>alert(1)</script>after");
        assert_eq!(out, vec!["openDocument", "text \"after\"", "closeDocument"]);
    }

    #[test]
    fn close_tag_unwinds_everything_above_the_matching_open_tag() {
        let factory = PolicyFactory::builder().allow_elements(["b", "i"]).build();
        let out = run(&factory, "<b><i>hi</b>");
        assert_eq!(
            out,
            vec![
                "openDocument",
                "openTag b ",
                "openTag i ",
                "text \"hi\"",
                "closeTag i",
                "closeTag b",
                "closeDocument",
            ]
        );
    }

    #[test]
    fn unclosed_element_is_closed_at_document_end() {
        let factory = PolicyFactory::builder().allow_element("b").build();
        let out = run(&factory, "<b>hi");
        assert_eq!(out, vec!["openDocument", "openTag b ", "text \"hi\"", "closeTag b", "closeDocument"]);
    }

    #[test]
    fn void_element_never_waits_for_a_close_tag() {
        let factory = PolicyFactory::builder().allow_element("br").build();
        let out = run(&factory, "<br>after");
        assert_eq!(out, vec!["openDocument", "openTag br ", "text \"after\"", "closeDocument"]);
    }

    #[test]
    fn skip_if_empty_defers_a_elements_with_no_surviving_attributes() {
        let factory = PolicyFactory::builder().allow_element("a").build();
        let out = run(&factory, "<a>text</a>");
        assert_eq!(out, vec!["openDocument", "text \"text\"", "closeDocument"]);
    }

    #[test]
    fn duplicate_attribute_keeps_first_occurrence() {
        let mut builder = PolicyFactory::builder();
        builder.allow_element("p");
        builder.allow_attribute_verbatim("p", "id");
        let factory = builder.build();
        let out = run(&factory, r#"<p id="x" id="y">"#);
        assert_eq!(out, vec!["openDocument", "openTag p id=\"x\"", "closeDocument"]);
    }

    #[test]
    fn stray_text_directly_inside_a_non_text_container_is_dropped() {
        let factory = PolicyFactory::builder().allow_elements(["table", "tr", "td"]).build();
        let out = run(&factory, "<table>foo<tr><td>bar</td></tr></table>");
        assert_eq!(
            out,
            vec![
                "openDocument",
                "openTag table ",
                "openTag tr ",
                "openTag td ",
                "text \"bar\"",
                "closeTag td",
                "closeTag tr",
                "closeTag table",
                "closeDocument",
            ]
        );
    }

    #[test]
    fn text_container_suppression_lifts_once_back_inside_a_container() {
        let factory = PolicyFactory::builder().allow_elements(["div", "table"]).build();
        let out = run(&factory, "<div><table>skip</table>after</div>");
        assert_eq!(
            out,
            vec![
                "openDocument",
                "openTag div ",
                "openTag table ",
                "closeTag table",
                "text \"after\"",
                "closeTag div",
                "closeDocument",
            ]
        );
    }

    #[test]
    fn href_scheme_filter_drops_disallowed_urls() {
        let mut builder = PolicyFactory::builder();
        builder.allow_element("a");
        builder.allow_attribute("a", "href", Arc::new(UrlAttributePolicy(UrlPolicy::new(["http", "https"]))));
        let factory = builder.build();
        let out = run(&factory, r#"<a href="javascript:alert(1)">x</a>"#);
        // href is dropped (policy rejects it), which empties the attribute
        // list, which in turn triggers the default skipIfEmpty defer for `a`.
        assert_eq!(out, vec!["openDocument", "text \"x\"", "closeDocument"]);
    }
}
