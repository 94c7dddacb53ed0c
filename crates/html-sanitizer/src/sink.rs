//! The stream event receiver contract of SPEC_FULL §6, plus the ambient
//! error-routing and reporting machinery of §7/§10.2.

use crate::error::SinkError;

/// `openDocument, openTag(name, attrs), text, closeTag, closeDocument`.
///
/// Implementations receive canonical names only. `attrs` is borrowed for
/// the duration of the call; implementations must not retain it.
///
/// `close` is the Rust rendition of §5's "detects closability by type
/// probe": rather than probing for a closable trait object at runtime,
/// sinks that wrap a closable resource simply override this default no-op
/// and track their own closed flag, so a double `close_document` call stays
/// a no-op per §5.
pub trait EventSink {
    fn open_document(&mut self) -> Result<(), SinkError>;
    fn open_tag(&mut self, name: &str, attrs: &[(Box<str>, Box<str>)]) -> Result<(), SinkError>;
    fn text(&mut self, chunk: &str) -> Result<(), SinkError>;
    fn close_tag(&mut self, name: &str) -> Result<(), SinkError>;

    fn close_document(&mut self) -> Result<(), SinkError> {
        self.close()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// How a sink error is handled once raised (§7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkErrorPolicy {
    /// Surface the error to the caller of `sanitize`.
    Propagate,
    /// Log it (§10.2) and continue sanitizing against subsequent writes.
    #[default]
    Drop,
}

/// The `(context, elementName)` / `(context, tagName, [attributeName])`
/// reports of §7.1, delivered to an optional [`ChangeListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeReport {
    /// An attribute was dropped by policy (absent policy, or policy
    /// returned none).
    AttributeDropped { tag_name: Box<str>, attribute_name: Box<str> },
    /// An element was deferred (no policy, or the element policy rejected
    /// it outright).
    ElementDeferred { tag_name: Box<str> },
    /// A CDATA close-ability hazard was found; the offending body was
    /// suppressed but the close tag was still emitted.
    CdataHazard { tag_name: Box<str> },
}

/// Receives [`SanitizeReport`]s. Listener failures are isolated: a panic or
/// error from the listener must never poison the sanitize call itself, so
/// `on_report` has no return value to propagate.
pub trait ChangeListener {
    fn on_report(&mut self, report: SanitizeReport);
}

impl<F: FnMut(SanitizeReport)> ChangeListener for F {
    fn on_report(&mut self, report: SanitizeReport) {
        self(report)
    }
}

/// A listener that emits each report through the `log` facade (§10.2) and
/// nothing else. The default when no caller-supplied listener is given.
#[derive(Debug, Default)]
pub struct LoggingChangeListener;

impl ChangeListener for LoggingChangeListener {
    fn on_report(&mut self, report: SanitizeReport) {
        match &report {
            SanitizeReport::AttributeDropped { tag_name, attribute_name } => {
                log::debug!("dropped attribute `{attribute_name}` on <{tag_name}>");
            }
            SanitizeReport::ElementDeferred { tag_name } => {
                log::debug!("deferred element <{tag_name}>, no matching policy");
            }
            SanitizeReport::CdataHazard { tag_name } => {
                log::warn!("suppressed <{tag_name}> body: CDATA close-ability hazard");
            }
        }
    }
}

/// Wraps another sink and applies a [`SinkErrorPolicy`] to every call:
/// under `Propagate`, errors pass through unchanged; under `Drop`, an
/// error is logged and swallowed so the engine's event loop keeps driving
/// the wrapped sink against subsequent writes (§7.2).
pub struct ErrorPolicyApplyingSink<'s> {
    inner: &'s mut dyn EventSink,
    policy: SinkErrorPolicy,
}

impl<'s> ErrorPolicyApplyingSink<'s> {
    pub fn new(inner: &'s mut dyn EventSink, policy: SinkErrorPolicy) -> Self {
        Self { inner, policy }
    }

    fn apply(&self, result: Result<(), SinkError>) -> Result<(), SinkError> {
        match (result, self.policy) {
            (Err(err), SinkErrorPolicy::Drop) => {
                log::warn!("sink error dropped, continuing: {err}");
                Ok(())
            }
            (result, _) => result,
        }
    }
}

impl<'s> EventSink for ErrorPolicyApplyingSink<'s> {
    fn open_document(&mut self) -> Result<(), SinkError> {
        let result = self.inner.open_document();
        self.apply(result)
    }

    fn open_tag(&mut self, name: &str, attrs: &[(Box<str>, Box<str>)]) -> Result<(), SinkError> {
        let result = self.inner.open_tag(name, attrs);
        self.apply(result)
    }

    fn text(&mut self, chunk: &str) -> Result<(), SinkError> {
        let result = self.inner.text(chunk);
        self.apply(result)
    }

    fn close_tag(&mut self, name: &str) -> Result<(), SinkError> {
        let result = self.inner.close_tag(name);
        self.apply(result)
    }

    fn close_document(&mut self) -> Result<(), SinkError> {
        let result = self.inner.close_document();
        self.apply(result)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let result = self.inner.close();
        self.apply(result)
    }
}

/// A minimal [`EventSink`] writing directly into a `String`, with no
/// normalization of its own — used by tests that want to inspect the raw
/// event stream the policy engine produced, independent of the renderer.
#[derive(Debug, Default)]
pub struct DebugSink {
    pub events: Vec<String>,
}

impl EventSink for DebugSink {
    fn open_document(&mut self) -> Result<(), SinkError> {
        self.events.push("openDocument".to_string());
        Ok(())
    }

    fn open_tag(&mut self, name: &str, attrs: &[(Box<str>, Box<str>)]) -> Result<(), SinkError> {
        let attrs = attrs
            .iter()
            .map(|(n, v)| format!("{n}={v:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        self.events.push(format!("openTag {name} {attrs}"));
        Ok(())
    }

    fn text(&mut self, chunk: &str) -> Result<(), SinkError> {
        self.events.push(format!("text {chunk:?}"));
        Ok(())
    }

    fn close_tag(&mut self, name: &str) -> Result<(), SinkError> {
        self.events.push(format!("closeTag {name}"));
        Ok(())
    }
}
