//! A policy-driven HTML sanitizer: pull-tokenize, run a per-element/
//! per-attribute policy engine over the result, and re-render well-formed
//! HTML5 ∩ XML (SPEC_FULL §2's pipeline).
//!
//! ```
//! use html_sanitizer::{sanitize, PolicyFactory, SinkErrorPolicy};
//!
//! let mut builder = PolicyFactory::builder();
//! builder.allow_elements(["p", "b", "i"]);
//! builder.allow_global_attribute_verbatim("title");
//! let factory = builder.build();
//!
//! let out = sanitize("<p>hi <script>bad()</script><b>there</b></p>", &factory, SinkErrorPolicy::Propagate).unwrap();
//! assert_eq!(out, "<p>hi <b>there</b></p>");
//! ```

pub mod css;
mod encode;
mod error;
mod lexer;
#[macro_use]
mod macros;
mod names;
mod policy;
mod render;
mod sink;
mod str_fns;
mod token;
mod url;

pub use error::{PolicyBuildError, SinkError};
pub use lexer::Lexer;
pub use policy::{
    AttributePolicy, ComposedAttributePolicy, ComposedElementPolicy, ElementPolicy, Engine, IdentityAttributePolicy,
    IdentityElementPolicy, PolicyFactory, PolicyFactoryBuilder, RejectAllElementPolicy, RequireRelTokensElementPolicy,
    StyleAttributePolicy, UrlAttributePolicy,
};
pub use render::Renderer;
pub use sink::{ChangeListener, ErrorPolicyApplyingSink, EventSink, LoggingChangeListener, SanitizeReport, SinkErrorPolicy};
pub use url::UrlPolicy;

/// Sanitizes `html` against `factory`, returning the rendered output as a
/// `String`. `error_policy` governs what happens when the renderer itself
/// raises a [`SinkError`] (§7.2): `Propagate` surfaces it to the caller,
/// `Drop` logs it and keeps sanitizing subsequent writes. The common case;
/// for streaming output or a custom [`EventSink`]/[`ChangeListener`],
/// assemble [`Lexer`], [`Engine`], and [`Renderer`] directly.
pub fn sanitize(html: &str, factory: &PolicyFactory, error_policy: SinkErrorPolicy) -> Result<String, SinkError> {
    let mut renderer = Renderer::new(Vec::new());
    let events = Lexer::new(html.as_bytes()).events();
    {
        let mut sink = ErrorPolicyApplyingSink::new(&mut renderer, error_policy);
        Engine::new(factory).run(events, &mut sink)?;
        sink.close()?;
    }
    Ok(String::from_utf8(renderer.into_inner()).expect("renderer only ever writes valid UTF-8"))
}

/// Like [`sanitize`], but reports every dropped attribute, deferred
/// element, and CDATA hazard to `listener` as it happens (§7.1). Two
/// separate `Engine`/`Renderer` listener slots exist by design: the engine
/// reports policy-level decisions, the renderer reports rendering-level
/// ones, and a caller wanting a single merged stream can pass clones of the
/// same listener (or route both through one `Arc<Mutex<_>>`) to each half
/// via [`Engine::with_listener`]/[`Renderer::with_listener`] directly.
pub fn sanitize_with_listener(
    html: &str,
    factory: &PolicyFactory,
    error_policy: SinkErrorPolicy,
    listener: impl FnMut(SanitizeReport) + 'static,
) -> Result<String, SinkError> {
    use std::cell::RefCell;
    use std::rc::Rc;

    struct SharedListener(Rc<RefCell<dyn FnMut(SanitizeReport)>>);
    impl ChangeListener for SharedListener {
        fn on_report(&mut self, report: SanitizeReport) {
            (self.0.borrow_mut())(report);
        }
    }

    let shared: Rc<RefCell<dyn FnMut(SanitizeReport)>> = Rc::new(RefCell::new(listener));
    let mut renderer = Renderer::with_listener(Vec::new(), Box::new(SharedListener(shared.clone())));
    let events = Lexer::new(html.as_bytes()).events();
    {
        let mut sink = ErrorPolicyApplyingSink::new(&mut renderer, error_policy);
        Engine::with_listener(factory, Box::new(SharedListener(shared))).run(events, &mut sink)?;
        sink.close()?;
    }
    Ok(String::from_utf8(renderer.into_inner()).expect("renderer only ever writes valid UTF-8"))
}
