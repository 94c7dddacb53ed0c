//! The two error kinds of SPEC_FULL §7/§10.3.
//!
//! Malformed or disallowed *input* is never an `Err`: it is silently elided
//! or, when a [`crate::sink::ChangeListener`] is installed, reported
//! through it (§7.1). These enums only cover the two kinds of error that
//! legitimately exist: sink I/O failures, and builder-time misuse when
//! assembling a `PolicyFactory`.

use thiserror::Error;

/// A failure surfaced by the output sink, routed through the
/// [`crate::sink::SinkErrorPolicy`] configured for a `sanitize` call.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("sink used after closeDocument")]
    UsedAfterClose,

    #[error("closeTag called with no matching open tag on the stack")]
    UnbalancedClose,
}

/// Raised while assembling a `PolicyFactory` from inconsistent builder
/// state. Never raised for anything about the HTML being sanitized.
#[derive(Debug, Error)]
pub enum PolicyBuildError {
    #[error("attribute policy for `{attribute}` joins two policies with incompatible join strategies")]
    IncompatibleJoinStrategy { attribute: String },

    #[error("element `{element}` already has a policy registered")]
    DuplicateElementPolicy { element: String },

    #[error("css property `{property}` already has a schema entry registered")]
    DuplicateCssSchema { property: String },
}
