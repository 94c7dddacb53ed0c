//! The CSS tokenizer and property-schema styling policy of SPEC_FULL §4.6,
//! applied to a `style` attribute's value.

mod schema;
mod tokenizer;

pub use schema::{bits, PropertySchema, StylingPolicy, StylingPolicyBuilder};
pub use tokenizer::{tokenize, CssToken};
