//! Polymorphic element/attribute policies (§9 "Polymorphic policies") and
//! the engine that drives them against a [`crate::sink::EventSink`] (§4.2).

mod engine;
mod factory;

pub use engine::Engine;
pub use factory::{PolicyFactory, PolicyFactoryBuilder};

use std::sync::Arc;

/// A policy over an element's (possibly renamed) identity and its
/// post-attribute-filtering attribute list. Returning `None` defers
/// (suppresses) the element per §4.2.
pub trait ElementPolicy: Send + Sync {
    fn apply(&self, element_name: &str, attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>>;
}

/// A policy over a single attribute's value. Returning `None` drops the
/// attribute.
pub trait AttributePolicy: Send + Sync {
    fn apply(&self, element_name: &str, attr_name: &str, value: &str) -> Option<Box<str>>;
}

impl<F> ElementPolicy for F
where
    F: Fn(&str, &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> + Send + Sync,
{
    fn apply(&self, element_name: &str, attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> {
        self(element_name, attrs)
    }
}

impl<F> AttributePolicy for F
where
    F: Fn(&str, &str, &str) -> Option<Box<str>> + Send + Sync,
{
    fn apply(&self, element_name: &str, attr_name: &str, value: &str) -> Option<Box<str>> {
        self(element_name, attr_name, value)
    }
}

/// Passes the element through unchanged (adjusted name == canonical name).
pub struct IdentityElementPolicy;

impl ElementPolicy for IdentityElementPolicy {
    fn apply(&self, element_name: &str, _attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> {
        Some(element_name.into())
    }
}

/// Defers every element it sees, regardless of attributes.
pub struct RejectAllElementPolicy;

impl ElementPolicy for RejectAllElementPolicy {
    fn apply(&self, _element_name: &str, _attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> {
        None
    }
}

/// Passes the attribute value through unchanged.
pub struct IdentityAttributePolicy;

impl AttributePolicy for IdentityAttributePolicy {
    fn apply(&self, _element_name: &str, _attr_name: &str, value: &str) -> Option<Box<str>> {
        Some(value.into())
    }
}

/// Runs `self` then `other` in sequence; short-circuits to `None` the
/// moment either step rejects (§9 "short-circuit on reject").
pub struct ComposedElementPolicy(pub Vec<Arc<dyn ElementPolicy>>);

impl ElementPolicy for ComposedElementPolicy {
    fn apply(&self, element_name: &str, attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> {
        let mut name: Box<str> = element_name.into();
        for policy in &self.0 {
            name = policy.apply(&name, attrs)?;
        }
        Some(name)
    }
}

pub fn join_element_policies(a: Arc<dyn ElementPolicy>, b: Arc<dyn ElementPolicy>) -> Arc<dyn ElementPolicy> {
    Arc::new(ComposedElementPolicy(vec![a, b]))
}

pub struct ComposedAttributePolicy(pub Vec<Arc<dyn AttributePolicy>>);

impl AttributePolicy for ComposedAttributePolicy {
    fn apply(&self, element_name: &str, attr_name: &str, value: &str) -> Option<Box<str>> {
        let mut value: Box<str> = value.into();
        for policy in &self.0 {
            value = policy.apply(element_name, attr_name, &value)?;
        }
        Some(value)
    }
}

pub fn join_attribute_policies(a: Arc<dyn AttributePolicy>, b: Arc<dyn AttributePolicy>) -> Arc<dyn AttributePolicy> {
    Arc::new(ComposedAttributePolicy(vec![a, b]))
}

/// An [`AttributePolicy`] backed by [`crate::url::UrlPolicy`] (§4.5).
pub struct UrlAttributePolicy(pub crate::url::UrlPolicy);

impl AttributePolicy for UrlAttributePolicy {
    fn apply(&self, _element_name: &str, _attr_name: &str, value: &str) -> Option<Box<str>> {
        self.0.apply(value).map(|v| v.into_boxed_str())
    }
}

/// An [`AttributePolicy`] running a `style` attribute's value through
/// [`crate::css::StylingPolicy`] (§4.6). Drops the attribute only if every
/// declaration in it was rejected.
pub struct StyleAttributePolicy(pub crate::css::StylingPolicy);

impl AttributePolicy for StyleAttributePolicy {
    fn apply(&self, _element_name: &str, _attr_name: &str, value: &str) -> Option<Box<str>> {
        let filtered = self.0.apply(value);
        if filtered.is_empty() {
            None
        } else {
            Some(filtered.into_boxed_str())
        }
    }
}

/// Injects (or extends) a `rel` attribute with a fixed set of tokens not
/// already present, preserving any tokens the author supplied. The
/// concrete example of §9's "joinable strategies" note: joining this
/// policy with another instance unions their required token sets rather
/// than running both in sequence (which would just produce the second
/// policy's fixed value, discarding the first's).
pub struct RequireRelTokensElementPolicy {
    pub required: Vec<Box<str>>,
}

impl ElementPolicy for RequireRelTokensElementPolicy {
    fn apply(&self, element_name: &str, attrs: &mut Vec<(Box<str>, Box<str>)>) -> Option<Box<str>> {
        let existing = attrs.iter().position(|(name, _)| &**name == "rel");
        let mut tokens: Vec<Box<str>> = match existing {
            Some(i) => attrs[i].1.split_whitespace().map(Box::from).collect(),
            None => Vec::new(),
        };
        for required in &self.required {
            if !tokens.iter().any(|t| t == required) {
                tokens.push(required.clone());
            }
        }
        let value: Box<str> = tokens.join(" ").into_boxed_str();
        match existing {
            Some(i) => attrs[i].1 = value,
            None => attrs.push(("rel".into(), value)),
        }
        Some(element_name.into())
    }
}

impl RequireRelTokensElementPolicy {
    /// Unions two required-token sets rather than composing sequentially.
    pub fn joined(a: &Self, b: &Self) -> Self {
        let mut required = a.required.clone();
        for token in &b.required {
            if !required.iter().any(|t| t == token) {
                required.push(token.clone());
            }
        }
        Self { required }
    }
}
