//! Assembles a [`PolicyFactory`] from a fluent, not-thread-safe builder
//! (§5 "Concurrency & Resource Model"). The built factory is immutable and
//! freely shareable across threads once constructed.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::PolicyBuildError;
use crate::url::UrlPolicy;

use super::{AttributePolicy, ElementPolicy, IdentityAttributePolicy, IdentityElementPolicy, RequireRelTokensElementPolicy, UrlAttributePolicy, join_element_policies};

#[derive(Default)]
pub struct PolicyFactory {
    element_policies: FxHashMap<Box<str>, Arc<dyn ElementPolicy>>,
    element_attribute_policies: FxHashMap<Box<str>, FxHashMap<Box<str>, Arc<dyn AttributePolicy>>>,
    global_attribute_policies: FxHashMap<Box<str>, Arc<dyn AttributePolicy>>,
    skip_if_empty_extra: FxHashSet<Box<str>>,
    text_containers_extra: FxHashSet<Box<str>>,
}

impl PolicyFactory {
    pub fn builder() -> PolicyFactoryBuilder {
        PolicyFactoryBuilder::default()
    }

    pub(crate) fn element_policy(&self, name: &str) -> Option<&Arc<dyn ElementPolicy>> {
        self.element_policies.get(name)
    }

    /// Step 2 of `openTag`: element-specific policy first, then the global
    /// policy for the attribute, both applied in sequence. `None` means the
    /// attribute has no policy registered anywhere (drop) or a registered
    /// policy rejected the value (also drop) — both collapse to the same
    /// "absent" outcome from the caller's point of view.
    pub(crate) fn filter_attribute(&self, element: &str, attr: &str, value: &str) -> Option<Box<str>> {
        let mut found = false;
        let mut current: Option<Box<str>> = Some(value.into());

        if let Some(policy) = self.element_attribute_policies.get(element).and_then(|m| m.get(attr)) {
            found = true;
            current = current.and_then(|v| policy.apply(element, attr, &v));
        }
        if let Some(policy) = self.global_attribute_policies.get(attr) {
            found = true;
            current = current.and_then(|v| policy.apply(element, attr, &v));
        }

        if !found {
            return None;
        }
        current
    }

    pub(crate) fn skip_if_empty(&self, name: &str) -> bool {
        self.skip_if_empty_extra.contains(name) || crate::names::is_skip_if_empty_by_default(name)
    }

    /// §3 `textContainers`: whether `name` is allowed to hold character
    /// data directly. Independent of `skip_if_empty`/`SKIPPABLE_ELEMENT_CONTENT` —
    /// this gates stray text inside a normally-open element whose content
    /// model has no place for it (e.g. `<table>foo<tr>`).
    pub(crate) fn is_text_container(&self, name: &str) -> bool {
        self.text_containers_extra.contains(name) || crate::names::is_text_container_by_default(name)
    }
}

#[derive(Default)]
pub struct PolicyFactoryBuilder {
    element_policies: FxHashMap<Box<str>, Arc<dyn ElementPolicy>>,
    element_attribute_policies: FxHashMap<Box<str>, FxHashMap<Box<str>, Arc<dyn AttributePolicy>>>,
    global_attribute_policies: FxHashMap<Box<str>, Arc<dyn AttributePolicy>>,
    skip_if_empty_extra: FxHashSet<Box<str>>,
    text_containers_extra: FxHashSet<Box<str>>,
    rel_tokens: FxHashMap<Box<str>, RequireRelTokensElementPolicy>,
}

impl PolicyFactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_element(&mut self, name: &str) -> &mut Self {
        self.element_policies.insert(name.into(), Arc::new(IdentityElementPolicy));
        self
    }

    pub fn allow_elements<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for name in names {
            self.allow_element(name);
        }
        self
    }

    pub fn allow_element_with_policy(&mut self, name: &str, policy: Arc<dyn ElementPolicy>) -> &mut Self {
        self.element_policies.insert(name.into(), policy);
        self
    }

    /// Like [`Self::allow_element_with_policy`], but fails if `name` already
    /// has a policy registered rather than silently overwriting it.
    pub fn try_define_element_policy(
        &mut self,
        name: &str,
        policy: Arc<dyn ElementPolicy>,
    ) -> Result<&mut Self, PolicyBuildError> {
        if self.element_policies.contains_key(name) {
            return Err(PolicyBuildError::DuplicateElementPolicy { element: name.to_string() });
        }
        self.element_policies.insert(name.into(), policy);
        Ok(self)
    }

    pub fn allow_attribute(&mut self, element: &str, attr: &str, policy: Arc<dyn AttributePolicy>) -> &mut Self {
        self.element_attribute_policies
            .entry(element.into())
            .or_default()
            .insert(attr.into(), policy);
        self
    }

    pub fn allow_attribute_verbatim(&mut self, element: &str, attr: &str) -> &mut Self {
        self.allow_attribute(element, attr, Arc::new(IdentityAttributePolicy))
    }

    pub fn allow_global_attribute(&mut self, attr: &str, policy: Arc<dyn AttributePolicy>) -> &mut Self {
        self.global_attribute_policies.insert(attr.into(), policy);
        self
    }

    pub fn allow_global_attribute_verbatim(&mut self, attr: &str) -> &mut Self {
        self.allow_global_attribute(attr, Arc::new(IdentityAttributePolicy))
    }

    /// Like [`Self::allow_attribute`], but fails rather than silently
    /// overwriting if `element`/`attr` already has a policy registered:
    /// two independently-authored attribute policies for the same slot
    /// have no general-purpose join strategy (unlike, say,
    /// [`RequireRelTokensElementPolicy`]'s token union), so replacing one
    /// with the other is rarely what the caller meant.
    pub fn try_allow_attribute(
        &mut self,
        element: &str,
        attr: &str,
        policy: Arc<dyn AttributePolicy>,
    ) -> Result<&mut Self, PolicyBuildError> {
        if self.element_attribute_policies.get(element).is_some_and(|m| m.contains_key(attr)) {
            return Err(PolicyBuildError::IncompatibleJoinStrategy {
                attribute: format!("{element}[{attr}]"),
            });
        }
        self.allow_attribute(element, attr, policy);
        Ok(self)
    }

    pub fn allow_url_attribute(
        &mut self,
        element: &str,
        attr: &str,
        schemes: impl IntoIterator<Item = impl Into<Box<str>>>,
    ) -> &mut Self {
        self.allow_attribute(element, attr, Arc::new(UrlAttributePolicy(UrlPolicy::new(schemes))))
    }

    pub fn set_skip_if_empty(&mut self, element: &str) -> &mut Self {
        self.skip_if_empty_extra.insert(element.into());
        self
    }

    /// Widens the §3 `textContainers` set beyond `names`'s default: `element`
    /// may hold character data directly even though it's not a text
    /// container by default (or vice versa — narrowing an element out of
    /// the default set isn't supported, only widening into it).
    pub fn allow_text_in(&mut self, element: &str) -> &mut Self {
        self.text_containers_extra.insert(element.into());
        self
    }

    /// Requires `rel` on `element` to carry every token in `tokens`,
    /// preserving any the author already supplied. Calling this (or
    /// [`Self::require_rel_nofollow_on_links`]) more than once for the same
    /// element unions the required-token sets rather than overwriting them
    /// (§9 "joinable strategies").
    pub fn require_rel_tokens_on(
        &mut self,
        element: &str,
        tokens: impl IntoIterator<Item = impl Into<Box<str>>>,
    ) -> &mut Self {
        let incoming = RequireRelTokensElementPolicy {
            required: tokens.into_iter().map(Into::into).collect(),
        };
        self.rel_tokens
            .entry(element.into())
            .and_modify(|existing| *existing = RequireRelTokensElementPolicy::joined(existing, &incoming))
            .or_insert(incoming);
        self
    }

    pub fn require_rel_nofollow_on_links(&mut self) -> &mut Self {
        self.require_rel_tokens_on("a", ["nofollow", "noopener", "noreferrer"])
    }

    pub fn build(self) -> PolicyFactory {
        let mut element_policies = self.element_policies;
        for (element, rel_policy) in self.rel_tokens {
            let rel_arc: Arc<dyn ElementPolicy> = Arc::new(rel_policy);
            element_policies
                .entry(element)
                .and_modify(|existing| *existing = join_element_policies(existing.clone(), rel_arc.clone()))
                .or_insert(rel_arc);
        }
        PolicyFactory {
            element_policies,
            element_attribute_policies: self.element_attribute_policies,
            global_attribute_policies: self.global_attribute_policies,
            skip_if_empty_extra: self.skip_if_empty_extra,
            text_containers_extra: self.text_containers_extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_if_empty_defaults_apply_without_configuration() {
        let factory = PolicyFactory::builder().build();
        assert!(factory.skip_if_empty("a"));
        assert!(!factory.skip_if_empty("div"));
    }

    #[test]
    fn set_skip_if_empty_extends_the_default_set() {
        let factory = PolicyFactory::builder().set_skip_if_empty("div").build();
        assert!(factory.skip_if_empty("div"));
    }

    #[test]
    fn missing_attribute_policy_is_absent_not_just_rejected() {
        let factory = PolicyFactory::builder().allow_element("a").build();
        assert_eq!(factory.filter_attribute("a", "href", "/x"), None);
    }

    #[test]
    fn require_rel_tokens_called_twice_unions_rather_than_overwrites() {
        let mut builder = PolicyFactory::builder();
        builder.allow_element("a");
        builder.require_rel_tokens_on("a", ["nofollow"]);
        builder.require_rel_tokens_on("a", ["noopener"]);
        let factory = builder.build();
        let mut attrs = Vec::new();
        let adjusted = factory.element_policy("a").unwrap().apply("a", &mut attrs).unwrap();
        assert_eq!(&*adjusted, "a");
        assert_eq!(attrs, vec![("rel".into(), "nofollow noopener".into())]);
    }

    #[test]
    fn try_define_element_policy_rejects_duplicates() {
        let mut builder = PolicyFactory::builder();
        builder.allow_element("b");
        let err = builder
            .try_define_element_policy("b", Arc::new(IdentityElementPolicy))
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::DuplicateElementPolicy { .. }));
    }

    #[test]
    fn try_allow_attribute_rejects_a_second_policy_for_the_same_slot() {
        let mut builder = PolicyFactory::builder();
        builder.allow_element("a");
        builder.try_allow_attribute("a", "href", Arc::new(IdentityAttributePolicy)).unwrap();
        let err = builder
            .try_allow_attribute("a", "href", Arc::new(IdentityAttributePolicy))
            .unwrap_err();
        assert!(matches!(err, PolicyBuildError::IncompatibleJoinStrategy { .. }));
    }

    #[test]
    fn text_container_defaults_apply_without_configuration() {
        let factory = PolicyFactory::builder().build();
        assert!(factory.is_text_container("p"));
        assert!(!factory.is_text_container("table"));
    }

    #[test]
    fn allow_text_in_extends_the_default_set() {
        let factory = PolicyFactory::builder().allow_text_in("table").build();
        assert!(factory.is_text_container("table"));
    }
}
