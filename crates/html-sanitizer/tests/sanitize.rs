//! Integration tests pinning down the eight concrete scenarios of §8,
//! exercised only through the public `sanitize`/`PolicyFactory` surface.

use std::sync::Arc;

use html_sanitizer::{css, sanitize, PolicyFactory, SinkErrorPolicy, StyleAttributePolicy, UrlAttributePolicy, UrlPolicy};

fn run(factory: &PolicyFactory, html: &str) -> String {
    sanitize(html, factory, SinkErrorPolicy::Propagate).unwrap()
}

#[test]
fn deferred_script_suppresses_its_own_body_but_not_surrounding_content() {
    let factory = PolicyFactory::builder().allow_element("b").build();
    let out = run(&factory, "<b>hi</b><script>x</script>");
    assert_eq!(out, "<b>hi</b>");
}

#[test]
fn href_scheme_filter_empties_the_tag_and_default_skip_if_empty_collapses_it_to_text() {
    let mut builder = PolicyFactory::builder();
    builder.allow_element("a");
    builder.allow_attribute("a", "href", Arc::new(UrlAttributePolicy(UrlPolicy::new(["http"]))));
    let factory = builder.build();
    let out = run(&factory, r#"<a href="javascript:alert(1)">x</a>"#);
    assert_eq!(out, "x");
}

#[test]
fn require_rel_nofollow_on_links_merges_with_surviving_attributes() {
    let mut builder = PolicyFactory::builder();
    builder.allow_element("a");
    builder.allow_attribute_verbatim("a", "href");
    builder.allow_attribute_verbatim("a", "target");
    builder.require_rel_nofollow_on_links();
    let factory = builder.build();
    let out = run(&factory, r#"<a href="https://x" target="_blank">y</a>"#);
    assert_eq!(out, r#"<a href="https://x" target="_blank" rel="nofollow noopener noreferrer">y</a>"#);
}

#[test]
fn img_with_disallowed_src_scheme_is_deferred_but_the_following_void_element_survives() {
    let mut builder = PolicyFactory::builder();
    builder.allow_element("img");
    builder.allow_attribute("img", "src", Arc::new(UrlAttributePolicy(UrlPolicy::new(["http", "https"]))));
    builder.allow_element("br");
    let factory = builder.build();
    let out = run(&factory, r#"<img src="data:text/plain,hi" onerror="x"><br>"#);
    assert_eq!(out, "<br />");
}

#[test]
fn plain_text_is_entity_encoded_and_double_braces_are_broken() {
    let factory = PolicyFactory::builder().build();
    let out = run(&factory, "1 < 2 && 3 > 4 {{x}}");
    assert_eq!(out, "1 &lt; 2 &amp;&amp; 3 &gt; 4 {<!-- -->{x}}");
}

#[test]
fn url_scheme_comparison_is_case_insensitive_but_the_value_is_preserved() {
    let mut builder = PolicyFactory::builder();
    builder.allow_element("a");
    builder.allow_attribute("a", "href", Arc::new(UrlAttributePolicy(UrlPolicy::new(["http"]))));
    let factory = builder.build();
    let out = run(&factory, r#"<a href="HTTP://Example.COM/%41">t</a>"#);
    assert_eq!(out, r#"<a href="HTTP://Example.COM/%41">t</a>"#);
}

#[test]
fn css_styling_policy_hoists_comma_separated_keywords_and_drops_unknown_functions() {
    let mut css_builder = css::StylingPolicy::builder(Arc::new(|_: &str| None));
    css_builder.allow_property("font-family", css::PropertySchema::new(css::bits::UNRESERVED_WORD | css::bits::STRING));
    let styling = css_builder.build();

    let mut builder = PolicyFactory::builder();
    builder.allow_element("p");
    builder.allow_attribute("p", "style", Arc::new(StyleAttributePolicy(styling)));
    let factory = builder.build();

    let out = run(
        &factory,
        r#"<p style="font-family: Arial Black, sans-serif; expression(alert(1))">t</p>"#,
    );
    assert_eq!(out, r#"<p style="font-family:'arial black', sans-serif">t</p>"#);
}

#[test]
fn duplicate_attribute_on_an_unclosed_element_keeps_the_first_occurrence() {
    let mut builder = PolicyFactory::builder();
    builder.allow_element("p");
    builder.allow_attribute_verbatim("p", "id");
    let factory = builder.build();
    let out = run(&factory, r#"<p id="x" id="y">t"#);
    assert_eq!(out, r#"<p id="x">t</p>"#);
}
