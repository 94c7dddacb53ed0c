//! Property-based tests for the universal invariants of §8, run against
//! randomly generated HTML-shaped strings rather than the fixed scenarios
//! in `sanitize.rs`.

use html_sanitizer::{sanitize, PolicyFactory, SinkErrorPolicy};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

const TAGS: &[&str] = &["b", "i", "p", "div", "span", "script", "a", "img", "table", "tr", "style"];
const ATTRS: &[&str] = &["href", "src", "onerror", "class", "style", "id", "rel"];
const VALUES: &[&str] = &[
    "javascript:alert(1)",
    "https://example.test/",
    "red",
    "data:text/plain,hi",
    "\"quoted\"",
    "x",
];
const TEXT: &[&str] = &["hi", "1 < 2 {{x}}", "&amp;", "plain & text", "-->", "<!--", ""];

/// A pseudo-HTML fragment assembled from a small vocabulary of tags,
/// attributes, and text chunks, so quickcheck's shrinker explores inputs
/// that actually exercise the policy engine rather than arbitrary Unicode.
#[derive(Clone, Debug)]
struct HtmlShaped(String);

impl Arbitrary for HtmlShaped {
    fn arbitrary(g: &mut Gen) -> Self {
        let piece_count = u8::arbitrary(g) % 8;
        let mut out = String::new();
        for _ in 0..piece_count {
            match u8::arbitrary(g) % 4 {
                0 => {
                    out.push('<');
                    out.push_str(g.choose(TAGS).unwrap());
                    if bool::arbitrary(g) {
                        out.push(' ');
                        out.push_str(g.choose(ATTRS).unwrap());
                        out.push_str("=\"");
                        out.push_str(g.choose(VALUES).unwrap());
                        out.push('"');
                    }
                    out.push('>');
                }
                1 => {
                    out.push_str("</");
                    out.push_str(g.choose(TAGS).unwrap());
                    out.push('>');
                }
                2 => out.push_str(g.choose(TEXT).unwrap()),
                _ => {
                    let n = u8::arbitrary(g) % 6;
                    for _ in 0..n {
                        out.push(char::arbitrary(g));
                    }
                }
            }
        }
        HtmlShaped(out)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let s = self.0.clone();
        Box::new((0..s.len()).rev().map(move |cut| HtmlShaped(s[..cut].to_string())))
    }
}

fn sample_factory() -> PolicyFactory {
    let mut builder = PolicyFactory::builder();
    builder.allow_elements(["p", "div", "span", "a", "b", "i", "img", "table", "tr", "td"]);
    builder.allow_global_attribute_verbatim("id");
    builder.allow_global_attribute_verbatim("class");
    builder.allow_url_attribute("a", "href", ["http", "https"]);
    builder.allow_url_attribute("img", "src", ["http", "https"]);
    builder.build()
}

fn run(input: &HtmlShaped) -> String {
    sanitize(&input.0, &sample_factory(), SinkErrorPolicy::Propagate).unwrap()
}

#[quickcheck]
fn sanitize_is_idempotent(input: HtmlShaped) -> bool {
    let once = run(&input);
    let twice = sanitize(&once, &sample_factory(), SinkErrorPolicy::Propagate).unwrap();
    once == twice
}

#[quickcheck]
fn output_contains_no_banned_control_characters(input: HtmlShaped) -> bool {
    run(&input).chars().all(|c| {
        let cp = c as u32;
        let is_banned_c0 = cp < 0x20 && !matches!(c, '\t' | '\n' | '\r');
        let is_del = cp == 0x7f;
        !is_banned_c0 && !is_del
    })
}

#[quickcheck]
fn no_surviving_href_or_src_uses_a_disallowed_scheme(input: HtmlShaped) -> bool {
    let out = run(&input);
    !out.contains("javascript:") && !out.contains("data:")
}

#[quickcheck]
fn double_open_braces_never_survive_in_text(input: HtmlShaped) -> bool {
    !run(&input).contains("{{")
}

#[quickcheck]
fn emitted_attributes_are_unique_and_double_quoted(input: HtmlShaped) -> bool {
    for tag in open_tag_bodies(&run(&input)) {
        let mut seen = Vec::new();
        let mut rest = tag;
        while let Some(eq) = rest.find('=') {
            let name = rest[..eq].trim().rsplit(' ').next().unwrap_or("");
            if name.is_empty() {
                break;
            }
            if seen.contains(&name) {
                return false;
            }
            seen.push(name);
            let after_eq = &rest[eq + 1..];
            if !after_eq.starts_with('"') {
                return false;
            }
            let Some(close) = after_eq[1..].find('"') else {
                return false;
            };
            rest = &after_eq[1 + close + 1..];
        }
    }
    true
}

/// Crude `<tag ...>` body extraction good enough for attribute-shape
/// checks: doesn't need to understand the grammar, only to find the
/// spans between `<` and the next unquoted `>`.
fn open_tag_bodies(html: &str) -> Vec<&str> {
    let bytes = html.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while let Some(lt) = bytes[i..].iter().position(|&b| b == b'<').map(|p| p + i) {
        if bytes.get(lt + 1) == Some(&b'/') || bytes.get(lt + 1) == Some(&b'!') {
            i = lt + 1;
            continue;
        }
        let mut j = lt + 1;
        let mut in_quotes = false;
        while j < bytes.len() {
            match bytes[j] {
                b'"' => in_quotes = !in_quotes,
                b'>' if !in_quotes => break,
                _ => {}
            }
            j += 1;
        }
        if j < bytes.len() {
            out.push(&html[lt + 1..j]);
        }
        i = j + 1;
    }
    out
}
