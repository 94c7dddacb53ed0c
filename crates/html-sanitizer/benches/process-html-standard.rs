use html_sanitizer::{sanitize, PolicyFactory, SinkErrorPolicy};

fn main() {
    divan::main();
}

fn sample_factory() -> PolicyFactory {
    let mut builder = PolicyFactory::builder();
    builder.allow_elements([
        "html", "head", "body", "title", "meta", "p", "div", "span", "a", "b", "i", "ul", "li", "table", "tr", "td",
        "img", "br",
    ]);
    builder.allow_global_attribute_verbatim("id");
    builder.allow_global_attribute_verbatim("class");
    builder.allow_url_attribute("a", "href", ["http", "https"]);
    builder.allow_url_attribute("img", "src", ["http", "https"]);
    builder.build()
}

#[divan::bench]
fn bench_sanitize_repeated_document(bencher: divan::Bencher) {
    let fragment = r#"<div class="post"><p>Hello <b>world</b>, visit <a href="https://example.test/">here</a>.</p>
<script>alert(1)</script>
<ul><li>one</li><li>two</li></ul>
<img src="https://example.test/x.png" onerror="evil()"></div>
"#;
    let input = fragment.repeat(200);
    let factory = sample_factory();

    bencher.bench(|| sanitize(&input, &factory, SinkErrorPolicy::Propagate).expect("sanitize must succeed"));
}
