//! Canonical element/attribute names and the fixed classification tables
//! the lexer, policy engine, and renderer all share.

use rustc_hash::FxHashSet;
use std::sync::LazyLock;

/// How an element's content is escaped, per the HTML5 tokenizer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEscapingMode {
    /// Ordinary PCDATA: markup is parsed, entities decoded.
    Pcdata,
    /// Content is plain text with entities decoded: `<textarea>`, `<title>`.
    Rcdata,
    /// Content is fully opaque until the matching close tag: `<script>`, `<style>`.
    Cdata,
    /// Like `Cdata`, but escaping spans (`<!-- -->`) are permitted to contain
    /// close-tag lookalikes: this is the true behavior of `<script>`/`<style>`
    /// as distinct from the handful of elements that never allow them.
    CdataSometimes,
    /// `<plaintext>`: nothing after this point is ever parsed as markup again.
    PlainText,
}

/// The escaping mode for a lowercased element name, or `Pcdata` if the
/// element has no special content model.
pub fn text_escaping_mode(lower_name: &str) -> TextEscapingMode {
    match lower_name {
        "script" | "style" => TextEscapingMode::CdataSometimes,
        "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => TextEscapingMode::Cdata,
        "textarea" | "title" => TextEscapingMode::Rcdata,
        "plaintext" => TextEscapingMode::PlainText,
        _ => TextEscapingMode::Pcdata,
    }
}

pub fn is_cdata_element(lower_name: &str) -> bool {
    matches!(
        text_escaping_mode(lower_name),
        TextEscapingMode::Cdata | TextEscapingMode::CdataSometimes | TextEscapingMode::PlainText
    )
}

pub fn is_rcdata_element(lower_name: &str) -> bool {
    text_escaping_mode(lower_name) == TextEscapingMode::Rcdata
}

/// Raw-text synonyms the renderer substitutes on output (§4.3).
pub fn raw_text_synonym(lower_name: &str) -> Option<&'static str> {
    match lower_name {
        "xmp" | "listing" | "plaintext" => Some("pre"),
        _ => None,
    }
}

static VOID_ELEMENTS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
        "meta", "param", "source", "track", "wbr",
    ]
    .into_iter()
    .collect()
});

pub fn is_void_element(lower_name: &str) -> bool {
    VOID_ELEMENTS.contains(lower_name)
}

static VALUELESS_ATTRIBUTES: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple", "nohref",
        "noresize", "noshade", "nowrap", "readonly", "selected",
    ]
    .into_iter()
    .collect()
});

pub fn is_valueless_attribute(lower_name: &str) -> bool {
    VALUELESS_ATTRIBUTES.contains(lower_name)
}

/// Default `skipIfEmpty` element set (glossary).
static SKIP_IF_EMPTY_DEFAULT: LazyLock<FxHashSet<&'static str>> =
    LazyLock::new(|| ["a", "font", "img", "input", "span"].into_iter().collect());

pub fn is_skip_if_empty_by_default(lower_name: &str) -> bool {
    SKIP_IF_EMPTY_DEFAULT.contains(lower_name)
}

/// Elements whose content is suppressed outright when the element itself is
/// deferred (§4.2 "Defer" path).
static SKIPPABLE_ELEMENT_CONTENT: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "script", "style", "noscript", "nostyle", "noembed", "noframes", "iframe", "object",
        "frame", "frameset", "title",
    ]
    .into_iter()
    .collect()
});

pub fn is_skippable_element_content(lower_name: &str) -> bool {
    SKIPPABLE_ELEMENT_CONTENT.contains(lower_name)
}

/// Elements whose content model has no place for character data: stray
/// text found directly inside one of these (e.g. `foo` in `<table>foo<tr>`)
/// belongs to none of their permitted children and is dropped (§3 "Text
/// container" / `textContainers`). Everything not listed here is a text
/// container by default; `PolicyFactory`'s `text_containers` set can widen
/// this, not narrow it.
static NON_TEXT_CONTAINER_ELEMENTS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    [
        "html", "head", "table", "thead", "tbody", "tfoot", "tr", "colgroup", "ul", "ol", "dl",
        "select", "optgroup", "datalist",
    ]
    .into_iter()
    .collect()
});

pub fn is_text_container_by_default(lower_name: &str) -> bool {
    !NON_TEXT_CONTAINER_ELEMENTS.contains(lower_name)
}

/// Lowercases a name unless it is namespaced (contains `:`) or appears in
/// the fixed SVG/MathML mixed-case tables (§3).
pub fn canonicalize_element_name(name: &[u8]) -> Box<str> {
    if name.contains(&b':') {
        return String::from_utf8_lossy(name).into_owned().into_boxed_str();
    }
    let lower = name.to_ascii_lowercase();
    let lower_str = String::from_utf8_lossy(&lower);
    if let Some(mixed) = svg_or_mathml_element_name(&lower_str) {
        return mixed.into();
    }
    lower_str.into_owned().into_boxed_str()
}

/// Mixed-case SVG/MathML *element* names (not attributes). A small, fixed
/// set of elements whose camelCase spelling carries semantic meaning (and is
/// otherwise indistinguishable once lowercased), e.g. `feGaussianBlur`.
fn svg_or_mathml_element_name(lower: &str) -> Option<&'static str> {
    Some(match lower {
        "altglyph" => "altGlyph",
        "altglyphdef" => "altGlyphDef",
        "altglyphitem" => "altGlyphItem",
        "animatecolor" => "animateColor",
        "animatemotion" => "animateMotion",
        "animatetransform" => "animateTransform",
        "clippath" => "clipPath",
        "feblend" => "feBlend",
        "fecolormatrix" => "feColorMatrix",
        "fecomponenttransfer" => "feComponentTransfer",
        "fecomposite" => "feComposite",
        "feconvolvematrix" => "feConvolveMatrix",
        "fediffuselighting" => "feDiffuseLighting",
        "fedisplacementmap" => "feDisplacementMap",
        "fedistantlight" => "feDistantLight",
        "fedropshadow" => "feDropShadow",
        "feflood" => "feFlood",
        "fefunca" => "feFuncA",
        "fefuncb" => "feFuncB",
        "fefuncg" => "feFuncG",
        "fefuncr" => "feFuncR",
        "fegaussianblur" => "feGaussianBlur",
        "feimage" => "feImage",
        "femerge" => "feMerge",
        "femergenode" => "feMergeNode",
        "femorphology" => "feMorphology",
        "feoffset" => "feOffset",
        "fepointlight" => "fePointLight",
        "fespecularlighting" => "feSpecularLighting",
        "fespotlight" => "feSpotLight",
        "fetile" => "feTile",
        "feturbulence" => "feTurbulence",
        "foreignobject" => "foreignObject",
        "glyphref" => "glyphRef",
        "lineargradient" => "linearGradient",
        "radialgradient" => "radialGradient",
        "textpath" => "textPath",
        _ => return None,
    })
}

/// Mixed-case SVG/MathML *attribute* names. Ported from the teacher's
/// `qualified_attribute_name` table (no namespace prefix mapping, since the
/// sanitizer's attribute list is already flat name/value pairs without a
/// DOM namespace concept).
pub fn canonicalize_attribute_name(name: &[u8]) -> Box<str> {
    if name.contains(&b':') {
        return String::from_utf8_lossy(name).into_owned().into_boxed_str();
    }
    let lower = name.to_ascii_lowercase();
    let lower_str = String::from_utf8_lossy(&lower);
    if let Some(mixed) = svg_or_mathml_attribute_name(&lower_str) {
        return mixed.into();
    }
    lower_str.into_owned().into_boxed_str()
}

fn svg_or_mathml_attribute_name(lower: &str) -> Option<&'static str> {
    Some(match lower {
        "attributename" => "attributeName",
        "attributetype" => "attributeType",
        "basefrequency" => "baseFrequency",
        "baseprofile" => "baseProfile",
        "calcmode" => "calcMode",
        "clippathunits" => "clipPathUnits",
        "definitionurl" => "definitionURL",
        "diffuseconstant" => "diffuseConstant",
        "edgemode" => "edgeMode",
        "filterunits" => "filterUnits",
        "glyphref" => "glyphRef",
        "gradienttransform" => "gradientTransform",
        "gradientunits" => "gradientUnits",
        "kernelmatrix" => "kernelMatrix",
        "kernelunitlength" => "kernelUnitLength",
        "keypoints" => "keyPoints",
        "keysplines" => "keySplines",
        "keytimes" => "keyTimes",
        "lengthadjust" => "lengthAdjust",
        "limitingconeangle" => "limitingConeAngle",
        "markerheight" => "markerHeight",
        "markerunits" => "markerUnits",
        "markerwidth" => "markerWidth",
        "maskcontentunits" => "maskContentUnits",
        "maskunits" => "maskUnits",
        "numoctaves" => "numOctaves",
        "pathlength" => "pathLength",
        "patterncontentunits" => "patternContentUnits",
        "patterntransform" => "patternTransform",
        "patternunits" => "patternUnits",
        "pointsatx" => "pointsAtX",
        "pointsaty" => "pointsAtY",
        "pointsatz" => "pointsAtZ",
        "preservealpha" => "preserveAlpha",
        "preserveaspectratio" => "preserveAspectRatio",
        "primitiveunits" => "primitiveUnits",
        "refx" => "refX",
        "refy" => "refY",
        "repeatcount" => "repeatCount",
        "repeatdur" => "repeatDur",
        "requiredextensions" => "requiredExtensions",
        "requiredfeatures" => "requiredFeatures",
        "specularconstant" => "specularConstant",
        "specularexponent" => "specularExponent",
        "spreadmethod" => "spreadMethod",
        "startoffset" => "startOffset",
        "stddeviation" => "stdDeviation",
        "stitchtiles" => "stitchTiles",
        "surfacescale" => "surfaceScale",
        "systemlanguage" => "systemLanguage",
        "tablevalues" => "tableValues",
        "targetx" => "targetX",
        "targety" => "targetY",
        "textlength" => "textLength",
        "viewbox" => "viewBox",
        "viewtarget" => "viewTarget",
        "xchannelselector" => "xChannelSelector",
        "ychannelselector" => "yChannelSelector",
        "zoomandpan" => "zoomAndPan",
        _ => return None,
    })
}

/// `isValidHtmlName` (§4.3/§6): non-empty, ≤128 chars, `[A-Za-z0-9:\-]`,
/// a single optional `:` not at either end, hyphens not at either end.
pub fn is_valid_html_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b':' || b == b'-')
    {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes[0] == b':' || bytes[0] == b'-' || bytes[bytes.len() - 1] == b':' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    if bytes.iter().filter(|&&b| b == b':').count() > 1 {
        return false;
    }
    true
}
