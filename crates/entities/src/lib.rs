//! Decoding of HTML character references (entities).
//!
//! This mirrors the WHATWG "named character reference" and "numeric character
//! reference" states: a fixed table of named references plus a numeric-reference
//! scanner that applies the Windows-1252 remapping for the C1 control range and
//! substitutes U+FFFD for anything that cannot be represented.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// U+FFFD REPLACEMENT CHARACTER
const UNICODE_REPLACEMENT_CHAR: &[u8] = b"\xEF\xBF\xBD";

/// The context in which a character reference is being decoded.
///
/// Only [`HtmlContext::Attribute`] changes behavior: it rejects "ambiguous
/// ampersands" (character references with no trailing `;` that are immediately
/// followed by an alphanumeric or `=`), matching browser attribute-value parsing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HtmlContext {
    Attribute,
    BodyText,
}

/// Decodes every character reference found in `input`, returning a freshly
/// allocated byte string with references replaced by their scalar values.
///
/// Unrecognized `&...` sequences are left untouched, matching the lenient
/// "leave the ampersand" behavior required of a forgiving sanitizer.
pub fn decode(ctx: &HtmlContext, input: &[u8]) -> Box<[u8]> {
    let mut decoded: Vec<u8> = Vec::with_capacity(input.len());
    let end = input.len();
    let mut at = 0;
    let mut was_at = 0;

    while at < end {
        let next_amp_at = match memchr::memchr(b'&', &input[at..]) {
            Some(pos) => at + pos,
            None => break,
        };

        if let Some((reference, token_len)) = decode_html_ref(ctx, input, next_amp_at) {
            if *ctx == HtmlContext::Attribute {
                let is_ambiguous_terminator = input[next_amp_at + token_len - 1] != b';';
                let followed_by_name_char = end > next_amp_at + token_len
                    && (input[next_amp_at + token_len].is_ascii_alphanumeric()
                        || input[next_amp_at + token_len] == b'=');
                if is_ambiguous_terminator && followed_by_name_char {
                    at = next_amp_at + 1;
                    continue;
                }
            }

            decoded.extend_from_slice(&input[was_at..next_amp_at]);
            decoded.extend_from_slice(&reference);
            at = next_amp_at + token_len;
            was_at = at;
            continue;
        }

        at = next_amp_at + 1;
    }

    if was_at < end {
        decoded.extend_from_slice(&input[was_at..]);
    }

    decoded.into_boxed_slice()
}

/// Decodes a single character reference starting at `offset`, where
/// `input[offset] == b'&'`. Returns the decoded bytes and the length of the
/// matched reference (including the leading `&` and, if present, the trailing
/// `;`), or `None` if no reference starts there.
pub fn decode_html_ref(ctx: &HtmlContext, input: &[u8], offset: usize) -> Option<(Box<[u8]>, usize)> {
    if input.len() < offset + 2 || input[offset] != b'&' {
        return None;
    }

    if input.get(offset + 1) == Some(&b'#') {
        return decode_html5_numeric_character_reference(input, offset);
    }

    decode_named_character_reference(ctx, input, offset)
}

fn decode_named_character_reference(
    _ctx: &HtmlContext,
    input: &[u8],
    offset: usize,
) -> Option<(Box<[u8]>, usize)> {
    // Longest match wins: HTML allows both `&amp` and `&amp;`, and some names
    // are prefixes of others (`&not` vs `&notin;`).
    let remaining = &input[offset + 1..];
    let max_len = remaining.len().min(MAX_ENTITY_NAME_LEN);

    (1..=max_len).rev().find_map(|len| {
        let candidate = &remaining[..len];
        NAMED_ENTITIES
            .get(candidate)
            .map(|bytes| ((*bytes).into(), 1 + len))
    })
}

static HEX_DIGITS: [u8; 256] = build_hex_digit_table();

// Windows-1252 remapping for the C1 control range, per the WHATWG numeric
// character reference end state.
const CP1252_REPLACEMENTS: [u32; 32] = [
    0x20AC, 0x81, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0x8D, 0x017D, 0x8F, 0x90, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014,
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x9D, 0x017E, 0x0178,
];

fn decode_html5_numeric_character_reference(
    input: &[u8],
    offset: usize,
) -> Option<(Box<[u8]>, usize)> {
    let end = input.len();
    let mut at = offset;

    if end < offset + 3 || input[at] != b'&' || input[at + 1] != b'#' {
        return None;
    }
    at += 2;

    #[derive(PartialEq)]
    enum Base {
        Decimal,
        Hexadecimal,
    }

    let base = if at < end && (input[at] | 0x20) == b'x' {
        at += 1;
        Base::Hexadecimal
    } else {
        Base::Decimal
    };

    let zeros_at = at;
    while at < end && input[at] == b'0' {
        at += 1;
    }
    let zero_count = at - zeros_at;

    let digits_at = at;
    if base == Base::Hexadecimal {
        while at < end && HEX_DIGITS[input[at] as usize] <= 0xF {
            at += 1;
        }
    } else {
        while at < end && HEX_DIGITS[input[at] as usize] <= 0x9 {
            at += 1;
        }
    }
    let digit_count = at - digits_at;
    let after_digits = at;

    if zero_count == 0 && digit_count == 0 {
        // "&#" or "&#x" with no digits at all is not a character reference.
        return None;
    }

    let has_trailing_semicolon = after_digits < end && input[after_digits] == b';';
    let end_of_span = if has_trailing_semicolon {
        after_digits + 1
    } else {
        after_digits
    };
    let matched_len = end_of_span - offset;

    if digit_count == 0 {
        return Some((UNICODE_REPLACEMENT_CHAR.into(), matched_len));
    }
    if digit_count > if base == Base::Hexadecimal { 6 } else { 7 } {
        return Some((UNICODE_REPLACEMENT_CHAR.into(), matched_len));
    }

    let mut code_point = 0u32;
    at = digits_at;
    for _ in 0..digit_count {
        let digit = HEX_DIGITS[input[at] as usize] as u32;
        code_point = if base == Base::Hexadecimal {
            code_point * 16 + digit
        } else {
            code_point * 10 + digit
        };
        at += 1;
    }

    if (0x80..=0x9F).contains(&code_point) {
        code_point = CP1252_REPLACEMENTS[(code_point - 0x80) as usize];
    }

    if is_xml_excluded_code_point(code_point) {
        return Some((UNICODE_REPLACEMENT_CHAR.into(), matched_len));
    }

    Some((html5_code_point_to_utf8_bytes(code_point), matched_len))
}

/// Whether a scalar value falls outside the XML `Char` production the
/// sanitizer's encoding layer is required to exclude: lone surrogates,
/// noncharacters, and C0/C1 controls other than tab, LF, and CR.
pub fn is_xml_excluded_code_point(code_point: u32) -> bool {
    matches!(code_point, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F)
        || matches!(code_point, 0x7F..=0x9F)
        || matches!(code_point, 0xD800..=0xDFFF)
        || matches!(code_point, 0xFDD0..=0xFDEF)
        || (code_point & 0xFFFE) == 0xFFFE
}

fn html5_code_point_to_utf8_bytes(code_point: u32) -> Box<[u8]> {
    let Some(c) = char::from_u32(code_point) else {
        return UNICODE_REPLACEMENT_CHAR.into();
    };
    let mut buf = [0u8; 4];
    c.encode_utf8(&mut buf);
    buf[..c.len_utf8()].into()
}

const fn build_hex_digit_table() -> [u8; 256] {
    let mut table = [255u8; 256];
    let mut i = 0u8;
    while i < 10 {
        table[(b'0' + i) as usize] = i;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        table[(b'a' + i) as usize] = 10 + i;
        table[(b'A' + i) as usize] = 10 + i;
        i += 1;
    }
    table
}

const MAX_ENTITY_NAME_LEN: usize = 31;

lazy_static! {
    /// Named character references, keyed without the leading `&` or trailing `;`.
    ///
    /// This is a practical subset of the HTML5 named-reference table: the HTML4
    /// entities plus the handful of HTML5 additions sanitizer callers commonly
    /// rely on (`apos`, typographic punctuation, arrows, and the common math
    /// symbols). Anything absent here is left as a literal ampersand, which is
    /// always a safe fallback.
    static ref NAMED_ENTITIES: HashMap<&'static [u8], &'static [u8]> = {
        let mut m = HashMap::with_capacity(ENTITY_TABLE.len());
        for (name, bytes) in ENTITY_TABLE {
            m.insert(name.as_bytes(), *bytes);
        }
        m
    };
}

macro_rules! entities {
    ($($name:literal => $value:literal),* $(,)?) => {
        &[$(($name, $value.as_bytes())),*]
    };
}

static ENTITY_TABLE: &[(&str, &[u8])] = entities! {
    "amp" => "&", "amp;" => "&",
    "lt" => "<", "lt;" => "<",
    "gt" => ">", "gt;" => ">",
    "quot" => "\"", "quot;" => "\"",
    "apos;" => "'",
    "nbsp" => "\u{A0}", "nbsp;" => "\u{A0}",
    "copy" => "\u{A9}", "copy;" => "\u{A9}",
    "reg" => "\u{AE}", "reg;" => "\u{AE}",
    "trade;" => "\u{2122}",
    "times" => "\u{D7}", "times;" => "\u{D7}",
    "divide" => "\u{F7}", "divide;" => "\u{F7}",
    "deg" => "\u{B0}", "deg;" => "\u{B0}",
    "plusmn" => "\u{B1}", "plusmn;" => "\u{B1}",
    "frac12" => "\u{BD}", "frac12;" => "\u{BD}",
    "frac14" => "\u{BC}", "frac14;" => "\u{BC}",
    "frac34" => "\u{BE}", "frac34;" => "\u{BE}",
    "sup1" => "\u{B9}", "sup1;" => "\u{B9}",
    "sup2" => "\u{B2}", "sup2;" => "\u{B2}",
    "sup3" => "\u{B3}", "sup3;" => "\u{B3}",
    "para" => "\u{B6}", "para;" => "\u{B6}",
    "sect" => "\u{A7}", "sect;" => "\u{A7}",
    "micro" => "\u{B5}", "micro;" => "\u{B5}",
    "middot" => "\u{B7}", "middot;" => "\u{B7}",
    "laquo" => "\u{AB}", "laquo;" => "\u{AB}",
    "raquo" => "\u{BB}", "raquo;" => "\u{BB}",
    "iexcl" => "\u{A1}", "iexcl;" => "\u{A1}",
    "iquest" => "\u{BF}", "iquest;" => "\u{BF}",
    "cent" => "\u{A2}", "cent;" => "\u{A2}",
    "pound" => "\u{A3}", "pound;" => "\u{A3}",
    "yen" => "\u{A5}", "yen;" => "\u{A5}",
    "euro;" => "\u{20AC}",
    "curren" => "\u{A4}", "curren;" => "\u{A4}",
    "brvbar" => "\u{A6}", "brvbar;" => "\u{A6}",
    "uml" => "\u{A8}", "uml;" => "\u{A8}",
    "ordf" => "\u{AA}", "ordf;" => "\u{AA}",
    "ordm" => "\u{BA}", "ordm;" => "\u{BA}",
    "not" => "\u{AC}", "not;" => "\u{AC}",
    "shy" => "\u{AD}", "shy;" => "\u{AD}",
    "macr" => "\u{AF}", "macr;" => "\u{AF}",
    "acute" => "\u{B4}", "acute;" => "\u{B4}",
    "cedil" => "\u{B8}", "cedil;" => "\u{B8}",
    "szlig" => "\u{DF}", "szlig;" => "\u{DF}",
    "Agrave" => "\u{C0}", "Agrave;" => "\u{C0}",
    "Aacute" => "\u{C1}", "Aacute;" => "\u{C1}",
    "Acirc" => "\u{C2}", "Acirc;" => "\u{C2}",
    "Atilde" => "\u{C3}", "Atilde;" => "\u{C3}",
    "Auml" => "\u{C4}", "Auml;" => "\u{C4}",
    "Aring" => "\u{C5}", "Aring;" => "\u{C5}",
    "AElig" => "\u{C6}", "AElig;" => "\u{C6}",
    "Ccedil" => "\u{C7}", "Ccedil;" => "\u{C7}",
    "Egrave" => "\u{C8}", "Egrave;" => "\u{C8}",
    "Eacute" => "\u{C9}", "Eacute;" => "\u{C9}",
    "Ecirc" => "\u{CA}", "Ecirc;" => "\u{CA}",
    "Euml" => "\u{CB}", "Euml;" => "\u{CB}",
    "Igrave" => "\u{CC}", "Igrave;" => "\u{CC}",
    "Iacute" => "\u{CD}", "Iacute;" => "\u{CD}",
    "Icirc" => "\u{CE}", "Icirc;" => "\u{CE}",
    "Iuml" => "\u{CF}", "Iuml;" => "\u{CF}",
    "ETH" => "\u{D0}", "ETH;" => "\u{D0}",
    "Ntilde" => "\u{D1}", "Ntilde;" => "\u{D1}",
    "Ograve" => "\u{D2}", "Ograve;" => "\u{D2}",
    "Oacute" => "\u{D3}", "Oacute;" => "\u{D3}",
    "Ocirc" => "\u{D4}", "Ocirc;" => "\u{D4}",
    "Otilde" => "\u{D5}", "Otilde;" => "\u{D5}",
    "Ouml" => "\u{D6}", "Ouml;" => "\u{D6}",
    "Oslash" => "\u{D8}", "Oslash;" => "\u{D8}",
    "Ugrave" => "\u{D9}", "Ugrave;" => "\u{D9}",
    "Uacute" => "\u{DA}", "Uacute;" => "\u{DA}",
    "Ucirc" => "\u{DB}", "Ucirc;" => "\u{DB}",
    "Uuml" => "\u{DC}", "Uuml;" => "\u{DC}",
    "Yacute" => "\u{DD}", "Yacute;" => "\u{DD}",
    "THORN" => "\u{DE}", "THORN;" => "\u{DE}",
    "agrave" => "\u{E0}", "agrave;" => "\u{E0}",
    "aacute" => "\u{E1}", "aacute;" => "\u{E1}",
    "acirc" => "\u{E2}", "acirc;" => "\u{E2}",
    "atilde" => "\u{E3}", "atilde;" => "\u{E3}",
    "auml" => "\u{E4}", "auml;" => "\u{E4}",
    "aring" => "\u{E5}", "aring;" => "\u{E5}",
    "aelig" => "\u{E6}", "aelig;" => "\u{E6}",
    "ccedil" => "\u{E7}", "ccedil;" => "\u{E7}",
    "egrave" => "\u{E8}", "egrave;" => "\u{E8}",
    "eacute" => "\u{E9}", "eacute;" => "\u{E9}",
    "ecirc" => "\u{EA}", "ecirc;" => "\u{EA}",
    "euml" => "\u{EB}", "euml;" => "\u{EB}",
    "igrave" => "\u{EC}", "igrave;" => "\u{EC}",
    "iacute" => "\u{ED}", "iacute;" => "\u{ED}",
    "icirc" => "\u{EE}", "icirc;" => "\u{EE}",
    "iuml" => "\u{EF}", "iuml;" => "\u{EF}",
    "eth" => "\u{F0}", "eth;" => "\u{F0}",
    "ntilde" => "\u{F1}", "ntilde;" => "\u{F1}",
    "ograve" => "\u{F2}", "ograve;" => "\u{F2}",
    "oacute" => "\u{F3}", "oacute;" => "\u{F3}",
    "ocirc" => "\u{F4}", "ocirc;" => "\u{F4}",
    "otilde" => "\u{F5}", "otilde;" => "\u{F5}",
    "ouml" => "\u{F6}", "ouml;" => "\u{F6}",
    "oslash" => "\u{F8}", "oslash;" => "\u{F8}",
    "ugrave" => "\u{F9}", "ugrave;" => "\u{F9}",
    "uacute" => "\u{FA}", "uacute;" => "\u{FA}",
    "ucirc" => "\u{FB}", "ucirc;" => "\u{FB}",
    "uuml" => "\u{FC}", "uuml;" => "\u{FC}",
    "yacute" => "\u{FD}", "yacute;" => "\u{FD}",
    "thorn" => "\u{FE}", "thorn;" => "\u{FE}",
    "yuml" => "\u{FF}", "yuml;" => "\u{FF}",
    "hellip;" => "\u{2026}",
    "ndash;" => "\u{2013}",
    "mdash;" => "\u{2014}",
    "lsquo;" => "\u{2018}",
    "rsquo;" => "\u{2019}",
    "sbquo;" => "\u{201A}",
    "ldquo;" => "\u{201C}",
    "rdquo;" => "\u{201D}",
    "bdquo;" => "\u{201E}",
    "dagger;" => "\u{2020}",
    "Dagger;" => "\u{2021}",
    "bull;" => "\u{2022}",
    "prime;" => "\u{2032}",
    "Prime;" => "\u{2033}",
    "lsaquo;" => "\u{2039}",
    "rsaquo;" => "\u{203A}",
    "oline;" => "\u{203E}",
    "frasl;" => "\u{2044}",
    "larr;" => "\u{2190}",
    "uarr;" => "\u{2191}",
    "rarr;" => "\u{2192}",
    "darr;" => "\u{2193}",
    "harr;" => "\u{2194}",
    "crarr;" => "\u{21B5}",
    "forall;" => "\u{2200}",
    "part;" => "\u{2202}",
    "exist;" => "\u{2203}",
    "empty;" => "\u{2205}",
    "nabla;" => "\u{2207}",
    "isin;" => "\u{2208}",
    "notin;" => "\u{2209}",
    "ni;" => "\u{220B}",
    "prod;" => "\u{220F}",
    "sum;" => "\u{2211}",
    "minus;" => "\u{2212}",
    "lowast;" => "\u{2217}",
    "radic;" => "\u{221A}",
    "prop;" => "\u{221D}",
    "infin;" => "\u{221E}",
    "ang;" => "\u{2220}",
    "and;" => "\u{2227}",
    "or;" => "\u{2228}",
    "cap;" => "\u{2229}",
    "cup;" => "\u{222A}",
    "int;" => "\u{222B}",
    "there4;" => "\u{2234}",
    "sim;" => "\u{223C}",
    "cong;" => "\u{2245}",
    "asymp;" => "\u{2248}",
    "ne;" => "\u{2260}",
    "equiv;" => "\u{2261}",
    "le;" => "\u{2264}",
    "ge;" => "\u{2265}",
    "sub;" => "\u{2282}",
    "sup;" => "\u{2283}",
    "nsub;" => "\u{2284}",
    "sube;" => "\u{2286}",
    "supe;" => "\u{2287}",
    "oplus;" => "\u{2295}",
    "otimes;" => "\u{2297}",
    "perp;" => "\u{22A5}",
    "sdot;" => "\u{22C5}",
    "lceil;" => "\u{2308}",
    "rceil;" => "\u{2309}",
    "lfloor;" => "\u{230A}",
    "rfloor;" => "\u{230B}",
    "lang;" => "\u{27E8}",
    "rang;" => "\u{27E9}",
    "loz;" => "\u{25CA}",
    "spades;" => "\u{2660}",
    "clubs;" => "\u{2663}",
    "hearts;" => "\u{2665}",
    "diams;" => "\u{2666}",
    "fnof;" => "\u{0192}",
    "circ;" => "\u{02C6}",
    "tilde;" => "\u{02DC}",
    "ensp;" => "\u{2002}",
    "emsp;" => "\u{2003}",
    "thinsp;" => "\u{2009}",
    "zwnj;" => "\u{200C}",
    "zwj;" => "\u{200D}",
    "lrm;" => "\u{200E}",
    "rlm;" => "\u{200F}",
    "OElig;" => "\u{0152}",
    "oelig;" => "\u{0153}",
    "Scaron;" => "\u{0160}",
    "scaron;" => "\u{0161}",
    "Yuml;" => "\u{0178}",
    "alpha;" => "\u{03B1}", "Alpha;" => "\u{0391}",
    "beta;" => "\u{03B2}", "Beta;" => "\u{0392}",
    "gamma;" => "\u{03B3}", "Gamma;" => "\u{0393}",
    "delta;" => "\u{03B4}", "Delta;" => "\u{0394}",
    "epsilon;" => "\u{03B5}", "Epsilon;" => "\u{0395}",
    "zeta;" => "\u{03B6}", "Zeta;" => "\u{0396}",
    "eta;" => "\u{03B7}", "Eta;" => "\u{0397}",
    "theta;" => "\u{03B8}", "Theta;" => "\u{0398}",
    "iota;" => "\u{03B9}", "Iota;" => "\u{0399}",
    "kappa;" => "\u{03BA}", "Kappa;" => "\u{039A}",
    "lambda;" => "\u{03BB}", "Lambda;" => "\u{039B}",
    "mu;" => "\u{03BC}", "Mu;" => "\u{039C}",
    "nu;" => "\u{03BD}", "Nu;" => "\u{039D}",
    "xi;" => "\u{03BE}", "Xi;" => "\u{039E}",
    "omicron;" => "\u{03BF}", "Omicron;" => "\u{039F}",
    "pi;" => "\u{03C0}", "Pi;" => "\u{03A0}",
    "rho;" => "\u{03C1}", "Rho;" => "\u{03A1}",
    "sigma;" => "\u{03C3}", "Sigma;" => "\u{03A3}",
    "sigmaf;" => "\u{03C2}",
    "tau;" => "\u{03C4}", "Tau;" => "\u{03A4}",
    "upsilon;" => "\u{03C5}", "Upsilon;" => "\u{03A5}",
    "phi;" => "\u{03C6}", "Phi;" => "\u{03A6}",
    "chi;" => "\u{03C7}", "Chi;" => "\u{03A7}",
    "psi;" => "\u{03C8}", "Psi;" => "\u{03A8}",
    "omega;" => "\u{03C9}", "Omega;" => "\u{03A9}",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_common_named_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&amp;", 0),
            Some((b"&".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&lt;", 0),
            Some((b"<".as_slice().into(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&nbsp", 0),
            Some((b"\xC2\xA0".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&nbsp;", 0),
            Some((b"\xC2\xA0".as_slice().into(), 6))
        );
    }

    #[test]
    fn longest_match_prefers_longer_name() {
        // "&notin;" must decode as a single entity, not "&not" + "in;".
        let (bytes, len) = decode_html_ref(&HtmlContext::BodyText, b"&notin;", 0).unwrap();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "\u{2209}");
        assert_eq!(len, 7);

        // But "&notanentity;" only matches the "not" prefix.
        let (decoded, token_len) =
            decode_html_ref(&HtmlContext::BodyText, b"&notanentity;", 0).unwrap();
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "\u{AC}");
        assert_eq!(token_len, 4);
    }

    #[test]
    fn unknown_entity_is_left_alone() {
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&zzzzz;", 0), None);
        let decoded = decode(&HtmlContext::BodyText, b"a &zzzzz; b");
        assert_eq!(&*decoded, b"a &zzzzz; b");
    }

    #[test]
    fn test_numeric_decimal_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#65;", 0),
            Some((b"A".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#8364;", 0),
            Some((b"\xE2\x82\xAC".as_slice().into(), 7))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#65", 0),
            Some((b"A".as_slice().into(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#0065;", 0),
            Some((b"A".as_slice().into(), 7))
        );
    }

    #[test]
    fn test_numeric_hex_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x41;", 0),
            Some((b"A".as_slice().into(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#X41;", 0),
            Some((b"A".as_slice().into(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x20AC;", 0),
            Some((b"\xE2\x82\xAC".as_slice().into(), 8))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x41", 0),
            Some((b"A".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x0041;", 0),
            Some((b"A".as_slice().into(), 8))
        );
    }

    #[test]
    fn test_cp1252_replacements() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#128;", 0),
            Some((b"\xE2\x82\xAC".as_slice().into(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#130;", 0),
            Some((b"\xE2\x80\x9A".as_slice().into(), 6))
        );
    }

    #[test]
    fn test_invalid_entities() {
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#xD800;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 8))
        );
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&#;", 0), None);
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#0;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x1234567;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 11))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#12345678;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 11))
        );
    }

    #[test]
    fn noncharacter_and_control_code_points_become_replacement_char() {
        // U+FFFE is a noncharacter.
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#xFFFE;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 8))
        );
        // U+0001 is a disallowed C0 control.
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#1;", 0),
            Some((UNICODE_REPLACEMENT_CHAR.into(), 4))
        );
        // Tab, LF, and CR remain permitted control characters.
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#9;", 0),
            Some((b"\t".as_slice().into(), 4))
        );
    }

    #[test]
    fn test_entity_with_offset() {
        let input = b"text&amp;more";
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, input, 4),
            Some((b"&".as_slice().into(), 5))
        );
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, input, 10), None);
    }

    #[test]
    fn test_non_entity_input() {
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"text", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&;", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&A;", 0), None);
        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&AE;", 0), None);
    }

    #[test]
    fn test_php_reference_cases() {
        // Cases drawn from PHP's decode_html_ref_1.phpt test fixture, which this
        // function's behavior is deliberately compatible with.
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#38;", 0),
            Some((b"&".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x26;", 0),
            Some((b"&".as_slice().into(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#X26;", 0),
            Some((b"&".as_slice().into(), 6))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&amp;", 0),
            Some((b"&".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#0038;", 0),
            Some((b"&".as_slice().into(), 7))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x0026;", 0),
            Some((b"&".as_slice().into(), 8))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#38 xxx", 0),
            Some((b"&".as_slice().into(), 4))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&#x26 xxx", 0),
            Some((b"&".as_slice().into(), 5))
        );
        assert_eq!(
            decode_html_ref(&HtmlContext::BodyText, b"&amp xxx", 0),
            Some((b"&".as_slice().into(), 4))
        );

        let input = b"Simultaneously testing numeric (&#0038;) and named (&amp;) entities";
        let (decoded, token_len) = decode_html_ref(&HtmlContext::BodyText, input, 32).unwrap();
        assert_eq!(String::from_utf8_lossy(&decoded), "&");
        assert_eq!(token_len, 7);
        let (decoded, token_len) = decode_html_ref(&HtmlContext::BodyText, input, 52).unwrap();
        assert_eq!(String::from_utf8_lossy(&decoded), "&");
        assert_eq!(token_len, 5);

        assert_eq!(decode_html_ref(&HtmlContext::BodyText, b"&;", 0), None);
    }

    #[test]
    fn ambiguous_ampersand_in_attribute_is_not_decoded() {
        // "&notice" could start "&not", but with no semicolon and a following
        // alphanumeric it must stay literal per the attribute-value rules.
        let decoded = decode(&HtmlContext::Attribute, b"a&noticeb");
        assert_eq!(&*decoded, b"a&noticeb");
    }

    #[test]
    fn ambiguous_ampersand_in_body_text_is_decoded() {
        let decoded = decode(&HtmlContext::BodyText, b"a&notb");
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "a\u{AC}b");
    }

    #[test]
    fn ambiguous_ampersand_terminated_by_semicolon_always_decodes() {
        let decoded = decode(&HtmlContext::Attribute, b"a&not;b");
        assert_eq!(String::from_utf8(decoded.to_vec()).unwrap(), "a\u{AC}b");
    }
}
