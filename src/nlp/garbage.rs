use aho_corasick::AhoCorasick;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// ─────────────────────────────────────────────────────────────────────────────
// Web-garbage filter — classifies short strings as CSS/JS/HTML artefacts so
// they never reach the entity or n-gram pipelines. The blacklist is assembled
// once from six fixed dictionaries; classification is a ten-step cascade where
// the first hit wins.
// ─────────────────────────────────────────────────────────────────────────────

const CSS_TERMS: &[&str] = &[
    "align-items", "align-content", "background", "background-color", "background-image",
    "border", "border-radius", "border-color", "box-shadow", "box-sizing", "color",
    "cursor", "display", "flex", "flex-direction", "flex-wrap", "float", "font",
    "font-family", "font-size", "font-weight", "font-style", "gap", "grid",
    "grid-template", "height", "justify-content", "letter-spacing", "line-height",
    "margin", "margin-top", "margin-bottom", "max-width", "max-height", "min-width",
    "min-height", "opacity", "outline", "overflow", "padding", "padding-left",
    "padding-right", "position", "text-align", "text-decoration", "text-transform",
    "transform", "transition", "vertical-align", "visibility", "white-space", "width",
    "z-index", "inherit", "initial", "unset", "auto", "none", "block", "inline",
    "inline-block", "absolute", "relative", "fixed", "sticky", "static", "hidden",
    "visible", "solid", "dashed", "dotted", "transparent", "bold", "italic", "normal",
    "uppercase", "lowercase", "capitalize", "nowrap", "pointer", "hover", "focus",
    "active", "before", "after", "first-child", "last-child", "nth-child", "not",
    "root", "checked", "disabled", "visited", "calc", "var", "rgb", "rgba", "hsl",
    "hsla", "url", "linear-gradient", "translate", "rotate", "scale", "rem", "vh",
    "vw", "important",
];

const HTML_TERMS: &[&str] = &[
    "div", "span", "img", "href", "src", "alt", "ul", "li", "ol", "nav", "footer",
    "header", "aside", "section", "article", "iframe", "svg", "path", "tbody", "thead",
    "td", "th", "colspan", "rowspan", "input", "button", "label", "select", "option",
    "textarea", "form", "fieldset", "noscript", "canvas", "onclick", "onload",
    "placeholder", "tabindex", "srcset", "sizes", "loading", "lazyload", "lazy",
];

const JS_TERMS: &[&str] = &[
    "function", "return", "const", "let", "var", "typeof", "undefined", "null", "true",
    "false", "window", "document", "getelementbyid", "queryselector", "addeventlistener",
    "localstorage", "sessionstorage", "settimeout", "setinterval", "json", "parse",
    "stringify", "async", "await", "promise", "callback", "prototype", "constructor",
    "dataset", "classlist", "innerhtml", "textcontent", "appendchild", "preventdefault",
    "stoppropagation", "xmlhttprequest", "fetch", "navigator", "useragent",
];

const CMS_TERMS: &[&str] = &[
    "wp-content", "wp-includes", "wp-admin", "wp-block", "wp-image", "wp-caption",
    "wpcf7", "astra", "astra-advanced-hook", "ast-container", "elementor",
    "elementor-widget", "elementor-section", "elementor-column", "elementor-element",
    "et-pb", "et_pb_section", "et_pb_row", "et_pb_column", "et_pb_module", "divi",
    "woocommerce", "shortcode", "gutenberg", "has-text-align-center", "aligncenter",
    "alignleft", "alignright", "wp-caption-text",
];

const FRAMEWORK_TERMS: &[&str] = &[
    "container-fluid", "row", "col", "col-md", "col-sm", "col-lg", "col-xl", "btn",
    "btn-primary", "btn-secondary", "navbar", "navbar-brand", "dropdown",
    "dropdown-menu", "carousel", "modal", "modal-dialog", "tooltip", "popover", "badge",
    "alert", "card", "card-body", "list-group", "d-flex", "d-none", "d-block",
    "justify-center", "items-center", "text-center", "font-bold", "rounded", "shadow",
    "hover:bg", "focus:ring", "sm:flex", "md:grid", "lg:hidden", "callout",
    "top-bar", "title-bar", "orbit", "reveal", "switch", "sticky-container",
];

const PLATFORM_TERMS: &[&str] = &[
    "ytp", "ytd", "yt-core", "yt-spec", "ytimg", "videowall", "endscreen", "annotation",
    "gtag", "gtm", "ga-disable", "googletagmanager", "googlesyndication", "doubleclick",
    "adsbygoogle", "recaptcha", "grecaptcha", "fbevents", "fbq", "fb-root", "fb-like",
    "instagram-media", "twitter-tweet", "cookiebot", "onetrust", "cmplz", "gdpr",
    "consent-banner", "cookie-notice", "cookie-law-info",
];

const FONT_NAMES: &[&str] = &[
    "menlo", "arial", "helvetica", "verdana", "tahoma", "georgia", "courier",
    "consolas", "monaco", "roboto", "lato", "montserrat", "open sans", "sans-serif",
    "serif", "monospace", "times new roman", "segoe ui",
];

struct GarbageFilter {
    blacklist: HashSet<String>,
    signature_res: Vec<Regex>,
    cms_scanner: AhoCorasick,
    hex_re: Regex,
    truncated_re: Regex,
}

static FILTER: LazyLock<GarbageFilter> = LazyLock::new(build_filter);

fn build_filter() -> GarbageFilter {
    let mut blacklist = HashSet::new();
    for dict in [
        CSS_TERMS,
        HTML_TERMS,
        JS_TERMS,
        CMS_TERMS,
        FRAMEWORK_TERMS,
        PLATFORM_TERMS,
    ] {
        for term in dict {
            blacklist.insert((*term).to_string());
            // Segment expansion: "wp-content" also blocks "content"-as-artefact
            // variants like "wp" never reach entities on their own merits.
            for seg in term.split(['-', '_']) {
                if seg.chars().count() >= 3 {
                    blacklist.insert(seg.to_string());
                }
            }
        }
    }

    let signatures = [
        // vendor prefixes and CSS function calls
        r"-(?:webkit|moz|ms|o)-",
        r"(?:var|calc|rgba?|hsla?|url|translate|linear-gradient)\(",
        // numbers glued to CSS units
        r"^\d+(?:\.\d+)?(?:px|em|rem|vh|vw|pt|ex|ch|fr|ms|s|deg|%)$",
        r"\d(?:px|em|rem|vh|vw)\b",
        // BEM class names and data/aria attributes
        r"__[a-z0-9-]+|--[a-z0-9-]+",
        r"\b(?:data|aria)-[a-z-]+",
        // CMS / YouTube class stems
        r"\b(?:wp|et|ast|fl|vc|td|tdb)[-_][a-z0-9_-]+",
        r"\byt[a-z]*-[a-z-]+",
        // hex colours, URLs, HTML entities
        r"#[0-9a-fA-F]{3,8}\b",
        r"https?://|www\.",
        r"&[a-z]+;|&#\d+;",
        // minified identifier chains (a.b.c)
        r"^[a-z]\.[a-z](?:\.[a-z])*$",
    ];
    let signature_res = signatures
        .iter()
        .map(|p| Regex::new(p).expect("static garbage signature"))
        .collect();

    let cms_scanner = AhoCorasick::new(
        CMS_TERMS
            .iter()
            .chain(PLATFORM_TERMS.iter())
            .collect::<Vec<_>>(),
    )
    .expect("static scanner patterns");

    GarbageFilter {
        blacklist,
        signature_res,
        cms_scanner,
        hex_re: Regex::new(r"^[0-9a-f]{3,8}$").expect("static hex pattern"),
        truncated_re: Regex::new(r#"^[a-ząćęłńóśźż]{1,15}",\s"#).expect("static pattern"),
    }
}

const SPECIAL_CHARS: &str = "{}:;()[]<>=#.@_/\\|%&*+^~$";

/// True when the string is a CSS/JS/HTML artefact rather than language.
pub fn is_garbage(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    let f = &*FILTER;

    // 1. Exact blacklist hit.
    if f.blacklist.contains(lower.as_str()) {
        return true;
    }

    // 2. CSS/JS/HTML signature regexes (plus CMS/platform stems).
    if f.signature_res.iter().any(|re| re.is_match(&lower)) || f.cms_scanner.is_match(&lower) {
        return true;
    }

    // 3. Special-character density.
    let char_count = lower.chars().count();
    let special = lower.chars().filter(|c| SPECIAL_CHARS.contains(*c)).count();
    let threshold = if char_count < 20 { 0.08 } else { 0.12 };
    if char_count > 0 && special as f64 / char_count as f64 > threshold {
        return true;
    }

    // 4. Segment scan: any blacklisted segment condemns short strings,
    //    40% of segments condemn longer ones.
    let segments: Vec<&str> = lower
        .split(|c: char| "-_.;{}()[]".contains(c) || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if !segments.is_empty() {
        let hits = segments
            .iter()
            .filter(|s| f.blacklist.contains(**s))
            .count();
        if segments.len() <= 3 && hits > 0 {
            return true;
        }
        if segments.len() > 3 && hits * 10 >= segments.len() * 4 {
            return true;
        }
    }

    // 5. No letters at all, or digit-dominated alphanumerics.
    let alpha = lower.chars().filter(|c| c.is_alphabetic()).count();
    let digits = lower.chars().filter(|c| c.is_ascii_digit()).count();
    if alpha == 0 {
        return true;
    }
    if digits * 2 >= alpha + digits {
        return true;
    }

    // 6. camelCase identifiers.
    if camel_transitions(trimmed) >= 2 {
        return true;
    }

    // 7. Font names and font stacks.
    if FONT_NAMES.contains(&lower.as_str())
        || (lower.contains(',') && FONT_NAMES.iter().any(|fname| lower.contains(fname)))
    {
        return true;
    }

    // 8. Mojibake (broken UTF-8 re-decoded as Latin-1).
    if trimmed.contains('Ã') || trimmed.contains('Å') || trimmed.contains('Â') {
        return true;
    }

    // 9. Hex fragments (ids, color values with the hash stripped).
    if f.hex_re.is_match(&lower) {
        return true;
    }

    // 10. Truncated-sentence fragments left by sloppy extraction.
    if f.truncated_re.is_match(trimmed) {
        return true;
    }

    false
}

fn camel_transitions(s: &str) -> usize {
    let mut transitions = 0;
    let mut prev_lower = false;
    for c in s.chars() {
        if prev_lower && c.is_uppercase() {
            transitions += 1;
        }
        prev_lower = c.is_lowercase();
    }
    transitions
}

// ─────────────────────────────────────────────────────────────────────────────
// Text pre-cleaning shared by the NER and salience stages
// ─────────────────────────────────────────────────────────────────────────────

static CLEAN_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // CSS blocks, inline declarations, selectors, at-rules
        (Regex::new(r"\{[^}]*\}").expect("static"), " "),
        (
            Regex::new(r"[\w-]+\s*:\s*[\w#,.()\s%-]+;").expect("static"),
            " ",
        ),
        (Regex::new(r"@[\w-]+[^;{]*[;{]").expect("static"), " "),
        // leftover tags and CSS/JS calls
        (Regex::new(r"<[^>]+>").expect("static"), " "),
        (
            Regex::new(r"(?:var|calc|rgba?|hsla?|url)\s*\([^)]*\)").expect("static"),
            " ",
        ),
        (Regex::new(r"#[0-9a-fA-F]{3,8}\b").expect("static"), " "),
        (
            Regex::new(r"\d+(?:px|em|rem|vh|vw|pt|%)").expect("static"),
            " ",
        ),
    ]
});

/// Strip CSS/JS residue before a text hits NER or salience scoring.
pub fn clean_text_for_nlp(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (re, repl) in CLEAN_RES.iter() {
        cleaned = re.replace_all(&cleaned, *repl).into_owned();
    }
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
}
