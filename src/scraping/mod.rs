use encoding_rs::{Encoding, UTF_8, WINDOWS_1250};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::{MAX_PER_PAGE, MIN_CONTENT_CHARS, SCRAPE_TIMEOUT};
use crate::core::text::clamp_bytes;
use crate::core::types::Source;

// ─────────────────────────────────────────────────────────────────────────────
// Content extractor — turns a competitor URL into cleaned paragraph text plus
// its <h2> outline. Failure is always non-fatal: the caller gets None and the
// scrape pool keeps going.
// ─────────────────────────────────────────────────────────────────────────────

/// Realistic desktop user agents, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

fn random_user_agent() -> &'static str {
    use rand::RngExt;
    let mut rng = rand::rng();
    USER_AGENTS[rng.random_range(0..USER_AGENTS.len())]
}

static BLOCKED_URL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)//bip\.",
        r"(?i)\.gov\.pl/.*(?:upload|attachment|download)",
        r"(?i)\.pdf(?:$|\?)",
        r"(?i)\.docx?(?:$|\?)",
        r"(?i)\.xlsx?(?:$|\?)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static url pattern"))
    .collect()
});

/// URLs that never yield usable article text (document files, BIP registers).
pub fn is_blocked_url(url: &str) -> bool {
    BLOCKED_URL_RES.iter().any(|re| re.is_match(url))
}

/// Fetch one competitor page and reduce it to a `Source`.
///
/// `title` comes from the SERP item; pages carry their own titles but the
/// SERP variant is what the brief reports.
pub async fn fetch_source(client: &reqwest::Client, url: &str, title: &str) -> Option<Source> {
    if is_blocked_url(url) {
        debug!("skipping blocked url: {}", url);
        return None;
    }
    let parsed_url = Url::parse(url).ok()?;

    let response = match client
        .get(parsed_url.clone())
        .timeout(SCRAPE_TIMEOUT)
        .header("User-Agent", random_user_agent())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "pl-PL,pl;q=0.9,en-US;q=0.7,en;q=0.5")
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("scrape failed for {}: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        warn!("scrape got http {} for {}", response.status(), url);
        return None;
    }

    let declared_charset = charset_from_headers(&response);
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            warn!("scrape body read failed for {}: {}", url, e);
            return None;
        }
    };

    let html = decode_html(&bytes, declared_charset.as_deref());
    let h2 = extract_h2_list(&html);

    let prepared = prepare_html(&html);
    let text = extract_body_text(&prepared, &parsed_url);
    let text = clamp_bytes(&text, MAX_PER_PAGE).to_string();

    if text.chars().count() < MIN_CONTENT_CHARS {
        debug!("rejecting {} — only {} chars after cleaning", url, text.chars().count());
        return None;
    }

    if let Some(info) = whatlang::detect(&text) {
        if info.lang() != whatlang::Lang::Pol {
            warn!("scraped {} looks like {:?}, not Polish", url, info.lang());
        }
    }

    let word_count = text.split_whitespace().count();
    info!("scraped {} — {} words, {} h2s", url, word_count, h2.len());

    Some(Source {
        url: url.to_string(),
        title: title.to_string(),
        text,
        h2,
        word_count,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding resolution
// ─────────────────────────────────────────────────────────────────────────────

fn charset_from_headers(response: &reqwest::Response) -> Option<String> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()?;
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .next()
        .map(|cs| cs.trim_matches('"').to_string())
}

static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([a-zA-Z0-9_-]+)"#).expect("static pattern")
});

/// Declared charset wins; otherwise strict UTF-8, then Windows-1250 (the
/// dominant legacy encoding on Polish sites), then lossy UTF-8.
fn decode_html(bytes: &[u8], declared: Option<&str>) -> String {
    let declared = declared.map(str::to_string).or_else(|| {
        let head = &bytes[..bytes.len().min(2048)];
        let head_str = String::from_utf8_lossy(head);
        META_CHARSET_RE
            .captures(&head_str)
            .map(|c| c[1].to_string())
    });

    if let Some(label) = declared {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            let (text, _, _) = encoding.decode(bytes);
            return text.into_owned();
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let (text, _, had_errors) = WINDOWS_1250.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    UTF_8.decode(bytes).0.into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// H2 harvesting — done on the full raw HTML before any truncation
// ─────────────────────────────────────────────────────────────────────────────

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));
static CSS_SIG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[{};]|-webkit-|var\(|aria-").expect("static pattern"));

pub fn extract_h2_list(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h2") else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for element in document.select(&selector) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || text.chars().count() > 200 || CSS_SIG_RE.is_match(&text) {
            continue;
        }
        out.push(text);
        if out.len() >= 15 {
            break;
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&oacute;", "ó")
        .replace("&Oacute;", "Ó")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

// ─────────────────────────────────────────────────────────────────────────────
// Body extraction
// ─────────────────────────────────────────────────────────────────────────────

static STRIP_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style|svg|noscript)[^>]*?>.*?</(?:script|style|svg|noscript)>")
        .expect("static pattern")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static pattern"));
static STRUCTURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:nav|footer|header|aside)[^>]*?>.*?</(?:nav|footer|header|aside)>")
        .expect("static pattern")
});
static INLINE_CSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("static pattern"));

/// Oversized documents get scripts/styles/comments stripped and are cut to
/// three page budgets before the extraction pass.
fn prepare_html(html: &str) -> String {
    if html.len() <= 2 * MAX_PER_PAGE {
        return html.to_string();
    }
    let stripped = STRIP_BLOCK_RE.replace_all(html, " ");
    let stripped = COMMENT_RE.replace_all(&stripped, " ");
    clamp_bytes(&stripped, 3 * MAX_PER_PAGE).to_string()
}

fn extract_body_text(html: &str, base_url: &Url) -> String {
    match readability::extractor::extract(&mut html.as_bytes(), base_url) {
        Ok(product) => {
            let cleaned = collapse_whitespace(&product.text);
            if cleaned.chars().count() >= MIN_CONTENT_CHARS {
                return cleaned;
            }
            debug!("readability produced only {} chars, using regex fallback", cleaned.len());
            regex_fallback_extraction(html)
        }
        Err(e) => {
            debug!("readability failed ({}), using regex fallback", e);
            regex_fallback_extraction(html)
        }
    }
}

fn regex_fallback_extraction(html: &str) -> String {
    let stripped = STRIP_BLOCK_RE.replace_all(html, " ");
    let stripped = COMMENT_RE.replace_all(&stripped, " ");
    let stripped = STRUCTURAL_RE.replace_all(&stripped, " ");
    let stripped = INLINE_CSS_RE.replace_all(&stripped, " ");
    let stripped = TAG_RE.replace_all(&stripped, " ");
    collapse_whitespace(&decode_entities(&stripped))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_urls_are_skipped() {
        assert!(is_blocked_url("https://bip.warszawa.pl/sprawa"));
        assert!(is_blocked_url("https://example.gov.pl/uploads/wzor.docx"));
        assert!(is_blocked_url("https://example.pl/cennik.pdf"));
        assert!(!is_blocked_url("https://example.pl/rozwod-warszawa"));
    }

    #[test]
    fn h2_harvest_strips_tags_and_css() {
        let html = r#"
            <h2>Rozwód <em>krok po kroku</em></h2>
            <h2>.widget { color: red; }</h2>
            <h2>Ile kosztuje rozw&oacute;d?</h2>
        "#;
        let h2 = extract_h2_list(html);
        assert_eq!(h2, vec!["Rozwód krok po kroku", "Ile kosztuje rozwód?"]);
    }

    #[test]
    fn windows_1250_fallback_decodes_polish() {
        // "rozwód" in Windows-1250: ó = 0xF3
        let bytes = b"rozw\xf3d";
        assert_eq!(decode_html(bytes, None), "rozwód");
        // declared charset wins
        assert_eq!(decode_html(bytes, Some("windows-1250")), "rozwód");
    }

    #[test]
    fn regex_fallback_drops_chrome() {
        let html = r#"<html><body>
            <nav>Menu główne</nav>
            <script>var x = 1;</script>
            <p>Rozwód w Warszawie wymaga pozwu.</p>
            <footer>Stopka</footer>
        </body></html>"#;
        let text = regex_fallback_extraction(html);
        assert!(text.contains("Rozwód w Warszawie"));
        assert!(!text.contains("Menu główne"));
        assert!(!text.contains("var x"));
    }

}
