use std::time::Duration;

// ---------------------------------------------------------------------------
// Env-driven configuration. All accessors degrade to sane defaults so the
// engine starts with nothing configured and simply exposes fewer features.
// ---------------------------------------------------------------------------

pub const ENV_SERP_PROVIDER: &str = "SERP_PROVIDER";
pub const ENV_SERPAPI_KEY: &str = "SERPAPI_KEY";
pub const ENV_DATAFORSEO_LOGIN: &str = "DATAFORSEO_LOGIN";
pub const ENV_DATAFORSEO_PASSWORD: &str = "DATAFORSEO_PASSWORD";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ENTITY_SEO_ENABLED: &str = "ENTITY_SEO_ENABLED";
pub const ENV_GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

// ---------------------------------------------------------------------------
// Budgets (bytes unless noted). These bound every analyse call.
// ---------------------------------------------------------------------------

/// Cleaned text kept per competitor page.
pub const MAX_PER_PAGE: usize = 30 * 1024;
/// Total cleaned text accumulated across all pages of one analyse call.
pub const TOTAL_CONTENT_BUDGET: usize = 200 * 1024;
/// Per-source window fed to the language pipelines.
pub const ANALYSIS_WINDOW: usize = 50 * 1024;
/// Window for the high-signal pseudo-source.
pub const HIGH_SIGNAL_WINDOW: usize = 20 * 1024;
/// Window fed to the TF-IDF key-phrase extractor.
pub const KEYPHRASE_WINDOW: usize = 15 * 1024;
/// Pages shorter than this after cleaning are rejected.
pub const MIN_CONTENT_CHARS: usize = 500;
/// Corpus window for the causal extractor prompt.
pub const CAUSAL_CORPUS_WINDOW: usize = 8 * 1024;

pub const DEFAULT_RESULT_DEPTH: usize = 8;
pub const MAX_RESULT_DEPTH: usize = 20;

pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(8);
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const PAA_FALLBACK_TIMEOUT: Duration = Duration::from_secs(15);
pub const CAUSAL_TIMEOUT: Duration = Duration::from_secs(20);

/// Polish locale is the only validated one; both providers are pinned to it.
pub const SERP_LANGUAGE_CODE: &str = "pl";
pub const SERP_LOCATION_CODE: u32 = 2616;

/// Provider selection policy for the SERP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    DataForSeo,
    SerpApi,
    Auto,
}

pub fn serp_provider_mode() -> ProviderMode {
    match std::env::var(ENV_SERP_PROVIDER)
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "dataforseo" => ProviderMode::DataForSeo,
        "serpapi" => ProviderMode::SerpApi,
        _ => ProviderMode::Auto,
    }
}

pub fn serpapi_key() -> Option<String> {
    std::env::var(ENV_SERPAPI_KEY)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn dataforseo_credentials() -> Option<(String, String)> {
    let login = std::env::var(ENV_DATAFORSEO_LOGIN).ok()?;
    let password = std::env::var(ENV_DATAFORSEO_PASSWORD).ok()?;
    let login = login.trim().to_string();
    let password = password.trim().to_string();
    if login.is_empty() || password.is_empty() {
        return None;
    }
    Some((login, password))
}

pub fn anthropic_api_key() -> Option<String> {
    std::env::var(ENV_ANTHROPIC_API_KEY)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn openai_api_key() -> Option<String> {
    std::env::var(ENV_OPENAI_API_KEY)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Entity SEO block (entities, concepts, salience, placement) — default on.
pub fn entity_seo_enabled() -> bool {
    let Ok(v) = std::env::var(ENV_ENTITY_SEO_ENABLED) else {
        return true;
    };
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return true;
    }
    !matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled")
}

/// Document-store persistence is wired only when credentials are present.
pub fn persistence_enabled() -> bool {
    std::env::var(ENV_GOOGLE_APPLICATION_CREDENTIALS)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

pub fn scrape_concurrency() -> usize {
    std::env::var("SCRAPE_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(6)
        .max(1)
}

pub fn http_timeout_secs() -> u64 {
    std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30)
}

pub fn http_connect_timeout_secs() -> u64 {
    std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10)
}

pub fn serp_cache_ttl_secs() -> u64 {
    std::env::var("SERP_CACHE_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60 * 10)
}

/// Clamp a requested organic depth into the supported range.
pub fn clamp_depth(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_RESULT_DEPTH)
        .clamp(1, MAX_RESULT_DEPTH)
}
