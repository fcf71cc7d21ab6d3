pub mod paa_fallback;
pub mod providers;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::config::{self, ProviderMode, PROVIDER_TIMEOUT};
use crate::core::types::SerpResponse;
use crate::llm::LlmClient;

pub use providers::dataforseo::DataForSeoProvider;
pub use providers::serpapi::SerpApiProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("auth: {0}")]
    Auth(String),
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait SerpProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, keyword: &str, depth: usize) -> Result<SerpResponse, ProviderError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SerpClient — provider selection, cascading backfill, PAA generation
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic SERP access with the fallback policy:
///
/// * `auto` tries the primary provider first; a zero-organic response flags
///   it for the rest of the process lifetime and the secondary takes over.
/// * After the chosen provider answers, still-empty PAA / AI-overview /
///   featured-snippet fields are backfilled from the other provider.
/// * PAA empty after both providers → LLM question generation.
///
/// Every failure degrades to empty fields; this client never errors out of
/// the pipeline.
pub struct SerpClient {
    mode: ProviderMode,
    dataforseo: Option<Arc<dyn SerpProvider>>,
    serpapi: Option<Arc<dyn SerpProvider>>,
    llm: Arc<LlmClient>,
    /// Sticky for the process lifetime: set on the first zero-organic
    /// response from the primary provider, never cleared.
    dataforseo_auth_failed: AtomicBool,
}

impl SerpClient {
    pub fn from_env(http: reqwest::Client, llm: Arc<LlmClient>) -> Self {
        let dataforseo: Option<Arc<dyn SerpProvider>> = config::dataforseo_credentials()
            .map(|(login, password)| {
                Arc::new(DataForSeoProvider::new(http.clone(), login, password))
                    as Arc<dyn SerpProvider>
            });
        let serpapi: Option<Arc<dyn SerpProvider>> = config::serpapi_key()
            .map(|key| Arc::new(SerpApiProvider::new(http.clone(), key)) as Arc<dyn SerpProvider>);

        Self {
            mode: config::serp_provider_mode(),
            dataforseo,
            serpapi,
            llm,
            dataforseo_auth_failed: AtomicBool::new(false),
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.dataforseo.is_some() {
            names.push("dataforseo");
        }
        if self.serpapi.is_some() {
            names.push("serpapi");
        }
        names
    }

    pub fn primary_flagged(&self) -> bool {
        self.dataforseo_auth_failed.load(Ordering::Relaxed)
    }

    fn flag_primary(&self) {
        if !self.dataforseo_auth_failed.swap(true, Ordering::Relaxed) {
            warn!("dataforseo returned no organic results — skipping it for the rest of this process");
        }
    }

    fn provider_by_name(&self, name: &str) -> Option<Arc<dyn SerpProvider>> {
        match name {
            "dataforseo" => self.dataforseo.clone(),
            "serpapi" => self.serpapi.clone(),
            _ => None,
        }
    }

    /// Ordered candidates for the current mode, honoring the sticky flag.
    fn candidates(&self) -> Vec<Arc<dyn SerpProvider>> {
        match self.mode {
            ProviderMode::DataForSeo => self.dataforseo.iter().cloned().collect(),
            ProviderMode::SerpApi => self.serpapi.iter().cloned().collect(),
            ProviderMode::Auto => {
                let mut out = Vec::new();
                if !self.primary_flagged() {
                    if let Some(p) = &self.dataforseo {
                        out.push(Arc::clone(p));
                    }
                }
                if let Some(p) = &self.serpapi {
                    out.push(Arc::clone(p));
                }
                out
            }
        }
    }

    async fn run_provider(
        &self,
        provider: &Arc<dyn SerpProvider>,
        keyword: &str,
        depth: usize,
    ) -> Option<SerpResponse> {
        match tokio::time::timeout(PROVIDER_TIMEOUT, provider.fetch(keyword, depth)).await {
            Ok(Ok(resp)) => Some(resp),
            Ok(Err(e)) => {
                warn!("provider '{}' failed: {}", provider.name(), e);
                None
            }
            Err(_) => {
                warn!(
                    "provider '{}' timed out after {}s",
                    provider.name(),
                    PROVIDER_TIMEOUT.as_secs()
                );
                None
            }
        }
    }

    /// Fetch the SERP for a keyword. Always returns a response; an empty one
    /// means every configured provider failed.
    pub async fn fetch(&self, keyword: &str, depth: usize) -> SerpResponse {
        let mut chosen: Option<SerpResponse> = None;

        for provider in self.candidates() {
            let is_primary_auto =
                self.mode == ProviderMode::Auto && provider.name() == "dataforseo";

            match self.run_provider(&provider, keyword, depth).await {
                Some(resp) if !resp.organic.is_empty() => {
                    chosen = Some(resp);
                    break;
                }
                // Zero organic results on a successful call marks the
                // primary for the rest of the process; transient errors and
                // timeouts do not.
                Some(_) => {
                    if is_primary_auto {
                        self.flag_primary();
                    }
                }
                None => {}
            }
        }

        let mut response = chosen.unwrap_or_default();

        // Backfill PAA / AI overview / featured snippet from the other provider.
        self.backfill_missing_fields(&mut response, keyword, depth)
            .await;

        // Last resort for PAA: ask the LLM for plausible Polish questions.
        if response.metadata.paa.is_empty() && self.llm.is_configured() {
            let generated =
                paa_fallback::generate_paa(&self.llm, keyword, &response.organic).await;
            if !generated.is_empty() {
                info!("PAA fallback generated {} questions", generated.len());
                response.metadata.paa = generated;
            }
        }

        response
    }

    async fn backfill_missing_fields(
        &self,
        response: &mut SerpResponse,
        keyword: &str,
        depth: usize,
    ) {
        let needs_backfill = response.metadata.paa.is_empty()
            || response.metadata.ai_overview.is_none()
            || response.metadata.featured_snippet.is_none();
        if !needs_backfill {
            return;
        }

        let other: Option<Arc<dyn SerpProvider>> = match response.metadata.provider.as_str() {
            "dataforseo" => self.serpapi.clone(),
            "serpapi" if !self.primary_flagged() => self.dataforseo.clone(),
            // No provider answered at all — nothing sensible to backfill from.
            _ => None,
        };
        let Some(other) = other else {
            return;
        };

        let Some(extra) = self.run_provider(&other, keyword, depth).await else {
            return;
        };

        if response.metadata.paa.is_empty() && !extra.metadata.paa.is_empty() {
            info!("backfilled PAA from '{}'", other.name());
            response.metadata.paa = extra.metadata.paa;
        }
        if response.metadata.ai_overview.is_none() && extra.metadata.ai_overview.is_some() {
            info!("backfilled AI overview from '{}'", other.name());
            response.metadata.ai_overview = extra.metadata.ai_overview;
        }
        if response.metadata.featured_snippet.is_none()
            && extra.metadata.featured_snippet.is_some()
        {
            info!("backfilled featured snippet from '{}'", other.name());
            response.metadata.featured_snippet = extra.metadata.featured_snippet;
        }
    }

    /// Raw single-provider fetch for the `/debug/:provider` endpoint.
    pub async fn fetch_debug(
        &self,
        provider_name: &str,
        keyword: &str,
        depth: usize,
    ) -> Result<SerpResponse, ProviderError> {
        let provider = self
            .provider_by_name(provider_name)
            .ok_or_else(|| ProviderError::Fatal(format!("provider '{}' not configured", provider_name)))?;
        tokio::time::timeout(PROVIDER_TIMEOUT, provider.fetch(keyword, depth))
            .await
            .map_err(|_| ProviderError::Transient("provider timeout".to_string()))?
    }
}
