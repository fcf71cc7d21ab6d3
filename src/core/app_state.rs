use std::env;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    /// Process-wide Polish language pipeline, warmed up eagerly at startup
    /// and safe for concurrent read calls.
    pub analyzer: Arc<crate::lang::PolishAnalyzer>,
    pub serp: Arc<crate::serp::SerpClient>,
    pub llm: Arc<crate::llm::LlmClient>,
    // Cache for SERP responses (key: keyword|depth|mode)
    pub serp_cache: moka::future::Cache<String, super::types::SerpResponse>,
    // Concurrency control for external calls
    pub outbound_limit: Arc<tokio::sync::Semaphore>,
    /// Optional document-store hook; a no-op logger unless credentials exist.
    pub brief_sink: Option<Arc<dyn crate::pipeline::BriefSink>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.serp.provider_names())
            .field("llm_enabled", &self.llm.is_configured())
            .field("persistence_enabled", &self.brief_sink.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client) -> Self {
        let outbound_limit = env::var("OUTBOUND_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(32);

        let analyzer = Arc::new(crate::lang::PolishAnalyzer::new());
        let llm = Arc::new(crate::llm::LlmClient::from_env(http_client.clone()));
        let serp = Arc::new(crate::serp::SerpClient::from_env(
            http_client.clone(),
            Arc::clone(&llm),
        ));

        let brief_sink: Option<Arc<dyn crate::pipeline::BriefSink>> =
            if crate::core::config::persistence_enabled() {
                Some(Arc::new(crate::pipeline::LoggingSink))
            } else {
                None
            };

        Self {
            http_client,
            analyzer,
            serp,
            llm,
            serp_cache: moka::future::Cache::builder()
                .max_capacity(5_000)
                .time_to_live(std::time::Duration::from_secs(
                    crate::core::config::serp_cache_ttl_secs(),
                ))
                .build(),
            outbound_limit: Arc::new(tokio::sync::Semaphore::new(outbound_limit)),
            brief_sink,
        }
    }
}
