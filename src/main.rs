use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use serp_scout::core::config;
use serp_scout::nlp::{compliance, headings};
use serp_scout::pipeline;
use serp_scout::types::*;
use serp_scout::AppState;

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["SERP_SCOUT_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

fn internal_error(details: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::with_details(
            "Internal Server Error",
            details.to_string(),
        )),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting serp-scout");

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config::http_timeout_secs()))
        .connect_timeout(std::time::Duration::from_secs(
            config::http_connect_timeout_secs(),
        ))
        .build()?;

    // Warm up the language pipeline before accepting traffic.
    let state = Arc::new(AppState::new(http_client));
    let _ = state.analyzer.analyze("Rozgrzewka potoku językowego.");
    info!(
        "providers: {:?}, llm: {}, entity_seo: {}",
        state.serp.provider_names(),
        state.llm.is_configured(),
        config::entity_seo_enabled()
    );

    let app = Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .route("/synthesize_topics", post(synthesize_topics_handler))
        .route(
            "/generate_compliance_report",
            post(compliance_report_handler),
        )
        .route("/count_keywords_inherited", post(hierarchical_handler))
        .route("/analyze_headings", post(analyze_headings_handler))
        .route("/validate_keywords", post(validate_keywords_handler))
        .route("/verify_keywords", post(verify_keywords_handler))
        .route("/debug/{provider}", get(debug_provider_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state.clone());

    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(5000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/SERP_SCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("serp-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Unhandled panics must never escape an endpoint as a closed connection or
/// an HTML page; they come back as JSON 500 like every other failure.
fn handle_panic(
    err: Box<dyn std::any::Any + Send + 'static>,
) -> axum::http::Response<axum::body::Body> {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("handler panicked: {}", details);

    let body = serde_json::json!({
        "error": "Internal Server Error",
        "details": details,
    });
    axum::http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .expect("static response parts")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "serp-scout",
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "providers": state.serp.provider_names(),
            "llm": state.llm.is_configured(),
            "entity_seo": config::entity_seo_enabled(),
            "persistence": state.brief_sink.is_some(),
        }
    }))
}

async fn not_found_handler() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not Found")),
    )
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Brief>, ApiError> {
    if request.main_keyword.trim().is_empty() {
        return Err(bad_request("Pole 'main_keyword' jest wymagane"));
    }

    match pipeline::analyze(&state, request).await {
        Ok(brief) => Ok(Json(brief)),
        Err(e @ pipeline::AnalyzeError::NoSources) => {
            error!("analyze failed: {}", e);
            Err(bad_request(e.to_string()))
        }
    }
}

async fn synthesize_topics_handler(
    Json(request): Json<SynthesizeTopicsRequest>,
) -> Result<Json<SynthesizeTopicsResponse>, ApiError> {
    let ngrams: Vec<String> = request
        .ngrams
        .iter()
        .map(|n| n.as_str().to_string())
        .collect();
    let topic_importance = headings::synthesize_topics(&ngrams, &request.headings);
    Ok(Json(SynthesizeTopicsResponse { topic_importance }))
}

async fn compliance_report_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComplianceRequest>,
) -> Result<Json<ComplianceResponse>, ApiError> {
    compliance::generate_compliance_report(&state.analyzer, &request.text, &request.keyword_state)
        .map(Json)
        .map_err(bad_request)
}

async fn hierarchical_handler(
    Json(request): Json<HierarchicalCountsRequest>,
) -> Result<Json<HierarchicalCountsResponse>, ApiError> {
    Ok(Json(HierarchicalCountsResponse {
        hierarchical_counts: headings::hierarchical_counts(&request.raw_counts),
    }))
}

async fn analyze_headings_handler(
    Json(request): Json<HeadingsRequest>,
) -> Result<Json<TopHeadingsResponse>, ApiError> {
    Ok(Json(TopHeadingsResponse {
        top_headings: headings::analyze_headings(&request.headings),
    }))
}

async fn validate_keywords_handler(
    Json(request): Json<ValidateKeywordsRequest>,
) -> Result<Json<KeywordCountsResponse>, ApiError> {
    if request.lemmatized_text.is_empty() || request.lemmatized_keywords.is_empty() {
        return Err(bad_request("Missing lemmatized text or keywords"));
    }
    Ok(Json(KeywordCountsResponse {
        keyword_counts: headings::count_lemmatized_keywords(
            &request.lemmatized_text,
            &request.lemmatized_keywords,
        ),
    }))
}

async fn verify_keywords_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyKeywordsRequest>,
) -> Result<Json<VerifyKeywordsResponse>, ApiError> {
    if request.text.is_empty() || request.keyword_list.is_empty() {
        return Err(bad_request(
            "Brak danych. Wymagane pola: text, keyword_list.",
        ));
    }
    Ok(Json(headings::verify_keywords(
        &state.analyzer,
        &request.text,
        &request.keyword_list,
    )))
}

#[derive(Debug, Deserialize)]
struct DebugQuery {
    keyword: Option<String>,
}

/// Raw provider payload summary for operator diagnostics.
async fn debug_provider_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<DebugQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keyword = query
        .keyword
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| bad_request("Parametr 'keyword' jest wymagany"))?;

    match state
        .serp
        .fetch_debug(&provider, &keyword, config::DEFAULT_RESULT_DEPTH)
        .await
    {
        Ok(resp) => Ok(Json(serde_json::json!({
            "provider": provider,
            "keyword": keyword,
            "organic_count": resp.organic.len(),
            "paa_count": resp.metadata.paa.len(),
            "related_searches_count": resp.metadata.related_searches.len(),
            "refinement_chips_count": resp.metadata.refinement_chips.len(),
            "has_featured_snippet": resp.metadata.featured_snippet.is_some(),
            "has_ai_overview": resp.metadata.ai_overview.is_some(),
            "organic": resp.organic,
            "primary_auth_failed": state.serp.primary_flagged(),
        }))),
        Err(e) => Err(internal_error(e)),
    }
}
