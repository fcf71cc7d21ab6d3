use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::super::{ProviderError, SerpProvider};
use crate::core::config::SERP_LANGUAGE_CODE;
use crate::core::types::{
    AiOverview, FeaturedSnippet, PaaEntry, SerpItem, SerpMetadata, SerpResponse,
};

const ENDPOINT: &str = "https://serpapi.com/search.json";

/// SerpApi provider. AI overviews sometimes arrive as a stub carrying only a
/// `page_token`; those are resolved with a second request against the
/// dedicated `google_ai_overview` engine.
pub struct SerpApiProvider {
    http: reqwest::Client,
    api_key: String,
}

impl SerpApiProvider {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }

    async fn resolve_ai_overview(&self, page_token: &str) -> Option<AiOverview> {
        let resp = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("engine", "google_ai_overview"),
                ("page_token", page_token),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            debug!("ai overview pagination got http {}", resp.status());
            return None;
        }
        let payload: Value = resp.json().await.ok()?;
        parse_ai_overview(&payload["ai_overview"])
    }
}

#[async_trait]
impl SerpProvider for SerpApiProvider {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn fetch(&self, keyword: &str, depth: usize) -> Result<SerpResponse, ProviderError> {
        let num = depth.to_string();
        let resp = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("engine", "google"),
                ("q", keyword),
                ("hl", SERP_LANGUAGE_CODE),
                ("gl", SERP_LANGUAGE_CODE),
                ("google_domain", "google.pl"),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("http {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Transient(format!("http {}", status)));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("bad json: {}", e)))?;
        let mut response = parse_response(&payload, depth);

        // Stub overview with a continuation token and no blocks → resolve it.
        if response.metadata.ai_overview.is_none() {
            if let Some(token) = payload["ai_overview"]["page_token"].as_str() {
                debug!("resolving paginated AI overview");
                response.metadata.ai_overview = self.resolve_ai_overview(token).await;
            }
        }

        Ok(response)
    }
}

pub fn parse_response(payload: &Value, depth: usize) -> SerpResponse {
    let mut organic = Vec::new();
    let mut metadata = SerpMetadata {
        provider: "serpapi".to_string(),
        ..Default::default()
    };

    for item in payload["organic_results"].as_array().into_iter().flatten() {
        if organic.len() >= depth {
            break;
        }
        let url = item["link"].as_str().unwrap_or_default();
        if url.is_empty() || organic.iter().any(|o: &SerpItem| o.url == url) {
            continue;
        }
        let title = item["title"].as_str().unwrap_or_default().to_string();
        let snippet = item["snippet"].as_str().unwrap_or_default().to_string();
        metadata.serp_titles.push(title.clone());
        metadata.serp_snippets.push(snippet.clone());
        organic.push(SerpItem {
            rank: organic.len() + 1,
            url: url.to_string(),
            title,
            snippet,
            word_count: None,
        });
    }

    for question in payload["related_questions"].as_array().into_iter().flatten() {
        let text = question["question"].as_str().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        metadata.paa.push(PaaEntry {
            question: text.to_string(),
            answer: question["snippet"].as_str().map(str::to_string),
            source: question["link"].as_str().map(str::to_string),
            generated: false,
        });
    }

    let answer_box = &payload["answer_box"];
    if answer_box.is_object() {
        let text = answer_box["answer"]
            .as_str()
            .or_else(|| answer_box["snippet"].as_str())
            .unwrap_or_default();
        if !text.is_empty() {
            metadata.featured_snippet = Some(FeaturedSnippet {
                text: text.to_string(),
                source: answer_box["link"].as_str().map(str::to_string),
            });
        }
    }

    metadata.ai_overview = parse_ai_overview(&payload["ai_overview"]);

    for related in payload["related_searches"].as_array().into_iter().flatten() {
        if let Some(q) = related["query"].as_str() {
            metadata.related_searches.push(q.to_string());
        }
    }

    // Refinement chips appear under different keys depending on SERP layout.
    for key in ["refinements", "filters", "inline_refinements"] {
        for chip in payload[key].as_array().into_iter().flatten() {
            let label = chip["label"]
                .as_str()
                .or_else(|| chip["text"].as_str())
                .or_else(|| chip.as_str());
            if let Some(label) = label {
                metadata.refinement_chips.push(label.to_string());
            }
        }
    }

    SerpResponse { organic, metadata }
}

fn parse_ai_overview(value: &Value) -> Option<AiOverview> {
    if !value.is_object() {
        return None;
    }
    let mut overview = AiOverview::default();
    for block in value["text_blocks"].as_array().into_iter().flatten() {
        let snippet = block["snippet"].as_str().unwrap_or_default().trim();
        if !snippet.is_empty() {
            overview.blocks.push(snippet.to_string());
        }
    }
    for reference in value["references"].as_array().into_iter().flatten() {
        if let Some(link) = reference["link"].as_str() {
            if overview.sources.len() < 5 {
                overview.sources.push(link.to_string());
            }
        }
    }
    overview.text = overview.blocks.join("\n");
    if overview.text.is_empty() && overview.sources.is_empty() {
        return None;
    }
    Some(overview)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Value {
        serde_json::json!({
            "organic_results": [
                {"position": 1, "link": "https://adwokat.pl/rozwod",
                 "title": "Rozwód Warszawa", "snippet": "Kompleksowa pomoc."},
                {"position": 2, "link": "https://kancelaria.pl/rozwody",
                 "title": "Rozwody", "snippet": "Prawnik od rozwodów."}
            ],
            "related_questions": [
                {"question": "Jak długo trwa rozwód?", "snippet": "Od 6 do 18 miesięcy.",
                 "link": "https://sady.pl"}
            ],
            "answer_box": {"snippet": "Pozew składa się do sądu okręgowego.",
                           "link": "https://sady.pl/pozew"},
            "ai_overview": {
                "text_blocks": [{"snippet": "Rozwód wymaga trwałego rozkładu pożycia."}],
                "references": [{"link": "https://gov.pl/rozwod"}]
            },
            "related_searches": [{"query": "rozwód koszty"}],
            "refinements": [{"label": "Bez orzekania o winie"}]
        })
    }

    #[test]
    fn parses_full_serp() {
        let resp = parse_response(&fixture(), 8);
        assert_eq!(resp.organic.len(), 2);
        assert_eq!(resp.metadata.paa.len(), 1);
        assert!(resp.metadata.featured_snippet.is_some());
        let overview = resp.metadata.ai_overview.as_ref().unwrap();
        assert_eq!(overview.blocks.len(), 1);
        assert_eq!(overview.sources.len(), 1);
        assert_eq!(resp.metadata.related_searches, vec!["rozwód koszty"]);
        assert_eq!(resp.metadata.refinement_chips, vec!["Bez orzekania o winie"]);
    }

    #[test]
    fn stub_overview_without_blocks_is_none() {
        let payload = serde_json::json!({"ai_overview": {"page_token": "abc"}});
        assert!(parse_ai_overview(&payload["ai_overview"]).is_none());
    }

    #[test]
    fn ai_overview_sources_are_capped_at_five() {
        let refs: Vec<Value> = (0..8)
            .map(|i| serde_json::json!({"link": format!("https://r{}.pl", i)}))
            .collect();
        let payload = serde_json::json!({"text_blocks": [{"snippet": "tekst"}], "references": refs});
        let overview = parse_ai_overview(&payload).unwrap();
        assert_eq!(overview.sources.len(), 5);
    }
}
