use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tracing::debug;

use super::super::{ProviderError, SerpProvider};
use crate::core::config::{SERP_LANGUAGE_CODE, SERP_LOCATION_CODE};
use crate::core::types::{
    AiOverview, FeaturedSnippet, PaaEntry, SerpItem, SerpMetadata, SerpResponse,
};

const ENDPOINT: &str = "https://api.dataforseo.com/v3/serp/google/organic/live/advanced";

/// DataForSEO live SERP provider. The whole response arrives as one task
/// payload; parsing walks the typed item list defensively because the
/// upstream schema gains fields without notice.
pub struct DataForSeoProvider {
    http: reqwest::Client,
    login: String,
    password: String,
}

impl DataForSeoProvider {
    pub fn new(http: reqwest::Client, login: String, password: String) -> Self {
        Self {
            http,
            login,
            password,
        }
    }

    fn auth_header(&self) -> String {
        let credentials = BASE64.encode(format!("{}:{}", self.login, self.password));
        format!("Basic {}", credentials)
    }
}

#[async_trait]
impl SerpProvider for DataForSeoProvider {
    fn name(&self) -> &'static str {
        "dataforseo"
    }

    async fn fetch(&self, keyword: &str, depth: usize) -> Result<SerpResponse, ProviderError> {
        let body = serde_json::json!([{
            "keyword": keyword,
            "language_code": SERP_LANGUAGE_CODE,
            "location_code": SERP_LOCATION_CODE,
            "depth": depth,
            "people_also_ask_click_depth": 1,
            "load_async_ai_overview": true,
        }]);

        let resp = self
            .http
            .post(ENDPOINT)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&body)
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
        Ok(parse_response(&payload, depth))
    }
}

/// Parse a live/advanced task payload into the provider-agnostic shape.
pub fn parse_response(payload: &Value, depth: usize) -> SerpResponse {
    let items = payload["tasks"][0]["result"][0]["items"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut organic = Vec::new();
    let mut metadata = SerpMetadata {
        provider: "dataforseo".to_string(),
        ..Default::default()
    };

    for item in &items {
        match item["type"].as_str().unwrap_or_default() {
            "organic" => {
                if organic.len() >= depth {
                    continue;
                }
                let url = item["url"].as_str().unwrap_or_default();
                if url.is_empty() || organic.iter().any(|o: &SerpItem| o.url == url) {
                    continue;
                }
                let title = item["title"].as_str().unwrap_or_default().to_string();
                let snippet = item["description"].as_str().unwrap_or_default().to_string();
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
            "people_also_ask" => {
                for paa_item in item["items"].as_array().into_iter().flatten() {
                    let question = paa_item["title"].as_str().unwrap_or_default().trim();
                    if question.is_empty() {
                        continue;
                    }
                    let expanded = &paa_item["expanded_element"][0];
                    metadata.paa.push(PaaEntry {
                        question: question.to_string(),
                        answer: expanded["description"].as_str().map(str::to_string),
                        source: expanded["url"].as_str().map(str::to_string),
                        generated: false,
                    });
                }
            }
            "featured_snippet" => {
                let text = item["description"].as_str().unwrap_or_default();
                if !text.is_empty() && metadata.featured_snippet.is_none() {
                    metadata.featured_snippet = Some(FeaturedSnippet {
                        text: text.to_string(),
                        source: item["url"].as_str().map(str::to_string),
                    });
                }
            }
            "ai_overview" => {
                let mut overview = AiOverview::default();
                for block in item["items"].as_array().into_iter().flatten() {
                    if let Some(text) = block["text"].as_str() {
                        if !text.trim().is_empty() {
                            overview.blocks.push(text.trim().to_string());
                        }
                    }
                }
                for reference in item["references"].as_array().into_iter().flatten() {
                    if let Some(url) = reference["url"].as_str() {
                        if overview.sources.len() < 5 {
                            overview.sources.push(url.to_string());
                        }
                    }
                }
                overview.text = overview.blocks.join("\n");
                if !overview.text.is_empty() || !overview.sources.is_empty() {
                    metadata.ai_overview = Some(overview);
                }
            }
            "related_searches" => {
                for related in item["items"].as_array().into_iter().flatten() {
                    if let Some(q) = related.as_str() {
                        metadata.related_searches.push(q.to_string());
                    }
                }
            }
            "refinement_chips" => {
                for chip in item["items"].as_array().into_iter().flatten() {
                    if let Some(title) = chip["title"].as_str() {
                        metadata.refinement_chips.push(title.to_string());
                    }
                }
            }
            other => {
                debug!("ignoring dataforseo item type '{}'", other);
            }
        }
    }

    SerpResponse { organic, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Value {
        serde_json::json!({
            "tasks": [{
                "result": [{
                    "items": [
                        {"type": "organic", "url": "https://adwokat.pl/rozwod",
                         "title": "Rozwód w Warszawie — poradnik",
                         "description": "Jak przeprowadzić rozwód krok po kroku."},
                        {"type": "organic", "url": "https://kancelaria.pl/rozwody",
                         "title": "Rozwody Warszawa", "description": "Pomoc prawna."},
                        {"type": "people_also_ask", "items": [
                            {"title": "Ile kosztuje rozwód w Warszawie?",
                             "expanded_element": [{"description": "Opłata sądowa wynosi 600 zł.",
                                                   "url": "https://sady.pl/oplaty"}]}
                        ]},
                        {"type": "related_searches", "items": ["rozwód bez orzekania o winie"]},
                        {"type": "refinement_chips", "items": [{"title": "Adwokat"}]},
                        {"type": "featured_snippet", "description": "Rozwód orzeka sąd okręgowy.",
                         "url": "https://sady.pl"}
                    ]
                }]
            }]
        })
    }

    #[test]
    fn parses_all_item_families() {
        let resp = parse_response(&fixture(), 8);
        assert_eq!(resp.organic.len(), 2);
        assert_eq!(resp.organic[0].rank, 1);
        assert_eq!(resp.metadata.paa.len(), 1);
        assert_eq!(
            resp.metadata.paa[0].question,
            "Ile kosztuje rozwód w Warszawie?"
        );
        assert!(resp.metadata.paa[0].answer.as_deref().unwrap().contains("600"));
        assert_eq!(resp.metadata.related_searches.len(), 1);
        assert_eq!(resp.metadata.refinement_chips, vec!["Adwokat"]);
        assert!(resp.metadata.featured_snippet.is_some());
        assert_eq!(resp.metadata.serp_titles.len(), 2);
        assert_eq!(resp.metadata.provider, "dataforseo");
    }

    #[test]
    fn organic_depth_and_dedup_are_enforced() {
        let resp = parse_response(&fixture(), 1);
        assert_eq!(resp.organic.len(), 1);

        let dup = serde_json::json!({
            "tasks": [{"result": [{"items": [
                {"type": "organic", "url": "https://a.pl", "title": "A", "description": ""},
                {"type": "organic", "url": "https://a.pl", "title": "A again", "description": ""}
            ]}]}]
        });
        assert_eq!(parse_response(&dup, 8).organic.len(), 1);
    }

    #[test]
    fn empty_payload_degrades_to_empty_response() {
        let resp = parse_response(&serde_json::json!({}), 8);
        assert!(resp.organic.is_empty());
        assert!(resp.metadata.paa.is_empty());
    }
}
