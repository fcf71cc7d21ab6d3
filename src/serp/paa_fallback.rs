use tracing::warn;

use crate::core::config::PAA_FALLBACK_TIMEOUT;
use crate::core::types::{PaaEntry, SerpItem};
use crate::llm::LlmClient;

/// Ask the LLM for plausible PAA questions when both providers came back
/// empty. Returned entries are flagged `generated` so downstream consumers
/// can tell them apart from real SERP data.
pub async fn generate_paa(llm: &LlmClient, keyword: &str, organic: &[SerpItem]) -> Vec<PaaEntry> {
    let snippets: Vec<String> = organic
        .iter()
        .take(5)
        .filter(|item| !item.snippet.trim().is_empty())
        .map(|item| format!("- {}", item.snippet.trim()))
        .collect();

    let prompt = format!(
        "Dla frazy kluczowej \"{keyword}\" wygeneruj od 5 do 8 pytań, jakie użytkownicy \
Google zadają w sekcji \"Podobne pytania\". Pytania muszą być po polsku, konkretne \
i zakończone znakiem zapytania. Zwróć wyłącznie pytania, po jednym w każdej linii, \
bez numeracji.\n\nFragmenty z wyników wyszukiwania:\n{}",
        snippets.join("\n")
    );

    let raw = match llm.complete(&prompt, 512, PAA_FALLBACK_TIMEOUT).await {
        Ok(text) => text,
        Err(e) => {
            warn!("PAA fallback failed: {}", e);
            return Vec::new();
        }
    };

    parse_generated_questions(&raw)
}

/// One question per line; keep lines that look like real questions.
pub fn parse_generated_questions(raw: &str) -> Vec<PaaEntry> {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
        })
        .filter(|line| line.chars().count() >= 10 && line.contains('?'))
        .take(8)
        .map(|question| PaaEntry {
            question: question.to_string(),
            answer: None,
            source: None,
            generated: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_questions_and_drops_noise() {
        let raw = "Ile kosztuje rozwód w Warszawie?\n\
                   1. Jak długo trwa sprawa rozwodowa?\n\
                   ok\n\
                   - Czy potrzebny jest adwokat do rozwodu?\n\
                   To nie jest pytanie";
        let parsed = parse_generated_questions(raw);
        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().all(|p| p.generated));
        assert_eq!(parsed[1].question, "Jak długo trwa sprawa rozwodowa?");
    }

    #[test]
    fn short_fragments_are_dropped() {
        assert!(parse_generated_questions("Co to?\nok?").is_empty());
    }
}
