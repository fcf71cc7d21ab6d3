use regex::Regex;
use std::sync::LazyLock;

/// Byte-budget clamp that never splits a multibyte character.
pub fn clamp_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

static SENTENCE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("static pattern"));

/// Split text on sentence terminators. Abbreviation-blind on purpose — the
/// consumers count co-occurring phrases, not grammatical sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

static PARAGRAPH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static pattern"));

/// Split on blank lines; a text without any is one paragraph.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_char_boundaries() {
        let text = "ąęółśżźćń".repeat(100);
        let clamped = clamp_bytes(&text, 101);
        assert!(clamped.len() <= 101);
        assert!(clamped.chars().all(|c| "ąęółśżźćń".contains(c)));
    }

    #[test]
    fn sentences_split_on_terminators() {
        let sents = split_sentences("Rozwód trwa długo. Prawnik pomoże! Ile to kosztuje?");
        assert_eq!(sents.len(), 3);
        assert_eq!(sents[1], "Prawnik pomoże");
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(split_paragraphs("a\n\nb\n\n\nc").len(), 3);
        assert_eq!(split_paragraphs("jeden akapit bez pustych linii").len(), 1);
    }
}
