use std::collections::HashMap;

/// Rule-based Polish lemmatizer: an exception table for frequent irregular
/// forms, then longest-suffix stripping of case and conjugation endings.
///
/// The output is a consistent grouping key rather than a dictionary form —
/// all inflected variants of one word must collapse to the same string, which
/// is the only property the downstream indexers rely on.
pub struct Lemmatizer {
    exceptions: HashMap<&'static str, &'static str>,
}

/// Case/conjugation endings, longest first. Stripping stops at the first
/// match that leaves a stem of at least `MIN_STEM` characters.
const SUFFIXES: &[&str] = &[
    "owania", "owaniu", "owanie", "owało", "owali", "owała",
    "iego", "iemu", "owie",
    "ach", "ami", "ych", "ich", "ymi", "imi", "ego", "emu", "owi", "iem",
    "ów", "om", "em", "ie", "ą", "ę", "y", "i", "u", "o", "e", "a",
];

const MIN_STEM: usize = 3;

impl Lemmatizer {
    pub fn new() -> Self {
        let mut exceptions = HashMap::new();
        // Copulas and frequent irregular verbs.
        for form in ["jest", "są", "był", "była", "było", "byli", "będzie", "będą"] {
            exceptions.insert(form, "być");
        }
        for form in ["ma", "mają", "miał", "miała", "mieli"] {
            exceptions.insert(form, "mieć");
        }
        for form in ["może", "mogą", "mógł", "mogła", "można"] {
            exceptions.insert(form, "móc");
        }
        // Suppletive and o/ó-alternating nouns common in Polish SEO corpora.
        exceptions.insert("ludzie", "człowiek");
        exceptions.insert("ludzi", "człowiek");
        exceptions.insert("dzieci", "dziecko");
        exceptions.insert("lat", "rok");
        exceptions.insert("lata", "rok");
        exceptions.insert("latach", "rok");
        exceptions.insert("roku", "rok");
        for form in ["rozwodu", "rozwodowi", "rozwodem", "rozwodzie", "rozwody", "rozwodów"] {
            exceptions.insert(form, "rozwód");
        }
        for form in ["sądu", "sądowi", "sądem", "sądzie", "sądy", "sądów", "sądach"] {
            exceptions.insert(form, "sąd");
        }
        for form in ["samochodu", "samochodem", "samochodzie", "samochody", "samochodów"] {
            exceptions.insert(form, "samochód");
        }
        for form in ["dochodu", "dochodem", "dochody", "dochodów"] {
            exceptions.insert(form, "dochód");
        }
        for form in ["zawodu", "zawodem", "zawody", "zawodów"] {
            exceptions.insert(form, "zawód");
        }
        for form in ["pieniądze", "pieniędzy", "pieniądzem", "pieniędzmi"] {
            exceptions.insert(form, "pieniądz");
        }
        exceptions.insert("miesiące", "miesiąc");
        exceptions.insert("miesięcy", "miesiąc");
        exceptions.insert("tygodnie", "tydzień");
        exceptions.insert("tygodni", "tydzień");
        exceptions.insert("dni", "dzień");
        exceptions.insert("dnia", "dzień");
        // ą/ę and o/ó alternating stems the suffix rules cannot restore.
        for form in ["urzędu", "urzędowi", "urzędem", "urzędzie", "urzędy", "urzędów", "urzędach"] {
            exceptions.insert(form, "urząd");
        }
        for form in ["błędu", "błędem", "błędzie", "błędy", "błędów"] {
            exceptions.insert(form, "błąd");
        }
        for form in [
            "osoba", "osoby", "osobie", "osobę", "osobą", "osób", "osobom", "osobami", "osobach",
        ] {
            exceptions.insert(form, "osoba");
        }
        for form in ["miasto", "miasta", "mieście", "miastem", "miast", "miastach"] {
            exceptions.insert(form, "miasto");
        }

        Self { exceptions }
    }

    /// Lemmatize one word. Input of any case; output lowercase.
    pub fn lemmatize(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if let Some(lemma) = self.exceptions.get(lower.as_str()) {
            return (*lemma).to_string();
        }
        let char_count = lower.chars().count();
        if char_count < 4 {
            return lower;
        }
        for suffix in SUFFIXES {
            if let Some(stem) = lower.strip_suffix(suffix) {
                if stem.chars().count() >= MIN_STEM {
                    return stem.to_string();
                }
            }
        }
        lower
    }
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflected_forms_collapse_to_one_key() {
        let lem = Lemmatizer::new();
        // Locative and nominative of the same noun must agree.
        assert_eq!(lem.lemmatize("Warszawie"), lem.lemmatize("Warszawa"));
        assert_eq!(lem.lemmatize("sprawie"), lem.lemmatize("sprawa"));
        assert_eq!(lem.lemmatize("prawnika"), lem.lemmatize("prawnik"));
    }

    #[test]
    fn exceptions_win_over_suffix_rules() {
        let lem = Lemmatizer::new();
        assert_eq!(lem.lemmatize("rozwodów"), "rozwód");
        assert_eq!(lem.lemmatize("jest"), "być");
        assert_eq!(lem.lemmatize("lat"), "rok");
    }

    #[test]
    fn short_words_pass_through() {
        let lem = Lemmatizer::new();
        assert_eq!(lem.lemmatize("w"), "w");
        assert_eq!(lem.lemmatize("dla"), "dla");
    }

    #[test]
    fn consonant_final_words_are_stable() {
        let lem = Lemmatizer::new();
        assert_eq!(lem.lemmatize("rozwód"), "rozwód");
        assert_eq!(lem.lemmatize("prawnik"), "prawnik");
    }
}
