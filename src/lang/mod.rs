pub mod lemmatizer;
pub mod stopwords;

pub use lemmatizer::Lemmatizer;
pub use stopwords::{is_stop_word, STOP_WORDS};

/// Coarse part-of-speech tags. The set mirrors what the downstream
/// extractors actually branch on; everything else lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    Noun,
    Propn,
    Adj,
    Verb,
    Adv,
    Adp,
    Pron,
    Num,
    Conj,
    Part,
    Punct,
    Other,
}

/// Shallow grammatical roles assigned per sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dep {
    Nsubj,
    Obj,
    Obl,
    Root,
    Other,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub lower: String,
    pub lemma: String,
    pub pos: Pos,
    pub dep: Dep,
    /// Char offset of the first character in the source text.
    pub start: usize,
    pub is_alpha: bool,
    pub is_stop: bool,
}

#[derive(Debug, Clone)]
pub struct Sentence {
    pub token_start: usize,
    pub token_end: usize,
}

#[derive(Debug, Clone)]
pub struct EntitySpan {
    pub text: String,
    /// Raw label; the named-entity extractor normalizes these via its map.
    pub label: &'static str,
    /// Char offset of the first token.
    pub start: usize,
    pub token_start: usize,
    pub token_end: usize,
}

#[derive(Debug, Default)]
pub struct Doc {
    pub tokens: Vec<Token>,
    pub sentences: Vec<Sentence>,
    pub entities: Vec<EntitySpan>,
}

impl Doc {
    pub fn sentence_tokens(&self, sent: &Sentence) -> &[Token] {
        &self.tokens[sent.token_start..sent.token_end]
    }
}

// ---------------------------------------------------------------------------
// Closed-class lexicons. Small on purpose — the tagger only needs to be right
// about function words and frequent verbs; open-class fallbacks do the rest.
// ---------------------------------------------------------------------------

const PREPOSITIONS: &[&str] = &[
    "w", "we", "z", "ze", "na", "do", "od", "po", "za", "o", "u", "przy", "dla", "przez",
    "nad", "pod", "bez", "między", "obok", "wobec", "według", "podczas", "wśród",
];

const CONJUNCTIONS: &[&str] = &[
    "i", "oraz", "ale", "lub", "albo", "czy", "że", "aby", "żeby", "więc", "jednak",
    "ponieważ", "gdyż", "bo", "gdy", "kiedy", "jeśli", "jeżeli",
];

const PRONOUNS: &[&str] = &[
    "on", "ona", "ono", "oni", "one", "to", "ten", "ta", "te", "tym", "tego", "tej",
    "który", "która", "które", "których", "się", "co", "ktoś", "coś", "my", "wy", "ja",
    "jego", "jej", "ich", "nasz", "wasz", "swój", "swoje",
];

const PARTICLES: &[&str] = &["nie", "tak", "no", "niech", "by", "też", "także", "również"];

const ADVERBS: &[&str] = &[
    "bardzo", "często", "długo", "szybko", "łatwo", "trudno", "dobrze", "źle", "tanio",
    "drogo", "zawsze", "nigdy", "teraz", "dziś", "dzisiaj", "jutro", "wczoraj", "już",
    "jeszcze", "tylko", "około", "blisko", "daleko", "ponownie", "najczęściej", "zwykle",
];

const COMMON_VERBS: &[&str] = &[
    "jest", "są", "był", "była", "było", "byli", "będzie", "będą", "ma", "mają", "miał",
    "może", "mogą", "można", "trzeba", "należy", "powinien", "powinna", "wymaga",
    "wymagają", "dotyczy", "dotyczą", "oferuje", "oferują", "zawiera", "zawierają",
    "obejmuje", "występuje", "wynosi", "wynoszą", "kosztuje", "kosztują", "trwa",
    "trwają", "pomaga", "pomagają", "pomoże", "działa", "działają", "prowadzi",
    "powoduje", "powodują", "umożliwia", "pozwala", "rozpatruje", "orzeka", "wpływa",
    "chroni", "wspiera", "reguluje", "poprawia", "zmniejsza", "zwiększa", "leczy",
    "zapobiega", "warto", "stanowi", "wydaje", "składa",
];

const VERB_SUFFIXES: &[&str] = &[
    "ować", "iwać", "ywać", "uje", "ujesz", "ujemy", "ujecie", "ują",
    "ał", "ała", "ało", "ali", "ały", "ił", "iła", "iło", "ili", "iły",
    "ył", "yła", "yło", "yli", "yły", "ać", "eć", "ić", "yć", "ąć",
];

const ADJ_SUFFIXES: &[&str] = &[
    "owy", "owa", "owe", "owych", "owym", "ową", "owego", "owemu", "owej",
    "czny", "czna", "czne", "cznych", "cznym", "czną",
    "alny", "alna", "alne", "alnych", "alnym", "alną",
    "iczny", "iczna", "iczne",
    "ski", "ska", "skie", "skich", "skim", "ską", "skiej",
    "cki", "cka", "ckie", "ckich", "ckim",
];

// Matched against lemmatizer output, so multi-form nouns appear as the stem
// the suffix rules actually produce ("kancelaria" → "kancelari").
const ORG_HEADS: &[&str] = &[
    "sąd", "urząd", "ministerstw", "zakład", "uniwersytet", "bank", "kancelari",
    "spółk", "firm", "fundacj", "instytut", "agencj", "komisj", "izb",
];

const CITY_PREFIXES: &[&str] = &[
    "warszaw", "krakow", "kraków", "łodz", "łódz", "łódź", "wrocław", "poznań", "poznani",
    "gdańsk", "szczecin", "katowic", "lublin", "białystok", "białymstok", "gdyni",
    "bydgoszcz", "rzeszów", "rzeszow", "toruń", "toruni", "kielc", "olsztyn", "opol",
    "polsk", "polsc", "europ",
];

const GIVEN_NAMES: &[&str] = &[
    "jan", "anna", "piotr", "maria", "adam", "marek", "tomasz", "agnieszka", "katarzyna",
    "paweł", "michał", "magdalena", "krzysztof", "andrzej", "barbara", "ewa", "joanna",
    "marcin", "aleksandra", "wojciech",
];

const SURNAME_SUFFIXES: &[&str] = &["ski", "ska", "cki", "cka", "wicz", "czyk", "czak", "owski", "ewska"];

const MONTHS: &[&str] = &[
    "stycznia", "lutego", "marca", "kwietnia", "maja", "czerwca", "lipca", "sierpnia",
    "września", "października", "listopada", "grudnia",
];

const CURRENCIES: &[&str] = &["zł", "złotych", "złote", "pln", "euro", "eur", "usd", "dolarów"];

// ---------------------------------------------------------------------------
// PolishAnalyzer — the process-wide language pipeline
// ---------------------------------------------------------------------------

/// Deterministic rule-based pipeline: tokenization, lemmas, coarse POS,
/// shallow dependency roles, pattern NER. A morphological analyzer can
/// replace it behind the same surface; nothing downstream reaches around it.
pub struct PolishAnalyzer {
    lemmatizer: Lemmatizer,
}

impl PolishAnalyzer {
    pub fn new() -> Self {
        Self {
            lemmatizer: Lemmatizer::new(),
        }
    }

    pub fn lemmatize_word(&self, word: &str) -> String {
        self.lemmatizer.lemmatize(word)
    }

    /// Lowercased alphabetic tokens and their lemmas, in text order.
    /// The cheap path used by the n-gram indexer and the compliance counter.
    pub fn alpha_tokens(&self, text: &str) -> (Vec<String>, Vec<String>) {
        let mut raw = Vec::new();
        let mut lemmas = Vec::new();
        for tok in split_words(text) {
            if tok.chars().all(|c| c.is_alphabetic()) {
                let lower = tok.to_lowercase();
                lemmas.push(self.lemmatizer.lemmatize(&lower));
                raw.push(lower);
            }
        }
        (raw, lemmas)
    }

    /// Lowercased lemmas of alphabetic tokens only.
    pub fn alpha_lemmas(&self, text: &str) -> Vec<String> {
        self.alpha_tokens(text).1
    }

    /// Full pass: tokens with POS and dependency roles, sentences, entities.
    pub fn analyze(&self, text: &str) -> Doc {
        let mut tokens = raw_tokenize(text);
        let sentences = split_sentences(&tokens);

        for sent in &sentences {
            let start = sent.token_start;
            for idx in start..sent.token_end {
                let pos = tag_pos(&tokens[idx], idx == start);
                tokens[idx].pos = pos;
            }
        }
        for tok in tokens.iter_mut() {
            tok.lemma = self.lemmatizer.lemmatize(&tok.lower);
            tok.is_stop = is_stop_word(&tok.lower);
        }
        for sent in &sentences {
            assign_deps(&mut tokens, sent);
        }

        let entities = detect_entities(&tokens, &sentences);

        Doc {
            tokens,
            sentences,
            entities,
        }
    }
}

impl Default for PolishAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tokenization and sentence splitting
// ---------------------------------------------------------------------------

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
}

fn raw_tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut word_start = 0usize;

    let flush = |tokens: &mut Vec<Token>, word: &mut String, start: usize| {
        if word.is_empty() {
            return;
        }
        let lower = word.to_lowercase();
        let is_alpha = word.chars().all(|c| c.is_alphabetic());
        tokens.push(Token {
            text: std::mem::take(word),
            lower,
            lemma: String::new(),
            pos: Pos::Other,
            dep: Dep::Other,
            start,
            is_alpha,
            is_stop: false,
        });
    };

    for (char_idx, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() {
            if word.is_empty() {
                word_start = char_idx;
            }
            word.push(ch);
        } else {
            flush(&mut tokens, &mut word, word_start);
            if !ch.is_whitespace() {
                tokens.push(Token {
                    text: ch.to_string(),
                    lower: ch.to_lowercase().to_string(),
                    lemma: ch.to_string(),
                    pos: Pos::Punct,
                    dep: Dep::Other,
                    start: char_idx,
                    is_alpha: false,
                    is_stop: false,
                });
            }
        }
    }
    flush(&mut tokens, &mut word, word_start);
    tokens
}

fn split_sentences(tokens: &[Token]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for (idx, tok) in tokens.iter().enumerate() {
        if tok.pos == Pos::Punct && matches!(tok.text.as_str(), "." | "!" | "?") {
            if idx + 1 > start {
                sentences.push(Sentence {
                    token_start: start,
                    token_end: idx + 1,
                });
            }
            start = idx + 1;
        }
    }
    if start < tokens.len() {
        sentences.push(Sentence {
            token_start: start,
            token_end: tokens.len(),
        });
    }
    sentences
}

// ---------------------------------------------------------------------------
// POS tagging
// ---------------------------------------------------------------------------

fn tag_pos(tok: &Token, sentence_initial: bool) -> Pos {
    if tok.pos == Pos::Punct {
        return Pos::Punct;
    }
    if tok.text.chars().any(|c| c.is_ascii_digit()) {
        return Pos::Num;
    }
    let lower = tok.lower.as_str();
    if PREPOSITIONS.contains(&lower) {
        return Pos::Adp;
    }
    if CONJUNCTIONS.contains(&lower) {
        return Pos::Conj;
    }
    if PRONOUNS.contains(&lower) {
        return Pos::Pron;
    }
    if PARTICLES.contains(&lower) {
        return Pos::Part;
    }
    if ADVERBS.contains(&lower) {
        return Pos::Adv;
    }
    if COMMON_VERBS.contains(&lower) || VERB_SUFFIXES.iter().any(|s| has_suffix(lower, s)) {
        return Pos::Verb;
    }
    if is_capitalized(&tok.text) && (!sentence_initial || matches_city(lower)) {
        return Pos::Propn;
    }
    if ADJ_SUFFIXES.iter().any(|s| has_suffix(lower, s)) || is_consonant_ny(lower) {
        return Pos::Adj;
    }
    Pos::Noun
}

fn has_suffix(word: &str, suffix: &str) -> bool {
    word.len() > suffix.len() + 2 && word.ends_with(suffix)
}

/// "-ny/-na/-ne" preceded by a consonant is a productive adjective pattern
/// (prawny, ważna, główne); a vowel before it usually marks an inflected noun
/// (ceny, rodziny).
fn is_consonant_ny(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n < 4 {
        return false;
    }
    let ending_ok = matches!(
        (chars[n - 2], chars[n - 1]),
        ('n', 'y') | ('n', 'a') | ('n', 'e')
    );
    ending_ok && !is_vowel(chars[n - 3])
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y' | 'ą' | 'ę' | 'ó')
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn matches_city(lower: &str) -> bool {
    CITY_PREFIXES.iter().any(|p| lower.starts_with(p))
}

// ---------------------------------------------------------------------------
// Shallow dependency roles
// ---------------------------------------------------------------------------

fn assign_deps(tokens: &mut [Token], sent: &Sentence) {
    let range = sent.token_start..sent.token_end;
    let verb_idx = tokens[range.clone()]
        .iter()
        .position(|t| t.pos == Pos::Verb)
        .map(|i| i + sent.token_start);

    if let Some(v) = verb_idx {
        tokens[v].dep = Dep::Root;
    }

    let mut subject_seen = false;
    let mut object_seen = false;

    for idx in range {
        if !matches!(tokens[idx].pos, Pos::Noun | Pos::Propn) {
            continue;
        }
        let governed_by_adp = preceded_by_adp(tokens, sent.token_start, idx);
        let dep = match verb_idx {
            Some(v) if idx < v => {
                if governed_by_adp {
                    Dep::Obl
                } else if !subject_seen {
                    subject_seen = true;
                    Dep::Nsubj
                } else {
                    Dep::Other
                }
            }
            Some(v) if idx > v => {
                if governed_by_adp {
                    Dep::Obl
                } else if !object_seen {
                    object_seen = true;
                    Dep::Obj
                } else {
                    Dep::Other
                }
            }
            _ => Dep::Other,
        };
        tokens[idx].dep = dep;
    }
}

/// Walk left over adjectives and proper nouns to see whether the nominal
/// group this token belongs to is introduced by a preposition.
fn preceded_by_adp(tokens: &[Token], sent_start: usize, idx: usize) -> bool {
    let mut i = idx;
    while i > sent_start {
        i -= 1;
        match tokens[i].pos {
            Pos::Adj | Pos::Propn | Pos::Noun => continue,
            Pos::Adp => return true,
            _ => return false,
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Pattern NER
// ---------------------------------------------------------------------------

fn detect_entities(tokens: &[Token], sentences: &[Sentence]) -> Vec<EntitySpan> {
    let mut used = vec![false; tokens.len()];
    let mut entities = Vec::new();

    for sent in sentences {
        detect_organizations(tokens, sent, &mut used, &mut entities);
        detect_persons(tokens, sent, &mut used, &mut entities);
        detect_locations(tokens, sent, &mut used, &mut entities);
        detect_dates_and_amounts(tokens, sent, &mut used, &mut entities);
    }

    entities.sort_by_key(|e| e.token_start);
    entities
}

fn push_span(
    tokens: &[Token],
    start: usize,
    end: usize,
    label: &'static str,
    used: &mut [bool],
    out: &mut Vec<EntitySpan>,
) {
    let text = tokens[start..end]
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    for flag in used.iter_mut().take(end).skip(start) {
        *flag = true;
    }
    out.push(EntitySpan {
        text,
        label,
        start: tokens[start].start,
        token_start: start,
        token_end: end,
    });
}

fn detect_organizations(
    tokens: &[Token],
    sent: &Sentence,
    used: &mut [bool],
    out: &mut Vec<EntitySpan>,
) {
    let mut idx = sent.token_start;
    while idx < sent.token_end {
        if used[idx] {
            idx += 1;
            continue;
        }
        let tok = &tokens[idx];

        // All-caps acronyms (ZUS, NFZ, GUS).
        if tok.is_alpha
            && tok.text.len() >= 2
            && tok.text.len() <= 6
            && tok.text.chars().all(|c| c.is_uppercase())
        {
            push_span(tokens, idx, idx + 1, "ORG", used, out);
            idx += 1;
            continue;
        }

        if ORG_HEADS.contains(&tok.lemma.as_str()) {
            let mut end = idx + 1;
            while end < sent.token_end && end - idx < 5 {
                let t = &tokens[end];
                let bridges = t.pos == Pos::Adp
                    && end + 1 < sent.token_end
                    && tokens[end + 1].pos == Pos::Propn;
                if matches!(t.pos, Pos::Adj | Pos::Propn) || bridges {
                    end += 1;
                } else {
                    break;
                }
            }
            // A bare head noun is not an organization by itself.
            if end > idx + 1 {
                push_span(tokens, idx, end, "ORG", used, out);
                idx = end;
                continue;
            }
        }
        idx += 1;
    }
}

fn detect_persons(tokens: &[Token], sent: &Sentence, used: &mut [bool], out: &mut Vec<EntitySpan>) {
    let mut idx = sent.token_start;
    while idx + 1 < sent.token_end {
        if used[idx] || used[idx + 1] {
            idx += 1;
            continue;
        }
        let first = &tokens[idx];
        let second = &tokens[idx + 1];
        let both_caps = first.is_alpha
            && second.is_alpha
            && is_capitalized(&first.text)
            && is_capitalized(&second.text);
        if both_caps {
            let name_like = GIVEN_NAMES.contains(&first.lower.as_str())
                || SURNAME_SUFFIXES.iter().any(|s| second.lower.ends_with(s));
            if name_like {
                push_span(tokens, idx, idx + 2, "PER", used, out);
                idx += 2;
                continue;
            }
        }
        idx += 1;
    }
}

fn detect_locations(
    tokens: &[Token],
    sent: &Sentence,
    used: &mut [bool],
    out: &mut Vec<EntitySpan>,
) {
    for idx in sent.token_start..sent.token_end {
        if used[idx] {
            continue;
        }
        let tok = &tokens[idx];
        if tok.is_alpha && is_capitalized(&tok.text) && matches_city(&tok.lower) {
            push_span(tokens, idx, idx + 1, "LOC", used, out);
        }
    }
}

fn detect_dates_and_amounts(
    tokens: &[Token],
    sent: &Sentence,
    used: &mut [bool],
    out: &mut Vec<EntitySpan>,
) {
    let mut idx = sent.token_start;
    while idx < sent.token_end {
        if used[idx] {
            idx += 1;
            continue;
        }
        let tok = &tokens[idx];
        let numeric = tok.text.chars().all(|c| c.is_ascii_digit()) && !tok.text.is_empty();

        if numeric {
            // "12 maja 2024" / "12 maja"
            if idx + 1 < sent.token_end && MONTHS.contains(&tokens[idx + 1].lower.as_str()) {
                let mut end = idx + 2;
                if end < sent.token_end && is_year(&tokens[end].text) {
                    end += 1;
                }
                push_span(tokens, idx, end, "DATE", used, out);
                idx = end;
                continue;
            }
            // bare year
            if is_year(&tok.text) {
                push_span(tokens, idx, idx + 1, "DATE", used, out);
                idx += 1;
                continue;
            }
            // amounts
            if idx + 1 < sent.token_end {
                let next = &tokens[idx + 1];
                if CURRENCIES.contains(&next.lower.as_str()) {
                    push_span(tokens, idx, idx + 2, "MONEY", used, out);
                    idx += 2;
                    continue;
                }
                if next.text == "%" || next.lower == "procent" || next.lower == "proc" {
                    push_span(tokens, idx, idx + 2, "PERCENT", used, out);
                    idx += 2;
                    continue;
                }
            }
        }
        idx += 1;
    }
}

fn is_year(text: &str) -> bool {
    text.len() == 4
        && text.chars().all(|c| c.is_ascii_digit())
        && (text.starts_with("19") || text.starts_with("20"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_tokens_skip_digits_and_punct() {
        let nlp = PolishAnalyzer::new();
        let (raw, lemmas) = nlp.alpha_tokens("Rozwód w 2024 roku kosztuje 600 zł.");
        assert_eq!(raw, vec!["rozwód", "w", "roku", "kosztuje", "zł"]);
        assert_eq!(lemmas[0], "rozwód");
        assert_eq!(lemmas[2], "rok");
    }

    #[test]
    fn sentence_split_and_pos() {
        let nlp = PolishAnalyzer::new();
        let doc = nlp.analyze("Rozwód w Warszawie jest skomplikowany. Prawnik pomoże.");
        assert_eq!(doc.sentences.len(), 2);
        let toks = &doc.tokens;
        assert_eq!(toks[0].pos, Pos::Noun); // sentence-initial capitalization
        assert_eq!(toks[1].pos, Pos::Adp);
        assert_eq!(toks[2].pos, Pos::Propn);
        assert_eq!(toks[3].pos, Pos::Verb);
    }

    #[test]
    fn shallow_deps_mark_subject_and_object() {
        let nlp = PolishAnalyzer::new();
        let doc = nlp.analyze("Sąd rejonowy w Warszawie rozpatruje sprawy o rozwód");
        let sad = doc.tokens.iter().find(|t| t.lower == "sąd").unwrap();
        assert_eq!(sad.dep, Dep::Nsubj);
        let sprawy = doc.tokens.iter().find(|t| t.lower == "sprawy").unwrap();
        assert_eq!(sprawy.dep, Dep::Obj);
        let rozwod = doc.tokens.iter().find(|t| t.lower == "rozwód").unwrap();
        assert_eq!(rozwod.dep, Dep::Obl);
    }

    #[test]
    fn ner_finds_org_dates_and_amounts() {
        let nlp = PolishAnalyzer::new();
        let doc = nlp.analyze("Sąd Okręgowy w Warszawie orzekł 12 maja 2024. Opłata wynosi 600 zł, czyli 5% dochodu.");
        let labels: Vec<&str> = doc.entities.iter().map(|e| e.label).collect();
        assert!(labels.contains(&"ORG"));
        assert!(labels.contains(&"DATE"));
        assert!(labels.contains(&"MONEY"));
        assert!(labels.contains(&"PERCENT"));
        let org = doc.entities.iter().find(|e| e.label == "ORG").unwrap();
        assert!(org.text.to_lowercase().contains("sąd"));
    }
}
