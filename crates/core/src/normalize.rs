use regex::Regex;
use std::collections::BTreeMap;

const STRESS_MARKS: [char; 2] = ['\u{0301}', '\u{0300}'];
const APOSTROPHES: [char; 3] = ['\'', '\u{2019}', '\u{02bc}'];

pub const MIN_WORD_CHARS: usize = 2;

/// Strips stress marks without Unicode decomposition, so `й` stays intact.
pub fn strip_stress_marks(text: &str) -> String {
    text.chars().filter(|ch| !STRESS_MARKS.contains(ch)).collect()
}

/// Canonical index key for a single word, or `None` when the input is not an indexable word.
pub fn normalize_word(word: &str) -> Option<String> {
    fold_word(word, true)
}

/// Like [`normalize_word`] but keeps `ё`, which dictionary page titles spell out.
pub fn lookup_title(word: &str) -> Option<String> {
    fold_word(word, false)
}

fn fold_word(word: &str, fold_yo: bool) -> Option<String> {
    let trimmed = word.trim();
    if trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let mut normalized = String::with_capacity(trimmed.len());
    for ch in strip_stress_marks(trimmed).chars() {
        if ch.is_numeric() {
            return None;
        }
        if ch.is_alphabetic() || ch == '-' {
            for lower in ch.to_lowercase() {
                normalized.push(if fold_yo && lower == 'ё' { 'е' } else { lower });
            }
        } else if !APOSTROPHES.contains(&ch) && !ch.is_ascii_punctuation() && !is_quote(ch) {
            return None;
        }
    }

    let normalized = normalized.trim_matches('-').to_string();
    if normalized.chars().count() < MIN_WORD_CHARS || !normalized.chars().any(char::is_alphabetic) {
        return None;
    }

    Some(normalized)
}

fn is_quote(ch: char) -> bool {
    matches!(ch, '«' | '»' | '„' | '“' | '”' | '…' | '—' | '–')
}

/// Tokenizer for dictionary page text.
pub struct Tokenizer {
    split_after_stress: Regex,
    bracketed: Regex,
    token: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            split_after_stress: Regex::new(r"([а-яёА-ЯЁ]) ([ть]+)\b")?,
            bracketed: Regex::new(r"\[([^\]]*)\]")?,
            token: Regex::new(r"(?i)[а-яёa-z][а-яёa-z0-9'’-]*")?,
        })
    }

    /// Normalized words of one page mapped to `page`.
    pub fn page_words(&self, text: &str, page: u32, into: &mut BTreeMap<String, u32>) {
        let text = strip_stress_marks(text);
        let text = self.split_after_stress.replace_all(&text, "$1$2");
        let text = self.bracketed.replace_all(&text, "$1");

        for found in self.token.find_iter(&text) {
            if let Some(word) = normalize_word(found.as_str()) {
                into.entry(word).or_insert(page);
            }
        }
    }

    pub fn words(&self, text: &str) -> Vec<String> {
        let mut found = BTreeMap::new();
        self.page_words(text, 0, &mut found);
        found.into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_accent_variants_share_a_key() {
        let expected = Some("креодив".to_string());
        assert_eq!(normalize_word("Крео\u{0301}див"), expected);
        assert_eq!(normalize_word("креодив"), expected);
        assert_eq!(normalize_word("КРЕОДИВ"), expected);
    }

    #[test]
    fn yo_folds_and_short_i_survives() {
        assert_eq!(normalize_word("Ёлка"), Some("елка".to_string()));
        assert_eq!(normalize_word("дизайн"), Some("дизайн".to_string()));
    }

    #[test]
    fn lookup_title_keeps_yo() {
        assert_eq!(lookup_title("Сёрфинг"), Some("сёрфинг".to_string()));
        assert_eq!(lookup_title("Тю\u{0301}нинг"), Some("тюнинг".to_string()));
        assert_eq!(lookup_title("два слова"), None);
    }

    #[test]
    fn rejects_digits_short_tokens_and_phrases() {
        assert_eq!(normalize_word("a"), None);
        assert_eq!(normalize_word("web3"), None);
        assert_eq!(normalize_word("два слова"), None);
        assert_eq!(normalize_word("--"), None);
        assert_eq!(normalize_word(""), None);
    }

    #[test]
    fn strips_punctuation_and_apostrophes() {
        assert_eq!(normalize_word("«креатив»!"), Some("креатив".to_string()));
        assert_eq!(normalize_word("мен'тор"), Some("ментор".to_string()));
        assert_eq!(normalize_word("чек-лист,"), Some("чек-лист".to_string()));
    }

    #[test]
    fn page_text_is_tokenized_with_dictionary_quirks() -> Result<(), regex::Error> {
        let tokenizer = Tokenizer::new()?;
        let words = tokenizer.words(
            "МЕ\u{0301}НТОР, -а; ме[н']тор. Нейросе\u{0301} ть 2024 г. к-1 фриланс фриланс",
        );

        assert!(words.contains(&"ментор".to_string()));
        assert!(words.contains(&"нейросеть".to_string()));
        assert!(words.contains(&"фриланс".to_string()));
        assert!(!words.iter().any(|word| word.chars().any(|ch| ch.is_ascii_digit())));
        assert!(!words.contains(&"г".to_string()));
        assert_eq!(words.iter().filter(|word| *word == "фриланс").count(), 1);
        Ok(())
    }

    #[test]
    fn first_page_reference_wins() -> Result<(), regex::Error> {
        let tokenizer = Tokenizer::new()?;
        let mut found = BTreeMap::new();
        tokenizer.page_words("бренд", 7, &mut found);
        tokenizer.page_words("бренд маркетинг", 9, &mut found);

        assert_eq!(found.get("бренд"), Some(&7));
        assert_eq!(found.get("маркетинг"), Some(&9));
        Ok(())
    }
}
