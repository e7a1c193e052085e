use std::sync::LazyLock;

use regex::Regex;

const MAX_KEYWORDS: usize = 10;
const MIN_KEYWORD_CHARS: usize = 4;
const STOPWORDS: &[&str] = &["the", "is", "at", "which", "on", "a", "an", "and", "or", "but"];

// ASCII word characters only: accented and non-Latin letters split words.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_]+").expect("valid non-word regex"));

/// Lowercases `text`, splits it on runs of non-ASCII-word characters, and
/// keeps the first ten tokens longer than three characters that are not
/// stopwords.
///
/// Order is preserved and duplicates are kept.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .split(&lowered)
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS && !STOPWORDS.contains(word))
        .take(MAX_KEYWORDS)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_keywords() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("  ...  ").is_empty());
    }

    #[test]
    fn short_tokens_are_dropped() {
        assert_eq!(
            extract_keywords("The new AI app is out now, wow!"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn keeps_order_and_duplicates() {
        assert_eq!(
            extract_keywords("Launch day! LAUNCH party, then launch-week recap."),
            vec!["launch", "launch", "party", "then", "launch", "week", "recap"]
        );
    }

    #[test]
    fn non_ascii_letters_split_words() {
        assert_eq!(
            extract_keywords("Lançamento amanhã, 東京 launch"),
            vec!["amento", "amanh", "launch"]
        );
    }

    #[test]
    fn caps_at_ten() {
        let text = "alpha bravo charlie delta echo1 foxtrot golf1 hotel india1 juliet kilo1 lima1";
        let keywords = extract_keywords(text);
        assert_eq!(keywords.len(), 10);
        assert_eq!(keywords[0], "alpha");
        assert_eq!(keywords[9], "juliet");
    }
}
