use std::collections::HashMap;
use unicase::UniCase;

/// Finance-specific valences layered over the general lexicon.
///
/// Multi-word entries never match the word-level tokenizer; they are kept so the
/// table stays the single list of tuned terms.
pub const FINANCE_LEXICON: &[(&str, f64)] = &[
    ("bullish", 4.0),
    ("bearish", -3.0),
    ("outperform", 3.0),
    ("underperform", -2.0),
    ("buy", 3.0),
    ("sell", -2.0),
    ("upgrade", 3.5),
    ("downgrade", -2.5),
    ("beat", 3.0),
    ("miss", -2.0),
    ("exceeded", 3.0),
    ("fell short", -2.0),
    ("growth", 2.5),
    ("decline", -1.5),
    ("profit", 2.5),
    ("loss", -1.5),
    ("positive", 2.0),
    ("negative", -1.0),
    ("strong", 2.0),
    ("weak", -1.0),
    ("surge", 3.0),
    ("plunge", -2.0),
    ("rise", 2.0),
    ("fall", -1.0),
    ("rally", 3.0),
    ("crash", -2.5),
    ("breakthrough", 3.0),
    ("breakdown", -2.0),
];

/// An immutable word -> valence table.
///
/// Built once (general lexicon merged with an override table) and handed to the
/// scorer; nothing mutates it afterwards. Keys compare case-insensitively.
#[derive(Debug, Clone)]
pub struct Lexicon {
    words: HashMap<UniCase<&'static str>, f64>,
}

impl Lexicon {
    pub fn general() -> Self {
        Self {
            words: (*vader_sentiment::LEXICON).clone(),
        }
    }

    /// General lexicon extended with [`FINANCE_LEXICON`].
    pub fn finance() -> Self {
        Self::general().with_overrides(FINANCE_LEXICON)
    }

    pub fn with_overrides(mut self, overrides: &[(&'static str, f64)]) -> Self {
        for (word, valence) in overrides {
            self.words.insert(UniCase::new(*word), *valence);
        }
        self
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.words.get(&UniCase::new(word)).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub(crate) fn words(&self) -> &HashMap<UniCase<&'static str>, f64> {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finance_overrides_win_over_general_entries() {
        let lex = Lexicon::finance();
        assert_eq!(lex.valence("bullish"), Some(4.0));
        assert_eq!(lex.valence("Bearish"), Some(-3.0));
        assert_eq!(lex.valence("upgrade"), Some(3.5));
        assert_eq!(lex.valence("miss"), Some(-2.0));
    }

    #[test]
    fn general_lexicon_is_left_untouched() {
        let general = Lexicon::general();
        let finance = Lexicon::finance();
        assert!(general.valence("good").is_some_and(|v| v > 0.0));
        assert_eq!(general.valence("good"), finance.valence("good"));
        assert!(finance.len() >= general.len());
        assert_ne!(general.valence("upgrade"), Some(3.5));
    }
}
