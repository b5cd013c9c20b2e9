//! Phonetic analyzer abstraction
//!
//! The classifier never looks at characters directly. It asks a
//! [`PhoneticAnalyzer`] to split text into tokens that carry a mora count and
//! only sums those counts. Punctuation, whitespace and emoji are returned as
//! break tokens with zero morae, so they never shift a phrase boundary.

use crate::error::Result;

/// Coarse part-of-speech tag, enough for tracing and break detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Particle,
    Auxiliary,
    Interjection,
    Adnominal,
    Conjunction,
    Prefix,
    /// Punctuation, whitespace, emoji
    Symbol,
    /// Known word class outside the list above
    Other,
    /// Kana that matched no lexicon entry
    Unknown,
}

impl PartOfSpeech {
    /// Parse the leading IPADIC-style part-of-speech label (`名詞`, `助詞`, ...).
    pub fn from_label(label: &str) -> Self {
        match label.split('-').next().unwrap_or("").trim() {
            "名詞" => PartOfSpeech::Noun,
            "動詞" => PartOfSpeech::Verb,
            "形容詞" => PartOfSpeech::Adjective,
            "副詞" => PartOfSpeech::Adverb,
            "助詞" => PartOfSpeech::Particle,
            "助動詞" => PartOfSpeech::Auxiliary,
            "感動詞" => PartOfSpeech::Interjection,
            "連体詞" => PartOfSpeech::Adnominal,
            "接続詞" => PartOfSpeech::Conjunction,
            "接頭詞" => PartOfSpeech::Prefix,
            "記号" => PartOfSpeech::Symbol,
            _ => PartOfSpeech::Other,
        }
    }
}

/// One unit of analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Text as written
    pub surface: String,
    /// Kana reading (empty for breaks)
    pub reading: String,
    pub pos: PartOfSpeech,
    /// Morae contributed to the current phrase
    pub morae: usize,
}

impl Token {
    pub fn word(surface: impl Into<String>, reading: impl Into<String>, pos: PartOfSpeech) -> Self {
        let reading = reading.into();
        let morae = super::mora::count_morae(&reading);
        Self {
            surface: surface.into(),
            reading,
            pos,
            morae,
        }
    }

    pub fn symbol(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            reading: String::new(),
            pos: PartOfSpeech::Symbol,
            morae: 0,
        }
    }

    /// Natural break point: excluded from counting.
    pub fn is_break(&self) -> bool {
        self.pos == PartOfSpeech::Symbol
    }
}

/// Splits text into tokens with per-token mora counts.
///
/// Implementations must be deterministic and side-effect free. An `Err`
/// means the text could not be read (unknown characters, malformed input);
/// callers treat it as "no match".
pub trait PhoneticAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<Token>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_from_label() {
        assert_eq!(PartOfSpeech::from_label("名詞"), PartOfSpeech::Noun);
        assert_eq!(PartOfSpeech::from_label("助詞-格助詞"), PartOfSpeech::Particle);
        assert_eq!(PartOfSpeech::from_label("カスタム名詞"), PartOfSpeech::Other);
    }

    #[test]
    fn test_token_constructors() {
        let word = Token::word("今日", "キョウ", PartOfSpeech::Noun);
        assert_eq!(word.morae, 2);
        assert!(!word.is_break());

        let comma = Token::symbol("、");
        assert_eq!(comma.morae, 0);
        assert!(comma.is_break());
    }
}
