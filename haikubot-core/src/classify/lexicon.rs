//! Dictionary-backed analyzer
//!
//! Lexicon files use the kagome user dictionary layout, one entry per line:
//!
//! ```text
//! # surface,segmentation,reading,part-of-speech
//! 古池,古池,フルイケ,名詞
//! 飛び込む,飛び 込む,トビ コム,動詞
//! ```
//!
//! Segmentation and reading may be space separated; the reading pieces are
//! joined and counted as a single token. Lines starting with `#` are comments.

use std::collections::HashMap;
use std::path::Path;

use super::analyzer::{PartOfSpeech, PhoneticAnalyzer, Token};
use super::mora::{is_kana, is_kana_reading};
use crate::error::{Error, Result};

/// Lexicon bundled into the binary.
const BUILTIN_LEXICON: &str = include_str!("../../data/lexicon.csv");

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub surface: String,
    pub reading: String,
    pub pos: PartOfSpeech,
}

/// Surface → entry map with longest-match lookup.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, LexiconEntry>,
    /// Longest surface, in chars
    max_len: usize,
}

impl Lexicon {
    /// Empty lexicon (kana-only analysis).
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled lexicon.
    pub fn builtin() -> Result<Self> {
        let mut lexicon = Self::new();
        lexicon.extend_from_csv(BUILTIN_LEXICON, "builtin lexicon")?;
        Ok(lexicon)
    }

    /// Add entries from a user dictionary file. Later entries override earlier ones.
    pub fn load_user_dictionary(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read user dictionary {:?}: {}", path, e))
        })?;
        self.extend_from_csv(&content, &path.display().to_string())
    }

    /// Parse CSV content and merge it in. Returns the number of entries read.
    pub fn extend_from_csv(&mut self, content: &str, origin: &str) -> Result<usize> {
        let mut added = 0;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = parse_line(line)
                .map_err(|msg| Error::Config(format!("{}:{}: {}", origin, idx + 1, msg)))?;
            self.insert(entry);
            added += 1;
        }
        Ok(added)
    }

    pub fn insert(&mut self, entry: LexiconEntry) {
        self.max_len = self.max_len.max(entry.surface.chars().count());
        self.entries.insert(entry.surface.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, surface: &str) -> Option<&LexiconEntry> {
        self.entries.get(surface)
    }

    /// Longest entry that is a prefix of `chars`, with its length in chars.
    pub(crate) fn longest_match(&self, chars: &[char]) -> Option<(usize, &LexiconEntry)> {
        let upper = self.max_len.min(chars.len());
        (1..=upper).rev().find_map(|len| {
            let candidate: String = chars[..len].iter().collect();
            self.entries.get(&candidate).map(|entry| (len, entry))
        })
    }
}

fn parse_line(line: &str) -> std::result::Result<LexiconEntry, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }
    let surface = fields[0];
    if surface.is_empty() {
        return Err("empty surface".to_string());
    }
    let reading: String = fields[2].split_whitespace().collect();
    if !is_kana_reading(&reading) {
        return Err(format!("reading {:?} is not kana", fields[2]));
    }
    Ok(LexiconEntry {
        surface: surface.to_string(),
        reading,
        pos: PartOfSpeech::from_label(fields[3]),
    })
}

/// Break characters: whitespace and anything that is neither a letter nor a
/// digit (punctuation, brackets, emoji).
pub(crate) fn is_break_char(c: char) -> bool {
    c.is_whitespace() || !c.is_alphanumeric()
}

/// Analyzer that segments text by longest lexicon match.
///
/// Needs no dictionary download and reads only what its lexicon lists, which
/// makes it the deterministic analyzer for tests and offline fixtures.
///
/// Characters not covered by the lexicon are handled as follows:
/// - kana: one token per character, read as written
/// - punctuation, whitespace, emoji: break tokens
/// - anything else (kanji, latin letters, digits): analysis fails
#[derive(Debug, Clone)]
pub struct LexiconAnalyzer {
    lexicon: Lexicon,
}

impl LexiconAnalyzer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Analyzer over the bundled lexicon.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Lexicon::builtin()?))
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }
}

impl PhoneticAnalyzer for LexiconAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<Token>> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            if let Some((len, entry)) = self.lexicon.longest_match(&chars[i..]) {
                tokens.push(Token::word(
                    entry.surface.clone(),
                    entry.reading.clone(),
                    entry.pos,
                ));
                i += len;
                continue;
            }

            let c = chars[i];
            if is_kana(c) {
                tokens.push(Token::word(c.to_string(), c.to_string(), PartOfSpeech::Unknown));
            } else if is_break_char(c) {
                tokens.push(Token::symbol(c.to_string()));
            } else {
                return Err(Error::Analyzer(format!(
                    "no reading for {:?} at offset {}",
                    c, i
                )));
            }
            i += 1;
        }

        Ok(tokens)
    }
}
