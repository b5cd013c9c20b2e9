//! IPADIC morphological analyzer
//!
//! Readings come from the IPADIC dictionary embedded by `lindera`. A user
//! lexicon sits on top of it: at every position the longest user entry wins,
//! and only the stretches between user matches and break characters are
//! handed to the tokenizer.
//!
//! IPADIC feature layout (the reading is field 7):
//!
//! ```text
//! 品詞,品詞細分類1,品詞細分類2,品詞細分類3,活用型,活用形,原形,読み,発音
//! ```

use lindera::{DictionaryConfig, DictionaryKind, Mode, Tokenizer, TokenizerConfig};

use super::analyzer::{PartOfSpeech, PhoneticAnalyzer, Token};
use super::lexicon::{is_break_char, Lexicon};
use super::mora::{is_kana, is_kana_reading};
use crate::error::{Error, Result};

/// Readings IPADIC gets wrong for verse, bundled with the binary.
const BUNDLED_USER_DICTIONARY: &str = include_str!("../../data/userdic.csv");

const READING_FIELD: usize = 7;

pub struct IpadicAnalyzer {
    tokenizer: Tokenizer,
    user: Lexicon,
}

impl IpadicAnalyzer {
    /// Load the embedded IPADIC dictionary with `user` layered on top.
    pub fn new(user: Lexicon) -> Result<Self> {
        let config = TokenizerConfig {
            dictionary: DictionaryConfig {
                kind: Some(DictionaryKind::IPADIC),
                path: None,
            },
            user_dictionary: None,
            mode: Mode::Normal,
        };
        let tokenizer = Tokenizer::from_config(config)
            .map_err(|e| Error::Analyzer(format!("failed to load IPADIC: {}", e)))?;
        Ok(Self { tokenizer, user })
    }

    /// The lexicon of verse readings shipped with haikubot.
    pub fn bundled_user_lexicon() -> Result<Lexicon> {
        let mut lexicon = Lexicon::new();
        lexicon.extend_from_csv(BUNDLED_USER_DICTIONARY, "bundled user dictionary")?;
        Ok(lexicon)
    }

    pub fn user_lexicon(&self) -> &Lexicon {
        &self.user
    }

    /// Tokenize a stretch with no user entries and no break characters.
    fn analyze_run(&self, run: &str, tokens: &mut Vec<Token>) -> Result<()> {
        let mut parts = self
            .tokenizer
            .tokenize(run)
            .map_err(|e| Error::Analyzer(format!("tokenizer failed on {:?}: {}", run, e)))?;

        for part in parts.iter_mut() {
            let surface = part.text.to_string();
            let details: Vec<String> = part
                .get_details()
                .map(|fields| fields.iter().map(|f| f.to_string()).collect())
                .unwrap_or_default();
            tokens.push(to_token(surface, &details)?);
        }
        Ok(())
    }
}

fn to_token(surface: String, details: &[String]) -> Result<Token> {
    let pos = details
        .first()
        .map(|label| PartOfSpeech::from_label(label))
        .unwrap_or(PartOfSpeech::Unknown);
    if pos == PartOfSpeech::Symbol && surface.chars().all(is_break_char) {
        return Ok(Token::symbol(surface));
    }

    match details.get(READING_FIELD) {
        Some(reading) if reading != "*" && is_kana_reading(reading) => {
            Ok(Token::word(surface, reading.clone(), pos))
        }
        // unknown words written in kana are read as written
        _ if surface.chars().all(is_kana) => {
            let reading = surface.clone();
            Ok(Token::word(surface, reading, PartOfSpeech::Unknown))
        }
        _ => Err(Error::Analyzer(format!("no reading for {:?}", surface))),
    }
}

impl PhoneticAnalyzer for IpadicAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<Token>> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut run = String::new();
        let mut i = 0;

        while i < chars.len() {
            if let Some((len, entry)) = self.user.longest_match(&chars[i..]) {
                if !run.is_empty() {
                    self.analyze_run(&run, &mut tokens)?;
                    run.clear();
                }
                tokens.push(Token::word(
                    entry.surface.clone(),
                    entry.reading.clone(),
                    entry.pos,
                ));
                i += len;
                continue;
            }

            let c = chars[i];
            if is_break_char(c) {
                if !run.is_empty() {
                    self.analyze_run(&run, &mut tokens)?;
                    run.clear();
                }
                tokens.push(Token::symbol(c.to_string()));
            } else {
                run.push(c);
            }
            i += 1;
        }
        if !run.is_empty() {
            self.analyze_run(&run, &mut tokens)?;
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::fit;

    fn analyzer() -> IpadicAnalyzer {
        IpadicAnalyzer::new(IpadicAnalyzer::bundled_user_lexicon().unwrap()).unwrap()
    }

    fn morae(tokens: &[Token]) -> usize {
        tokens.iter().map(|t| t.morae).sum()
    }

    #[test]
    fn test_reads_everyday_kanji() {
        let analyzer = analyzer();
        for text in ["今日もまた仕事が終わり家に帰る", "閑さや岩にしみ入る蝉の声"] {
            assert!(analyzer.analyze(text).is_ok(), "{text}");
        }
        for text in ["朝起きて顔を洗って歯を磨く", "雪とけて村いっぱいの子どもかな"] {
            let tokens = analyzer.analyze(text).unwrap();
            assert!(fit(&tokens, &[5, 7, 5]).is_exact(), "{text}: {tokens:?}");
        }
    }

    #[test]
    fn test_user_entry_overrides_dictionary() {
        let analyzer = analyzer();
        let tokens = analyzer.analyze("天の香具山").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].reading, "アマノカグヤマ");
    }

    #[test]
    fn test_breaks_split_runs() {
        let analyzer = analyzer();
        let tokens = analyzer.analyze("ねこ、いぬ 😀").unwrap();
        assert_eq!(tokens.iter().filter(|t| t.is_break()).count(), 3);
        assert_eq!(morae(&tokens), 4);
    }

    #[test]
    fn test_latin_has_no_reading() {
        let analyzer = analyzer();
        assert!(matches!(analyzer.analyze("nostrの"), Err(Error::Analyzer(_))));
    }

    #[test]
    fn test_operator_entries_layer_over_bundled() {
        let mut user = IpadicAnalyzer::bundled_user_lexicon().unwrap();
        user.extend_from_csv("鯖缶,鯖缶,サバカン,名詞\n", "test").unwrap();
        let analyzer = IpadicAnalyzer::new(user).unwrap();
        let tokens = analyzer.analyze("鯖缶や").unwrap();
        assert_eq!(tokens[0].reading, "サバカン");
        assert_eq!(morae(&tokens), 5);
    }
}
