//! Mora-meter classification
//!
//! [`Classifier::matches`] answers one question: does the text, under some
//! substitution variant, split into phrases whose mora counts equal the
//! pattern exactly? The analyzer does the reading; this module only counts.
//!
//! ## Fitting
//!
//! Tokens are consumed left to right. Break tokens (punctuation, whitespace)
//! and zero-mora tokens are skipped. Morae accumulate into the current phrase
//! until it reaches its target, at which point the next phrase starts. The
//! text fits when every phrase reaches its target and no token is left over.
//! A token that pushes a phrase past its target fails the fit: phrase
//! boundaries always fall between tokens.

pub mod analyzer;
pub mod ipadic;
pub mod lexicon;
pub mod mora;
pub mod substitution;

use std::fmt;
use std::sync::Arc;

pub use analyzer::{PartOfSpeech, PhoneticAnalyzer, Token};
pub use ipadic::IpadicAnalyzer;
pub use lexicon::{Lexicon, LexiconAnalyzer, LexiconEntry};
pub use substitution::{SubstitutionRule, SubstitutionRuleSet, Substitutions};

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::normalize::contains_japanese;
use crate::types::Meter;

/// Result of fitting one token sequence against a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fit {
    /// Every phrase hit its target exactly.
    Exact,
    /// Counting stopped; `phrases` holds the counts reached so far.
    Mismatch { phrases: Vec<usize> },
}

impl Fit {
    pub fn is_exact(&self) -> bool {
        matches!(self, Fit::Exact)
    }
}

/// Fit tokens against a pattern of per-phrase mora counts.
pub fn fit(tokens: &[Token], pattern: &[usize]) -> Fit {
    if pattern.is_empty() {
        return Fit::Mismatch { phrases: vec![] };
    }

    let mut phrases: Vec<usize> = vec![0];
    for token in tokens.iter().filter(|t| !t.is_break() && t.morae > 0) {
        let idx = phrases.len() - 1;
        let Some(&target) = pattern.get(idx) else {
            // all phrases complete, token left over
            phrases.push(token.morae);
            return Fit::Mismatch { phrases };
        };

        phrases[idx] += token.morae;
        if phrases[idx] > target {
            return Fit::Mismatch { phrases };
        }
        if phrases[idx] == target {
            phrases.push(0);
        }
    }

    // the last completed phrase left an empty one open
    if phrases.last() == Some(&0) {
        phrases.pop();
    }
    if phrases.as_slice() == pattern {
        Fit::Exact
    } else {
        Fit::Mismatch { phrases }
    }
}

/// Why a text was rejected before any analysis ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    EmptyText,
    NoJapanese,
    EmptyPattern,
}

impl fmt::Display for Precheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precheck::EmptyText => f.write_str("empty text"),
            Precheck::NoJapanese => f.write_str("no japanese characters"),
            Precheck::EmptyPattern => f.write_str("empty pattern"),
        }
    }
}

/// Outcome of one substitution variant.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub variant: String,
    /// Text after substitution
    pub text: String,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Fit(Fit),
    /// The analyzer could not read the text
    Unreadable(String),
}

/// Diagnostic trace of a classification, for `--verbose` and tests.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub pattern: Vec<usize>,
    pub precheck: Option<Precheck>,
    pub attempts: Vec<Attempt>,
}

impl Explanation {
    pub fn matched(&self) -> bool {
        self.attempts.iter().any(|a| {
            matches!(&a.outcome, AttemptOutcome::Fit(fit) if fit.is_exact())
        })
    }

    /// Name of the variant that matched, if any.
    pub fn matched_variant(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| matches!(&a.outcome, AttemptOutcome::Fit(fit) if fit.is_exact()))
            .map(|a| a.variant.as_str())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern {:?}", self.pattern)?;
        if let Some(reason) = self.precheck {
            return write!(f, ": skipped ({})", reason);
        }
        for attempt in &self.attempts {
            write!(f, "\n  [{}] {:?}: ", attempt.variant, attempt.text)?;
            match &attempt.outcome {
                AttemptOutcome::Fit(Fit::Exact) => write!(f, "match")?,
                AttemptOutcome::Fit(Fit::Mismatch { phrases }) => write!(f, "{:?}", phrases)?,
                AttemptOutcome::Unreadable(msg) => write!(f, "unreadable ({})", msg)?,
            }
        }
        Ok(())
    }
}

/// Meter classifier: an analyzer plus the substitution variants to try.
#[derive(Clone)]
pub struct Classifier {
    analyzer: Arc<dyn PhoneticAnalyzer>,
    substitutions: Arc<Substitutions>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("variants", &self.substitutions.variants().len())
            .finish()
    }
}

impl Classifier {
    pub fn new(analyzer: Arc<dyn PhoneticAnalyzer>, substitutions: Substitutions) -> Self {
        Self {
            analyzer,
            substitutions: Arc::new(substitutions),
        }
    }

    /// Build from configuration: IPADIC with the bundled and the operator's
    /// user dictionary on top, and either the bundled or the operator's
    /// substitution variants.
    ///
    /// Unreadable or malformed files are configuration errors.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let mut user = IpadicAnalyzer::bundled_user_lexicon()?;
        if let Some(path) = &config.user_dictionary {
            let added = user.load_user_dictionary(path)?;
            tracing::info!(path = %path.display(), entries = added, "Loaded user dictionary");
        }

        let substitutions = match &config.substitutions {
            Some(path) => Substitutions::load(path)?,
            None => Substitutions::builtin()?,
        };
        tracing::debug!(
            user_entries = user.len(),
            variants = substitutions.variants().len(),
            "Classifier ready"
        );

        Ok(Self::new(Arc::new(IpadicAnalyzer::new(user)?), substitutions))
    }

    pub fn substitutions(&self) -> &Substitutions {
        &self.substitutions
    }

    /// Does `text` fit `pattern` under any variant?
    ///
    /// Never fails: analyzer errors count as "no match".
    pub fn matches(&self, text: &str, pattern: &[usize]) -> bool {
        if precheck(text, pattern).is_some() {
            return false;
        }
        for variant in self.substitutions.variants() {
            let candidate = variant.apply(text);
            match self.analyzer.analyze(&candidate) {
                Ok(tokens) => {
                    if fit(&tokens, pattern).is_exact() {
                        tracing::trace!(variant = variant.name(), "Meter match");
                        return true;
                    }
                }
                Err(e) => {
                    tracing::trace!(variant = variant.name(), error = %e, "Analyzer rejected text");
                }
            }
        }
        false
    }

    /// First meter the text fits, haiku before tanka.
    pub fn classify(&self, text: &str) -> Option<Meter> {
        Meter::ALL
            .into_iter()
            .find(|meter| self.matches(text, meter.pattern()))
    }

    /// Same decision as [`Classifier::matches`], keeping every attempt.
    ///
    /// Stops at the first exact fit, like `matches`.
    pub fn explain(&self, text: &str, pattern: &[usize]) -> Explanation {
        let mut explanation = Explanation {
            pattern: pattern.to_vec(),
            precheck: precheck(text, pattern),
            attempts: Vec::new(),
        };
        if explanation.precheck.is_some() {
            return explanation;
        }

        for variant in self.substitutions.variants() {
            let candidate = variant.apply(text);
            let outcome = match self.analyzer.analyze(&candidate) {
                Ok(tokens) => AttemptOutcome::Fit(fit(&tokens, pattern)),
                Err(e) => AttemptOutcome::Unreadable(e.to_string()),
            };
            let done = matches!(&outcome, AttemptOutcome::Fit(f) if f.is_exact());
            explanation.attempts.push(Attempt {
                variant: variant.name().to_string(),
                text: candidate,
                outcome,
            });
            if done {
                break;
            }
        }
        explanation
    }
}

fn precheck(text: &str, pattern: &[usize]) -> Option<Precheck> {
    if pattern.is_empty() {
        Some(Precheck::EmptyPattern)
    } else if text.trim().is_empty() {
        Some(Precheck::EmptyText)
    } else if !contains_japanese(text) {
        Some(Precheck::NoJapanese)
    } else {
        None
    }
}
