//! Lexical substitution variants
//!
//! Romanized words and loanwords have no reading in the lexicon, so a text
//! such as `nostrの…` would never fit a meter. A [`SubstitutionRuleSet`]
//! rewrites those spellings into kana before analysis. Rule sets are
//! alternatives: each one is applied to a fresh copy of the text.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Variants bundled into the binary.
const BUILTIN_SUBSTITUTIONS: &str = include_str!("../../data/substitutions.toml");

/// One compiled pattern → replacement pair.
#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    pattern: Regex,
    replacement: String,
}

impl SubstitutionRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid substitution pattern {:?}: {}", pattern, e)))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Ordered rules applied together as one variant.
#[derive(Debug, Clone)]
pub struct SubstitutionRuleSet {
    name: String,
    rules: Vec<SubstitutionRule>,
}

impl SubstitutionRuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<SubstitutionRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// The "no substitution" variant.
    pub fn identity() -> Self {
        Self::new("identity", Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_identity(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }

    /// Apply every rule in order. Replacements are literal (`$` is not expanded).
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            let replaced = rule
                .pattern
                .replace_all(&out, regex::NoExpand(rule.replacement.as_str()));
            out = replaced.into_owned();
        }
        out
    }
}

// File format

#[derive(Debug, Deserialize)]
struct SubstitutionFile {
    #[serde(default, rename = "variant")]
    variants: Vec<VariantEntry>,
}

#[derive(Debug, Deserialize)]
struct VariantEntry {
    name: String,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    pattern: String,
    replacement: String,
}

/// All variants the classifier tries, identity first.
///
/// Immutable once built; the classifier shares it by reference.
#[derive(Debug, Clone)]
pub struct Substitutions {
    variants: Vec<SubstitutionRuleSet>,
}

impl Substitutions {
    /// Identity only.
    pub fn none() -> Self {
        Self {
            variants: vec![SubstitutionRuleSet::identity()],
        }
    }

    /// Identity followed by the given variants, in order.
    pub fn with_variants(variants: impl IntoIterator<Item = SubstitutionRuleSet>) -> Self {
        let mut all = vec![SubstitutionRuleSet::identity()];
        all.extend(variants.into_iter().filter(|v| !v.is_identity()));
        Self { variants: all }
    }

    /// The bundled variants.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_SUBSTITUTIONS)
    }

    /// Load variants from an operator file, replacing the bundled ones.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read substitutions {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: SubstitutionFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse substitutions: {}", e)))?;

        let mut variants = Vec::with_capacity(file.variants.len());
        for variant in file.variants {
            let rules = variant
                .rules
                .iter()
                .map(|r| SubstitutionRule::new(&r.pattern, r.replacement.as_str()))
                .collect::<Result<Vec<_>>>()?;
            variants.push(SubstitutionRuleSet::new(variant.name, rules));
        }
        Ok(Self::with_variants(variants))
    }

    /// Variants in the order they are tried.
    pub fn variants(&self) -> &[SubstitutionRuleSet] {
        &self.variants
    }
}

impl Default for Substitutions {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_first() {
        let subs = Substitutions::builtin().unwrap();
        assert!(subs.variants().len() >= 2);
        assert!(subs.variants()[0].is_identity());
        assert_eq!(subs.variants()[0].apply("nostr"), "nostr");
    }

    #[test]
    fn test_builtin_variants_are_alternatives() {
        let subs = Substitutions::builtin().unwrap();
        let outputs: Vec<String> = subs
            .variants()
            .iter()
            .map(|v| v.apply("Nostrの夜"))
            .collect();
        assert_eq!(outputs[0], "Nostrの夜");
        assert_eq!(outputs[1], "ノストラの夜");
        assert_eq!(outputs[2], "ノスターの夜");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let set = SubstitutionRuleSet::new(
            "chain",
            vec![
                SubstitutionRule::new("a", "b").unwrap(),
                SubstitutionRule::new("b", "c").unwrap(),
            ],
        );
        assert_eq!(set.apply("ab"), "cc");
    }

    #[test]
    fn test_replacement_is_literal() {
        let set = SubstitutionRuleSet::new("lit", vec![SubstitutionRule::new("x", "$1").unwrap()]);
        assert_eq!(set.apply("x"), "$1");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subs.toml");
        std::fs::write(
            &path,
            r#"
[[variant]]
name = "custom"
rules = [{ pattern = "(?i)rust", replacement = "ラスト" }]
"#,
        )
        .unwrap();
        let subs = Substitutions::load(&path).unwrap();
        assert_eq!(subs.variants().len(), 2);
        assert_eq!(subs.variants()[1].name(), "custom");
        assert_eq!(subs.variants()[1].apply("Rustの"), "ラストの");
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let err = Substitutions::from_toml(
            r#"
[[variant]]
name = "broken"
rules = [{ pattern = "(", replacement = "x" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
