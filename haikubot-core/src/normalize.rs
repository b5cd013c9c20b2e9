//! Text normalization applied before meter classification.
//!
//! Links and hashtags carry no meter, so they are stripped before the text
//! reaches the analyzer. Passes repeat until the text stops changing, which
//! keeps `normalize` idempotent even when a removal exposes a new match.

use regex::Regex;
use std::sync::LazyLock;

static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+://\S+\b").expect("link pattern is valid"));

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B#\S+").expect("hashtag pattern is valid"));

static RE_JAPANESE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[０-９Ａ-Ｚａ-ｚぁ-ゖァ-ヾ一-鶴]").expect("japanese pattern is valid")
});

/// Strip URLs and hashtags, then trim surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    let mut current = strip_once(raw);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(s: &str) -> String {
    let without_links = RE_LINK.replace_all(s, "");
    let without_tags = RE_HASHTAG.replace_all(&without_links, "");
    without_tags.trim().to_string()
}

/// Cheap pre-check: does the text contain any Japanese character at all?
pub fn contains_japanese(s: &str) -> bool {
    RE_JAPANESE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_links() {
        assert_eq!(
            normalize("古池や https://example.com/a?b=1 蛙飛び込む"),
            "古池や  蛙飛び込む"
        );
        assert_eq!(normalize("wss://relay.example.com"), "");
    }

    #[test]
    fn test_strips_hashtags() {
        assert_eq!(normalize("水の音 #haiku"), "水の音");
        assert_eq!(normalize("#nostr 水の音"), "水の音");
        // adjacent to punctuation
        assert_eq!(normalize("水の音。#俳句"), "水の音。");
    }

    #[test]
    fn test_keeps_inline_hash_after_word() {
        // `#` glued to a word character is not a hashtag start
        assert_eq!(normalize("C#言語"), "C#言語");
    }

    #[test]
    fn test_link_and_tag_only_is_empty() {
        assert_eq!(normalize("https://example.com/x.png #n575"), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "古池や蛙飛び込む水の音",
            "  spaced  ",
            "##double #tag",
            "a https://x.y/z. b #c d",
            "見て http://a.b/c#frag 😀",
            "#a#b#c",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_contains_japanese() {
        assert!(contains_japanese("古池や"));
        assert!(contains_japanese("カエル"));
        assert!(contains_japanese("ｈｅｌｌｏ"));
        assert!(!contains_japanese("hello world"));
        assert!(!contains_japanese("한국어"));
        assert!(!contains_japanese(""));
    }
}
