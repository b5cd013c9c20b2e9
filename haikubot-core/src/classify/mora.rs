//! Mora counting over kana readings.

/// Hiragana `ぁ`..`ゖ`, katakana `ァ`..`ヺ`, the prolonged sound mark and the
/// kana iteration marks.
pub fn is_kana(c: char) -> bool {
    matches!(c,
        '\u{3041}'..='\u{3096}'
        | '\u{30A1}'..='\u{30FA}'
        | 'ー'
        | 'ゝ' | 'ゞ' | 'ヽ' | 'ヾ')
}

/// Small kana that fuse with the preceding mora (`きゃ` is one mora).
///
/// `っ`/`ッ` is not included: the geminate is a mora of its own.
pub fn is_small_kana(c: char) -> bool {
    matches!(
        c,
        'ぁ' | 'ぃ'
            | 'ぅ'
            | 'ぇ'
            | 'ぉ'
            | 'ゃ'
            | 'ゅ'
            | 'ょ'
            | 'ゎ'
            | 'ァ'
            | 'ィ'
            | 'ゥ'
            | 'ェ'
            | 'ォ'
            | 'ャ'
            | 'ュ'
            | 'ョ'
            | 'ヮ'
    )
}

/// Number of morae in a kana reading. Non-kana characters count as zero.
pub fn count_morae(reading: &str) -> usize {
    reading
        .chars()
        .filter(|&c| is_kana(c) && !is_small_kana(c))
        .count()
}

/// True when every character is kana.
pub fn is_kana_reading(reading: &str) -> bool {
    !reading.is_empty() && reading.chars().all(is_kana)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_plain_kana() {
        assert_eq!(count_morae("フルイケ"), 4);
        assert_eq!(count_morae("かわず"), 3);
    }

    #[test]
    fn test_small_kana_merge() {
        assert_eq!(count_morae("キョウ"), 2);
        assert_eq!(count_morae("しゃしん"), 3);
        assert_eq!(count_morae("ホウリュウジ"), 5);
        assert_eq!(count_morae("フィルム"), 3);
    }

    #[test]
    fn test_geminate_and_long_vowel_count() {
        assert_eq!(count_morae("ガッコウ"), 4);
        assert_eq!(count_morae("コーヒー"), 4);
        assert_eq!(count_morae("ん"), 1);
    }

    #[test]
    fn test_non_kana_ignored() {
        assert_eq!(count_morae("abc"), 0);
        assert_eq!(count_morae("、"), 0);
        assert!(!is_kana_reading("ミズ1"));
        assert!(is_kana_reading("ミズ"));
        assert!(!is_kana_reading(""));
    }
}
