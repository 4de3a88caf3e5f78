//! Text cleanup for model output and the final English sentence.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_PHRASE_WORDS: usize = 5;

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,!?:;])").expect("valid punctuation pattern"));
static OPTIONAL_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([.,!?:;])").expect("valid punctuation pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static SPACE_BEFORE_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+,").expect("valid comma pattern"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\-'ōū]+").expect("valid word pattern"));
static PHRASE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\s+|, ?)$").expect("valid separator pattern"));

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Tidy a raw sentence from the translation model
pub fn clean_model_output(text: &str) -> String {
    let text = SPACE_BEFORE_PUNCT.replace_all(text.trim(), "$1");
    collapse_whitespace(&text)
        .replace(" .", ".")
        .replace("' ", "'")
        .replace(" n't", "n't")
}

/// Final cleanup once placeholders have been substituted
pub fn finalize_sentence(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = OPTIONAL_SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = text.replace(" 's", "'s").replace(" n't", "n't");
    remove_adjacent_duplicate_phrases(&text)
}

/// Collapse a phrase of up to five words repeated back to back, as in
/// "Shinjuku, Shinjuku" or "bound for Tokyo bound for Tokyo".
/// Comparison ignores case; the first copy is kept.
pub fn remove_adjacent_duplicate_phrases(text: &str) -> String {
    let mut text = SPACE_BEFORE_COMMA.replace_all(text, ",").into_owned();

    for n in (1..=MAX_PHRASE_WORDS).rev() {
        while let Some(repeat) = find_repeat(&text, n) {
            text.replace_range(repeat, "");
        }
    }

    let text = collapse_whitespace(&text);
    SPACE_BEFORE_PUNCT.replace_all(&text, "$1").into_owned()
}

/// Byte range covering the separator and second copy of the first
/// `n`-word phrase that is immediately repeated.
fn find_repeat(text: &str, n: usize) -> Option<Range<usize>> {
    let words: Vec<Range<usize>> = WORD.find_iter(text).map(|m| m.range()).collect();
    if words.len() < 2 * n {
        return None;
    }

    for i in 0..=words.len() - 2 * n {
        let first = &words[i..i + n];
        let second = &words[i + n..i + 2 * n];

        let joined = first
            .windows(2)
            .all(|pair| PHRASE_SEPARATOR.is_match(&text[pair[0].end..pair[1].start]));
        if !joined {
            continue;
        }

        let gap = &text[first[n - 1].end..second[0].start];
        if gap != " " && gap != ", " {
            continue;
        }

        let phrase = &text[first[0].start..first[n - 1].end];
        let repeat = &text[second[0].start..second[n - 1].end];
        if phrase.to_lowercase() == repeat.to_lowercase() {
            return Some(first[n - 1].end..second[n - 1].end);
        }
    }
    None
}
