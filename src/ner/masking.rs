use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::interface::RecognizedEntity;

/// Operator and service-type words stripped from the front of an entity.
const PREFIXES: [&str; 9] = [
    "京都市営地下鉄",
    "名古屋市営地下鉄",
    "東京メトロ",
    "東急",
    "都営",
    "快速",
    "JR",
    "快速アクティー",
    "アクティー",
];

/// Line, station and direction words stripped from the end of an entity.
/// A trailing `号` is only stripped together with its train number.
const SUFFIXES: [&str; 27] = [
    "鉄道大雄山線",
    "アーバンパークライン",
    "ディズニーリゾートライン",
    "エクスプレス",
    "スカイライナー",
    "ニューシャトル",
    "モノレール",
    "リゾートライン",
    "市営地下鉄ブルーライン",
    "地下鉄ブルーライン",
    "ブルーライン",
    "ライン",
    "新幹線",
    "本線",
    "空港線",
    "環状線",
    "地下鉄",
    "メトロ線",
    "方面行き",
    "方面",
    "行き",
    "鉄道",
    "線",
    "駅",
    "シーサイド",
    "ヒカリエShinQs前",
    "三丁目",
];

static NUMBERED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d０-９]+号$").expect("valid train number pattern"));

/// An entity replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedEntity {
    pub placeholder: String,
    pub japanese: String,
    pub entity_type: String,
}

/// Input text with entity spans replaced by `[PHn]` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedText {
    pub text: String,
    /// In placeholder order
    pub entities: Vec<MaskedEntity>,
}

impl MaskedText {
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            entities: Vec::new(),
        }
    }
}

/// Result of stripping affixes; `prefix + core + suffix` is the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affixes<'a> {
    pub prefix: &'a str,
    pub core: &'a str,
    pub suffix: &'a str,
}

#[derive(Debug, Clone)]
struct Span {
    start: usize,
    end: usize,
    entity_type: String,
}

/// Turns recognizer output into a placeholder-bearing sentence.
pub struct EntityMasker {
    tags: HashSet<String>,
    prefixes: Vec<&'static str>,
    suffixes: Vec<&'static str>,
}

impl EntityMasker {
    pub fn new(tags: &[String]) -> Self {
        let mut prefixes = PREFIXES.to_vec();
        prefixes.sort_by_key(|p| Reverse(p.chars().count()));
        let mut suffixes = SUFFIXES.to_vec();
        suffixes.sort_by_key(|s| Reverse(s.chars().count()));

        Self {
            tags: tags.iter().cloned().collect(),
            prefixes,
            suffixes,
        }
    }

    /// Remove the longest known suffix, then the longest known prefix.
    /// Falls back to the whole text when nothing would remain.
    pub fn strip_affixes<'a>(&self, text: &'a str) -> Affixes<'a> {
        let (rest, suffix) = if let Some(m) = NUMBERED_SUFFIX.find(text) {
            (&text[..m.start()], m.as_str())
        } else if let Some(suffix) = self.suffixes.iter().find(|s| text.ends_with(*s)) {
            (&text[..text.len() - suffix.len()], *suffix)
        } else {
            (text, "")
        };

        let (prefix, core) = match self.prefixes.iter().find(|p| rest.starts_with(*p)) {
            Some(prefix) => (*prefix, &rest[prefix.len()..]),
            None => ("", rest),
        };

        if core.is_empty() {
            return Affixes {
                prefix: "",
                core: text,
                suffix: "",
            };
        }

        Affixes {
            prefix,
            core,
            suffix,
        }
    }

    /// Replace recognized entities in `text` with placeholders.
    pub fn mask(&self, text: &str, entities: Vec<RecognizedEntity>) -> MaskedText {
        let mut candidates: Vec<RecognizedEntity> = entities
            .into_iter()
            .filter(|e| self.tags.contains(&e.entity_group))
            .collect();
        if candidates.is_empty() {
            return MaskedText::unchanged(text);
        }
        candidates.sort_by_key(|e| Reverse(e.word.chars().filter(|c| *c != ' ').count()));

        let chars: Vec<char> = text.chars().collect();
        let spans = self.locate_spans(&chars, &candidates);
        if spans.is_empty() {
            return MaskedText::unchanged(text);
        }

        let mut placeholders: HashMap<String, String> = HashMap::new();
        let mut masked_entities = Vec::new();
        let mut masked = String::with_capacity(text.len());
        let mut last = 0;

        for span in merge_adjacent(spans) {
            let original: String = chars[span.start..span.end].iter().collect();
            let affixes = self.strip_affixes(&original);

            let placeholder = match placeholders.get(affixes.core) {
                Some(placeholder) => placeholder.clone(),
                None => {
                    let placeholder = format!("[PH{}]", masked_entities.len() + 1);
                    placeholders.insert(affixes.core.to_string(), placeholder.clone());
                    masked_entities.push(MaskedEntity {
                        placeholder: placeholder.clone(),
                        japanese: affixes.core.to_string(),
                        entity_type: span.entity_type.clone(),
                    });
                    placeholder
                }
            };

            masked.extend(&chars[last..span.start]);
            masked.push_str(affixes.prefix);
            masked.push_str(&placeholder);
            masked.push_str(affixes.suffix);
            last = span.end;
        }
        masked.extend(&chars[last..]);

        MaskedText {
            text: masked,
            entities: masked_entities,
        }
    }

    /// Resolve character spans for the candidates, longest first, skipping
    /// any span that overlaps one already taken.
    fn locate_spans(&self, chars: &[char], candidates: &[RecognizedEntity]) -> Vec<Span> {
        let mut occupied = vec![false; chars.len()];
        let mut cursors: HashMap<Vec<char>, usize> = HashMap::new();
        let mut spans = Vec::new();

        for entity in candidates {
            let word: Vec<char> = entity.word.chars().filter(|c| *c != ' ').collect();
            if word.is_empty() {
                continue;
            }

            let located = match (entity.start, entity.end) {
                (Some(start), Some(end))
                    if start <= end
                        && end <= chars.len()
                        && chars[start..end].iter().filter(|c| **c != ' ').eq(word.iter()) =>
                {
                    Some((start, end))
                }
                _ => {
                    let cursor = cursors.entry(word.clone()).or_insert(0);
                    restore_offset(chars, &word, cursor)
                }
            };
            let Some((start, mut end)) = located else {
                continue;
            };
            if start == end || occupied[start..end].iter().any(|taken| *taken) {
                continue;
            }

            // Keep a train number's 号 with the number.
            if end < chars.len() && chars[end] == '号' && !occupied[end] && is_digit(chars[end - 1]) {
                end += 1;
            }

            occupied[start..end].iter_mut().for_each(|taken| *taken = true);
            spans.push(Span {
                start,
                end,
                entity_type: entity.entity_group.clone(),
            });
        }

        spans
    }
}

/// Find the first non-overlapping occurrence of `word` at or after `cursor`.
fn restore_offset(chars: &[char], word: &[char], cursor: &mut usize) -> Option<(usize, usize)> {
    let mut position = 0;
    while position + word.len() <= chars.len() {
        if chars[position..position + word.len()] == *word {
            if position >= *cursor {
                *cursor = position + 1;
                return Some((position, position + word.len()));
            }
            position += word.len();
        } else {
            position += 1;
        }
    }
    None
}

fn merge_adjacent(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by_key(|span| span.start);
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.end == span.start => last.end = span.end,
            _ => merged.push(span),
        }
    }
    merged
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TRAIN_ANNOUNCEMENT_TAGS;

    fn masker() -> EntityMasker {
        let tags: Vec<String> = TRAIN_ANNOUNCEMENT_TAGS.iter().map(|t| t.to_string()).collect();
        EntityMasker::new(&tags)
    }

    fn entity(group: &str, word: &str, offsets: Option<(usize, usize)>) -> RecognizedEntity {
        RecognizedEntity {
            entity_group: group.to_string(),
            word: word.to_string(),
            start: offsets.map(|o| o.0),
            end: offsets.map(|o| o.1),
            score: 0.99,
        }
    }

    #[test]
    fn masks_a_single_place() {
        let masked = masker().mask("次は東京です", vec![entity("地名", "東京", Some((2, 4)))]);

        assert_eq!(masked.text, "次は[PH1]です");
        assert_eq!(masked.entities.len(), 1);
        assert_eq!(masked.entities[0].placeholder, "[PH1]");
        assert_eq!(masked.entities[0].japanese, "東京");
        assert_eq!(masked.entities[0].entity_type, "地名");
    }

    #[test]
    fn ignores_tags_outside_the_announcement_set() {
        let masked = masker().mask("田中です", vec![entity("人名", "田中", Some((0, 2)))]);
        assert_eq!(masked, MaskedText::unchanged("田中です"));
    }

    #[test]
    fn restores_offsets_and_reuses_placeholders_for_repeats() {
        let masked = masker().mask(
            "次は新宿、新宿です",
            vec![entity("地名", "新 宿", None), entity("地名", "新宿", Some((0, 1)))],
        );

        assert_eq!(masked.text, "次は[PH1]、[PH1]です");
        assert_eq!(masked.entities.len(), 1);
        assert_eq!(masked.entities[0].japanese, "新宿");
    }

    #[test]
    fn keeps_stripped_suffix_outside_the_placeholder() {
        let masked = masker().mask("山手線にお乗り換えください", vec![entity("施設名", "山手線", Some((0, 3)))]);

        assert_eq!(masked.text, "[PH1]線にお乗り換えください");
        assert_eq!(masked.entities[0].japanese, "山手");
    }

    #[test]
    fn extends_train_numbers_with_gou() {
        let masked = masker().mask("のぞみ12号です", vec![entity("製品名", "のぞみ12", Some((0, 5)))]);

        assert_eq!(masked.text, "[PH1]12号です");
        assert_eq!(masked.entities[0].japanese, "のぞみ");
    }

    #[test]
    fn merges_touching_spans_and_keeps_first_type() {
        let masked = masker().mask(
            "東急渋谷駅です",
            vec![entity("法人名", "東急", Some((0, 2))), entity("地名", "渋谷", Some((2, 4)))],
        );

        assert_eq!(masked.text, "東急[PH1]駅です");
        assert_eq!(masked.entities[0].japanese, "渋谷");
        assert_eq!(masked.entities[0].entity_type, "法人名");
    }

    #[test]
    fn longer_entities_win_overlaps() {
        let masked = masker().mask(
            "東京駅です",
            vec![entity("地名", "東京", Some((0, 2))), entity("施設名", "東京駅", Some((0, 3)))],
        );

        assert_eq!(masked.text, "[PH1]駅です");
        assert_eq!(masked.entities.len(), 1);
        assert_eq!(masked.entities[0].entity_type, "施設名");
    }

    #[test]
    fn numbers_placeholders_in_text_order() {
        let masked = masker().mask(
            "品川から横浜まで",
            vec![entity("地名", "横浜", Some((4, 6))), entity("地名", "品川", Some((0, 2)))],
        );

        assert_eq!(masked.text, "[PH1]から[PH2]まで");
        assert_eq!(masked.entities[0].japanese, "品川");
        assert_eq!(masked.entities[1].japanese, "横浜");
    }

    #[test]
    fn drops_entities_missing_from_the_text() {
        let masked = masker().mask("次は東京です", vec![entity("地名", "大阪", None)]);
        assert_eq!(masked, MaskedText::unchanged("次は東京です"));
    }

    #[test]
    fn strip_affixes_prefers_longest_match() {
        let masker = masker();

        let affixes = masker.strip_affixes("東京メトロ銀座線");
        assert_eq!(affixes.prefix, "東京メトロ");
        assert_eq!(affixes.core, "銀座");
        assert_eq!(affixes.suffix, "線");

        let affixes = masker.strip_affixes("成田空港線");
        assert_eq!(affixes.core, "成田");
        assert_eq!(affixes.suffix, "空港線");

        let affixes = masker.strip_affixes("はやぶさ３号");
        assert_eq!(affixes.core, "はやぶさ");
        assert_eq!(affixes.suffix, "３号");
    }

    #[test]
    fn strip_affixes_keeps_words_that_are_only_affixes() {
        let affixes = masker().strip_affixes("駅");
        assert_eq!(affixes, Affixes { prefix: "", core: "駅", suffix: "" });
    }
}
