use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};

use crate::model_service::{ModelServiceClient, TaggedToken, TokenizeRequest};

static KANA: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("ア", "a"), ("イ", "i"), ("ウ", "u"), ("エ", "e"), ("オ", "o"),
        ("カ", "ka"), ("キ", "ki"), ("ク", "ku"), ("ケ", "ke"), ("コ", "ko"),
        ("ガ", "ga"), ("ギ", "gi"), ("グ", "gu"), ("ゲ", "ge"), ("ゴ", "go"),
        ("サ", "sa"), ("シ", "shi"), ("ス", "su"), ("セ", "se"), ("ソ", "so"),
        ("ザ", "za"), ("ジ", "ji"), ("ズ", "zu"), ("ゼ", "ze"), ("ゾ", "zo"),
        ("タ", "ta"), ("チ", "chi"), ("ツ", "tsu"), ("テ", "te"), ("ト", "to"),
        ("ダ", "da"), ("ヂ", "ji"), ("ヅ", "zu"), ("デ", "de"), ("ド", "do"),
        ("ナ", "na"), ("ニ", "ni"), ("ヌ", "nu"), ("ネ", "ne"), ("ノ", "no"),
        ("ハ", "ha"), ("ヒ", "hi"), ("フ", "fu"), ("ヘ", "he"), ("ホ", "ho"),
        ("バ", "ba"), ("ビ", "bi"), ("ブ", "bu"), ("ベ", "be"), ("ボ", "bo"),
        ("パ", "pa"), ("ピ", "pi"), ("プ", "pu"), ("ペ", "pe"), ("ポ", "po"),
        ("マ", "ma"), ("ミ", "mi"), ("ム", "mu"), ("メ", "me"), ("モ", "mo"),
        ("ヤ", "ya"), ("ユ", "yu"), ("ヨ", "yo"),
        ("ラ", "ra"), ("リ", "ri"), ("ル", "ru"), ("レ", "re"), ("ロ", "ro"),
        ("ワ", "wa"), ("ヰ", "i"), ("ヱ", "e"), ("ヲ", "o"), ("ン", "n"), ("ヴ", "vu"),
        ("ァ", "a"), ("ィ", "i"), ("ゥ", "u"), ("ェ", "e"), ("ォ", "o"),
        ("ャ", "ya"), ("ュ", "yu"), ("ョ", "yo"), ("ヮ", "wa"),
        // two-kana syllables
        ("キャ", "kya"), ("キュ", "kyu"), ("キョ", "kyo"),
        ("ギャ", "gya"), ("ギュ", "gyu"), ("ギョ", "gyo"),
        ("シャ", "sha"), ("シュ", "shu"), ("ショ", "sho"), ("シェ", "she"),
        ("ジャ", "ja"), ("ジュ", "ju"), ("ジョ", "jo"), ("ジェ", "je"),
        ("チャ", "cha"), ("チュ", "chu"), ("チョ", "cho"), ("チェ", "che"),
        ("ニャ", "nya"), ("ニュ", "nyu"), ("ニョ", "nyo"),
        ("ヒャ", "hya"), ("ヒュ", "hyu"), ("ヒョ", "hyo"),
        ("ビャ", "bya"), ("ビュ", "byu"), ("ビョ", "byo"),
        ("ピャ", "pya"), ("ピュ", "pyu"), ("ピョ", "pyo"),
        ("ミャ", "mya"), ("ミュ", "myu"), ("ミョ", "myo"),
        ("リャ", "rya"), ("リュ", "ryu"), ("リョ", "ryo"),
        ("ファ", "fa"), ("フィ", "fi"), ("フェ", "fe"), ("フォ", "fo"),
        ("ティ", "ti"), ("ディ", "di"), ("トゥ", "tu"), ("ドゥ", "du"),
        ("ウィ", "wi"), ("ウェ", "we"), ("ウォ", "wo"),
        ("ヴァ", "va"), ("ヴィ", "vi"), ("ヴェ", "ve"), ("ヴォ", "vo"),
        ("ツァ", "tsa"),
    ]
    .into_iter()
    .collect()
});

static SPACED_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*-\s*").expect("valid hyphen pattern"));

fn is_hiragana(c: char) -> bool {
    ('\u{3041}'..='\u{3096}').contains(&c)
}

fn is_katakana(c: char) -> bool {
    ('\u{30A1}'..='\u{30FA}').contains(&c) || c == 'ー'
}

fn is_kana(c: char) -> bool {
    is_hiragana(c) || is_katakana(c)
}

fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c) || ('\u{3400}'..='\u{4DBF}').contains(&c) || c == '々'
}

/// Whether any kana or kanji remain in `text`
pub fn contains_japanese(text: &str) -> bool {
    text.chars().any(|c| is_kana(c) || is_kanji(c))
}

/// Convert hiragana to katakana, leaving other characters alone
pub fn to_katakana(text: &str) -> String {
    text.chars()
        .map(|c| {
            if is_hiragana(c) {
                char::from_u32(c as u32 + 0x60).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Hepburn romanization of a kana reading; non-kana characters pass through.
///
/// `ッ` doubles the next consonant and `ー` repeats the previous vowel.
pub fn kana_to_romaji(reading: &str) -> String {
    let chars: Vec<char> = to_katakana(reading).chars().collect();
    let mut out = String::with_capacity(chars.len() * 2);
    let mut double_next = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == 'ッ' {
            double_next = true;
            i += 1;
            continue;
        }
        if c == 'ー' {
            if let Some(vowel) = out.chars().last().filter(|v| "aeiou".contains(*v)) {
                out.push(vowel);
            }
            i += 1;
            continue;
        }

        let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let single = c.to_string();
        let (romaji, width) = match KANA.get(pair.as_str()) {
            Some(romaji) if pair.chars().count() == 2 => (*romaji, 2),
            _ => match KANA.get(single.as_str()) {
                Some(romaji) => (*romaji, 1),
                None => {
                    out.push(c);
                    double_next = false;
                    i += 1;
                    continue;
                }
            },
        };

        if double_next {
            if romaji.starts_with("ch") {
                out.push('t');
            } else if let Some(first) = romaji.chars().next().filter(|f| !"aeioun".contains(*f)) {
                out.push(first);
            }
            double_next = false;
        }
        out.push_str(romaji);
        i += width;
    }

    out
}

/// Upper-case the first letter, lower-case the rest
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Morphological tokenizer that supplies katakana readings
#[async_trait]
pub trait ReadingTagger: Send + Sync {
    async fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>, anyhow::Error>;
}

/// MeCab readings from the model server
pub struct RemoteReadingTagger {
    model_service: Arc<ModelServiceClient>,
}

impl RemoteReadingTagger {
    pub fn new(model_service: Arc<ModelServiceClient>) -> Self {
        Self { model_service }
    }
}

#[async_trait]
impl ReadingTagger for RemoteReadingTagger {
    async fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>, anyhow::Error> {
        let request = TokenizeRequest {
            text: text.to_string(),
        };
        Ok(self.model_service.tokenize(&request).await?.tokens)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Script {
    Kana,
    Other,
    Space,
}

fn script_of(c: char) -> Script {
    if is_kana(c) {
        Script::Kana
    } else if c.is_whitespace() {
        Script::Space
    } else {
        Script::Other
    }
}

/// Offline tagger: splits text into script runs and reads kana runs only.
/// Kanji and Latin runs keep their surface form.
pub struct ScriptTagger;

#[async_trait]
impl ReadingTagger for ScriptTagger {
    async fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>, anyhow::Error> {
        Ok(script_runs(text))
    }
}

fn script_runs(text: &str) -> Vec<TaggedToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_script = None;

    let mut flush = |run: &mut String, script: Option<Script>| {
        if run.is_empty() {
            return;
        }
        match script {
            Some(Script::Kana) => tokens.push(TaggedToken {
                surface: run.clone(),
                reading: Some(to_katakana(run)),
            }),
            Some(Script::Other) => tokens.push(TaggedToken {
                surface: run.clone(),
                reading: None,
            }),
            _ => {}
        }
        run.clear();
    };

    for c in text.chars() {
        let script = script_of(c);
        if current_script != Some(script) {
            flush(&mut current, current_script);
            current_script = Some(script);
        }
        current.push(c);
    }
    flush(&mut current, current_script);

    tokens
}

/// Turns Japanese text into capitalised romaji, token by token.
pub struct Romanizer {
    tagger: Arc<dyn ReadingTagger>,
}

impl Romanizer {
    pub fn new(tagger: Arc<dyn ReadingTagger>) -> Self {
        Self { tagger }
    }

    pub async fn romanize(&self, text: &str) -> String {
        self.romanize_checked(text).await.0
    }

    /// Romaji for `text`, plus whether it is complete: the tagger answered
    /// and no Japanese script is left in the output.
    pub async fn romanize_checked(&self, text: &str) -> (String, bool) {
        let (tokens, tagged) = match self.tagger.tokenize(text).await {
            Ok(tokens) => (tokens, true),
            Err(e) => {
                warn!("Reading tagger failed, using script runs: {:#}", e);
                (script_runs(text), false)
            }
        };
        let romaji = Self::join_tokens(&tokens);
        let complete = tagged && !contains_japanese(&romaji);
        (romaji, complete)
    }

    fn join_tokens(tokens: &[TaggedToken]) -> String {
        let words: Vec<String> = tokens
            .iter()
            .map(|token| match token.reading.as_deref() {
                Some(reading) if !reading.is_empty() && reading != "*" && reading != "UNK" => {
                    let romaji = kana_to_romaji(reading);
                    if romaji.chars().any(is_kana) {
                        error!("Unconverted kana in reading {}", reading);
                        token.surface.clone()
                    } else {
                        capitalize(&romaji)
                    }
                }
                _ => token.surface.clone(),
            })
            .collect();

        let joined = words.join(" ");
        SPACED_HYPHEN.replace_all(joined.trim(), "-").into_owned()
    }
}
