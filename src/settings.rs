use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tags the NER model emits for entities worth masking in announcements.
pub const TRAIN_ANNOUNCEMENT_TAGS: [&str; 5] = ["地名", "施設名", "法人名", "製品名", "その他の組織名"];

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)\}").expect("valid env var pattern"));

/// Application settings, one section per collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub system_config: SystemConfig,
    pub model_service: ModelServiceConfig,
    pub ner_config: NerConfig,
    pub translation_config: TranslationConfig,
    pub romanization_config: RomanizationConfig,
    pub knowledge_base_config: KnowledgeBaseConfig,
    pub database_config: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: true,
        }
    }
}

/// HTTP model server hosting the NER, MT and reading models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// "remote" or "gazetteer"
    pub provider: String,
    pub model: String,
    pub base_tokenizer: String,
    pub aggregation_strategy: String,
    pub tags: Vec<String>,
    /// JSON object of surface form -> entity tag, used by the gazetteer recognizer
    pub gazetteer_path: Option<String>,
    /// Tag given to names taken from the entity store
    pub default_tag: String,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            provider: "remote".to_string(),
            model: "knosing/japanese_ner_model".to_string(),
            base_tokenizer: "cl-tohoku/bert-base-japanese-v3".to_string(),
            aggregation_strategy: "simple".to_string(),
            tags: TRAIN_ANNOUNCEMENT_TAGS.iter().map(|t| t.to_string()).collect(),
            gazetteer_path: None,
            default_tag: "地名".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// "remote" or "none"
    pub provider: String,
    pub model: String,
    pub batch_size: usize,
    pub max_length: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
    pub use_db_cache: bool,
    pub persist_resolved_entities: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: "remote".to_string(),
            model: "linhdzqua148/opus-mt-ja-en-railway-7".to_string(),
            batch_size: 16,
            max_length: 128,
            num_beams: 6,
            length_penalty: 0.8,
            use_db_cache: true,
            persist_resolved_entities: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RomanizationConfig {
    /// "remote" (MeCab readings from the model server) or "script"
    pub tagger: String,
}

impl Default for RomanizationConfig {
    fn default() -> Self {
        Self {
            tagger: "remote".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub enabled: bool,
    pub search_url: String,
    /// `{id}` is replaced by the entity id returned from the search
    pub entity_data_url: String,
    pub language: String,
    pub search_limit: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_url: "https://www.wikidata.org/w/api.php".to_string(),
            entity_data_url: "https://www.wikidata.org/wiki/Special:EntityData/{id}.json"
                .to_string(),
            language: "ja".to_string(),
            search_limit: 5,
            timeout_secs: 8,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    /// JSON object of japanese -> english imported when the table is empty
    pub seed_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/train_entities.db".to_string(),
            seed_path: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON or YAML file, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let content = read_config_text(path)?;
        let content = substitute_env_vars(&content);

        let path_lower = path.to_lowercase();
        let format = if path_lower.ends_with(".json") || path_lower.ends_with(".jsonld") {
            FileFormat::Json
        } else if path_lower.ends_with(".yaml") || path_lower.ends_with(".yml") {
            FileFormat::Yaml
        } else {
            anyhow::bail!("Unsupported configuration format: {}", path);
        };

        let builder = config::Config::builder().add_source(File::from_str(&content, format));
        Self::build(builder).with_context(|| format!("Invalid configuration in {}", path))
    }

    /// Defaults plus environment overrides, used when no file is found.
    pub fn from_env() -> Result<Self> {
        Self::build(config::Config::builder())
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("PORT must be a valid port number")?
            .map(i64::from);
        let debug = std::env::var("DEBUG")
            .ok()
            .map(|d| d.eq_ignore_ascii_case("true"));

        let settings = builder
            .add_source(
                Environment::with_prefix("ANNOUNCE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("system_config.host", std::env::var("HOST").ok())?
            .set_override_option("system_config.port", port)?
            .set_override_option("system_config.debug", debug)?
            .set_override_option("database_config.path", std::env::var("DB_PATH").ok())?
            .set_override_option(
                "model_service.base_url",
                std::env::var("MODEL_SERVICE_URL").ok(),
            )?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Find the first configuration file that exists and load it.
    ///
    /// Returns the settings and the path they came from; `None` means no
    /// file was found and defaults were used.
    pub fn discover() -> Result<(Self, Option<String>)> {
        Self::discover_from(std::env::var("CONFIG_PATH").ok())
    }

    /// Like `discover`, but an `explicit` path must exist; it is never
    /// skipped in favour of the default locations.
    pub fn discover_from(explicit: Option<String>) -> Result<(Self, Option<String>)> {
        if let Some(path) = explicit {
            if !Path::new(&path).exists() {
                anyhow::bail!("CONFIG_PATH points to a missing file: {}", path);
            }
            let settings = Self::load(&path)?;
            return Ok((settings, Some(path)));
        }

        for path in candidate_paths() {
            if !Path::new(&path).exists() {
                debug!("No configuration at {}", path);
                continue;
            }
            let settings = Self::load(&path)?;
            return Ok((settings, Some(path)));
        }
        Ok((Self::from_env()?, None))
    }
}

fn candidate_paths() -> Vec<String> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    [
        Some("conf.yaml".to_string()),
        Some("conf.json".to_string()),
        Some("config/conf.yaml".to_string()),
        exe_dir.join("conf.yaml").to_str().map(|s| s.to_string()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Replace `${VAR}` with the environment value, leaving unknown names as-is.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Read a text file as UTF-8 (BOM stripped), falling back to Shift_JIS.
pub fn read_config_text(path: &str) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Configuration file not found: {}", path))?;

    let (content, _, had_errors) = encoding_rs::UTF_8.decode(&bytes);
    if !had_errors {
        return Ok(content.into_owned());
    }

    debug!("{} is not valid UTF-8, decoding as Shift_JIS", path);
    let (content, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes);
    Ok(content.into_owned())
}

/// Read a flat string -> string mapping from a JSON or YAML file.
pub fn read_string_map(path: &str) -> Result<BTreeMap<String, String>> {
    let content = read_config_text(path)?;
    let path_lower = path.to_lowercase();
    if path_lower.ends_with(".yaml") || path_lower.ends_with(".yml") {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML mapping: {}", path))
    } else {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON mapping: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[test]
    fn defaults_match_the_announcement_service() {
        let settings = Settings::default();
        assert_eq!(settings.system_config.port, 8000);
        assert_eq!(settings.ner_config.tags.len(), 5);
        assert_eq!(settings.translation_config.batch_size, 16);
        assert_eq!(settings.knowledge_base_config.timeout_secs, 8);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml").to_string_lossy().into_owned();

        let err = Settings::discover_from(Some(missing.clone())).unwrap_err();
        assert!(err.to_string().contains(&missing));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let file = write_temp(".yaml", "ner_config:\n  provider: gazetteer\n".as_bytes());
        let path = file.path().to_str().unwrap().to_string();

        let (settings, loaded) = Settings::discover_from(Some(path.clone())).unwrap();
        assert_eq!(settings.ner_config.provider, "gazetteer");
        assert_eq!(loaded, Some(path));
    }

    #[test]
    fn loads_partial_yaml_and_keeps_defaults() {
        let file = write_temp(
            ".yaml",
            "ner_config:\n  provider: gazetteer\ntranslation_config:\n  num_beams: 4\n".as_bytes(),
        );
        let settings = Settings::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(settings.ner_config.provider, "gazetteer");
        assert_eq!(settings.ner_config.default_tag, "地名");
        assert_eq!(settings.translation_config.num_beams, 4);
        assert_eq!(settings.translation_config.max_length, 128);
    }

    #[test]
    fn loads_json_with_bom() {
        let mut content = vec![0xEF, 0xBB, 0xBF];
        content.extend_from_slice(br#"{"database_config": {"seed_path": "seed.json"}}"#);
        let file = write_temp(".json", &content);

        let settings = Settings::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.database_config.seed_path.as_deref(), Some("seed.json"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".ini", b"port=1");
        assert!(Settings::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn substitutes_known_env_vars_only() {
        std::env::set_var("ANNOUNCE_TEST_SUBSTITUTION_URL", "http://models:9000");
        let out = substitute_env_vars("a: ${ANNOUNCE_TEST_SUBSTITUTION_URL}\nb: ${SURELY_NOT_SET_42}");
        assert_eq!(out, "a: http://models:9000\nb: ${SURELY_NOT_SET_42}");
    }

    #[test]
    fn decodes_shift_jis_files() {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("default_tag: 施設名\n");
        let file = write_temp(".yaml", &bytes);
        let text = read_config_text(file.path().to_str().unwrap()).unwrap();
        assert!(text.contains("施設名"));
    }

    #[test]
    fn reads_string_maps_in_either_format() {
        let yaml = write_temp(".yml", "東京: Tokyo\n新宿: Shinjuku\n".as_bytes());
        let map = read_string_map(yaml.path().to_str().unwrap()).unwrap();
        assert_eq!(map.get("新宿").map(String::as_str), Some("Shinjuku"));

        let json = write_temp(".json", r#"{"東京": "Tokyo"}"#.as_bytes());
        assert_eq!(read_string_map(json.path().to_str().unwrap()).unwrap().len(), 1);

        let broken = write_temp(".json", b"[1, 2]");
        assert!(read_string_map(broken.path().to_str().unwrap()).is_err());
    }
}
