use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ner::RecognizedEntity;
use crate::settings::ModelServiceConfig;

/// Client for the model server that hosts the NER model, the MarianMT
/// translation model and the MeCab reading tagger.
#[derive(Debug, Clone)]
pub struct ModelServiceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NerRequest {
    pub text: String,
    pub model: String,
    pub tokenizer: String,
    pub aggregation_strategy: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NerResponse {
    pub entities: Vec<RecognizedEntity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub texts: Vec<String>,
    pub model: String,
    pub max_length: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translations: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenizeRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub surface: String,
    /// Katakana reading, `None` or `"*"` when the dictionary has none
    pub reading: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenizeResponse {
    pub tokens: Vec<TaggedToken>,
}

impl ModelServiceClient {
    pub fn new(config: &ModelServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create model service HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn recognize(&self, request: &NerRequest) -> Result<NerResponse> {
        let url = format!("{}/ner", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        Self::parse(response).await
    }

    pub async fn translate(&self, request: &TranslateRequest) -> Result<TranslateResponse> {
        let url = format!("{}/translate", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        Self::parse(response).await
    }

    pub async fn tokenize(&self, request: &TokenizeRequest) -> Result<TokenizeResponse> {
        let url = format!("{}/tokenize", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        Self::parse(response).await
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "Model service error: {} - {}",
                status,
                response.text().await.unwrap_or_default()
            );
        }
        Ok(response.json().await?)
    }
}
