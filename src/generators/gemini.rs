use super::{build_prompt, ThreadGenerator, Tone};
use crate::config::GeneratorSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const GENERATION_FAILED: &str = "Failed to generate thread. Please try again later.";

pub struct GeminiGenerator {
    api_key: String,
    api_url: String,
    model: String,
    tweet_count: usize,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, settings: &GeneratorSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            api_key,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            tweet_count: settings.tweet_count,
            client,
        })
    }

    async fn request_text(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_url,
            self.model,
            urlencoding::encode(&self.api_key)
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Gemini API error: {}", response.status()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(anyhow::anyhow!("Gemini returned no text"));
        }

        Ok(text)
    }
}

#[async_trait]
impl ThreadGenerator for GeminiGenerator {
    #[instrument(skip(self))]
    async fn generate(&self, topic: &str, tone: Tone) -> Result<String> {
        if topic.trim().is_empty() {
            return Err(anyhow::anyhow!("Missing Input"));
        }

        let prompt = build_prompt(topic, tone, self.tweet_count);
        let text = self.request_text(&prompt).await.context(GENERATION_FAILED)?;
        debug!(chars = text.len(), "Generated raw thread");
        Ok(text)
    }
}
