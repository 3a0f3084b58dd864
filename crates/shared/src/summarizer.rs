use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Article;
use crate::text::{clean_html, clip, word_count};

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

const SUMMARIZE_PROMPT: &str = "Summarize the following news text in {min} to {max} words. \
Be factual and neutral. Output ONLY the summary, nothing else.

Text: {text}

Summary:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBounds {
    pub max_length: usize,
    pub min_length: usize,
}

impl Default for SummaryBounds {
    fn default() -> Self {
        Self {
            max_length: 150,
            min_length: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Produced by the backend.
    Generated(String),
    /// Input was already short; returned cleaned but otherwise untouched.
    Passthrough(String),
    /// Backend unavailable or failed; a truncated copy of the input.
    Fallback { text: String, reason: String },
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Generated(text) | Summary::Passthrough(text) => text,
            Summary::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Summary::Generated(text) | Summary::Passthrough(text) => text,
            Summary::Fallback { text, .. } => text,
        }
    }
}

/// A text summarization service.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String>;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    max_length: usize,
    min_length: usize,
    do_sample: bool,
}

#[derive(Deserialize)]
struct InferenceSummary {
    summary_text: String,
}

enum AttemptError {
    /// Worth retrying: the request never got a usable answer.
    Transport(anyhow::Error),
    /// The service answered with something unusable.
    Response(anyhow::Error),
}

/// Hosted inference endpoint (Hugging Face style) behind a bearer token.
pub struct RemoteSummarizer {
    client: Client,
    api_url: String,
    api_token: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RemoteSummarizer {
    pub fn new(model: &str, api_token: Option<String>) -> Result<Self> {
        Self::with_endpoint(format!("{}/{}", HF_INFERENCE_URL, model), api_token)
    }

    pub fn with_endpoint(api_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_token,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn try_summarize(
        &self,
        token: &str,
        text: &str,
        bounds: SummaryBounds,
    ) -> std::result::Result<String, AttemptError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                max_length: bounds.max_length,
                min_length: bounds.min_length,
                do_sample: false,
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(anyhow::Error::new(e).context("Failed to send summarization request")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(AttemptError::Transport(anyhow::anyhow!(
                "Summarization API error: {} - {}",
                status,
                error_text
            )));
        }

        let results = response
            .json::<Vec<InferenceSummary>>()
            .await
            .map_err(|e| {
                AttemptError::Response(
                    anyhow::Error::new(e).context("Unexpected summarization API response format"),
                )
            })?;

        results
            .into_iter()
            .next()
            .map(|r| r.summary_text.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AttemptError::Response(anyhow::anyhow!("Summarization API returned no summary")))
    }
}

#[async_trait]
impl SummaryBackend for RemoteSummarizer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let Some(token) = self.api_token.as_deref() else {
            anyhow::bail!("No API token provided");
        };

        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            match self.try_summarize(token, text, bounds).await {
                Ok(summary) => return Ok(summary),
                Err(AttemptError::Response(e)) => return Err(e),
                Err(AttemptError::Transport(e)) => {
                    warn!(
                        "API request error (attempt {}/{}): {:#}",
                        attempt, self.max_retries, e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("No attempts made"))
            .context(format!("Summarization API failed after {} attempts", self.max_retries)))
    }
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

/// A model served on this machine by a separate Ollama process, reached over
/// its HTTP API. Nothing is loaded into this process.
pub struct LocalSummarizer {
    client: Client,
    host: String,
    model: String,
}

impl LocalSummarizer {
    /// Check the local server is up and has the model before accepting work.
    pub async fn connect(host: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;
        let host = host.trim_end_matches('/').to_string();

        let tags = client
            .get(format!("{}/api/tags", host))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .with_context(|| format!("Local model server not reachable at {}", host))?
            .error_for_status()
            .context("Local model server returned an error")?
            .json::<OllamaTags>()
            .await
            .context("Failed to parse local model list")?;

        let available = tags
            .models
            .iter()
            .any(|m| m.name == model || m.name.split(':').next() == Some(model));
        if !available {
            anyhow::bail!("Model {} is not available on {}", model, host);
        }

        info!("Local summarization model {} ready at {}", model, host);
        Ok(Self {
            client,
            host,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SummaryBackend for LocalSummarizer {
    fn name(&self) -> &str {
        "local"
    }

    async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Result<String> {
        let prompt = SUMMARIZE_PROMPT
            .replace("{min}", &bounds.min_length.to_string())
            .replace("{max}", &bounds.max_length.to_string())
            .replace("{text}", text);

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.0,
                "num_predict": bounds.max_length * 2
            }
        });

        let data = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to local model")?
            .error_for_status()
            .context("Local model returned an error")?
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse local model response")?;

        let summary = data["response"].as_str().unwrap_or("").trim().to_string();
        if summary.is_empty() {
            anyhow::bail!("Local model returned an empty summary");
        }
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerMode {
    Local,
    Remote,
}

pub struct Summarizer {
    backend: Box<dyn SummaryBackend>,
    bounds: SummaryBounds,
}

impl Summarizer {
    pub fn new(backend: Box<dyn SummaryBackend>) -> Self {
        Self {
            backend,
            bounds: SummaryBounds::default(),
        }
    }

    /// Pick a backend. A local model that cannot be reached falls back to the remote API.
    pub async fn from_config(config: &Config, mode: SummarizerMode) -> Result<Self> {
        if mode == SummarizerMode::Local {
            match LocalSummarizer::connect(&config.ollama_host, &config.ollama_model).await {
                Ok(local) => return Ok(Self::new(Box::new(local))),
                Err(e) => {
                    warn!("Error loading local model: {:#}", e);
                    warn!("Falling back to API mode");
                }
            }
        }

        let remote = RemoteSummarizer::new(
            &config.summarization_model,
            config.huggingface_api_token.clone(),
        )?;
        Ok(Self::new(Box::new(remote)))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Never fails: errors come back as [`Summary::Fallback`].
    pub async fn summarize(&self, text: &str, bounds: SummaryBounds) -> Summary {
        let cleaned = clean_html(text);

        if word_count(&cleaned) < bounds.min_length {
            return Summary::Passthrough(cleaned);
        }

        match self.backend.summarize(&cleaned, bounds).await {
            Ok(summary) => Summary::Generated(summary),
            Err(e) => {
                warn!("Error summarizing text: {:#}", e);
                Summary::Fallback {
                    text: fallback_truncate(&cleaned, bounds.max_length),
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// New records with `ai_summary` set; the input is left as is.
    pub async fn summarize_articles(&self, articles: &[Article]) -> Vec<Article> {
        let mut summarized = Vec::with_capacity(articles.len());

        for article in articles {
            let summary = self.summarize(&article.summary, self.bounds).await;
            let mut copy = article.clone();
            copy.ai_summary = Some(summary.into_text());
            summarized.push(copy);
        }

        summarized
    }
}

/// Stand-in summary: the first `2 * max_length` characters.
pub fn fallback_truncate(text: &str, max_length: usize) -> String {
    clip(text, max_length * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, Reply};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeBackend {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<String>>>,
        result: std::result::Result<String, String>,
    }

    impl FakeBackend {
        fn new(result: std::result::Result<&str, &str>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
                result: result.map(str::to_string).map_err(str::to_string),
            }
        }
    }

    #[async_trait]
    impl SummaryBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn summarize(&self, text: &str, _bounds: SummaryBounds) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            self.result.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn long_text(words: usize) -> String {
        (0..words).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    // ==================== Summarizer Tests ====================

    #[tokio::test]
    async fn test_short_text_skips_backend() {
        let backend = FakeBackend::new(Ok("unused"));
        let calls = backend.calls.clone();
        let summarizer = Summarizer::new(Box::new(backend));

        let summary = summarizer
            .summarize("<p>Only a  few &amp; words</p>", SummaryBounds::default())
            .await;

        assert_eq!(summary, Summary::Passthrough("Only a few & words".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_long_text_uses_backend_with_cleaned_input() {
        let backend = FakeBackend::new(Ok("A short summary."));
        let seen = backend.seen.clone();
        let summarizer = Summarizer::new(Box::new(backend));
        let text = format!("<div>{}</div>", long_text(40));

        let summary = summarizer.summarize(&text, SummaryBounds::default()).await;

        assert_eq!(summary, Summary::Generated("A short summary.".to_string()));
        assert_eq!(seen.lock().unwrap()[0], long_text(40));
    }

    #[tokio::test]
    async fn test_backend_error_falls_back_to_truncation() {
        let summarizer = Summarizer::new(Box::new(FakeBackend::new(Err("model exploded"))));
        let text = long_text(100);
        let bounds = SummaryBounds {
            max_length: 20,
            min_length: 5,
        };

        let summary = summarizer.summarize(&text, bounds).await;

        match summary {
            Summary::Fallback { text: fallback, reason } => {
                assert_eq!(fallback, format!("{}...", &text[..40]));
                assert!(reason.contains("model exploded"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_summarize_articles_returns_new_records() {
        let summarizer = Summarizer::new(Box::new(FakeBackend::new(Ok("Summed up."))));
        let articles = vec![
            Article::new("Long", "", "", long_text(50), ""),
            Article::new("Short", "", "", "Brief note", ""),
        ];

        let summarized = summarizer.summarize_articles(&articles).await;

        assert!(articles.iter().all(|a| a.ai_summary.is_none()));
        assert_eq!(summarized[0].ai_summary.as_deref(), Some("Summed up."));
        assert_eq!(summarized[1].ai_summary.as_deref(), Some("Brief note"));
        assert_eq!(summarized[0].title, "Long");
    }

    #[test]
    fn test_fallback_truncate() {
        assert_eq!(fallback_truncate("abcdefgh", 2), "abcd...");
        assert_eq!(fallback_truncate("abc", 2), "abc");
    }

    // ==================== Remote Backend Tests ====================

    fn bounds() -> SummaryBounds {
        SummaryBounds {
            max_length: 10,
            min_length: 2,
        }
    }

    #[tokio::test]
    async fn test_remote_without_token_skips_network() {
        let server = spawn_server(Reply::Drop).await;
        let remote = RemoteSummarizer::with_endpoint(&server.url, None).unwrap();
        let summarizer = Summarizer::new(Box::new(remote));

        let summary = summarizer.summarize(&long_text(40), bounds()).await;

        assert!(matches!(summary, Summary::Fallback { .. }));
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn test_remote_retries_three_times_then_falls_back() {
        let server = spawn_server(Reply::Drop).await;
        let remote = RemoteSummarizer::with_endpoint(&server.url, Some("hf_test".to_string()))
            .unwrap()
            .with_retry_delay(Duration::ZERO);
        let summarizer = Summarizer::new(Box::new(remote));
        let text = long_text(40);

        let summary = summarizer.summarize(&text, bounds()).await;

        assert_eq!(server.hits(), 3);
        assert_eq!(summary.text(), format!("{}...", &text[..20]));
    }

    #[tokio::test]
    async fn test_remote_success() {
        let server = spawn_server(Reply::Json(200, r#"[{"summary_text":" Remote summary. "}]"#.to_string())).await;
        let remote = RemoteSummarizer::with_endpoint(&server.url, Some("hf_test".to_string())).unwrap();

        let summary = remote.summarize(&long_text(40), bounds()).await.unwrap();

        assert_eq!(summary, "Remote summary.");
        assert_eq!(server.hits(), 1);
        let request = server.last_request();
        assert!(request.to_lowercase().contains("authorization: bearer hf_test"));
        assert!(request.contains(r#""do_sample":false"#));
        assert!(request.contains(r#""max_length":10"#));
    }

    #[tokio::test]
    async fn test_remote_malformed_response_is_not_retried() {
        let server = spawn_server(Reply::Json(200, r#"{"error":"Model is loading"}"#.to_string())).await;
        let remote = RemoteSummarizer::with_endpoint(&server.url, Some("hf_test".to_string()))
            .unwrap()
            .with_retry_delay(Duration::ZERO);

        assert!(remote.summarize(&long_text(40), bounds()).await.is_err());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_status_is_retried() {
        let server = spawn_server(Reply::Json(503, r#"{"error":"busy"}"#.to_string())).await;
        let remote = RemoteSummarizer::with_endpoint(&server.url, Some("hf_test".to_string()))
            .unwrap()
            .with_retry_delay(Duration::ZERO);

        assert!(remote.summarize(&long_text(40), bounds()).await.is_err());
        assert_eq!(server.hits(), 3);
    }

    // ==================== Local Backend Tests ====================

    #[tokio::test]
    async fn test_local_connect_fails_without_server() {
        let server = spawn_server(Reply::Drop).await;
        assert!(LocalSummarizer::connect(&server.url, "llama3.2:3b").await.is_err());
    }

    #[tokio::test]
    async fn test_local_connect_requires_model() {
        let server = spawn_server(Reply::Json(200, r#"{"models":[{"name":"mistral:7b"}]}"#.to_string())).await;
        assert!(LocalSummarizer::connect(&server.url, "llama3.2:3b").await.is_err());
        assert!(LocalSummarizer::connect(&server.url, "mistral").await.is_ok());
    }
}
