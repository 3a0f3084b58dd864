use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Article, FeedRegistry, NO_DATE, NO_SUMMARY, NO_TITLE};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) NewsBreeze/1.0";
const READER_USER_AGENT: &str = "NewsBreeze-FeedReader/1.0 +https://github.com/newsbreeze";

/// Something that can hand back the raw bytes of a feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Regular HTTP fetch with a browser-like client id. Non-2xx is an error.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send HTTP request")?
            .error_for_status()
            .context("Feed server returned an error status")?;

        let bytes = response.bytes().await.context("Failed to read feed body")?;
        Ok(bytes.to_vec())
    }
}

/// Fallback reader: local files are read directly, remote feeds are pulled
/// with a plain feed-reader client id and whatever status the server sends.
pub struct DirectFeedSource {
    client: Client,
}

impl DirectFeedSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(READER_USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for DirectFeedSource {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = local_path(url) {
            return tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read feed file {}", path.display()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send direct feed request")?;
        let bytes = response.bytes().await.context("Failed to read feed body")?;
        Ok(bytes.to_vec())
    }
}

fn local_path(url: &str) -> Option<PathBuf> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => {
            let path = Path::new(url);
            path.exists().then(|| path.to_path_buf())
        }
    }
}

/// What one source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Fetched(Vec<Article>),
    /// The feed was reachable but had no entries.
    Empty,
    Failed(String),
}

impl FeedOutcome {
    pub fn articles(&self) -> &[Article] {
        match self {
            FeedOutcome::Fetched(articles) => articles,
            FeedOutcome::Empty | FeedOutcome::Failed(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub name: String,
    pub url: String,
    pub outcome: FeedOutcome,
}

/// Drop sources that produced nothing, keeping registry order.
pub fn articles_by_source(results: Vec<SourceFetch>) -> Vec<(String, Vec<Article>)> {
    results
        .into_iter()
        .filter_map(|fetch| match fetch.outcome {
            FeedOutcome::Fetched(articles) => Some((fetch.name, articles)),
            FeedOutcome::Empty | FeedOutcome::Failed(_) => None,
        })
        .collect()
}

pub struct FeedFetcher {
    registry: FeedRegistry,
    primary: Box<dyn FeedSource>,
    fallback: Box<dyn FeedSource>,
}

impl FeedFetcher {
    pub fn new(registry: FeedRegistry) -> Result<Self> {
        Ok(Self::with_sources(
            registry,
            Box::new(HttpFeedSource::new()?),
            Box::new(DirectFeedSource::new()?),
        ))
    }

    pub fn with_sources(
        registry: FeedRegistry,
        primary: Box<dyn FeedSource>,
        fallback: Box<dyn FeedSource>,
    ) -> Self {
        Self {
            registry,
            primary,
            fallback,
        }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub async fn fetch_all(&self, max_per_feed: usize) -> Vec<SourceFetch> {
        self.fetch_sources(&self.registry, max_per_feed).await
    }

    /// Fetch each feed in turn. A failing source never affects the others.
    pub async fn fetch_sources(&self, feeds: &FeedRegistry, max_per_feed: usize) -> Vec<SourceFetch> {
        let mut results = Vec::with_capacity(feeds.len());

        for (name, url) in feeds.iter() {
            let outcome = self.fetch_feed(url, max_per_feed).await;
            match &outcome {
                FeedOutcome::Fetched(articles) => {
                    info!("Retrieved {} articles from {}", articles.len(), name)
                }
                FeedOutcome::Empty => warn!("No articles retrieved from {}", name),
                FeedOutcome::Failed(e) => warn!("Error fetching feed {}: {}", name, e),
            }
            results.push(SourceFetch {
                name: name.to_string(),
                url: url.to_string(),
                outcome,
            });
        }

        results
    }

    pub async fn fetch_feed(&self, url: &str, max_articles: usize) -> FeedOutcome {
        info!("Fetching feed from: {}", url);

        let body = match self.primary.get(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Request error for {}: {:#}", url, e);
                info!("Trying direct parsing for {}", url);
                match self.fallback.get(url).await {
                    Ok(body) => body,
                    Err(e) => return FeedOutcome::Failed(format!("{:#}", e)),
                }
            }
        };

        match parse_feed(&body, url, max_articles) {
            Ok(articles) if articles.is_empty() => {
                warn!("No entries found in feed: {}", url);
                FeedOutcome::Empty
            }
            Ok(articles) => FeedOutcome::Fetched(articles),
            Err(e) => FeedOutcome::Failed(format!("{:#}", e)),
        }
    }

    /// Register a feed after checking that it yields at least one entry.
    pub async fn add_feed(&mut self, name: &str, url: &str) -> bool {
        match self.fetch_feed(url, 1).await {
            FeedOutcome::Fetched(_) => {
                self.registry.insert(name, url);
                true
            }
            FeedOutcome::Empty | FeedOutcome::Failed(_) => false,
        }
    }

    pub fn remove_feed(&mut self, name: &str) -> bool {
        self.registry.remove(name)
    }
}

/// Parse RSS, Atom or JSON Feed bytes into articles, keeping feed order.
pub fn parse_feed(body: &[u8], source_url: &str, max_articles: usize) -> Result<Vec<Article>> {
    let feed = feed_rs::parser::parse(body).context("Failed to parse RSS/Atom feed")?;

    Ok(feed
        .entries
        .into_iter()
        .take(max_articles)
        .map(|entry| entry_to_article(entry, source_url))
        .collect())
}

fn entry_to_article(entry: feed_rs::model::Entry, source_url: &str) -> Article {
    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_else(|| NO_DATE.to_string());

    let summary = entry
        .summary
        .map(|t| t.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NO_SUMMARY.to_string());

    Article::new(title, link, published, summary, source_url)
}
