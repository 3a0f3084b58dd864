//! Fetch, filter, sort and summarize as one pass, with audio on demand.
//!
//! Fetch and summary results are memoized on disk per call parameters, each
//! with its own expiry window. Audio is produced one article at a time and
//! remembered for the life of the pipeline.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{cache_key, FileCache};
use crate::config::Config;
use crate::dates::sort_by_date;
use crate::fetcher::{articles_by_source, FeedFetcher};
use crate::models::{Article, FeedRegistry};
use crate::summarizer::{Summarizer, SummarizerMode};
use crate::text::filter_by_keywords;
use crate::voice::{Synthesis, VoiceSynthesizer};

/// A derived-result cache living in its own subdirectory.
pub struct ResultCache {
    store: FileCache,
    max_age: Duration,
}

impl ResultCache {
    pub fn new(base_dir: &Path, namespace: &str, max_age: Duration) -> Result<Self> {
        Ok(Self {
            store: FileCache::new(base_dir.join(namespace))?,
            max_age,
        })
    }

    pub fn get<P, T>(&self, params: &P) -> Option<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.store.load(&cache_key(params), self.max_age)
    }

    /// Failures to write only cost a recomputation later, so they are logged.
    pub fn put<P, T>(&self, params: &P, data: &T)
    where
        P: Serialize + ?Sized,
        T: Serialize,
    {
        if let Err(e) = self.store.save(&cache_key(params), data) {
            warn!("Could not cache result: {:#}", e);
        }
    }

    pub fn invalidate(&self) {
        match self.store.clear() {
            Ok(removed) => info!("Cleared {} entries from {}", removed, self.store.dir().display()),
            Err(e) => warn!("Could not clear cache {}: {:#}", self.store.dir().display(), e),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Source names to include. Empty means every registered source.
    pub sources: Vec<String>,
    pub max_per_feed: usize,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Summarized articles, newest first.
    Articles(Vec<Article>),
    /// Not a single article came back from any selected source.
    Empty,
}

#[derive(Serialize)]
struct FetchParams<'a> {
    feeds: Vec<(&'a str, &'a str)>,
    max_per_feed: usize,
    keywords: &'a [String],
}

#[derive(Serialize)]
struct SummaryParams<'a> {
    backend: &'a str,
    articles: &'a [Article],
}

/// Remembers the audio produced for each article during a session.
pub struct AudioSession {
    voice: VoiceSynthesizer,
    played: HashMap<String, PathBuf>,
}

impl AudioSession {
    pub fn new(voice: VoiceSynthesizer) -> Self {
        Self {
            voice,
            played: HashMap::new(),
        }
    }

    pub fn voice(&self) -> &VoiceSynthesizer {
        &self.voice
    }

    pub fn remembered(&self) -> usize {
        self.played.len()
    }

    /// Audio for one article. Entries are keyed on the text actually spoken, so a
    /// newer AI summary gets fresh audio. Only successful results are remembered.
    pub async fn play(&mut self, article: &Article, voice_name: &str, language: &str) -> Synthesis {
        let key = cache_key(&(
            &article.link,
            article.speech_text(),
            voice_name,
            language,
        ));
        if let Some(path) = self.played.get(&key) {
            return Synthesis::Cached(path.clone());
        }

        let result = self.voice.article_to_audio(article, voice_name, language).await;
        if let Some(path) = result.path() {
            self.played.insert(key, path.to_path_buf());
        }
        result
    }
}

pub struct NewsPipeline {
    fetcher: FeedFetcher,
    summarizer: Summarizer,
    audio: AudioSession,
    fetch_cache: ResultCache,
    summary_cache: ResultCache,
}

impl NewsPipeline {
    pub fn new(
        fetcher: FeedFetcher,
        summarizer: Summarizer,
        audio: AudioSession,
        cache_dir: &Path,
        fetch_ttl: Duration,
        summary_ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            summarizer,
            audio,
            fetch_cache: ResultCache::new(cache_dir, "fetch", fetch_ttl)?,
            summary_cache: ResultCache::new(cache_dir, "summaries", summary_ttl)?,
        })
    }

    /// Seeded feeds, the configured summarizer and Google speech.
    pub async fn from_config(config: &Config, mode: SummarizerMode) -> Result<Self> {
        let fetcher = FeedFetcher::new(FeedRegistry::seeded())?;
        let summarizer = Summarizer::from_config(config, mode).await?;
        let voice = VoiceSynthesizer::with_google_tts(&config.audio_cache_dir)?;

        Self::new(
            fetcher,
            summarizer,
            AudioSession::new(voice),
            &config.cache_dir,
            config.fetch_ttl,
            config.summary_ttl,
        )
    }

    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut FeedFetcher {
        &mut self.fetcher
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Articles per selected source, keyword-filtered. Sources left with
    /// nothing are dropped. Empty results are not cached.
    pub async fn fetch(&self, request: &PipelineRequest) -> Vec<(String, Vec<Article>)> {
        let feeds = self.fetcher.registry().select(&request.sources);
        let params = FetchParams {
            feeds: feeds.iter().collect(),
            max_per_feed: request.max_per_feed,
            keywords: &request.keywords,
        };

        if let Some(cached) = self.fetch_cache.get(&params) {
            info!("Using cached feed results");
            return cached;
        }

        let results = self.fetcher.fetch_sources(&feeds, request.max_per_feed).await;
        let by_source: Vec<(String, Vec<Article>)> = articles_by_source(results)
            .into_iter()
            .map(|(name, articles)| (name, filter_by_keywords(articles, &request.keywords)))
            .filter(|(_, articles)| !articles.is_empty())
            .collect();

        if !by_source.is_empty() {
            self.fetch_cache.put(&params, &by_source);
        }
        by_source
    }

    pub async fn summarize(&self, articles: &[Article]) -> Vec<Article> {
        let params = SummaryParams {
            backend: self.summarizer.backend_name(),
            articles,
        };

        if let Some(cached) = self.summary_cache.get(&params) {
            info!("Using cached summaries");
            return cached;
        }

        let summarized = self.summarizer.summarize_articles(articles).await;
        self.summary_cache.put(&params, &summarized);
        summarized
    }

    pub async fn run(&self, request: &PipelineRequest) -> PipelineOutcome {
        let articles: Vec<Article> = self
            .fetch(request)
            .await
            .into_iter()
            .flat_map(|(name, articles)| {
                articles.into_iter().map(move |mut article| {
                    article.source_name = Some(name.clone());
                    article
                })
            })
            .collect();

        if articles.is_empty() {
            warn!("No articles found from any source");
            return PipelineOutcome::Empty;
        }

        let articles = sort_by_date(articles, false);
        info!("Summarizing {} articles with {}", articles.len(), self.summarizer.backend_name());
        PipelineOutcome::Articles(self.summarize(&articles).await)
    }

    /// Drop both derived caches, then run.
    pub async fn refresh(&self, request: &PipelineRequest) -> PipelineOutcome {
        self.fetch_cache.invalidate();
        self.summary_cache.invalidate();
        self.run(request).await
    }

    pub async fn speak(&mut self, article: &Article, voice_name: &str, language: &str) -> Synthesis {
        self.audio.play(article, voice_name, language).await
    }
}
