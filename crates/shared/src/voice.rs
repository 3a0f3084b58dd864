//! Text-to-speech with a content-addressed audio cache.
//!
//! Audio for a `(text, voice, language)` triple is synthesized once and
//! kept forever under `<cache_dir>/<sha256>.mp3`. Files are written via a
//! temp file and rename, so a failed synthesis never leaves a partial file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::{content_hash, write_atomic};
use crate::models::Article;
use crate::text::{clip, truncate};

/// Longest text handed to a speech backend in one call.
pub const MAX_SPEECH_CHARS: usize = 3000;

/// The Google Translate speech endpoint rejects longer requests.
const GOOGLE_TTS_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceProfile {
    #[default]
    UsFemale,
    UkFemale,
    UsMale,
    French,
    German,
    Spanish,
    Italian,
}

impl VoiceProfile {
    pub const ALL: [VoiceProfile; 7] = [
        VoiceProfile::UsFemale,
        VoiceProfile::UkFemale,
        VoiceProfile::UsMale,
        VoiceProfile::French,
        VoiceProfile::German,
        VoiceProfile::Spanish,
        VoiceProfile::Italian,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            VoiceProfile::UsFemale => "English (US Female)",
            VoiceProfile::UkFemale => "English (UK Female)",
            VoiceProfile::UsMale => "English (US Male)",
            VoiceProfile::French => "French",
            VoiceProfile::German => "German",
            VoiceProfile::Spanish => "Spanish",
            VoiceProfile::Italian => "Italian",
        }
    }

    pub fn language(self) -> &'static str {
        match self {
            VoiceProfile::UsFemale | VoiceProfile::UkFemale | VoiceProfile::UsMale => "en",
            VoiceProfile::French => "fr",
            VoiceProfile::German => "de",
            VoiceProfile::Spanish => "es",
            VoiceProfile::Italian => "it",
        }
    }

    /// Regional accent, expressed as the Google domain suffix that serves it.
    pub fn accent(self) -> &'static str {
        match self {
            VoiceProfile::UsFemale => "com",
            VoiceProfile::UkFemale => "co.uk",
            VoiceProfile::UsMale => "us",
            VoiceProfile::French => "fr",
            VoiceProfile::German => "de",
            VoiceProfile::Spanish => "es",
            VoiceProfile::Italian => "it",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.display_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Unknown names get the default profile.
    pub fn from_name(name: &str) -> Self {
        Self::lookup(name).unwrap_or_default()
    }
}

pub fn available_voices() -> Vec<&'static str> {
    VoiceProfile::ALL.iter().map(|p| p.display_name()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub accent: &'a str,
    pub slow: bool,
}

/// A text-to-speech service returning encoded audio.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>>;
}

/// Google Translate's public speech endpoint, MP3 output.
pub struct GoogleTts {
    client: Client,
    base_url: Option<String>,
}

impl GoogleTts {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) NewsBreeze/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Send every request to `base_url` instead of the accent's Google domain.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut tts = Self::new()?;
        tts.base_url = Some(base_url.into());
        Ok(tts)
    }

    fn endpoint(&self, accent: &str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://translate.google.{}/translate_tts", accent))
    }
}

#[async_trait]
impl SpeechBackend for GoogleTts {
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let parts = request_parts(request.text, GOOGLE_TTS_MAX_CHARS);
        if parts.is_empty() {
            anyhow::bail!("Nothing to speak");
        }

        let endpoint = self.endpoint(request.accent);
        let speed = if request.slow { "0.3" } else { "1" };
        let mut audio = Vec::new();

        for (idx, part) in parts.iter().enumerate() {
            let url = format!(
                "{}?ie=UTF-8&client=tw-ob&tl={}&ttsspeed={}&total={}&idx={}&textlen={}&q={}",
                endpoint,
                urlencoding::encode(request.language),
                speed,
                parts.len(),
                idx,
                part.chars().count(),
                urlencoding::encode(part)
            );

            let bytes = self
                .client
                .get(&url)
                .send()
                .await
                .context("Failed to send speech request")?
                .error_for_status()
                .context("Speech service returned an error status")?
                .bytes()
                .await
                .context("Failed to read speech audio")?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            anyhow::bail!("Speech service returned no audio");
        }
        Ok(audio)
    }
}

/// Pack the words of `text`, exactly as written, into requests of at most
/// `max_chars` characters. A word longer than the budget spans several requests.
fn request_parts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(max_chars) {
            if current_len > 0 && current_len + 1 + piece.len() > max_chars {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(piece);
            current_len += piece.len();
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Split on `.`, `!` and `?` (all rendered as `.`) and greedily pack whole
/// sentences, in order, into chunks of at most `max_chars` characters.
/// A single sentence longer than the budget becomes its own chunk.
pub fn text_to_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = text.replace(['!', '?'], ".");
    let sentences = normalized
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s));

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let needed = if current.is_empty() {
            sentence.chars().count()
        } else {
            current.chars().count() + 1 + sentence.chars().count()
        };

        if needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = sentence;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    /// Audio already existed; the backend was not called.
    Cached(PathBuf),
    Generated(PathBuf),
    /// Nothing to speak.
    Skipped,
    Failed(String),
}

impl Synthesis {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Synthesis::Cached(path) | Synthesis::Generated(path) => Some(path),
            Synthesis::Skipped | Synthesis::Failed(_) => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Synthesis::Cached(path) | Synthesis::Generated(path) => Some(path),
            Synthesis::Skipped | Synthesis::Failed(_) => None,
        }
    }
}

pub struct VoiceSynthesizer {
    cache_dir: PathBuf,
    backend: Box<dyn SpeechBackend>,
}

impl VoiceSynthesizer {
    pub fn new(cache_dir: impl Into<PathBuf>, backend: Box<dyn SpeechBackend>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create audio cache directory {}", cache_dir.display())
        })?;

        info!("Voice synthesizer using audio cache {}", cache_dir.display());
        Ok(Self { cache_dir, backend })
    }

    pub fn with_google_tts(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(cache_dir, Box::new(GoogleTts::new()?))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn audio_path(&self, text: &str, voice_name: &str, language: &str) -> PathBuf {
        let key = content_hash(format!("{}_{}_{}", text, voice_name, language).as_bytes());
        self.cache_dir.join(format!("{}.mp3", key))
    }

    pub async fn synthesize(&self, text: &str, voice_name: &str, language: &str) -> Synthesis {
        let text = text.trim();
        if text.is_empty() {
            warn!("Cannot generate audio for empty text");
            return Synthesis::Skipped;
        }

        let text = clip(text, MAX_SPEECH_CHARS);
        let path = self.audio_path(&text, voice_name, language);

        if path.exists() {
            info!(
                "Using cached audio for '{}' with voice {}",
                truncate(&text, 30),
                voice_name
            );
            return Synthesis::Cached(path);
        }

        let profile = VoiceProfile::from_name(voice_name);
        let request = SpeechRequest {
            text: &text,
            language: profile.language(),
            accent: profile.accent(),
            slow: false,
        };

        let audio = match self.backend.synthesize(&request).await {
            Ok(audio) if !audio.is_empty() => audio,
            Ok(_) => return Synthesis::Failed("Speech backend returned no audio".to_string()),
            Err(e) => {
                warn!("Error generating audio: {:#}", e);
                return Synthesis::Failed(format!("{:#}", e));
            }
        };

        if let Err(e) = write_atomic(&path, &audio) {
            warn!("Error saving audio: {:#}", e);
            return Synthesis::Failed(format!("{:#}", e));
        }

        info!("Successfully generated audio saved to {}", path.display());
        Synthesis::Generated(path)
    }

    /// Speak the best available text of an article.
    pub async fn article_to_audio(&self, article: &Article, voice_name: &str, language: &str) -> Synthesis {
        match article.speech_text() {
            Some(text) => self.synthesize(text, voice_name, language).await,
            None => {
                warn!("No text available for TTS generation");
                Synthesis::Skipped
            }
        }
    }

    /// One audio file per chunk, in reading order.
    pub async fn synthesize_chunks(
        &self,
        text: &str,
        voice_name: &str,
        language: &str,
        max_chars: usize,
    ) -> Vec<Synthesis> {
        let mut results = Vec::new();
        for chunk in text_to_chunks(text, max_chars) {
            results.push(self.synthesize(&chunk, voice_name, language).await);
        }
        results
    }
}
