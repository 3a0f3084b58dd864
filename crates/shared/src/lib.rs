// Public modules
pub mod cache;
pub mod config;
pub mod dates;
pub mod fetcher;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod summarizer;
pub mod text;
pub mod voice;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use dates::{format_relative, parse_date, sort_by_date};
pub use fetcher::{FeedFetcher, FeedOutcome, FeedSource};
pub use io::{get_default_digests_dir, list_digest_files, load_digest, save_digest};
pub use models::{Article, Digest, FeedRegistry};
pub use pipeline::{NewsPipeline, PipelineOutcome, PipelineRequest};
pub use summarizer::{Summarizer, SummarizerMode, Summary};
pub use text::{filter_by_keywords, truncate};
pub use voice::{available_voices, Synthesis, VoiceProfile, VoiceSynthesizer};
