use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title";
pub const NO_DATE: &str = "No date";
pub const NO_SUMMARY: &str = "No summary available";

/// A single news item, normalized from a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Date text as the source published it; parsed on demand by `dates`.
    pub published: String,
    /// Raw excerpt from the feed, may contain markup.
    pub summary: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published: impl Into<String>,
        summary: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published: published.into(),
            summary: summary.into(),
            source_url: source_url.into(),
            source_name: None,
            ai_summary: None,
        }
    }

    /// Text to show a reader: the AI summary when present, else the feed excerpt.
    pub fn display_summary(&self) -> &str {
        match self.ai_summary.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => &self.summary,
        }
    }

    /// Best text to read aloud: `ai_summary`, then `summary`, then `title`.
    pub fn speech_text(&self) -> Option<&str> {
        [
            self.ai_summary.as_deref(),
            Some(self.summary.as_str()),
            Some(self.title.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}

/// Ordered mapping of source name to feed URL. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRegistry {
    feeds: Vec<(String, String)>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The well-known sources used when no custom registry is supplied.
    pub fn seeded() -> Self {
        let mut registry = Self::new();
        for (name, url) in [
            ("BBC News", "https://feeds.bbci.co.uk/news/world/rss.xml"),
            ("CNN", "http://rss.cnn.com/rss/edition_world.rss"),
            (
                "Reuters",
                "https://www.reutersagency.com/feed/?taxonomy=best-topics&post_type=best",
            ),
            ("NPR", "https://feeds.npr.org/1001/rss.xml"),
            ("ABC News", "https://abcnews.go.com/abcnews/topstories"),
            (
                "USA Today",
                "http://rssfeeds.usatoday.com/UsatodaycomWorld-TopStories",
            ),
            ("Yahoo News", "https://news.yahoo.com/rss"),
        ] {
            registry.insert(name, url);
        }
        registry
    }

    /// Insert or replace. Replacing keeps the entry's position.
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        match self.feeds.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = url,
            None => self.feeds.push((name, url)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.feeds.len();
        self.feeds.retain(|(n, _)| n != name);
        self.feeds.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.feeds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.feeds.iter().map(|(n, u)| (n.as_str(), u.as_str()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.feeds.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Subset in registry order. An empty selection means every source.
    pub fn select(&self, names: &[String]) -> Self {
        if names.is_empty() {
            return self.clone();
        }
        Self {
            feeds: self
                .feeds
                .iter()
                .filter(|(n, _)| names.iter().any(|wanted| wanted.eq_ignore_ascii_case(n)))
                .cloned()
                .collect(),
        }
    }
}

/// A saved pipeline result, written by `fetch-news` and read by `read-news`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Digest {
    pub version: String,
    pub created_at: String,
    pub sources: Vec<String>,
    pub articles: Vec<Article>,
}

impl Digest {
    pub fn new(sources: Vec<String>, articles: Vec<Article>) -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            sources,
            articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article::new("Title", "https://a.com/1", NO_DATE, "<p>Raw</p>", "https://a.com/rss")
    }

    // ==================== Article Tests ====================

    #[test]
    fn test_speech_text_prefers_ai_summary() {
        let mut a = article();
        a.ai_summary = Some("AI text".to_string());
        assert_eq!(a.speech_text(), Some("AI text"));
    }

    #[test]
    fn test_speech_text_skips_empty_fields() {
        let mut a = article();
        a.ai_summary = Some("  ".to_string());
        a.summary = String::new();
        assert_eq!(a.speech_text(), Some("Title"));

        a.title = String::new();
        assert_eq!(a.speech_text(), None);
    }

    #[test]
    fn test_optional_fields_absent_from_json() {
        let json = serde_json::to_string(&article()).unwrap();
        assert!(!json.contains("source_name"));
        assert!(!json.contains("ai_summary"));
    }

    // ==================== Registry Tests ====================

    #[test]
    fn test_seeded_registry_has_seven_sources() {
        let registry = FeedRegistry::seeded();
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.names()[0], "BBC News");
        assert!(registry.contains("NPR"));
    }

    #[test]
    fn test_insert_existing_name_replaces_url() {
        let mut registry = FeedRegistry::new();
        registry.insert("A", "https://one");
        registry.insert("B", "https://two");
        registry.insert("A", "https://three");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("A"), Some("https://three"));
        assert_eq!(registry.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_remove() {
        let mut registry = FeedRegistry::seeded();
        assert!(registry.remove("CNN"));
        assert!(!registry.remove("CNN"));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_select_is_case_insensitive_and_ordered() {
        let registry = FeedRegistry::seeded();
        let picked = registry.select(&["npr".to_string(), "BBC News".to_string()]);
        assert_eq!(picked.names(), vec!["BBC News", "NPR"]);
        assert_eq!(registry.select(&[]).len(), 7);
    }
}
