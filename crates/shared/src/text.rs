use scraper::Html;

use crate::models::Article;

const ELLIPSIS: &str = "...";

/// Strip markup, decode entities and collapse whitespace.
pub fn clean_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return collapse_whitespace(text);
    }
    let fragment = Html::parse_fragment(text);
    let plain: String = fragment.root_element().text().collect();
    collapse_whitespace(&plain)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cut to at most `max_len` characters, marking the cut with "...".
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Keep the first `max_chars` characters and append "..." when anything was dropped.
///
/// Unlike [`truncate`] the marker is added on top of the budget.
pub fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{}", &text[..end], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Articles whose title or summary contains any keyword, case-insensitively.
/// No keywords means no filtering.
pub fn filter_by_keywords(articles: Vec<Article>, keywords: &[String]) -> Vec<Article> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if keywords.is_empty() {
        return articles;
    }

    articles
        .into_iter()
        .filter(|article| {
            let title = article.title.to_lowercase();
            let summary = article.summary.to_lowercase();
            keywords
                .iter()
                .any(|kw| title.contains(kw.as_str()) || summary.contains(kw.as_str()))
        })
        .collect()
}

/// Render feed markup as wrapped plain text for a terminal.
pub fn render_plain(html: &str, width: usize) -> String {
    html2text::from_read(html.as_bytes(), width).trim().to_string()
}

/// Split a comma separated keyword string as typed by a user.
pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, summary: &str) -> Article {
        Article::new(title, "", "", summary, "")
    }

    // ==================== Cleaning Tests ====================

    #[test]
    fn test_clean_html_strips_tags_and_entities() {
        assert_eq!(
            clean_html("<p>Rock &amp; Roll</p>\n\n<b>is   here</b>"),
            "Rock & Roll is here"
        );
    }

    #[test]
    fn test_clean_html_plain_text() {
        assert_eq!(clean_html("  just\ttext  "), "just text");
        assert_eq!(clean_html(""), "");
    }

    // ==================== Truncation Tests ====================

    #[test]
    fn test_truncate_within_bound_is_noop() {
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello", 50), "hello");
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hello world", 8).chars().count(), 8);
    }

    #[test]
    fn test_truncate_never_exceeds_bound() {
        let text = "Ünïcödé text that goes on and on";
        for n in 0..40 {
            assert!(truncate(text, n).chars().count() <= n);
        }
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("abcdef", 3), "abc...");
        assert_eq!(clip("abc", 3), "abc");
    }

    // ==================== Keyword Filter Tests ====================

    #[test]
    fn test_filter_empty_keywords_is_identity() {
        let articles = vec![article("One", "x"), article("Two", "y")];
        assert_eq!(filter_by_keywords(articles.clone(), &[]), articles);
        assert_eq!(filter_by_keywords(articles.clone(), &["  ".to_string()]), articles);
    }

    #[test]
    fn test_filter_matches_title_or_summary_case_insensitively() {
        let articles = vec![
            article("Climate talks", "Leaders meet"),
            article("Sports", "The CLIMATE of the game"),
            article("Markets", "Stocks fall"),
        ];
        let filtered = filter_by_keywords(articles, &["climate".to_string()]);
        let titles: Vec<&str> = filtered.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Climate talks", "Sports"]);
    }

    #[test]
    fn test_filter_is_or_across_keywords() {
        let articles = vec![article("Apple", ""), article("Google", ""), article("Meta", "")];
        let filtered = filter_by_keywords(articles, &["apple".to_string(), "GOOGLE".to_string()]);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords("ai, climate ,,  "), vec!["ai", "climate"]);
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn test_render_plain_strips_tags() {
        let rendered = render_plain("<p>Hello <b>world</b></p>", 80);
        assert!(rendered.contains("Hello"));
        assert!(rendered.contains("world"));
        assert!(!rendered.contains("<p>"));
    }
}
