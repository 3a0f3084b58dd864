use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::text::render_plain;
use shared::{
    format_relative, get_default_digests_dir, save_digest, truncate, Article, Config, Digest,
    NewsPipeline, PipelineOutcome, PipelineRequest, SummarizerMode,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fetch-news")]
#[command(about = "Fetch RSS news, summarize each article and save a digest for read-news")]
struct Args {
    /// Source to include (repeatable). Defaults to every source
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Articles per source
    #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=10))]
    limit: u8,

    /// Comma separated keywords; only matching articles are kept
    #[arg(short, long)]
    keywords: Option<String>,

    /// Summarize with the hosted API instead of a local model
    #[arg(long)]
    api: bool,

    /// Ignore cached feed and summary results
    #[arg(long)]
    refresh: bool,

    /// Register an extra feed as NAME=URL (repeatable)
    #[arg(long = "feed", value_name = "NAME=URL")]
    feeds: Vec<String>,

    /// List the registered sources and exit
    #[arg(long)]
    list_sources: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let directive = if verbose { "shared=debug" } else { "shared=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_article(index: usize, article: &Article) {
    let source = article.source_name.as_deref().unwrap_or("Unknown");
    println!("\n{}. [{}] {}", index + 1, source, article.title);
    println!("   🕒 {}", format_relative(&article.published));

    let summary = match article.ai_summary.as_deref() {
        Some(summary) if !summary.trim().is_empty() => summary.to_string(),
        _ => truncate(&render_plain(&article.summary, 100), 250),
    };
    println!("   {}", summary);
    println!("   🔗 {}", article.link);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;
    let config = Config::from_env()?;

    let mode = if args.api {
        SummarizerMode::Remote
    } else {
        SummarizerMode::Local
    };

    let mut pipeline = NewsPipeline::from_config(&config, mode)
        .await
        .context("Failed to set up the news pipeline")?;

    for spec in &args.feeds {
        let (name, url) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid feed: {}. Use NAME=URL", spec))?;
        if pipeline.fetcher_mut().add_feed(name.trim(), url.trim()).await {
            println!("✓ Added feed {}", name.trim());
        } else {
            println!("⚠ Could not read any entries from {}, skipping", url.trim());
        }
    }

    if args.list_sources {
        println!("Available sources:\n");
        for (name, url) in pipeline.fetcher().registry().iter() {
            println!("  {} ({})", name, url);
        }
        return Ok(());
    }

    let known = pipeline.fetcher().registry().names();
    let unknown: Vec<&String> = args
        .sources
        .iter()
        .filter(|name| !known.iter().any(|k| k.eq_ignore_ascii_case(name)))
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!(
            "Unknown source(s): {:?}. Available: {}",
            unknown,
            known.join(", ")
        );
    }

    let request = PipelineRequest {
        sources: args.sources.clone(),
        max_per_feed: usize::from(args.limit),
        keywords: args
            .keywords
            .as_deref()
            .map(shared::text::parse_keywords)
            .unwrap_or_default(),
    };

    println!("📰 Fetching news...");
    println!("🤖 Summarizing with {}...", pipeline.summarizer().backend_name());
    println!("  (This may take a minute...)");

    let outcome = if args.refresh {
        pipeline.refresh(&request).await
    } else {
        pipeline.run(&request).await
    };

    let articles = match outcome {
        PipelineOutcome::Articles(articles) => articles,
        PipelineOutcome::Empty => {
            println!("No articles found. Try other sources or different keywords.");
            return Ok(());
        }
    };

    println!("✓ {} articles", articles.len());
    for (i, article) in articles.iter().enumerate() {
        print_article(i, article);
    }

    let mut sources: Vec<String> = Vec::new();
    for name in articles.iter().filter_map(|a| a.source_name.as_ref()) {
        if !sources.contains(name) {
            sources.push(name.clone());
        }
    }

    let filename = format!("news-{}.json", Local::now().format("%Y%m%d-%H%M%S"));
    let dir = get_default_digests_dir()?;
    let path = save_digest(&Digest::new(sources, articles), &dir, &filename)
        .context("Failed to save digest")?;

    println!("\n✅ Digest saved to: {}", path.display());
    println!("   Listen with: read-news --file {}", path.display());

    Ok(())
}
