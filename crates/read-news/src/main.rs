use anyhow::{Context, Result};
use clap::Parser;
use shared::pipeline::AudioSession;
use shared::{
    available_voices, format_relative, get_default_digests_dir, list_digest_files, load_digest,
    Article, Config, Synthesis, VoiceSynthesizer,
};
use std::io::{self, Write as _};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "read-news")]
#[command(about = "Turn articles from a saved news digest into spoken audio")]
struct Args {
    /// Path to the digest file (if not provided, will list available digests)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Open the newest saved digest without asking
    #[arg(long, conflicts_with = "file")]
    latest: bool,

    /// Article number to read, then exit
    #[arg(short, long)]
    article: Option<usize>,

    /// Voice to read with
    #[arg(long, default_value = "English (US Female)")]
    voice: String,

    /// Language tag stored with the audio
    #[arg(long, default_value = "en")]
    language: String,

    /// Produce one file per chunk of at most this many characters
    #[arg(long)]
    chunk_chars: Option<usize>,

    /// List the available voices and exit
    #[arg(long)]
    list_voices: bool,

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

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    if args.list_voices {
        println!("Available voices:\n");
        for voice in available_voices() {
            println!("  {}", voice);
        }
        return Ok(());
    }

    let config = Config::from_env()?;

    let digest_file = if let Some(path) = args.file.clone() {
        path
    } else {
        select_digest_file(args.latest)?
    };

    println!("📖 Reading digest: {}", digest_file.display());
    let digest = load_digest(&digest_file)?;
    println!(
        "✓ {} articles from {}",
        digest.articles.len(),
        digest.sources.join(", ")
    );

    let voice = VoiceSynthesizer::with_google_tts(&config.audio_cache_dir)?;
    let mut session = AudioSession::new(voice);

    if let Some(number) = args.article {
        let article = pick(&digest.articles, number)?;
        read_article(&mut session, article, &args).await;
        return Ok(());
    }

    loop {
        list_articles(&digest.articles);

        print!("\nSelect article (1-{}, q to quit): ", digest.articles.len());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }

        let number: usize = match input.parse() {
            Ok(n) => n,
            Err(_) => {
                println!("⚠ Invalid selection. Please enter a number.");
                continue;
            }
        };

        match pick(&digest.articles, number) {
            Ok(article) => read_article(&mut session, article, &args).await,
            Err(e) => println!("⚠ {}", e),
        }
    }

    Ok(())
}

fn pick(articles: &[Article], number: usize) -> Result<&Article> {
    if number < 1 || number > articles.len() {
        anyhow::bail!("Selection out of range. Please choose 1-{}", articles.len());
    }
    Ok(&articles[number - 1])
}

fn list_articles(articles: &[Article]) {
    println!();
    for (i, article) in articles.iter().enumerate() {
        println!(
            "  {}) [{}] {} ({})",
            i + 1,
            article.source_name.as_deref().unwrap_or("Unknown"),
            article.title,
            format_relative(&article.published)
        );
    }
}

async fn read_article(session: &mut AudioSession, article: &Article, args: &Args) {
    println!("\n📰 {}", article.title);
    println!("   {}", article.display_summary());

    match args.chunk_chars {
        Some(max_chars) => {
            let Some(text) = article.speech_text() else {
                println!("⚠ Nothing to read for this article");
                return;
            };
            let parts = session
                .voice()
                .synthesize_chunks(text, &args.voice, &args.language, max_chars)
                .await;
            for (i, part) in parts.iter().enumerate() {
                report(&format!("part {}", i + 1), part);
            }
        }
        None => {
            let result = session.play(article, &args.voice, &args.language).await;
            report("audio", &result);
        }
    }

    println!("   🔗 {}", article.link);
}

fn report(label: &str, result: &Synthesis) {
    match result {
        Synthesis::Generated(path) => println!("🔊 {}: {}", label, path.display()),
        Synthesis::Cached(path) => println!("🔊 {} (cached): {}", label, path.display()),
        Synthesis::Skipped => println!("⚠ Nothing to read for this article"),
        Synthesis::Failed(e) => println!("⚠ Audio generation failed: {}", e),
    }
}

fn select_digest_file(latest: bool) -> Result<PathBuf> {
    let digests_dir = get_default_digests_dir()?;
    let files = list_digest_files(&digests_dir)?;

    if files.is_empty() {
        anyhow::bail!(
            "No digests found in {}. Run fetch-news first.",
            digests_dir.display()
        );
    }

    if latest {
        return Ok(files[0].0.clone());
    }

    println!("Available digests:\n");
    for (i, (path, digest)) in files.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!(
            "  {}) {} ({} articles, {})",
            i + 1,
            filename,
            digest.articles.len(),
            format_relative(&digest.created_at)
        );
    }

    print!("\nSelect digest (1-{}): ", files.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let selection: usize = input
        .trim()
        .parse()
        .context("Invalid selection. Please enter a number.")?;

    if selection < 1 || selection > files.len() {
        anyhow::bail!("Selection out of range. Please choose 1-{}", files.len());
    }

    Ok(files[selection - 1].0.clone())
}
