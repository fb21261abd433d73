use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colorful_core::analysis::fetch_chapter_index;
use colorful_core::scripture::{books_for_volume, volumes};
use colorful_core::{
    AnalysisResult, Analyzer, CompletionClient, Config, LegendStore, ReferenceMetadataProvider,
    ScriptureReference, ScriptureStore, StaticMetadata,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;

#[derive(Parser)]
#[command(name = "colorful-scriptures")]
#[command(about = "AI-assisted color coding for scripture study")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Analyze one verse against the saved color legend
    Analyze {
        book: String,
        chapter: i64,
        verse: i64,
        /// Legend file to use instead of the saved one
        #[arg(short, long)]
        legend: Option<PathBuf>,
    },
    /// List volumes and books, or the chapters of one book
    List {
        #[arg(short, long)]
        book: Option<String>,
    },
    /// List models offered by the configured provider
    Models,
    /// Import the canonical scripture JSON dump into the database
    Import { path: PathBuf },
    /// Write the precomputed chapter/verse snapshot
    ExportMetadata {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve(&config, bind).await?,
        Commands::Analyze {
            book,
            chapter,
            verse,
            legend,
        } => analyze(&config, &book, chapter, verse, legend).await?,
        Commands::List { book } => list(&config, book).await?,
        Commands::Models => list_models(&config).await?,
        Commands::Import { path } => import(&config, &path).await?,
        Commands::ExportMetadata { output } => export_metadata(&config, output).await?,
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load_from(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
        }
        None => Ok(Config::from_environment()),
    }
}

fn open_store(config: &Config) -> Result<Arc<ScriptureStore>> {
    let path = config.database_path()?;
    let store = ScriptureStore::open(path)
        .with_context(|| format!("opening scripture database {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn serve(config: &Config, bind: Option<String>) -> Result<()> {
    let bind_addr = bind.unwrap_or_else(|| config.bind_address().to_string());
    let app = api::create_router(api::AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("colorful-scriptures API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn analyze(
    config: &Config,
    book: &str,
    chapter: i64,
    verse: i64,
    legend_path: Option<PathBuf>,
) -> Result<()> {
    let reference = ScriptureReference::new(book, chapter, verse)?;
    let legend_store = match legend_path {
        Some(path) => LegendStore::new(path),
        None => LegendStore::in_config_dir()?,
    };
    let legend = legend_store.load();

    let analyzer = Analyzer::new(open_store(config)?, CompletionClient::from_config(config)?);
    match analyzer.analyze(reference, &legend).await {
        Ok(result) => print_result(&result),
        Err(e) => {
            tracing::debug!(error = ?e, "analysis failed");
            return Err(anyhow!(e.user_message()));
        }
    }
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("{}", result.analyzed_reference);
    println!("{}\n", result.scripture_text);

    if result.analysis.is_empty() {
        println!("The model did not pick any color for this verse.");
        return;
    }
    for item in &result.analysis {
        println!(
            "{:>3}%  {} ({})  {}",
            item.normalized_confidence, item.item.color_label, item.color_value, item.item.color_meaning
        );
        if !item.item.justification.is_empty() {
            println!("      {}", item.item.justification);
        }
    }
    if let Some(reasoning) = &result.primary_theme_reasoning {
        println!("\n{}", reasoning);
    }
}

async fn list(config: &Config, book: Option<String>) -> Result<()> {
    let Some(book) = book else {
        for volume in volumes() {
            println!("{}", volume);
            for book in books_for_volume(volume).unwrap_or_default() {
                println!("  {}", book);
            }
        }
        return Ok(());
    };

    let snapshot = config
        .metadata_path
        .as_deref()
        .and_then(|path| StaticMetadata::load(path).ok());
    let index = match snapshot {
        Some(snapshot) => snapshot.chapter_index(&book)?,
        None => fetch_chapter_index(open_store(config)?, book.clone()).await?,
    };

    println!("{} ({} chapters)", book, index.chapters.len());
    for chapter in &index.chapters {
        println!("  {:>3}: {} verses", chapter, index.verse_count(*chapter).unwrap_or(0));
    }
    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let client = CompletionClient::from_config(config)?;
    println!("{} models:", client.provider().display_name());
    for model in client.available_models().await? {
        let marker = if model == client.model() { "*" } else { " " };
        println!(" {} {}", marker, model);
    }
    Ok(())
}

async fn import(config: &Config, path: &std::path::Path) -> Result<()> {
    let store = open_store(config)?;
    let imported = store.import_json(path).await?;
    println!("Imported {} verses ({} stored)", imported, store.record_count()?);
    Ok(())
}

async fn export_metadata(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let output = output
        .or_else(|| config.metadata_path.clone())
        .ok_or_else(|| anyhow!("no output path given and no metadata path configured"))?;
    let store = open_store(config)?;

    let snapshot = tokio::task::spawn_blocking(move || StaticMetadata::from_store(&store)).await??;
    snapshot.save(&output)?;
    println!(
        "Wrote chapter data for {} books to {}",
        snapshot.verses_by_chapter.len(),
        output.display()
    );
    Ok(())
}
