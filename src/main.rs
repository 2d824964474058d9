//! # Synapse CLI
//!
//! The `synapse` binary drives the retrieval engine: ingest PDF
//! libraries, query them for related sections, inspect the index, and
//! start the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! synapse --config ./synapse.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `synapse ingest <paths…>` | Index PDF files (directories are walked for `*.pdf`) |
//! | `synapse search "<text>"` | Find sections related to the given text |
//! | `synapse stats` | Show index size and per-document chunk counts |
//! | `synapse serve` | Start the JSON HTTP server |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use synapse::cancel::CancelToken;
use synapse::config::{load_config, Config};
use synapse::embedding::{create_provider, EmbeddingProvider};
use synapse::index::VectorIndex;
use synapse::ingest::ingest_batch;
use synapse::retrieve::retrieve;
use synapse::server::run_server;

/// Synapse — a semantic retrieval engine for PDF libraries.
#[derive(Parser)]
#[command(
    name = "synapse",
    about = "Semantic retrieval over PDF libraries: section-aware ingestion and related-passage search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./synapse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest PDF documents into the index.
    ///
    /// Each path may be a PDF file or a directory, which is walked for
    /// `*.pdf` files. Documents are processed independently: a bad PDF
    /// is reported and skipped, the rest of the batch proceeds. Ctrl-C
    /// stops the batch at the next document boundary.
    Ingest {
        /// PDF files or directories to ingest.
        paths: Vec<PathBuf>,
    },

    /// Search the index for sections related to the given text.
    Search {
        /// The selected text to find related sections for.
        query: String,

        /// Number of sections to return (defaults to retrieval.top_n).
        #[arg(long)]
        top: Option<usize>,
    },

    /// Show index statistics.
    Stats,

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths } => run_ingest(&config, &paths).await,
        Commands::Search { query, top } => run_search(&config, &query, top).await,
        Commands::Stats => run_stats(&config),
        Commands::Serve => run_server(&config).await,
    }
}

fn open_index(config: &Config, provider: &dyn EmbeddingProvider) -> Result<VectorIndex> {
    VectorIndex::open_or_create(&config.index.dir, provider.model_name(), provider.dims())
        .context("opening index")
}

async fn run_ingest(config: &Config, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No paths given. Pass PDF files or directories to ingest.");
    }

    let pdf_paths = collect_pdf_paths(paths)?;
    if pdf_paths.is_empty() {
        anyhow::bail!("No PDF files found under the given paths.");
    }

    let provider = create_provider(&config.embedding)?;
    let index = open_index(config, provider.as_ref())?;

    let mut documents = Vec::with_capacity(pdf_paths.len());
    for path in &pdf_paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let doc_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push((doc_name, bytes));
    }

    // Ctrl-C cancels between documents; already-ingested documents stay.
    let cancel = CancelToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let report = ingest_batch(
        &index,
        provider.as_ref(),
        &config.chunking,
        &config.index.dir,
        documents,
        &cancel,
    )
    .await?;

    println!("ingest");
    println!("  documents: {}", report.documents.len());
    println!("  indexed: {}", report.documents.len() - report.failed());
    println!("  failed: {}", report.failed());
    println!("  chunks written: {}", report.total_chunks());
    for outcome in report.documents.iter().filter(|d| d.error.is_some()) {
        println!(
            "  rejected {}: {}",
            outcome.doc_name,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    if cancel.is_cancelled() {
        println!("  cancelled before completing the batch");
    }
    println!("ok");
    Ok(())
}

async fn run_search(config: &Config, query: &str, top: Option<usize>) -> Result<()> {
    let provider = create_provider(&config.embedding)?;
    let index = open_index(config, provider.as_ref())?;
    let top_n = top.unwrap_or(config.retrieval.top_n);

    let results = retrieve(
        &index,
        provider.as_ref(),
        &config.retrieval,
        query,
        top_n,
        &CancelToken::new(),
    )
    .await?;

    if results.is_empty() {
        println!("No related sections.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} / {} (p. {})",
            i + 1,
            result.doc_name,
            result.section_title,
            result.page
        );
        println!("    \"{}\"", result.snippet.replace('\n', " "));
        println!();
    }
    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let index = VectorIndex::load(&config.index.dir)
        .context("No index found. Run `synapse ingest` first.")?;

    println!("index");
    println!("  model: {}", index.model_name());
    println!("  dimensions: {}", index.dims());
    println!("  chunks: {}", index.len());
    for (doc_name, chunks) in index.document_counts() {
        println!("  {}: {} chunks", doc_name, chunks);
    }
    Ok(())
}

/// Expand files and directories into a sorted list of PDF paths.
fn collect_pdf_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut pdf_paths = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() && has_pdf_extension(entry.path()) {
                    pdf_paths.push(entry.into_path());
                }
            }
        } else if has_pdf_extension(path) {
            pdf_paths.push(path.clone());
        } else {
            anyhow::bail!("{} is not a PDF file or directory", path.display());
        }
    }

    pdf_paths.sort();
    pdf_paths.dedup();
    Ok(pdf_paths)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_extension_matching_is_case_insensitive() {
        assert!(has_pdf_extension(Path::new("a/report.pdf")));
        assert!(has_pdf_extension(Path::new("a/REPORT.PDF")));
        assert!(!has_pdf_extension(Path::new("a/report.txt")));
        assert!(!has_pdf_extension(Path::new("report")));
    }

    #[test]
    fn directories_are_walked_for_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("two.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join("note.txt"), b"x").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("three.pdf"), b"x").unwrap();

        let found = collect_pdf_paths(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 3);
    }
}
