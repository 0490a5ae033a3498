use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pdfxi::extract::PlainTextExtractor;
use pdfxi::index::{self, IndexConfig, IndexStore, IndexUpdater};
use pdfxi::progress::Progressive;
use pdfxi::query::{self, QueryEngine, RankMode};
use pdfxi::{output, utils};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdfxi")]
#[command(about = "Full-text index and search for PDF document collections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or incrementally update the index for a collection
    Index {
        /// Collection root directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Re-extract every document regardless of fingerprint match
        #[arg(short, long)]
        force: bool,

        /// Include globs for indexable files (default: *.pdf)
        #[arg(short, long)]
        glob: Vec<String>,

        /// Index storage directory (default: per-collection app data dir)
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// Search an indexed collection
    Search {
        /// Search terms
        query: String,

        /// Collection root directory
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Result ordering
        #[arg(short, long, value_enum, default_value_t = RankArg::Desc)]
        rank: RankArg,

        /// Print matching document paths only
        #[arg(short = 'l', long)]
        files_only: bool,

        /// Print match counts per document
        #[arg(short = 'c', long)]
        count: bool,

        /// Stop after this many matches (0 = unlimited)
        #[arg(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Index storage directory (default: per-collection app data dir)
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// Show index statistics
    Stats {
        /// Collection root directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List all indexed collections
    List,
    /// Remove the index for a collection
    Remove {
        /// Collection root directory
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RankArg {
    /// Index traversal order
    None,
    /// Fewest hits first
    Asc,
    /// Most hits first
    Desc,
}

impl From<RankArg> for RankMode {
    fn from(arg: RankArg) -> Self {
        match arg {
            RankArg::None => RankMode::None,
            RankArg::Asc => RankMode::HitCountAsc,
            RankArg::Desc => RankMode::HitCountDesc,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            path,
            force,
            glob,
            index_dir,
        } => cmd_index(&path, force, glob, index_dir),
        Commands::Search {
            query,
            path,
            rank,
            files_only,
            count,
            limit,
            index_dir,
        } => cmd_search(&query, &path, rank.into(), files_only, count, limit, index_dir),
        Commands::Stats { path } => index::stats::show_stats(&path),
        Commands::List => index::stats::list_indexes(),
        Commands::Remove { path } => {
            utils::remove_index(&path)?;
            println!("Removed index for: {}", path.display());
            Ok(())
        }
    }
}

fn resolve_index_dir(root: &std::path::Path, index_dir: Option<PathBuf>) -> Result<PathBuf> {
    match index_dir {
        Some(dir) => Ok(dir),
        None => utils::get_index_dir(root),
    }
}

fn cmd_index(
    path: &std::path::Path,
    force: bool,
    glob: Vec<String>,
    index_dir: Option<PathBuf>,
) -> Result<()> {
    let root = path.canonicalize().context("Invalid collection path")?;
    let index_dir = resolve_index_dir(&root, index_dir)?;

    let mut config = IndexConfig::default();
    if !glob.is_empty() {
        config.include = glob;
    }

    println!("Indexing: {}", root.display());

    let mut store = IndexStore::open(&index_dir, &root)?;
    let extractor = PlainTextExtractor;
    let mut updater = IndexUpdater::new(&mut store, &extractor, config, force)?;

    #[cfg(feature = "progress")]
    {
        use indicatif::{ProgressBar, ProgressStyle};

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        bar.set_message("Scanning...");

        loop {
            let outcome = updater.continue_step()?;
            let progress = updater.rate_of_progress();
            if progress >= 0 {
                bar.set_position(progress as u64);
                bar.set_message("Indexing...");
            }
            if outcome == pdfxi::progress::StepOutcome::Finished {
                break;
            }
        }
        bar.finish_with_message("Index complete");
    }

    #[cfg(not(feature = "progress"))]
    updater.run_to_end()?;

    if !updater.scan_skipped().is_empty() {
        eprintln!("({} entries could not be read)", updater.scan_skipped().len());
    }
    if !updater.failures().is_empty() {
        eprintln!(
            "({} documents could not be extracted)",
            updater.failures().len()
        );
        for (path, err) in updater.failures() {
            eprintln!("  {}: {}", path.display(), err);
        }
    }
    drop(updater);

    println!("Indexed {} documents", store.meta().doc_count);
    println!("Index stored at: {}", index_dir.display());

    Ok(())
}

fn cmd_search(
    query: &str,
    path: &std::path::Path,
    rank: RankMode,
    files_only: bool,
    count: bool,
    limit: usize,
    index_dir: Option<PathBuf>,
) -> Result<()> {
    let root = path.canonicalize().context("Invalid collection path")?;
    let index_dir = resolve_index_dir(&root, index_dir)?;

    if !index_dir.join("meta.json").exists() {
        anyhow::bail!("No index found. Run 'pdfxi index' first.");
    }

    let store = IndexStore::open(&index_dir, &root)?;
    let extractor = PlainTextExtractor;
    let engine = QueryEngine::new(&store, &extractor);

    let mut matches = Vec::new();
    engine.search(query, rank, |m| {
        matches.push(m.clone());
        if limit > 0 && matches.len() >= limit {
            query::SearchControl::Stop
        } else {
            query::SearchControl::Continue
        }
    })?;

    if count {
        output::print_match_counts(&matches)?;
    } else if files_only {
        output::print_files_only(&matches)?;
    } else {
        output::print_matches(&matches, true, true)?;
    }

    Ok(())
}
