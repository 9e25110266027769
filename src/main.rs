//! bibgrab - fetch BibTeX records from a DBLP-style publication index.
//!
//! ```bash
//! bibgrab --author "donald knuth" --key conf/icfp/Doe99 -o refs.bib
//! bibgrab --input sources.txt --check
//! ```

use anyhow::{Context, Result};
use bibgrab::aggregate::{self, RunOptions};
use bibgrab::index::{HttpIndex, IndexUrls, DEFAULT_BASE_URL};
use bibgrab::output::IgnoreSet;
use bibgrab::resolve::Query;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Default exclusion-list location: `~/.bibgrab_ignore`
fn default_ignore_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".bibgrab_ignore"))
}

/// Fetch BibTeX records from a DBLP-style publication index
#[derive(Parser)]
#[command(name = "bibgrab")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Author name, or a canonical author handle (e.g. "k/Knuth:Donald_E")
    #[arg(short, long)]
    author: Vec<String>,

    /// Record key (optionally prefixed "namespace:")
    #[arg(short, long)]
    key: Vec<String>,

    /// Conference name
    #[arg(short, long)]
    conf: Vec<String>,

    /// Full-text search keyword
    #[arg(short = 'w', long)]
    keyword: Vec<String>,

    /// Citation in the form "(name, year)"
    #[arg(long)]
    citation: Vec<String>,

    /// Input file with key=value lines ('#' starts a comment)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output bibliography file (overwritten)
    #[arg(short, long, default_value = "bibgrab.bib")]
    output: PathBuf,

    /// Validate inputs without fetching or writing records
    #[arg(short = 'n', long)]
    check: bool,

    /// Enable debug logging and per-record diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Base URL of the index (mirror override)
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    mirror: String,

    /// Exclusion list of field names (default: ~/.bibgrab_ignore)
    #[arg(long)]
    ignore_file: Option<PathBuf>,
}

impl Cli {
    /// Inputs in processing order: flags first, then input-file entries
    /// in file order.
    fn inputs(&self) -> Result<Vec<Query>> {
        let mut inputs: Vec<Query> = Vec::new();
        inputs.extend(self.author.iter().cloned().map(Query::Author));
        inputs.extend(self.key.iter().cloned().map(Query::Key));
        inputs.extend(self.conf.iter().cloned().map(Query::Conference));
        inputs.extend(self.keyword.iter().cloned().map(Query::Keyword));
        inputs.extend(self.citation.iter().cloned().map(Query::Citation));
        if let Some(path) = &self.input {
            let queries = aggregate::parse_input_file(path)
                .with_context(|| format!("cannot read input file '{}'", path.display()))?;
            inputs.extend(queries);
        }
        Ok(inputs)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let inputs = cli.inputs()?;
    if inputs.is_empty() {
        anyhow::bail!("no inputs given; see --help for the available sources");
    }

    let ignore = match cli.ignore_file.clone().or_else(default_ignore_path) {
        Some(path) => IgnoreSet::load(&path)
            .with_context(|| format!("cannot read ignore file '{}'", path.display()))?,
        None => IgnoreSet::empty(),
    };

    let urls = IndexUrls::new(&cli.mirror).context("invalid --mirror URL")?;
    let index = HttpIndex::new().context("cannot build HTTP client")?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let options = RunOptions {
        check_only: cli.check,
        verbose: cli.verbose,
    };
    let outcome = aggregate::run(&index, &urls, &inputs, options, &cancel).await;

    if !cli.check {
        let written = bibgrab::output::write_bibliography(&cli.output, &outcome.entries, &ignore)
            .with_context(|| format!("cannot write output file '{}'", cli.output.display()))?;
        println!("wrote {written} record(s) to {}", cli.output.display());
    }

    if outcome.interrupted {
        eprintln!("interrupted; partial results flushed");
        process::exit(130);
    }

    Ok(())
}
