//! # docqa CLI
//!
//! Answers natural-language questions about a single PDF or DOCX document,
//! either one batch at a time from the command line or as an HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the HTTP API |
//! | `docqa ask <document> -q <question>...` | Answer questions about one document |
//! | `docqa check` | Validate configuration and print a summary |
//!
//! ## Examples
//!
//! ```bash
//! # Ask two questions about a remote policy document
//! docqa ask https://example.com/policy.pdf \
//!     -q "What is the grace period for premium payment?" \
//!     -q "Are maternity expenses covered?"
//!
//! # Same, with supporting clauses and confidence as JSON
//! docqa ask ./policy.docx -q "What is the waiting period?" --explain
//!
//! # Start the API server
//! docqa serve --config ./config/docqa.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::config;
use docqa::pipeline::QueryPipeline;
use docqa::server;

/// docqa: question answering over PDF and DOCX documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering over PDF and DOCX documents",
    version,
    long_about = "docqa downloads a document, splits it into overlapping word windows, \
    embeds and indexes them, and answers questions with an LLM grounded in the \
    most relevant passages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. A missing file means built-in
    /// defaults; environment variables override either.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind` (or `HOST`/`PORT`).
    Serve,

    /// Answer questions about one document.
    ///
    /// Prints question/answer pairs in question order, or a JSON array
    /// with `--explain`.
    Ask {
        /// Document URL, `file://` URL, or local path.
        document: String,

        /// A question to answer. Repeat for several.
        #[arg(short = 'q', long = "question", required = true)]
        questions: Vec<String>,

        /// Print JSON with confidence, key clauses, and reasoning per answer.
        #[arg(long)]
        explain: bool,
    },

    /// Validate the configuration and print the effective settings.
    Check,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load and check the configuration, then start logging at its level.
fn load_and_init(path: &std::path::Path) -> anyhow::Result<config::Config> {
    let (cfg, origin) = config::load_config(path)?;
    init_tracing(&cfg.server.log_level);
    if origin == config::ConfigOrigin::Defaults {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            let (cfg, _) = config::read_config(&cli.config)?;
            let report = cfg.validate();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            let cfg = load_and_init(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            document,
            questions,
            explain,
        } => {
            let cfg = load_and_init(&cli.config)?;
            let pipeline = QueryPipeline::from_config(&cfg)?;
            if explain {
                let explained = pipeline
                    .process_queries_with_explanations(&document, &questions)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&explained)?);
            } else {
                let answers = pipeline.process_queries(&document, &questions).await?;
                for (question, answer) in questions.iter().zip(answers) {
                    println!("Q: {}\nA: {}\n", question, answer);
                }
            }
        }
    }

    Ok(())
}
