//! # Context Vault CLI (`vault`)
//!
//! The `vault` binary saves session summaries, keeps the local index and
//! resume text current, and talks to the optional remote backends.
//!
//! ## Usage
//!
//! ```bash
//! vault --config ./config/vault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vault save` | Summarize session text, then rebuild index and resume |
//! | `vault index` | Rebuild index and resume, optionally mirror them |
//! | `vault resume` | Print the resume text |
//! | `vault status [chapter]` | Project artifact status with token estimate |
//! | `vault sources` | Show which backends are configured |
//! | `vault ask "<question>"` | Answer a question from the search index |
//! | `vault extract` | Extract requirements or gates from a transcript |
//! | `vault reindex` | Upload and index every project artifact |
//!
//! ## Exit codes
//!
//! `0` success, `1` missing input or any other error, `2` search sync
//! failure, `3` blob sync failure.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use context_vault::blob_sync::{push_summaries_to_blob, AzCliBlobStore};
use context_vault::config::{self, Config};
use context_vault::extract::{extract_artifacts, ArtifactKind};
use context_vault::index::{format_bytes, refresh};
use context_vault::models::{IndexSnapshot, SyncOutcome};
use context_vault::search::SearchClient;
use context_vault::search_sync::push_index_to_search;
use context_vault::session::{save_session_summary, SaveRequest};
use context_vault::summarize::SummarizerChain;
use context_vault::{ask, reindex, resume, sources, status};

const EXIT_SEARCH_FAILED: i32 = 2;
const EXIT_BLOB_FAILED: i32 = 3;

/// Context Vault CLI: session memory and resume context for AI-assisted
/// writing projects.
#[derive(Parser)]
#[command(
    name = "vault",
    about = "Context Vault: session summaries, project index, and resume context for AI chats",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/vault.toml")]
    config: PathBuf,

    /// Project root. Overrides `workspace.root` from the config file.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a work session and refresh the index and resume text.
    ///
    /// Input comes from `--text`, `--input`, or piped stdin, in that order.
    Save {
        /// Inline session text.
        #[arg(long)]
        text: Option<String>,

        /// Path to a file with the session notes.
        #[arg(long)]
        input: Option<PathBuf>,

        /// `auto`, architecture, requirements, evaluation, methodology, or general.
        #[arg(long, default_value = "auto")]
        topic: String,

        /// Short session title.
        #[arg(long)]
        title: Option<String>,

        /// Where the text came from (chat, claude, manual, ...).
        #[arg(long, default_value = "chat")]
        source: String,

        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,

        /// Push the refreshed index to the search service.
        #[arg(long)]
        search: bool,

        /// Force blob sync even if it would not run automatically.
        #[arg(long)]
        blob: bool,

        /// Skip the automatic blob sync that runs when storage is configured.
        #[arg(long, conflicts_with = "blob")]
        no_blob: bool,

        /// Use only the local heuristic summarizer.
        #[arg(long)]
        no_llm: bool,
    },

    /// Rebuild the index snapshot and resume text.
    Index {
        /// Push the index to the search service.
        #[arg(long)]
        search: bool,

        /// Upload changed summaries to blob storage.
        #[arg(long)]
        blob: bool,
    },

    /// Rebuild the index and print the resume text.
    Resume,

    /// Show chapter, requirement, and quality gate status.
    Status {
        /// Only chapters whose directory starts with this prefix (e.g. `04`).
        chapter: Option<String>,

        /// Project root (default: current directory or its parent with `.env`/`.git`).
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// List remote backends and whether each is configured.
    Sources,

    /// Answer a question from the search index with the generation model.
    Ask {
        /// The question.
        question: Vec<String>,
    },

    /// Extract requirements or quality gates from a chat transcript.
    Extract {
        /// Path to the chat transcript.
        #[arg(long)]
        input: PathBuf,

        /// `requirements` or `gates`.
        #[arg(long, default_value = "requirements")]
        kind: String,

        /// Chapter directory for requirements.
        #[arg(long, default_value = "04")]
        chapter: String,

        /// Project root.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Upload every YAML/Markdown artifact to blob storage and index it.
    Reindex {
        /// Project root.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_with_env(&cli.config, cli.root.as_deref())?;

    match cli.command {
        Commands::Save {
            text,
            input,
            topic,
            title,
            source,
            tags,
            search,
            blob,
            no_blob,
            no_llm,
        } => {
            let text = read_session_text(text, input.as_deref())?;
            let tags: Vec<String> = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();

            let chain = SummarizerChain::from_config(&cfg, cfg.summarizer.use_llm && !no_llm);
            let (path, summary) = save_session_summary(
                &cfg.workspace.root,
                &chain,
                &SaveRequest {
                    text: &text,
                    topic: &topic,
                    title: title.as_deref(),
                    source: &source,
                    tags,
                    max_bullets: cfg.summarizer.max_bullets,
                },
            )?;
            let refreshed = refresh(&cfg)?;

            println!("Summary saved: {}", path.display());
            println!("Topic routing: {}", summary.target_folder);
            println!("Summary engine: {}", summary.summary_engine);
            if let Some(ref err) = summary.summary_engine_error {
                println!("Summary engine notes: {}", err);
            }
            println!("Index updated: {}", refreshed.index_path.display());
            println!("Resume updated: {}", refreshed.resume_path.display());

            run_syncs(&cfg, &refreshed.snapshot, search, blob || (cfg.blob.is_configured() && !no_blob));
        }
        Commands::Index { search, blob } => {
            let refreshed = refresh(&cfg)?;
            println!("Index updated: {}", refreshed.index_path.display());
            println!("  Files:       {}", refreshed.snapshot.files.len());
            println!("  Size:        {}", format_bytes(refreshed.total_bytes()));
            println!("  Summaries:   {}", refreshed.snapshot.session_summaries.len());
            println!("Resume updated: {}", refreshed.resume_path.display());

            run_syncs(&cfg, &refreshed.snapshot, search, blob);
        }
        Commands::Resume => {
            let refreshed = refresh(&cfg)?;
            print!("{}", resume::build_resume_text(&refreshed.snapshot));
        }
        Commands::Status { chapter, path } => {
            let root = match path.or_else(|| cli.root.clone()) {
                Some(p) => p,
                None => status::find_project_root(&std::env::current_dir()?),
            };
            let generated = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
            println!("{}", status::render_status(&root, chapter.as_deref(), &generated));
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Ask { question } => {
            let question = question.join(" ");
            let answer = ask::ask(&cfg, &question)?;
            println!("Search: '{}'", question);
            println!("{}", "=".repeat(60));
            println!("{} relevant documents:", answer.hits.len());
            for hit in &answer.hits {
                println!("  - [{}] {} (score: {:.2})", hit.doc_type, hit.title, hit.score);
            }
            println!("{}", "=".repeat(60));
            println!("{}", answer.text);
            println!("{}", "=".repeat(60));
        }
        Commands::Extract {
            input,
            kind,
            chapter,
            path,
        } => {
            let kind = ArtifactKind::parse(&kind)?;
            let root = path.unwrap_or_else(|| cfg.workspace.root.clone());
            let transcript = read_lossy(&input)?;
            println!("Transcript loaded: {} characters", transcript.chars().count());

            let saved = extract_artifacts(&cfg, &root, &transcript, kind, &chapter)?;
            for a in &saved {
                println!("  {}: {} ({})", a.id, a.title, a.path.display());
            }
            if saved.is_empty() {
                println!("No new {} found.", kind.as_str());
            } else {
                println!("{} {} saved.", saved.len(), kind.as_str());
            }
        }
        Commands::Reindex { path } => {
            if !cfg.search.is_configured() || !cfg.blob.is_configured() {
                bail!("Search and blob credentials are required for reindex");
            }
            let root = path.unwrap_or_else(|| cfg.workspace.root.clone());
            let store = AzCliBlobStore::from_config(&cfg.blob)?;
            let client = SearchClient::from_config(&cfg.search, &cfg.http)?;

            let report = reindex::reindex(
                &root,
                &cfg.blob.artifact_container,
                &store,
                &client,
                &std::thread::sleep,
            )?;

            println!("{}", "=".repeat(60));
            println!("Sync complete: {} files processed.", report.files);
            println!("  Uploaded: {}", report.uploaded);
            println!("  Indexed:  {}", report.indexed);
            if report.failed_batches > 0 {
                println!("  Failed batches: {}", report.failed_batches);
            }
            println!(
                "  Storage:  {}/{}",
                cfg.blob.account.as_deref().unwrap_or_default(),
                cfg.blob.artifact_container
            );
            println!("  Index:    {}", client.index_url());
        }
    }

    Ok(())
}

/// Search first, then blob. A failed step ends the process with its exit
/// code and skips the rest.
fn run_syncs(cfg: &Config, snapshot: &IndexSnapshot, search: bool, blob: bool) {
    if search {
        let outcome = push_index_to_search(snapshot, cfg);
        report_sync("Search", &outcome);
        if !outcome.ok {
            std::process::exit(EXIT_SEARCH_FAILED);
        }
    }

    if blob {
        let outcome = match AzCliBlobStore::from_config(&cfg.blob) {
            Ok(store) => {
                let result = push_summaries_to_blob(cfg, &store);
                SyncOutcome {
                    ok: result.ok,
                    message: result.message,
                }
            }
            Err(e) => SyncOutcome::failed(e.to_string()),
        };
        report_sync("Blob", &outcome);
        if !outcome.ok {
            std::process::exit(EXIT_BLOB_FAILED);
        }
    }
}

fn report_sync(name: &str, outcome: &SyncOutcome) {
    if outcome.ok {
        println!("{} OK: {}", name, outcome.message);
    } else {
        println!("{} ERROR: {}", name, outcome.message);
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_session_text(text: Option<String>, input: Option<&Path>) -> Result<String> {
    let raw = if let Some(t) = text {
        t
    } else if let Some(path) = input {
        read_lossy(path)?
    } else if !atty::is(atty::Stream::Stdin) {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        bail!("No input found. Use --text, --input, or pipe text via stdin.");
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("No input found. Use --text, --input, or pipe text via stdin.");
    }
    Ok(trimmed.to_string())
}
