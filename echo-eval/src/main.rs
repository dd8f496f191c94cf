//! Echo evaluator (echo-eval) - Main entry point
//!
//! Evaluates echo submissions from a JSON file and manages the stored
//! evaluation history.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use echo_common::config::{default_history_path, load_config, resolve_config_path};
use echo_common::{time, Cost, EvalConfig, HistoryEntry, RankTag, RetentionMode};
use echo_eval::{
    restore_store, summarize, EchoPipeline, EchoSubmission, HistoryQuery, HistorySink,
    HistoryStore, JsonFileSink,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Command-line arguments for echo-eval
#[derive(Parser, Debug)]
#[command(name = "echo-eval")]
#[command(about = "Echo substat evaluation and history")]
#[command(version)]
struct Args {
    /// Config file (falls back to ECHO_EVAL_CONFIG, then the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// History file
    #[arg(long, env = "ECHO_EVAL_HISTORY")]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a JSON array of submissions and record them in history
    Evaluate {
        /// Submissions file
        file: PathBuf,

        /// Override the configured retention mode (all, latest, oldest)
        #[arg(long)]
        retention: Option<RetentionMode>,

        /// Evaluate without writing history back to disk
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored history entries
    History(HistoryFilter),

    /// Delete one history entry
    Remove {
        /// Entry id
        id: Uuid,
    },

    /// Delete every history entry
    Clear,
}

#[derive(ClapArgs, Debug)]
struct HistoryFilter {
    #[arg(long)]
    character: Option<String>,

    /// Echo cost (1, 3 or 4)
    #[arg(long)]
    cost: Option<Cost>,

    /// Rank tag (SSS, SS, S, A, B, C)
    #[arg(long)]
    rank: Option<RankTag>,

    /// Substring of a main stat or substat name
    #[arg(long)]
    text: Option<String>,

    /// Inserted on this day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["since", "until"])]
    on: Option<String>,

    /// Inserted at or after (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    since: Option<String>,

    /// Inserted before (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    until: Option<String>,

    /// List oldest first
    #[arg(long)]
    oldest_first: bool,

    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
enum ItemOutput<'a> {
    Ok {
        index: usize,
        #[serde(flatten)]
        report: &'a echo_eval::SubmissionReport,
    },
    Error {
        index: usize,
        error: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!(
        config = ?config_path.as_ref().map(|p| p.display().to_string()),
        retention = %config.retention_mode,
        profiles = config.profiles.len(),
        "Starting echo-eval"
    );

    let history_path = args
        .history
        .clone()
        .or_else(|| config.history_file.clone())
        .or_else(default_history_path)
        .context("Could not determine a history file location")?;
    let sink = Arc::new(JsonFileSink::new(&history_path));

    let store = restore_store(sink.as_ref(), config.history_max_entries)
        .await
        .with_context(|| format!("Failed to load history from {}", history_path.display()))?;
    let store = Arc::new(store);

    match args.command {
        Command::Evaluate {
            file,
            retention,
            dry_run,
        } => evaluate(&config, store, sink, &file, retention, dry_run).await,
        Command::History(filter) => list_history(&store, filter),
        Command::Remove { id } => {
            if store.remove(id).is_none() {
                bail!("No history entry with id {}", id);
            }
            persist(&store, sink.as_ref()).await?;
            println!("Removed {}", id);
            Ok(())
        }
        Command::Clear => {
            let removed = store.clear();
            persist(&store, sink.as_ref()).await?;
            println!("Removed {} entries", removed);
            Ok(())
        }
    }
}

/// Install the subscriber; RUST_LOG wins over the configured level
fn init_tracing(config: &EvalConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("echo_eval={0},echo_common={0}", config.logging.level).into());

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // stdout carries the JSON output, so console logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

async fn evaluate(
    config: &EvalConfig,
    store: Arc<HistoryStore>,
    sink: Arc<JsonFileSink>,
    file: &Path,
    retention: Option<RetentionMode>,
    dry_run: bool,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let submissions: Vec<EchoSubmission> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse submissions in {}", file.display()))?;

    let mut pipeline = EchoPipeline::from_config(config).with_store(store);
    if let Some(mode) = retention {
        pipeline = pipeline.with_retention(mode);
    }
    if !dry_run {
        pipeline = pipeline.with_sink(sink);
    }

    info!(
        items = submissions.len(),
        retention = %pipeline.retention(),
        "Evaluating submissions"
    );

    let reports = pipeline.submit_batch(&submissions);
    let summary = summarize(&reports);

    let items: Vec<ItemOutput<'_>> = reports
        .iter()
        .enumerate()
        .map(|(index, report)| match report {
            Ok(report) => ItemOutput::Ok { index, report },
            Err(e) => ItemOutput::Error {
                index,
                error: e.to_string(),
            },
        })
        .collect();

    let output = serde_json::json!({
        "items": items,
        "summary": summary,
        "history_entries": pipeline.store().len(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    // Nothing is written when no sink is attached (dry run)
    pipeline
        .flush()
        .await
        .context("Failed to write history")?;

    Ok(())
}

fn list_history(store: &HistoryStore, filter: HistoryFilter) -> Result<()> {
    let query = build_query(filter)?;
    let entries: Vec<Arc<HistoryEntry>> = store.query(query).collect();
    let entries: Vec<&HistoryEntry> = entries.iter().map(|entry| entry.as_ref()).collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn build_query(filter: HistoryFilter) -> Result<HistoryQuery> {
    let mut query = HistoryQuery::new();

    if let Some(character) = filter.character {
        query = query.character(character);
    }
    if let Some(cost) = filter.cost {
        query = query.cost(cost);
    }
    if let Some(rank) = filter.rank {
        query = query.rank(rank);
    }
    if let Some(text) = filter.text {
        query = query.text(text);
    }
    if let Some(day) = filter.on {
        let (start, end) = time::day_bounds(parse_time(&day)?);
        query = query.since(start).until(end);
    }
    if let Some(since) = filter.since {
        query = query.since(parse_time(&since)?);
    }
    if let Some(until) = filter.until {
        query = query.until(parse_time(&until)?);
    }
    if filter.oldest_first {
        query = query.oldest_first();
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    Ok(query)
}

/// RFC 3339 timestamp, or a bare date meaning its midnight UTC
fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("Invalid date or timestamp: {}", text))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("Invalid date: {}", text))
}

async fn persist(store: &HistoryStore, sink: &dyn HistorySink) -> Result<()> {
    sink.persist(&store.snapshot())
        .await
        .context("Failed to write history")
}
