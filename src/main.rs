use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use vellum_core::Config;
use vellum_core::bootstrap::{self, DefaultService};
use vellum_index::search::{SearchHit, format_as_context};
use vellum_index::stats::ProcessingStats;
use vellum_index::watcher::IndexWatcher;
use vellum_llm::ChatProvider;
use vellum_llm::provider::Message;

const ASK_SYSTEM_PROMPT: &str = "You answer questions about a codebase. \
Use the code inside <code_context> as your primary source and cite file paths \
when you rely on them. Say so when the context does not contain the answer.";

#[derive(Parser, Debug)]
#[command(
    name = "vellum",
    version,
    about = "Semantic index and similarity search over a local codebase"
)]
struct Cli {
    /// Config file (falls back to `VELLUM_CONFIG`, then `vellum.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root, overriding the configured one
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Incrementally index the project
    Index,
    /// Drop every record and index from scratch
    Rebuild,
    /// Print the chunks most similar to a query
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Record and file counts plus database size
    Stats,
    /// Records stored for one file
    Show { path: String },
    /// Delete the records of one file
    Forget { path: String },
    /// Delete every record
    Clear {
        /// Required; clearing cannot be undone
        #[arg(long)]
        yes: bool,
    },
    /// Index, then keep the index current as files change
    Watch,
    /// Answer a question with a chat model, grounded on retrieved chunks
    Ask {
        question: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

impl Command {
    fn needs_embeddings(&self) -> bool {
        matches!(
            self,
            Self::Index | Self::Rebuild | Self::Search { .. } | Self::Watch | Self::Ask { .. }
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = bootstrap::resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    if let Some(root) = cli.root {
        config.project.root = Some(root);
    }

    let service = bootstrap::build_service(&config).await?;
    if cli.command.needs_embeddings() {
        bootstrap::health_check(service.provider()).await;
    }
    let result = run(cli.command, &config, &service).await;
    service.shutdown().await.context("failed to close embedding store")?;
    result
}

async fn run(
    command: Command,
    config: &Config,
    service: &Arc<DefaultService>,
) -> anyhow::Result<()> {
    match command {
        Command::Index => {
            let stats = index_until_interrupted(service).await?;
            print_json(&stats)
        }
        Command::Rebuild => {
            let stats = service.rebuild().await?;
            print_json(&stats)
        }
        Command::Search { query, limit } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let hits = service.search_similar(&query, limit).await?;
            print_json(&hits)
        }
        Command::Stats => {
            let stats = service.get_stats().await?;
            print_json(&serde_json::json!({
                "total_embeddings": stats.total_embeddings,
                "unique_files": stats.unique_files,
                "size_bytes": stats.size_bytes,
                "size": stats.size_human(),
            }))
        }
        Command::Show { path } => {
            let records = service.get_embeddings_by_path(&path).await?;
            print_json(&records)
        }
        Command::Forget { path } => {
            let deleted = service.delete_embeddings_by_path(&path).await?;
            print_json(&serde_json::json!({ "path": path, "deleted": deleted }))
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the index without --yes");
            }
            let deleted = service.clear_all_embeddings().await?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
        Command::Watch => watch(service).await,
        Command::Ask { question, limit } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let hits = service.search_similar(&question, limit).await?;
            let context = select_context(hits, config.search.score_threshold);
            tracing::info!(chunks = context.len(), "answering with retrieved context");

            let chat = bootstrap::chat_client(config);
            let mut stdout = std::io::stdout();
            answer(&chat, &format_as_context(&context), &question, &mut stdout).await?;
            writeln!(stdout)?;
            Ok(())
        }
    }
}

async fn index_until_interrupted(service: &DefaultService) -> anyhow::Result<ProcessingStats> {
    let cancel = service.cancellation_token();
    let on_signal = cancel.clone();
    let listener = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received interrupt, stopping after the current file");
        on_signal.cancel();
    });

    let stats = service.process_codebase_with(&cancel).await;
    listener.abort();
    Ok(stats?)
}

async fn watch(service: &Arc<DefaultService>) -> anyhow::Result<()> {
    let stats = index_until_interrupted(service).await?;
    if stats.cancelled {
        return print_json(&stats);
    }
    tracing::info!(
        processed = stats.processed_files,
        skipped = stats.skipped_files,
        "initial index complete"
    );

    let watcher = IndexWatcher::start(Arc::clone(service))?;
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("received shutdown signal");
    watcher.stop();
    Ok(())
}

/// Drop hits scoring below `threshold`, keeping rank order.
fn select_context(hits: Vec<SearchHit>, threshold: f32) -> Vec<SearchHit> {
    hits.into_iter().filter(|h| h.score >= threshold).collect()
}

fn build_prompt(context: &str, question: &str) -> Vec<Message> {
    let user = if context.is_empty() {
        question.to_owned()
    } else {
        format!("{context}\n{question}")
    };
    vec![Message::system(ASK_SYSTEM_PROMPT), Message::user(user)]
}

/// Stream the model's answer into `out`, returning the full text.
async fn answer<C: ChatProvider>(
    chat: &C,
    context: &str,
    question: &str,
    out: &mut impl Write,
) -> anyhow::Result<String> {
    let mut stream = chat
        .chat_stream(&build_prompt(context, question))
        .await
        .context("chat request failed")?;

    let mut full = String::new();
    while let Some(token) = stream.next().await {
        let token = token.context("chat stream failed")?;
        out.write_all(token.as_bytes())?;
        out.flush()?;
        full.push_str(&token);
    }
    Ok(full)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
