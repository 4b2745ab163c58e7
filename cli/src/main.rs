//! `logos`: seed the semantic index from the verse service and query it.
//!
//! The index lives in memory, so `search` seeds it on every run before
//! answering.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use logos_retrieval::{RetrievalConfig, SearchRequest, SearchService};
use logos_verses::BOOKS;

#[derive(Debug, Parser)]
#[command(name = "logos", version, about = "Semantic search over Bible verses")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed the index with sample verses, then run a semantic query.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long, short)]
        limit: Option<usize>,

        /// Minimum similarity, between -1 and 1.
        #[arg(long, short, allow_hyphen_values = true)]
        threshold: Option<f32>,
    },

    /// Look up a passage, e.g. "John 3:16".
    Verse { reference: String },

    /// List the books in canonical order.
    Books,

    /// Print the effective configuration with secrets masked.
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config =
        RetrievalConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Search {
            query,
            limit,
            threshold,
        } => {
            let service = SearchService::new(config).context("failed to build search service")?;

            let summary = service
                .initialize_embeddings()
                .await
                .context("failed to initialize embeddings")?;
            info!(
                "Indexed {} of {} sample verses",
                summary.successful, summary.processed
            );

            let mut request = SearchRequest::new(query);
            request.limit = limit;
            request.threshold = threshold;

            let response = service.search(request).await.context("search failed")?;
            print_json(&response)?;
        }
        Command::Verse { reference } => {
            let client = config.verses.build_client();
            let passage = client
                .get_verse(&reference)
                .await
                .with_context(|| format!("failed to look up {reference}"))?;
            print_json(&passage)?;
        }
        Command::Books => {
            for book in BOOKS {
                println!("{book}");
            }
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from([
            "logos",
            "search",
            "love your neighbour",
            "-l",
            "3",
            "-t",
            "-0.2",
        ]);
        match cli.command {
            Command::Search {
                query,
                limit,
                threshold,
            } => {
                assert_eq!(query, "love your neighbour");
                assert_eq!(limit, Some(3));
                assert_eq!(threshold, Some(-0.2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
