//! mediaref command line
//!
//! Resolves a request against a chat history stored as JSON and prints the
//! chosen media item.

mod history;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediaref_core::assist::{HttpCompletionClient, LlmAssistant};
use mediaref_core::semantic::extract_keywords;
use mediaref_core::{
    collect_media_items, Attachment, ChatHistoryReader, MediaKind, MediaReferenceResolver,
    ResolutionResult, ResolveRequest, ResolverConfig, TemporalAnalyzer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::history::JsonHistoryFile;

#[derive(Parser)]
#[command(name = "mediaref")]
#[command(about = "Find which chat media item a request refers to", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a request against a chat history
    Resolve {
        /// JSON array of chat messages
        #[arg(long)]
        history: PathBuf,
        /// Media kind: image, video, audio or document
        #[arg(short, long, default_value = "image", value_parser = parse_kind)]
        kind: MediaKind,
        /// The user's request
        #[arg(short, long)]
        message: String,
        /// JSON array of attachments on the current message
        #[arg(long)]
        attachments: Option<PathBuf>,
        #[arg(long, default_value = "cli")]
        chat: String,
        #[arg(long)]
        user: Option<String>,
        /// Config file (defaults to the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Ask the configured language model first
        #[arg(long, conflicts_with = "cross_kind")]
        assist: bool,
        /// Also resolve relative-time phrases ("an hour ago")
        #[arg(long)]
        temporal: bool,
        /// Treat the request as producing one kind from another
        #[arg(long)]
        cross_kind: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the keywords extracted from a message
    Keywords { message: String },
}

fn parse_kind(s: &str) -> std::result::Result<MediaKind, String> {
    MediaKind::parse(s).ok_or_else(|| format!("unknown media kind '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Resolve {
            history,
            kind,
            message,
            attachments,
            chat,
            user,
            config,
            assist,
            temporal,
            cross_kind,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let attachments = match attachments {
                Some(path) => load_attachments(&path)?,
                None => Vec::new(),
            };
            anyhow::ensure!(
                history.exists(),
                "History file not found: {}",
                history.display()
            );

            let reader = Arc::new(JsonHistoryFile::new(&history));
            let mut builder = MediaReferenceResolver::builder(config.clone())
                .with_history_reader(reader.clone());
            if assist {
                let client = HttpCompletionClient::from_config(&config.assistant)
                    .context("Failed to configure the language model client")?;
                builder = builder.with_assistant(Arc::new(LlmAssistant::new(client)));
            }
            if temporal {
                builder =
                    builder.with_strategy(Arc::new(TemporalAnalyzer::new(config.temporal.clone())));
            }
            let resolver = builder.build();

            let result = if assist || cross_kind {
                let messages = reader
                    .fetch(&chat)
                    .await
                    .with_context(|| format!("Failed to read {}", history.display()))?;
                let items = collect_media_items(&messages);
                resolver.ingest(&chat, &items);
                let request = ResolveRequest::new(kind, &message, &items)
                    .with_attachments(&attachments)
                    .with_chat(&chat)
                    .with_user(user.as_deref());
                if cross_kind {
                    resolver.resolve_cross_kind(&request)
                } else {
                    resolver.resolve_assisted(&request).await
                }
            } else {
                resolver
                    .resolve_for_chat(kind, &message, &attachments, &chat, user.as_deref())
                    .await
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Command::Keywords { message } => {
            for keyword in extract_keywords(&message) {
                println!("{}", keyword);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            ResolverConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(ResolverConfig::load_or_default()),
    }
}

fn load_attachments(path: &Path) -> Result<Vec<Attachment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid attachments in {}", path.display()))
}

fn print_result(result: &ResolutionResult) {
    println!("source:     {}", result.source_url.as_deref().unwrap_or("-"));
    if let Some(id) = &result.source_id {
        println!("id:         {}", id);
    }
    println!("confidence: {}", result.confidence.as_str());
    println!("strategy:   {}", result.strategy.as_str());
    println!("reasoning:  {}", result.reasoning);
    if let Some(metadata) = &result.metadata {
        for (key, value) in metadata {
            println!("  {}: {}", key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("video"), Ok(MediaKind::Video));
        assert!(parse_kind("hologram").is_err());
    }

    #[test]
    fn test_cli_parses_resolve() {
        let cli = Cli::try_parse_from([
            "mediaref",
            "resolve",
            "--history",
            "chat.json",
            "-k",
            "audio",
            "-m",
            "the last track",
            "--json",
        ])
        .unwrap();
        let Command::Resolve {
            kind, message, json, chat, ..
        } = cli.command
        else {
            panic!("expected resolve");
        };
        assert_eq!(kind, MediaKind::Audio);
        assert_eq!(message, "the last track");
        assert!(json);
        assert_eq!(chat, "cli");
    }

    #[test]
    fn test_assist_and_cross_kind_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "mediaref",
            "resolve",
            "--history",
            "chat.json",
            "-m",
            "make a video from this image",
            "--assist",
            "--cross-kind",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attachments.json");
        std::fs::write(
            &path,
            r#"[{"url": "https://cdn/a.png", "contentType": "image/png", "name": "a.png"}]"#,
        )
        .unwrap();
        let attachments = load_attachments(&path).unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name.as_deref(), Some("a.png"));
        assert!(load_attachments(&dir.path().join("missing.json")).is_err());
    }
}
