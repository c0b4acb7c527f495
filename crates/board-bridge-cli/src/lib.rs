//! # Board-Bridge CLI
//!
//! Clarification tooling around the dispatch service:
//!
//! - `extract` mines a generated spec artifact for clarification questions,
//!   using an LLM completion endpoint when available and a regex scan for
//!   `[NEEDS CLARIFICATION: ...]` markers otherwise.
//! - `file-issues` files extracted questions back as child work items under
//!   the originating feature, with idempotency keys so re-runs never create
//!   duplicates.

use board_bridge_core::{AdoClient, AdoConfig, WorkItemError, WorkItemId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

pub mod extract;
pub mod issues;
pub mod llm;

use extract::{extract_markers, parse_llm_questions, render_clarifications_md};
use issues::{file_issues, FilingOptions};
use llm::{CompletionClient, CompletionError, OpenAiCompletionClient};

// ============================================================================
// CLI Definition
// ============================================================================

/// Clarification tooling for the Board-Bridge dispatch service
#[derive(Debug, Parser)]
#[command(name = "board-bridge-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract clarification questions from a spec artifact
    Extract {
        /// Path to the spec markdown file
        #[arg(long)]
        spec: PathBuf,

        /// Feature name used in the rendered markdown heading
        #[arg(long, default_value = "Unnamed Feature")]
        feature_name: String,

        /// Where to write the questions JSON
        #[arg(long)]
        out_json: PathBuf,

        /// Where to write the human-readable clarifications markdown
        #[arg(long)]
        out_md: Option<PathBuf>,

        /// Skip the LLM and use the marker scan only
        #[arg(long)]
        no_llm: bool,

        /// Completion API base URL
        #[arg(long, env = "COMPLETION_API_BASE")]
        api_base: Option<String>,

        /// Completion API key
        #[arg(long, env = "COMPLETION_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Completion model name
        #[arg(long, env = "COMPLETION_MODEL", default_value = "gpt-5-nano")]
        model: String,
    },

    /// File extracted questions as child work items under a feature
    FileIssues {
        /// Path to the questions JSON produced by `extract`
        #[arg(long)]
        questions: PathBuf,

        /// Parent feature work-item id
        #[arg(long)]
        parent: u64,

        /// Branch name recorded in each issue description
        #[arg(long)]
        branch: Option<String>,

        /// Tags applied to each created issue
        #[arg(long, default_value = "clarification; auto-generated")]
        tags: String,

        /// Assignee email/UPN for created issues
        #[arg(long)]
        assign: Option<String>,

        /// Print planned issues without creating anything
        #[arg(long)]
        dry_run: bool,

        /// Work-item organization URL
        #[arg(long, env = "ADO_ORG_URL")]
        org_url: String,

        /// Work-item project name
        #[arg(long, env = "ADO_PROJECT")]
        project: String,

        /// Work-item personal access token
        #[arg(long, env = "ADO_WORK_ITEM_PAT", hide_env_values = true)]
        pat: String,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI errors with per-variant exit codes (see `main.rs`)
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Completion API error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Could not parse questions: {message}")]
    Parse { message: String },

    #[error("Work-item API error: {0}")]
    WorkItem(#[from] WorkItemError),
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parse arguments and run the selected command
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "board_bridge_cli=info,board_bridge_core=info".into()),
        )
        .init();

    match cli.command {
        Commands::Extract {
            spec,
            feature_name,
            out_json,
            out_md,
            no_llm,
            api_base,
            api_key,
            model,
        } => {
            execute_extract(
                spec,
                &feature_name,
                out_json,
                out_md,
                no_llm,
                api_base,
                api_key,
                &model,
            )
            .await
        }
        Commands::FileIssues {
            questions,
            parent,
            branch,
            tags,
            assign,
            dry_run,
            org_url,
            project,
            pat,
        } => {
            let client = AdoClient::new(&AdoConfig {
                org_url,
                project,
                pat,
            })?;
            let options = FilingOptions {
                branch,
                tags,
                assign,
                dry_run,
            };

            let questions_json = std::fs::read_to_string(&questions)?;
            let questions: Vec<extract::ClarificationQuestion> =
                serde_json::from_str(&questions_json).map_err(|e| CliError::Parse {
                    message: e.to_string(),
                })?;

            let summary =
                file_issues(&client, WorkItemId::new(parent), &questions, &options).await?;

            println!(
                "Issue filing complete: {} created, {} skipped as duplicates",
                summary.created, summary.skipped
            );
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute_extract(
    spec: PathBuf,
    feature_name: &str,
    out_json: PathBuf,
    out_md: Option<PathBuf>,
    no_llm: bool,
    api_base: Option<String>,
    api_key: Option<String>,
    model: &str,
) -> Result<(), CliError> {
    let spec_content = std::fs::read_to_string(&spec)?;

    let questions = if no_llm {
        extract_markers(&spec_content)
    } else {
        match (api_base, api_key) {
            (Some(base), Some(key)) => {
                let client = OpenAiCompletionClient::new(base, key, model)?;
                let response = client
                    .complete(
                        llm::EXTRACT_QUESTIONS_SYSTEM_PROMPT,
                        &llm::extract_questions_user_prompt(&spec_content),
                    )
                    .await?;
                parse_llm_questions(&response).map_err(|e| CliError::Parse {
                    message: e.to_string(),
                })?
            }
            _ => {
                info!("No completion API configured, falling back to marker scan");
                extract_markers(&spec_content)
            }
        }
    };

    println!("Extracted {} clarification questions", questions.len());

    let json = serde_json::to_string_pretty(&questions).map_err(|e| CliError::Parse {
        message: e.to_string(),
    })?;
    std::fs::write(&out_json, json)?;

    if let Some(out_md) = out_md {
        let markdown = render_clarifications_md(&questions, feature_name, "./spec.md");
        std::fs::write(&out_md, markdown)?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
