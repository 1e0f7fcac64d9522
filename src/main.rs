mod cli;
mod config;
mod db;
mod embedding;
mod error;
mod markdown;
mod memory;
mod redaction;
mod server;
mod service;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::service::MemoryService;

#[derive(Parser)]
#[command(name = "echovault", version, about = "Persistent memory for coding agents")]
struct Cli {
    /// Memory home directory (overrides MEMORY_HOME and the global config)
    #[arg(long, global = true)]
    memory_home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Create the vault layout and a default config
    Init {
        /// Persist this memory home in the global config
        #[arg(long)]
        set_default: bool,
    },
    /// Save a memory
    Save {
        #[arg(long)]
        title: String,
        #[arg(long)]
        what: String,
        #[arg(long, default_value = "")]
        why: String,
        #[arg(long, default_value = "")]
        impact: String,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// One of: decision, pattern, bug, context, learning
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated file paths
        #[arg(long, value_delimiter = ',')]
        related_files: Vec<String>,
        /// Extended details body (mutually exclusive with --details-file)
        #[arg(long)]
        details: Option<String>,
        /// Read the details body from a file
        #[arg(long)]
        details_file: Option<String>,
        /// Print a recommended details skeleton and exit
        #[arg(long)]
        details_template: bool,
        /// Agent identifier recorded as the memory source
        #[arg(long, default_value = "")]
        source: String,
        /// Project name (defaults to the current directory name)
        #[arg(long)]
        project: Option<String>,
    },
    /// Search memories
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Keyword search only; skip the embedding provider
        #[arg(long)]
        no_vectors: bool,
    },
    /// Show memory context for a project
    Context {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        project: Option<String>,
        /// Optional query; recent memories are listed when omitted
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Print the full details body for a memory
    Details { id: String },
    /// Delete a memory by ID or prefix, or in bulk by age
    Delete {
        id: Option<String>,
        /// Delete memories created more than this many days ago
        #[arg(long)]
        older_than_days: Option<i64>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List recent session markdown files
    Sessions {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        project: Option<String>,
    },
    /// Rebuild the vector index with the configured embedding model
    Reindex,
    /// Check vault and index health
    Doctor,
    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Persist the memory home location (used when MEMORY_HOME is unset)
    SetHome { path: PathBuf },
    /// Remove the persisted memory home location from the global config
    ClearHome,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (memory_home, home_source) = config::resolve_memory_home(args.memory_home.as_deref());

    match args.command {
        Command::Serve => {
            let service = MemoryService::new(Some(&memory_home))?;
            server::serve_stdio(service).await?;
        }
        Command::Init { set_default } => {
            cli::vault::run_init(&memory_home, home_source, set_default)?;
        }
        Command::Save {
            title,
            what,
            why,
            impact,
            tags,
            category,
            related_files,
            details,
            details_file,
            details_template,
            source,
            project,
        } => {
            if details_template {
                print!("{}", cli::save::DETAILS_TEMPLATE);
                return Ok(());
            }
            let project = project.unwrap_or_else(cwd_project);
            let service = MemoryService::new(Some(&memory_home))?;
            cli::save::run(
                &service,
                cli::save::SaveArgs {
                    title,
                    what,
                    why,
                    impact,
                    tags,
                    category,
                    related_files,
                    details,
                    details_file,
                    source,
                    project,
                },
            )
            .await?;
        }
        Command::Search {
            query,
            limit,
            project,
            source,
            no_vectors,
        } => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::search::run_search(
                &service,
                &query,
                limit,
                project.as_deref(),
                source.as_deref(),
                no_vectors,
            )
            .await?;
        }
        Command::Context {
            limit,
            project,
            query,
        } => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::context::run_context(&service, limit, project.as_deref(), &query).await?;
        }
        Command::Details { id } => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::search::run_details(&service, &id)?;
        }
        Command::Delete {
            id,
            older_than_days,
            project,
            category,
        } => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::delete::run(
                &service,
                id.as_deref(),
                older_than_days,
                project.as_deref(),
                category.as_deref(),
            )?;
        }
        Command::Sessions { limit, project } => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::context::run_sessions(&service, limit, project.as_deref())?;
        }
        Command::Reindex => {
            let service = MemoryService::new(Some(&memory_home))?;
            cli::reindex::run(&service).await?;
        }
        Command::Doctor => {
            cli::doctor::run(&memory_home)?;
        }
        Command::Config { action } => match action {
            None => cli::vault::run_config(&memory_home, home_source)?,
            Some(ConfigAction::SetHome { path }) => cli::vault::run_set_home(&path)?,
            Some(ConfigAction::ClearHome) => cli::vault::run_clear_home()?,
        },
    }

    Ok(())
}

/// Basename of the current working directory, the default project name.
fn cwd_project() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}
