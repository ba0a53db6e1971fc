mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{docs::DocsSubcommand, task::TaskSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "intent",
    about = "Local intent execution hub: validate, dispatch, and queue named actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .intent/ or .git/)
    #[arg(long, global = true, env = "INTENT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .intent/ with a default config and staging directory
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Serve the local HTTP API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "4317")]
        port: u16,
    },

    /// Dispatch one action and print its result
    Exec {
        action: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Caller tag recorded in the execution log
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// List registered actions
    Actions,

    /// Show the most recent execution records
    Log {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Inspect and drive the task queue
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Inspect and drive the document queue
    Docs {
        #[command(subcommand)]
        subcommand: DocsSubcommand,
    },

    /// Run as an MCP stdio server exposing every action as a tool
    Mcp,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Mcp => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Exec {
            action,
            args,
            source,
        } => cmd::exec::run(&root, &action, &args, &source, cli.json),
        Commands::Actions => cmd::actions::run(&root, cli.json),
        Commands::Log { limit } => cmd::log::run(&root, limit, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Docs { subcommand } => cmd::docs::run(&root, subcommand, cli.json),
        Commands::Mcp => cmd::mcp::run(&root),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
