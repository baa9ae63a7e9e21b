use clap::{Parser, Subcommand};

// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(
    name = "fixpoint",
    version,
    about = "Iterative auto-remediation: audit, analyze, gate, apply, re-audit",
    long_about = None
)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: FIXPOINT_LOG=] [default: info]
    #[arg(
        long,
        env = "FIXPOINT_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default fixpoint.toml config file
    Init(InitArgs),
    /// Run the remediation loop until convergence or a stop condition
    Run(RunArgs),
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "fixpoint.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file (initialize with `fixpoint init`)
    #[arg(long, default_value = "fixpoint.toml")]
    pub config: String,

    /// Project root to remediate
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Dry run: report admissible fixes without mutating any file
    #[arg(long)]
    pub dry_run: bool,

    /// Apply admitted fixes without asking for confirmation
    #[arg(long)]
    pub yes: bool,

    /// Override the configured iteration limit
    #[arg(long)]
    pub max_iterations: Option<u32>,
}
