mod apply;
mod audit;
mod backup;
mod cli;
mod config;
mod confirm;
mod filter;
mod orchestrator;
mod pipeline;
mod report;
mod types;
mod util;

use apply::Applier;
use audit::CommandAuditor;
use backup::BackupManager;
use clap::Parser;
use cli::{Cli, Commands, InitArgs, RunArgs};
use config::Config;
use confirm::TerminalConfirm;
use orchestrator::Orchestrator;
use pipeline::Pipeline;
use report::Reporter;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match &cli.command {
        Commands::Init(args) => init(args),
        Commands::Run(args) => run(args).await,
    }
}

fn init(args: &InitArgs) {
    let path = PathBuf::from(&args.config);
    if path.exists() && !args.r#override {
        error!(
            "{} already exists (use --override to replace it)",
            args.config
        );
        std::process::exit(EXIT_FAILURE);
    }
    if let Err(e) = std::fs::write(&path, config::DEFAULT_CONFIG) {
        error!("Failed to write {}: {}", args.config, e);
        std::process::exit(EXIT_FAILURE);
    }
    info!("Wrote default config to {}", args.config);
}

async fn run(args: &RunArgs) {
    let mut config = Config::load(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(EXIT_FAILURE);
    });

    // CLI flags override the config file
    config.run.dry_run |= args.dry_run;
    config.run.auto_apply |= args.yes;
    if let Some(max) = args.max_iterations {
        config.run.max_iterations = max;
    }

    let root = PathBuf::from(&args.root);
    let auditor = CommandAuditor::new(config.audit.command.clone(), config.run.stage_timeout_secs);
    let pipeline = Pipeline::from_config(&config.pipeline.stages, config.run.stage_timeout_secs);
    if pipeline.is_empty() {
        eprintln!("No pipeline stages configured");
        std::process::exit(EXIT_FAILURE);
    }

    let backup = if config.run.create_backups {
        match BackupManager::new(&config.backup.dir, &config.backup.exclude) {
            Ok(manager) => Some(manager),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(EXIT_FAILURE);
            }
        }
    } else {
        None
    };

    let reporter = Reporter::new(root.join(&config.report.dir));
    let orchestrator = Orchestrator::new(
        root.clone(),
        config.run.clone(),
        Box::new(auditor),
        pipeline,
        Applier::new(root),
        backup,
        Box::new(TerminalConfirm),
        reporter,
    );

    match orchestrator.run().await {
        Ok(_summary) => {}
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}
