mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{audit::AuditSubcommand, config::ConfigSubcommand};
use deadhand_core::reconcile::Job;
use deadhand_core::types::{Decision, ReleaseStatus, TimeUnit};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "deadhand",
    about = "Inactivity-triggered vault release engine: triggers, witness approvals, time locks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .deadhand/)
    #[arg(long, global = true, env = "DEADHAND_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Override the configured time unit (days, hours, minutes, seconds)
    #[arg(long, global = true, env = "DEADHAND_TIME_UNIT")]
    time_unit: Option<TimeUnit>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize deadhand in the current directory
    Init,

    /// Load owners, vaults, participants and rule sets from a YAML fixture
    Import { file: PathBuf },

    /// Open a release for a vault now
    Trigger { vault: String },

    /// Record a witness approval or rejection
    Confirm {
        release: Uuid,
        #[arg(long)]
        witness: String,
        /// approve or reject
        #[arg(long)]
        decision: Decision,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Release an approved vault once its time lock has elapsed
    Finalize { release: Uuid },

    /// Cancel an in-flight release (owner only)
    Revoke {
        release: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show the release status of a vault
    Status { vault: String },

    /// List releases, newest first
    Releases {
        #[arg(long)]
        vault: Option<String>,
        #[arg(long)]
        status: Option<ReleaseStatus>,
    },

    /// Show one release with its confirmations
    Show { release: Uuid },

    /// Report per-vault inactivity for an owner
    Inactivity { owner: String },

    /// Mark an owner as active now
    Activity { owner: String },

    /// Clear a vault's release marker after the owner returns
    Reset { vault: String },

    /// Run one reconciliation pass (inactivity, grace, time-lock or all)
    Tick { job: Job },

    /// Inspect the audit log
    Audit {
        #[command(subcommand)]
        subcommand: AuditSubcommand,
    },

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the HTTP API and run the job scheduler
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let ws = cmd::Workspace::new(&root, cli.time_unit);
    let json = cli.json;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&ws, json),
        Commands::Import { file } => cmd::import::run(&ws, &file, json),
        Commands::Trigger { vault } => cmd::release::trigger(&ws, &vault, json),
        Commands::Confirm {
            release,
            witness,
            decision,
            comment,
        } => cmd::release::confirm(&ws, release, &witness, decision, comment, json),
        Commands::Finalize { release } => cmd::release::finalize(&ws, release, json),
        Commands::Revoke {
            release,
            actor,
            reason,
        } => cmd::release::revoke(&ws, release, &actor, reason, json),
        Commands::Status { vault } => cmd::vault::status(&ws, &vault, json),
        Commands::Releases { vault, status } => {
            cmd::release::list(&ws, vault.as_deref(), status, json)
        }
        Commands::Show { release } => cmd::release::show(&ws, release, json),
        Commands::Inactivity { owner } => cmd::owner::inactivity(&ws, &owner, json),
        Commands::Activity { owner } => cmd::owner::activity(&ws, &owner, json),
        Commands::Reset { vault } => cmd::vault::reset(&ws, &vault, json),
        Commands::Tick { job } => cmd::tick::run(&ws, job, json),
        Commands::Audit { subcommand } => cmd::audit::run(&ws, subcommand, json),
        Commands::Config { subcommand } => cmd::config::run(&ws, subcommand, json),
        Commands::Serve { port } => cmd::serve::run(&ws, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
