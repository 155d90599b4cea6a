use super::Workspace;
use crate::output::{audit_table, print_json};
use anyhow::Context;
use clap::Subcommand;
use deadhand_core::{audit::AuditLog, paths};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum AuditSubcommand {
    /// List audit entries in sequence order
    List {
        /// Only entries for this release
        #[arg(long)]
        release: Option<Uuid>,
    },
    /// Recompute the hash chain and report the first broken entry
    Verify,
}

pub fn run(ws: &Workspace<'_>, subcmd: AuditSubcommand, json: bool) -> anyhow::Result<()> {
    ws.config()?;
    let log = AuditLog::open(&paths::audit_db_path(ws.root)).context("failed to open audit log")?;
    match subcmd {
        AuditSubcommand::List { release } => list(&log, release, json),
        AuditSubcommand::Verify => verify(&log, json),
    }
}

fn list(log: &AuditLog, release: Option<Uuid>, json: bool) -> anyhow::Result<()> {
    let entries = match release {
        Some(id) => log.entries_for_release(id)?,
        None => log.entries()?,
    };

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }
    audit_table(&entries).print();
    Ok(())
}

fn verify(log: &AuditLog, json: bool) -> anyhow::Result<()> {
    let broken = log.verify()?;
    let count = log.entries()?.len();

    if json {
        print_json(&serde_json::json!({
            "entries": count,
            "intact": broken.is_none(),
            "first_broken_seq": broken,
        }))?;
    } else if broken.is_none() {
        println!("Audit chain intact ({count} entries).");
    }

    if let Some(seq) = broken {
        anyhow::bail!("audit chain broken at entry {seq}");
    }
    Ok(())
}
