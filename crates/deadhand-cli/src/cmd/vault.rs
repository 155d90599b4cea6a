use super::Workspace;
use crate::output::{fmt_time, print_json};
use anyhow::Context;

pub fn status(ws: &Workspace<'_>, vault: &str, json: bool) -> anyhow::Result<()> {
    let status = ws.engine()?.vault_release_status(vault)?;

    if json {
        return print_json(&status);
    }

    println!("Vault:      {}", status.vault_id);
    let Some(release_id) = status.release_id else {
        println!("Release:    none");
        return Ok(());
    };
    println!("Release:    {release_id}");
    if let Some(s) = status.status {
        println!("Status:     {s}");
    }
    println!(
        "Approvals:  {}/{}",
        status.approvals_received, status.approvals_needed
    );
    if status.in_grace_period {
        println!("Grace end:  {}", fmt_time(status.grace_period_end));
    }
    if status.in_time_lock {
        println!("Lock end:   {}", fmt_time(status.countdown_end));
    }
    if status.is_released {
        println!("Released:   yes");
    }
    Ok(())
}

pub fn reset(ws: &Workspace<'_>, vault: &str, json: bool) -> anyhow::Result<()> {
    let vault = ws
        .engine()?
        .reset_vault(vault)
        .with_context(|| format!("cannot reset vault '{vault}'"))?;

    if json {
        print_json(&vault)?;
    } else {
        println!("Reset vault '{}'; inactivity monitoring re-armed", vault.id);
    }
    Ok(())
}
