use super::Workspace;
use crate::output::{approvals, confirmation_table, fmt_time, print_json, release_table};
use anyhow::Context;
use deadhand_core::types::{Decision, ReleaseStatus};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

pub fn trigger(ws: &Workspace<'_>, vault: &str, json: bool) -> anyhow::Result<()> {
    let release = ws
        .engine()?
        .trigger_release(vault)
        .with_context(|| format!("cannot trigger release for vault '{vault}'"))?;

    if json {
        print_json(&release)?;
    } else {
        println!("Triggered release {} for vault '{vault}'", release.id);
        println!("  grace period ends: {}", fmt_time(Some(release.grace_period_end)));
    }
    Ok(())
}

pub fn confirm(
    ws: &Workspace<'_>,
    id: Uuid,
    witness: &str,
    decision: Decision,
    comment: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (confirmation, release) = ws
        .engine()?
        .confirm_release(id, witness, decision, comment)
        .with_context(|| format!("cannot confirm release {id}"))?;

    if json {
        print_json(&serde_json::json!({
            "confirmation": confirmation,
            "release": release,
        }))?;
    } else {
        println!(
            "Recorded {} from '{witness}': release is {} ({} approvals)",
            confirmation.status,
            release.status,
            approvals(&release)
        );
        if let Some(end) = release.countdown_end {
            println!("  time lock ends: {}", fmt_time(Some(end)));
        }
    }
    Ok(())
}

pub fn finalize(ws: &Workspace<'_>, id: Uuid, json: bool) -> anyhow::Result<()> {
    let release = ws
        .engine()?
        .finalize_release(id)
        .with_context(|| format!("cannot finalize release {id}"))?;

    if json {
        print_json(&release)?;
    } else {
        println!("Released vault '{}' ({})", release.vault_id, release.id);
    }
    Ok(())
}

pub fn revoke(
    ws: &Workspace<'_>,
    id: Uuid,
    actor: &str,
    reason: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let release = ws
        .engine()?
        .revoke_release(id, actor, reason)
        .with_context(|| format!("cannot revoke release {id}"))?;

    if json {
        print_json(&release)?;
    } else {
        println!("Revoked release {} for vault '{}'", release.id, release.vault_id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn list(
    ws: &Workspace<'_>,
    vault: Option<&str>,
    status: Option<ReleaseStatus>,
    json: bool,
) -> anyhow::Result<()> {
    let releases = ws.engine()?.releases(vault, status)?;

    if json {
        return print_json(&releases);
    }
    if releases.is_empty() {
        println!("No releases.");
        return Ok(());
    }
    release_table(&releases).print();
    Ok(())
}

pub fn show(ws: &Workspace<'_>, id: Uuid, json: bool) -> anyhow::Result<()> {
    let engine = ws.engine()?;
    let release = engine.release(id)?;
    let confirmations = engine.confirmations(id)?;

    if json {
        return print_json(&serde_json::json!({
            "release": release,
            "confirmations": confirmations,
        }));
    }

    println!("Release:    {}", release.id);
    println!("Vault:      {}", release.vault_id);
    println!("Status:     {}", release.status);
    println!("Triggered:  {}", fmt_time(Some(release.triggered_at)));
    println!("Grace end:  {}", fmt_time(Some(release.grace_period_end)));
    println!("Lock end:   {}", fmt_time(release.countdown_end));
    println!("Approvals:  {}", approvals(&release));
    if let Some(done) = release.completed_at {
        println!("Completed:  {}", fmt_time(Some(done)));
    }
    if let Some(reason) = &release.revoke_reason {
        println!("Revoked:    {reason}");
    }

    if !confirmations.is_empty() {
        println!();
        confirmation_table(&confirmations).print();
    }
    Ok(())
}
