use super::Workspace;
use crate::output::{fmt_time, inactivity_table, print_json};

pub fn inactivity(ws: &Workspace<'_>, owner: &str, json: bool) -> anyhow::Result<()> {
    let report = ws.engine()?.inactivity_report(owner)?;

    if json {
        return print_json(&report);
    }

    println!(
        "Owner {} last active {} (checked {}, unit {})",
        report.owner_id,
        fmt_time(report.last_active_at),
        fmt_time(Some(report.checked_at)),
        report.time_unit
    );
    if report.vaults.is_empty() {
        println!("No vaults.");
        return Ok(());
    }

    inactivity_table(&report.vaults).print();
    Ok(())
}

pub fn activity(ws: &Workspace<'_>, owner: &str, json: bool) -> anyhow::Result<()> {
    let owner = ws.engine()?.record_activity(owner)?;

    if json {
        print_json(&owner)?;
    } else {
        println!(
            "Recorded activity for '{}' at {}",
            owner.id,
            fmt_time(owner.last_active_at)
        );
    }
    Ok(())
}
