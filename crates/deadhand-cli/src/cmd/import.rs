use super::Workspace;
use crate::output::print_json;
use anyhow::Context;
use deadhand_core::fixture::Fixture;
use std::path::Path;

pub fn run(ws: &Workspace<'_>, file: &Path, json: bool) -> anyhow::Result<()> {
    let fixture = Fixture::load(file)
        .with_context(|| format!("failed to read fixture {}", file.display()))?;
    let summary = ws.engine()?.import(&fixture).context("import failed")?;

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Imported {} owner(s), {} vault(s), {} rule set(s)",
            summary.owners, summary.vaults, summary.rule_sets
        );
    }
    Ok(())
}
