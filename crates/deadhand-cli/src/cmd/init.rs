use super::Workspace;
use anyhow::Context;
use deadhand_core::{audit::AuditLog, config::Config, io, paths, store::Store};

pub fn run(ws: &Workspace<'_>, json: bool) -> anyhow::Result<()> {
    let root = ws.root;
    let data_dir = paths::data_dir(root);
    io::ensure_dir(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let config_path = paths::config_path(root);
    let created_config = !config_path.exists();
    if created_config {
        let mut cfg = Config::default();
        if let Some(unit) = ws.time_unit_override() {
            cfg.time_unit = unit;
        }
        cfg.save(root).context("failed to write config.yaml")?;
    }

    Store::open(&paths::releases_db_path(root)).context("failed to create releases.db")?;
    AuditLog::open(&paths::audit_db_path(root)).context("failed to create audit.db")?;

    if json {
        crate::output::print_json(&serde_json::json!({
            "root": root,
            "config_created": created_config,
        }))?;
    } else {
        println!("Initializing deadhand in: {}", root.display());
        if created_config {
            println!("  created: {}", paths::CONFIG_FILE);
        } else {
            println!("  exists:  {}", paths::CONFIG_FILE);
        }
        println!("  ready:   {}", paths::RELEASES_DB);
        println!("  ready:   {}", paths::AUDIT_DB);
    }
    Ok(())
}
