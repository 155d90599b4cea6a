pub mod audit;
pub mod config;
pub mod import;
pub mod init;
pub mod owner;
pub mod release;
pub mod serve;
pub mod tick;
pub mod vault;

use anyhow::Context;
use deadhand_core::config::Config;
use deadhand_core::types::TimeUnit;
use deadhand_core::Engine;
use std::path::Path;

/// Resolved project root plus the command-line overrides that apply to it.
pub struct Workspace<'a> {
    pub root: &'a Path,
    time_unit: Option<TimeUnit>,
}

impl<'a> Workspace<'a> {
    pub fn new(root: &'a Path, time_unit: Option<TimeUnit>) -> Self {
        Self { root, time_unit }
    }

    /// Load `.deadhand/config.yaml`, with `--time-unit` taking precedence.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.root).context("failed to load config")?;
        if let Some(unit) = self.time_unit {
            config.time_unit = unit;
        }
        Ok(config)
    }

    /// Open the engine over the project's databases.
    pub fn engine(&self) -> anyhow::Result<Engine> {
        let config = self.config()?;
        Engine::open(self.root, &config).context("failed to open release store")
    }

    pub fn time_unit_override(&self) -> Option<TimeUnit> {
        self.time_unit
    }
}
