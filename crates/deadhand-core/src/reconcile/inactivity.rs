use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{Job, TickReport};
use crate::engine::{Engine, Origin};
use crate::error::Result;
use crate::vault::{Owner, Vault};

impl Engine {
    /// Open a release for every vault whose owner has been inactive longer
    /// than the vault's inactivity period.
    ///
    /// A vault is skipped while its triggered marker is set or it already
    /// has an active release; the store re-checks both when inserting.
    pub fn run_inactivity_monitor(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let owners: HashMap<String, Owner> = self
            .store
            .owners()?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        let mut report = TickReport::default();
        for vault in self.store.vaults()? {
            let Some(owner) = owners.get(&vault.owner_id) else {
                continue;
            };
            if owner.last_active_at.is_none() {
                continue;
            }
            report.scanned += 1;
            let outcome = self.check_inactivity(owner, &vault, now);
            report.tally(Job::Inactivity, &vault.id, outcome);
        }
        Ok(report)
    }

    fn check_inactivity(&self, owner: &Owner, vault: &Vault, now: DateTime<Utc>) -> Result<bool> {
        let Some(last_active) = owner.last_active_at else {
            return Ok(false);
        };
        let Some(rules) = self.store.rules(&vault.id)? else {
            debug!(vault = %vault.id, "no rule set");
            return Ok(false);
        };
        if !rules.monitors_inactivity() {
            return Ok(false);
        }
        let threshold = rules.inactivity_deadline(last_active, self.unit)?;
        if now <= threshold {
            return Ok(false);
        }
        if vault.release_triggered {
            debug!(vault = %vault.id, "already triggered this episode");
            return Ok(false);
        }
        self.open_release(vault, &rules, now, Origin::Inactivity)?;
        Ok(true)
    }
}
