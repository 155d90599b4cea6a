use chrono::{DateTime, Utc};
use deadhand_core::audit::AuditEntry;
use deadhand_core::confirmation::Confirmation;
use deadhand_core::release::Release;
use deadhand_core::status::{InactivityState, VaultInactivity};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Left-aligned columns under a dashed rule, two spaces apart.
pub struct Table {
    headers: &'static [&'static str],
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &'static [&'static str]) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = line(self.headers.iter().copied(), &widths);
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        out.push_str(&format!("{}\n", rule.join("  ")));
        for row in &self.rows {
            out.push_str(&line(row.iter().map(String::as_str), &widths));
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

fn line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:w$}"))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

// ---------------------------------------------------------------------------
// Domain tables
// ---------------------------------------------------------------------------

pub fn release_table(releases: &[Release]) -> Table {
    let mut table = Table::new(&["ID", "VAULT", "STATUS", "APPROVALS", "TRIGGERED", "LOCK ENDS"]);
    for r in releases {
        table.push(vec![
            r.id.to_string(),
            r.vault_id.clone(),
            r.status.to_string(),
            approvals(r),
            fmt_time(Some(r.triggered_at)),
            fmt_time(r.countdown_end),
        ]);
    }
    table
}

pub fn confirmation_table(confirmations: &[Confirmation]) -> Table {
    let mut table = Table::new(&["WITNESS", "DECISION", "AT", "COMMENT"]);
    for c in confirmations {
        table.push(vec![
            c.participant_id.clone(),
            c.status.to_string(),
            fmt_time(Some(c.timestamp)),
            c.comment.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn audit_table(entries: &[AuditEntry]) -> Table {
    let mut table = Table::new(&["SEQ", "AT", "ACTOR", "ACTION", "VAULT", "RELEASE"]);
    for e in entries {
        table.push(vec![
            e.seq.to_string(),
            fmt_time(Some(e.timestamp)),
            e.event.actor.to_string(),
            e.event.action.as_str().to_string(),
            e.event.vault_id.clone(),
            e.event
                .release_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn inactivity_table(vaults: &[VaultInactivity]) -> Table {
    let mut table = Table::new(&["VAULT", "TITLE", "STATE", "DETAIL"]);
    for v in vaults {
        table.push(vec![
            v.vault_id.clone(),
            v.title.clone(),
            v.state.label().to_string(),
            inactivity_detail(&v.state),
        ]);
    }
    table
}

/// "received/needed", e.g. `1/2`.
pub fn approvals(r: &Release) -> String {
    format!("{}/{}", r.approvals_received, r.approvals_needed)
}

fn inactivity_detail(state: &InactivityState) -> String {
    match state {
        InactivityState::NoRule => "no inactivity rule".to_string(),
        InactivityState::Untracked => "owner never seen active".to_string(),
        InactivityState::Active {
            threshold_at,
            remaining,
        } => format!("{remaining} left (at {})", fmt_time(Some(*threshold_at))),
        InactivityState::Inactive {
            overdue_by,
            release_status: Some(s),
            ..
        } => format!("overdue by {overdue_by}; release {s}"),
        InactivityState::Inactive { overdue_by, .. } => format!("overdue by {overdue_by}"),
    }
}

/// Render an optional timestamp for table output.
pub fn fmt_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use deadhand_core::rules::RuleSet;
    use deadhand_core::types::{Decision, ReleaseStatus, TimeUnit};

    #[test]
    fn fmt_time_handles_missing() {
        assert_eq!(fmt_time(None), "-");
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(fmt_time(Some(t)), "2026-03-01 12:30:00");
    }

    #[test]
    fn columns_align_to_widest_cell() {
        let mut table = Table::new(&["WITNESS", "DECISION"]);
        table.push(vec!["w1".into(), "approved".into()]);
        table.push(vec!["grandmother".into(), "rejected".into()]);
        assert_eq!(
            table.render(),
            "WITNESS      DECISION\n\
             -----------  --------\n\
             w1           approved\n\
             grandmother  rejected\n"
        );
    }

    #[test]
    fn release_rows_show_progress_and_missing_lock() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let r = Release::new("family", &RuleSet::new(30, 7, 3, 2), TimeUnit::Days, at).unwrap();
        let out = release_table(std::slice::from_ref(&r)).render();
        let row = out.lines().nth(2).unwrap();
        assert!(row.starts_with(&r.id.to_string()));
        assert!(row.contains("pending"));
        assert!(row.contains("0/2"));
        assert!(row.contains("2026-03-01 12:00:00"));
        assert!(row.ends_with('-'));
    }

    #[test]
    fn confirmation_rows_keep_comment_last() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let c = Confirmation::new(
            uuid::Uuid::new_v4(),
            "w1",
            Decision::Rejected,
            Some("owner is fine".into()),
            at,
        );
        let out = confirmation_table(&[c]).render();
        assert!(out.lines().nth(2).unwrap().ends_with("owner is fine"));
    }

    #[test]
    fn inactivity_detail_names_release_status() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let vaults = vec![
            VaultInactivity {
                vault_id: "family".into(),
                title: "Family".into(),
                state: InactivityState::Inactive {
                    exceeded_at: at,
                    overdue_by: "3 day(s)".into(),
                    release_status: Some(ReleaseStatus::Pending),
                },
            },
            VaultInactivity {
                vault_id: "notes".into(),
                title: "Notes".into(),
                state: InactivityState::NoRule,
            },
        ];
        let out = inactivity_table(&vaults).render();
        assert!(out.contains("overdue by 3 day(s); release pending"));
        assert!(out.contains("no inactivity rule"));
    }
}
