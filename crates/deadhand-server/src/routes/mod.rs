pub mod jobs;
pub mod owners;
pub mod releases;
pub mod vaults;

use uuid::Uuid;

use crate::error::AppError;

pub(crate) fn parse_release_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("invalid release id '{raw}'")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::Utc;
    use deadhand_core::clock::ManualClock;
    use deadhand_core::fixture::Fixture;
    use deadhand_core::notify::MemoryNotifier;
    use deadhand_core::store::Store;
    use deadhand_core::types::TimeUnit;
    use deadhand_core::Engine;
    use tempfile::TempDir;

    use crate::state::AppState;

    pub const FIXTURE: &str = r#"
owners:
  - id: alice
vaults:
  - id: family
    owner_id: alice
    title: Family
    participants:
      - { id: w1, role: witness }
      - { id: carol, role: beneficiary }
    rules: { inactivity_period: 1, grace_period: 1, time_lock: 1, approvals_required: 1 }
"#;

    pub struct TestApp {
        pub _dir: TempDir,
        pub state: AppState,
        pub clock: Arc<ManualClock>,
    }

    pub fn app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("releases.db")).unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = Engine::new(Arc::new(store), TimeUnit::Minutes)
            .with_clock(clock.clone())
            .with_notifier(Arc::new(MemoryNotifier::new()));
        engine.import(&Fixture::parse(FIXTURE).unwrap()).unwrap();
        TestApp {
            _dir: dir,
            state: AppState::new(Arc::new(engine)),
            clock,
        }
    }
}
