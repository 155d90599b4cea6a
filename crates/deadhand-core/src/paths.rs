use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DATA_DIR: &str = ".deadhand";

pub const CONFIG_FILE: &str = ".deadhand/config.yaml";
pub const RELEASES_DB: &str = ".deadhand/releases.db";
pub const AUDIT_DB: &str = ".deadhand/audit.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn releases_db_path(root: &Path) -> PathBuf {
    root.join(RELEASES_DB)
}

pub fn audit_db_path(root: &Path) -> PathBuf {
    root.join(AUDIT_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.deadhand/config.yaml")
        );
        assert_eq!(
            releases_db_path(root),
            PathBuf::from("/tmp/proj/.deadhand/releases.db")
        );
        assert_eq!(
            audit_db_path(root),
            PathBuf::from("/tmp/proj/.deadhand/audit.db")
        );
    }
}
