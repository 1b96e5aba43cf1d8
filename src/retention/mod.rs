mod logic;

use std::path::Path;

use chrono::Local;

pub use logic::cleanup_as_of;

/// Counters of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Date directories examined.
    pub checked: usize,
    pub deleted_dirs: usize,
    pub deleted_files: usize,
    /// Expired date directories that could not be removed.
    pub failed: usize,
}

/// Deletes every date directory under `backup_root` older than `retention_days` days
/// before today. Never fails; problems are logged and reflected in the report.
pub fn cleanup(backup_root: &Path, retention_days: u32) -> CleanupReport {
    cleanup_as_of(backup_root, retention_days, Local::now().date_naive())
}
