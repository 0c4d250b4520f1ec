use std::path::PathBuf;
use std::time::SystemTime;

use crate::attributes::Attributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// One catalogued file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub location_root: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub attributes: Attributes,
    pub fingerprint: String,
    pub is_duplicate: bool,
}

impl MediaRecord {
    pub fn file_path_str(&self) -> String {
        self.file_path.to_string_lossy().to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    /// Eligible image/video files encountered under the root.
    pub files_seen: u64,
    /// New records whose attribute map is non-empty.
    pub with_attributes: u64,
    pub inserted: u64,
    pub already_present: u64,
    /// Files that failed to hash, extract, or insert.
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub root: PathBuf,
    pub stats: IngestStats,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub kept: u64,
    pub marked: u64,
    pub already_purged: u64,
    pub copy_failed: u64,
    pub mark_failed: u64,
}

impl PurgeReport {
    pub fn failed(&self) -> u64 {
        self.copy_failed + self.mark_failed
    }

    pub(crate) fn absorb(&mut self, other: &PurgeReport) {
        self.kept += other.kept;
        self.marked += other.marked;
        self.already_purged += other.already_purged;
        self.copy_failed += other.copy_failed;
        self.mark_failed += other.mark_failed;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupSummary {
    pub groups: u64,
    pub members: u64,
    pub purged: u64,
    pub pending: u64,
}

/// Singleton description of a catalog database.
#[derive(Debug, Clone)]
pub struct CatalogInfo {
    pub created_at: SystemTime,
    pub app_version: String,
    pub fingerprint_algorithm: String,
}
