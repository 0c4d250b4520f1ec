//! Content-based duplicate review and purge.
//!
//! A [`DedupSession`] is a caller-owned snapshot of the duplicate groups in
//! one scope: the page being viewed and the keeper chosen for each group. The
//! [`DedupEngine`] loads sessions from a [`RecordStore`] and applies purges to
//! them. Purging copies each non-keeper into the quarantine directory and then
//! flags it as a duplicate; nothing is ever deleted.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::models::{DedupSummary, MediaRecord, PurgeReport};
use crate::quarantine::copy_to_quarantine;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub page_size: usize,
    pub quarantine_dir: PathBuf,
}

impl DedupConfig {
    pub fn new(quarantine_dir: impl Into<PathBuf>) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            quarantine_dir: quarantine_dir.into(),
        }
    }
}

/// Two or more records with the same fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub fingerprint: String,
    pub members: Vec<MediaRecord>,
}

impl DuplicateGroup {
    /// First member not already purged.
    pub fn default_keeper(&self) -> Option<usize> {
        self.members.iter().position(|m| !m.is_duplicate)
    }

    pub fn purged_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_duplicate).count()
    }

    fn can_keep(&self, index: usize) -> bool {
        self.members.get(index).is_some_and(|m| !m.is_duplicate)
    }
}

/// Groups records by fingerprint, dropping singletons.
///
/// Groups come back sorted by fingerprint; members keep their input order.
pub fn group_by_fingerprint(records: Vec<MediaRecord>) -> Vec<DuplicateGroup> {
    let mut by_fingerprint: BTreeMap<String, Vec<MediaRecord>> = BTreeMap::new();
    for record in records {
        if record.fingerprint.is_empty() {
            continue;
        }
        by_fingerprint
            .entry(record.fingerprint.clone())
            .or_default()
            .push(record);
    }

    by_fingerprint
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(fingerprint, members)| DuplicateGroup {
            fingerprint,
            members,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DedupSession {
    scope: Option<String>,
    page_size: usize,
    page: usize,
    groups: Vec<DuplicateGroup>,
    keepers: HashMap<String, usize>,
}

impl DedupSession {
    /// Builds a session over already loaded records. `page_size` of zero is
    /// treated as one.
    pub fn new(scope: Option<String>, records: Vec<MediaRecord>, page_size: usize) -> Self {
        Self {
            scope,
            page_size: page_size.max(1),
            page: 0,
            groups: group_by_fingerprint(records),
            keepers: HashMap::new(),
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn group(&self, fingerprint: &str) -> Option<&DuplicateGroup> {
        self.groups.iter().find(|g| g.fingerprint == fingerprint)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.page
    }

    /// Always at least one, even with no groups.
    pub fn total_pages(&self) -> usize {
        self.groups.len().div_ceil(self.page_size).max(1)
    }

    /// Index into [`groups`](Self::groups) of the first group on the current page.
    pub fn page_offset(&self) -> usize {
        self.page * self.page_size
    }

    pub fn current_page(&self) -> &[DuplicateGroup] {
        let start = self.page_offset().min(self.groups.len());
        let end = (start + self.page_size).min(self.groups.len());
        &self.groups[start..end]
    }

    /// Moves forward one page; returns false on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Moves back one page; returns false on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to `page`, clamped into `0..total_pages()`. Returns the page now shown.
    pub fn set_page(&mut self, page: i64) -> usize {
        let last = self.total_pages() - 1;
        self.page = usize::try_from(page.max(0)).unwrap_or(usize::MAX).min(last);
        self.page
    }

    /// Chooses which member of a group survives a purge.
    ///
    /// An index that is out of range or points at an already purged member is
    /// ignored and the group falls back to its default keeper. Returns the
    /// keeper now in effect, or `None` for an unknown group or one with no
    /// active members.
    pub fn select_keeper(&mut self, fingerprint: &str, index: usize) -> Option<usize> {
        let group = self.group(fingerprint)?;
        if group.can_keep(index) {
            self.keepers.insert(fingerprint.to_string(), index);
            Some(index)
        } else {
            log::debug!("keeper {index} not selectable in group {fingerprint}; using default");
            let fallback = group.default_keeper();
            self.keepers.remove(fingerprint);
            fallback
        }
    }

    pub fn keeper_for(&self, group: &DuplicateGroup) -> Option<usize> {
        self.keepers
            .get(&group.fingerprint)
            .copied()
            .filter(|&i| group.can_keep(i))
            .or_else(|| group.default_keeper())
    }

    pub fn summary(&self) -> DedupSummary {
        let mut summary = DedupSummary {
            groups: self.groups.len() as u64,
            ..DedupSummary::default()
        };
        for group in &self.groups {
            let purged = group.purged_count() as u64;
            let active = group.members.len() as u64 - purged;
            summary.members += group.members.len() as u64;
            summary.purged += purged;
            summary.pending += active.saturating_sub(1);
        }
        summary
    }

    fn replace_groups(&mut self, groups: Vec<DuplicateGroup>) {
        self.groups = groups;
        self.page = self.page.min(self.total_pages() - 1);
        let groups = &self.groups;
        self.keepers.retain(|fingerprint, index| {
            groups
                .iter()
                .find(|g| &g.fingerprint == fingerprint)
                .is_some_and(|g| g.can_keep(*index))
        });
    }
}

pub struct DedupEngine<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    config: DedupConfig,
}

impl<'s, S: RecordStore + ?Sized> DedupEngine<'s, S> {
    pub fn new(store: &'s S, config: DedupConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(Error::InvalidArgument("page size must be at least 1".to_string()));
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Loads every record under `scope` (or all records) and groups them.
    pub fn load(&self, scope: Option<&str>) -> Result<DedupSession> {
        let records = self.store.all(scope)?;
        let session = DedupSession::new(scope.map(str::to_string), records, self.config.page_size);
        log::info!(
            "{} duplicate groups in {}",
            session.groups.len(),
            scope.unwrap_or("all locations")
        );
        Ok(session)
    }

    /// Regroups the session from current store contents, keeping the page
    /// (clamped) and any keeper choices that are still valid.
    pub fn refresh(&self, session: &mut DedupSession) -> Result<()> {
        let records = self.store.all(session.scope())?;
        session.replace_groups(group_by_fingerprint(records));
        Ok(())
    }

    /// Purges every group on the session's current page, then refreshes it.
    pub fn purge_page(&self, session: &mut DedupSession) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        for group in session.current_page() {
            report.absorb(&self.purge_members(group, session.keeper_for(group)));
        }
        self.refresh(session)?;
        log::info!(
            "purged page {}: {} marked, {} kept, {} failed",
            session.page_index() + 1,
            report.marked,
            report.kept,
            report.failed()
        );
        Ok(report)
    }

    /// Purges a single group, then refreshes the session. An unknown
    /// fingerprint purges nothing.
    pub fn purge_group(&self, session: &mut DedupSession, fingerprint: &str) -> Result<PurgeReport> {
        let report = match session.group(fingerprint) {
            Some(group) => self.purge_members(group, session.keeper_for(group)),
            None => {
                log::warn!("no duplicate group {fingerprint} in this session");
                PurgeReport::default()
            }
        };
        self.refresh(session)?;
        Ok(report)
    }

    // A member is marked only after its copy landed in quarantine, so a
    // flagged record always has a backup. Failed members stay active and can
    // be purged again.
    fn purge_members(&self, group: &DuplicateGroup, keeper: Option<usize>) -> PurgeReport {
        let mut report = PurgeReport::default();
        for (idx, member) in group.members.iter().enumerate() {
            if Some(idx) == keeper {
                report.kept += 1;
                continue;
            }
            if member.is_duplicate {
                report.already_purged += 1;
                continue;
            }

            let path = member.file_path_str();
            match copy_to_quarantine(&member.file_path, &self.config.quarantine_dir) {
                Ok(dest) => log::debug!("copied {path} to {}", dest.to_string_lossy()),
                Err(err) => {
                    log::warn!("failed to copy {path} to quarantine: {err}");
                    report.copy_failed += 1;
                    continue;
                }
            }

            match self.store.mark_duplicate(&member.file_path) {
                Ok(()) => report.marked += 1,
                Err(err) => {
                    log::warn!("failed to mark {path} as duplicate: {err}");
                    report.mark_failed += 1;
                }
            }
        }
        report
    }
}
