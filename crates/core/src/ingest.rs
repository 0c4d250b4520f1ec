use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use walkdir::WalkDir;

use crate::attributes::{normalize_map, Attributes};
use crate::db::RecordStore;
use crate::drive::location_root_for;
use crate::error::{Error, Result};
use crate::hash::fingerprint_file;
use crate::media::classify;
use crate::metadata::AttributeExtractor;
use crate::models::{IngestReport, IngestStats, MediaKind, MediaRecord};

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub root: PathBuf,
    pub follow_links: bool,
}

impl IngestConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IngestCancelToken {
    cancelled: Arc<AtomicBool>,
}

impl IngestCancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct IngestProgress {
    pub files_seen: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub current_path: PathBuf,
}

pub fn ingest_root<S, E>(config: &IngestConfig, store: &S, extractor: &E) -> Result<IngestReport>
where
    S: RecordStore + ?Sized,
    E: AttributeExtractor + ?Sized,
{
    ingest_root_with_progress(config, store, extractor, None, |_| {})
}

/// Ingests each root in turn. A bad root yields an `Err` entry and does not
/// stop the remaining roots.
pub fn ingest_roots<S, E>(roots: &[PathBuf], store: &S, extractor: &E) -> Vec<Result<IngestReport>>
where
    S: RecordStore + ?Sized,
    E: AttributeExtractor + ?Sized,
{
    roots
        .iter()
        .map(|root| ingest_root(&IngestConfig::for_root(root.clone()), store, extractor))
        .collect()
}

pub fn ingest_root_with_progress<S, E, F>(
    config: &IngestConfig,
    store: &S,
    extractor: &E,
    cancel: Option<&IngestCancelToken>,
    mut on_progress: F,
) -> Result<IngestReport>
where
    S: RecordStore + ?Sized,
    E: AttributeExtractor + ?Sized,
    F: FnMut(&IngestProgress),
{
    if !config.root.exists() {
        return Err(Error::InvalidArgument(format!(
            "root does not exist: {}",
            config.root.to_string_lossy()
        )));
    }
    let root = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());

    let mut stats = IngestStats::default();
    let mut locations = LocationCache::default();

    for entry in WalkDir::new(&root).follow_links(config.follow_links) {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                log::info!(
                    "ingestion of {} cancelled after {} new records",
                    root.to_string_lossy(),
                    stats.inserted
                );
                return Err(Error::Cancelled);
            }
        }

        let entry = match entry {
            Ok(v) => v,
            Err(err) => {
                log::warn!("walk error under {}: {err}", root.to_string_lossy());
                stats.skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = classify(path) else {
            continue;
        };
        stats.files_seen += 1;

        // Catalog paths are text; a lossy copy would no longer name the file.
        if path.to_str().is_none() {
            log::warn!("skipping {}: path is not valid UTF-8", path.to_string_lossy());
            stats.skipped += 1;
        } else {
            match store.exists(path) {
                Ok(true) => {
                    log::debug!("already catalogued: {}", path.to_string_lossy());
                    stats.already_present += 1;
                }
                Ok(false) => {
                    let location_root = locations.root_for(path);
                    catalog_file(path, kind, location_root, store, extractor, &mut stats);
                }
                Err(err) => {
                    log::warn!("failed to look up {}: {err}", path.to_string_lossy());
                    stats.skipped += 1;
                }
            }
        }

        on_progress(&IngestProgress {
            files_seen: stats.files_seen,
            inserted: stats.inserted,
            skipped: stats.skipped,
            current_path: path.to_path_buf(),
        });
    }

    log::info!(
        "{}: {} media files, {} new, {} with attributes, {} skipped",
        root.to_string_lossy(),
        stats.files_seen,
        stats.inserted,
        stats.with_attributes,
        stats.skipped
    );
    Ok(IngestReport { root, stats })
}

fn catalog_file<S, E>(
    path: &Path,
    kind: MediaKind,
    location_root: String,
    store: &S,
    extractor: &E,
    stats: &mut IngestStats,
) where
    S: RecordStore + ?Sized,
    E: AttributeExtractor + ?Sized,
{
    let record = match build_record(path, kind, location_root, extractor) {
        Ok(record) => record,
        Err(err) => {
            log::warn!("skipping {}: {err}", path.to_string_lossy());
            stats.skipped += 1;
            return;
        }
    };
    match store.insert(&record) {
        Ok(()) => {
            log::debug!("catalogued {} ({})", path.to_string_lossy(), record.fingerprint);
            stats.inserted += 1;
            if !record.attributes.is_empty() {
                stats.with_attributes += 1;
            }
        }
        Err(err) => {
            log::warn!("failed to store {}: {err}", path.to_string_lossy());
            stats.skipped += 1;
        }
    }
}

fn build_record<E>(
    path: &Path,
    kind: MediaKind,
    location_root: String,
    extractor: &E,
) -> Result<MediaRecord>
where
    E: AttributeExtractor + ?Sized,
{
    let fingerprint = fingerprint_file(path)?;
    let attributes = match kind {
        MediaKind::Image => normalize_map(&extractor.extract(path)?),
        MediaKind::Video => Attributes::new(),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(MediaRecord {
        location_root,
        file_name,
        file_path: path.to_path_buf(),
        attributes,
        fingerprint,
        is_duplicate: false,
    })
}

// Location roots resolved per parent directory.
#[derive(Default)]
struct LocationCache {
    by_dir: HashMap<PathBuf, String>,
}

impl LocationCache {
    fn root_for(&mut self, path: &Path) -> String {
        let dir = path.parent().unwrap_or(path).to_path_buf();
        self.by_dir
            .entry(dir)
            .or_insert_with_key(|dir| location_root_for(dir))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::RawValue;
    use crate::db::SqliteCatalogStore;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    struct NoAttributes;

    impl AttributeExtractor for NoAttributes {
        fn extract(&self, _path: &Path) -> Result<BTreeMap<String, RawValue>> {
            Ok(BTreeMap::new())
        }
    }

    #[test]
    fn cancelled_token_stops_ingestion() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let cancel = IngestCancelToken::new();
        cancel.cancel();

        let result = ingest_root_with_progress(
            &IngestConfig::for_root(dir.path()),
            &store,
            &NoAttributes,
            Some(&cancel),
            |_| {},
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn progress_reports_every_media_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("b.mp4"), b"b").unwrap();
        fs::write(dir.path().join("c.txt"), b"c").unwrap();
        let store = SqliteCatalogStore::open_in_memory().unwrap();

        let mut seen = Vec::new();
        ingest_root_with_progress(
            &IngestConfig::for_root(dir.path()),
            &store,
            &NoAttributes,
            None,
            |p| seen.push(p.current_path.clone()),
        )
        .unwrap();

        seen.sort();
        let names: Vec<_> = seen
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.mp4"]);
    }

    // Lookups fail for files whose name starts with "locked".
    struct LockedLookups(SqliteCatalogStore);

    impl RecordStore for LockedLookups {
        fn insert(&self, record: &MediaRecord) -> Result<()> {
            self.0.insert(record)
        }

        fn exists(&self, file_path: &Path) -> Result<bool> {
            let locked = file_path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("locked"));
            if locked {
                return Err(Error::InvalidArgument("database is locked".to_string()));
            }
            self.0.exists(file_path)
        }

        fn all(&self, location_prefix: Option<&str>) -> Result<Vec<MediaRecord>> {
            self.0.all(location_prefix)
        }

        fn distinct_location_roots(&self) -> Result<std::collections::BTreeSet<String>> {
            self.0.distinct_location_roots()
        }

        fn mark_duplicate(&self, file_path: &Path) -> Result<()> {
            self.0.mark_duplicate(file_path)
        }
    }

    #[test]
    fn failed_lookup_skips_only_that_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("locked.jpg"), b"l").unwrap();
        fs::write(dir.path().join("z.mp4"), b"z").unwrap();
        let store = LockedLookups(SqliteCatalogStore::open_in_memory().unwrap());

        let report = ingest_root(&IngestConfig::for_root(dir.path()), &store, &NoAttributes).unwrap();

        assert_eq!(report.stats.files_seen, 3);
        assert_eq!(report.stats.inserted, 2);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(store.0.count().unwrap(), 2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.jpg")), b"b").unwrap();
        fs::write(dir.path().join("good.jpg"), b"g").unwrap();
        let store = SqliteCatalogStore::open_in_memory().unwrap();

        let report = ingest_root(&IngestConfig::for_root(dir.path()), &store, &NoAttributes).unwrap();

        assert_eq!(report.stats.files_seen, 2);
        assert_eq!(report.stats.inserted, 1);
        assert_eq!(report.stats.skipped, 1);
        let names: Vec<_> = store.all(None).unwrap().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["good.jpg"]);
    }

    #[test]
    fn location_roots_are_prefixes_of_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        ingest_root(&IngestConfig::for_root(dir.path()), &store, &NoAttributes).unwrap();

        let records = store.all(None).unwrap();
        assert_eq!(records.len(), 1);
        #[cfg(unix)]
        assert!(records[0].file_path.starts_with(&records[0].location_root));
    }
}
