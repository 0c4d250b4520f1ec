use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::attributes::Attributes;
use crate::error::{Error, Result};
use crate::hash::FINGERPRINT_ALGORITHM;
use crate::models::{CatalogInfo, MediaRecord};

/// Persistence used by ingestion and deduplication.
///
/// Each call is treated as atomic; implementations shared between processes
/// must serialize writes themselves.
pub trait RecordStore {
    fn insert(&self, record: &MediaRecord) -> Result<()>;

    fn exists(&self, file_path: &Path) -> Result<bool>;

    /// All records, or only those at or below the directory `location_prefix`,
    /// ordered by path. The prefix matches whole path components, so `/mnt/a`
    /// does not match `/mnt/ab/x.jpg`.
    fn all(&self, location_prefix: Option<&str>) -> Result<Vec<MediaRecord>>;

    fn distinct_location_roots(&self) -> Result<BTreeSet<String>>;

    /// Flags a record as a purged duplicate. Marking twice is a no-op.
    fn mark_duplicate(&self, file_path: &Path) -> Result<()>;
}

pub struct SqliteCatalogStore {
    conn: Connection,
}

impl SqliteCatalogStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        store.check_fingerprint_algorithm()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS catalog (
              id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
              created_at_secs INTEGER,
              app_version TEXT,
              fingerprint_algorithm TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS media_files (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              location_root TEXT NOT NULL,
              file_name TEXT NOT NULL,
              file_path TEXT NOT NULL,
              attributes TEXT NOT NULL DEFAULT '{}',
              fingerprint TEXT NOT NULL,
              is_duplicate INTEGER NOT NULL DEFAULT 0,
              UNIQUE(file_path)
            );

            CREATE INDEX IF NOT EXISTS idx_media_files_fingerprint ON media_files(fingerprint);
            "#,
        )?;
        Ok(())
    }

    fn check_fingerprint_algorithm(&self) -> Result<()> {
        match self.catalog_info()? {
            Some(info) if info.fingerprint_algorithm != FINGERPRINT_ALGORITHM => {
                Err(Error::FingerprintAlgorithmMismatch {
                    stored: info.fingerprint_algorithm,
                    current: FINGERPRINT_ALGORITHM.to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.conn.execute(
                    r#"
                    INSERT INTO catalog (id, created_at_secs, app_version, fingerprint_algorithm)
                    VALUES (1, ?1, ?2, ?3)
                    "#,
                    params![
                        system_time_to_secs(SystemTime::now()) as i64,
                        env!("CARGO_PKG_VERSION"),
                        FINGERPRINT_ALGORITHM,
                    ],
                )?;
                Ok(())
            }
        }
    }

    pub fn catalog_info(&self) -> Result<Option<CatalogInfo>> {
        let row = self
            .conn
            .query_row(
                "SELECT created_at_secs, app_version, fingerprint_algorithm FROM catalog WHERE id = 1",
                [],
                |r| {
                    let created_at_secs: Option<i64> = r.get(0)?;
                    let app_version: Option<String> = r.get(1)?;
                    let fingerprint_algorithm: String = r.get(2)?;
                    Ok(CatalogInfo {
                        created_at: created_at_secs
                            .map(|v| secs_to_system_time(v.max(0) as u64))
                            .unwrap_or(UNIX_EPOCH),
                        app_version: app_version.unwrap_or_default(),
                        fingerprint_algorithm,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM media_files", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// First `limit` records in insertion order.
    pub fn browse(&self, limit: usize) -> Result<Vec<MediaRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_records(
            r#"
            SELECT location_root, file_name, file_path, attributes, fingerprint, is_duplicate
            FROM media_files
            ORDER BY id
            LIMIT ?1
            "#,
            params![limit],
        )
    }

    /// Deletes every record. Files on disk are untouched.
    pub fn clear(&self) -> Result<u64> {
        let removed = self.conn.execute("DELETE FROM media_files", [])?;
        Ok(removed as u64)
    }

    fn query_records(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<MediaRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |r| {
                Ok(RecordRow {
                    location_root: r.get(0)?,
                    file_name: r.get(1)?,
                    file_path: r.get(2)?,
                    attributes: r.get(3)?,
                    fingerprint: r.get(4)?,
                    is_duplicate: r.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }
}

impl RecordStore for SqliteCatalogStore {
    fn insert(&self, record: &MediaRecord) -> Result<()> {
        let file_path = record.file_path.to_str().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "path is not valid UTF-8: {}",
                record.file_path.to_string_lossy()
            ))
        })?;
        let attributes = serde_json::to_string(&record.attributes)?;
        self.conn.execute(
            r#"
            INSERT INTO media_files (
              location_root, file_name, file_path, attributes, fingerprint, is_duplicate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.location_root,
                record.file_name,
                file_path,
                attributes,
                record.fingerprint,
                record.is_duplicate as i64,
            ],
        )?;
        Ok(())
    }

    fn exists(&self, file_path: &Path) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM media_files WHERE file_path = ?1",
                params![file_path.to_string_lossy()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn all(&self, location_prefix: Option<&str>) -> Result<Vec<MediaRecord>> {
        match location_prefix {
            None => self.query_records(
                r#"
                SELECT location_root, file_name, file_path, attributes, fingerprint, is_duplicate
                FROM media_files
                ORDER BY file_path
                "#,
                [],
            ),
            Some(prefix) => self.query_records(
                r#"
                SELECT location_root, file_name, file_path, attributes, fingerprint, is_duplicate
                FROM media_files
                WHERE file_path = ?1 OR substr(file_path, 1, length(?2)) = ?2
                ORDER BY file_path
                "#,
                params![prefix, as_directory(prefix)],
            ),
        }
    }

    fn distinct_location_roots(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT location_root FROM media_files")?;
        let roots = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(roots)
    }

    fn mark_duplicate(&self, file_path: &Path) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE media_files SET is_duplicate = 1 WHERE file_path = ?1",
            params![file_path.to_string_lossy()],
        )?;
        if changed == 0 {
            return Err(Error::InvalidArgument(format!(
                "no record for {}",
                file_path.to_string_lossy()
            )));
        }
        Ok(())
    }
}

struct RecordRow {
    location_root: String,
    file_name: String,
    file_path: String,
    attributes: String,
    fingerprint: String,
    is_duplicate: bool,
}

impl RecordRow {
    fn into_record(self) -> Result<MediaRecord> {
        let attributes: Attributes = serde_json::from_str(&self.attributes)?;
        Ok(MediaRecord {
            location_root: self.location_root,
            file_name: self.file_name,
            file_path: PathBuf::from(self.file_path),
            attributes,
            fingerprint: self.fingerprint,
            is_duplicate: self.is_duplicate,
        })
    }
}

// `/mnt/a` -> `/mnt/a/`; `/`, `C:\` and other separator-terminated prefixes
// are already directories.
fn as_directory(prefix: &str) -> String {
    if prefix.ends_with('/') || prefix.ends_with('\\') {
        prefix.to_string()
    } else {
        format!("{prefix}{}", std::path::MAIN_SEPARATOR)
    }
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
