use mediadupe_core::dedup::{DedupSession, DuplicateGroup};
use mediadupe_core::{IngestReport, MediaRecord, PurgeReport};

const SHORT_HASH: usize = 8;

pub fn ingest_report(report: &IngestReport) {
    let stats = &report.stats;
    println!("Path: {}", report.root.display());
    println!(
        "  Total media files: {} | EXIF copied: {} | New: {} | Already catalogued: {} | Skipped: {}",
        stats.files_seen, stats.with_attributes, stats.inserted, stats.already_present, stats.skipped
    );
}

pub fn page(session: &DedupSession) {
    let summary = session.summary();
    if summary.groups == 0 {
        println!("No duplicates found.");
        return;
    }

    println!(
        "Page {} of {} | {} groups | {} pending | {} already purged",
        session.page_index() + 1,
        session.total_pages(),
        summary.groups,
        summary.pending,
        summary.purged
    );
    let offset = session.page_offset();
    for (i, group) in session.current_page().iter().enumerate() {
        self::group(offset + i + 1, group, session.keeper_for(group));
    }
}

pub fn group(number: usize, group: &DuplicateGroup, keeper: Option<usize>) {
    println!();
    println!("Group {number} (hash: {}...)", short_hash(&group.fingerprint));
    for (idx, member) in group.members.iter().enumerate() {
        let marker = if member.is_duplicate {
            "purged"
        } else if Some(idx) == keeper {
            "keep"
        } else {
            ""
        };
        println!("  [{}] {:<6} {}", idx + 1, marker, member.file_path.display());
    }
}

pub fn purge_report(report: &PurgeReport) {
    println!(
        "Kept: {} | Purged: {} | Already purged: {} | Copy failed: {} | Mark failed: {}",
        report.kept, report.marked, report.already_purged, report.copy_failed, report.mark_failed
    );
}

pub fn records(records: &[MediaRecord]) {
    if records.is_empty() {
        println!("No metadata found in the database.");
        return;
    }

    let header = format!("{:30} | {:40} | {:16} | {:20}", "File Name", "Path", "Hash", "EXIF Keys");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for record in records {
        let keys: Vec<&str> = record.attributes.keys().map(String::as_str).collect();
        let path = record.file_path_str();
        println!(
            "{:30} | {:40} | {:16} | {:20}{}",
            truncate(&record.file_name, 30),
            truncate(&path, 40),
            truncate(&record.fingerprint, 16),
            truncate(&keys.join(", "), 20),
            if record.is_duplicate { " (purged)" } else { "" }
        );
    }
}

pub fn member_label(member: &MediaRecord) -> String {
    if member.is_duplicate {
        format!("{} (purged)", member.file_path.display())
    } else {
        member.file_path.display().to_string()
    }
}

fn short_hash(fingerprint: &str) -> &str {
    truncate(fingerprint, SHORT_HASH)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
