use std::path::{Component, Path};

/// Returns the volume a path lives on: the drive prefix on Windows, the mount
/// point on Linux, and the filesystem root elsewhere.
pub fn location_root_for(path: &Path) -> String {
    #[cfg(windows)]
    {
        if let Some(Component::Prefix(prefix)) = path.components().next() {
            return prefix.as_os_str().to_string_lossy().to_string();
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(mount) = linux::mount_point_for(path) {
            return mount;
        }
    }

    first_component(path)
}

fn first_component(path: &Path) -> String {
    match path.components().next() {
        Some(Component::Prefix(prefix)) => prefix.as_os_str().to_string_lossy().to_string(),
        Some(Component::Normal(name)) => name.to_string_lossy().to_string(),
        _ => "/".to_string(),
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;
    use std::path::{Path, PathBuf};

    pub fn mount_point_for(path: &Path) -> Option<String> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mountinfo = fs::read_to_string("/proc/self/mountinfo").ok()?;
        best_mount_point(&mountinfo, &canonical).map(|p| p.to_string_lossy().to_string())
    }

    pub(super) fn best_mount_point(mountinfo: &str, path: &Path) -> Option<PathBuf> {
        let mut best: Option<PathBuf> = None;

        for line in mountinfo.lines() {
            let Some(mount_point) = parse_mountinfo_line(line) else {
                continue;
            };

            if !path.starts_with(&mount_point) {
                continue;
            }

            let replace = match &best {
                None => true,
                Some(cur) => mount_point.as_os_str().len() > cur.as_os_str().len(),
            };
            if replace {
                best = Some(mount_point);
            }
        }

        best
    }

    fn parse_mountinfo_line(line: &str) -> Option<PathBuf> {
        let (left, _) = line.split_once(" - ")?;
        let left_fields: Vec<&str> = left.split_whitespace().collect();
        if left_fields.len() < 5 {
            return None;
        }
        Some(PathBuf::from(unescape_mountinfo(left_fields[4])))
    }

    fn unescape_mountinfo(s: &str) -> String {
        s.replace(r"\040", " ")
            .replace(r"\011", "\t")
            .replace(r"\012", "\n")
            .replace(r"\134", r"\")
    }
}
