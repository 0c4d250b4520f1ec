use std::path::Path;

use crate::models::MediaKind;

/// Classifies a file as image or video, or `None` for anything else.
///
/// The extension decides when it maps to a known MIME type; files with an
/// unknown or missing extension are sniffed by content.
pub fn classify(path: &Path) -> Option<MediaKind> {
    let guessed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| mime_guess::from_ext(ext).first());

    match guessed {
        Some(mime) => kind_for_mime(mime.essence_str()),
        None => sniff(path),
    }
}

pub fn kind_for_mime(mime: &str) -> Option<MediaKind> {
    if mime.starts_with("image/") {
        Some(MediaKind::Image)
    } else if mime.starts_with("video/") {
        Some(MediaKind::Video)
    } else {
        None
    }
}

fn sniff(path: &Path) -> Option<MediaKind> {
    let kind = infer::get_from_path(path).ok().flatten()?;
    kind_for_mime(kind.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify(Path::new("/x/IMG_0001.JPG")), Some(MediaKind::Image));
        assert_eq!(classify(Path::new("/x/photo.png")), Some(MediaKind::Image));
        assert_eq!(classify(Path::new("/x/clip.mp4")), Some(MediaKind::Video));
        assert_eq!(classify(Path::new("/x/clip.mov")), Some(MediaKind::Video));
        assert_eq!(classify(Path::new("/x/notes.txt")), None);
        assert_eq!(classify(Path::new("/x/report.pdf")), None);
    }

    #[test]
    fn sniffs_files_without_a_known_extension() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("exported");
        fs::write(&png, [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0]).unwrap();
        let text = dir.path().join("README");
        fs::write(&text, b"just words").unwrap();

        assert_eq!(classify(&png), Some(MediaKind::Image));
        assert_eq!(classify(&text), None);
        assert_eq!(classify(&dir.path().join("missing")), None);
    }
}
