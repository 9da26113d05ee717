//! Listing of a job's output artifacts in display order.
//!
//! The gallery is rebuilt wholesale from a fresh directory listing on every
//! refresh; entries are never patched in place.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::monitor::has_extension;

/// How artifacts are ordered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GalleryOrder {
    /// Plain byte-wise file name order ("image10" before "image2").
    Lexicographic,
    /// By the first number embedded in the file name, then by name.
    #[default]
    Ordinal,
}

/// One artifact shown in the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Collaborator that displays the artifacts of a finished job.
pub trait Gallery: Send {
    /// Drops every entry currently shown.
    fn clear(&mut self);

    /// Re-enumerates `output_dir` and returns how many entries are shown.
    fn refresh(&mut self, output_dir: &Path) -> usize;

    fn entries(&self) -> &[GalleryEntry];
}

/// Gallery over the files of one extension in a directory.
#[derive(Debug)]
pub struct ArtifactGallery {
    extension: String,
    order: GalleryOrder,
    entries: Vec<GalleryEntry>,
}

impl ArtifactGallery {
    pub fn new(extension: impl Into<String>, order: GalleryOrder) -> Self {
        Self {
            extension: extension.into(),
            order,
            entries: Vec::new(),
        }
    }
}

impl Gallery for ArtifactGallery {
    fn clear(&mut self) {
        self.entries.clear();
    }

    fn refresh(&mut self, output_dir: &Path) -> usize {
        self.entries = list_artifacts(output_dir, &self.extension, self.order);
        self.entries.len()
    }

    fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }
}

/// Lists matching files in `dir`, sorted by `order`. A missing or unreadable
/// directory yields an empty list.
pub fn list_artifacts(dir: &Path, extension: &str, order: GalleryOrder) -> Vec<GalleryEntry> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<GalleryEntry> = read
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .filter(|p| has_extension(p, extension))
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(GalleryEntry { name, path })
        })
        .collect();

    match order {
        GalleryOrder::Lexicographic => entries.sort_by(|a, b| a.name.cmp(&b.name)),
        GalleryOrder::Ordinal => entries.sort_by(|a, b| ordinal_cmp(&a.name, &b.name)),
    }
    entries
}

/// First run of ASCII digits in `name`, if any.
pub fn embedded_ordinal(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// Names with an ordinal come first, ascending; ties and the rest fall back to name order.
fn ordinal_cmp(a: &str, b: &str) -> Ordering {
    match (embedded_ordinal(a), embedded_ordinal(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(entries: &[GalleryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn populate(dir: &Path, files: &[&str]) {
        for f in files {
            fs::write(dir.join(f), b"bmp").unwrap();
        }
    }

    #[test]
    fn ordinal_order_sorts_numbers_numerically() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["image10_gris.bmp", "image2_gris.bmp", "image1_hc.bmp", "image2_blur_k5.bmp"]);
        let entries = list_artifacts(tmp.path(), "bmp", GalleryOrder::Ordinal);
        assert_eq!(
            names(&entries),
            vec!["image1_hc.bmp", "image2_blur_k5.bmp", "image2_gris.bmp", "image10_gris.bmp"]
        );
    }

    #[test]
    fn lexicographic_order_sorts_by_name() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["image10.bmp", "image2.bmp"]);
        let entries = list_artifacts(tmp.path(), "bmp", GalleryOrder::Lexicographic);
        assert_eq!(names(&entries), vec!["image10.bmp", "image2.bmp"]);
    }

    #[test]
    fn names_without_ordinal_go_last() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["cover.bmp", "a3.bmp", "banner.bmp"]);
        let entries = list_artifacts(tmp.path(), "bmp", GalleryOrder::Ordinal);
        assert_eq!(names(&entries), vec!["a3.bmp", "banner.bmp", "cover.bmp"]);
    }

    #[test]
    fn other_extensions_are_skipped() {
        let tmp = TempDir::new().unwrap();
        populate(tmp.path(), &["a1.bmp", "a2.txt", "final_log.txt"]);
        let entries = list_artifacts(tmp.path(), "bmp", GalleryOrder::Ordinal);
        assert_eq!(names(&entries), vec!["a1.bmp"]);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(list_artifacts(&tmp.path().join("nope"), "bmp", GalleryOrder::Ordinal).is_empty());
    }

    #[test]
    fn refresh_replaces_previous_entries() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        populate(first.path(), &["x1.bmp", "x2.bmp"]);
        populate(second.path(), &["y7.bmp"]);

        let mut gallery = ArtifactGallery::new("bmp", GalleryOrder::Ordinal);
        assert_eq!(gallery.refresh(first.path()), 2);
        assert_eq!(gallery.refresh(second.path()), 1);
        assert_eq!(names(gallery.entries()), vec!["y7.bmp"]);

        gallery.clear();
        assert!(gallery.entries().is_empty());
    }

    #[test]
    fn embedded_ordinal_takes_first_digit_run() {
        assert_eq!(embedded_ordinal("image12_blur_k55.bmp"), Some(12));
        assert_eq!(embedded_ordinal("cover.bmp"), None);
        assert_eq!(embedded_ordinal("007.bmp"), Some(7));
    }
}
