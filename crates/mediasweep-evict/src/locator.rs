//! Maps remote media references to files under the media root.
//!
//! The media store names files after the media id, with extra files for
//! thumbnails and encrypted variants. A reference matches every file whose
//! name contains its id.

use mediasweep_core::MediaRef;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scan `root` and return every file matching `media_ref`.
/// Malformed references match nothing.
pub fn locate(media_ref: &str, root: &Path) -> Vec<PathBuf> {
    MediaIndex::scan(root).locate(media_ref)
}

/// One walk of the media root, reused for every candidate in a run.
#[derive(Debug, Default)]
pub struct MediaIndex {
    files: Vec<(PathBuf, String)>,
}

impl MediaIndex {
    /// Walk `root` recursively. Unreadable entries are skipped; a missing
    /// root yields an empty index.
    pub fn scan(root: &Path) -> Self {
        if !root.exists() {
            tracing::warn!(root = %root.display(), "media root does not exist");
            return Self::default();
        }
        let files = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                (e.into_path(), name)
            })
            .collect::<Vec<_>>();
        tracing::debug!(root = %root.display(), files = files.len(), "media root indexed");
        Self { files }
    }

    pub fn file_count(&self) -> u64 {
        self.files.len() as u64
    }

    pub fn locate(&self, media_ref: &str) -> Vec<PathBuf> {
        let Some(parsed) = MediaRef::parse(media_ref) else {
            return Vec::new();
        };
        self.files
            .iter()
            .filter(|(_, name)| name.contains(parsed.media_id))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Drop removed files so later lookups do not report them.
    pub fn forget(&mut self, removed: &[PathBuf]) {
        if removed.is_empty() {
            return;
        }
        self.files.retain(|(path, _)| !removed.contains(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, bytes: usize) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn finds_all_variants_of_an_id() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("local_content/ab/cd/abcdEFGH"), 10);
        touch(&root.join("local_thumbnails/ab/cd/abcdEFGH-32-32-image-png"), 1);
        touch(&root.join("remote_content/zz/other"), 1);

        let mut found = locate("mxc://example.org/abcdEFGH", root);
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("local_content/ab/cd/abcdEFGH"));
    }

    #[test]
    fn malformed_reference_matches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("abc"), 1);
        assert!(locate("https://example.org/abc", tmp.path()).is_empty());
        assert!(locate("mxc://example.org", tmp.path()).is_empty());
    }

    #[test]
    fn missing_root_is_empty() {
        let index = MediaIndex::scan(Path::new("/nonexistent/mediasweep/media"));
        assert_eq!(index.file_count(), 0);
        assert!(index.locate("mxc://a/b").is_empty());
    }

    #[test]
    fn cached_index_matches_fresh_scan() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("a/one-xyz"), 1);
        touch(&tmp.path().join("b/xyz.thumb"), 1);
        touch(&tmp.path().join("b/nope"), 1);

        let index = MediaIndex::scan(tmp.path());
        let mut cached = index.locate("mxc://h/xyz");
        let mut fresh = locate("mxc://h/xyz", tmp.path());
        cached.sort();
        fresh.sort();
        assert_eq!(cached, fresh);
        assert_eq!(index.file_count(), 3);
    }

    #[test]
    fn forget_drops_removed_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("m1"), 1);
        let mut index = MediaIndex::scan(tmp.path());
        let found = index.locate("mxc://h/m1");
        index.forget(&found);
        assert!(index.locate("mxc://h/m1").is_empty());
        assert_eq!(index.file_count(), 0);
    }
}
