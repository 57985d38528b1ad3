//! Scoped scratch directories for tools that want file paths.
//!
//! `tesseract` and `pdftotext` both insist on reading from (and writing to)
//! the filesystem, so every extraction gets its own uniquely named directory.
//! The directory and everything in it are deleted when the [`ScratchDir`] is
//! dropped, which covers early returns, errors and panics.

use std::{fs::File, io::Write as _};

use tempfile::TempDir;

use crate::prelude::*;

/// A uniquely named temporary directory, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a new scratch directory named `<prefix>XXXXXX`.
    ///
    /// If `parent` is `None`, the system temporary directory is used.
    pub fn new(prefix: &str, parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .with_context(|| format!("cannot create {prefix} scratch directory"))?;
        trace!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    /// The path to the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `data` to a new file called `name` inside the directory, and
    /// return its path.
    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        let mut file = File::create(&path)
            .with_context(|| format!("cannot create scratch file {name}"))?;
        file.write_all(data)
            .with_context(|| format!("cannot write scratch file {name}"))?;
        file.flush()
            .with_context(|| format!("cannot flush scratch file {name}"))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    fn entries(path: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_scratch_dir_is_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let scratch = ScratchDir::new("test", Some(parent.path())).unwrap();
        let file = scratch.write_file("input.pdf", b"hello").unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), b"hello");
        assert_eq!(entries(parent.path()).len(), 1);

        drop(scratch);
        assert!(entries(parent.path()).is_empty());
        assert!(!file.exists());
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let parent = TempDir::new().unwrap();
        let a = ScratchDir::new("same", Some(parent.path())).unwrap();
        let b = ScratchDir::new("same", Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_scratch_dir_is_removed_on_panic() {
        let parent = TempDir::new().unwrap();
        let parent_path = parent.path().to_owned();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let scratch = ScratchDir::new("test", Some(&parent_path)).unwrap();
            scratch.write_file("input.png", b"not really").unwrap();
            panic!("extraction blew up");
        }));
        assert!(result.is_err());
        assert!(entries(parent.path()).is_empty());
    }
}
