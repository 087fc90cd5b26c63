//! Packages handed to a scan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const PACKAGE_EXTENSION: &str = "apk";

/// One installed application: an identifier plus its archive bytes.
pub trait PackageHandle {
    /// Name used when reporting this package.
    fn id(&self) -> &str;

    fn read_archive(&self) -> io::Result<Vec<u8>>;
}

/// A package archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: String,
    pub path: PathBuf,
}

impl InstalledPackage {
    /// Identified by the file stem, e.g. `com.example.app` for
    /// `com.example.app.apk`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, path }
    }
}

impl PackageHandle for InstalledPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_archive(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// A package whose archive is already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPackage {
    pub id: String,
    pub archive: Vec<u8>,
}

impl LoadedPackage {
    pub fn new(id: impl Into<String>, archive: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            archive,
        }
    }
}

impl PackageHandle for LoadedPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_archive(&self) -> io::Result<Vec<u8>> {
        Ok(self.archive.clone())
    }
}

fn is_package(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
        .unwrap_or(false)
}

/// Collect `.apk` files from the given paths (expanding directories).
///
/// Explicitly named files are taken whatever their extension. Results are
/// sorted by path and deduplicated.
pub fn collect_packages(paths: &[PathBuf]) -> Vec<InstalledPackage> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
                let p = entry.into_path();
                if p.is_file() && is_package(&p) {
                    files.push(p);
                }
            }
        }
    }

    files.sort();
    files.dedup();
    files.into_iter().map(InstalledPackage::from_path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_file_stem() {
        let pkg = InstalledPackage::from_path("/data/app/com.example.notes.apk");
        assert_eq!(pkg.id(), "com.example.notes");
    }

    #[test]
    fn test_collect_walks_directories_for_apks() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.apk"), b"x").unwrap();
        fs::write(nested.join("a.APK"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let found = collect_packages(&[dir.path().to_path_buf()]);
        let ids: Vec<_> = found.iter().map(|p| p.id().to_owned()).collect();
        assert_eq!(found.len(), 2);
        assert!(ids.contains(&"a".to_owned()));
        assert!(ids.contains(&"b".to_owned()));
    }

    #[test]
    fn test_collect_keeps_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.zip");
        fs::write(&file, b"x").unwrap();

        let found = collect_packages(&[file.clone(), file.clone()]);
        assert_eq!(found, vec![InstalledPackage::from_path(file)]);
    }

    #[test]
    fn test_missing_package_read_fails() {
        let pkg = InstalledPackage::from_path("/nonexistent/app.apk");
        assert!(pkg.read_archive().is_err());
    }
}
