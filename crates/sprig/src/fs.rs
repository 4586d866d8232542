//! File access through a set of search paths.
//!
//! [`FileManager`] is an explicit service object: the game host creates one,
//! configures its search paths, and passes it to whatever needs to load data
//! (the [`Renderer`](crate::render::Renderer) for images, fonts and shaders,
//! the audio player for sounds). Relative paths are tried against each search
//! path in order; the first hit wins. Absolute paths bypass the search.

use std::fmt;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors that can occur while accessing files.
#[derive(Debug)]
pub enum FsError {
    /// No search path contains the file.
    NotFound(PathBuf),
    /// The file exists but an I/O operation on it failed.
    Io { path: PathBuf, source: std::io::Error },
    /// The handle was opened in a mode that does not allow the operation.
    WrongMode(PathBuf),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound(p) => write!(f, "file not found: {}", p.display()),
            FsError::Io { path, source } => write!(f, "i/o error on {}: {source}", path.display()),
            FsError::WrongMode(p) => write!(f, "operation not allowed by open mode: {}", p.display()),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── File ────────────────────────────────────────────────────────────────

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create or append.
    Append,
}

/// An open file. Closed when dropped, or explicitly via [`FileManager::close`].
#[derive(Debug)]
pub struct File {
    path: PathBuf,
    mode: AccessMode,
    inner: fs::File,
}

impl File {
    /// The resolved path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Length of the file in bytes.
    pub fn size(&self) -> Result<u64, FsError> {
        self.inner
            .metadata()
            .map(|m| m.len())
            .map_err(|source| self.io(source))
    }

    /// Read up to `count` elements of `size` bytes each into `buf`.
    ///
    /// Returns the number of *whole* elements read. A trailing partial element
    /// is consumed but not counted.
    pub fn read(&mut self, buf: &mut Vec<u8>, size: usize, count: usize) -> Result<usize, FsError> {
        if self.mode != AccessMode::Read {
            return Err(FsError::WrongMode(self.path.clone()));
        }
        let wanted = size.saturating_mul(count);
        buf.clear();
        let read = (&mut self.inner).take(wanted as u64).read_to_end(buf);
        read.map_err(|source| self.io(source))?;
        Ok(if size == 0 { 0 } else { buf.len() / size })
    }

    /// Read the whole file from the start.
    pub fn read_all(&mut self) -> Result<Vec<u8>, FsError> {
        if self.mode != AccessMode::Read {
            return Err(FsError::WrongMode(self.path.clone()));
        }
        let mut data = Vec::new();
        let read = match self.inner.seek(SeekFrom::Start(0)) {
            Ok(_) => self.inner.read_to_end(&mut data),
            Err(e) => Err(e),
        };
        read.map_err(|source| self.io(source))?;
        Ok(data)
    }

    /// Read the whole file as UTF-8 text (lossy).
    pub fn read_text(&mut self) -> Result<String, FsError> {
        let data = self.read_all()?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Write raw bytes. Only valid for `Write`/`Append` handles.
    pub fn write(&mut self, data: &[u8]) -> Result<(), FsError> {
        if self.mode == AccessMode::Read {
            return Err(FsError::WrongMode(self.path.clone()));
        }
        self.inner.write_all(data).map_err(|source| self.io(source))
    }

    fn io(&self, source: std::io::Error) -> FsError {
        FsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

// ── FileManager ─────────────────────────────────────────────────────────

/// Resolves paths against an ordered list of search directories.
#[derive(Debug, Clone)]
pub struct FileManager {
    search_paths: Vec<PathBuf>,
}

impl FileManager {
    /// A manager that searches only the current directory.
    pub fn new() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
        }
    }

    /// A manager with the given search paths, tried in order.
    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let search_paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if search_paths.is_empty() {
            return Self::new();
        }
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Append a search path (lowest priority).
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            log::debug!("Added search path {}", path.display());
            self.search_paths.push(path);
        }
    }

    /// Returns `true` if the path was present.
    pub fn remove_search_path(&mut self, path: impl AsRef<Path>) -> bool {
        let before = self.search_paths.len();
        self.search_paths.retain(|p| p != path.as_ref());
        before != self.search_paths.len()
    }

    /// Find the first existing file for `path`.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).is_some()
    }

    /// Open a file. Reads go through the search paths; writes and appends
    /// land in the first search path (or at the absolute path given).
    pub fn open(&self, path: impl AsRef<Path>, mode: AccessMode) -> Result<File, FsError> {
        let path = path.as_ref();
        let (resolved, opened) = match mode {
            AccessMode::Read => {
                let resolved = self
                    .resolve(path)
                    .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
                let opened = fs::File::open(&resolved);
                (resolved, opened)
            }
            AccessMode::Write | AccessMode::Append => {
                let resolved = self.write_path(path);
                let opened = fs::OpenOptions::new()
                    .create(true)
                    .write(mode == AccessMode::Write)
                    .truncate(mode == AccessMode::Write)
                    .append(mode == AccessMode::Append)
                    .open(&resolved);
                (resolved, opened)
            }
        };
        let inner = opened.map_err(|source| FsError::Io {
            path: resolved.clone(),
            source,
        })?;
        Ok(File {
            path: resolved,
            mode,
            inner,
        })
    }

    /// Close a file handle. Equivalent to dropping it.
    pub fn close(&self, file: File) {
        drop(file);
    }

    /// Read a whole file found through the search paths.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, FsError> {
        self.open(path, AccessMode::Read)?.read_all()
    }

    /// Read a whole text file found through the search paths.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Result<String, FsError> {
        self.open(path, AccessMode::Read)?.read_text()
    }

    fn write_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.search_paths.first() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn two_dirs() -> (TempDir, TempDir, FileManager) {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let files = FileManager::with_search_paths([a.path(), b.path()]);
        (a, b, files)
    }

    #[test]
    fn resolve_prefers_earlier_search_path() {
        let (a, b, files) = two_dirs();
        std::fs::write(a.path().join("x.txt"), "first").unwrap();
        std::fs::write(b.path().join("x.txt"), "second").unwrap();
        assert_eq!(files.read_to_string("x.txt").unwrap(), "first");
    }

    #[test]
    fn falls_back_to_later_search_path() {
        let (_a, b, files) = two_dirs();
        std::fs::write(b.path().join("only.bin"), [1u8, 2, 3]).unwrap();
        assert!(files.exists("only.bin"));
        assert_eq!(files.read("only.bin").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_a, _b, files) = two_dirs();
        assert!(matches!(
            files.open("nope.dat", AccessMode::Read),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn read_counts_whole_elements() {
        let (a, _b, files) = two_dirs();
        std::fs::write(a.path().join("data"), [0u8; 10]).unwrap();
        let mut file = files.open("data", AccessMode::Read).unwrap();
        assert_eq!(file.size().unwrap(), 10);
        let mut buf = Vec::new();
        assert_eq!(file.read(&mut buf, 4, 3).unwrap(), 2);
        assert_eq!(buf.len(), 10);
        files.close(file);
    }

    #[test]
    fn write_then_append_lands_in_first_path() {
        let (a, _b, files) = two_dirs();
        let mut out = files.open("log.txt", AccessMode::Write).unwrap();
        out.write(b"one").unwrap();
        drop(out);
        let mut out = files.open("log.txt", AccessMode::Append).unwrap();
        out.write(b"two").unwrap();
        drop(out);
        assert_eq!(std::fs::read_to_string(a.path().join("log.txt")).unwrap(), "onetwo");
    }

    #[test]
    fn write_rejected_on_read_handle() {
        let (a, _b, files) = two_dirs();
        std::fs::write(a.path().join("r.txt"), "r").unwrap();
        let mut file = files.open("r.txt", AccessMode::Read).unwrap();
        assert!(matches!(file.write(b"x"), Err(FsError::WrongMode(_))));
    }

    #[test]
    fn search_paths_are_deduplicated_and_removable() {
        let mut files = FileManager::new();
        files.add_search_path("assets");
        files.add_search_path("assets");
        assert_eq!(files.search_paths().len(), 2);
        assert!(files.remove_search_path("assets"));
        assert!(!files.remove_search_path("assets"));
    }
}
