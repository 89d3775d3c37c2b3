//! Where the bytes come from.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

/// Supplies the complete input buffer before parsing starts.
///
/// The parser only ever works on a contiguous, fully resident buffer. Any I/O, retrying or
/// fetching happens in the implementation of this trait.
pub trait ByteSource {
    fn load(&mut self) -> Result<Vec<u8>, LoadError>;
}

/// Reads the whole contents of a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn load(&mut self) -> Result<Vec<u8>, LoadError> {
        log::debug!("loading {}", self.path.display());
        fs::read(&self.path).map_err(|io| LoadError {
            path: Some(self.path.clone()),
            io,
        })
    }
}

impl ByteSource for Vec<u8> {
    fn load(&mut self) -> Result<Vec<u8>, LoadError> {
        Ok(self.clone())
    }
}

impl ByteSource for &[u8] {
    fn load(&mut self) -> Result<Vec<u8>, LoadError> {
        Ok(self.to_vec())
    }
}

/// A [`ByteSource`] failed to produce its bytes.
#[derive(Debug)]
pub struct LoadError {
    path: Option<PathBuf>,
    io: io::Error,
}

impl LoadError {
    /// Returns the path of the file that failed to load, if the source was a file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl From<io::Error> for LoadError {
    fn from(io: io::Error) -> Self {
        Self { path: None, io }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "failed to load '{}': {}", path.display(), self.io),
            None => write!(f, "failed to load input: {}", self.io),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.io)
    }
}
