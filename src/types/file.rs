//! FILE values: encode-side sources and decode-side temporaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;

/// A FILE value.
///
/// On the encode side this references a file on disk whose body is streamed
/// into the packet. On the decode side it owns a temporary spill file that
/// lives until the value is dropped or the caller claims it with
/// [`FileData::save_to`].
#[derive(Debug, Clone)]
pub struct FileData {
    name: String,
    length: u64,
    source: FileSource,
}

#[derive(Debug, Clone)]
enum FileSource {
    /// Local file read at encode time.
    Path(PathBuf),
    /// Temporary spill produced by the decoder. Shared so that values stay
    /// cloneable; the underlying file is removed when the last clone drops.
    Temp(Arc<TempPath>),
}

impl FileData {
    /// Creates an encode-side file value. The wire name is the final path
    /// component; the body is read from `path` when the value is encoded.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            length: 0,
            source: FileSource::Path(path),
        }
    }

    pub(crate) fn decoded(name: String, length: u64, tmp: TempPath) -> Self {
        Self {
            name,
            length,
            source: FileSource::Temp(Arc::new(tmp)),
        }
    }

    /// The file name as carried on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body length in bytes. Zero for encode-side values until they are
    /// encoded (the length is taken from the filesystem at that point).
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The path currently backing this value: the source file on the encode
    /// side, the temporary spill on the decode side.
    pub fn path(&self) -> &Path {
        match &self.source {
            FileSource::Path(p) => p,
            FileSource::Temp(t) => t,
        }
    }

    /// Moves the decoded body into `dir` under the value's wire name and
    /// returns the destination path.
    ///
    /// A rename is attempted first; across filesystems this falls back to
    /// copy + unlink. Only the final component of the wire name is used, so
    /// a hostile name cannot escape `dir`.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let file_name = Path::new(&self.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("llsnfile"));
        let dest = dir.as_ref().join(file_name);

        let src = self.path().to_path_buf();
        if tokio::fs::rename(&src, &dest).await.is_err() {
            // Probably an invalid cross-device link.
            tokio::fs::copy(&src, &dest).await?;
            tokio::fs::remove_file(&src).await?;
        }
        Ok(dest)
    }

    /// Reads the full body into memory.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

impl PartialEq for FileData {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.length == other.length
    }
}
