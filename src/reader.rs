//! Random-access file reader
//!
//! Reads a single record given the byte offset where it starts. Every call
//! opens its own handle, so concurrent reads never share a cursor.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// Reads records out of the backing file
#[derive(Debug, Clone)]
pub struct FileReader {
    path: PathBuf,
}

impl FileReader {
    /// Point a reader at `path`; fails if it is not a readable regular file
    pub async fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} is not a regular file", path),
            ));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record starting at `offset`, without its line terminator.
    ///
    /// `None` when `offset` is at or past the end of the file.
    pub async fn read_record_at(&self, offset: u64) -> std::io::Result<Option<Vec<u8>>> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }

        chomp(&mut buf);
        Ok(Some(buf))
    }
}

/// Strip one trailing `\n` or `\r\n`
fn chomp(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}
