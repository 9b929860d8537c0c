//! File sink implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::sink::Sink;
use crate::SinkError;

/// A sink that writes merged bytes to a file.
///
/// The file is opened in `on_start`, so a path that cannot be created
/// aborts the merge before any source is drained. Writes go through a
/// `BufWriter` that is flushed in `on_stop`.
///
/// # Example
///
/// ```no_run
/// use stream_merge::FileSink;
///
/// let sink = FileSink::create("output");
/// // Use with the StreamMerge builder...
/// ```
pub struct FileSink {
    name: String,
    path: PathBuf,
    append: bool,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl FileSink {
    /// Creates a sink that truncates `path` when the merge starts.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self::with_mode(path.as_ref(), false)
    }

    /// Creates a sink that appends to `path`, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Self {
        Self::with_mode(path.as_ref(), true)
    }

    fn with_mode(path: &Path, append: bool) -> Self {
        Self {
            name: format!("file:{}", path.display()),
            path: path.to_path_buf(),
            append,
            writer: None,
            bytes_written: 0,
        }
    }

    /// Returns the destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self) -> Result<(), SinkError> {
        let file = if self.append {
            OpenOptions::new().create(true).append(true).open(&self.path)
        } else {
            File::create(&self.path)
        }
        .map_err(|e| SinkError::file_error(&self.path, e))?;

        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        tracing::trace!("FileSink {}: writing {} bytes", self.name, bytes.len());

        let writer = self.writer.as_mut().ok_or(SinkError::NotInitialized)?;
        writer
            .write_all(bytes)
            .map_err(|e| SinkError::file_error(&self.path, e))?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }
        Ok(())
    }
}
