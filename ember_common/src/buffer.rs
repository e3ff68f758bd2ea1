//! Append-only binary blob writer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("failed to open {path}: {err}")]
    Open {
        path: String,
        err: std::io::Error,
    },
    #[error("failed to read {len} bytes at offset {offset} from {path}: {err}")]
    Read {
        path: String,
        offset: u64,
        len: usize,
        err: std::io::Error,
    },
    #[error("failed to write {path}: {err}")]
    Write {
        path: String,
        err: std::io::Error,
    },
}

/// The output binary blob.
///
/// Bytes are only ever appended; a range returned by [`Buffer::write`] stays
/// valid at that offset until the buffer is dropped.
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Appends `bytes` and returns the offset they were written at.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Appends `len` bytes copied from `path` at `offset` and returns the
    /// offset they were written at.
    ///
    /// Used to splice cached asset ranges out of the previous build's blob
    /// without decoding them.
    pub fn write_from_file(
        &mut self,
        path: &Path,
        offset: u64,
        len: usize,
    ) -> Result<usize, BufferError> {
        let display = path.display().to_string();

        let mut file = File::open(path).map_err(|err| BufferError::Open {
            path: display.clone(),
            err,
        })?;

        let mut bytes = vec![0; len];
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut bytes))
            .map_err(|err| BufferError::Read {
                path: display,
                offset,
                len,
                err,
            })?;

        Ok(self.write(&bytes))
    }

    pub fn save(&self, path: &Path) -> Result<(), BufferError> {
        let mut file = File::create(path).map_err(|err| BufferError::Write {
            path: path.display().to_string(),
            err,
        })?;
        file.write_all(&self.data).map_err(|err| BufferError::Write {
            path: path.display().to_string(),
            err,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Buffer;

    #[test]
    fn write_returns_offsets() {
        let mut buffer = Buffer::new();
        assert_eq!(buffer.write(&[1, 2, 3]), 0);
        assert_eq!(buffer.write(&[4, 5]), 3);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn write_from_file_copies_range() {
        let dir = std::env::temp_dir().join("ember_buffer_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        std::fs::write(&path, [0, 1, 2, 3, 4, 5, 6, 7]).unwrap();

        let mut buffer = Buffer::new();
        let offset = buffer.write_from_file(&path, 2, 4).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(buffer.as_slice(), &[2, 3, 4, 5]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_from_file_rejects_short_range() {
        let dir = std::env::temp_dir().join("ember_buffer_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        std::fs::write(&path, [0, 1]).unwrap();

        let mut buffer = Buffer::new();
        assert!(buffer.write_from_file(&path, 0, 16).is_err());

        std::fs::remove_file(&path).unwrap();
    }
}
