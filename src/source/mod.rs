//! Component A: Byte Source.
//!
//! A buffered, chunked reader producing a lazy sequence of byte buffers.
//! No seek is required or exposed; the tokenizer and everything downstream
//! consumes this as a strict forward stream.

use std::fs::File;
use std::io::{self, Read, Stdin};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Fatal read failure. The only error kind in the whole pipeline that
/// aborts the stream (spec §4.A, §7).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A cooperative cancellation flag. Cloning shares the same underlying
/// signal; triggering it from any clone causes `next_chunk` to drain the
/// current chunk and then report end-of-stream, matching the "drained,
/// not more than one chunk late" guarantee in spec §5.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The outcome of a single `next_chunk` call.
pub enum Chunk {
    /// A buffer of bytes read from the source. May be shorter than the
    /// configured chunk size only at end-of-stream.
    Data(Vec<u8>),
    /// The source is exhausted, or cancellation drained the last chunk.
    End,
}

/// Buffered chunked byte reader. No seek; reports total bytes read so far.
pub struct ByteSource<R: Read> {
    reader: R,
    chunk_size: usize,
    total_bytes: u64,
    cancel: CancellationToken,
    path_label: String,
}

impl<R: Read> ByteSource<R> {
    pub fn new(reader: R, chunk_size: usize, path_label: impl Into<String>) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            total_bytes: 0,
            cancel: CancellationToken::new(),
            path_label: path_label.into(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Total bytes successfully read so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Read the next chunk. Returns `Chunk::End` at EOF or once
    /// cancellation has been observed (after draining any bytes already
    /// in flight for this call).
    pub fn next_chunk(&mut self) -> Result<Chunk, SourceError> {
        if self.cancel.is_cancelled() {
            return Ok(Chunk::End);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(SourceError::Io {
                        path: self.path_label.clone(),
                        source,
                    })
                }
            }
        }

        if filled == 0 {
            return Ok(Chunk::End);
        }

        buf.truncate(filled);
        self.total_bytes += filled as u64;
        Ok(Chunk::Data(buf))
    }
}

impl ByteSource<File> {
    pub fn from_path(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, SourceError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(file, chunk_size, path.display().to_string()))
    }
}

impl ByteSource<Stdin> {
    pub fn from_stdin(chunk_size: usize) -> Self {
        Self::new(io::stdin(), chunk_size, "<stdin>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_all_bytes_across_chunk_boundaries() {
        let data = vec![7u8; 200_000];
        let mut source = ByteSource::new(Cursor::new(data.clone()), 64 * 1024, "<mem>");
        let mut collected = Vec::new();
        loop {
            match source.next_chunk().unwrap() {
                Chunk::Data(bytes) => collected.extend_from_slice(&bytes),
                Chunk::End => break,
            }
        }
        assert_eq!(collected, data);
        assert_eq!(source.total_bytes(), data.len() as u64);
    }

    #[test]
    fn cancellation_yields_end_on_next_call() {
        let data = vec![1u8; 1024];
        let mut source = ByteSource::new(Cursor::new(data), 16, "<mem>");
        let token = source.cancellation_token();
        // drain one chunk, then cancel
        let _ = source.next_chunk().unwrap();
        token.cancel();
        match source.next_chunk().unwrap() {
            Chunk::End => {}
            Chunk::Data(_) => panic!("expected End after cancellation"),
        }
    }

    #[test]
    fn empty_source_yields_end_immediately() {
        let mut source = ByteSource::new(Cursor::new(Vec::<u8>::new()), 64, "<mem>");
        match source.next_chunk().unwrap() {
            Chunk::End => {}
            Chunk::Data(_) => panic!("expected End for empty source"),
        }
    }
}
