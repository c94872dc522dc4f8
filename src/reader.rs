//! Decompressing input reader
//!
//! Opens a gzipped dump and exposes the decompressed byte stream together
//! with the position in the *compressed* file, which is what byte-based
//! progress is computed from (the decompressed size is unknown upfront).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::GzDecoder;

/// Shared compressed-offset counter. Cloning is cheap; the handle stays
/// readable after the reader itself has been consumed by the extractor.
#[derive(Debug, Clone, Default)]
pub struct ByteProgress(Arc<AtomicU64>);

impl ByteProgress {
    /// Compressed bytes consumed so far.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// File wrapper that counts every byte handed to the decompressor.
#[derive(Debug)]
struct CountingFile {
    inner: File,
    counter: Arc<AtomicU64>,
}

impl Read for CountingFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Gzip reader over one dump file.
///
/// Owns the file handle and the decompressor; both are released when the
/// reader is dropped, on every exit path.
#[derive(Debug)]
pub struct DumpReader {
    stream: BufReader<GzDecoder<BufReader<CountingFile>>>,
    progress: ByteProgress,
    total_size: u64,
}

impl DumpReader {
    /// Open a gzipped dump file.
    pub fn open(path: &Path) -> io::Result<DumpReader> {
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
        let total_size = file.metadata()?.len();

        let progress = ByteProgress::default();
        let counting = CountingFile {
            inner: file,
            counter: Arc::clone(&progress.0),
        };
        let decoder = GzDecoder::new(BufReader::new(counting));

        Ok(DumpReader {
            stream: BufReader::new(decoder),
            progress,
            total_size,
        })
    }

    /// Compressed bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.progress.get()
    }

    /// Compressed file size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Handle for reading the compressed offset after the reader has been
    /// moved into the extractor.
    pub fn progress(&self) -> ByteProgress {
        self.progress.clone()
    }
}

impl Read for DumpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl BufRead for DumpReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.stream.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.stream.consume(amt)
    }
}
