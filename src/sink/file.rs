//! Serialization sinks: blackhole, console, JSON array and JSON Lines
//!
//! File sinks write one output per input file; an optional compression
//! layer (gzip or bz2) wraps the destination. Closing flushes and
//! finalizes the compressor, which is required for a valid archive.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;

use crate::errors::Result;
use crate::models::Record;
use crate::sink::Compression;

/// Destination writer with an explicit finish step.
enum CompressedWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Bz2(BzEncoder<BufWriter<File>>),
}

impl CompressedWriter {
    fn create(path: &Path, compression: Compression) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(match compression {
            Compression::None => CompressedWriter::Plain(file),
            Compression::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(file, flate2::Compression::default()))
            }
            Compression::Bz2 => {
                CompressedWriter::Bz2(BzEncoder::new(file, bzip2::Compression::default()))
            }
        })
    }

    fn finish(self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(mut file) => file.flush(),
            CompressedWriter::Gzip(encoder) => encoder.finish()?.flush(),
            CompressedWriter::Bz2(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(w) => w.write(buf),
            CompressedWriter::Gzip(w) => w.write(buf),
            CompressedWriter::Bz2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(w) => w.flush(),
            CompressedWriter::Gzip(w) => w.flush(),
            CompressedWriter::Bz2(w) => w.flush(),
        }
    }
}

/// Pretty-print each record to standard output.
pub fn write_console(record: &Record) {
    match record {
        Record::Artist(a) => println!("{a:?}"),
        Record::Label(l) => println!("{l:?}"),
        Record::MasterRelease(m) => println!("{m:?}"),
        Record::Release(r) => println!("{r:?}"),
    }
}

/// Single JSON array: `[` on open, comma-separated objects, closing
/// bracket on close. The output is only valid JSON once closed.
pub struct JsonSink {
    out: CompressedWriter,
    path: PathBuf,
    first: bool,
}

impl JsonSink {
    pub fn create(path: &Path, compression: Compression) -> Result<JsonSink> {
        let mut out = CompressedWriter::create(path, compression)?;
        out.write_all(b"[\n")?;
        Ok(JsonSink {
            out,
            path: path.to_path_buf(),
            first: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        if !self.first {
            self.out.write_all(b",\n")?;
        }
        self.first = false;
        serde_json::to_writer(&mut self.out, record)?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.out.write_all(b"\n]\n")?;
        self.out.finish()?;
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonlSink {
    out: CompressedWriter,
    path: PathBuf,
}

impl JsonlSink {
    pub fn create(path: &Path, compression: Compression) -> Result<JsonlSink> {
        Ok(JsonlSink {
            out: CompressedWriter::create(path, compression)?,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.out.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artist;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn artist(id: u64, name: &str) -> Record {
        Record::Artist(Artist {
            id,
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_json_array_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut sink = JsonSink::create(&path, Compression::None).unwrap();
        sink.write(&artist(1, "A")).unwrap();
        sink.write(&artist(2, "B")).unwrap();
        sink.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n"));
        assert!(content.ends_with("\n]\n"));
        assert!(content.contains(",\n"));

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["id"], 1);
    }

    #[test]
    fn test_empty_json_array_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");

        let sink = JsonSink::create(&path, Compression::None).unwrap();
        sink.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut sink = JsonlSink::create(&path, Compression::None).unwrap();
        sink.write(&artist(1, "A")).unwrap();
        sink.write(&artist(2, "B")).unwrap();
        sink.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["name"], "A");
        assert!(first["real_name"].is_null());
    }

    #[test]
    fn test_gzip_compression_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl.gz");

        let mut sink = JsonlSink::create(&path, Compression::Gzip).unwrap();
        sink.write(&artist(1, "A")).unwrap();
        sink.close().unwrap();

        let mut decoder = GzDecoder::new(File::open(&path).unwrap());
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert!(content.contains("\"name\":\"A\""));
    }

    #[test]
    fn test_bz2_writer_produces_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl.bz2");

        let mut sink = JsonlSink::create(&path, Compression::Bz2).unwrap();
        sink.write(&artist(1, "A")).unwrap();
        sink.close().unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }
}
