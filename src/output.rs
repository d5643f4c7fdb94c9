// alnfmt: Alignment report formatting and aligned/unaligned read partitioning.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Ownership of the output files of one run.
//!
//! Each [OutputKind] is opened at most once, in append mode, and stays open
//! until [OutputStreams::finish] is called. Writing to a kind that was not
//! opened is an error.
//!
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

type E = Box<dyn std::error::Error>;

/// Destinations written during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Reads with an alignment.
    Aligned,
    /// Reads without an alignment.
    Other,
    /// Candidates for de novo clustering.
    Denovo,
    /// Alignment report (pairwise, tabular or SAM).
    Report,
    Biom,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            OutputKind::Aligned => "aligned",
            OutputKind::Other => "other",
            OutputKind::Denovo => "denovo",
            OutputKind::Report => "report",
            OutputKind::Biom => "biom",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct OutputStreamUnavailable {
    pub target: OutputKind,
    /// File that could not be opened, if any.
    pub path: Option<String>,
    reason: Option<String>,
}

impl OutputStreamUnavailable {
    /// Failure to open `path` as the stream for `target`.
    pub fn open_failed(
        target: OutputKind,
        path: &Path,
        reason: &std::io::Error,
    ) -> Self {
        OutputStreamUnavailable{ target, path: Some(path.display().to_string()), reason: Some(reason.to_string()) }
    }
}

impl std::fmt::Display for OutputStreamUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (&self.path, &self.reason) {
            (Some(path), Some(reason)) => write!(f, "cannot open {} output {}: {}", self.target, path, reason),
            (Some(path), None) => write!(f, "cannot open {} output {}", self.target, path),
            _ => write!(f, "output stream '{}' is not open", self.target),
        }
    }
}

impl std::error::Error for OutputStreamUnavailable {}

enum StreamWriter {
    Plain(Box<dyn Write>),
    Gzip(GzEncoder<Box<dyn Write>>),
}

impl StreamWriter {
    fn finish(self) -> Result<(), E> {
        match self {
            StreamWriter::Plain(mut conn) => conn.flush()?,
            StreamWriter::Gzip(encoder) => encoder.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            StreamWriter::Plain(conn) => conn.write(buf),
            StreamWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            StreamWriter::Plain(conn) => conn.flush(),
            StreamWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}

struct OutputStream {
    name: String,
    writer: StreamWriter,
}

/// Open output streams keyed by [OutputKind].
#[derive(Default)]
pub struct OutputStreams {
    streams: HashMap<OutputKind, OutputStream>,
}

impl OutputStreams {
    pub fn new() -> Self {
        OutputStreams::default()
    }

    /// Open `path` in append mode as the stream for `kind`
    ///
    /// If `compress` is true the stream is written as gzip.
    ///
    /// Opening a kind that is already open replaces the previous stream
    /// after finishing it.
    pub fn open(
        &mut self,
        kind: OutputKind,
        path: &Path,
        compress: bool,
    ) -> Result<(), E> {
        let file = OpenOptions::new().create(true).append(true).open(path)
            .map_err(|e| OutputStreamUnavailable::open_failed(kind, path, &e))?;
        log::debug!("Opened {} output {}", kind, path.display());
        let conn: Box<dyn Write> = Box::new(BufWriter::new(file));
        self.insert_writer(kind, &path.to_string_lossy(), conn, compress)
    }

    /// Use `conn` as the stream for `kind`.
    pub fn insert<W: Write + 'static>(
        &mut self,
        kind: OutputKind,
        name: &str,
        conn: W,
    ) -> Result<(), E> {
        self.insert_writer(kind, name, Box::new(conn), false)
    }

    fn insert_writer(
        &mut self,
        kind: OutputKind,
        name: &str,
        conn: Box<dyn Write>,
        compress: bool,
    ) -> Result<(), E> {
        let writer = if compress {
            StreamWriter::Gzip(GzEncoder::new(conn, Compression::default()))
        } else {
            StreamWriter::Plain(conn)
        };
        if let Some(previous) = self.streams.insert(kind, OutputStream{ name: name.to_string(), writer }) {
            previous.writer.finish()?;
        }
        Ok(())
    }

    /// Returns the writer for `kind`.
    ///
    /// Terminates with [OutputStreamUnavailable] if `kind` was not opened.
    pub fn get(
        &mut self,
        kind: OutputKind,
    ) -> Result<&mut dyn Write, E> {
        match self.streams.get_mut(&kind) {
            Some(stream) => Ok(&mut stream.writer as &mut dyn Write),
            None => Err(Box::new(OutputStreamUnavailable{ target: kind, path: None, reason: None })),
        }
    }

    /// Name of the file behind `kind`, if it is open.
    pub fn name(
        &self,
        kind: OutputKind,
    ) -> Option<&str> {
        self.streams.get(&kind).map(|stream| stream.name.as_str())
    }

    pub fn is_open(
        &self,
        kind: OutputKind,
    ) -> bool {
        self.streams.contains_key(&kind)
    }

    /// Flush and close every stream.
    ///
    /// Gzip streams are terminated with their trailer.
    pub fn finish(
        &mut self,
    ) -> Result<(), E> {
        for (kind, stream) in self.streams.drain() {
            log::debug!("Closing {} output {}", kind, stream.name);
            stream.writer.finish()?;
        }
        Ok(())
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn temp_path(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("alnfmt-output-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn write_to_unopened_stream() {
        use super::{OutputKind, OutputStreams};

        let mut streams = OutputStreams::new();

        assert!(!streams.is_open(OutputKind::Aligned));
        let got = streams.get(OutputKind::Aligned);

        assert!(got.is_err());
        assert_eq!(got.err().unwrap().to_string(), "output stream 'aligned' is not open");
    }

    #[test]
    fn error_names_path_of_unopenable_file() {
        use std::path::Path;
        use super::{OutputKind, OutputStreams};

        let path = Path::new("/nonexistent-alnfmt-dir/x.fa");
        let mut streams = OutputStreams::new();

        let got = streams.open(OutputKind::Aligned, path, false);

        assert!(got.is_err());
        let message = got.err().unwrap().to_string();
        assert!(message.starts_with("cannot open aligned output /nonexistent-alnfmt-dir/x.fa: "));
        assert!(!streams.is_open(OutputKind::Aligned));
    }

    #[test]
    fn open_appends_to_existing_file() {
        use std::io::Write;
        use super::{OutputKind, OutputStreams};

        let path = temp_path("append.fa");
        std::fs::write(&path, b">r0\nAAAA\n").unwrap();

        let mut streams = OutputStreams::new();
        streams.open(OutputKind::Other, &path, false).unwrap();
        streams.get(OutputKind::Other).unwrap().write_all(b">r1\nACGT\n").unwrap();
        streams.finish().unwrap();

        let got = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(got, b">r0\nAAAA\n>r1\nACGT\n");
        assert!(!streams.is_open(OutputKind::Other));
    }

    #[test]
    fn open_compressed_stream() {
        use std::io::{Read, Write};
        use flate2::read::MultiGzDecoder;
        use super::{OutputKind, OutputStreams};

        let path = temp_path("aligned.fq.gz");

        let mut streams = OutputStreams::new();
        streams.open(OutputKind::Aligned, &path, true).unwrap();
        streams.get(OutputKind::Aligned).unwrap().write_all(b"@r1\nACGT\n+\nIIII\n").unwrap();
        assert_eq!(streams.name(OutputKind::Aligned), Some(path.to_string_lossy().as_ref()));
        streams.finish().unwrap();

        let compressed = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let mut got: Vec<u8> = Vec::new();
        MultiGzDecoder::new(compressed.as_slice()).read_to_end(&mut got).unwrap();

        assert_eq!(&compressed[0..2], &[0x1f, 0x8b]);
        assert_eq!(got, b"@r1\nACGT\n+\nIIII\n");
    }
}
