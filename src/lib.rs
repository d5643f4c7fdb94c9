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

//! alnfmt is a library and a command-line client for:
//!
//!   - Formatting read alignments produced by a sequence search engine.
//!   - Partitioning a read file into aligned, unaligned and de novo candidate reads.
//!
//! The following plain text formats are supported:
//!   - Pairwise BLAST-like alignment view (60 columns per block).
//!   - BLAST tabular (m8) with optional `cigar`, `qcov` and `qstrand` columns.
//!   - [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf)
//!   - A static [BIOM](https://biom-format.org) header.
//!
//! Alignments are given as [Alignment] records that store their CIGAR as
//! packed 32-bit words, see [cigar].
//!
//! ## Usage
//!
//! ### Command line
//!
//! The alnfmt CLI supports the following subcommands:
//!   - `alnfmt report` format alignments from a tab-separated alignment table.
//!   - `alnfmt partition` split a FASTA/FASTQ file by alignment status.
//!   - `alnfmt biom` write the BIOM header skeleton.
//!
//! ### Rust API
//!
//! For formatting, [Printer](printer::Printer) takes an iterator over [Read]
//! records and formats them one read at a time. [report_to_write] formats a
//! whole slice of reads to something that implements [Write].
//!
//! For partitioning, [index_fastx](partition::index_fastx) finds the byte
//! range of every record in a FASTA/FASTQ buffer and
//! [ReadPartitioner](partition::ReadPartitioner) copies the records to the
//! outputs held by [OutputStreams](output::OutputStreams).
//!

use std::io::Write;

pub mod cigar;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod partition;
pub mod printer;

use cigar::PackedCigarOp;

type E = Box<dyn std::error::Error>;

/// Supported alignment report formats.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Pairwise BLAST-like alignment view
    Pairwise,
    /// BLAST tabular (m8) + optional columns
    #[default]
    Tabular,
    SAM,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pairwise" | "blast" => Ok(Format::Pairwise),
            "tabular" | "m8" => Ok(Format::Tabular),
            "sam" => Ok(Format::SAM),
            _ => Err(format!("'{}' is not a valid Format", s)),
        }
    }
}

/// Optional columns appended to a tabular record.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularColumn {
    /// CIGAR string with soft clips
    Cigar,
    /// Percentage of the read covered by the alignment
    QueryCoverage,
    /// `+` or `-`
    QueryStrand,
}

impl std::str::FromStr for TabularColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cigar" => Ok(TabularColumn::Cigar),
            "qcov" => Ok(TabularColumn::QueryCoverage),
            "qstrand" => Ok(TabularColumn::QueryStrand),
            _ => Err(format!("'{}' is not a valid TabularColumn", s)),
        }
    }
}

/// Settings shared by every printer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportConfig {
    /// Optional tabular columns, printed in this order.
    pub columns: Vec<TabularColumn>,
    /// Also print a null record for reads without alignments.
    pub print_all_reads: bool,
}

/// Strand of the read the alignment was found on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strand {
    #[default]
    Forward,
    /// The read was reverse complemented before alignment.
    Reverse,
}

impl Strand {
    pub fn symbol(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// A single alignment of a read against a reference sequence.
///
/// Coordinates are 0-based and inclusive. Walking `cigar` from `ref_begin`
/// and `read_begin` must end at `ref_end + 1` and `read_end + 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Alignment {
    /// Index of the reference sequence in [References].
    pub ref_id: usize,
    pub read_begin: usize,
    pub read_end: usize,
    pub ref_begin: usize,
    pub ref_end: usize,
    /// Alignment score from the search engine.
    pub score: u32,
    pub strand: Strand,
    pub cigar: Vec<PackedCigarOp>,
    /// Precomputed e-value.
    pub evalue: f64,
    /// Precomputed bit score.
    pub bitscore: u32,
}

impl Alignment {
    /// Number of read positions between the start and end coordinates.
    pub fn alignment_length(&self) -> usize {
        self.read_end.abs_diff(self.read_begin) + 1
    }
}

/// A query read and its alignments.
///
/// If the read was aligned on the reverse strand, `sequence` already holds
/// the reverse complement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Read {
    pub header: String,
    pub sequence: Vec<u8>,
    pub quality: Option<Vec<u8>>,
    pub alignments: Vec<Alignment>,
}

impl Read {
    /// Read name up to the first whitespace.
    pub fn id(&self) -> &str {
        first_word(&self.header)
    }
}

/// A reference sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub header: String,
    pub sequence: Vec<u8>,
}

impl ReferenceEntry {
    /// Reference name up to the first whitespace.
    pub fn id(&self) -> &str {
        first_word(&self.header)
    }
}

#[derive(Debug, Clone)]
pub struct UnknownReference {
    ref_id: usize,
}

impl std::fmt::Display for UnknownReference {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "no reference sequence with index {}", self.ref_id)
    }
}

impl std::error::Error for UnknownReference {}

/// Reference sequences in the order they appear in the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct References {
    pub entries: Vec<ReferenceEntry>,
}

impl References {
    pub fn new(
        entries: Vec<ReferenceEntry>,
    ) -> Self {
        References{ entries }
    }

    /// Returns the reference with index `ref_id`.
    ///
    /// Terminates with [UnknownReference] if there is no such reference.
    pub fn get(
        &self,
        ref_id: usize,
    ) -> Result<&ReferenceEntry, E> {
        self.entries.get(ref_id).ok_or_else(|| Box::new(UnknownReference{ ref_id }) as E)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn first_word(
    header: &str,
) -> &str {
    header.split([' ', '\t']).next().unwrap_or_default()
}

/// Format all alignments of `reads` to [Write](std::io::Write).
///
/// Writes the format's header first, if it has one.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::{report_to_write, Alignment, Format, Read, ReferenceEntry, References, ReportConfig, TabularColumn};
/// use alnfmt::cigar::parse_cigar;
///
/// let references = References::new(vec![
///     ReferenceEntry{ header: "ref1 16S rRNA".to_string(), sequence: b"ACGTA".to_vec() },
/// ]);
///
/// let aln = Alignment{ ref_id: 0, ref_begin: 0, ref_end: 4, read_begin: 0, read_end: 4, score: 6, cigar: parse_cigar("5M").unwrap(), evalue: 0.5, bitscore: 12, ..Default::default() };
/// let reads = vec![
///     Read{ header: "r1 sample=1".to_string(), sequence: b"ACGAA".to_vec(), quality: None, alignments: vec![aln] },
///     Read{ header: "r2".to_string(), sequence: b"TTTTT".to_vec(), quality: None, alignments: vec![] },
/// ];
///
/// let config = ReportConfig{ columns: vec![TabularColumn::Cigar, TabularColumn::QueryCoverage], print_all_reads: true };
///
/// let mut output: Vec<u8> = Vec::new();
/// report_to_write(Format::Tabular, &config, &references, &reads, &mut output).unwrap();
///
/// let mut expected: Vec<u8> = Vec::new();
/// expected.append(&mut b"r1\tref1\t80.000\t5\t1\t0\t1\t5\t1\t5\t0.5\t12\t5M\t100.000\n".to_vec());
/// expected.append(&mut b"r2\t*\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t*\t0\n".to_vec());
///
/// assert_eq!(output, expected);
/// ```
///
pub fn report_to_write<W: Write + ?Sized>(
    format: Format,
    config: &ReportConfig,
    references: &References,
    reads: &[Read],
    conn_out: &mut W,
) -> Result<(), E> {
    let mut printer = printer::Printer::new(reads.iter(), references, config, format);
    let mut n_reads: usize = 0;
    for record in printer.by_ref() {
        conn_out.write_all(&record?)?;
        n_reads += 1;
    }
    if n_reads == 0 {
        if let Some(header) = printer.print_header()? {
            conn_out.write_all(&header)?;
        }
    }
    conn_out.flush()?;
    Ok(())
}
