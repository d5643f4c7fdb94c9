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

//! Printer for outputting the alignments of [Read] records as plain text in any supported [Format].
//!
//! Can be used to format any iterator over [Read] data.
//!
//! Returns all lines for 1 read at a time using next(). Reads without
//! alignments produce an empty buffer unless
//! [print_all_reads](crate::ReportConfig::print_all_reads) is set and the
//! format has a null record.
//!
//! If the desired output format has header lines, these are prepended to the
//! first record or can be formatted with [print_header](Printer::print_header).
//!
//! ## Usage
//!
//! ```rust
//! use alnfmt::{Alignment, Format, Read, ReferenceEntry, References, ReportConfig};
//! use alnfmt::cigar::parse_cigar;
//! use alnfmt::printer::Printer;
//!
//! let references = References::new(vec![
//!     ReferenceEntry{ header: "ref1".to_string(), sequence: b"ACGTA".to_vec() },
//! ]);
//! let aln = Alignment{ ref_id: 0, ref_begin: 0, ref_end: 4, read_begin: 0, read_end: 4, score: 6, cigar: parse_cigar("5M").unwrap(), evalue: 1e-5, bitscore: 12, ..Default::default() };
//! let reads = vec![
//!     Read{ header: "r1".to_string(), sequence: b"ACGAA".to_vec(), quality: None, alignments: vec![aln] },
//! ];
//! let config = ReportConfig::default();
//!
//! let mut printer = Printer::new(reads.iter(), &references, &config, Format::Pairwise);
//!
//! let mut output: Vec<u8> = Vec::new();
//! for lines in printer.by_ref() {
//!     output.append(&mut lines.unwrap());
//! }
//!
//! let mut expected: Vec<u8> = Vec::new();
//! expected.append(&mut b"Sequence ID: ref1\nQuery ID: r1\nScore: 6 bits (12)\tExpect: 1e-05\tstrand: +\n\n".to_vec());
//! expected.append(&mut b"Target:        1    ACGTA    5\n                    |||*|\nQuery:         1    ACGAA    5\n\n".to_vec());
//!
//! assert_eq!(output, expected);
//! ```
//!

use crate::Format;
use crate::Read;
use crate::References;
use crate::ReportConfig;
use crate::metrics::compute_metrics;

use blast::format_blast_alignment;
use sam::build_sam_header;
use sam::format_sam_header;
use sam::format_sam_line;
use sam::format_sam_null_line;
use tabular::format_tabular_line;
use tabular::format_tabular_null_line;

// Format specific implementations
pub mod biom;
pub mod blast;
pub mod sam;
pub mod tabular;

type E = Box<dyn std::error::Error>;

/// Format `value` with `precision` significant digits like C's `%g`.
///
/// Uses scientific notation if the exponent is below -4 or at least
/// `precision`. Trailing zeros are removed in both notations.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::printer::format_general;
///
/// assert_eq!(format_general(1.234e-5, 3), "1.23e-05");
/// assert_eq!(format_general(0.001, 3), "0.001");
/// assert_eq!(format_general(1500.0, 3), "1.5e+03");
/// assert_eq!(format_general(80.0, 3), "80");
/// ```
///
pub fn format_general(
    value: f64,
    precision: usize,
) -> String {
    if value == 0.0 {
        return "0".to_string()
    }
    if !value.is_finite() {
        return value.to_string().to_lowercase()
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_trailing_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(
    formatted: &str,
) -> &str {
    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted
    }
}

pub struct Printer<'a, I> where I: Iterator<Item=&'a Read> {
    // Inputs
    records: I,
    references: &'a References,
    config: &'a ReportConfig,

    index: usize,
    pub format: Format,
}

impl<'a, I> Printer<'a, I> where I: Iterator<Item=&'a Read> {
    pub fn new(
        records: I,
        references: &'a References,
        config: &'a ReportConfig,
        format: Format,
    ) -> Self {
        Printer{
            records,
            references, config,
            index: 0,
            format,
        }
    }

    /// Format the header lines of the output format.
    ///
    /// Returns None if the format has no header.
    pub fn print_header(
        &self,
    ) -> Result<Option<Vec<u8>>, E> {
        let mut out: Vec<u8> = Vec::new();
        match self.format {
            Format::Pairwise => Ok(None),
            Format::Tabular => Ok(None),
            Format::SAM => {
                let header = build_sam_header(self.references)?;
                format_sam_header(&header, &mut out)?;
                Ok(Some(out))
            },
        }
    }

    /// Format every alignment of `record`.
    pub fn print_read(
        &self,
        record: &Read,
    ) -> Result<Vec<u8>, E> {
        let mut out: Vec<u8> = Vec::new();

        if record.alignments.is_empty() {
            if self.config.print_all_reads {
                match self.format {
                    Format::Pairwise => (),
                    Format::Tabular => format_tabular_null_line(record, &self.config.columns, &mut out)?,
                    Format::SAM => format_sam_null_line(record, &mut out)?,
                }
            }
            return Ok(out)
        }

        for aln in record.alignments.iter() {
            let reference = self.references.get(aln.ref_id)?;
            match self.format {
                Format::Pairwise => format_blast_alignment(record, aln, reference, &mut out)?,
                Format::Tabular => {
                    let metrics = compute_metrics(aln, &reference.sequence, &record.sequence)?;
                    format_tabular_line(record, aln, reference, &metrics, &self.config.columns, &mut out)?;
                },
                Format::SAM => {
                    let metrics = compute_metrics(aln, &reference.sequence, &record.sequence)?;
                    format_sam_line(record, aln, reference, &metrics, &mut out)?;
                },
            }
        }

        Ok(out)
    }
}

impl<'a, I> Iterator for Printer<'a, I> where I: Iterator<Item=&'a Read> {
    type Item = Result<Vec<u8>, E>;

    fn next(
        &mut self,
    ) -> Option<Result<Vec<u8>, E>> {
        let record = self.records.next()?;

        let mut out: Vec<u8> = Vec::new();
        if self.index == 0 {
            match self.print_header() {
                Ok(Some(mut header)) => out.append(&mut header),
                Ok(None) => (),
                Err(e) => return Some(Err(e)),
            }
        }
        self.index += 1;

        match self.print_read(record) {
            Ok(mut lines) => {
                out.append(&mut lines);
                Some(Ok(out))
            },
            Err(e) => Some(Err(e)),
        }
    }
}
