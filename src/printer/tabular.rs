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
use std::io::Write;

use crate::Alignment;
use crate::Read;
use crate::ReferenceEntry;
use crate::TabularColumn;
use crate::cigar::format_cigar;
use crate::metrics::DerivedMetrics;
use crate::metrics::query_coverage;
use crate::printer::format_general;

type E = Box<dyn std::error::Error>;

/// Format a single alignment in BLAST tabular format
///
/// Writes the 12 standard m8 fields of `aln` followed by the optional
/// `columns` in the order given, as one line to `conn`.
///
/// `metrics` must have been computed from `aln`.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::{Alignment, Read, ReferenceEntry, Strand, TabularColumn};
/// use alnfmt::cigar::parse_cigar;
/// use alnfmt::metrics::compute_metrics;
/// use alnfmt::printer::tabular::format_tabular_line;
///
/// let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: b"GGACGTTT".to_vec() };
/// let aln = Alignment{ ref_begin: 2, ref_end: 7, read_begin: 0, read_end: 5, score: 10, strand: Strand::Reverse, cigar: parse_cigar("6M").unwrap(), evalue: 1e-3, bitscore: 11, ..Default::default() };
/// let read = Read{ header: "r1".to_string(), sequence: b"ACGTTTAA".to_vec(), quality: None, alignments: vec![] };
///
/// let metrics = compute_metrics(&aln, &reference.sequence, &read.sequence).unwrap();
/// let mut out: Vec<u8> = Vec::new();
/// format_tabular_line(&read, &aln, &reference, &metrics, &[TabularColumn::QueryStrand], &mut out).unwrap();
///
/// assert_eq!(out, b"r1\tref1\t100.000\t6\t0\t0\t1\t6\t3\t8\t0.001\t11\t-\n");
/// ```
///
pub fn format_tabular_line<W: Write>(
    read: &Read,
    aln: &Alignment,
    reference: &ReferenceEntry,
    metrics: &DerivedMetrics,
    columns: &[TabularColumn],
    conn: &mut W,
) -> Result<(), E> {
    let separator: char = '\t';
    let mut formatted: String = String::new();

    formatted += read.id();
    formatted.push(separator);
    formatted += reference.id();
    formatted.push(separator);
    formatted += &format!("{:.3}", metrics.percent_identity());
    formatted.push(separator);
    formatted += &aln.alignment_length().to_string();
    formatted.push(separator);
    formatted += &metrics.mismatches.to_string();
    formatted.push(separator);
    formatted += &metrics.gaps.to_string();
    formatted.push(separator);
    formatted += &(aln.read_begin + 1).to_string();
    formatted.push(separator);
    formatted += &(aln.read_end + 1).to_string();
    formatted.push(separator);
    formatted += &(aln.ref_begin + 1).to_string();
    formatted.push(separator);
    formatted += &(aln.ref_end + 1).to_string();
    formatted.push(separator);
    formatted += &format_general(aln.evalue, 3);
    formatted.push(separator);
    formatted += &aln.bitscore.to_string();

    for column in columns {
        formatted.push(separator);
        match column {
            TabularColumn::Cigar => {
                let mut cigar: Vec<u8> = Vec::new();
                format_cigar(aln, read.sequence.len(), &mut cigar)?;
                formatted += &String::from_utf8_lossy(&cigar);
            },
            TabularColumn::QueryCoverage => {
                formatted += &format!("{:.3}", query_coverage(aln, read.sequence.len())?);
            },
            TabularColumn::QueryStrand => {
                formatted.push(aln.strand.symbol());
            },
        }
    }
    formatted += "\n";

    conn.write_all(formatted.as_bytes())?;
    Ok(())
}

/// Format a read without alignments in BLAST tabular format
///
/// The subject is `*`, every numeric field is `0` and the optional columns
/// get the placeholders `*` (cigar, qstrand) or `0` (qcov).
///
pub fn format_tabular_null_line<W: Write>(
    read: &Read,
    columns: &[TabularColumn],
    conn: &mut W,
) -> Result<(), E> {
    let mut formatted: String = String::new();
    formatted += read.id();
    formatted += "\t*\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0";
    columns.iter().for_each(|column| {
        formatted += match column {
            TabularColumn::Cigar => "\t*",
            TabularColumn::QueryCoverage => "\t0",
            TabularColumn::QueryStrand => "\t*",
        };
    });
    formatted += "\n";

    conn.write_all(formatted.as_bytes())?;
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn format_tabular_line_with_insertion() {
        use super::format_tabular_line;
        use crate::{Alignment, Read, ReferenceEntry, Strand, TabularColumn};
        use crate::cigar::parse_cigar;
        use crate::metrics::compute_metrics;

        let reference = ReferenceEntry{ header: "ref1 16S".to_string(), sequence: b"ACGTTT".to_vec() };
        let read = Read{ header: "queryId extra".to_string(), sequence: b"ACGCCTTT".to_vec(), quality: None, alignments: vec![] };
        let aln = Alignment{ ref_id: 0, ref_begin: 0, ref_end: 5, read_begin: 0, read_end: 7, score: 9, strand: Strand::Forward, cigar: parse_cigar("3M2I3M").unwrap(), evalue: 3.2e-12, bitscore: 17 };
        let metrics = compute_metrics(&aln, &reference.sequence, &read.sequence).unwrap();

        let expected: Vec<u8> = b"queryId\tref1\t100.000\t8\t0\t2\t1\t8\t1\t6\t3.2e-12\t17\t3M2I3M\t100.000\t+\n".to_vec();

        let mut got: Vec<u8> = Vec::new();
        format_tabular_line(&read, &aln, &reference, &metrics, &[TabularColumn::Cigar, TabularColumn::QueryCoverage, TabularColumn::QueryStrand], &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn format_tabular_line_soft_clips_and_coverage() {
        use super::format_tabular_line;
        use crate::{Alignment, Read, ReferenceEntry, Strand, TabularColumn};
        use crate::cigar::parse_cigar;
        use crate::metrics::compute_metrics;

        let reference = ReferenceEntry{ header: "ref2".to_string(), sequence: b"TTACGTACGT".to_vec() };
        let read = Read{ header: "r7".to_string(), sequence: b"GGACCTACTT".to_vec(), quality: None, alignments: vec![] };
        let aln = Alignment{ ref_id: 0, ref_begin: 2, ref_end: 7, read_begin: 2, read_end: 7, score: 4, strand: Strand::Reverse, cigar: parse_cigar("6M").unwrap(), evalue: 0.25, bitscore: 8 };
        let metrics = compute_metrics(&aln, &reference.sequence, &read.sequence).unwrap();

        let expected: Vec<u8> = b"r7\tref2\t83.333\t6\t1\t0\t3\t8\t3\t8\t0.25\t8\t-\t60.000\t2S6M2S\n".to_vec();

        let mut got: Vec<u8> = Vec::new();
        format_tabular_line(&read, &aln, &reference, &metrics, &[TabularColumn::QueryStrand, TabularColumn::QueryCoverage, TabularColumn::Cigar], &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn format_tabular_line_field_count() {
        use super::format_tabular_line;
        use crate::{Alignment, Read, ReferenceEntry, TabularColumn};
        use crate::cigar::parse_cigar;
        use crate::metrics::compute_metrics;

        let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: b"ACGTACGT".to_vec() };
        let read = Read{ header: "r1".to_string(), sequence: b"ACGTACGT".to_vec(), quality: None, alignments: vec![] };
        let aln = Alignment{ ref_begin: 0, ref_end: 7, read_begin: 0, read_end: 7, cigar: parse_cigar("8M").unwrap(), ..Default::default() };
        let metrics = compute_metrics(&aln, &reference.sequence, &read.sequence).unwrap();

        let column_sets = vec![
            vec![],
            vec![TabularColumn::Cigar],
            vec![TabularColumn::QueryStrand, TabularColumn::Cigar],
            vec![TabularColumn::QueryCoverage, TabularColumn::QueryStrand, TabularColumn::Cigar],
        ];
        for columns in column_sets {
            let mut got: Vec<u8> = Vec::new();
            format_tabular_line(&read, &aln, &reference, &metrics, &columns, &mut got).unwrap();
            let got = String::from_utf8(got).unwrap();
            assert_eq!(got.trim_end_matches('\n').split('\t').count(), 12 + columns.len());
            assert_eq!(got.matches('\n').count(), 1);
        }
    }

    #[test]
    fn format_tabular_null_line() {
        use super::format_tabular_null_line;
        use crate::{Read, TabularColumn};

        let read = Read{ header: "queryId some description".to_string(), sequence: b"ACGT".to_vec(), quality: None, alignments: vec![] };
        let expected: Vec<u8> = b"queryId\t*\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t*\t0\n".to_vec();

        let mut got: Vec<u8> = Vec::new();
        format_tabular_null_line(&read, &[TabularColumn::Cigar, TabularColumn::QueryCoverage], &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn format_tabular_null_line_no_columns() {
        use super::format_tabular_null_line;
        use crate::Read;

        let read = Read{ header: "r2".to_string(), ..Default::default() };
        let expected: Vec<u8> = b"r2\t*\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\n".to_vec();

        let mut got: Vec<u8> = Vec::new();
        format_tabular_null_line(&read, &[], &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn error_on_coverage_of_empty_read() {
        use super::format_tabular_line;
        use crate::{Alignment, Read, ReferenceEntry, TabularColumn};
        use crate::metrics::DerivedMetrics;

        let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: b"ACGT".to_vec() };
        let read = Read{ header: "r1".to_string(), ..Default::default() };
        let aln = Alignment::default();

        let got = format_tabular_line(&read, &aln, &reference, &DerivedMetrics::default(), &[TabularColumn::QueryCoverage], &mut Vec::<u8>::new());

        assert!(got.is_err());
    }
}
