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

//! Tab-separated alignment table.
//!
//! One alignment per line with the columns
//!
//! ```text
//! read_id ref_id read_begin read_end ref_begin ref_end score strand cigar evalue bitscore
//! ```
//!
//! Coordinates are 0-based and inclusive, `strand` is `+` or `-` and
//! `cigar` uses the operations M, I and D (`=`, `X` are read as M and soft
//! or hard clips are ignored). Empty lines and lines starting with `#` are
//! skipped.
//!
use std::collections::HashMap;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;

use crate::Alignment;
use crate::References;
use crate::Strand;
use crate::cigar::consumed_lengths;
use crate::cigar::decode_cigar;
use crate::cigar::parse_cigar;

type E = Box<dyn std::error::Error>;

const N_COLUMNS: usize = 11;

#[derive(Debug, Clone)]
pub struct AlignmentTableError {
    line: usize,
    message: String,
}

impl std::fmt::Display for AlignmentTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "alignment table line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for AlignmentTableError {}

/// One line of the alignment table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentRow {
    pub read_id: String,
    pub alignment: Alignment,
}

fn parse_field<T: std::str::FromStr>(
    field: &str,
    name: &str,
    line: usize,
) -> Result<T, E> {
    field.parse::<T>().map_err(|_| Box::new(AlignmentTableError{ line, message: format!("invalid {} '{}'", name, field) }) as E)
}

/// Parse one alignment table line
///
/// `ref_to_pos` maps reference ids to their index in the reference file.
///
pub fn read_alignment_line(
    contents: &str,
    ref_to_pos: &HashMap<String, usize>,
    line: usize,
) -> Result<AlignmentRow, E> {
    let separator: char = '\t';
    let records: Vec<&str> = contents.split(separator).collect();
    if records.len() != N_COLUMNS {
        return Err(Box::new(AlignmentTableError{ line, message: format!("expected {} columns, got {}", N_COLUMNS, records.len()) }))
    }

    let Some(ref_id) = ref_to_pos.get(records[1]) else {
        return Err(Box::new(AlignmentTableError{ line, message: format!("unknown reference '{}'", records[1]) }))
    };
    let strand = match records[7] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        _ => return Err(Box::new(AlignmentTableError{ line, message: format!("invalid strand '{}'", records[7]) })),
    };
    let cigar = parse_cigar(records[8]).map_err(|e| Box::new(AlignmentTableError{ line, message: e.to_string() }) as E)?;

    let alignment = Alignment{
        ref_id: *ref_id,
        read_begin: parse_field(records[2], "read_begin", line)?,
        read_end: parse_field(records[3], "read_end", line)?,
        ref_begin: parse_field(records[4], "ref_begin", line)?,
        ref_end: parse_field(records[5], "ref_end", line)?,
        score: parse_field(records[6], "score", line)?,
        strand,
        cigar,
        evalue: parse_field(records[9], "evalue", line)?,
        bitscore: parse_field(records[10], "bitscore", line)?,
    };
    if alignment.read_end < alignment.read_begin || alignment.ref_end < alignment.ref_begin {
        return Err(Box::new(AlignmentTableError{ line, message: "end coordinate before start coordinate".to_string() }))
    }
    let (on_ref, on_read) = consumed_lengths(&decode_cigar(&alignment.cigar)?);
    if on_ref.checked_sub(1) != Some(alignment.ref_end - alignment.ref_begin) || on_read.checked_sub(1) != Some(alignment.read_end - alignment.read_begin) {
        return Err(Box::new(AlignmentTableError{ line, message: format!("cigar {} does not span the alignment coordinates", records[8]) }))
    }

    Ok(AlignmentRow{ read_id: records[0].to_string(), alignment })
}

/// Read every alignment from `conn`
///
/// Reference ids are resolved against `references`.
///
/// Terminates with [AlignmentTableError] on the first malformed line.
///
pub fn read_alignment_table<R: Read>(
    conn: &mut R,
    references: &References,
) -> Result<Vec<AlignmentRow>, E> {
    let mut ref_to_pos: HashMap<String, usize> = HashMap::with_capacity(references.len());
    references.entries.iter().enumerate().for_each(|(idx, reference)| {
        ref_to_pos.entry(reference.id().to_string()).or_insert(idx);
    });

    let reader = BufReader::new(conn);
    let mut rows: Vec<AlignmentRow> = Vec::new();
    for (idx, contents) in reader.lines().enumerate() {
        let contents = contents?;
        let contents = contents.trim_end_matches('\r');
        if contents.is_empty() || contents.starts_with('#') {
            continue;
        }
        rows.push(read_alignment_line(contents, &ref_to_pos, idx + 1)?);
    }
    log::debug!("Read {} alignments", rows.len());
    Ok(rows)
}

/// Read the read ids from the first column of an alignment table.
pub fn read_aligned_ids<R: Read>(
    conn: &mut R,
) -> Result<Vec<String>, E> {
    let separator: char = '\t';
    let reader = BufReader::new(conn);
    let mut ids: Vec<String> = Vec::new();
    for contents in reader.lines() {
        let contents = contents?;
        if contents.is_empty() || contents.starts_with('#') {
            continue;
        }
        if let Some(id) = contents.split(separator).next() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn read_alignment_table() {
        use std::io::Cursor;
        use super::{read_alignment_table, AlignmentRow};
        use crate::{Alignment, ReferenceEntry, References, Strand};
        use crate::cigar::parse_cigar;

        let references = References::new(vec![
            ReferenceEntry{ header: "ref1 16S".to_string(), sequence: b"ACGT".to_vec() },
            ReferenceEntry{ header: "ref2 23S".to_string(), sequence: b"ACGT".to_vec() },
        ]);
        let mut data: Vec<u8> = Vec::new();
        data.append(&mut b"# read_id\tref_id\n".to_vec());
        data.append(&mut b"r1\tref2\t0\t7\t2\t7\t9\t+\t3M2I3M\t2.5e-7\t17\n".to_vec());
        data.append(&mut b"\n".to_vec());
        data.append(&mut b"r2\tref1\t1\t6\t0\t5\t10\t-\t1S6M1S\t0.5\t12\n".to_vec());

        let expected = vec![
            AlignmentRow{ read_id: "r1".to_string(), alignment: Alignment{ ref_id: 1, read_begin: 0, read_end: 7, ref_begin: 2, ref_end: 7, score: 9, strand: Strand::Forward, cigar: parse_cigar("3M2I3M").unwrap(), evalue: 2.5e-7, bitscore: 17 } },
            AlignmentRow{ read_id: "r2".to_string(), alignment: Alignment{ ref_id: 0, read_begin: 1, read_end: 6, ref_begin: 0, ref_end: 5, score: 10, strand: Strand::Reverse, cigar: parse_cigar("6M").unwrap(), evalue: 0.5, bitscore: 12 } },
        ];

        let got = read_alignment_table(&mut Cursor::new(data), &references).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn read_aligned_ids() {
        use std::io::Cursor;
        use super::read_aligned_ids;

        let data: Vec<u8> = b"# comment\nr1\tref1\t0\nr3\tref2\t0\n\nr1\tref2\t0\n".to_vec();
        let expected = vec!["r1".to_string(), "r3".to_string(), "r1".to_string()];

        let got = read_aligned_ids(&mut Cursor::new(data)).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn error_on_wrong_column_count() {
        use std::collections::HashMap;
        use super::read_alignment_line;

        let got = read_alignment_line("r1\tref1\t0\t7", &HashMap::new(), 3);

        assert!(got.is_err());
        assert_eq!(got.err().unwrap().to_string(), "alignment table line 3: expected 11 columns, got 4");
    }

    #[test]
    fn error_on_unknown_reference() {
        use std::collections::HashMap;
        use super::read_alignment_line;

        let got = read_alignment_line("r1\tref9\t0\t3\t0\t3\t4\t+\t4M\t1\t2", &HashMap::new(), 1);

        assert_eq!(got.err().unwrap().to_string(), "alignment table line 1: unknown reference 'ref9'");
    }

    #[test]
    fn error_on_bad_fields() {
        use std::collections::HashMap;
        use super::read_alignment_line;

        let ref_to_pos: HashMap<String, usize> = HashMap::from([("ref1".to_string(), 0)]);

        assert!(read_alignment_line("r1\tref1\t0\t3\t0\t3\t4\t*\t4M\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\tx\t3\t0\t3\t4\t+\t4M\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\t0\t3\t0\t3\t4\t+\t4Q\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\t3\t0\t0\t3\t4\t+\t4M\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\t0\t3\t0\t4\t4\t+\t4M\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line(&format!("r1\tref1\t0\t3\t0\t{}\t4\t+\t4M\t1\t2", usize::MAX), &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\t0\t0\t0\t0\t4\t+\t\t1\t2", &ref_to_pos, 1).is_err());
        assert!(read_alignment_line("r1\tref1\t0\t3\t0\t3\t4\t+\t4M\t1\t2", &ref_to_pos, 1).is_ok());
    }
}
