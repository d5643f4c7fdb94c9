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

//! Pairwise BLAST-like alignment view.
//!
//! An alignment is printed as a header followed by blocks of at most
//! [BLOCK_WIDTH] alignment columns. Each block has three lines:
//!
//! ```text
//! Target:        1    ACGTACGTAC    10
//!                     |||*|*||||
//! Query:         1    ACGAAGGTAC    10
//! ```
//!
//! The start coordinates are 1-based and the end coordinates are the
//! 0-based position after the last base on the line. Blocks are separated by
//! a blank line.
//!
use std::io::Write;

use crate::Alignment;
use crate::Read;
use crate::ReferenceEntry;
use crate::cigar::CigarOp;
use crate::cigar::decode_cigar;
use crate::metrics::AlignmentBoundsError;
use crate::metrics::normalize_base;
use crate::printer::format_general;

type E = Box<dyn std::error::Error>;

/// Maximum number of alignment columns in a block.
pub const BLOCK_WIDTH: usize = 60;

/// Position in an alignment where the next block starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCursor {
    /// Index of the current CIGAR operation.
    pub op_index: usize,
    /// Columns of the current operation already printed.
    pub op_offset: usize,
    pub ref_pos: usize,
    pub read_pos: usize,
}

impl RenderCursor {
    pub fn new(
        aln: &Alignment,
    ) -> Self {
        RenderCursor{ op_index: 0, op_offset: 0, ref_pos: aln.ref_begin, read_pos: aln.read_begin }
    }
}

/// The three lines of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlastBlock {
    pub ref_start: usize,
    pub ref_end: usize,
    pub reference: String,
    pub matches: String,
    pub read_start: usize,
    pub read_end: usize,
    pub query: String,
}

impl BlastBlock {
    /// Number of alignment columns in the block.
    pub fn columns(&self) -> usize {
        self.matches.len()
    }

    pub fn write<W: Write>(
        &self,
        conn: &mut W,
    ) -> Result<(), E> {
        let formatted = format!(
            "Target: {:>8}    {}    {}\n{:>20}{}\nQuery: {:>9}    {}    {}\n\n",
            self.ref_start + 1, self.reference, self.ref_end,
            " ", self.matches,
            self.read_start + 1, self.query, self.read_end,
        );
        conn.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

fn base_at(
    seq: &[u8],
    pos: usize,
) -> Result<char, E> {
    match seq.get(pos) {
        Some(base) => Ok(normalize_base(*base) as char),
        None => Err(Box::new(AlignmentBoundsError{ message: format!("position {} past sequence length {}", pos, seq.len()) })),
    }
}

/// Render the block starting at `cursor` and move `cursor` to the start of the next one.
///
/// The block covers the next [BLOCK_WIDTH] columns of `ops`, or all of the
/// remaining columns if there are fewer. All three lines are built from
/// the same window, so they always have the same number of columns.
///
/// Returns the block and whether the whole alignment has been rendered.
///
pub fn render_next_block(
    ops: &[(CigarOp, u32)],
    reference: &[u8],
    read: &[u8],
    cursor: &mut RenderCursor,
) -> Result<(BlastBlock, bool), E> {
    let mut window: Vec<CigarOp> = Vec::with_capacity(BLOCK_WIDTH);
    let mut op_index = cursor.op_index;
    let mut op_offset = cursor.op_offset;
    while window.len() < BLOCK_WIDTH && op_index < ops.len() {
        let (op, len) = ops[op_index];
        let take = (len as usize).saturating_sub(op_offset).min(BLOCK_WIDTH - window.len());
        window.extend(std::iter::repeat(op).take(take));
        op_offset += take;
        if op_offset >= len as usize {
            op_index += 1;
            op_offset = 0;
        }
    }

    let mut block = BlastBlock{ ref_start: cursor.ref_pos, read_start: cursor.read_pos, ..Default::default() };
    let mut ref_pos = cursor.ref_pos;
    let mut read_pos = cursor.read_pos;
    for op in window {
        match op {
            CigarOp::Match => {
                let x = base_at(reference, ref_pos)?;
                let y = base_at(read, read_pos)?;
                block.reference.push(x);
                block.matches.push(if x == y { '|' } else { '*' });
                block.query.push(y);
                ref_pos += 1;
                read_pos += 1;
            },
            CigarOp::Insertion => {
                block.reference.push('-');
                block.matches.push(' ');
                block.query.push(base_at(read, read_pos)?);
                read_pos += 1;
            },
            CigarOp::Deletion => {
                block.reference.push(base_at(reference, ref_pos)?);
                block.matches.push(' ');
                block.query.push('-');
                ref_pos += 1;
            },
        }
    }
    block.ref_end = ref_pos;
    block.read_end = read_pos;

    *cursor = RenderCursor{ op_index, op_offset, ref_pos, read_pos };

    Ok((block, op_index >= ops.len()))
}

/// Format a single alignment in the pairwise view
///
/// Writes the alignment header and all blocks of `aln` to `conn`.
///
/// Terminates with a [CigarDecodeError](crate::cigar::CigarDecodeError) if
/// the CIGAR contains an unknown operation, or with an
/// [AlignmentBoundsError] if it walks past the reference or the read.
///
pub fn format_blast_alignment<W: Write>(
    read: &Read,
    aln: &Alignment,
    reference: &ReferenceEntry,
    conn: &mut W,
) -> Result<(), E> {
    let mut formatted: String = String::new();
    formatted += "Sequence ID: ";
    formatted += reference.id();
    formatted += "\nQuery ID: ";
    formatted += read.id();
    formatted += &format!("\nScore: {} bits ({})\t", aln.score, aln.bitscore);
    formatted += &format!("Expect: {}\t", format_general(aln.evalue, 3));
    formatted += &format!("strand: {}\n\n", aln.strand.symbol());
    conn.write_all(formatted.as_bytes())?;

    let ops = decode_cigar(&aln.cigar)?;
    if ops.is_empty() {
        return Ok(())
    }

    let mut cursor = RenderCursor::new(aln);
    loop {
        let (block, done) = render_next_block(&ops, &reference.sequence, &read.sequence, &mut cursor)?;
        block.write(conn)?;
        if done {
            break;
        }
    }

    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn format_blast_alignment_single_block() {
        use super::format_blast_alignment;
        use crate::{Alignment, Read, ReferenceEntry, Strand};
        use crate::cigar::parse_cigar;

        let reference = ReferenceEntry{ header: "ref1 16S rRNA".to_string(), sequence: b"ACGTACGTAC".to_vec() };
        let aln = Alignment{ ref_id: 0, ref_begin: 0, ref_end: 9, read_begin: 0, read_end: 9, score: 16, strand: Strand::Forward, cigar: parse_cigar("10M").unwrap(), evalue: 1.234e-5, bitscore: 30 };
        let read = Read{ header: "r1 length=10".to_string(), sequence: b"ACGAAGGTAC".to_vec(), quality: None, alignments: vec![] };

        let expected: Vec<u8> = vec![
            b"Sequence ID: ref1\nQuery ID: r1\nScore: 16 bits (30)\tExpect: 1.23e-05\tstrand: +\n\n".to_vec(),
            b"Target:        1    ACGTACGTAC    10\n".to_vec(),
            b"                    |||*|*||||\n".to_vec(),
            b"Query:         1    ACGAAGGTAC    10\n\n".to_vec(),
        ].concat();

        let mut got: Vec<u8> = Vec::new();
        format_blast_alignment(&read, &aln, &reference, &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn format_blast_alignment_with_gaps() {
        use super::format_blast_alignment;
        use crate::{Alignment, Read, ReferenceEntry, Strand};
        use crate::cigar::parse_cigar;

        let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: b"TTACGTTTGC".to_vec() };
        let aln = Alignment{ ref_id: 0, ref_begin: 2, ref_end: 9, read_begin: 1, read_end: 7, score: 3, strand: Strand::Reverse, cigar: parse_cigar("3M3D2M2I").unwrap(), evalue: 0.5, bitscore: 7 };
        let read = Read{ header: "r1".to_string(), sequence: b"GACGGCAAT".to_vec(), quality: None, alignments: vec![] };

        let expected: Vec<u8> = vec![
            b"Sequence ID: ref1\nQuery ID: r1\nScore: 3 bits (7)\tExpect: 0.5\tstrand: -\n\n".to_vec(),
            b"Target:        3    ACGTTTGC--    10\n".to_vec(),
            b"                    |||   ||  \n".to_vec(),
            b"Query:         2    ACG---GCAA    8\n\n".to_vec(),
        ].concat();

        let mut got: Vec<u8> = Vec::new();
        format_blast_alignment(&read, &aln, &reference, &mut got).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn render_blocks_wrap_at_60_columns() {
        use super::render_next_block;
        use super::RenderCursor;
        use super::BLOCK_WIDTH;
        use crate::Alignment;
        use crate::cigar::{decode_cigar, parse_cigar};

        let reference: Vec<u8> = b"ACGT".iter().cycle().take(128).copied().collect();
        let read: Vec<u8> = b"ACGT".iter().cycle().take(132).copied().collect();
        let aln = Alignment{ ref_begin: 0, ref_end: 127, read_begin: 0, read_end: 131, cigar: parse_cigar("58M4I70M").unwrap(), ..Default::default() };
        let ops = decode_cigar(&aln.cigar).unwrap();

        let mut cursor = RenderCursor::new(&aln);

        let (first, done) = render_next_block(&ops, &reference, &read, &mut cursor).unwrap();
        assert!(!done);
        assert_eq!(first.columns(), BLOCK_WIDTH);
        assert_eq!((first.ref_start, first.ref_end, first.read_start, first.read_end), (0, 58, 0, 60));
        assert!(first.reference.ends_with("--"));
        assert_eq!(cursor, RenderCursor{ op_index: 1, op_offset: 2, ref_pos: 58, read_pos: 60 });

        let (second, done) = render_next_block(&ops, &reference, &read, &mut cursor).unwrap();
        assert!(!done);
        assert_eq!(second.columns(), BLOCK_WIDTH);
        assert_eq!((second.ref_start, second.ref_end, second.read_start, second.read_end), (58, 116, 60, 120));
        assert!(second.reference.starts_with("--"));
        assert!(second.matches.starts_with("  |"));

        let (last, done) = render_next_block(&ops, &reference, &read, &mut cursor).unwrap();
        assert!(done);
        assert_eq!(last.columns(), 12);
        assert_eq!((last.ref_end, last.read_end), (128, 132));

        for block in [first, second, last] {
            assert_eq!(block.reference.len(), block.matches.len());
            assert_eq!(block.query.len(), block.matches.len());
        }
    }

    #[test]
    fn render_ends_on_exact_block_boundary() {
        use super::render_next_block;
        use super::RenderCursor;
        use crate::Alignment;
        use crate::cigar::{decode_cigar, parse_cigar};

        let seq: Vec<u8> = b"ACGT".iter().cycle().take(120).copied().collect();
        let aln = Alignment{ ref_begin: 0, ref_end: 119, read_begin: 0, read_end: 119, cigar: parse_cigar("60M60M").unwrap(), ..Default::default() };
        let ops = decode_cigar(&aln.cigar).unwrap();

        let mut cursor = RenderCursor::new(&aln);
        let (_, done) = render_next_block(&ops, &seq, &seq, &mut cursor).unwrap();
        assert!(!done);
        assert_eq!(cursor, RenderCursor{ op_index: 1, op_offset: 0, ref_pos: 60, read_pos: 60 });

        let (block, done) = render_next_block(&ops, &seq, &seq, &mut cursor).unwrap();
        assert!(done);
        assert_eq!(block.columns(), 60);
        assert_eq!(block.matches, "|".repeat(60));
    }

    #[test]
    fn format_blast_alignment_block_count() {
        use super::format_blast_alignment;
        use crate::{Alignment, Read, ReferenceEntry};
        use crate::cigar::parse_cigar;

        let seq: Vec<u8> = b"ACGT".iter().cycle().take(150).copied().collect();
        let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: seq.clone() };
        let read = Read{ header: "r1".to_string(), sequence: seq, quality: None, alignments: vec![] };
        let aln = Alignment{ ref_begin: 0, ref_end: 149, read_begin: 0, read_end: 149, cigar: parse_cigar("150M").unwrap(), ..Default::default() };

        let mut got: Vec<u8> = Vec::new();
        format_blast_alignment(&read, &aln, &reference, &mut got).unwrap();
        let got = String::from_utf8(got).unwrap();

        assert_eq!(got.matches("Target: ").count(), 3);
        assert!(got.contains("Target:       61    "));
        assert!(got.contains("Query:       121    "));
        assert!(got.ends_with("    150\n\n"));
    }

    #[test]
    fn error_if_alignment_past_reference() {
        use super::format_blast_alignment;
        use crate::{Alignment, Read, ReferenceEntry};
        use crate::cigar::parse_cigar;

        let reference = ReferenceEntry{ header: "ref1".to_string(), sequence: b"ACG".to_vec() };
        let read = Read{ header: "r1".to_string(), sequence: b"ACGTA".to_vec(), quality: None, alignments: vec![] };
        let aln = Alignment{ ref_begin: 0, ref_end: 4, read_begin: 0, read_end: 4, cigar: parse_cigar("5M").unwrap(), ..Default::default() };

        assert!(format_blast_alignment(&read, &aln, &reference, &mut Vec::<u8>::new()).is_err());
    }
}
