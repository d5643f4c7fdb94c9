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

//! Mismatch, gap and identity counts derived from a single alignment.
//!
//! The counts are computed by walking the decoded CIGAR once from the start
//! coordinates of the alignment. Bases are compared after mapping both
//! sequences through the 5-letter alphabet in [BASE_ALPHABET].
//!
use crate::Alignment;
use crate::cigar::CigarDecoder;
use crate::cigar::CigarOp;

type E = Box<dyn std::error::Error>;

/// Letters used to print and compare bases.
pub const BASE_ALPHABET: [u8; 5] = *b"ACGTN";

#[derive(Debug, Clone)]
pub struct AlignmentBoundsError {
    pub(crate) message: String,
}

impl std::fmt::Display for AlignmentBoundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "alignment out of bounds: {}", self.message)
    }
}

impl std::error::Error for AlignmentBoundsError {}

#[derive(Debug, Clone)]
pub struct ZeroLengthRead;

impl std::fmt::Display for ZeroLengthRead {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "read has length zero")
    }
}

impl std::error::Error for ZeroLengthRead {}

/// Map a sequence byte to a letter in [BASE_ALPHABET].
///
/// Accepts both letters (any case, `U` is read as `T`) and the integer codes
/// 0..=4 used by the search engine. Everything else becomes `N`.
pub fn normalize_base(
    base: u8,
) -> u8 {
    match base {
        0..=4 => BASE_ALPHABET[base as usize],
        b'A' | b'a' => b'A',
        b'C' | b'c' => b'C',
        b'G' | b'g' => b'G',
        b'T' | b't' | b'U' | b'u' => b'T',
        _ => b'N',
    }
}

/// Counts derived from walking the CIGAR of one alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedMetrics {
    /// Match positions where the bases differ.
    pub mismatches: usize,
    /// Total length of insertions and deletions.
    pub gaps: usize,
    /// Match positions where the bases are identical.
    pub identity: usize,
}

impl DerivedMetrics {
    /// Percentage of identical bases among the match positions.
    ///
    /// Returns 0 for an alignment without match positions.
    pub fn percent_identity(&self) -> f64 {
        let compared = self.identity + self.mismatches;
        if compared == 0 {
            return 0.0
        }
        self.identity as f64 / compared as f64 * 100.0
    }

    /// Edit distance to the reference (NM).
    pub fn edit_distance(&self) -> usize {
        self.mismatches + self.gaps
    }
}

fn out_of_bounds(
    what: &str,
    pos: usize,
    len: usize,
) -> E {
    Box::new(AlignmentBoundsError{ message: format!("{} position {} past sequence length {}", what, pos, len) })
}

/// Compute the [DerivedMetrics] of `aln`
///
/// `reference` and `read` are the full sequences the alignment coordinates
/// refer to.
///
/// Terminates with an [AlignmentBoundsError] if the CIGAR walks past either
/// sequence or does not end at the last aligned position of both sequences.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::Alignment;
/// use alnfmt::cigar::parse_cigar;
/// use alnfmt::metrics::compute_metrics;
///
/// let aln = Alignment{ ref_begin: 0, ref_end: 4, read_begin: 0, read_end: 4, cigar: parse_cigar("5M").unwrap(), ..Default::default() };
/// let metrics = compute_metrics(&aln, b"ACGTA", b"ACGAA").unwrap();
///
/// assert_eq!(metrics.mismatches, 1);
/// assert_eq!(metrics.identity, 4);
/// assert_eq!(metrics.percent_identity(), 80.0);
/// ```
///
pub fn compute_metrics(
    aln: &Alignment,
    reference: &[u8],
    read: &[u8],
) -> Result<DerivedMetrics, E> {
    let mut metrics = DerivedMetrics::default();
    let mut ref_pos = aln.ref_begin;
    let mut read_pos = aln.read_begin;

    for op in CigarDecoder::new(&aln.cigar) {
        let (op, len) = op?;
        let len = len as usize;
        if op.consumes_reference() && ref_pos + len > reference.len() {
            return Err(out_of_bounds("reference", ref_pos + len, reference.len()))
        }
        if op.consumes_read() && read_pos + len > read.len() {
            return Err(out_of_bounds("read", read_pos + len, read.len()))
        }
        match op {
            CigarOp::Match => {
                reference[ref_pos..(ref_pos + len)].iter().zip(read[read_pos..(read_pos + len)].iter()).for_each(|(x, y)| {
                    if normalize_base(*x) == normalize_base(*y) {
                        metrics.identity += 1;
                    } else {
                        metrics.mismatches += 1;
                    }
                });
                ref_pos += len;
                read_pos += len;
            },
            CigarOp::Insertion => {
                read_pos += len;
                metrics.gaps += len;
            },
            CigarOp::Deletion => {
                ref_pos += len;
                metrics.gaps += len;
            },
        }
    }

    if ref_pos != aln.ref_end + 1 || read_pos != aln.read_end + 1 {
        return Err(Box::new(AlignmentBoundsError{
            message: format!("cigar ends at reference {} and read {}, expected {} and {}", ref_pos, read_pos, aln.ref_end + 1, aln.read_end + 1)
        }))
    }

    Ok(metrics)
}

/// Percentage of the read covered by `aln`.
///
/// Terminates with [ZeroLengthRead] if `read_len` is 0.
pub fn query_coverage(
    aln: &Alignment,
    read_len: usize,
) -> Result<f64, E> {
    if read_len == 0 {
        return Err(Box::new(ZeroLengthRead{}))
    }
    if aln.read_end >= read_len || aln.read_end < aln.read_begin {
        return Err(out_of_bounds("read", aln.read_end, read_len))
    }
    Ok(100.0 * aln.alignment_length() as f64 / read_len as f64)
}
