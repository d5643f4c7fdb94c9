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

//! Packed CIGAR operations and their decoding.
//!
//! The search engine stores each CIGAR operation in a single 32-bit word:
//! the 4 low bits hold the operation tag and the 28 high bits hold the run
//! length. Only three tags are recognized:
//!
//!   - `0`: match (consumes both the reference and the read)
//!   - `1`: insertion (gap in the reference, consumes the read)
//!   - `2`: deletion (gap in the read, consumes the reference)
//!
//! Any other tag is rejected with a [CigarDecodeError].
//!
use std::io::Write;

use crate::Alignment;
use crate::metrics::AlignmentBoundsError;

type E = Box<dyn std::error::Error>;

const TAG_MASK: u32 = 0xf;
const MAX_RUN_LENGTH: u32 = 0x0fff_ffff;

#[derive(Debug, Clone)]
pub struct CigarDecodeError {
    message: String,
}

impl std::fmt::Display for CigarDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "cigar decode error: {}", self.message)
    }
}

impl std::error::Error for CigarDecodeError {}

/// Operations that can appear in an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
}

impl CigarOp {
    pub fn from_tag(tag: u32) -> Result<Self, E> {
        match tag {
            0 => Ok(CigarOp::Match),
            1 => Ok(CigarOp::Insertion),
            2 => Ok(CigarOp::Deletion),
            _ => Err(Box::new(CigarDecodeError{ message: format!("unrecognized opcode {}", tag) })),
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            CigarOp::Match => 0,
            CigarOp::Insertion => 1,
            CigarOp::Deletion => 2,
        }
    }

    /// Letter used for the operation in a CIGAR string.
    pub fn code(&self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
        }
    }

    pub fn consumes_reference(&self) -> bool {
        matches!(self, CigarOp::Match | CigarOp::Deletion)
    }

    pub fn consumes_read(&self) -> bool {
        matches!(self, CigarOp::Match | CigarOp::Insertion)
    }
}

/// A single packed CIGAR word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedCigarOp(pub u32);

impl PackedCigarOp {
    /// Packs `op` with `run_length`.
    ///
    /// Terminates with a [CigarDecodeError] if `run_length` is zero or does
    /// not fit in 28 bits.
    pub fn new(
        op: CigarOp,
        run_length: u32,
    ) -> Result<Self, E> {
        if run_length == 0 || run_length > MAX_RUN_LENGTH {
            return Err(Box::new(CigarDecodeError{ message: format!("run length {} out of range", run_length) }))
        }
        Ok(PackedCigarOp((run_length << 4) | op.tag()))
    }

    pub fn tag(&self) -> u32 {
        self.0 & TAG_MASK
    }

    pub fn run_length(&self) -> u32 {
        self.0 >> 4
    }

    /// Unpacks the word into its operation and run length.
    pub fn decode(
        &self,
    ) -> Result<(CigarOp, u32), E> {
        let op = CigarOp::from_tag(self.tag())?;
        let run_length = self.run_length();
        if run_length == 0 {
            return Err(Box::new(CigarDecodeError{ message: format!("zero run length in word {:#x}", self.0) }))
        }
        Ok((op, run_length))
    }
}

/// Lazy view over a packed CIGAR that yields `(operation, run length)` pairs
/// in their original order.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::cigar::{CigarDecoder, CigarOp, PackedCigarOp};
///
/// let packed = vec![PackedCigarOp(3 << 4), PackedCigarOp((2 << 4) | 1)];
/// let decoded: Vec<(CigarOp, u32)> = CigarDecoder::new(&packed).map(|op| op.unwrap()).collect();
///
/// assert_eq!(decoded, vec![(CigarOp::Match, 3), (CigarOp::Insertion, 2)]);
/// ```
///
pub struct CigarDecoder<'a> {
    ops: std::slice::Iter<'a, PackedCigarOp>,
}

impl<'a> CigarDecoder<'a> {
    pub fn new(
        ops: &'a [PackedCigarOp],
    ) -> Self {
        CigarDecoder{ ops: ops.iter() }
    }
}

impl Iterator for CigarDecoder<'_> {
    type Item = Result<(CigarOp, u32), E>;

    fn next(
        &mut self,
    ) -> Option<Result<(CigarOp, u32), E>> {
        self.ops.next().map(|op| op.decode())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ops.size_hint()
    }
}

/// Decodes every word in `ops`, failing on the first malformed one.
pub fn decode_cigar(
    ops: &[PackedCigarOp],
) -> Result<Vec<(CigarOp, u32)>, E> {
    CigarDecoder::new(ops).collect()
}

/// Returns the number of reference and read positions consumed by `ops`.
pub fn consumed_lengths(
    ops: &[(CigarOp, u32)],
) -> (usize, usize) {
    ops.iter().fold((0, 0), |(on_ref, on_read), (op, len)| {
        let len = *len as usize;
        (on_ref + if op.consumes_reference() { len } else { 0 },
         on_read + if op.consumes_read() { len } else { 0 })
    })
}

/// Parse a CIGAR string into packed words.
///
/// Accepts `M`, `=` and `X` as matches, `I` and `D` as gaps. Soft and hard
/// clips (`S`, `H`) are skipped because the clipped regions are implied by
/// the alignment coordinates.
pub fn parse_cigar(
    cigar: &str,
) -> Result<Vec<PackedCigarOp>, E> {
    let mut ops: Vec<PackedCigarOp> = Vec::new();
    let mut run_length: u32 = 0;
    let mut has_digits = false;

    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            run_length = run_length.checked_mul(10).and_then(|x| x.checked_add(digit))
                .ok_or_else(|| CigarDecodeError{ message: format!("run length overflow in {}", cigar) })?;
            has_digits = true;
            continue;
        }
        if !has_digits {
            return Err(Box::new(CigarDecodeError{ message: format!("missing run length before '{}' in {}", c, cigar) }))
        }
        match c {
            'M' | '=' | 'X' => ops.push(PackedCigarOp::new(CigarOp::Match, run_length)?),
            'I' => ops.push(PackedCigarOp::new(CigarOp::Insertion, run_length)?),
            'D' => ops.push(PackedCigarOp::new(CigarOp::Deletion, run_length)?),
            'S' | 'H' => (),
            _ => return Err(Box::new(CigarDecodeError{ message: format!("unrecognized operation '{}' in {}", c, cigar) })),
        }
        run_length = 0;
        has_digits = false;
    }

    if has_digits {
        return Err(Box::new(CigarDecodeError{ message: format!("trailing run length in {}", cigar) }))
    }

    Ok(ops)
}

/// Format the CIGAR string of `aln` on a read of length `read_len`
///
/// Unaligned prefixes and suffixes of the read are written as soft clips.
///
pub fn format_cigar<W: Write>(
    aln: &Alignment,
    read_len: usize,
    conn: &mut W,
) -> Result<(), E> {
    if aln.read_end >= read_len {
        return Err(Box::new(AlignmentBoundsError{ message: format!("read end {} past read length {}", aln.read_end, read_len) }))
    }

    let mut formatted: String = String::new();
    if aln.read_begin != 0 {
        formatted += &aln.read_begin.to_string();
        formatted += "S";
    }
    for op in CigarDecoder::new(&aln.cigar) {
        let (op, len) = op?;
        formatted += &len.to_string();
        formatted.push(op.code());
    }
    let end_mask = read_len - aln.read_end - 1;
    if end_mask > 0 {
        formatted += &end_mask.to_string();
        formatted += "S";
    }

    conn.write_all(formatted.as_bytes())?;
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn decode_packed_words() {
        use super::decode_cigar;
        use super::CigarOp;
        use super::PackedCigarOp;

        let data = vec![PackedCigarOp(34 << 4), PackedCigarOp((1 << 4) | 1), PackedCigarOp((5 << 4) | 2)];
        let expected = vec![(CigarOp::Match, 34), (CigarOp::Insertion, 1), (CigarOp::Deletion, 5)];

        let got = decode_cigar(&data).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn error_if_unknown_opcode() {
        use super::CigarDecoder;
        use super::PackedCigarOp;

        let data = vec![PackedCigarOp(3 << 4), PackedCigarOp((3 << 4) | 4)];
        let mut decoder = CigarDecoder::new(&data);

        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn error_if_zero_run_length() {
        use super::PackedCigarOp;
        use super::CigarOp;

        assert!(PackedCigarOp(1).decode().is_err());
        assert!(PackedCigarOp::new(CigarOp::Match, 0).is_err());
        assert!(PackedCigarOp::new(CigarOp::Match, 1 << 28).is_err());
    }

    #[test]
    fn pack_matches_layout() {
        use super::CigarOp;
        use super::PackedCigarOp;

        let got = PackedCigarOp::new(CigarOp::Deletion, 151).unwrap();

        assert_eq!(got, PackedCigarOp((151 << 4) | 2));
        assert_eq!(got.run_length(), 151);
        assert_eq!(got.tag(), 2);
    }

    #[test]
    fn parse_cigar_string() {
        use super::parse_cigar;
        use super::decode_cigar;
        use super::CigarOp;

        let got = decode_cigar(&parse_cigar("2S3M2I3=1X4D").unwrap()).unwrap();
        let expected = vec![(CigarOp::Match, 3), (CigarOp::Insertion, 2), (CigarOp::Match, 3), (CigarOp::Match, 1), (CigarOp::Deletion, 4)];

        assert_eq!(got, expected);
    }

    #[test]
    fn error_if_malformed_cigar_string() {
        use super::parse_cigar;

        assert!(parse_cigar("M3").is_err());
        assert!(parse_cigar("3M2").is_err());
        assert!(parse_cigar("3N").is_err());
        assert!(parse_cigar("0M").is_err());
    }

    #[test]
    fn consumed_lengths_of_gapped_cigar() {
        use super::consumed_lengths;
        use super::CigarOp;

        let ops = vec![(CigarOp::Match, 3), (CigarOp::Insertion, 2), (CigarOp::Match, 3), (CigarOp::Deletion, 4)];

        assert_eq!(consumed_lengths(&ops), (10, 8));
    }

    #[test]
    fn format_cigar_with_soft_clips() {
        use super::format_cigar;
        use super::parse_cigar;
        use crate::Alignment;

        let aln = Alignment{ read_begin: 2, read_end: 9, ref_begin: 0, ref_end: 5, cigar: parse_cigar("3M2I3M").unwrap(), ..Default::default() };

        let mut got: Vec<u8> = Vec::new();
        format_cigar(&aln, 12, &mut got).unwrap();

        assert_eq!(got, b"2S3M2I3M2S".to_vec());
    }

    #[test]
    fn format_cigar_without_soft_clips() {
        use super::format_cigar;
        use super::parse_cigar;
        use crate::Alignment;

        let aln = Alignment{ read_begin: 0, read_end: 7, ref_begin: 0, ref_end: 5, cigar: parse_cigar("3M2I3M").unwrap(), ..Default::default() };

        let mut got: Vec<u8> = Vec::new();
        format_cigar(&aln, 8, &mut got).unwrap();

        assert_eq!(got, b"3M2I3M".to_vec());
    }

    #[test]
    fn error_if_alignment_past_read_end() {
        use super::format_cigar;
        use super::parse_cigar;
        use crate::Alignment;

        let aln = Alignment{ read_begin: 0, read_end: 7, cigar: parse_cigar("8M").unwrap(), ..Default::default() };

        assert!(format_cigar(&aln, 0, &mut Vec::<u8>::new()).is_err());
        assert!(format_cigar(&aln, 7, &mut Vec::<u8>::new()).is_err());
    }
}
