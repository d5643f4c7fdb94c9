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

//! Splitting a read file into aligned, unaligned and de novo subsets.
//!
//! The input is indexed into records with [index_fastx] and every record is
//! written verbatim, including its line terminators, to the stream its hit
//! status selects. In paired mode the reads are expected to be interleaved,
//! mate 1 of pair `k` at index `2k` and mate 2 at `2k + 1`, and both mates
//! always go to the same stream.
//!
use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::time::Instant;

use roaring::RoaringBitmap;

use crate::output::OutputKind;
use crate::output::OutputStreams;

type E = Box<dyn std::error::Error>;

/// How mates of a read pair are routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingMode {
    /// Reads are routed independently.
    #[default]
    None,
    /// A pair is aligned if either mate aligned.
    PairedIn,
    /// A pair is aligned only if both mates aligned.
    PairedOut,
}

impl PairingMode {
    pub fn is_paired(&self) -> bool {
        !matches!(self, PairingMode::None)
    }
}

impl std::str::FromStr for PairingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PairingMode::None),
            "pairedin" | "paired-in" => Ok(PairingMode::PairedIn),
            "pairedout" | "paired-out" => Ok(PairingMode::PairedOut),
            _ => Err(format!("'{}' is not a valid PairingMode", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnrecognizedInputFormat;

impl std::fmt::Display for UnrecognizedInputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "input is not FASTA or FASTQ")
    }
}

impl std::error::Error for UnrecognizedInputFormat {}

#[derive(Debug, Clone)]
pub struct FastqFramingError {
    record: usize,
}

impl std::fmt::Display for FastqFramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "FASTQ record {} is not made of 4 lines", self.record)
    }
}

impl std::error::Error for FastqFramingError {}

#[derive(Debug, Clone)]
pub struct UnpairedReads {
    n_reads: usize,
}

impl std::fmt::Display for UnpairedReads {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "paired mode needs an even number of reads, got {}", self.n_reads)
    }
}

impl std::error::Error for UnpairedReads {}

/// Indices of reads that satisfy a hit criterion.
#[derive(Debug, Clone, Default)]
pub struct ReadHitSet {
    bits: RoaringBitmap,
}

impl ReadHitSet {
    pub fn new() -> Self {
        ReadHitSet::default()
    }

    /// Set with the reads whose entry in `hits` is true.
    pub fn from_bools(
        hits: &[bool],
    ) -> Self {
        hits.iter().enumerate().filter(|(_, hit)| **hit).map(|(idx, _)| idx as u32).collect()
    }

    pub fn from_indices(
        indices: &[u32],
    ) -> Self {
        indices.iter().copied().collect()
    }

    pub fn insert(
        &mut self,
        read_idx: u32,
    ) -> bool {
        self.bits.insert(read_idx)
    }

    pub fn contains(
        &self,
        read_idx: usize,
    ) -> bool {
        u32::try_from(read_idx).is_ok_and(|idx| self.bits.contains(idx))
    }

    /// Read indices in increasing order.
    pub fn iter(&self) -> impl Iterator<Item=u32> + '_ {
        self.bits.iter()
    }

    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

impl FromIterator<u32> for ReadHitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bits = RoaringBitmap::from_iter(iter);
        bits.optimize();
        ReadHitSet{ bits }
    }
}

/// Byte ranges of the records in a FASTA or FASTQ buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSpans {
    /// Whole record, from the header marker to the end of its last line.
    spans: Vec<Range<usize>>,
    /// Header up to the first whitespace, without the marker.
    ids: Vec<Range<usize>>,
}

impl ReadSpans {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn span(
        &self,
        read_idx: usize,
    ) -> Option<Range<usize>> {
        self.spans.get(read_idx).cloned()
    }

    /// Bytes of record `read_idx` in `data`.
    pub fn record<'a>(
        &self,
        data: &'a [u8],
        read_idx: usize,
    ) -> Option<&'a [u8]> {
        self.spans.get(read_idx).and_then(|span| data.get(span.clone()))
    }

    /// Id of record `read_idx` in `data`.
    pub fn id<'a>(
        &self,
        data: &'a [u8],
        read_idx: usize,
    ) -> Option<&'a [u8]> {
        self.ids.get(read_idx).and_then(|span| data.get(span.clone()))
    }
}

fn next_line(
    data: &[u8],
    start: usize,
) -> usize {
    match data[start..].iter().position(|x| *x == b'\n') {
        Some(pos) => start + pos + 1,
        None => data.len(),
    }
}

fn header_id(
    data: &[u8],
    start: usize,
) -> Range<usize> {
    let from = start + 1;
    let len = data[from..].iter().position(|x| x.is_ascii_whitespace()).unwrap_or(data.len() - from);
    from..(from + len)
}

/// Index the records in `data`
///
/// FASTA records start at each line beginning with `>` and extend to the
/// next such line. FASTQ records are exactly 4 lines with the first one
/// starting with `@` and the third with `+`.
///
/// Terminates with [UnrecognizedInputFormat] if `data` is not empty and
/// starts with neither `>` nor `@`, or with [FastqFramingError] if a FASTQ
/// record is truncated or malformed.
///
/// ## Usage
///
/// ```rust
/// use alnfmt::partition::index_fastx;
///
/// let data = b">r1 a\nACGT\nAC\n>r2\nTTTT\n";
/// let spans = index_fastx(data).unwrap();
///
/// assert_eq!(spans.len(), 2);
/// assert_eq!(spans.record(data, 0).unwrap(), b">r1 a\nACGT\nAC\n");
/// assert_eq!(spans.id(data, 1).unwrap(), b"r2");
/// ```
///
pub fn index_fastx(
    data: &[u8],
) -> Result<ReadSpans, E> {
    let mut index = ReadSpans::default();
    match data.first() {
        None => (),
        Some(b'>') => {
            let mut start = 0;
            let mut pos = 0;
            while pos < data.len() {
                let end = next_line(data, pos);
                if end < data.len() && data[end] == b'>' {
                    index.ids.push(header_id(data, start));
                    index.spans.push(start..end);
                    start = end;
                }
                pos = end;
            }
            index.ids.push(header_id(data, start));
            index.spans.push(start..data.len());
        },
        Some(b'@') => {
            let mut start = 0;
            while start < data.len() {
                let record = index.spans.len();
                let mut end = start;
                for line in 0..4 {
                    if end >= data.len() {
                        return Err(Box::new(FastqFramingError{ record }))
                    }
                    let marker = data[end];
                    if (line == 0 && marker != b'@') || (line == 2 && marker != b'+') {
                        return Err(Box::new(FastqFramingError{ record }))
                    }
                    end = next_line(data, end);
                }
                index.ids.push(header_id(data, start));
                index.spans.push(start..end);
                start = end;
            }
        },
        Some(_) => return Err(Box::new(UnrecognizedInputFormat{})),
    }
    Ok(index)
}

/// Which output stream a selection is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Aligned,
    Other,
    Denovo,
}

/// Indices of the reads that go to the stream of `selection`
///
/// `hits` holds the aligned reads for [Selection::Aligned] and
/// [Selection::Other], and the de novo candidates for [Selection::Denovo].
///
/// Single reads are selected by their own hit status. Pairs are selected
/// together:
///   - aligned: both mates hit, or either mate with [PairingMode::PairedIn].
///   - other: neither mate hit, or exactly one with [PairingMode::PairedOut].
///   - denovo: either mate with [PairingMode::PairedIn], both with [PairingMode::PairedOut].
///
/// Earlier releases wrote no de novo pairs at all with
/// [PairingMode::PairedOut]; pairs where both mates are candidates are now
/// written.
///
/// Terminates with [UnpairedReads] if a paired mode is used on an odd
/// number of reads.
///
pub fn select_reads(
    n_reads: usize,
    hits: &ReadHitSet,
    pairing: PairingMode,
    selection: Selection,
) -> Result<Vec<usize>, E> {
    if !pairing.is_paired() {
        let selected = (0..n_reads).filter(|idx| match selection {
            Selection::Other => !hits.contains(*idx),
            Selection::Aligned | Selection::Denovo => hits.contains(*idx),
        }).collect();
        return Ok(selected)
    }

    if n_reads % 2 != 0 {
        return Err(Box::new(UnpairedReads{ n_reads }))
    }

    let paired_in = pairing == PairingMode::PairedIn;
    let paired_out = pairing == PairingMode::PairedOut;
    let mut selected: Vec<usize> = Vec::new();
    for first in (0..n_reads).step_by(2) {
        let a = hits.contains(first);
        let b = hits.contains(first + 1);
        let keep = match selection {
            Selection::Aligned => (a && b) || ((a || b) && paired_in),
            Selection::Other => (!a && !b) || ((a ^ b) && paired_out),
            Selection::Denovo => if paired_in { a || b } else { a && b },
        };
        if keep {
            selected.push(first);
            selected.push(first + 1);
        }
    }
    Ok(selected)
}

/// Routes the records of one read file to output streams.
pub struct ReadPartitioner<'a> {
    data: &'a [u8],
    spans: ReadSpans,
    pairing: PairingMode,
}

impl<'a> ReadPartitioner<'a> {
    /// Index `data` for partitioning
    ///
    /// Terminates with [UnpairedReads] if `pairing` is a paired mode and
    /// `data` holds an odd number of reads.
    pub fn new(
        data: &'a [u8],
        pairing: PairingMode,
    ) -> Result<Self, E> {
        let spans = index_fastx(data)?;
        if pairing.is_paired() && spans.len() % 2 != 0 {
            return Err(Box::new(UnpairedReads{ n_reads: spans.len() }))
        }
        log::debug!("Indexed {} reads", spans.len());
        Ok(ReadPartitioner{ data, spans, pairing })
    }

    pub fn n_reads(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &ReadSpans {
        &self.spans
    }

    /// Hit set of the reads whose id is in `ids`.
    pub fn hits_from_ids<'b, I>(
        &self,
        ids: I,
    ) -> ReadHitSet where I: IntoIterator<Item=&'b str> {
        let mut by_id: HashMap<&[u8], Vec<u32>> = HashMap::with_capacity(self.spans.len());
        for read_idx in 0..self.spans.len() {
            if let Some(id) = self.spans.id(self.data, read_idx) {
                by_id.entry(id).or_default().push(read_idx as u32);
            }
        }
        let mut hits = ReadHitSet::new();
        ids.into_iter().for_each(|id| {
            if let Some(indices) = by_id.get(id.as_bytes()) {
                indices.iter().for_each(|idx| { hits.insert(*idx); });
            }
        });
        hits
    }

    /// Write the records selected by `hits` and `selection` to `conn`
    ///
    /// Records are written in input order. A final record without a line
    /// terminator gets one.
    ///
    /// Returns the number of records written.
    pub fn write_selected<W: Write + ?Sized>(
        &self,
        hits: &ReadHitSet,
        selection: Selection,
        conn: &mut W,
    ) -> Result<usize, E> {
        let selected = select_reads(self.spans.len(), hits, self.pairing, selection)?;
        for read_idx in selected.iter() {
            if let Some(record) = self.spans.record(self.data, *read_idx) {
                conn.write_all(record)?;
                if record.last().is_some_and(|x| *x != b'\n') {
                    conn.write_all(b"\n")?;
                }
            }
        }
        Ok(selected.len())
    }

    /// Write the aligned, other and de novo records to `streams`
    ///
    /// Kinds that are not open in `streams` are skipped. De novo reads are
    /// only written if `denovo` is given.
    ///
    pub fn partition_to_streams(
        &self,
        hits: &ReadHitSet,
        denovo: Option<&ReadHitSet>,
        streams: &mut OutputStreams,
    ) -> Result<(), E> {
        let targets = [
            (OutputKind::Aligned, Selection::Aligned, Some(hits), "aligned"),
            (OutputKind::Other, Selection::Other, Some(hits), "not-aligned"),
            (OutputKind::Denovo, Selection::Denovo, denovo, "de novo"),
        ];

        for (kind, selection, hit_set, description) in targets {
            let Some(hit_set) = hit_set else { continue };
            if !streams.is_open(kind) {
                continue;
            }
            log::info!("Writing {} FASTA/FASTQ", description);
            let start = Instant::now();
            let conn = streams.get(kind)?;
            let n_written = self.write_selected(hit_set, selection, conn)?;
            conn.flush()?;
            log::info!("Wrote {} {} reads [{:.2} sec]", n_written, description, start.elapsed().as_secs_f64());
        }

        Ok(())
    }
}
