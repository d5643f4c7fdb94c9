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

// Alignment table
pub mod alignments;

use std::collections::HashMap;
use std::io::Read as IoRead;

use crate::Read;
use crate::ReferenceEntry;
use crate::References;
use crate::Strand;
use crate::parser::alignments::AlignmentRow;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct UnknownRead {
    read_id: String,
}

impl std::fmt::Display for UnknownRead {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "alignment for read {} which is not in the reads file", self.read_id)
    }
}

impl std::error::Error for UnknownRead {}

/// Read all sequences from a FASTA or FASTQ stream
///
/// Returns the full header line, the sequence and the quality string, if
/// any, of every record in the order they appear.
///
pub fn read_fastx<R: IoRead + Send>(
    conn: R,
) -> Result<Vec<(String, Vec<u8>, Option<Vec<u8>>)>, E> {
    let mut reader = needletail::parse_fastx_reader(conn)?;
    let mut records: Vec<(String, Vec<u8>, Option<Vec<u8>>)> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record?;
        records.push((
            String::from_utf8_lossy(record.id()).to_string(),
            record.seq().to_vec(),
            record.qual().map(|qual| qual.to_vec()),
        ));
    }
    Ok(records)
}

/// Load the reference sequences from a FASTA or FASTQ stream.
pub fn read_references<R: IoRead + Send>(
    conn: R,
) -> Result<References, E> {
    let entries = read_fastx(conn)?.into_iter().map(|(header, sequence, _)| {
        ReferenceEntry{ header, sequence }
    }).collect::<Vec<ReferenceEntry>>();
    log::debug!("Read {} reference sequences", entries.len());
    Ok(References::new(entries))
}

/// Load the query reads from a FASTA or FASTQ stream.
pub fn read_queries<R: IoRead + Send>(
    conn: R,
) -> Result<Vec<Read>, E> {
    let reads = read_fastx(conn)?.into_iter().map(|(header, sequence, quality)| {
        Read{ header, sequence, quality, alignments: Vec::new() }
    }).collect::<Vec<Read>>();
    log::debug!("Read {} query sequences", reads.len());
    Ok(reads)
}

/// Reverse complement of `seq`.
///
/// Letters other than ACGTU (any case) and the codes 0..=3 become `N`.
pub fn reverse_complement(
    seq: &[u8],
) -> Vec<u8> {
    seq.iter().rev().map(|base| match base {
        b'A' | b'a' | 0 => b'T',
        b'C' | b'c' | 1 => b'G',
        b'G' | b'g' | 2 => b'C',
        b'T' | b't' | b'U' | b'u' | 3 => b'A',
        _ => b'N',
    }).collect()
}

/// Attach the alignments in `rows` to `reads`
///
/// Alignments keep their order in `rows`. A read with alignments on the
/// reverse strand is returned twice: once with its forward alignments and
/// once, reverse complemented, with its reverse alignments. Reads without
/// alignments are returned as is.
///
/// Terminates with [UnknownRead] if a row names a read that is not in
/// `reads`.
///
pub fn attach_alignments(
    reads: Vec<Read>,
    rows: Vec<AlignmentRow>,
) -> Result<Vec<Read>, E> {
    let mut read_to_pos: HashMap<String, usize> = HashMap::with_capacity(reads.len());
    reads.iter().enumerate().for_each(|(idx, read)| {
        read_to_pos.entry(read.id().to_string()).or_insert(idx);
    });

    let mut forward: Vec<Vec<crate::Alignment>> = vec![Vec::new(); reads.len()];
    let mut reverse: Vec<Vec<crate::Alignment>> = vec![Vec::new(); reads.len()];
    for row in rows {
        let Some(idx) = read_to_pos.get(&row.read_id) else {
            return Err(Box::new(UnknownRead{ read_id: row.read_id }))
        };
        match row.alignment.strand {
            Strand::Forward => forward[*idx].push(row.alignment),
            Strand::Reverse => reverse[*idx].push(row.alignment),
        }
    }

    let mut out: Vec<Read> = Vec::with_capacity(reads.len());
    for ((read, fwd), rev) in reads.into_iter().zip(forward).zip(reverse) {
        if fwd.is_empty() && rev.is_empty() {
            out.push(read);
            continue;
        }
        if !fwd.is_empty() {
            out.push(Read{ alignments: fwd, ..read.clone() });
        }
        if !rev.is_empty() {
            out.push(Read{ sequence: reverse_complement(&read.sequence), alignments: rev, ..read });
        }
    }
    Ok(out)
}
