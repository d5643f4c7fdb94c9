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

use bstr::BString;
use indexmap::map::IndexMap;
use noodles_sam::{
    self as sam,
    header::record::value::{map::ReferenceSequence, Map},
};

use crate::Alignment;
use crate::Read;
use crate::ReferenceEntry;
use crate::References;
use crate::Strand;
use crate::cigar::format_cigar;
use crate::metrics::DerivedMetrics;
use crate::metrics::normalize_base;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct EmptyReferenceSequence {
    name: String,
}

impl std::fmt::Display for EmptyReferenceSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "reference sequence {} has length zero", self.name)
    }
}

impl std::error::Error for EmptyReferenceSequence {}

/// Format a single alignment in SAM format
///
/// Writes the SAM record of `aln` to `conn`. The read sequence is printed as
/// is and the quality string is reversed if `aln` is on the reverse strand.
///
/// `metrics` must have been computed from `aln`.
///
pub fn format_sam_line<W: Write>(
    read: &Read,
    aln: &Alignment,
    reference: &ReferenceEntry,
    metrics: &DerivedMetrics,
    conn: &mut W,
) -> Result<(), E> {
    let separator: char = '\t';
    let mut formatted: Vec<u8> = Vec::new();

    formatted.extend(read.id().as_bytes());
    formatted.push(separator as u8);
    formatted.extend(match aln.strand { Strand::Forward => "0", Strand::Reverse => "16" }.as_bytes());
    formatted.push(separator as u8);
    formatted.extend(reference.id().as_bytes());
    formatted.push(separator as u8);
    formatted.extend((aln.ref_begin + 1).to_string().as_bytes());
    formatted.extend(b"\t255\t");
    format_cigar(aln, read.sequence.len(), &mut formatted)?;
    formatted.extend(b"\t*\t0\t0\t");
    formatted.extend(read.sequence.iter().map(|base| normalize_base(*base)));
    formatted.push(separator as u8);
    match (&read.quality, aln.strand) {
        (Some(quality), Strand::Forward) => formatted.extend(quality.iter()),
        (Some(quality), Strand::Reverse) => formatted.extend(quality.iter().rev()),
        (None, _) => formatted.push(b'*'),
    }
    formatted.extend(format!("\tAS:i:{}\tNM:i:{}\n", aln.score, metrics.edit_distance()).as_bytes());

    conn.write_all(&formatted)?;
    Ok(())
}

/// Format a read without alignments in SAM format
pub fn format_sam_null_line<W: Write>(
    read: &Read,
    conn: &mut W,
) -> Result<(), E> {
    let mut formatted: String = String::new();
    formatted += read.id();
    formatted += "\t4\t*\t0\t0\t*\t*\t0\t0\t*\t*\n";

    conn.write_all(formatted.as_bytes())?;
    Ok(())
}

/// Builds a SAM header with one `@SQ` line per reference
///
/// Terminates with [EmptyReferenceSequence] if a reference has no bases.
pub fn build_sam_header(
    references: &References,
) -> Result<sam::Header, E> {
    let mut refs: IndexMap<BString, Map<ReferenceSequence>> = IndexMap::with_capacity(references.len());
    for reference in references.entries.iter() {
        let length = std::num::NonZeroUsize::try_from(reference.sequence.len())
            .map_err(|_| EmptyReferenceSequence{ name: reference.id().to_string() })?;
        refs.insert(BString::from(reference.id()), Map::<ReferenceSequence>::new(length));
    }

    Ok(
        sam::Header::builder()
            .set_header(Default::default())
            .set_reference_sequences(refs)
            .build()
    )
}

/// Writes `header` as SAM header lines to `conn`
pub fn format_sam_header<W: Write>(
    header: &sam::Header,
    conn: &mut W,
) -> Result<(), E> {
    let mut writer = sam::io::Writer::new(conn);
    writer.write_header(header)?;
    Ok(())
}
