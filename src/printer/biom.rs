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

//! Static header fields of a BIOM 1.0 table.
//!
//! Only the fixed fields are written; the `rows`, `shape` and `data` entries
//! are left open for the caller.
//!
use std::io::Write;

type E = Box<dyn std::error::Error>;

const GENERATED_BY: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// Writes the BIOM header fields to `conn`.
pub fn format_biom_header<W: Write + ?Sized>(
    conn: &mut W,
) -> Result<(), E> {
    let mut formatted: String = String::new();
    formatted += "\"id:\"null,";
    formatted += "\"format\": \"Biological Observation Matrix 1.0.0\",";
    formatted += "\"format_url\": \"http://biom-format.org/documentation/format_versions/biom-1.0.html\",";
    formatted += "\"type\": \"OTU table\",";
    formatted += &format!("\"generated_by\": \"{}\",", GENERATED_BY);
    formatted += "\"date\": \"\",";
    formatted += "\"rows\":[";
    formatted += "\"matrix_type\": \"sparse\",";
    formatted += "\"matrix_element_type\": \"int\",";
    formatted += "\"shape\":";
    formatted += "\"data\":";

    conn.write_all(formatted.as_bytes())?;
    conn.flush()?;
    Ok(())
}
