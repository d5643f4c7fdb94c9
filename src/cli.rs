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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Format alignments as a report
    Report {
        // Tab-separated alignment table
        #[arg(group = "input", required = true, help = "Alignment table")]
        alignments: PathBuf,

        // Reads that were aligned
        #[arg(short = 'r', long = "reads", required = true)]
        reads: PathBuf,

        // Reference sequences the reads were aligned against
        #[arg(short = 'R', long = "references", required = true)]
        references: PathBuf,

        // Output format, defaults to tabular
        #[arg(long = "format", default_value = "tabular", help = "pairwise, tabular or sam")]
        format: String,

        // Optional tabular columns
        #[arg(long = "columns", value_delimiter = ',', help = "Comma-separated list of cigar, qcov, qstrand")]
        columns: Vec<String>,

        // Print null records for unaligned reads
        #[arg(long = "print-all-reads", default_value_t = false)]
        print_all_reads: bool,

        // Output file path, defaults to stdout
        #[arg(short = 'o', long = "output", required = false)]
        out_file: Option<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Split reads by alignment status
    Partition {
        // Input fasta or fastq file
        #[arg(group = "input", required = true, help = "Input reads")]
        reads: PathBuf,

        // Tab-separated alignment table, reads listed here are aligned
        #[arg(short = 'a', long = "alignments", required = true)]
        alignments: PathBuf,

        // File listing the ids of de novo candidate reads, one per line
        #[arg(long = "denovo-ids", required = false)]
        denovo_ids: Option<PathBuf>,

        // Output files
        #[arg(long = "aligned", required = false)]
        aligned_out: Option<PathBuf>,
        #[arg(long = "other", required = false)]
        other_out: Option<PathBuf>,
        #[arg(long = "denovo", required = false)]
        denovo_out: Option<PathBuf>,

        // Pairing mode
        #[arg(long = "pairing", default_value = "none", help = "none, pairedin or pairedout")]
        pairing: String,

        // Compress output files with gzip
        #[arg(short = 'z', long = "gzip", default_value_t = false)]
        compress: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Write the BIOM header
    Biom {
        // Output file path
        #[arg(short = 'o', long = "output", required = true)]
        out_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
