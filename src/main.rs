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
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::path::Path;

use clap::CommandFactory;
use clap::Parser;
use flate2::read::MultiGzDecoder;

use alnfmt::Format;
use alnfmt::ReportConfig;
use alnfmt::TabularColumn;
use alnfmt::output::OutputKind;
use alnfmt::output::OutputStreamUnavailable;
use alnfmt::output::OutputStreams;
use alnfmt::partition::PairingMode;
use alnfmt::partition::ReadPartitioner;

mod cli;

type E = Box<dyn std::error::Error>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) -> Result<(), E> {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()?;
    Ok(())
}

/// Reads all of `path`, decompressing gzip input.
fn read_all(path: &Path) -> Result<Vec<u8>, E> {
    let mut bytes: Vec<u8> = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut inflated: Vec<u8> = Vec::new();
        MultiGzDecoder::new(bytes.as_slice()).read_to_end(&mut inflated)?;
        return Ok(inflated)
    }
    Ok(bytes)
}

/// Truncates `path` and opens it as `kind` in `streams`.
fn open_output(
    streams: &mut OutputStreams,
    kind: OutputKind,
    path: &Path,
    compress: bool,
) -> Result<(), E> {
    File::create(path).map_err(|e| OutputStreamUnavailable::open_failed(kind, path, &e))?;
    streams.open(kind, path, compress)
}

fn run(cli: cli::Cli) -> Result<(), E> {
    // Subcommands:
    match cli.command {
        // Report
        Some(cli::Commands::Report {
            alignments,
            reads,
            references,
            format,
            columns,
            print_all_reads,
            out_file,
            verbose,
        }) => {
            init_log(if verbose { 2 } else { 1 })?;

            let format = format.parse::<Format>()?;
            let columns = columns.iter().map(|x| x.parse::<TabularColumn>()).collect::<Result<Vec<TabularColumn>, String>>()?;
            let config = ReportConfig{ columns, print_all_reads };

            let references = alnfmt::parser::read_references(File::open(&references)?)?;
            let queries = alnfmt::parser::read_queries(File::open(&reads)?)?;
            let rows = alnfmt::parser::alignments::read_alignment_table(&mut File::open(&alignments)?, &references)?;
            let records = alnfmt::parser::attach_alignments(queries, rows)?;

            let mut streams = OutputStreams::new();
            match out_file {
                Some(path) => open_output(&mut streams, OutputKind::Report, &path, false)?,
                None => streams.insert(OutputKind::Report, "stdout", BufWriter::new(std::io::stdout()))?,
            }

            log::info!("Writing {} records", records.len());
            alnfmt::report_to_write(format, &config, &references, &records, streams.get(OutputKind::Report)?)?;
            streams.finish()?;
        },

        // Partition
        Some(cli::Commands::Partition {
            reads,
            alignments,
            denovo_ids,
            aligned_out,
            other_out,
            denovo_out,
            pairing,
            compress,
            verbose,
        }) => {
            init_log(if verbose { 2 } else { 1 })?;

            let pairing = pairing.parse::<PairingMode>()?;
            let data = read_all(&reads)?;
            let partitioner = ReadPartitioner::new(&data, pairing)?;

            let aligned_ids = alnfmt::parser::alignments::read_aligned_ids(&mut File::open(&alignments)?)?;
            let hits = partitioner.hits_from_ids(aligned_ids.iter().map(|x| x.as_str()));
            log::info!("{} of {} reads aligned", hits.len(), partitioner.n_reads());

            let denovo = match denovo_ids {
                Some(path) => {
                    let reader = BufReader::new(File::open(path)?);
                    let ids = reader.lines().collect::<Result<Vec<String>, std::io::Error>>()?;
                    Some(partitioner.hits_from_ids(ids.iter().map(|x| x.trim())))
                },
                None => None,
            };

            let mut streams = OutputStreams::new();
            for (kind, path) in [(OutputKind::Aligned, aligned_out), (OutputKind::Other, other_out), (OutputKind::Denovo, denovo_out)] {
                if let Some(path) = path {
                    open_output(&mut streams, kind, &path, compress)?;
                }
            }

            partitioner.partition_to_streams(&hits, denovo.as_ref(), &mut streams)?;
            streams.finish()?;
        },

        // Biom
        Some(cli::Commands::Biom {
            out_file,
            verbose,
        }) => {
            init_log(if verbose { 2 } else { 1 })?;

            let mut streams = OutputStreams::new();
            open_output(&mut streams, OutputKind::Biom, &out_file, false)?;
            alnfmt::printer::biom::format_biom_header(streams.get(OutputKind::Biom)?)?;
            streams.finish()?;
        },
        None => {
            cli::Cli::command().print_help()?;
        },
    }
    Ok(())
}

fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
