//! Configuration module.
//!
//! This module defines the command-line interface of the validator using `clap`.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::check::PageSize;

/// Where program headers and the section-to-segment mapping come from.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Parse the ELF structures directly
    Elf,
    /// Parse the output of `readelf -W --segments`
    Readelf,
}

/// Checks that every LOAD and RELRO segment of an ELF binary is page aligned.
///
/// Exits 0 without output when the binary passes. On the first misaligned segment it prints the
/// segment, the sections it contains and a section header dump to stderr and exits 1.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Binary to check
    pub binary: PathBuf,

    /// Page size the segments must be aligned to (decimal or 0x hex)
    #[arg(short, long, default_value = "4096")]
    pub page_size: PageSize,

    /// Data source for the program header table
    #[arg(long, value_enum, default_value_t = Source::Elf)]
    pub source: Source,

    /// readelf executable used by `--source readelf`
    #[arg(long, default_value = "readelf")]
    pub readelf: PathBuf,

    /// objdump executable used for the section header dump
    #[arg(long, default_value = "objdump")]
    pub objdump: PathBuf,

    /// Report every misaligned segment instead of stopping at the first
    #[arg(long)]
    pub all: bool,

    /// Do not append the objdump section header dump to the report
    #[arg(long)]
    pub no_section_dump: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", help = "Set the logging level")]
    pub log_level: String,

    /// Extra flags forwarded to readelf and objdump
    #[arg(last = true, allow_hyphen_values = true)]
    pub tool_args: Vec<String>,
}
