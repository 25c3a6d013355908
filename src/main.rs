//! Entry point for the segalign validator.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Pick the header source (direct ELF parse or readelf).
//! 3. Validate the binary and, on failure, report to stderr with a section header dump.
//!
//! A passing binary produces no output and exit code 0. Violations and errors exit with 1.
//! Error handling is done via `anyhow`.

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use segalign::check::Validation;
use segalign::config::{Config, Source};
use segalign::extract::{ElfParser, HeaderSource, Readelf};
use segalign::report;
use segalign::tool::Tool;
use segalign::validator::Validator;

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| anyhow!("invalid log level {:?}: {}", level, e))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run<S: HeaderSource>(validator: Validator<S>, config: &Config) -> Result<ExitCode> {
    let violations = if config.all {
        validator.validate_all(&config.binary)?
    } else {
        match validator.validate(&config.binary)? {
            Validation::Ok => Vec::new(),
            Validation::Violation(violation) => vec![violation],
        }
    };

    if violations.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }

    eprint!("{}", report::render_all(&violations, validator.page_size()));
    if !config.no_section_dump {
        let objdump = Tool::new(config.objdump.clone());
        let dump = report::section_headers(&objdump, &config.tool_args, &config.binary)?;
        eprintln!("{}", dump);
    }
    Ok(ExitCode::FAILURE)
}

fn main() -> Result<ExitCode> {
    let config = Config::parse();
    init_logging(&config.log_level)?;

    match config.source {
        Source::Elf => run(Validator::new(ElfParser, config.page_size), &config),
        Source::Readelf => {
            let readelf = Readelf::new(Tool::new(config.readelf.clone()), config.tool_args.clone());
            run(Validator::new(readelf, config.page_size), &config)
        }
    }
}
