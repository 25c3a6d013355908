//! Validation driver.
//!
//! `Validator` ties a `HeaderSource` to the alignment checker:
//! 1. Extraction: read the program headers and section mapping of one binary.
//! 2. Checking: apply the page alignment rule to the LOAD and RELRO segments.
//!
//! Reporting is left to the caller, which decides where diagnostics go.

use std::path::Path;

use anyhow::Result;

use crate::check::{self, PageSize, Validation, Violation};
use crate::extract::HeaderSource;
use crate::segment::HeaderTable;

pub struct Validator<S: HeaderSource> {
    source: S,
    page_size: PageSize,
}

impl<S: HeaderSource> Validator<S> {
    pub fn new(source: S, page_size: PageSize) -> Self {
        Self { source, page_size }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn extract(&self, binary: &Path) -> Result<HeaderTable> {
        self.source.extract(binary)
    }

    /// Extracts and checks `binary`, stopping at the first violation.
    pub fn validate(&self, binary: &Path) -> Result<Validation> {
        let table = self.extract(binary)?;
        let result = check::check(&table, self.page_size);
        if let Validation::Violation(v) = &result {
            tracing::debug!(
                "segment {} of {} fails on {}",
                v.segment_index,
                binary.display(),
                v.field
            );
        }
        Ok(result)
    }

    /// Extracts and checks `binary`, collecting every offending segment.
    pub fn validate_all(&self, binary: &Path) -> Result<Vec<Violation>> {
        let table = self.extract(binary)?;
        Ok(check::check_all(&table, self.page_size))
    }
}
