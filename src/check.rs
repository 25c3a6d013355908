//! Alignment checker.
//!
//! Every LOAD or RELRO segment must have its file offset, virtual address, physical address
//! and file size on a page boundary so that page-granular protection can separate compartments.
//! Other segment kinds, and the memory size, flags and alignment fields, are not constrained.

use std::fmt;

use anyhow::{anyhow, Result};

use crate::segment::{HeaderTable, Segment};
use crate::utils::{is_aligned, parse_u64};

pub const DEFAULT_PAGE_SIZE: u64 = 0x1000;

/// The page size alignment is checked against. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u64);

impl PageSize {
    pub fn new(size: u64) -> Result<Self> {
        if size == 0 {
            return Err(anyhow!("page size must be non-zero"));
        }
        Ok(Self(size))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_aligned(self, value: u64) -> bool {
        is_aligned(value, self.0)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

impl std::str::FromStr for PageSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PageSize::new(parse_u64(s)?)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A segment field covered by the alignment invariant, in checking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FileOffset,
    VirtualAddress,
    PhysicalAddress,
    FileSize,
}

impl Field {
    pub const CHECKED: [Field; 4] = [
        Field::FileOffset,
        Field::VirtualAddress,
        Field::PhysicalAddress,
        Field::FileSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::FileOffset => "file_offset",
            Field::VirtualAddress => "virtual_address",
            Field::PhysicalAddress => "physical_address",
            Field::FileSize => "file_size",
        }
    }

    pub fn value(self, segment: &Segment) -> u64 {
        match self {
            Field::FileOffset => segment.file_offset,
            Field::VirtualAddress => segment.virtual_address,
            Field::PhysicalAddress => segment.physical_address,
            Field::FileSize => segment.file_size,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A security-relevant segment with a field off a page boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub segment_index: usize,
    pub field: Field,
    pub raw_value: u64,
    pub segment: Segment,
    pub section_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Violation(Violation),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }
}

/// Returns the first misaligned field of `segment`, if it is a kind that must be aligned.
fn misaligned_field(segment: &Segment, page_size: PageSize) -> Option<Field> {
    if !segment.kind.needs_page_alignment() {
        return None;
    }
    Field::CHECKED
        .into_iter()
        .find(|field| !page_size.is_aligned(field.value(segment)))
}

fn violations(table: &HeaderTable, page_size: PageSize) -> impl Iterator<Item = Violation> + '_ {
    table.iter().filter_map(move |(index, segment, sections)| {
        tracing::trace!("checking segment {}: {}", index, segment);
        let field = misaligned_field(segment, page_size)?;
        Some(Violation {
            segment_index: index,
            field,
            raw_value: field.value(segment),
            segment: segment.clone(),
            section_names: sections.to_vec(),
        })
    })
}

/// Scans segments in program-header order and stops at the first violation.
pub fn check(table: &HeaderTable, page_size: PageSize) -> Validation {
    match violations(table, page_size).next() {
        Some(violation) => Validation::Violation(violation),
        None => Validation::Ok,
    }
}

/// Like `check` but collects the first misaligned field of every offending segment.
pub fn check_all(table: &HeaderTable, page_size: PageSize) -> Vec<Violation> {
    violations(table, page_size).collect()
}
