//! Header-table extraction.
//!
//! A `HeaderSource` turns a binary on disk into a `HeaderTable`. Two sources exist:
//! - `ElfParser` maps the file and reads the program and section header arrays directly.
//! - `Readelf` runs `readelf -W --segments` and parses its two tables.
//!
//! Both produce the same section-to-segment mapping for well-formed binaries; the direct parser
//! applies the same containment rule readelf uses.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;
use object::elf::{self, FileHeader32, FileHeader64};
use object::read::elf::{FileHeader, ProgramHeader, SectionHeader};
use object::read::SectionIndex;
use object::{Endianness, FileKind};

use crate::error::Error;
use crate::segment::{
    HeaderTable, SectionMapping, Segment, SegmentKind, PT_GNU_MBIND_HI, PT_GNU_MBIND_LO,
    PT_GNU_SFRAME,
};
use crate::tool::Tool;
use crate::utils::parse_u64;

/// A data source for a binary's program headers and section mapping.
pub trait HeaderSource {
    fn extract(&self, path: &Path) -> Result<HeaderTable>;
}

fn malformed(err: object::read::Error) -> Error {
    Error::malformed(err.to_string())
}

/// Reads the ELF structures straight out of the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElfParser;

impl ElfParser {
    /// Parses an in-memory ELF image.
    pub fn parse(data: &[u8]) -> Result<HeaderTable> {
        match FileKind::parse(data) {
            Ok(FileKind::Elf32) => parse_elf::<FileHeader32<Endianness>>(data),
            Ok(FileKind::Elf64) => parse_elf::<FileHeader64<Endianness>>(data),
            Ok(kind) => Err(Error::malformed(format!("not an ELF file ({:?})", kind)).into()),
            Err(e) => Err(malformed(e).into()),
        }
    }
}

impl HeaderSource for ElfParser {
    fn extract(&self, path: &Path) -> Result<HeaderTable> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        // The map is dropped, and the file closed, before this returns.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map {}", path.display()))?;
        let table = ElfParser::parse(&mmap)
            .with_context(|| format!("failed to read program headers of {}", path.display()))?;
        tracing::debug!(
            "extracted {} segments from {}",
            table.segments().len(),
            path.display()
        );
        Ok(table)
    }
}

/// The parts of a section header that decide which segments it falls in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SectionRecord {
    pub name: String,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
}

impl SectionRecord {
    fn is_tls(&self) -> bool {
        self.sh_flags & u64::from(elf::SHF_TLS) != 0
    }

    fn is_alloc(&self) -> bool {
        self.sh_flags & u64::from(elf::SHF_ALLOC) != 0
    }

    fn is_nobits(&self) -> bool {
        self.sh_type == elf::SHT_NOBITS
    }

    /// `.tbss` occupies no address space outside the TLS segment.
    fn size_in(&self, p_type: u32) -> u64 {
        if self.is_tls() && self.is_nobits() && p_type != elf::PT_TLS {
            0
        } else {
            self.sh_size
        }
    }
}

/// Whether `section` belongs to the segment with type `p_type`, using the strict rule from
/// binutils so that the mapping matches `readelf --segments`.
pub(crate) fn section_in_segment(
    section: &SectionRecord,
    p_type: u32,
    segment: &Segment,
) -> bool {
    let tls = section.is_tls();
    let alloc = section.is_alloc();
    let nobits = section.is_nobits();

    if tls && nobits && p_type != elf::PT_TLS {
        return false;
    }

    let kind_ok = if tls {
        matches!(p_type, elf::PT_TLS | elf::PT_GNU_RELRO | elf::PT_LOAD)
    } else {
        p_type != elf::PT_TLS && p_type != elf::PT_PHDR
    };
    if !kind_ok {
        return false;
    }

    let alloc_only = matches!(
        p_type,
        elf::PT_LOAD
            | elf::PT_DYNAMIC
            | elf::PT_GNU_EH_FRAME
            | elf::PT_GNU_STACK
            | elf::PT_GNU_RELRO
            | PT_GNU_SFRAME
    ) || (PT_GNU_MBIND_LO..=PT_GNU_MBIND_HI).contains(&p_type);
    if !alloc && alloc_only {
        return false;
    }

    let size = section.size_in(p_type);
    let contained = |start: u64, base: u64, limit: u64| {
        start >= base
            && start - base <= limit.wrapping_sub(1)
            && (start - base)
                .checked_add(size)
                .is_some_and(|end| end <= limit)
    };

    if !nobits && !contained(section.sh_offset, segment.file_offset, segment.file_size) {
        return false;
    }
    if alloc
        && !contained(
            section.sh_addr,
            segment.virtual_address,
            segment.memory_size,
        )
    {
        return false;
    }

    // No empty sections at either edge of DYNAMIC or NOTE.
    if (p_type == elf::PT_DYNAMIC || p_type == elf::PT_NOTE)
        && section.sh_size == 0
        && segment.memory_size != 0
    {
        let file_inside = nobits
            || (section.sh_offset > segment.file_offset
                && section.sh_offset - segment.file_offset < segment.file_size);
        let vma_inside = !alloc
            || (section.sh_addr > segment.virtual_address
                && section.sh_addr - segment.virtual_address < segment.memory_size);
        return file_inside && vma_inside;
    }

    true
}

/// Section names are bytes; invalid UTF-8 is replaced rather than rejected.
fn decode_section_name(name: &[u8]) -> String {
    match String::from_utf8_lossy(name) {
        Cow::Borrowed(name) => name.to_string(),
        Cow::Owned(name) => {
            tracing::warn!("section name {:?} is not valid UTF-8", name);
            name
        }
    }
}

fn parse_elf<Elf: FileHeader<Endian = Endianness>>(data: &[u8]) -> Result<HeaderTable> {
    let header = Elf::parse(data).map_err(malformed)?;
    let endian = header.endian().map_err(malformed)?;

    let program_headers = header.program_headers(endian, data).map_err(malformed)?;
    if program_headers.is_empty() {
        return Err(Error::malformed("no program header table").into());
    }

    let sections = header.sections(endian, data).map_err(malformed)?;
    if sections.is_empty() {
        return Err(Error::malformed("no section header table").into());
    }
    let shstrndx = header.shstrndx(endian, data).map_err(malformed)?;
    if shstrndx == u32::from(elf::SHN_UNDEF) {
        return Err(Error::malformed("no section header string table").into());
    }
    let shstrtab = sections
        .section(SectionIndex(shstrndx as usize))
        .map_err(malformed)?;
    if shstrtab.sh_type(endian) != elf::SHT_STRTAB {
        return Err(Error::malformed(format!(
            "section {} is not a string table",
            shstrndx
        ))
        .into());
    }

    let mut records = Vec::with_capacity(sections.len());
    for section in sections.iter().skip(1) {
        let name = sections.section_name(endian, section).map_err(malformed)?;
        records.push(SectionRecord {
            name: decode_section_name(name),
            sh_type: section.sh_type(endian),
            sh_flags: section.sh_flags(endian).into(),
            sh_addr: section.sh_addr(endian).into(),
            sh_offset: section.sh_offset(endian).into(),
            sh_size: section.sh_size(endian).into(),
        });
    }

    let mut segments = Vec::with_capacity(program_headers.len());
    let mut mapping = Vec::with_capacity(program_headers.len());
    for ph in program_headers {
        let p_type = ph.p_type(endian);
        let segment = Segment {
            kind: SegmentKind::from_p_type(p_type),
            file_offset: ph.p_offset(endian).into(),
            virtual_address: ph.p_vaddr(endian).into(),
            physical_address: ph.p_paddr(endian).into(),
            file_size: ph.p_filesz(endian).into(),
            memory_size: ph.p_memsz(endian).into(),
            flags: ph.p_flags(endian),
            alignment: ph.p_align(endian).into(),
        };
        mapping.push(
            records
                .iter()
                .filter(|record| section_in_segment(record, p_type, &segment))
                .map(|record| record.name.clone())
                .collect(),
        );
        segments.push(segment);
    }

    Ok(HeaderTable::new(segments, SectionMapping::new(mapping))?)
}

/// Uses `readelf -W --segments` as the data source.
#[derive(Debug, Clone)]
pub struct Readelf {
    tool: Tool,
    args: Vec<String>,
}

impl Readelf {
    /// `args` are forwarded to readelf ahead of the binary path.
    pub fn new(tool: Tool, args: Vec<String>) -> Self {
        Self { tool, args }
    }
}

impl HeaderSource for Readelf {
    fn extract(&self, path: &Path) -> Result<HeaderTable> {
        let text = self.tool.run(&["-W", "--segments"], &self.args, path)?;
        let table = parse_readelf(&text).with_context(|| {
            format!(
                "failed to parse {} output for {}",
                self.tool.program().display(),
                path.display()
            )
        })?;
        tracing::debug!(
            "extracted {} segments from {} via readelf",
            table.segments().len(),
            path.display()
        );
        Ok(table)
    }
}

/// Returns the rows of the table introduced by `title`: everything after the title and its
/// column header line, up to the first blank line.
fn table_rows<'a>(lines: &[&'a str], title: &str) -> Result<Vec<&'a str>> {
    let start = lines
        .iter()
        .position(|line| line.trim() == title)
        .ok_or_else(|| Error::malformed(format!("missing {:?} table", title)))?;
    Ok(lines
        .iter()
        .skip(start + 2)
        .take_while(|line| !line.trim().is_empty())
        .copied()
        .collect())
}

fn parse_flags(tokens: &[&str]) -> u32 {
    let mut flags = 0;
    for c in tokens.iter().flat_map(|t| t.chars()) {
        match c {
            'R' => flags |= elf::PF_R,
            'W' => flags |= elf::PF_W,
            'E' => flags |= elf::PF_X,
            other => tracing::warn!("ignoring unknown segment flag {:?}", other),
        }
    }
    flags
}

fn parse_number(text: &str, row: &str) -> Result<u64> {
    parse_u64(text)
        .map_err(|_| Error::malformed(format!("bad number {:?} in {:?}", text, row)).into())
}

fn parse_segment_row(row: &str) -> Result<Segment> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 7 {
        return Err(Error::malformed(format!("short program header row {:?}", row)).into());
    }
    let last = tokens.len() - 1;
    Ok(Segment {
        kind: SegmentKind::from_label(tokens[0]),
        file_offset: parse_number(tokens[1], row)?,
        virtual_address: parse_number(tokens[2], row)?,
        physical_address: parse_number(tokens[3], row)?,
        file_size: parse_number(tokens[4], row)?,
        memory_size: parse_number(tokens[5], row)?,
        flags: parse_flags(&tokens[6..last]),
        alignment: parse_number(tokens[last], row)?,
    })
}

/// Parses the output of `readelf -W --segments`.
///
/// The program header table and the section-to-segment mapping are read independently and
/// zipped by position, so a count mismatch is an error rather than a truncation.
pub fn parse_readelf(text: &str) -> Result<HeaderTable> {
    let lines: Vec<&str> = text.lines().collect();

    let segments = table_rows(&lines, "Program Headers:")?
        .into_iter()
        // "[Requesting program interpreter: ...]" continues the INTERP row.
        .filter(|row| !row.trim_start().starts_with('['))
        .map(parse_segment_row)
        .collect::<Result<Vec<_>>>()?;

    let mut mapping = Vec::new();
    for (expected, row) in table_rows(&lines, "Section to Segment mapping:")?
        .into_iter()
        .enumerate()
    {
        let mut tokens = row.split_whitespace();
        let index = tokens
            .next()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| Error::malformed(format!("bad mapping row {:?}", row)))?;
        if index != expected {
            return Err(Error::malformed(format!(
                "mapping row {} found where {} was expected",
                index, expected
            ))
            .into());
        }
        mapping.push(tokens.map(str::to_string).collect());
    }

    Ok(HeaderTable::new(segments, SectionMapping::new(mapping))?)
}
