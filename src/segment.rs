//! Segment data model.
//!
//! This module defines the read-only view of a binary's program-header table: one `Segment`
//! per program header, in on-disk order, and a `SectionMapping` that lists the sections
//! occupying each segment by the same index.

use std::fmt;

use object::elf;

use crate::error::Error;

// Segment types that the object crate does not name.
pub const PT_GNU_SFRAME: u32 = 0x6474_e554;
pub const PT_GNU_MBIND_LO: u32 = 0x6474_e555;
pub const PT_GNU_MBIND_HI: u32 = PT_GNU_MBIND_LO + 0xfff;

/// The type of a program header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Load,
    Dynamic,
    Interp,
    Note,
    GnuRelro,
    Phdr,
    Tls,
    GnuStack,
    GnuEhFrame,
    /// Any other type, kept with the label readelf would print for it.
    Other(String),
}

impl SegmentKind {
    /// Maps a raw `p_type` value to a kind.
    pub fn from_p_type(p_type: u32) -> Self {
        match p_type {
            elf::PT_LOAD => SegmentKind::Load,
            elf::PT_DYNAMIC => SegmentKind::Dynamic,
            elf::PT_INTERP => SegmentKind::Interp,
            elf::PT_NOTE => SegmentKind::Note,
            elf::PT_GNU_RELRO => SegmentKind::GnuRelro,
            elf::PT_PHDR => SegmentKind::Phdr,
            elf::PT_TLS => SegmentKind::Tls,
            elf::PT_GNU_STACK => SegmentKind::GnuStack,
            elf::PT_GNU_EH_FRAME => SegmentKind::GnuEhFrame,
            elf::PT_NULL => SegmentKind::Other("NULL".to_string()),
            elf::PT_SHLIB => SegmentKind::Other("SHLIB".to_string()),
            elf::PT_GNU_PROPERTY => SegmentKind::Other("GNU_PROPERTY".to_string()),
            PT_GNU_SFRAME => SegmentKind::Other("GNU_SFRAME".to_string()),
            other => SegmentKind::Other(format!("0x{:x}", other)),
        }
    }

    /// Maps a textual type label (as printed by `readelf --segments`) to a kind.
    pub fn from_label(label: &str) -> Self {
        match label {
            "LOAD" => SegmentKind::Load,
            "DYNAMIC" => SegmentKind::Dynamic,
            "INTERP" => SegmentKind::Interp,
            "NOTE" => SegmentKind::Note,
            "GNU_RELRO" => SegmentKind::GnuRelro,
            "PHDR" => SegmentKind::Phdr,
            "TLS" => SegmentKind::Tls,
            "GNU_STACK" => SegmentKind::GnuStack,
            "GNU_EH_FRAME" => SegmentKind::GnuEhFrame,
            other => SegmentKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SegmentKind::Load => "LOAD",
            SegmentKind::Dynamic => "DYNAMIC",
            SegmentKind::Interp => "INTERP",
            SegmentKind::Note => "NOTE",
            SegmentKind::GnuRelro => "GNU_RELRO",
            SegmentKind::Phdr => "PHDR",
            SegmentKind::Tls => "TLS",
            SegmentKind::GnuStack => "GNU_STACK",
            SegmentKind::GnuEhFrame => "GNU_EH_FRAME",
            SegmentKind::Other(label) => label,
        }
    }

    /// Any relocation-read-only variant, including vendor spellings we do not name.
    pub fn is_relro(&self) -> bool {
        match self {
            SegmentKind::GnuRelro => true,
            SegmentKind::Other(label) => label.contains("RELRO"),
            _ => false,
        }
    }

    /// Whether segments of this kind must start and end on page boundaries.
    pub fn needs_page_alignment(&self) -> bool {
        *self == SegmentKind::Load || self.is_relro()
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One program header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub file_offset: u64,
    pub virtual_address: u64,
    pub physical_address: u64,
    pub file_size: u64,
    pub memory_size: u64,
    /// `PF_*` permission bits.
    pub flags: u32,
    pub alignment: u64,
}

impl Segment {
    /// Renders the permission bits the way readelf does (`R E`, `RW `).
    pub fn flags_string(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.flags & elf::PF_R != 0 { 'R' } else { ' ' });
        s.push(if self.flags & elf::PF_W != 0 { 'W' } else { ' ' });
        s.push(if self.flags & elf::PF_X != 0 { 'E' } else { ' ' });
        s
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} offset={:#x} vaddr={:#x} paddr={:#x} ",
            self.kind,
            self.file_offset,
            self.virtual_address,
            self.physical_address,
        )?;
        write!(
            f,
            "filesz={:#x} memsz={:#x} flags=[{}] align={:#x}",
            self.file_size,
            self.memory_size,
            self.flags_string(),
            self.alignment,
        )
    }
}

/// Section names per segment, indexed in parallel with the segment list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMapping {
    entries: Vec<Vec<String>>,
}

impl SectionMapping {
    pub fn new(entries: Vec<Vec<String>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sections occupying segment `index`; empty if the index is out of range.
    pub fn sections(&self, index: usize) -> &[String] {
        self.entries.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The program-header table of one binary zipped with its section mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTable {
    segments: Vec<Segment>,
    mapping: SectionMapping,
}

impl HeaderTable {
    /// Pairs segments with their mapping rows. Both lists must have the same length.
    pub fn new(segments: Vec<Segment>, mapping: SectionMapping) -> Result<Self, Error> {
        if segments.len() != mapping.len() {
            return Err(Error::malformed(format!(
                "{} program headers but {} section-to-segment mapping entries",
                segments.len(),
                mapping.len()
            )));
        }
        Ok(Self { segments, mapping })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn mapping(&self) -> &SectionMapping {
        &self.mapping
    }

    /// Iterates `(index, segment, section names)` in program-header order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Segment, &[String])> + '_ {
        self.segments
            .iter()
            .enumerate()
            .map(move |(i, segment)| (i, segment, self.mapping.sections(i)))
    }
}
