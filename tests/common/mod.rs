//! Synthetic ELF images for the integration tests.
//!
//! Only the headers are meaningful: segment and section contents are zero filled, which is all
//! the validator looks at.

#![allow(dead_code)]

use object::elf;
use object::endian::{U16, U32, U64};
use object::pod::bytes_of;
use object::Endianness;
use std::path::PathBuf;

fn u16(e: Endianness, v: u16) -> U16<Endianness> {
    U16::new(e, v)
}
fn u32(e: Endianness, v: u32) -> U32<Endianness> {
    U32::new(e, v)
}
fn u64(e: Endianness, v: u64) -> U64<Endianness> {
    U64::new(e, v)
}

/// ELF file class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Elf32,
    Elf64,
}

#[derive(Clone, Debug)]
pub struct SegmentDef {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl SegmentDef {
    pub fn new(
        p_type: u32,
        flags: u32,
        offset: u64,
        vaddr: u64,
        filesz: u64,
        memsz: u64,
    ) -> Self {
        Self {
            p_type,
            flags,
            offset,
            vaddr,
            paddr: vaddr,
            filesz,
            memsz,
            align: 0x1000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SectionDef {
    pub name: &'static str,
    pub sh_type: u32,
    pub flags: u32,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
}

impl SectionDef {
    /// The file offset is the distance of `addr` from 0x400000, as in the images built here.
    pub fn new(name: &'static str, sh_type: u32, flags: u32, addr: u64, size: u64) -> Self {
        Self {
            name,
            sh_type,
            flags,
            addr,
            offset: addr.saturating_sub(0x40_0000),
            size,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ElfImage {
    pub segments: Vec<SegmentDef>,
    pub sections: Vec<SectionDef>,
    /// Emit no section header table at all.
    pub omit_section_headers: bool,
    /// Overrides `e_shstrndx`.
    pub shstrndx: Option<u16>,
    pub class: Class,
    pub endian: Endianness,
}

impl ElfImage {
    /// An executable laid out the way a compartmentalized build links it: every LOAD and the
    /// RELRO segment start and end on 4K boundaries. The NOTE and PHDR segments are not page
    /// aligned, which is allowed.
    pub fn page_aligned() -> Self {
        let rx = elf::PF_R | elf::PF_X;
        let rw = elf::PF_R | elf::PF_W;
        let mut stack = SegmentDef::new(elf::PT_GNU_STACK, rw, 0, 0, 0, 0);
        stack.align = 0x10;
        let mut phdr = SegmentDef::new(elf::PT_PHDR, elf::PF_R, 0x40, 0x40_0040, 0x188, 0x188);
        phdr.align = 8;
        let mut note = SegmentDef::new(elf::PT_NOTE, elf::PF_R, 0x200, 0x40_0200, 0x24, 0x24);
        note.align = 4;

        let alloc = elf::SHF_ALLOC;
        let alloc_w = elf::SHF_ALLOC | elf::SHF_WRITE;
        let exec = elf::SHF_ALLOC | elf::SHF_EXECINSTR;
        let mut comment = SectionDef::new(".comment", elf::SHT_PROGBITS, 0, 0, 0x10);
        comment.offset = 0x4000;
        Self {
            segments: vec![
                phdr,
                SegmentDef::new(elf::PT_LOAD, elf::PF_R, 0, 0x40_0000, 0x1000, 0x1000),
                SegmentDef::new(elf::PT_LOAD, rx, 0x1000, 0x40_1000, 0x1000, 0x1000),
                SegmentDef::new(elf::PT_LOAD, rw, 0x2000, 0x40_2000, 0x2000, 0x2000),
                SegmentDef::new(elf::PT_GNU_RELRO, elf::PF_R, 0x2000, 0x40_2000, 0x1000, 0x1000),
                note,
                stack,
            ],
            sections: vec![
                SectionDef::new(".note.gnu.build-id", elf::SHT_NOTE, alloc, 0x40_0200, 0x24),
                SectionDef::new(".text", elf::SHT_PROGBITS, exec, 0x40_1000, 0x800),
                SectionDef::new(".init_array", elf::SHT_INIT_ARRAY, alloc_w, 0x40_2000, 0x8),
                SectionDef::new(".got", elf::SHT_PROGBITS, alloc_w, 0x40_2008, 0x20),
                SectionDef::new(".data", elf::SHT_PROGBITS, alloc_w, 0x40_3000, 0x100),
                SectionDef::new(".bss", elf::SHT_NOBITS, alloc_w, 0x40_3100, 0x200),
                comment,
            ],
            omit_section_headers: false,
            shstrndx: None,
            class: Class::Elf64,
            endian: Endianness::Little,
        }
    }

    /// The same image in another class and byte order.
    pub fn encoded(mut self, class: Class, endian: Endianness) -> Self {
        self.class = class;
        self.endian = endian;
        self
    }

    fn ehdr_size(&self) -> usize {
        match self.class {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    fn phdr_size(&self) -> usize {
        match self.class {
            Class::Elf32 => 32,
            Class::Elf64 => 56,
        }
    }

    fn shdr_size(&self) -> usize {
        match self.class {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    fn ident(&self) -> elf::Ident {
        elf::Ident {
            magic: elf::ELFMAG,
            class: match self.class {
                Class::Elf32 => elf::ELFCLASS32,
                Class::Elf64 => elf::ELFCLASS64,
            },
            data: match self.endian {
                Endianness::Little => elf::ELFDATA2LSB,
                Endianness::Big => elf::ELFDATA2MSB,
            },
            version: elf::EV_CURRENT,
            os_abi: elf::ELFOSABI_SYSV,
            abi_version: 0,
            padding: [0; 7],
        }
    }

    fn machine(&self) -> u16 {
        match (self.class, self.endian) {
            (Class::Elf32, Endianness::Little) => elf::EM_386,
            (Class::Elf64, Endianness::Little) => elf::EM_X86_64,
            (Class::Elf32, Endianness::Big) => elf::EM_PPC,
            (Class::Elf64, Endianness::Big) => elf::EM_PPC64,
        }
    }

    fn file_header(&self, phnum: u16, shoff: u64, shnum: u16, shstrndx: u16) -> Vec<u8> {
        let e = self.endian;
        let phoff = if phnum == 0 { 0 } else { self.ehdr_size() as u64 };
        match self.class {
            Class::Elf64 => bytes_of(&elf::FileHeader64::<Endianness> {
                e_ident: self.ident(),
                e_type: u16(e, elf::ET_EXEC),
                e_machine: u16(e, self.machine()),
                e_version: u32(e, elf::EV_CURRENT as u32),
                e_entry: u64(e, 0x40_1000),
                e_phoff: u64(e, phoff),
                e_shoff: u64(e, shoff),
                e_flags: u32(e, 0),
                e_ehsize: u16(e, self.ehdr_size() as u16),
                e_phentsize: u16(e, self.phdr_size() as u16),
                e_phnum: u16(e, phnum),
                e_shentsize: u16(e, self.shdr_size() as u16),
                e_shnum: u16(e, shnum),
                e_shstrndx: u16(e, shstrndx),
            })
            .to_vec(),
            Class::Elf32 => bytes_of(&elf::FileHeader32::<Endianness> {
                e_ident: self.ident(),
                e_type: u16(e, elf::ET_EXEC),
                e_machine: u16(e, self.machine()),
                e_version: u32(e, elf::EV_CURRENT as u32),
                e_entry: u32(e, 0x40_1000),
                e_phoff: u32(e, phoff as u32),
                e_shoff: u32(e, shoff as u32),
                e_flags: u32(e, 0),
                e_ehsize: u16(e, self.ehdr_size() as u16),
                e_phentsize: u16(e, self.phdr_size() as u16),
                e_phnum: u16(e, phnum),
                e_shentsize: u16(e, self.shdr_size() as u16),
                e_shnum: u16(e, shnum),
                e_shstrndx: u16(e, shstrndx),
            })
            .to_vec(),
        }
    }

    fn program_header(&self, segment: &SegmentDef) -> Vec<u8> {
        let e = self.endian;
        match self.class {
            Class::Elf64 => bytes_of(&elf::ProgramHeader64::<Endianness> {
                p_type: u32(e, segment.p_type),
                p_flags: u32(e, segment.flags),
                p_offset: u64(e, segment.offset),
                p_vaddr: u64(e, segment.vaddr),
                p_paddr: u64(e, segment.paddr),
                p_filesz: u64(e, segment.filesz),
                p_memsz: u64(e, segment.memsz),
                p_align: u64(e, segment.align),
            })
            .to_vec(),
            Class::Elf32 => bytes_of(&elf::ProgramHeader32::<Endianness> {
                p_type: u32(e, segment.p_type),
                p_flags: u32(e, segment.flags),
                p_offset: u32(e, segment.offset as u32),
                p_vaddr: u32(e, segment.vaddr as u32),
                p_paddr: u32(e, segment.paddr as u32),
                p_filesz: u32(e, segment.filesz as u32),
                p_memsz: u32(e, segment.memsz as u32),
                p_align: u32(e, segment.align as u32),
            })
            .to_vec(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn section_header(
        &self,
        name: u32,
        sh_type: u32,
        flags: u64,
        addr: u64,
        offset: u64,
        size: u64,
        addralign: u64,
    ) -> Vec<u8> {
        let e = self.endian;
        match self.class {
            Class::Elf64 => bytes_of(&elf::SectionHeader64::<Endianness> {
                sh_name: u32(e, name),
                sh_type: u32(e, sh_type),
                sh_flags: u64(e, flags),
                sh_addr: u64(e, addr),
                sh_offset: u64(e, offset),
                sh_size: u64(e, size),
                sh_link: u32(e, 0),
                sh_info: u32(e, 0),
                sh_addralign: u64(e, addralign),
                sh_entsize: u64(e, 0),
            })
            .to_vec(),
            Class::Elf32 => bytes_of(&elf::SectionHeader32::<Endianness> {
                sh_name: u32(e, name),
                sh_type: u32(e, sh_type),
                sh_flags: u32(e, flags as u32),
                sh_addr: u32(e, addr as u32),
                sh_offset: u32(e, offset as u32),
                sh_size: u32(e, size as u32),
                sh_link: u32(e, 0),
                sh_info: u32(e, 0),
                sh_addralign: u32(e, addralign as u32),
                sh_entsize: u32(e, 0),
            })
            .to_vec(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        // The file header goes in last, once the section header offset is known.
        let mut buffer = vec![0u8; self.ehdr_size()];
        for segment in &self.segments {
            buffer.extend_from_slice(&self.program_header(segment));
        }

        // Zero fill up to the end of the furthest segment or section contents.
        let file_end = self
            .segments
            .iter()
            .map(|s| s.offset + s.filesz)
            .chain(
                self.sections
                    .iter()
                    .filter(|s| s.sh_type != elf::SHT_NOBITS)
                    .map(|s| s.offset + s.size),
            )
            .max()
            .unwrap_or(0) as usize;
        if buffer.len() < file_end {
            buffer.resize(file_end, 0);
        }

        let phnum = self.segments.len() as u16;
        if self.omit_section_headers {
            let header = self.file_header(phnum, 0, 0, self.shstrndx.unwrap_or(0));
            buffer[..header.len()].copy_from_slice(&header);
            return buffer;
        }

        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for section in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");

        let shstrtab_offset = buffer.len() as u64;
        buffer.extend_from_slice(&shstrtab);
        while buffer.len() % 8 != 0 {
            buffer.push(0);
        }
        let shoff = buffer.len() as u64;

        buffer.extend_from_slice(&self.section_header(0, elf::SHT_NULL, 0, 0, 0, 0, 0));
        for (section, name) in self.sections.iter().zip(&name_offsets) {
            buffer.extend_from_slice(&self.section_header(
                *name,
                section.sh_type,
                section.flags as u64,
                section.addr,
                section.offset,
                section.size,
                8,
            ));
        }
        buffer.extend_from_slice(&self.section_header(
            shstrtab_name,
            elf::SHT_STRTAB,
            0,
            0,
            shstrtab_offset,
            shstrtab.len() as u64,
            1,
        ));

        let shnum = self.sections.len() as u16 + 2;
        let header = self.file_header(phnum, shoff, shnum, self.shstrndx.unwrap_or(shnum - 1));
        buffer[..header.len()].copy_from_slice(&header);
        buffer
    }

    /// Writes the image to a fresh file under the system temp directory.
    pub fn write_temp(&self, name: &str) -> PathBuf {
        let file_name = format!("segalign-{}-{}", std::process::id(), name);
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, self.build()).expect("failed to write test image");
        path
    }
}
