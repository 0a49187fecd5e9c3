//! Section table and RVA translation.

use crate::constants::{PE_HEADER_SIZE, SECTION_HEADER_SIZE};
use crate::cursor::ByteCursor;
use crate::error::Result;
use bitflags::bitflags;
use log::debug;
use object::pe;

bitflags! {
    /// Section `Characteristics`. Unknown bits are kept.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SectionCharacteristics: u32 {
        const CNT_CODE = pe::IMAGE_SCN_CNT_CODE;
        const CNT_INITIALIZED_DATA = pe::IMAGE_SCN_CNT_INITIALIZED_DATA;
        const CNT_UNINITIALIZED_DATA = pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA;
        const LNK_INFO = pe::IMAGE_SCN_LNK_INFO;
        const LNK_REMOVE = pe::IMAGE_SCN_LNK_REMOVE;
        const LNK_COMDAT = pe::IMAGE_SCN_LNK_COMDAT;
        const LNK_NRELOC_OVFL = pe::IMAGE_SCN_LNK_NRELOC_OVFL;
        const MEM_DISCARDABLE = pe::IMAGE_SCN_MEM_DISCARDABLE;
        const MEM_NOT_CACHED = pe::IMAGE_SCN_MEM_NOT_CACHED;
        const MEM_NOT_PAGED = pe::IMAGE_SCN_MEM_NOT_PAGED;
        const MEM_SHARED = pe::IMAGE_SCN_MEM_SHARED;
        const MEM_EXECUTE = pe::IMAGE_SCN_MEM_EXECUTE;
        const MEM_READ = pe::IMAGE_SCN_MEM_READ;
        const MEM_WRITE = pe::IMAGE_SCN_MEM_WRITE;
    }
}

/// One 40-byte entry of the section table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub raw_name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

impl Section {
    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            raw_name: cursor.read_array()?,
            virtual_size: cursor.read_u32()?,
            virtual_address: cursor.read_u32()?,
            size_of_raw_data: cursor.read_u32()?,
            pointer_to_raw_data: cursor.read_u32()?,
            pointer_to_relocations: cursor.read_u32()?,
            pointer_to_linenumbers: cursor.read_u32()?,
            number_of_relocations: cursor.read_u16()?,
            number_of_linenumbers: cursor.read_u16()?,
            characteristics: SectionCharacteristics::from_bits_retain(cursor.read_u32()?),
        })
    }

    /// The name up to the first NUL.
    pub fn name(&self) -> String {
        let end = self.raw_name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.raw_name[..end]).into_owned()
    }

    /// Whether `rva` falls inside the section, bounded either by the virtual
    /// size or by the size of raw data.
    pub fn contains_rva(&self, rva: u64, use_raw_size: bool) -> bool {
        let start = u64::from(self.virtual_address);
        let size = if use_raw_size {
            self.size_of_raw_data
        } else {
            self.virtual_size
        };
        start <= rva && rva < start + u64::from(size)
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics
            .contains(SectionCharacteristics::MEM_EXECUTE)
    }
}

/// The section table in file order. File order is also the scan order used
/// for address translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Reads `number_of_sections` descriptors following the optional header.
    pub fn parse(
        cursor: &mut ByteCursor<'_>,
        e_lfanew: u32,
        size_of_optional_header: u16,
        number_of_sections: u16,
    ) -> Result<Self> {
        let offset = u64::from(e_lfanew)
            + PE_HEADER_SIZE as u64
            + u64::from(size_of_optional_header);
        cursor.seek(offset)?;

        let count = usize::from(number_of_sections);
        let mut sections = Vec::with_capacity(count.min(cursor.remaining() / SECTION_HEADER_SIZE));
        for index in 0..count {
            let section = Section::parse(cursor)?;
            debug!("Section {}: {:?}", index, section.name());
            sections.push(section);
        }
        Ok(Self { sections })
    }

    pub fn from_sections(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn as_slice(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Translates an RVA into a file offset.
    ///
    /// Returns 0 when no section maps the address; callers must treat 0 as
    /// untranslatable. Offsets are truncated to 32 bits.
    pub fn rva_to_offset(&self, rva: u64) -> u32 {
        if self.sections.is_empty() {
            return (rva & 0xFFFF_FFFF) as u32;
        }

        match self.sections.iter().find(|s| s.contains_rva(rva, false)) {
            Some(section) => ((rva - u64::from(section.virtual_address)
                + u64::from(section.pointer_to_raw_data))
                & 0xFFFF_FFFF) as u32,
            None => {
                // A bogus VirtualSize can hide the right section. The
                // raw-size candidate is only reported, never used: the
                // address stays untranslatable.
                if let Some(section) = self.sections.iter().find(|s| s.contains_rva(rva, true)) {
                    debug!(
                        "RVA {:#X} only matches section {:?} by raw size, not translating",
                        rva,
                        section.name()
                    );
                }
                0
            }
        }
    }

    /// Translates a VA, given the image base. Addresses at or below the
    /// image base are untranslatable.
    pub fn va_to_offset(&self, va: u64, image_base: u64) -> u32 {
        if va > image_base {
            self.rva_to_offset(va - image_base)
        } else {
            0
        }
    }
}
