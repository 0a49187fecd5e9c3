//! Optional header, PE32 and PE32+.
//!
//! The two layouts share a 24-byte standard prefix and a 40-byte block of
//! Windows-specific fields. They differ in `BaseOfData` (PE32 only), the
//! width of `ImageBase`, and the width of the four stack/heap reserve and
//! commit sizes. Each layout gets its own record; the variant is chosen once
//! from `Magic` and never reinterpreted.

use crate::constants::{DATA_DIRECTORY_COUNT, PE32_MAGIC, PE32_PLUS_MAGIC};
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use bitflags::bitflags;
use log::{debug, warn};
use object::pe;

bitflags! {
    /// `DllCharacteristics` of the optional header. Unknown bits are kept.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA = pe::IMAGE_DLLCHARACTERISTICS_HIGH_ENTROPY_VA;
        const DYNAMIC_BASE = pe::IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE;
        const FORCE_INTEGRITY = pe::IMAGE_DLLCHARACTERISTICS_FORCE_INTEGRITY;
        const NX_COMPAT = pe::IMAGE_DLLCHARACTERISTICS_NX_COMPAT;
        const NO_ISOLATION = pe::IMAGE_DLLCHARACTERISTICS_NO_ISOLATION;
        const NO_SEH = pe::IMAGE_DLLCHARACTERISTICS_NO_SEH;
        const NO_BIND = pe::IMAGE_DLLCHARACTERISTICS_NO_BIND;
        const APPCONTAINER = pe::IMAGE_DLLCHARACTERISTICS_APPCONTAINER;
        const WDM_DRIVER = pe::IMAGE_DLLCHARACTERISTICS_WDM_DRIVER;
        const GUARD_CF = pe::IMAGE_DLLCHARACTERISTICS_GUARD_CF;
        const TERMINAL_SERVER_AWARE = pe::IMAGE_DLLCHARACTERISTICS_TERMINAL_SERVER_AWARE;
    }
}

/// An (RVA, size) pair locating one of the sixteen data directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_empty(&self) -> bool {
        self.virtual_address == 0 && self.size == 0
    }

    /// True when `rva` lies strictly between the start and the end of this
    /// directory.
    pub fn strictly_contains(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size);
        u64::from(rva) > start && u64::from(rva) < end
    }
}

/// The first 24 bytes, identical in both layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardFields {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
}

/// The 40 bytes following `ImageBase`, identical in both layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowsFields {
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: DllCharacteristics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalHeader32 {
    pub standard: StandardFields,
    pub base_of_data: u32,
    pub image_base: u32,
    pub windows: WindowsFields,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; DATA_DIRECTORY_COUNT],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalHeader64 {
    pub standard: StandardFields,
    pub image_base: u64,
    pub windows: WindowsFields,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; DATA_DIRECTORY_COUNT],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe32Plus(OptionalHeader64),
}

impl OptionalHeader {
    /// Decodes the optional header at `offset`.
    ///
    /// Returns `Ok(None)` when the COFF header declares no optional header.
    pub fn parse(
        cursor: &mut ByteCursor<'_>,
        offset: u64,
        size_of_optional_header: u16,
    ) -> Result<Option<Self>> {
        if size_of_optional_header == 0 {
            warn!("This PE has no optional header");
            return Ok(None);
        }
        cursor.seek(offset)?;

        let standard = read_standard_fields(cursor)?;
        let header = match standard.magic {
            PE32_MAGIC => {
                let base_of_data = cursor.read_u32()?;
                let image_base = cursor.read_u32()?;
                let windows = read_windows_fields(cursor)?;
                let mut header = OptionalHeader32 {
                    standard,
                    base_of_data,
                    image_base,
                    windows,
                    size_of_stack_reserve: cursor.read_u32()?,
                    size_of_stack_commit: cursor.read_u32()?,
                    size_of_heap_reserve: cursor.read_u32()?,
                    size_of_heap_commit: cursor.read_u32()?,
                    loader_flags: cursor.read_u32()?,
                    number_of_rva_and_sizes: cursor.read_u32()?,
                    data_directories: Default::default(),
                };
                read_data_directories(
                    cursor,
                    header.number_of_rva_and_sizes,
                    &mut header.data_directories,
                )?;
                OptionalHeader::Pe32(header)
            }
            PE32_PLUS_MAGIC => {
                let image_base = cursor.read_u64()?;
                let windows = read_windows_fields(cursor)?;
                let mut header = OptionalHeader64 {
                    standard,
                    image_base,
                    windows,
                    size_of_stack_reserve: cursor.read_u64()?,
                    size_of_stack_commit: cursor.read_u64()?,
                    size_of_heap_reserve: cursor.read_u64()?,
                    size_of_heap_commit: cursor.read_u64()?,
                    loader_flags: cursor.read_u32()?,
                    number_of_rva_and_sizes: cursor.read_u32()?,
                    data_directories: Default::default(),
                };
                read_data_directories(
                    cursor,
                    header.number_of_rva_and_sizes,
                    &mut header.data_directories,
                )?;
                OptionalHeader::Pe32Plus(header)
            }
            other => return Err(PeError::BadOptionalMagic(other)),
        };

        Ok(Some(header))
    }

    pub fn is_pe32_plus(&self) -> bool {
        matches!(self, OptionalHeader::Pe32Plus(_))
    }

    pub fn standard(&self) -> &StandardFields {
        match self {
            OptionalHeader::Pe32(h) => &h.standard,
            OptionalHeader::Pe32Plus(h) => &h.standard,
        }
    }

    pub fn windows(&self) -> &WindowsFields {
        match self {
            OptionalHeader::Pe32(h) => &h.windows,
            OptionalHeader::Pe32Plus(h) => &h.windows,
        }
    }

    pub fn magic(&self) -> u16 {
        self.standard().magic
    }

    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Pe32(h) => u64::from(h.image_base),
            OptionalHeader::Pe32Plus(h) => h.image_base,
        }
    }

    pub fn base_of_data(&self) -> Option<u32> {
        match self {
            OptionalHeader::Pe32(h) => Some(h.base_of_data),
            OptionalHeader::Pe32Plus(_) => None,
        }
    }

    /// The declared count, which may exceed the sixteen slots actually read.
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.number_of_rva_and_sizes,
            OptionalHeader::Pe32Plus(h) => h.number_of_rva_and_sizes,
        }
    }

    pub fn data_directories(&self) -> &[DataDirectory; DATA_DIRECTORY_COUNT] {
        match self {
            OptionalHeader::Pe32(h) => &h.data_directories,
            OptionalHeader::Pe32Plus(h) => &h.data_directories,
        }
    }

    /// Stack reserve, stack commit, heap reserve, heap commit, widened.
    pub fn stack_and_heap_sizes(&self) -> [u64; 4] {
        match self {
            OptionalHeader::Pe32(h) => [
                u64::from(h.size_of_stack_reserve),
                u64::from(h.size_of_stack_commit),
                u64::from(h.size_of_heap_reserve),
                u64::from(h.size_of_heap_commit),
            ],
            OptionalHeader::Pe32Plus(h) => [
                h.size_of_stack_reserve,
                h.size_of_stack_commit,
                h.size_of_heap_reserve,
                h.size_of_heap_commit,
            ],
        }
    }
}

fn read_standard_fields(cursor: &mut ByteCursor<'_>) -> Result<StandardFields> {
    Ok(StandardFields {
        magic: cursor.read_u16()?,
        major_linker_version: cursor.read_u8()?,
        minor_linker_version: cursor.read_u8()?,
        size_of_code: cursor.read_u32()?,
        size_of_initialized_data: cursor.read_u32()?,
        size_of_uninitialized_data: cursor.read_u32()?,
        address_of_entry_point: cursor.read_u32()?,
        base_of_code: cursor.read_u32()?,
    })
}

fn read_windows_fields(cursor: &mut ByteCursor<'_>) -> Result<WindowsFields> {
    Ok(WindowsFields {
        section_alignment: cursor.read_u32()?,
        file_alignment: cursor.read_u32()?,
        major_operating_system_version: cursor.read_u16()?,
        minor_operating_system_version: cursor.read_u16()?,
        major_image_version: cursor.read_u16()?,
        minor_image_version: cursor.read_u16()?,
        major_subsystem_version: cursor.read_u16()?,
        minor_subsystem_version: cursor.read_u16()?,
        win32_version_value: cursor.read_u32()?,
        size_of_image: cursor.read_u32()?,
        size_of_headers: cursor.read_u32()?,
        check_sum: cursor.read_u32()?,
        subsystem: cursor.read_u16()?,
        dll_characteristics: DllCharacteristics::from_bits_retain(cursor.read_u16()?),
    })
}

fn read_data_directories(
    cursor: &mut ByteCursor<'_>,
    declared: u32,
    slots: &mut [DataDirectory; DATA_DIRECTORY_COUNT],
) -> Result<()> {
    // The Windows loader ignores anything past sixteen entries; larger
    // counts are used to crash naive parsers.
    if declared as usize > DATA_DIRECTORY_COUNT {
        warn!(
            "NumberOfRvaAndSizes is {:#X} (> {:#X}), this PE may have been crafted manually",
            declared, DATA_DIRECTORY_COUNT
        );
    }

    let count = (declared as usize).min(DATA_DIRECTORY_COUNT);
    for slot in slots.iter_mut().take(count) {
        *slot = DataDirectory {
            virtual_address: cursor.read_u32()?,
            size: cursor.read_u32()?,
        };
    }
    debug!("Read {} data directory entries", count);
    Ok(())
}
