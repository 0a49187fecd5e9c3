//! PE signature and COFF file header.

use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use bitflags::bitflags;
use object::pe;

bitflags! {
    /// `Characteristics` of the COFF file header. Unknown bits are kept.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED = pe::IMAGE_FILE_RELOCS_STRIPPED;
        const EXECUTABLE_IMAGE = pe::IMAGE_FILE_EXECUTABLE_IMAGE;
        const LINE_NUMS_STRIPPED = pe::IMAGE_FILE_LINE_NUMS_STRIPPED;
        const LOCAL_SYMS_STRIPPED = pe::IMAGE_FILE_LOCAL_SYMS_STRIPPED;
        const LARGE_ADDRESS_AWARE = pe::IMAGE_FILE_LARGE_ADDRESS_AWARE;
        const MACHINE_32BIT = pe::IMAGE_FILE_32BIT_MACHINE;
        const DEBUG_STRIPPED = pe::IMAGE_FILE_DEBUG_STRIPPED;
        const SYSTEM = pe::IMAGE_FILE_SYSTEM;
        const DLL = pe::IMAGE_FILE_DLL;
        const UP_SYSTEM_ONLY = pe::IMAGE_FILE_UP_SYSTEM_ONLY;
    }
}

/// `PE\0\0` followed by the COFF file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeHeader {
    pub signature: [u8; 4],
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: FileCharacteristics,
}

impl PeHeader {
    /// Decodes the header at `e_lfanew`.
    pub fn parse(cursor: &mut ByteCursor<'_>, e_lfanew: u32) -> Result<Self> {
        cursor.seek(u64::from(e_lfanew))?;

        let signature = cursor.read_array::<4>()?;
        let header = Self {
            signature,
            machine: cursor.read_u16()?,
            number_of_sections: cursor.read_u16()?,
            time_date_stamp: cursor.read_u32()?,
            pointer_to_symbol_table: cursor.read_u32()?,
            number_of_symbols: cursor.read_u32()?,
            size_of_optional_header: cursor.read_u16()?,
            characteristics: FileCharacteristics::from_bits_retain(cursor.read_u16()?),
        };

        if u32::from_le_bytes(signature) != pe::IMAGE_NT_SIGNATURE {
            return Err(PeError::BadPeSignature(signature));
        }
        Ok(header)
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics.contains(FileCharacteristics::DLL)
    }
}
