//! MS-DOS stub header.

use crate::constants::DOS_HEADER_SIZE;
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use object::pe::IMAGE_DOS_SIGNATURE;

/// The 64-byte header at the start of every PE file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_cblp: u16,
    pub e_cp: u16,
    pub e_crlc: u16,
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    pub e_ss: u16,
    pub e_sp: u16,
    pub e_csum: u16,
    pub e_ip: u16,
    pub e_cs: u16,
    pub e_lfarlc: u16,
    pub e_ovno: u16,
    pub e_res: [u16; 4],
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_res2: [u16; 10],
    /// File offset of the PE signature.
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Decodes the header from the start of `cursor`.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        if cursor.len() < DOS_HEADER_SIZE {
            return Err(PeError::TooSmall {
                size: cursor.len() as u64,
                required: DOS_HEADER_SIZE as u64,
            });
        }
        cursor.seek(0)?;

        let mut header = Self {
            e_magic: cursor.read_u16()?,
            e_cblp: cursor.read_u16()?,
            e_cp: cursor.read_u16()?,
            e_crlc: cursor.read_u16()?,
            e_cparhdr: cursor.read_u16()?,
            e_minalloc: cursor.read_u16()?,
            e_maxalloc: cursor.read_u16()?,
            e_ss: cursor.read_u16()?,
            e_sp: cursor.read_u16()?,
            e_csum: cursor.read_u16()?,
            e_ip: cursor.read_u16()?,
            e_cs: cursor.read_u16()?,
            e_lfarlc: cursor.read_u16()?,
            e_ovno: cursor.read_u16()?,
            ..Self::default()
        };
        for slot in header.e_res.iter_mut() {
            *slot = cursor.read_u16()?;
        }
        header.e_oemid = cursor.read_u16()?;
        header.e_oeminfo = cursor.read_u16()?;
        for slot in header.e_res2.iter_mut() {
            *slot = cursor.read_u16()?;
        }
        header.e_lfanew = cursor.read_u32()?;

        if header.e_magic != IMAGE_DOS_SIGNATURE {
            return Err(PeError::BadDosMagic(header.e_magic));
        }
        Ok(header)
    }
}
