//! Base relocation table.

use super::{DirectoryParser, ImageContext};
use crate::constants::relocation_type_name;
use crate::error::{PeError, Result};
use log::debug;
use object::pe::IMAGE_DIRECTORY_ENTRY_BASERELOC;

const BLOCK_HEADER_SIZE: u32 = 8;

/// A 16-bit relocation entry: type in the high 4 bits, page offset in the
/// low 12.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationEntry(pub u16);

impl RelocationEntry {
    pub fn kind(self) -> u16 {
        self.0 >> 12
    }

    pub fn offset(self) -> u16 {
        self.0 & 0x0FFF
    }

    pub fn kind_name(self) -> Option<&'static str> {
        relocation_type_name(self.kind())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationBlock {
    pub page_rva: u32,
    /// Declared size of the block, header included.
    pub block_size: u32,
    pub entries: Vec<RelocationEntry>,
}

impl RelocationBlock {
    /// RVA patched by `entry`.
    pub fn target_rva(&self, entry: RelocationEntry) -> u64 {
        u64::from(self.page_rva) + u64::from(entry.offset())
    }
}

pub struct RelocationParser;

impl DirectoryParser for RelocationParser {
    const INDEX: usize = IMAGE_DIRECTORY_ENTRY_BASERELOC;

    type Output = Vec<RelocationBlock>;

    fn parse(image: &ImageContext<'_>) -> Result<Self::Output> {
        let Some(mut cursor) = image.locate(Self::INDEX)? else {
            return Ok(Vec::new());
        };

        let mut remaining = image.directory(Self::INDEX)?.size;
        let mut blocks = Vec::new();
        while remaining > 0 {
            let page_rva = cursor.read_u32()?;
            let block_size = cursor.read_u32()?;
            // A block smaller than its own header would never consume the
            // remaining bytes.
            if block_size > remaining || block_size < BLOCK_HEADER_SIZE {
                return Err(PeError::BadRelocationBlock {
                    block_size,
                    remaining,
                });
            }

            let count = ((block_size - BLOCK_HEADER_SIZE) / 2) as usize;
            let mut entries = Vec::with_capacity(count.min(cursor.remaining() / 2));
            for _ in 0..count {
                entries.push(RelocationEntry(cursor.read_u16()?));
            }

            blocks.push(RelocationBlock {
                page_rva,
                block_size,
                entries,
            });
            remaining -= block_size;
        }

        debug!("Parsed {} relocation blocks", blocks.len());
        Ok(blocks)
    }
}
