//! Data directory location and the directory parsers.
//!
//! Each parser implements [`DirectoryParser`]: it receives a read-only view
//! of the already-decoded headers and returns either its typed result (empty
//! when the directory is absent or holds recoverable garbage) or a hard
//! `PeError` that invalidates the whole image.

mod certificates;
mod exports;
mod relocations;
mod tls;

pub use certificates::{Certificate, CertificateParser};
pub use exports::{ExportDirectory, ExportParser, ExportedFunction};
pub use relocations::{RelocationBlock, RelocationEntry, RelocationParser};
pub use tls::{TlsDirectory, TlsParser};

use crate::constants::{directory_name, DATA_DIRECTORY_COUNT};
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use crate::headers::{DataDirectory, OptionalHeader};
use crate::section::SectionTable;
use log::warn;

/// Trait implemented by every data directory parser.
pub trait DirectoryParser {
    /// Slot in the optional header's data directory array.
    const INDEX: usize;

    type Output;

    fn parse(image: &ImageContext<'_>) -> Result<Self::Output>;
}

/// Everything a directory parser may consult: the raw input, the optional
/// header (if any) and the section table.
#[derive(Debug, Clone, Copy)]
pub struct ImageContext<'a> {
    data: &'a [u8],
    optional_header: Option<&'a OptionalHeader>,
    sections: &'a SectionTable,
}

impl<'a> ImageContext<'a> {
    pub fn new(
        data: &'a [u8],
        optional_header: Option<&'a OptionalHeader>,
        sections: &'a SectionTable,
    ) -> Self {
        Self {
            data,
            optional_header,
            sections,
        }
    }

    pub fn cursor(&self) -> ByteCursor<'a> {
        ByteCursor::new(self.data)
    }

    pub fn is_pe32_plus(&self) -> bool {
        self.optional_header
            .is_some_and(OptionalHeader::is_pe32_plus)
    }

    pub fn image_base(&self) -> u64 {
        self.optional_header.map_or(0, OptionalHeader::image_base)
    }

    /// The (RVA, size) pair at `index`, zeroed when there is no optional
    /// header or the slot was not declared.
    pub fn directory(&self, index: usize) -> Result<DataDirectory> {
        if index >= DATA_DIRECTORY_COUNT {
            return Err(PeError::DirectoryIndex(index));
        }
        Ok(self
            .optional_header
            .map(|h| h.data_directories()[index])
            .unwrap_or_default())
    }

    pub fn rva_to_offset(&self, rva: u64) -> u32 {
        self.sections.rva_to_offset(rva)
    }

    pub fn va_to_offset(&self, va: u64) -> u32 {
        self.sections.va_to_offset(va, self.image_base())
    }

    /// Returns a cursor positioned on the directory at `index`, or `None`
    /// when the directory is absent.
    pub fn locate(&self, index: usize) -> Result<Option<ByteCursor<'a>>> {
        let directory = self.directory(index)?;
        let name = directory_name(index);

        if directory.is_empty() {
            return Ok(None);
        }
        if directory.virtual_address == 0 {
            return Err(PeError::DirectoryWithoutRva {
                name,
                size: directory.size,
            });
        }
        if directory.size == 0 {
            warn!(
                "The {} directory has a size of 0, this PE may have been crafted manually",
                name
            );
        }

        let offset = self.rva_to_offset(u64::from(directory.virtual_address));
        if offset == 0 {
            return Err(PeError::UnresolvedDirectory {
                name,
                rva: directory.virtual_address,
            });
        }
        let mut cursor = self.cursor();
        cursor.seek(u64::from(offset))?;
        Ok(Some(cursor))
    }

    /// Returns a cursor positioned at `rva`. `what` names the table for the
    /// error message.
    pub fn cursor_at_rva(&self, rva: u64, what: &'static str) -> Result<ByteCursor<'a>> {
        let offset = self.rva_to_offset(rva);
        if offset == 0 {
            return Err(PeError::UnresolvedRva { what, rva });
        }
        let mut cursor = self.cursor();
        cursor.seek(u64::from(offset))?;
        Ok(cursor)
    }

    /// Reads the NUL-terminated string at `rva`.
    pub fn string_at_rva(&self, rva: u64, what: &'static str) -> Result<String> {
        let offset = self.rva_to_offset(rva);
        if offset == 0 {
            return Err(PeError::UnresolvedRva { what, rva });
        }
        self.cursor().read_cstring_at(u64::from(offset))
    }
}
