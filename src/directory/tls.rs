//! TLS directory and its callback chain.

use super::{DirectoryParser, ImageContext};
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use log::debug;
use object::pe::IMAGE_DIRECTORY_ENTRY_TLS;

/// `IMAGE_TLS_DIRECTORY`, with the address fields widened to 64 bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsDirectory {
    pub start_address_of_raw_data: u64,
    pub end_address_of_raw_data: u64,
    pub address_of_index: u64,
    /// VA of the NULL-terminated callback table.
    pub address_of_callbacks: u64,
    pub size_of_zero_fill: u32,
    pub characteristics: u32,
    /// Callback VAs, in table order.
    pub callbacks: Vec<u64>,
}

pub struct TlsParser;

impl DirectoryParser for TlsParser {
    const INDEX: usize = IMAGE_DIRECTORY_ENTRY_TLS;

    type Output = Option<TlsDirectory>;

    fn parse(image: &ImageContext<'_>) -> Result<Self::Output> {
        let Some(mut cursor) = image.locate(Self::INDEX)? else {
            return Ok(None);
        };

        let wide = image.is_pe32_plus();
        let read_pointer = |cursor: &mut ByteCursor<'_>| -> Result<u64> {
            if wide {
                cursor.read_u64()
            } else {
                cursor.read_u32().map(u64::from)
            }
        };

        let mut tls = TlsDirectory {
            start_address_of_raw_data: read_pointer(&mut cursor)?,
            end_address_of_raw_data: read_pointer(&mut cursor)?,
            address_of_index: read_pointer(&mut cursor)?,
            address_of_callbacks: read_pointer(&mut cursor)?,
            size_of_zero_fill: cursor.read_u32()?,
            characteristics: cursor.read_u32()?,
            callbacks: Vec::new(),
        };

        let offset = image.va_to_offset(tls.address_of_callbacks);
        if offset == 0 {
            return Err(PeError::UnresolvedRva {
                what: "TLS callback table",
                rva: tls.address_of_callbacks,
            });
        }
        let mut table = image.cursor();
        table.seek(u64::from(offset))?;

        // The table ends at the first NULL entry or at the end of input.
        while let Ok(callback) = read_pointer(&mut table) {
            if callback == 0 {
                break;
            }
            tls.callbacks.push(callback);
        }

        debug!("Parsed {} TLS callbacks", tls.callbacks.len());
        Ok(Some(tls))
    }
}
