//! Attribute certificate table.
//!
//! The security directory is the one directory whose "RVA" is a plain file
//! offset: the table lives after the section data and is never mapped.
//! Only the encoded blobs are extracted; nothing is verified.

use super::{DirectoryParser, ImageContext};
use crate::constants::{
    certificate_revision_name, certificate_type_name, is_known_certificate_revision,
    is_known_certificate_type, WIN_CERT_TYPE_PKCS_SIGNED_DATA, WIN_CERT_TYPE_X509,
};
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use log::{debug, warn};
use object::pe::IMAGE_DIRECTORY_ENTRY_SECURITY;

const CERTIFICATE_HEADER_SIZE: u32 = 8;

/// One `WIN_CERTIFICATE` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificate {
    /// Declared length, header included.
    pub length: u32,
    pub revision: u16,
    pub certificate_type: u16,
    pub data: Vec<u8>,
}

impl Certificate {
    pub fn revision_name(&self) -> &'static str {
        certificate_revision_name(self.revision).unwrap_or("UNKNOWN")
    }

    pub fn type_name(&self) -> &'static str {
        certificate_type_name(self.certificate_type).unwrap_or("UNKNOWN")
    }

    /// File extension matching the payload encoding.
    pub fn extension(&self) -> &'static str {
        match self.certificate_type {
            WIN_CERT_TYPE_PKCS_SIGNED_DATA => "p7b",
            WIN_CERT_TYPE_X509 => "cer",
            _ => "bin",
        }
    }
}

pub struct CertificateParser;

impl DirectoryParser for CertificateParser {
    const INDEX: usize = IMAGE_DIRECTORY_ENTRY_SECURITY;

    type Output = Vec<Certificate>;

    fn parse(image: &ImageContext<'_>) -> Result<Self::Output> {
        let directory = image.directory(Self::INDEX)?;
        let mut cursor = image.cursor();
        if directory.virtual_address == 0
            || cursor.seek(u64::from(directory.virtual_address)).is_err()
        {
            return Ok(Vec::new());
        }

        let mut certificates = Vec::new();
        let mut remaining = directory.size;
        while remaining > CERTIFICATE_HEADER_SIZE {
            let Ok((length, revision, certificate_type)) = read_header(&mut cursor) else {
                warn!("Could not read a WIN_CERTIFICATE header, the certificate table is truncated");
                break;
            };

            // Other values are allowed in theory, but when neither field is
            // recognised we have most likely landed in random bytes.
            if !is_known_certificate_type(certificate_type)
                && !is_known_certificate_revision(revision)
            {
                warn!(
                    "WIN_CERTIFICATE with revision {:#06X} and type {:#06X} appears to be invalid",
                    revision, certificate_type
                );
                break;
            }

            if length > remaining || length < CERTIFICATE_HEADER_SIZE {
                return Err(PeError::BadCertificateLength { length, remaining });
            }

            let Ok(payload) = cursor.read_bytes((length - CERTIFICATE_HEADER_SIZE) as usize)
            else {
                warn!(
                    "WIN_CERTIFICATE payload of {:#X} bytes runs past the end of the file",
                    length - CERTIFICATE_HEADER_SIZE
                );
                break;
            };

            certificates.push(Certificate {
                length,
                revision,
                certificate_type,
                data: payload.to_vec(),
            });
            remaining -= length;

            // Records start on 8-byte boundaries.
            let padding = (8 - length % 8) % 8;
            if padding != 0 && remaining != 0 {
                cursor.skip(padding as usize);
                remaining = remaining.saturating_sub(padding);
            }
        }

        debug!("Parsed {} certificates", certificates.len());
        Ok(certificates)
    }
}

fn read_header(cursor: &mut ByteCursor<'_>) -> Result<(u32, u16, u16)> {
    Ok((cursor.read_u32()?, cursor.read_u16()?, cursor.read_u16()?))
}
