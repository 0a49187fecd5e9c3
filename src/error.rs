//! Hard parse failures.
//!
//! Anything that reaches this type invalidates the whole image. Soft
//! conditions (absent directories, garbage after a certificate table, ...)
//! are logged and never become a `PeError`.

use thiserror::Error;

/// A structural failure that aborts parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeError {
    #[error("input is too small to be a PE ({size} bytes, need at least {required})")]
    TooSmall { size: u64, required: u64 },

    #[error("short read: wanted {wanted} bytes at offset {offset:#X}, input is {len:#X} bytes")]
    ShortRead { offset: usize, wanted: usize, len: usize },

    #[error("offset {offset:#X} is past the end of the input ({len:#X} bytes)")]
    Unreachable { offset: u64, len: usize },

    #[error("unterminated string at offset {offset:#X}")]
    UnterminatedString { offset: usize },

    #[error("invalid DOS header magic {0:#06X}")]
    BadDosMagic(u16),

    #[error("invalid PE signature {0:02X?}")]
    BadPeSignature([u8; 4]),

    #[error("invalid optional header magic {0:#06X}")]
    BadOptionalMagic(u16),

    #[error("data directory index {0} is out of range")]
    DirectoryIndex(usize),

    #[error("{name} directory has an RVA of 0 but a size of {size:#X}")]
    DirectoryWithoutRva { name: &'static str, size: u32 },

    #[error("{name} directory RVA {rva:#X} does not map to a file offset")]
    UnresolvedDirectory { name: &'static str, rva: u32 },

    #[error("could not resolve {what} at RVA {rva:#X}")]
    UnresolvedRva { what: &'static str, rva: u64 },

    #[error("export name {index} refers to ordinal index {ordinal}, only {count} functions exported")]
    OrdinalOutOfRange { index: usize, ordinal: u16, count: usize },

    #[error("relocation block size {block_size:#X} is invalid ({remaining:#X} bytes remaining)")]
    BadRelocationBlock { block_size: u32, remaining: u32 },

    #[error("certificate length {length:#X} is invalid ({remaining:#X} bytes remaining)")]
    BadCertificateLength { length: u32, remaining: u32 },
}

pub type Result<T> = std::result::Result<T, PeError>;
