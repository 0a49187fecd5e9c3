//! Fixed-position header decoding: DOS stub header, PE/COFF header, and the
//! optional header in its two bitness variants.

mod coff;
mod dos;
mod optional;

pub use coff::{FileCharacteristics, PeHeader};
pub use dos::DosHeader;
pub use optional::{
    DataDirectory, DllCharacteristics, OptionalHeader, OptionalHeader32, OptionalHeader64,
    StandardFields, WindowsFields,
};
