//! Defensive Portable Executable parser.
//!
//! This library decodes PE headers, the section table, and the export, base
//! relocation, TLS and attribute certificate directories from untrusted
//! input, reporting malformed files through a validity flag instead of
//! panicking or reading out of bounds.

pub mod constants;
pub mod cursor;
pub mod directory;
pub mod error;
pub mod headers;
pub mod pe;
pub mod section;

pub use error::PeError;
pub use pe::{PeFile, PeImage};
