//! The parsed image and the path-facing container around it.

use crate::constants::{DATA_DIRECTORY_COUNT, DOS_HEADER_SIZE, PE_HEADER_SIZE};
use crate::cursor::ByteCursor;
use crate::directory::{
    Certificate, CertificateParser, DirectoryParser, ExportDirectory, ExportParser,
    ExportedFunction, ImageContext, RelocationBlock, RelocationParser, TlsDirectory, TlsParser,
};
use crate::error::{PeError, Result};
use crate::headers::{DataDirectory, DosHeader, OptionalHeader, PeHeader};
use crate::section::{Section, SectionTable};
use anyhow::Context;
use log::{debug, error};
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A fully decoded PE image. Only ever built complete; immutable afterwards.
#[derive(Debug, Clone)]
pub struct PeImage {
    dos_header: DosHeader,
    pe_header: PeHeader,
    optional_header: Option<OptionalHeader>,
    sections: SectionTable,
    exports: Option<ExportDirectory>,
    relocations: Vec<RelocationBlock>,
    tls: Option<TlsDirectory>,
    certificates: Vec<Certificate>,
}

impl PeImage {
    /// Runs the whole pipeline over `data`, stopping at the first hard
    /// failure.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);

        let dos_header = DosHeader::parse(&mut cursor)?;
        let pe_header = PeHeader::parse(&mut cursor, dos_header.e_lfanew)?;
        let optional_header = OptionalHeader::parse(
            &mut cursor,
            u64::from(dos_header.e_lfanew) + PE_HEADER_SIZE as u64,
            pe_header.size_of_optional_header,
        )?;
        let sections = SectionTable::parse(
            &mut cursor,
            dos_header.e_lfanew,
            pe_header.size_of_optional_header,
            pe_header.number_of_sections,
        )?;

        let context = ImageContext::new(data, optional_header.as_ref(), &sections);
        let exports = ExportParser::parse(&context)?;
        let relocations = RelocationParser::parse(&context)?;
        let tls = TlsParser::parse(&context)?;
        let certificates = CertificateParser::parse(&context)?;
        debug!("Parsed PE image with {} sections", sections.len());

        Ok(Self {
            dos_header,
            pe_header,
            optional_header,
            sections,
            exports,
            relocations,
            tls,
            certificates,
        })
    }

    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    pub fn pe_header(&self) -> &PeHeader {
        &self.pe_header
    }

    /// `None` when the COFF header declares no optional header.
    pub fn optional_header(&self) -> Option<&OptionalHeader> {
        self.optional_header.as_ref()
    }

    pub fn is_pe32_plus(&self) -> bool {
        self.optional_header
            .as_ref()
            .is_some_and(OptionalHeader::is_pe32_plus)
    }

    pub fn image_base(&self) -> u64 {
        self.optional_header
            .as_ref()
            .map_or(0, OptionalHeader::image_base)
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.optional_header
            .as_ref()
            .map(|h| h.standard().address_of_entry_point)
    }

    /// All sixteen slots; zeroed when there is no optional header.
    pub fn data_directories(&self) -> [DataDirectory; DATA_DIRECTORY_COUNT] {
        self.optional_header
            .as_ref()
            .map(|h| *h.data_directories())
            .unwrap_or_default()
    }

    pub fn data_directory(&self, index: usize) -> Option<DataDirectory> {
        self.data_directories().get(index).copied()
    }

    pub fn sections(&self) -> &[Section] {
        self.sections.as_slice()
    }

    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections().iter().find(|s| s.name() == name)
    }

    pub fn rva_to_offset(&self, rva: u64) -> u32 {
        self.sections.rva_to_offset(rva)
    }

    pub fn va_to_offset(&self, va: u64) -> u32 {
        self.sections.va_to_offset(va, self.image_base())
    }

    pub fn export_directory(&self) -> Option<&ExportDirectory> {
        self.exports.as_ref()
    }

    pub fn dll_name(&self) -> Option<&str> {
        self.exports.as_ref().map(|e| e.dll_name.as_str())
    }

    pub fn exports(&self) -> &[ExportedFunction] {
        self.exports
            .as_ref()
            .map(|e| e.functions.as_slice())
            .unwrap_or_default()
    }

    pub fn export_by_name(&self, name: &str) -> Option<&ExportedFunction> {
        self.exports()
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
    }

    pub fn export_by_ordinal(&self, ordinal: u32) -> Option<&ExportedFunction> {
        self.exports().iter().find(|f| f.ordinal == ordinal)
    }

    pub fn relocations(&self) -> &[RelocationBlock] {
        &self.relocations
    }

    pub fn tls(&self) -> Option<&TlsDirectory> {
        self.tls.as_ref()
    }

    pub fn tls_callbacks(&self) -> &[u64] {
        self.tls
            .as_ref()
            .map(|t| t.callbacks.as_slice())
            .unwrap_or_default()
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }
}

/// A PE file opened by path or from memory.
///
/// Parsing never fails loudly: a file that could not be decoded is kept
/// around as an invalid container whose accessors are all empty.
#[derive(Debug)]
pub struct PeFile {
    path: Option<PathBuf>,
    file_size: OnceLock<u64>,
    image: anyhow::Result<PeImage>,
}

impl PeFile {
    /// Maps and parses the file at `path`. The mapping and the file handle
    /// are released before this returns.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_size = OnceLock::new();
        let image = Self::load(&path, &file_size);
        if let Err(e) = &image {
            error!("{}: {:#}", path.display(), e);
        }

        Self {
            path: Some(path),
            file_size,
            image,
        }
    }

    /// Parses an in-memory copy of a file.
    pub fn from_bytes(data: &[u8]) -> Self {
        let image = PeImage::parse(data).map_err(anyhow::Error::from);
        if let Err(e) = &image {
            error!("{:#}", e);
        }

        Self {
            path: None,
            file_size: OnceLock::from(data.len() as u64),
            image,
        }
    }

    fn load(path: &Path, file_size: &OnceLock<u64>) -> anyhow::Result<PeImage> {
        let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
        let size = file.metadata()?.len();
        let _ = file_size.set(size);

        // Reject undersized inputs before mapping anything.
        if size < DOS_HEADER_SIZE as u64 {
            return Err(PeError::TooSmall {
                size,
                required: DOS_HEADER_SIZE as u64,
            }
            .into());
        }

        let mmap = unsafe { Mmap::map(&file)? };
        Ok(PeImage::parse(&mmap)?)
    }

    /// True only when every parsing step succeeded.
    pub fn is_valid(&self) -> bool {
        self.image.is_ok()
    }

    pub fn image(&self) -> Option<&PeImage> {
        self.image.as_ref().ok()
    }

    /// Why the file is invalid, if it is.
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.image.as_ref().err()
    }

    /// The hard parse failure, when the file is invalid because of its
    /// contents rather than an I/O problem.
    pub fn pe_error(&self) -> Option<&PeError> {
        self.error().and_then(|e| e.downcast_ref::<PeError>())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the input in bytes, computed on first use and cached.
    pub fn file_size(&self) -> u64 {
        *self.file_size.get_or_init(|| {
            self.path
                .as_ref()
                .and_then(|p| fs::metadata(p).ok())
                .map_or(0, |m| m.len())
        })
    }

    pub fn sections(&self) -> &[Section] {
        self.image().map(PeImage::sections).unwrap_or_default()
    }

    pub fn data_directories(&self) -> [DataDirectory; DATA_DIRECTORY_COUNT] {
        self.image()
            .map(PeImage::data_directories)
            .unwrap_or_default()
    }

    pub fn exports(&self) -> &[ExportedFunction] {
        self.image().map(PeImage::exports).unwrap_or_default()
    }

    pub fn relocations(&self) -> &[RelocationBlock] {
        self.image().map(PeImage::relocations).unwrap_or_default()
    }

    pub fn tls(&self) -> Option<&TlsDirectory> {
        self.image().and_then(PeImage::tls)
    }

    pub fn certificates(&self) -> &[Certificate] {
        self.image().map(PeImage::certificates).unwrap_or_default()
    }
}
