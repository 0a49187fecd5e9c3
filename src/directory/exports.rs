//! Export directory.

use super::{DirectoryParser, ImageContext};
use crate::cursor::ByteCursor;
use crate::error::{PeError, Result};
use log::debug;
use object::pe::IMAGE_DIRECTORY_ENTRY_EXPORT;

/// One entry of the export address table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedFunction {
    /// `Base` plus the index in the address table.
    pub ordinal: u32,
    /// RVA of the code, or of the forwarder string for forwarded exports.
    pub address: u32,
    pub name: Option<String>,
    /// `MODULE.Symbol` target of a forwarded export.
    pub forward_name: Option<String>,
}

impl ExportedFunction {
    pub fn is_forwarded(&self) -> bool {
        self.forward_name.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportDirectory {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub name_rva: u32,
    pub base: u32,
    pub number_of_functions: u32,
    pub number_of_names: u32,
    pub address_of_functions: u32,
    pub address_of_names: u32,
    pub address_of_name_ordinals: u32,
    /// The DLL name the directory declares for itself.
    pub dll_name: String,
    pub functions: Vec<ExportedFunction>,
}

pub struct ExportParser;

impl DirectoryParser for ExportParser {
    const INDEX: usize = IMAGE_DIRECTORY_ENTRY_EXPORT;

    type Output = Option<ExportDirectory>;

    fn parse(image: &ImageContext<'_>) -> Result<Self::Output> {
        let Some(mut cursor) = image.locate(Self::INDEX)? else {
            return Ok(None);
        };

        let mut directory = ExportDirectory {
            characteristics: cursor.read_u32()?,
            time_date_stamp: cursor.read_u32()?,
            major_version: cursor.read_u16()?,
            minor_version: cursor.read_u16()?,
            name_rva: cursor.read_u32()?,
            base: cursor.read_u32()?,
            number_of_functions: cursor.read_u32()?,
            number_of_names: cursor.read_u32()?,
            address_of_functions: cursor.read_u32()?,
            address_of_names: cursor.read_u32()?,
            address_of_name_ordinals: cursor.read_u32()?,
            ..ExportDirectory::default()
        };

        directory.dll_name =
            image.string_at_rva(u64::from(directory.name_rva), "exported DLL name")?;

        let mut functions = read_functions(image, &directory)?;
        assign_names(image, &directory, &mut functions)?;
        directory.functions = functions;

        debug!(
            "Parsed {} exports ({} named) from {}",
            directory.functions.len(),
            directory.number_of_names,
            directory.dll_name
        );
        Ok(Some(directory))
    }
}

fn read_functions(
    image: &ImageContext<'_>,
    directory: &ExportDirectory,
) -> Result<Vec<ExportedFunction>> {
    let count = directory.number_of_functions as usize;
    let export_dir = image.directory(ExportParser::INDEX)?;
    let mut cursor = image.cursor_at_rva(
        u64::from(directory.address_of_functions),
        "export address table",
    )?;

    let mut functions = Vec::with_capacity(count.min(cursor.remaining() / 4));
    for index in 0..count {
        let address = cursor.read_u32()?;
        let forward_name = if export_dir.strictly_contains(address) {
            Some(image.string_at_rva(u64::from(address), "forwarded export name")?)
        } else {
            None
        };
        functions.push(ExportedFunction {
            ordinal: directory.base.wrapping_add(index as u32),
            address,
            name: None,
            forward_name,
        });
    }
    Ok(functions)
}

fn assign_names(
    image: &ImageContext<'_>,
    directory: &ExportDirectory,
    functions: &mut [ExportedFunction],
) -> Result<()> {
    let count = directory.number_of_names as usize;
    let name_rvas = read_table(
        image.cursor_at_rva(u64::from(directory.address_of_names), "export name table")?,
        count,
        ByteCursor::read_u32,
    )?;
    let ordinals = read_table(
        image.cursor_at_rva(
            u64::from(directory.address_of_name_ordinals),
            "export ordinal table",
        )?,
        count,
        ByteCursor::read_u16,
    )?;

    for (index, (&name_rva, &ordinal)) in name_rvas.iter().zip(&ordinals).enumerate() {
        let available = functions.len();
        let function = functions
            .get_mut(usize::from(ordinal))
            .ok_or(PeError::OrdinalOutOfRange {
                index,
                ordinal,
                count: available,
            })?;
        function.name = Some(image.string_at_rva(u64::from(name_rva), "export name")?);
    }
    Ok(())
}

fn read_table<'a, T>(
    mut cursor: ByteCursor<'a>,
    count: usize,
    read: impl Fn(&mut ByteCursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut table = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        table.push(read(&mut cursor)?);
    }
    Ok(table)
}
