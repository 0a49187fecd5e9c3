//! Fixed sizes and name lookup tables for PE constants.
//!
//! All lookups are pure functions over `match` tables; there is no global
//! state.

use object::pe;

pub const DOS_HEADER_SIZE: usize = 64;
/// `PE\0\0` plus the 20-byte COFF file header.
pub const PE_HEADER_SIZE: usize = 24;
pub const SECTION_HEADER_SIZE: usize = pe::IMAGE_SIZEOF_SECTION_HEADER;
pub const DATA_DIRECTORY_COUNT: usize = pe::IMAGE_NUMBEROF_DIRECTORY_ENTRIES;

pub const PE32_MAGIC: u16 = pe::IMAGE_NT_OPTIONAL_HDR32_MAGIC;
pub const PE32_PLUS_MAGIC: u16 = pe::IMAGE_NT_OPTIONAL_HDR64_MAGIC;

pub const WIN_CERT_REVISION_1_0: u16 = 0x0100;
pub const WIN_CERT_REVISION_2_0: u16 = 0x0200;

pub const WIN_CERT_TYPE_X509: u16 = 0x0001;
pub const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;
pub const WIN_CERT_TYPE_RESERVED_1: u16 = 0x0003;
pub const WIN_CERT_TYPE_TS_STACK_SIGNED: u16 = 0x0004;

pub fn optional_magic_name(magic: u16) -> Option<&'static str> {
    match magic {
        PE32_MAGIC => Some("PE32"),
        PE32_PLUS_MAGIC => Some("PE32+"),
        pe::IMAGE_ROM_OPTIONAL_HDR_MAGIC => Some("ROM"),
        _ => None,
    }
}

pub fn directory_name(index: usize) -> &'static str {
    match index {
        pe::IMAGE_DIRECTORY_ENTRY_EXPORT => "export",
        pe::IMAGE_DIRECTORY_ENTRY_IMPORT => "import",
        pe::IMAGE_DIRECTORY_ENTRY_RESOURCE => "resource",
        pe::IMAGE_DIRECTORY_ENTRY_EXCEPTION => "exception",
        pe::IMAGE_DIRECTORY_ENTRY_SECURITY => "security",
        pe::IMAGE_DIRECTORY_ENTRY_BASERELOC => "base relocation",
        pe::IMAGE_DIRECTORY_ENTRY_DEBUG => "debug",
        pe::IMAGE_DIRECTORY_ENTRY_ARCHITECTURE => "architecture",
        pe::IMAGE_DIRECTORY_ENTRY_GLOBALPTR => "global pointer",
        pe::IMAGE_DIRECTORY_ENTRY_TLS => "TLS",
        pe::IMAGE_DIRECTORY_ENTRY_LOAD_CONFIG => "load config",
        pe::IMAGE_DIRECTORY_ENTRY_BOUND_IMPORT => "bound import",
        pe::IMAGE_DIRECTORY_ENTRY_IAT => "IAT",
        pe::IMAGE_DIRECTORY_ENTRY_DELAY_IMPORT => "delay import",
        pe::IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR => "COM descriptor",
        15 => "reserved",
        _ => "invalid",
    }
}

pub fn machine_name(machine: u16) -> Option<&'static str> {
    match machine {
        pe::IMAGE_FILE_MACHINE_UNKNOWN => Some("unknown"),
        pe::IMAGE_FILE_MACHINE_I386 => Some("x86"),
        pe::IMAGE_FILE_MACHINE_AMD64 => Some("x86-64"),
        pe::IMAGE_FILE_MACHINE_ARM => Some("ARM"),
        pe::IMAGE_FILE_MACHINE_ARMNT => Some("ARMv7 Thumb-2"),
        pe::IMAGE_FILE_MACHINE_ARM64 => Some("ARM64"),
        pe::IMAGE_FILE_MACHINE_IA64 => Some("Itanium"),
        pe::IMAGE_FILE_MACHINE_EBC => Some("EFI byte code"),
        pe::IMAGE_FILE_MACHINE_RISCV64 => Some("RISC-V 64"),
        _ => None,
    }
}

pub fn subsystem_name(subsystem: u16) -> Option<&'static str> {
    match subsystem {
        pe::IMAGE_SUBSYSTEM_NATIVE => Some("native"),
        pe::IMAGE_SUBSYSTEM_WINDOWS_GUI => Some("Windows GUI"),
        pe::IMAGE_SUBSYSTEM_WINDOWS_CUI => Some("Windows console"),
        pe::IMAGE_SUBSYSTEM_WINDOWS_CE_GUI => Some("Windows CE GUI"),
        pe::IMAGE_SUBSYSTEM_EFI_APPLICATION => Some("EFI application"),
        pe::IMAGE_SUBSYSTEM_EFI_BOOT_SERVICE_DRIVER => Some("EFI boot service driver"),
        pe::IMAGE_SUBSYSTEM_EFI_RUNTIME_DRIVER => Some("EFI runtime driver"),
        pe::IMAGE_SUBSYSTEM_XBOX => Some("Xbox"),
        _ => None,
    }
}

pub fn relocation_type_name(kind: u16) -> Option<&'static str> {
    match kind {
        pe::IMAGE_REL_BASED_ABSOLUTE => Some("ABSOLUTE"),
        pe::IMAGE_REL_BASED_HIGH => Some("HIGH"),
        pe::IMAGE_REL_BASED_LOW => Some("LOW"),
        pe::IMAGE_REL_BASED_HIGHLOW => Some("HIGHLOW"),
        pe::IMAGE_REL_BASED_HIGHADJ => Some("HIGHADJ"),
        pe::IMAGE_REL_BASED_DIR64 => Some("DIR64"),
        _ => None,
    }
}

pub fn certificate_revision_name(revision: u16) -> Option<&'static str> {
    match revision {
        WIN_CERT_REVISION_1_0 => Some("WIN_CERT_REVISION_1_0"),
        WIN_CERT_REVISION_2_0 => Some("WIN_CERT_REVISION_2_0"),
        _ => None,
    }
}

pub fn certificate_type_name(kind: u16) -> Option<&'static str> {
    match kind {
        WIN_CERT_TYPE_X509 => Some("WIN_CERT_TYPE_X509"),
        WIN_CERT_TYPE_PKCS_SIGNED_DATA => Some("WIN_CERT_TYPE_PKCS_SIGNED_DATA"),
        WIN_CERT_TYPE_RESERVED_1 => Some("WIN_CERT_TYPE_RESERVED_1"),
        WIN_CERT_TYPE_TS_STACK_SIGNED => Some("WIN_CERT_TYPE_TS_STACK_SIGNED"),
        _ => None,
    }
}

pub fn is_known_certificate_revision(revision: u16) -> bool {
    certificate_revision_name(revision).is_some()
}

pub fn is_known_certificate_type(kind: u16) -> bool {
    certificate_type_name(kind).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes_match_the_on_disk_layout() {
        assert_eq!(DOS_HEADER_SIZE, 0x40);
        assert_eq!(SECTION_HEADER_SIZE, 40);
        assert_eq!(DATA_DIRECTORY_COUNT, 16);
        assert_eq!(PE32_MAGIC, 0x10B);
        assert_eq!(PE32_PLUS_MAGIC, 0x20B);
    }

    #[test]
    fn directory_names_cover_every_slot() {
        assert_eq!(directory_name(0), "export");
        assert_eq!(directory_name(4), "security");
        assert_eq!(directory_name(9), "TLS");
        assert_eq!(directory_name(15), "reserved");
        assert_eq!(directory_name(16), "invalid");
    }

    #[test]
    fn certificate_tables_reject_unknown_values() {
        assert!(is_known_certificate_revision(0x0200));
        assert!(!is_known_certificate_revision(0x0300));
        assert!(is_known_certificate_type(2));
        assert!(!is_known_certificate_type(0));
        assert_eq!(
            certificate_type_name(2),
            Some("WIN_CERT_TYPE_PKCS_SIGNED_DATA")
        );
    }

    #[test]
    fn lookups_name_common_values() {
        assert_eq!(machine_name(0x8664), Some("x86-64"));
        assert_eq!(machine_name(0x1234), None);
        assert_eq!(subsystem_name(3), Some("Windows console"));
        assert_eq!(relocation_type_name(10), Some("DIR64"));
        assert_eq!(optional_magic_name(0x20B), Some("PE32+"));
    }
}
