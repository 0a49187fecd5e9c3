use anyhow::{anyhow, Result};
use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use normalize_path::NormalizePath;
use pe_dissector::constants::{directory_name, machine_name, optional_magic_name, subsystem_name};
use pe_dissector::{PeFile, PeImage};
use std::fs;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(short, long)]
    input: String,

    /// Write each embedded certificate blob into this directory.
    #[arg(short, long)]
    dump_certs: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> Result<()> {
    let args = Args::parse();

    log::set_logger(&LOGGER).map_err(|e| anyhow!("Could not install logger: {}", e))?;
    log::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    let pe = PeFile::open(&args.input);
    let image = match pe.image() {
        Some(image) => image,
        None => {
            let reason = pe
                .error()
                .map(|e| format!("{:#}", e))
                .unwrap_or_default();
            return Err(anyhow!("{} is not a valid PE: {}", args.input, reason));
        }
    };

    print_summary(image, pe.file_size());

    if let Some(dir) = &args.dump_certs {
        dump_certificates(image, Path::new(dir))?;
    }

    Ok(())
}

fn print_summary(image: &PeImage, file_size: u64) {
    let header = image.pe_header();
    println!("File size: {:#X}", file_size);
    println!(
        "Machine: {} ({:#06X}), {}",
        machine_name(header.machine).unwrap_or("UNKNOWN"),
        header.machine,
        image
            .optional_header()
            .and_then(|h| optional_magic_name(h.magic()))
            .unwrap_or("no optional header")
    );
    if let Some(optional) = image.optional_header() {
        println!("Image base: {:#X}", optional.image_base());
        println!("Entry point: {:#X}", optional.standard().address_of_entry_point);
        println!(
            "Subsystem: {}",
            subsystem_name(optional.windows().subsystem).unwrap_or("UNKNOWN")
        );
    }

    println!("Sections: {}", image.sections().len());
    for section in image.sections() {
        println!(
            "  {:<8} VA {:#010X} VSize {:#010X} Raw {:#010X} RawSize {:#010X}",
            section.name(),
            section.virtual_address,
            section.virtual_size,
            section.pointer_to_raw_data,
            section.size_of_raw_data
        );
    }

    for (index, directory) in image.data_directories().iter().enumerate() {
        if !directory.is_empty() {
            println!(
                "Directory {:<16} RVA {:#010X} Size {:#X}",
                directory_name(index),
                directory.virtual_address,
                directory.size
            );
        }
    }

    if let Some(dll) = image.dll_name() {
        println!("Exports of {}: {}", dll, image.exports().len());
        for export in image.exports() {
            let name = export.name.as_deref().unwrap_or("<ordinal only>");
            match &export.forward_name {
                Some(target) => println!("  #{:<5} {} -> {}", export.ordinal, name, target),
                None => println!("  #{:<5} {} @ {:#X}", export.ordinal, name, export.address),
            }
        }
    }

    let entries: usize = image.relocations().iter().map(|b| b.entries.len()).sum();
    println!(
        "Relocations: {} blocks, {} entries",
        image.relocations().len(),
        entries
    );

    if let Some(tls) = image.tls() {
        println!("TLS callbacks: {}", tls.callbacks.len());
        for callback in &tls.callbacks {
            println!("  {:#X}", callback);
        }
    }

    println!("Certificates: {}", image.certificates().len());
    for certificate in image.certificates() {
        println!(
            "  {} / {}, {:#X} bytes",
            certificate.type_name(),
            certificate.revision_name(),
            certificate.data.len()
        );
    }
}

fn dump_certificates(image: &PeImage, dir: &Path) -> Result<()> {
    let output = dir.normalize();
    fs::create_dir_all(&output)?;

    for (index, certificate) in image.certificates().iter().enumerate() {
        let name = format!("certificate_{}.{}", index, certificate.extension());
        let path = output.join(name).normalize();

        // Sanitize path to prevent traversal attacks
        if !path.starts_with(&output) {
            return Err(anyhow!("Path traversal found: {:?}", path));
        }

        println!("Dump certificate: {}, size: {:#X}", path.display(), certificate.data.len());
        fs::write(path, &certificate.data)?;
    }

    Ok(())
}
