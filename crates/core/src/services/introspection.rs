use std::fs;
use std::path::{Path, PathBuf};

use goblin::{mach, Object};
use thiserror::Error;

use crate::config::IntrospectConfig;
use crate::model::{Arch, BinaryFormat, FunctionDescriptor};
use crate::services::formats::{self, ElfIntrospector, MachOIntrospector, PeIntrospector};
use crate::services::image::{BinaryImage, StubTable, SymbolTable};

#[derive(Debug, Error)]
pub enum IntrospectError {
    /// The file could not be read or is not a binary of a supported format.
    #[error("Failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    /// The byte range could not be decoded into instructions.
    #[error("Cannot decode {size} bytes at 0x{address:X}: {reason}")]
    Decode { address: u64, size: u64, reason: String },
}

impl IntrospectError {
    pub(crate) fn load(path: &Path, reason: impl Into<String>) -> Self {
        IntrospectError::Load { path: path.to_path_buf(), reason: reason.into() }
    }

    pub(crate) fn decode(address: u64, size: u64, reason: impl Into<String>) -> Self {
        IntrospectError::Decode { address, size, reason: reason.into() }
    }
}

/// Function metadata and address/name resolution over one loaded binary.
///
/// Implementations own their [`BinaryImage`] exclusively and never mutate it
/// after construction, so queries are independent of each other and safe to
/// issue from several threads.
pub trait BinaryIntrospector: Send + Sync {
    /// The parsed image backing this introspector.
    fn image(&self) -> &BinaryImage;

    /// Address, size and decoded body of the function named exactly `name`.
    ///
    /// A function recorded with size zero resolves to an empty instruction
    /// list; the decoder is not consulted for it.
    fn resolve_function(&self, name: &str) -> Result<FunctionDescriptor<'_>, IntrospectError>;

    /// Name of the function starting exactly at `address`.
    ///
    /// Addresses inside a function body do not match. When several symbols
    /// share the address, the first one in symbol-table order wins.
    fn name_for_address(&self, address: u64) -> Option<&str>;

    /// Name of the imported routine whose dynamic-linking stub starts exactly at
    /// `address`.
    fn plt_name_for_address(&self, address: u64) -> Option<&str>;

    fn format(&self) -> BinaryFormat {
        self.image().format()
    }

    fn arch(&self) -> Option<Arch> {
        self.image().arch()
    }

    fn path(&self) -> &Path {
        self.image().path()
    }

    fn symbols(&self) -> &SymbolTable {
        self.image().symbols()
    }

    fn stubs(&self) -> &StubTable {
        self.image().stubs()
    }
}

/// Introspector for any supported container format, chosen from the file's
/// contents when it is opened.
#[derive(Debug)]
pub enum Introspector {
    Elf(ElfIntrospector),
    MachO(MachOIntrospector),
    Pe(PeIntrospector),
}

impl Introspector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntrospectError> {
        Self::open_with(path, &IntrospectConfig::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        config: &IntrospectConfig,
    ) -> Result<Self, IntrospectError> {
        let path = path.as_ref();
        let bytes = read_binary(path)?;

        let parts = match Object::parse(&bytes) {
            Ok(Object::Elf(elf)) => formats::elf::extract(&elf, &bytes),
            Ok(Object::Mach(mach::Mach::Binary(bin))) => {
                formats::macho::extract(&bin, &bytes, config)
            }
            Ok(Object::Mach(mach::Mach::Fat(_))) => {
                Err("fat Mach-O archives are not supported; extract one architecture first"
                    .to_string())
            }
            Ok(Object::PE(pe)) => formats::pe::extract(&pe, &bytes),
            Ok(Object::Unknown(magic)) => {
                Err(format!("unrecognized binary format (magic 0x{magic:X})"))
            }
            Ok(_) => Err("unsupported container format".to_string()),
            Err(e) => Err(format!("malformed binary: {e}")),
        }
        .map_err(|reason| IntrospectError::load(path, reason))?;

        let image = BinaryImage::new(path.to_path_buf(), bytes, parts, config);
        Ok(match image.format() {
            BinaryFormat::Elf => Introspector::Elf(ElfIntrospector::from_image(image)),
            BinaryFormat::MachO => Introspector::MachO(MachOIntrospector::from_image(image)),
            BinaryFormat::Pe => Introspector::Pe(PeIntrospector::from_image(image)),
        })
    }

    fn inner(&self) -> &dyn BinaryIntrospector {
        match self {
            Introspector::Elf(inner) => inner,
            Introspector::MachO(inner) => inner,
            Introspector::Pe(inner) => inner,
        }
    }
}

impl BinaryIntrospector for Introspector {
    fn image(&self) -> &BinaryImage {
        self.inner().image()
    }

    fn resolve_function(&self, name: &str) -> Result<FunctionDescriptor<'_>, IntrospectError> {
        self.inner().resolve_function(name)
    }

    fn name_for_address(&self, address: u64) -> Option<&str> {
        self.inner().name_for_address(address)
    }

    fn plt_name_for_address(&self, address: u64) -> Option<&str> {
        self.inner().plt_name_for_address(address)
    }
}

/// Open `path` with the default configuration, detecting its format.
pub fn open(path: impl AsRef<Path>) -> Result<Introspector, IntrospectError> {
    Introspector::open(path)
}

/// Open `path` with an explicit configuration, detecting its format.
pub fn open_with(
    path: impl AsRef<Path>,
    config: &IntrospectConfig,
) -> Result<Introspector, IntrospectError> {
    Introspector::open_with(path, config)
}

pub(crate) fn read_binary(path: &Path) -> Result<Vec<u8>, IntrospectError> {
    if !path.is_file() {
        return Err(IntrospectError::load(path, "binary not found"));
    }
    let bytes = fs::read(path).map_err(|e| IntrospectError::load(path, e.to_string()))?;
    if bytes.is_empty() {
        return Err(IntrospectError::load(path, "file is empty"));
    }
    Ok(bytes)
}
