use std::path::Path;

use goblin::pe::{header, section_table, PE};
use tracing::{debug, trace};

use super::infer_sizes;
use crate::config::IntrospectConfig;
use crate::model::{Arch, BinaryFormat, FunctionDescriptor, StubEntry, SymbolEntry};
use crate::services::image::{BinaryImage, CodeRegion, ImageParts};
use crate::services::introspection::{read_binary, BinaryIntrospector, IntrospectError};

/// Introspector for PE images. All addresses are RVAs.
///
/// Functions are the exports that land in executable sections; stubs are the
/// import address table slots, named after the imported routine.
#[derive(Debug)]
pub struct PeIntrospector {
    image: BinaryImage,
}

impl PeIntrospector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntrospectError> {
        Self::open_with(path, &IntrospectConfig::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        config: &IntrospectConfig,
    ) -> Result<Self, IntrospectError> {
        let path = path.as_ref();
        let bytes = read_binary(path)?;
        let parts = match PE::parse(&bytes) {
            Ok(pe) => extract(&pe, &bytes),
            Err(e) => Err(format!("not a valid PE file: {e}")),
        }
        .map_err(|reason| IntrospectError::load(path, reason))?;
        Ok(Self::from_image(BinaryImage::new(path.to_path_buf(), bytes, parts, config)))
    }

    pub(crate) fn from_image(image: BinaryImage) -> Self {
        Self { image }
    }
}

impl BinaryIntrospector for PeIntrospector {
    fn image(&self) -> &BinaryImage {
        &self.image
    }

    fn resolve_function(&self, name: &str) -> Result<FunctionDescriptor<'_>, IntrospectError> {
        let entry = self
            .image
            .symbols()
            .get(name)
            .ok_or_else(|| IntrospectError::UnknownSymbol(name.to_string()))?;
        trace!(name, rva = entry.address, size = entry.size, "resolved PE export");
        self.image.describe(entry)
    }

    fn name_for_address(&self, address: u64) -> Option<&str> {
        self.image.symbols().first_at(address).map(|e| e.name.as_str())
    }

    fn plt_name_for_address(&self, address: u64) -> Option<&str> {
        self.image.stubs().name_at(address)
    }
}

pub(crate) fn extract(pe: &PE, bytes: &[u8]) -> Result<ImageParts, String> {
    let arch = arch_from_machine(pe.header.coff_header.machine);
    let regions = code_regions(pe, bytes.len());

    let mut symbols: Vec<SymbolEntry> = pe
        .exports
        .iter()
        .filter(|export| export.reexport.is_none())
        .filter_map(|export| {
            let name = export.name.filter(|n| !n.is_empty())?;
            let rva = export.rva as u64;
            regions
                .iter()
                .any(|r| rva >= r.start && rva < r.end)
                .then(|| SymbolEntry::new(name, rva, 0))
        })
        .collect();
    infer_sizes(&mut symbols, &regions);

    let stubs = pe
        .imports
        .iter()
        .map(|import| StubEntry::new(import.rva as u64, import.name.to_string()))
        .collect();

    Ok(ImageParts { format: BinaryFormat::Pe, arch, symbols, stubs, regions })
}

fn arch_from_machine(machine: u16) -> Option<Arch> {
    match machine {
        header::COFF_MACHINE_X86_64 => Some(Arch::X86_64),
        header::COFF_MACHINE_X86 => Some(Arch::X86),
        header::COFF_MACHINE_ARM64 => Some(Arch::Arm64),
        header::COFF_MACHINE_ARMNT => Some(Arch::Arm),
        _ => None,
    }
}

fn code_regions(pe: &PE, file_len: usize) -> Vec<CodeRegion> {
    pe.sections
        .iter()
        .filter(|s| s.characteristics & section_table::IMAGE_SCN_MEM_EXECUTE != 0)
        .filter_map(|s| {
            // Virtual size beyond the raw data is zero-fill, which has no bytes to decode.
            let len = match s.virtual_size {
                0 => s.size_of_raw_data,
                v => v.min(s.size_of_raw_data),
            };
            let file_end = u64::from(s.pointer_to_raw_data) + u64::from(len);
            if len == 0 || file_end > file_len as u64 {
                debug!(section = s.name().unwrap_or("?"), "executable section has no file data");
                return None;
            }
            Some(CodeRegion {
                name: s.name().unwrap_or("").to_string(),
                start: u64::from(s.virtual_address),
                end: u64::from(s.virtual_address) + u64::from(len),
                file_offset: s.pointer_to_raw_data as usize,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coff_machines_map_to_decoders() {
        assert_eq!(arch_from_machine(header::COFF_MACHINE_X86_64), Some(Arch::X86_64));
        assert_eq!(arch_from_machine(header::COFF_MACHINE_X86), Some(Arch::X86));
        assert_eq!(arch_from_machine(header::COFF_MACHINE_ARM64), Some(Arch::Arm64));
        assert_eq!(arch_from_machine(0), None);
    }
}
