use std::path::Path;

use goblin::mach::constants::{cputype, S_ATTR_PURE_INSTRUCTIONS, S_ATTR_SOME_INSTRUCTIONS};
use goblin::mach::symbols::{N_SECT, N_STAB, N_TYPE};
use goblin::mach::{Mach, MachO};
use tracing::{debug, trace, warn};

use super::infer_sizes;
use crate::config::IntrospectConfig;
use crate::model::{Arch, BinaryFormat, FunctionDescriptor, StubEntry, SymbolEntry};
use crate::services::image::{BinaryImage, CodeRegion, ImageParts};
use crate::services::introspection::{read_binary, BinaryIntrospector, IntrospectError};

/// Introspector for thin Mach-O images.
///
/// The symbol table records no sizes; each function is taken to run up to the
/// next symbol in the same section. Stub addresses are the dyld bind slots of
/// imported symbols.
#[derive(Debug)]
pub struct MachOIntrospector {
    image: BinaryImage,
}

impl MachOIntrospector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntrospectError> {
        Self::open_with(path, &IntrospectConfig::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        config: &IntrospectConfig,
    ) -> Result<Self, IntrospectError> {
        let path = path.as_ref();
        let bytes = read_binary(path)?;
        let parts = match Mach::parse(&bytes) {
            Ok(Mach::Binary(bin)) => extract(&bin, &bytes, config),
            Ok(Mach::Fat(_)) => Err("fat Mach-O archives are not supported; extract one architecture first"
                .to_string()),
            Err(e) => Err(format!("not a valid Mach-O file: {e}")),
        }
        .map_err(|reason| IntrospectError::load(path, reason))?;
        Ok(Self::from_image(BinaryImage::new(path.to_path_buf(), bytes, parts, config)))
    }

    pub(crate) fn from_image(image: BinaryImage) -> Self {
        Self { image }
    }
}

impl BinaryIntrospector for MachOIntrospector {
    fn image(&self) -> &BinaryImage {
        &self.image
    }

    fn resolve_function(&self, name: &str) -> Result<FunctionDescriptor<'_>, IntrospectError> {
        let entry = self
            .image
            .symbols()
            .get(name)
            .ok_or_else(|| IntrospectError::UnknownSymbol(name.to_string()))?;
        trace!(name, address = entry.address, size = entry.size, "resolved Mach-O symbol");
        self.image.describe(entry)
    }

    fn name_for_address(&self, address: u64) -> Option<&str> {
        self.image.symbols().first_at(address).map(|e| e.name.as_str())
    }

    fn plt_name_for_address(&self, address: u64) -> Option<&str> {
        self.image.stubs().name_at(address)
    }
}

pub(crate) fn extract(
    bin: &MachO,
    bytes: &[u8],
    config: &IntrospectConfig,
) -> Result<ImageParts, String> {
    let arch = arch_from_cputype(bin.header.cputype());
    let (regions, code_sections) = code_regions(bin, bytes.len())?;

    let mut symbols = Vec::new();
    for sym in bin.symbols() {
        let (name, nlist) = sym.map_err(|e| format!("bad symbol table: {e}"))?;
        if nlist.n_type & N_STAB != 0 || nlist.n_type & N_TYPE != N_SECT {
            continue;
        }
        if !code_sections.contains(&nlist.n_sect) || name.is_empty() {
            continue;
        }
        symbols.push(SymbolEntry::new(display_name(name, config), nlist.n_value, 0));
    }
    infer_sizes(&mut symbols, &regions);

    let stubs = match bin.imports() {
        Ok(imports) => imports
            .into_iter()
            .map(|import| StubEntry::new(import.address, display_name(import.name, config)))
            .collect(),
        Err(e) => {
            warn!(error = %e, "could not read dyld bind information; no stubs recorded");
            Vec::new()
        }
    };

    Ok(ImageParts { format: BinaryFormat::MachO, arch, symbols, stubs, regions })
}

fn arch_from_cputype(cpu: u32) -> Option<Arch> {
    match cpu {
        cputype::CPU_TYPE_X86_64 => Some(Arch::X86_64),
        cputype::CPU_TYPE_X86 => Some(Arch::X86),
        cputype::CPU_TYPE_ARM64 => Some(Arch::Arm64),
        cputype::CPU_TYPE_ARM => Some(Arch::Arm),
        _ => None,
    }
}

fn display_name(name: &str, config: &IntrospectConfig) -> String {
    if config.keep_leading_underscore {
        return name.to_string();
    }
    name.strip_prefix('_').unwrap_or(name).to_string()
}

/// Sections holding instructions, plus their 1-based section ordinals as used
/// by `n_sect`.
fn code_regions(bin: &MachO, file_len: usize) -> Result<(Vec<CodeRegion>, Vec<usize>), String> {
    let mut regions = Vec::new();
    let mut ordinals = Vec::new();
    let mut ordinal = 0usize;
    for segment in bin.segments.sections() {
        for section in segment {
            let (section, _) = section.map_err(|e| format!("bad section header: {e}"))?;
            ordinal += 1;
            if section.flags & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS) == 0
                || section.size == 0
            {
                continue;
            }
            let file_end = u64::from(section.offset).saturating_add(section.size);
            if file_end > file_len as u64 {
                debug!(section = ordinal, "instruction section lies past end of file");
                continue;
            }
            regions.push(CodeRegion {
                name: section.name().unwrap_or("").to_string(),
                start: section.addr,
                end: section.addr.saturating_add(section.size),
                file_offset: section.offset as usize,
            });
            ordinals.push(ordinal);
        }
    }
    Ok((regions, ordinals))
}
