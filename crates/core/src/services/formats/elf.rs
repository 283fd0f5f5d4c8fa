use std::collections::HashMap;
use std::path::Path;

use goblin::container::{Container, Ctx, Endian};
use goblin::elf::{self, header, program_header, section_header, sym, Elf, SectionHeader};
use goblin::strtab::Strtab;
use tracing::{debug, trace, warn};

use crate::config::IntrospectConfig;
use crate::model::{Arch, BinaryFormat, FunctionDescriptor, StubEntry, SymbolEntry};
use crate::services::image::{BinaryImage, CodeRegion, ImageParts};
use crate::services::introspection::{read_binary, BinaryIntrospector, IntrospectError};

/// Introspector for ELF executables, shared objects and relocatable objects.
///
/// Function symbols come from `.symtab`, or from `.dynsym` when the binary is
/// stripped. Stubs are the PLT slots (`.plt` or `.plt.sec`), named after the
/// imported symbol of the PLT relocation that binds each slot, plus the
/// `.plt.got` entries, named after the relocation of the GOT slot they jump
/// through.
#[derive(Debug)]
pub struct ElfIntrospector {
    image: BinaryImage,
}

impl ElfIntrospector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntrospectError> {
        Self::open_with(path, &IntrospectConfig::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        config: &IntrospectConfig,
    ) -> Result<Self, IntrospectError> {
        let path = path.as_ref();
        let bytes = read_binary(path)?;
        let parts = match Elf::parse(&bytes) {
            Ok(elf) => extract(&elf, &bytes),
            Err(e) => Err(format!("not a valid ELF file: {e}")),
        }
        .map_err(|reason| IntrospectError::load(path, reason))?;
        Ok(Self::from_image(BinaryImage::new(path.to_path_buf(), bytes, parts, config)))
    }

    pub(crate) fn from_image(image: BinaryImage) -> Self {
        Self { image }
    }
}

impl BinaryIntrospector for ElfIntrospector {
    fn image(&self) -> &BinaryImage {
        &self.image
    }

    fn resolve_function(&self, name: &str) -> Result<FunctionDescriptor<'_>, IntrospectError> {
        let entry = self
            .image
            .symbols()
            .get(name)
            .ok_or_else(|| IntrospectError::UnknownSymbol(name.to_string()))?;
        trace!(name, address = entry.address, size = entry.size, "resolved ELF symbol");
        self.image.describe(entry)
    }

    fn name_for_address(&self, address: u64) -> Option<&str> {
        self.image.symbols().first_at(address).map(|e| e.name.as_str())
    }

    fn plt_name_for_address(&self, address: u64) -> Option<&str> {
        self.image.stubs().name_at(address)
    }
}

/// Copy symbols, PLT stubs and code regions out of a parsed ELF file.
pub(crate) fn extract(elf: &Elf, bytes: &[u8]) -> Result<ImageParts, String> {
    let arch = arch_from_machine(elf.header.e_machine, elf.is_64);
    if arch.is_none() {
        debug!(e_machine = elf.header.e_machine, "no decoder for ELF machine type");
    }
    Ok(ImageParts {
        format: BinaryFormat::Elf,
        arch,
        symbols: function_symbols(elf),
        stubs: plt_stubs(elf, bytes, arch),
        regions: code_regions(elf, bytes.len()),
    })
}

fn arch_from_machine(machine: u16, is_64: bool) -> Option<Arch> {
    match machine {
        header::EM_X86_64 => Some(Arch::X86_64),
        header::EM_386 => Some(Arch::X86),
        header::EM_AARCH64 => Some(Arch::Arm64),
        header::EM_ARM => Some(Arch::Arm),
        header::EM_RISCV if is_64 => Some(Arch::RiscV64),
        header::EM_RISCV => Some(Arch::RiscV32),
        _ => None,
    }
}

fn is_defined_function(sym: &elf::Sym) -> bool {
    matches!(sym.st_type(), sym::STT_FUNC | sym::STT_GNU_IFUNC)
        && sym.st_shndx != section_header::SHN_UNDEF as usize
}

fn function_symbols(elf: &Elf) -> Vec<SymbolEntry> {
    let (syms, strtab) = if elf.syms.is_empty() {
        debug!("no .symtab; falling back to .dynsym");
        (&elf.dynsyms, &elf.dynstrtab)
    } else {
        (&elf.syms, &elf.strtab)
    };

    syms.iter()
        .filter(is_defined_function)
        .filter_map(|sym| {
            let name = strtab.get_at(sym.st_name).filter(|n| !n.is_empty())?;
            Some(SymbolEntry::new(name, sym.st_value, sym.st_size))
        })
        .collect()
}

fn section_name<'a>(elf: &Elf<'a>, sh: &SectionHeader) -> &'a str {
    elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("")
}

fn section_by_name<'e>(elf: &'e Elf, name: &str) -> Option<&'e SectionHeader> {
    elf.section_headers.iter().find(|sh| section_name(elf, sh) == name)
}

fn code_regions(elf: &Elf, file_len: usize) -> Vec<CodeRegion> {
    let mut regions: Vec<CodeRegion> = elf
        .section_headers
        .iter()
        .filter(|sh| {
            sh.sh_flags & u64::from(section_header::SHF_EXECINSTR) != 0
                && sh.sh_type != section_header::SHT_NOBITS
                && sh.sh_size > 0
        })
        .filter_map(|sh| {
            let file_end = sh.sh_offset.checked_add(sh.sh_size)?;
            if file_end > file_len as u64 {
                return None;
            }
            Some(CodeRegion {
                name: section_name(elf, sh).to_string(),
                start: sh.sh_addr,
                end: sh.sh_addr.saturating_add(sh.sh_size),
                file_offset: sh.sh_offset as usize,
            })
        })
        .collect();

    if regions.is_empty() {
        // Section headers stripped: fall back to executable load segments.
        regions = elf
            .program_headers
            .iter()
            .enumerate()
            .filter(|(_, ph)| {
                ph.p_type == program_header::PT_LOAD
                    && ph.p_flags & program_header::PF_X != 0
                    && ph.p_filesz > 0
                    && ph.p_offset.saturating_add(ph.p_filesz) <= file_len as u64
            })
            .map(|(idx, ph)| CodeRegion {
                name: format!("LOAD[{idx}]"),
                start: ph.p_vaddr,
                end: ph.p_vaddr.saturating_add(ph.p_filesz),
                file_offset: ph.p_offset as usize,
            })
            .collect();
    }
    regions
}

/// PLT slot geometry: slot `i` starts at `base + header + i * entry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PltSlots {
    base: u64,
    header: u64,
    entry: u64,
    end: u64,
}

impl PltSlots {
    fn address(&self, idx: usize) -> Option<u64> {
        let offset = self.entry.checked_mul(idx as u64)?.checked_add(self.header)?;
        let address = self.base.checked_add(offset)?;
        (address.checked_add(self.entry)? <= self.end).then_some(address)
    }
}

/// `(header, entry)` sizes of a lazy-binding `.plt` section.
fn plt_layout(arch: Arch) -> (u64, u64) {
    match arch {
        Arch::X86 | Arch::X86_64 => (16, 16),
        Arch::Arm64 => (32, 16),
        Arch::Arm => (20, 12),
        Arch::RiscV32 | Arch::RiscV64 => (32, 16),
    }
}

fn plt_slots(elf: &Elf, arch: Option<Arch>) -> Option<PltSlots> {
    // With IBT the callable stubs live in .plt.sec and .plt only holds the
    // lazy-binding trampolines.
    if let Some(sec) = section_by_name(elf, ".plt.sec") {
        return Some(PltSlots {
            base: sec.sh_addr,
            header: 0,
            entry: 16,
            end: sec.sh_addr.saturating_add(sec.sh_size),
        });
    }
    let plt = section_by_name(elf, ".plt")?;
    let (header, entry) = plt_layout(arch?);
    Some(PltSlots { base: plt.sh_addr, header, entry, end: plt.sh_addr.saturating_add(plt.sh_size) })
}

fn symbol_name(syms: &elf::Symtab, strtab: &Strtab, idx: usize) -> Option<String> {
    if idx == 0 {
        return None;
    }
    let sym = syms.get(idx)?;
    strtab.get_at(sym.st_name).filter(|n| !n.is_empty()).map(str::to_string)
}

/// Symbol table linked from section `link`, parsed straight from the section
/// headers.
fn linked_symbols<'a>(
    elf: &Elf<'a>,
    bytes: &'a [u8],
    link: usize,
) -> Option<(elf::Symtab<'a>, Strtab<'a>)> {
    let symtab = elf.section_headers.get(link)?;
    if symtab.sh_entsize == 0 {
        return None;
    }
    let strtab = elf.section_headers.get(symtab.sh_link as usize)?;
    let container = if elf.is_64 { Container::Big } else { Container::Little };
    let endian = if elf.little_endian { Endian::Little } else { Endian::Big };
    let count = (symtab.sh_size / symtab.sh_entsize) as usize;
    let syms =
        elf::Symtab::parse(bytes, symtab.sh_offset as usize, count, Ctx::new(container, endian))
            .ok()?;
    let strings = Strtab::parse(bytes, strtab.sh_offset as usize, strtab.sh_size as usize, 0).ok()?;
    Some((syms, strings))
}

/// A relocation reduced to the GOT slot it patches and the symbol it names.
type NamedReloc = (u64, Option<String>);

fn named_relocs(
    relocs: impl IntoIterator<Item = elf::Reloc>,
    syms: &elf::Symtab,
    strtab: &Strtab,
) -> Vec<NamedReloc> {
    relocs.into_iter().map(|r| (r.r_offset, symbol_name(syms, strtab, r.r_sym))).collect()
}

/// Relocations of the sections called `names`, read through the section
/// headers. Used when there is no dynamic segment.
fn section_relocs(elf: &Elf, bytes: &[u8], names: &[&str]) -> Vec<NamedReloc> {
    let mut out = Vec::new();
    for (idx, relocs) in &elf.shdr_relocs {
        let Some(sh) = elf.section_headers.get(*idx) else { continue };
        if !names.contains(&section_name(elf, sh)) {
            continue;
        }
        let Some((syms, strtab)) = linked_symbols(elf, bytes, sh.sh_link as usize) else {
            continue;
        };
        out.extend(named_relocs(relocs.iter(), &syms, &strtab));
    }
    out
}

/// PLT relocations in order. A `None` name marks a relocation that binds a
/// slot without naming a symbol (e.g. `IRELATIVE`).
fn plt_relocs(elf: &Elf, bytes: &[u8]) -> Vec<NamedReloc> {
    if !elf.pltrelocs.is_empty() {
        return named_relocs(elf.pltrelocs.iter(), &elf.dynsyms, &elf.dynstrtab);
    }
    // No dynamic segment to read DT_JMPREL from; look for the section instead.
    section_relocs(elf, bytes, &[".rela.plt", ".rel.plt"])
}

/// GOT slot address to imported name, from every dynamic relocation that
/// names a symbol. The first relocation of a slot wins.
fn got_names(elf: &Elf, bytes: &[u8]) -> HashMap<u64, String> {
    let relocs = if elf.dynrelas.is_empty() && elf.dynrels.is_empty() && elf.pltrelocs.is_empty()
    {
        section_relocs(elf, bytes, &[".rela.dyn", ".rel.dyn", ".rela.plt", ".rel.plt"])
    } else {
        let mut relocs = named_relocs(elf.dynrelas.iter(), &elf.dynsyms, &elf.dynstrtab);
        relocs.extend(named_relocs(elf.dynrels.iter(), &elf.dynsyms, &elf.dynstrtab));
        relocs.extend(named_relocs(elf.pltrelocs.iter(), &elf.dynsyms, &elf.dynstrtab));
        relocs
    };

    let mut names = HashMap::new();
    for (offset, name) in relocs {
        if let Some(name) = name {
            names.entry(offset).or_insert(name);
        }
    }
    names
}

fn plt_stubs(elf: &Elf, bytes: &[u8], arch: Option<Arch>) -> Vec<StubEntry> {
    let mut stubs = lazy_plt_stubs(elf, bytes, arch);
    stubs.extend(plt_got_stubs(elf, bytes, arch));
    stubs
}

/// Stubs of `.plt` or `.plt.sec`, paired with PLT relocations by position.
fn lazy_plt_stubs(elf: &Elf, bytes: &[u8], arch: Option<Arch>) -> Vec<StubEntry> {
    let imports = plt_relocs(elf, bytes);
    if imports.is_empty() {
        return Vec::new();
    }
    let Some(slots) = plt_slots(elf, arch) else {
        debug!(relocations = imports.len(), "PLT relocations present but no PLT section to map");
        return Vec::new();
    };

    let total = imports.len();
    let mut stubs = Vec::with_capacity(total);
    for (idx, (_, name)) in imports.into_iter().enumerate() {
        let Some(address) = slots.address(idx) else {
            warn!(dropped = total - idx, "PLT relocations outnumber PLT slots");
            break;
        };
        if let Some(name) = name {
            stubs.push(StubEntry::new(address, name));
        }
    }
    stubs
}

/// Stubs of `.plt.got`, which jump through GOT slots bound by `GLOB_DAT`
/// relocations rather than through `.got.plt`. Each entry is named after the
/// relocation of the slot its indirect jump reads.
fn plt_got_stubs(elf: &Elf, bytes: &[u8], arch: Option<Arch>) -> Vec<StubEntry> {
    let Some(arch @ (Arch::X86 | Arch::X86_64)) = arch else {
        return Vec::new();
    };
    let Some(sec) = section_by_name(elf, ".plt.got") else {
        return Vec::new();
    };
    if sec.sh_type == section_header::SHT_NOBITS {
        return Vec::new();
    }
    let Some(data) = sec
        .sh_offset
        .checked_add(sec.sh_size)
        .and_then(|end| bytes.get(sec.sh_offset as usize..end as usize))
    else {
        warn!(offset = sec.sh_offset, size = sec.sh_size, ".plt.got extends past end of file");
        return Vec::new();
    };

    let names = got_names(elf, bytes);
    let got_base = section_by_name(elf, ".got.plt")
        .or_else(|| section_by_name(elf, ".got"))
        .map(|sh| sh.sh_addr);
    let entry = plt_got_entry_size(sec.sh_entsize, data);

    let mut stubs = Vec::new();
    for (idx, chunk) in data.chunks_exact(entry).enumerate() {
        let address = sec.sh_addr.saturating_add((idx * entry) as u64);
        let Some(target) = indirect_jump_target(arch, address, chunk, got_base) else {
            trace!(address, ".plt.got entry without an indirect jump");
            continue;
        };
        match names.get(&target) {
            Some(name) => stubs.push(StubEntry::new(address, name.clone())),
            None => trace!(address, target, "no relocation names .plt.got target"),
        }
    }
    stubs
}

/// 8-byte entries, or 16 with `endbr` landing pads, unless the section
/// records its own entry size.
fn plt_got_entry_size(entsize: u64, data: &[u8]) -> usize {
    match entsize {
        8 | 16 => entsize as usize,
        _ if data.starts_with(&ENDBR64) || data.starts_with(&ENDBR32) => 16,
        _ => 8,
    }
}

const ENDBR64: [u8; 4] = [0xF3, 0x0F, 0x1E, 0xFA];
const ENDBR32: [u8; 4] = [0xF3, 0x0F, 0x1E, 0xFB];

/// Slot read by the `jmp *...` in a stub entry at `address`: `jmp
/// *disp(%rip)` on x86-64, `jmp *abs` or `jmp *disp(%ebx)` (relative to the
/// GOT base) on x86.
fn indirect_jump_target(
    arch: Arch,
    address: u64,
    entry: &[u8],
    got_base: Option<u64>,
) -> Option<u64> {
    let modrm_ok = |modrm: u8| match arch {
        Arch::X86_64 => modrm == 0x25,
        _ => matches!(modrm, 0x25 | 0xA3),
    };
    let pos = entry.windows(2).position(|w| w[0] == 0xFF && modrm_ok(w[1]))?;
    let disp: [u8; 4] = entry.get(pos + 2..pos + 6)?.try_into().ok()?;
    let disp = i32::from_le_bytes(disp);
    match (arch, entry[pos + 1]) {
        (Arch::X86_64, _) => {
            address.checked_add(pos as u64 + 6)?.checked_add_signed(i64::from(disp))
        }
        (_, 0x25) => Some(u64::from(disp as u32)),
        _ => got_base?.checked_add_signed(i64::from(disp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plt_slots_skip_header_and_stop_at_section_end() {
        let (header, entry) = plt_layout(Arch::X86_64);
        let slots = PltSlots { base: 0x1FF0, header, entry, end: 0x2020 };
        assert_eq!(slots.address(0), Some(0x2000));
        assert_eq!(slots.address(1), Some(0x2010));
        assert_eq!(slots.address(2), None);
    }

    #[test]
    fn arm_plt_uses_twelve_byte_entries() {
        let (header, entry) = plt_layout(Arch::Arm);
        let slots = PltSlots { base: 0x400, header, entry, end: 0x400 + 20 + 3 * 12 };
        assert_eq!(slots.address(0), Some(0x414));
        assert_eq!(slots.address(2), Some(0x42C));
        assert_eq!(slots.address(3), None);
    }

    #[test]
    fn x86_64_plt_got_jump_is_rip_relative() {
        // jmp *0xff2(%rip); xchg %ax,%ax
        let entry = [0xFF, 0x25, 0xF2, 0x0F, 0x00, 0x00, 0x66, 0x90];
        assert_eq!(indirect_jump_target(Arch::X86_64, 0x1070, &entry, None), Some(0x2068));
        assert_eq!(plt_got_entry_size(0, &entry), 8);
    }

    #[test]
    fn ibt_plt_got_entries_skip_endbr_and_bnd_prefix() {
        // endbr64; bnd jmp *-0x10(%rip); nopl 0x0(%rax,%rax,1)
        let mut entry = ENDBR64.to_vec();
        entry.extend([0xF2, 0xFF, 0x25, 0xF0, 0xFF, 0xFF, 0xFF, 0x0F, 0x1F, 0x44, 0x00, 0x00]);
        assert_eq!(entry.len(), 16);
        assert_eq!(plt_got_entry_size(0, &entry), 16);
        assert_eq!(plt_got_entry_size(8, &entry), 8);
        assert_eq!(indirect_jump_target(Arch::X86_64, 0x2000, &entry, None), Some(0x2000 + 11 - 0x10));
    }

    #[test]
    fn x86_plt_got_jumps_are_absolute_or_got_relative() {
        // jmp *0x804a00c
        let absolute = [0xFF, 0x25, 0x0C, 0xA0, 0x04, 0x08, 0x66, 0x90];
        assert_eq!(indirect_jump_target(Arch::X86, 0x8048300, &absolute, None), Some(0x804A00C));
        // jmp *-0x8(%ebx)
        let pic = [0xFF, 0xA3, 0xF8, 0xFF, 0xFF, 0xFF, 0x66, 0x90];
        assert_eq!(indirect_jump_target(Arch::X86, 0x300, &pic, Some(0x4000)), Some(0x3FF8));
        assert_eq!(indirect_jump_target(Arch::X86, 0x300, &pic, None), None);
        assert_eq!(indirect_jump_target(Arch::X86_64, 0x300, &pic, Some(0x4000)), None);
    }

    #[test]
    fn truncated_jump_has_no_target() {
        assert_eq!(indirect_jump_target(Arch::X86_64, 0, &[0x90, 0xFF, 0x25, 0x00], None), None);
    }

    #[test]
    fn machine_types_map_to_decoders() {
        assert_eq!(arch_from_machine(header::EM_X86_64, true), Some(Arch::X86_64));
        assert_eq!(arch_from_machine(header::EM_RISCV, false), Some(Arch::RiscV32));
        assert_eq!(arch_from_machine(header::EM_RISCV, true), Some(Arch::RiscV64));
        assert_eq!(arch_from_machine(header::EM_MIPS, false), None);
    }
}
