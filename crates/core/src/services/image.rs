use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IntrospectConfig;
use crate::model::{Arch, BinaryFormat, FunctionDescriptor, Instruction, StubEntry, SymbolEntry, Syntax};
use crate::services::disasm;
use crate::services::introspection::IntrospectError;

/// Mapped range of executable bytes and where it lives in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRegion {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub file_offset: usize,
}

impl CodeRegion {
    pub fn contains_range(&self, start: u64, end: u64) -> bool {
        start >= self.start && end <= self.end && start < end
    }
}

/// Function symbols in table order, indexed by exact name and exact address.
///
/// Both indexes point at the FIRST entry in table order carrying that key, so
/// indexed lookups give the same answer as a front-to-back scan of the table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u64, usize>,
}

impl SymbolTable {
    pub fn new(entries: Vec<SymbolEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_address = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_name.contains_key(&entry.name) {
                debug!(name = %entry.name, address = entry.address, "duplicate symbol name; keeping first");
            } else {
                by_name.insert(entry.name.clone(), idx);
            }
            by_address.entry(entry.address).or_insert(idx);
        }
        Self { entries, by_name, by_address }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// First entry in table order whose address equals `address`.
    pub fn first_at(&self, address: u64) -> Option<&SymbolEntry> {
        self.by_address.get(&address).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a SymbolEntry;
    type IntoIter = std::slice::Iter<'a, SymbolEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Dynamic-linking stubs keyed by stub address.
#[derive(Debug, Clone, Default)]
pub struct StubTable {
    entries: Vec<StubEntry>,
    by_address: HashMap<u64, usize>,
}

impl StubTable {
    pub fn new(entries: Vec<StubEntry>) -> Self {
        let mut kept = Vec::with_capacity(entries.len());
        let mut by_address = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(&idx) = by_address.get(&entry.address) {
                let existing: &StubEntry = &kept[idx];
                warn!(
                    address = entry.address,
                    kept = %existing.name,
                    dropped = %entry.name,
                    "two stubs claim the same address"
                );
                continue;
            }
            by_address.insert(entry.address, kept.len());
            kept.push(entry);
        }
        Self { entries: kept, by_address }
    }

    pub fn name_at(&self, address: u64) -> Option<&str> {
        self.by_address.get(&address).map(|&idx| self.entries[idx].name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StubEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Format-specific tables extracted by a loader before the image takes
/// ownership of the file bytes.
#[derive(Debug, Clone)]
pub(crate) struct ImageParts {
    pub format: BinaryFormat,
    pub arch: Option<Arch>,
    pub symbols: Vec<SymbolEntry>,
    pub stubs: Vec<StubEntry>,
    pub regions: Vec<CodeRegion>,
}

/// Parsed representation of one binary file. Immutable once built.
#[derive(Debug)]
pub struct BinaryImage {
    path: PathBuf,
    format: BinaryFormat,
    arch: Option<Arch>,
    syntax: Syntax,
    bytes: Vec<u8>,
    symbols: SymbolTable,
    stubs: StubTable,
    regions: Vec<CodeRegion>,
}

impl BinaryImage {
    pub(crate) fn new(
        path: PathBuf,
        bytes: Vec<u8>,
        parts: ImageParts,
        config: &IntrospectConfig,
    ) -> Self {
        let arch = config.arch.or(parts.arch);
        let symbols = SymbolTable::new(parts.symbols);
        let stubs = StubTable::new(parts.stubs);
        debug!(
            path = %path.display(),
            format = %parts.format,
            arch = arch.map(|a| a.as_str()).unwrap_or("unknown"),
            symbols = symbols.len(),
            stubs = stubs.len(),
            regions = parts.regions.len(),
            "loaded binary image"
        );
        Self {
            path,
            format: parts.format,
            arch,
            syntax: config.syntax,
            bytes,
            symbols,
            stubs,
            regions: parts.regions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> BinaryFormat {
        self.format
    }

    pub fn arch(&self) -> Option<Arch> {
        self.arch
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn stubs(&self) -> &StubTable {
        &self.stubs
    }

    pub fn regions(&self) -> &[CodeRegion] {
        &self.regions
    }

    /// Raw bytes of `[address, address + size)`, which must lie inside one code
    /// region.
    pub fn code_bytes(&self, address: u64, size: u64) -> Result<&[u8], IntrospectError> {
        let start = self.code_address(address);
        let end = start
            .checked_add(size)
            .ok_or_else(|| IntrospectError::decode(address, size, "range overflows"))?;
        let region = self
            .regions
            .iter()
            .find(|r| r.contains_range(start, end))
            .ok_or_else(|| {
                IntrospectError::decode(address, size, "range is not inside a mapped executable region")
            })?;
        let offset = region.file_offset as u64 + (start - region.start);
        let begin = usize::try_from(offset)
            .map_err(|_| IntrospectError::decode(address, size, "file offset out of range"))?;
        let len = usize::try_from(size)
            .map_err(|_| IntrospectError::decode(address, size, "size out of range"))?;
        self.bytes
            .get(begin..begin.saturating_add(len))
            .ok_or_else(|| IntrospectError::decode(address, size, "range extends past end of file"))
    }

    /// Decode `[address, address + size)` into instructions.
    ///
    /// The whole range must decode; a range that stops short of `size` bytes is
    /// an error rather than a truncated listing.
    pub fn decode(&self, address: u64, size: u64) -> Result<Vec<Instruction>, IntrospectError> {
        let arch = self.arch.ok_or_else(|| {
            IntrospectError::decode(address, size, "unknown architecture; set an architecture override")
        })?;
        let code = self.code_bytes(address, size)?;
        let thumb = self.is_thumb(address);
        disasm::decode(arch, self.syntax, thumb, code, self.code_address(address))
            .map_err(|reason| IntrospectError::decode(address, size, reason))
    }

    /// Build the descriptor for `entry`, decoding its body unless it is empty.
    pub fn describe<'a>(
        &'a self,
        entry: &'a SymbolEntry,
    ) -> Result<FunctionDescriptor<'a>, IntrospectError> {
        if entry.size == 0 {
            return Ok(FunctionDescriptor {
                name: &entry.name,
                address: entry.address,
                size: 0,
                bytes: &[],
                instructions: Vec::new(),
            });
        }
        let bytes = self.code_bytes(entry.address, entry.size)?;
        let instructions = self.decode(entry.address, entry.size)?;
        Ok(FunctionDescriptor {
            name: &entry.name,
            address: entry.address,
            size: entry.size,
            bytes,
            instructions,
        })
    }

    /// ARM symbols with the low bit set point at Thumb code.
    fn is_thumb(&self, address: u64) -> bool {
        self.arch == Some(Arch::Arm) && address & 1 == 1
    }

    fn code_address(&self, address: u64) -> u64 {
        if self.is_thumb(address) {
            address & !1
        } else {
            address
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_first<'a>(entries: &'a [SymbolEntry], address: u64) -> Option<&'a SymbolEntry> {
        entries.iter().find(|e| e.address == address)
    }

    #[test]
    fn address_index_matches_linear_scan_with_aliases() {
        let entries = vec![
            SymbolEntry::new("start", 0x1000, 0x10),
            SymbolEntry::new("start_alias", 0x1000, 0x10),
            SymbolEntry::new("other", 0x1010, 0x8),
            SymbolEntry::new("zero", 0x1018, 0),
            SymbolEntry::new("other_alias", 0x1010, 0x8),
        ];
        let table = SymbolTable::new(entries.clone());
        for address in [0x1000, 0x1008, 0x1010, 0x1018, 0x2000] {
            assert_eq!(table.first_at(address), scan_first(&entries, address), "at 0x{address:X}");
        }
        assert_eq!(table.first_at(0x1000).unwrap().name, "start");
        assert_eq!(table.first_at(0x1010).unwrap().name, "other");
    }

    #[test]
    fn duplicate_names_keep_first_entry_but_stay_iterable() {
        let table = SymbolTable::new(vec![
            SymbolEntry::new("static_helper", 0x10, 4),
            SymbolEntry::new("static_helper", 0x20, 4),
        ]);
        assert_eq!(table.get("static_helper").unwrap().address, 0x10);
        assert_eq!(table.len(), 2);
        assert_eq!(table.first_at(0x20).unwrap().name, "static_helper");
    }

    #[test]
    fn stub_table_keeps_first_claim_on_an_address() {
        let table = StubTable::new(vec![
            StubEntry::new(0x2000, "printf"),
            StubEntry::new(0x2010, "puts"),
            StubEntry::new(0x2000, "shadow"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name_at(0x2000), Some("printf"));
        assert_eq!(table.name_at(0x2010), Some("puts"));
        assert_eq!(table.name_at(0x2004), None);
    }

    #[test]
    fn code_region_range_checks_are_half_open() {
        let region = CodeRegion { name: ".text".into(), start: 0x1000, end: 0x1040, file_offset: 0 };
        assert!(region.contains_range(0x1000, 0x1040));
        assert!(region.contains_range(0x1030, 0x1031));
        assert!(!region.contains_range(0x1030, 0x1041));
        assert!(!region.contains_range(0xFFF, 0x1001));
        assert!(!region.contains_range(0x1010, 0x1010));
    }

    fn image_with(bytes: Vec<u8>, regions: Vec<CodeRegion>, arch: Option<Arch>) -> BinaryImage {
        BinaryImage::new(
            PathBuf::from("unit.bin"),
            bytes,
            ImageParts {
                format: BinaryFormat::Elf,
                arch,
                symbols: vec![SymbolEntry::new("f", 0x400, 3), SymbolEntry::new("empty", 0x403, 0)],
                stubs: Vec::new(),
                regions,
            },
            &IntrospectConfig::default(),
        )
    }

    #[test]
    fn code_bytes_translate_addresses_through_file_offsets() {
        let mut bytes = vec![0u8; 0x20];
        bytes[0x10..0x13].copy_from_slice(&[0x55, 0x5D, 0xC3]);
        let region = CodeRegion { name: ".text".into(), start: 0x400, end: 0x404, file_offset: 0x10 };
        let image = image_with(bytes, vec![region], Some(Arch::X86_64));
        assert_eq!(image.code_bytes(0x400, 3).unwrap(), &[0x55, 0x5D, 0xC3]);
        assert!(matches!(image.code_bytes(0x402, 8), Err(IntrospectError::Decode { .. })));
    }

    #[test]
    fn zero_size_symbol_describes_without_decoding() {
        // No regions and no architecture: any decode attempt would fail.
        let image = image_with(vec![0u8; 4], Vec::new(), None);
        let empty = image.symbols().get("empty").unwrap();
        let descriptor = image.describe(empty).unwrap();
        assert!(descriptor.instructions.is_empty());
        assert!(descriptor.bytes.is_empty());

        let f = image.symbols().get("f").unwrap();
        assert!(matches!(image.describe(f), Err(IntrospectError::Decode { .. })));
    }
}
