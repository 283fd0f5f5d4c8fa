//! Container-format variants of [`BinaryIntrospector`](crate::services::introspection::BinaryIntrospector).
//!
//! Each module owns the loader for its format: it walks goblin's view of the
//! file once, copies out the function symbols, stubs and code regions, and
//! hands them to a [`BinaryImage`](crate::services::image::BinaryImage).

pub mod elf;
pub mod macho;
pub mod pe;

pub use elf::ElfIntrospector;
pub use macho::MachOIntrospector;
pub use pe::PeIntrospector;

use crate::model::SymbolEntry;
use crate::services::image::CodeRegion;

/// Give every symbol a size for formats whose symbol tables record none.
///
/// A symbol extends to the next higher symbol start in the same code region,
/// or to the end of that region. Symbols outside every region get size zero.
pub(crate) fn infer_sizes(entries: &mut [SymbolEntry], regions: &[CodeRegion]) {
    let mut starts: Vec<u64> = entries.iter().map(|e| e.address).collect();
    starts.sort_unstable();
    starts.dedup();

    for entry in entries.iter_mut() {
        let Some(region) = regions.iter().find(|r| entry.address >= r.start && entry.address < r.end)
        else {
            entry.size = 0;
            continue;
        };
        let next = starts.partition_point(|&a| a <= entry.address);
        let end = match starts.get(next) {
            Some(&next_start) if next_start < region.end => next_start,
            _ => region.end,
        };
        entry.size = end - entry.address;
    }
}
