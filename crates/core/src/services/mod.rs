//! Loaders, symbol indexes and the decoder behind the public introspectors.

pub mod disasm;
pub mod formats;
pub mod image;
pub mod introspection;

pub use formats::{ElfIntrospector, MachOIntrospector, PeIntrospector};
pub use image::{BinaryImage, CodeRegion, StubTable, SymbolTable};
pub use introspection::{open, open_with, BinaryIntrospector, IntrospectError, Introspector};
