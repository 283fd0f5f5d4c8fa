//! introspect-core
//!
//! Core library for looking up functions in native binaries: where a function
//! starts, how large it is, what instructions it contains, and which imported
//! routine a dynamic-linking stub dispatches to.
//!
//! Binaries are opened through [`open`] (format detected from the contents) or
//! through a concrete introspector such as [`ElfIntrospector`]. Every
//! introspector implements [`BinaryIntrospector`].
//!
//! ```no_run
//! use introspect_core::{open, BinaryIntrospector};
//!
//! let bin = open("/bin/true")?;
//! let main = bin.resolve_function("main")?;
//! println!("{} @ 0x{:x} ({} bytes)", main.name, main.address, main.size);
//! print!("{}", main.listing());
//! # Ok::<(), introspect_core::IntrospectError>(())
//! ```

pub mod config;
pub mod model;
pub mod services;

#[cfg(feature = "test")]
pub mod testing;

pub use config::IntrospectConfig;
pub use model::{
    Arch, BinaryFormat, FunctionDescriptor, Instruction, StubEntry, SymbolEntry, Syntax,
};
pub use services::{
    open, open_with, BinaryImage, BinaryIntrospector, CodeRegion, ElfIntrospector,
    IntrospectError, Introspector, MachOIntrospector, PeIntrospector, StubTable, SymbolTable,
};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
