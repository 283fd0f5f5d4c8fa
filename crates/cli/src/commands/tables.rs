use std::path::Path;

use anyhow::Result;
use introspect_core::{BinaryIntrospector, IntrospectConfig, StubEntry, SymbolEntry};

use crate::commands::{open_binary, print_json};

/// List function symbols in symbol-table order.
pub fn symbols_command(path: &Path, config: &IntrospectConfig, json: bool) -> Result<()> {
    let bin = open_binary(path, config)?;
    let entries: Vec<&SymbolEntry> = bin.symbols().iter().collect();
    if json {
        return print_json(&entries);
    }

    println!("Functions ({}):", entries.len());
    if entries.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for entry in entries {
        println!(
            "  0x{:016x}..0x{:016x} {:>8} {}",
            entry.address,
            entry.end(),
            entry.size,
            entry.name
        );
    }
    Ok(())
}

/// List dynamic-linking stubs.
pub fn stubs_command(path: &Path, config: &IntrospectConfig, json: bool) -> Result<()> {
    let bin = open_binary(path, config)?;
    let entries: Vec<&StubEntry> = bin.stubs().iter().collect();
    if json {
        return print_json(&entries);
    }

    println!("Stubs ({}):", entries.len());
    if entries.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for entry in entries {
        println!("  0x{:016x} {}", entry.address, entry.name);
    }
    Ok(())
}
