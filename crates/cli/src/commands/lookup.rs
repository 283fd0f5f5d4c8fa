use std::path::Path;

use anyhow::Result;
use introspect_core::{BinaryIntrospector, IntrospectConfig};
use serde::Serialize;

use crate::commands::{open_binary, print_json};

/// Result of an address lookup. `name` is `None` when nothing starts there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressLookup {
    pub address: u64,
    pub name: Option<String>,
}

impl AddressLookup {
    fn print(&self) {
        println!("0x{:x}: {}", self.address, self.name.as_deref().unwrap_or("(none)"));
    }
}

pub fn lookup_name(bin: &impl BinaryIntrospector, address: u64) -> AddressLookup {
    AddressLookup { address, name: bin.name_for_address(address).map(str::to_string) }
}

pub fn lookup_plt(bin: &impl BinaryIntrospector, address: u64) -> AddressLookup {
    AddressLookup { address, name: bin.plt_name_for_address(address).map(str::to_string) }
}

/// Print address, size and disassembly of one function.
pub fn function_command(
    path: &Path,
    name: &str,
    config: &IntrospectConfig,
    json: bool,
) -> Result<()> {
    let bin = open_binary(path, config)?;
    let function = bin.resolve_function(name)?;
    if json {
        return print_json(&function);
    }

    println!(
        "{} @ 0x{:x} ({} bytes, {} instructions)",
        function.name,
        function.address,
        function.size,
        function.instructions.len()
    );
    for insn in &function.instructions {
        println!("  {insn}");
    }
    Ok(())
}

/// Print the function starting exactly at `address`.
pub fn name_command(path: &Path, address: u64, config: &IntrospectConfig, json: bool) -> Result<()> {
    let bin = open_binary(path, config)?;
    let lookup = lookup_name(&bin, address);
    if json {
        return print_json(&lookup);
    }
    lookup.print();
    Ok(())
}

/// Print the imported routine whose stub starts exactly at `address`.
pub fn plt_command(path: &Path, address: u64, config: &IntrospectConfig, json: bool) -> Result<()> {
    let bin = open_binary(path, config)?;
    let lookup = lookup_plt(&bin, address);
    if json {
        return print_json(&lookup);
    }
    lookup.print();
    Ok(())
}
