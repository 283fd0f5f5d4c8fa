use std::path::Path;

use anyhow::Result;
use introspect_core::{Arch, BinaryFormat, BinaryIntrospector, CodeRegion, IntrospectConfig};
use serde::Serialize;

use crate::commands::{open_binary, print_json};
use crate::sha256_hex;

/// Summary printed by `info`.
#[derive(Debug, Serialize)]
pub struct BinaryInfo {
    pub path: String,
    pub format: BinaryFormat,
    pub arch: Option<Arch>,
    pub functions: usize,
    pub stubs: usize,
    pub regions: Vec<CodeRegion>,
    pub sha256: String,
}

pub fn binary_info(path: &Path, config: &IntrospectConfig) -> Result<BinaryInfo> {
    let bin = open_binary(path, config)?;
    Ok(BinaryInfo {
        path: path.display().to_string(),
        format: bin.format(),
        arch: bin.arch(),
        functions: bin.symbols().len(),
        stubs: bin.stubs().len(),
        regions: bin.image().regions().to_vec(),
        sha256: sha256_hex(bin.image().bytes()),
    })
}

/// Show format, architecture, table sizes and hash of a binary. The hash
/// covers the bytes the introspector loaded.
pub fn info_command(path: &Path, config: &IntrospectConfig, json: bool) -> Result<()> {
    let info = binary_info(path, config)?;
    if json {
        return print_json(&info);
    }

    println!("Binary: {}", info.path);
    println!("  Format: {}", info.format);
    println!("  Arch: {}", info.arch.map(|a| a.as_str()).unwrap_or("unknown"));
    println!("  Functions: {}", info.functions);
    println!("  Stubs: {}", info.stubs);
    println!("  Code regions:");
    if info.regions.is_empty() {
        println!("    (none)");
    }
    for region in &info.regions {
        println!("    - {} 0x{:x}..0x{:x}", region.name, region.start, region.end);
    }
    println!("  SHA-256: {}", info.sha256);
    Ok(())
}
