use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use introspect_core::{Arch, IntrospectConfig, Syntax};
use sha2::{Digest, Sha256};

pub mod commands;

/// Parse an address from a string.
///
/// Addresses are always hexadecimal, with or without a `0x` prefix.
pub fn parse_addr(s: &str) -> Result<u64> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(digits, 16).with_context(|| format!("Failed to parse address: {s}"))
}

/// Load an [`IntrospectConfig`] from `path`: JSON for `.json` files, YAML
/// otherwise.
pub fn load_config(path: &Path) -> Result<IntrospectConfig> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&bytes).context("Failed to parse config JSON")?
    } else {
        serde_yaml::from_slice(&bytes).context("Failed to parse config YAML")?
    };
    Ok(config)
}

/// Merge the optional config file with command-line overrides, which win.
pub fn build_config(path: Option<&Path>, arch: Option<Arch>, att: bool) -> Result<IntrospectConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => IntrospectConfig::default(),
    };
    if let Some(arch) = arch {
        config.arch = Some(arch);
    }
    if att {
        config.syntax = Syntax::Att;
    }
    Ok(config)
}

/// SHA-256 of `bytes` as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
