use std::path::Path;

use anyhow::{Context, Result};
use introspect_core::{IntrospectConfig, Introspector};
use serde::Serialize;

/// Open `path` with format detection, attaching the path to any load error.
pub fn open_binary(path: &Path, config: &IntrospectConfig) -> Result<Introspector> {
    introspect_core::open_with(path, config)
        .with_context(|| format!("Failed to open binary {}", path.display()))
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    println!("{serialized}");
    Ok(())
}
