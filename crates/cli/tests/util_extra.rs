use std::fs;

use binary_introspect::{build_config, load_config, parse_addr, sha256_hex};
use introspect_core::{Arch, Syntax};
use tempfile::tempdir;

#[test]
fn parse_addr_is_always_hex() {
    assert_eq!(parse_addr("0x1000").unwrap(), 0x1000);
    assert_eq!(parse_addr("1000").unwrap(), 0x1000);
    assert_eq!(parse_addr("0XdeadBEEF").unwrap(), 0xDEAD_BEEF);
    assert_eq!(parse_addr("ffffffffffffffff").unwrap(), u64::MAX);
    assert!(parse_addr("").is_err());
    assert!(parse_addr("0x").is_err());
    assert!(parse_addr("g00d").is_err());
    assert!(parse_addr("1_0000000000000000").is_err());
}

#[test]
fn config_loads_json_and_yaml_by_extension() {
    let dir = tempdir().unwrap();
    let json = dir.path().join("cfg.json");
    fs::write(&json, r#"{"arch": "aarch64", "keep_leading_underscore": true}"#).unwrap();
    let config = load_config(&json).unwrap();
    assert_eq!(config.arch, Some(Arch::Arm64));
    assert!(config.keep_leading_underscore);

    let yaml = dir.path().join("cfg.yml");
    fs::write(&yaml, "arch: riscv64\nsyntax: att\n").unwrap();
    let config = load_config(&yaml).unwrap();
    assert_eq!(config.arch, Some(Arch::RiscV64));
    assert_eq!(config.syntax, Syntax::Att);
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempdir().unwrap();
    let json = dir.path().join("broken.json");
    fs::write(&json, "{ not json").unwrap();
    let err = load_config(&json).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config JSON"));

    let yaml = dir.path().join("bad_arch.yaml");
    fs::write(&yaml, "arch: mips\n").unwrap();
    assert!(load_config(&yaml).is_err());

    assert!(load_config(&dir.path().join("absent.yaml")).is_err());
}

#[test]
fn command_line_overrides_win_over_file() {
    let dir = tempdir().unwrap();
    let yaml = dir.path().join("cfg.yaml");
    fs::write(&yaml, "arch: x86\nsyntax: intel\n").unwrap();

    let config = build_config(Some(&yaml), Some(Arch::X86_64), true).unwrap();
    assert_eq!(config.arch, Some(Arch::X86_64));
    assert_eq!(config.syntax, Syntax::Att);

    let config = build_config(None, None, false).unwrap();
    assert_eq!(config.arch, None);
    assert_eq!(config.syntax, Syntax::Intel);
}

#[test]
fn sha256_hex_matches_known_digest() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
