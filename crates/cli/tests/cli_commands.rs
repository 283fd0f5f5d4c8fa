use std::path::PathBuf;

use introspect_core::testing::ElfFixture;
use predicates::prelude::*;
use tempfile::tempdir;

fn sample(dir: &tempfile::TempDir) -> PathBuf {
    ElfFixture::sample().write_to(dir.path(), "sample.elf").expect("write fixture")
}

#[test]
fn function_prints_address_size_and_listing() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("function")
        .arg(&bin)
        .arg("main")
        .assert()
        .success()
        .stdout(predicate::str::contains("main @ 0x1000 (32 bytes, 30 instructions)"))
        .stdout(predicate::str::contains("0x1000: push rbp"))
        .stdout(predicate::str::contains("0x101f: ret"));
}

#[test]
fn function_with_att_flag_uses_att_syntax() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("function")
        .arg(&bin)
        .arg("main")
        .arg("--att")
        .assert()
        .success()
        .stdout(predicate::str::contains("%rsp, %rbp"));
}

#[test]
fn unknown_function_fails() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("function")
        .arg(&bin)
        .arg("no_such_fn")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown symbol: no_such_fn"));
}

#[test]
fn name_lookup_accepts_hex_with_or_without_prefix() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    for address in ["0x1000", "1000"] {
        assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
            .arg("name")
            .arg(&bin)
            .arg(address)
            .assert()
            .success()
            .stdout("0x1000: main\n");
    }

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("name")
        .arg(&bin)
        .arg("0x1010")
        .assert()
        .success()
        .stdout("0x1010: (none)\n");
}

#[test]
fn plt_lookup_reports_import_names() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("plt")
        .arg(&bin)
        .arg("0x2010")
        .assert()
        .success()
        .stdout("0x2010: puts\n");

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("plt")
        .arg(&bin)
        .arg("0x2004")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": null"));
}

#[test]
fn symbols_and_stubs_list_tables() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("symbols")
        .arg(&bin)
        .assert()
        .success()
        .stdout(predicate::str::contains("Functions (5):"))
        .stdout(predicate::str::contains("0x0000000000001020..0x0000000000001030       16 helper"))
        .stdout(predicate::str::contains("main_alias"))
        .stdout(predicate::str::contains("data_obj").not());

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("stubs")
        .arg(&bin)
        .assert()
        .success()
        .stdout(predicate::str::contains("Stubs (2):"))
        .stdout(predicate::str::contains("0x0000000000002000 printf"));
}

#[test]
fn info_reports_format_arch_and_hash() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);
    let expected_hash = binary_introspect::sha256_hex(&std::fs::read(&bin).expect("read"));

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("info")
        .arg(&bin)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: ELF"))
        .stdout(predicate::str::contains("Arch: x86_64"))
        .stdout(predicate::str::contains(".text 0x1000..0x1040"))
        .stdout(predicate::str::contains(expected_hash));
}

#[test]
fn info_json_is_machine_readable() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    let output = assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("info")
        .arg(&bin)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(value["format"], "elf");
    assert_eq!(value["arch"], "x86_64");
    assert_eq!(value["functions"], 5);
    assert_eq!(value["stubs"], 2);
}

#[test]
fn missing_binary_fails() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("info")
        .arg(dir.path().join("nope.elf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("binary not found"));
}

#[test]
fn malformed_address_fails() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("name")
        .arg(&bin)
        .arg("0xZZ")
        .assert()
        .failure();
}

#[test]
fn config_file_sets_syntax() {
    let dir = tempdir().expect("tempdir");
    let bin = sample(&dir);
    let config = dir.path().join("introspect.yaml");
    std::fs::write(&config, "syntax: att\n").expect("write config");

    assert_cmd::cargo::cargo_bin_cmd!("binary-introspect")
        .arg("--config")
        .arg(&config)
        .arg("function")
        .arg(&bin)
        .arg("helper")
        .assert()
        .success()
        .stdout(predicate::str::contains("%eax, %eax"));
}
