use binary_introspect::commands::{
    binary_info, function_command, info_command, lookup_name, lookup_plt, name_command,
    open_binary, plt_command, stubs_command, symbols_command, AddressLookup,
};
use introspect_core::testing::ElfFixture;
use introspect_core::{BinaryFormat, IntrospectConfig};
use tempfile::tempdir;

#[test]
fn lookups_report_exact_matches_only() {
    let dir = tempdir().unwrap();
    let path = ElfFixture::sample().write_to(dir.path(), "sample.elf").unwrap();
    let bin = open_binary(&path, &IntrospectConfig::default()).expect("open");

    assert_eq!(
        lookup_name(&bin, 0x1020),
        AddressLookup { address: 0x1020, name: Some("helper".into()) }
    );
    assert_eq!(lookup_name(&bin, 0x1021).name, None);
    assert_eq!(lookup_plt(&bin, 0x2000).name.as_deref(), Some("printf"));
    assert_eq!(lookup_plt(&bin, 0x1000).name, None);
}

#[test]
fn binary_info_counts_tables() {
    let dir = tempdir().unwrap();
    let path = ElfFixture::sample().write_to(dir.path(), "sample.elf").unwrap();
    let info = binary_info(&path, &IntrospectConfig::default()).unwrap();

    assert_eq!(info.format, BinaryFormat::Elf);
    assert_eq!(info.functions, 5);
    assert_eq!(info.stubs, 2);
    assert_eq!(info.sha256.len(), 64);
    let names: Vec<&str> = info.regions.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, [".text", ".plt"]);
}

#[test]
fn commands_succeed_in_text_and_json_modes() {
    let dir = tempdir().unwrap();
    let path = ElfFixture::sample().write_to(dir.path(), "sample.elf").unwrap();
    let config = IntrospectConfig::default();

    for json in [false, true] {
        info_command(&path, &config, json).expect("info");
        function_command(&path, "helper", &config, json).expect("function");
        function_command(&path, "empty_fn", &config, json).expect("empty function");
        name_command(&path, 0x1010, &config, json).expect("name miss is not an error");
        plt_command(&path, 0x2000, &config, json).expect("plt");
        symbols_command(&path, &config, json).expect("symbols");
        stubs_command(&path, &config, json).expect("stubs");
    }
}

#[test]
fn command_errors_carry_context() {
    let dir = tempdir().unwrap();
    let path = ElfFixture::sample().write_to(dir.path(), "sample.elf").unwrap();
    let config = IntrospectConfig::default();

    let err = function_command(&path, "bogus_fn", &config, false).unwrap_err();
    assert!(err.to_string().contains("Cannot decode 8 bytes at 0x1800"), "{err}");

    let missing = dir.path().join("missing.elf");
    let err = symbols_command(&missing, &config, false).unwrap_err();
    assert!(format!("{err:#}").contains("binary not found"), "{err:#}");
}
