//! Core data model for binaries, function symbols, import stubs, and decoded
//! instructions.
//!
//! Everything here is a plain value. Descriptors that point back into a loaded
//! binary borrow from it, so they cannot outlive the introspector that produced
//! them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container format of a loaded binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryFormat {
    Elf,
    #[serde(rename = "macho")]
    MachO,
    Pe,
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryFormat::Elf => "ELF",
            BinaryFormat::MachO => "Mach-O",
            BinaryFormat::Pe => "PE",
        };
        f.write_str(name)
    }
}

/// Instruction set used to decode function bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86", alias = "i386", alias = "i686")]
    X86,
    #[serde(rename = "x86_64", alias = "amd64", alias = "x64")]
    X86_64,
    #[serde(rename = "arm", alias = "armv7")]
    Arm,
    #[serde(rename = "arm64", alias = "aarch64")]
    Arm64,
    #[serde(rename = "riscv32")]
    RiscV32,
    #[serde(rename = "riscv64", alias = "riscv")]
    RiscV64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::RiscV32 => "riscv32",
            Arch::RiscV64 => "riscv64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an architecture name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown architecture: {0}")]
pub struct UnknownArch(pub String);

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Ok(Arch::X86_64),
            "x86" | "i386" | "i686" => Ok(Arch::X86),
            "arm" | "armv7" => Ok(Arch::Arm),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "riscv32" => Ok(Arch::RiscV32),
            "riscv64" | "riscv" => Ok(Arch::RiscV64),
            _ => Err(UnknownArch(s.to_string())),
        }
    }
}

/// Assembly syntax for x86 listings. Ignored for other architectures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    Intel,
    Att,
}

/// A function symbol drawn from a binary's symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self { name: name.into(), address, size }
    }

    /// Exclusive end of the symbol's byte range.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

/// A dynamic-linking stub (PLT slot, import slot) and the routine it dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubEntry {
    pub address: u64,
    pub name: String,
}

impl StubEntry {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self { address, name: name.into() }
    }
}

/// One decoded machine instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u64,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub operands: String,
}

impl Instruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "0x{:x}: {}", self.address, self.mnemonic)
        } else {
            write!(f, "0x{:x}: {} {}", self.address, self.mnemonic, self.operands)
        }
    }
}

/// Address, size and decoded body of one function.
///
/// Borrows its name and raw bytes from the loaded binary; the lifetime ties the
/// descriptor to the introspector it came from. A zero-sized function has no
/// bytes and an empty instruction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDescriptor<'img> {
    pub name: &'img str,
    pub address: u64,
    pub size: u64,
    #[serde(skip)]
    pub bytes: &'img [u8],
    pub instructions: Vec<Instruction>,
}

impl FunctionDescriptor<'_> {
    /// Exclusive end of the function's byte range.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// Render the decoded body one instruction per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for insn in &self.instructions {
            out.push_str(&insn.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_parses_common_aliases() {
        assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("AArch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("i386".parse::<Arch>().unwrap(), Arch::X86);
        assert_eq!("riscv".parse::<Arch>().unwrap(), Arch::RiscV64);
        assert!("mips".parse::<Arch>().is_err());
    }

    #[test]
    fn arch_display_round_trips_through_from_str() {
        for arch in [Arch::X86, Arch::X86_64, Arch::Arm, Arch::Arm64, Arch::RiscV32, Arch::RiscV64]
        {
            assert_eq!(arch.to_string().parse::<Arch>().unwrap(), arch);
        }
    }

    #[test]
    fn listing_renders_one_line_per_instruction() {
        let descriptor = FunctionDescriptor {
            name: "f",
            address: 0x10,
            size: 2,
            bytes: &[0x90, 0xC3],
            instructions: vec![
                Instruction {
                    address: 0x10,
                    bytes: vec![0x90],
                    mnemonic: "nop".into(),
                    operands: String::new(),
                },
                Instruction {
                    address: 0x11,
                    bytes: vec![0xC3],
                    mnemonic: "ret".into(),
                    operands: String::new(),
                },
            ],
        };
        assert_eq!(descriptor.listing(), "0x10: nop\n0x11: ret\n");
        assert_eq!(descriptor.end(), 0x12);
    }
}
