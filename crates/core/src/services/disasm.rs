use capstone::{arch, prelude::*, Capstone};
use tracing::trace;

use crate::model::{Arch, Instruction, Syntax};

fn x86_syntax(syntax: Syntax) -> arch::x86::ArchSyntax {
    match syntax {
        Syntax::Intel => arch::x86::ArchSyntax::Intel,
        Syntax::Att => arch::x86::ArchSyntax::Att,
    }
}

/// Build a capstone handle for one decode call.
///
/// Handles are not shared between calls or threads; capstone keeps mutable
/// state behind them.
fn make_cs(arch: Arch, syntax: Syntax, thumb: bool) -> Result<Capstone, String> {
    let cs = match arch {
        Arch::X86_64 => Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode64)
            .syntax(x86_syntax(syntax))
            .build(),
        Arch::X86 => Capstone::new()
            .x86()
            .mode(arch::x86::ArchMode::Mode32)
            .syntax(x86_syntax(syntax))
            .build(),
        Arch::Arm if thumb => Capstone::new().arm().mode(arch::arm::ArchMode::Thumb).build(),
        Arch::Arm => Capstone::new().arm().mode(arch::arm::ArchMode::Arm).build(),
        Arch::Arm64 => Capstone::new().arm64().mode(arch::arm64::ArchMode::Arm).build(),
        Arch::RiscV64 => Capstone::new()
            .riscv()
            .mode(arch::riscv::ArchMode::RiscV64)
            .extra_mode([arch::riscv::ArchExtraMode::RiscVC].iter().copied())
            .build(),
        Arch::RiscV32 => Capstone::new()
            .riscv()
            .mode(arch::riscv::ArchMode::RiscV32)
            .extra_mode([arch::riscv::ArchExtraMode::RiscVC].iter().copied())
            .build(),
    };
    cs.map_err(|e| format!("capstone init failed for {arch}: {e}"))
}

/// Decode all of `code`, which is mapped at `address`.
///
/// Fails when capstone stops before the end of `code`, reporting the first
/// address it could not decode.
pub(crate) fn decode(
    arch: Arch,
    syntax: Syntax,
    thumb: bool,
    code: &[u8],
    address: u64,
) -> Result<Vec<Instruction>, String> {
    let cs = make_cs(arch, syntax, thumb)?;
    let insns = cs.disasm_all(code, address).map_err(|e| format!("capstone failed: {e}"))?;

    let mut instructions = Vec::with_capacity(insns.len());
    let mut decoded = 0usize;
    for insn in insns.iter() {
        decoded += insn.bytes().len();
        instructions.push(Instruction {
            address: insn.address(),
            bytes: insn.bytes().to_vec(),
            mnemonic: insn.mnemonic().unwrap_or("").to_string(),
            operands: insn.op_str().unwrap_or("").to_string(),
        });
    }

    if decoded < code.len() {
        return Err(format!(
            "invalid instruction at 0x{:X} ({} of {} bytes decoded)",
            address + decoded as u64,
            decoded,
            code.len()
        ));
    }
    trace!(address, count = instructions.len(), %arch, "decoded function body");
    Ok(instructions)
}
