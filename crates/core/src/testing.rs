//! Fixture builders for tests in this workspace.
//!
//! [`ElfFixture`] lays out a small x86-64 ELF executable byte by byte: one
//! identity-mapped load segment (file offset == virtual address), a `.text`
//! section with hand-assembled functions, a lazy-binding `.plt` whose slots
//! are bound by `R_X86_64_JUMP_SLOT` relocations, and an optional `.symtab`.
//! Optionally it adds `.plt.got` entries bound by `R_X86_64_GLOB_DAT`, the
//! `.plt.sec` layout of IBT-enabled links, or drops `PT_DYNAMIC`. Nothing is
//! linked, so tests do not depend on a host toolchain.

use std::io;
use std::path::{Path, PathBuf};

use object::elf;
use object::pod::bytes_of;
use object::{LittleEndian as LE, I64, U16, U32, U64};

pub const TEXT_ADDR: u64 = 0x1000;
pub const TEXT_SIZE: u64 = 0x40;
pub const RODATA_ADDR: u64 = 0x1800;
pub const PLT_ADDR: u64 = 0x1FF0;
pub const PLT_HEADER_SIZE: u64 = 16;
pub const PLT_ENTRY_SIZE: u64 = 16;
pub const PLT_SEC_ADDR: u64 = 0x2400;
pub const PLT_GOT_ADDR: u64 = 0x2800;

const RODATA: &[u8] = b"hello, fixture!\0";
const DYN_AREA: u64 = 0x100;
const GOT_ADDR: u64 = 0x3000;
const DATA_GOT_ADDR: u64 = 0x2F00;
const SHN_ABS: u16 = 0xFFF1;

/// Address of PLT slot `idx` in a fixture.
pub fn plt_slot(idx: usize) -> u64 {
    PLT_ADDR + PLT_HEADER_SIZE + PLT_ENTRY_SIZE * idx as u64
}

/// Address of `.plt.sec` stub `idx` in an IBT fixture.
pub fn plt_sec_slot(idx: usize) -> u64 {
    PLT_SEC_ADDR + 16 * idx as u64
}

/// Address of `.plt.got` entry `idx`: 8-byte entries, 16 with IBT.
pub fn plt_got_slot(idx: usize, ibt: bool) -> u64 {
    let entry = if ibt { 16 } else { 8 };
    PLT_GOT_ADDR + entry * idx as u64
}

/// `main`: push rbp; mov rbp, rsp; 26 x nop; pop rbp; ret (32 bytes).
pub fn main_body() -> Vec<u8> {
    let mut body = vec![0x55, 0x48, 0x89, 0xE5];
    body.extend(std::iter::repeat(0x90).take(26));
    body.extend([0x5D, 0xC3]);
    body
}

/// `helper`: xor eax, eax; 13 x nop; ret (16 bytes).
pub fn helper_body() -> Vec<u8> {
    let mut body = vec![0x31, 0xC0];
    body.extend(std::iter::repeat(0x90).take(13));
    body.push(0xC3);
    body
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    Func,
    Object,
}

#[derive(Debug, Clone)]
pub struct FixtureSymbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub kind: FixtureKind,
    /// Also list the symbol in `.dynsym`.
    pub exported: bool,
}

#[derive(Debug, Clone)]
pub struct ElfFixture {
    machine: u16,
    text: Vec<u8>,
    symbols: Vec<FixtureSymbol>,
    imports: Vec<String>,
    got_imports: Vec<String>,
    strip_symtab: bool,
    ibt: bool,
    dynamic_segment: bool,
}

impl Default for ElfFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfFixture {
    /// A dynamically linked x86-64 executable with no symbols and no
    /// imports: `.text` is all `int3` and `.plt` holds only its header.
    pub fn new() -> Self {
        Self {
            machine: elf::EM_X86_64,
            text: Vec::new(),
            symbols: Vec::new(),
            imports: Vec::new(),
            got_imports: Vec::new(),
            strip_symtab: false,
            ibt: false,
            dynamic_segment: true,
        }
    }

    /// The layout used across the test suites:
    ///
    /// | symbol       | address | size | notes                         |
    /// |--------------|---------|------|-------------------------------|
    /// | `main`       | 0x1000  | 32   | exported in `.dynsym` too     |
    /// | `main_alias` | 0x1000  | 32   | same start as `main`          |
    /// | `helper`     | 0x1020  | 16   |                               |
    /// | `empty_fn`   | 0x1030  | 0    |                               |
    /// | `bogus_fn`   | 0x1800  | 8    | FUNC pointing into `.rodata`  |
    /// | `data_obj`   | 0x1808  | 8    | OBJECT, not a function        |
    ///
    /// PLT slots: `printf` at 0x2000, `puts` at 0x2010.
    pub fn sample() -> Self {
        let mut text = main_body();
        text.extend(helper_body());
        Self::new()
            .text(text)
            .exported_function("main", TEXT_ADDR, 32)
            .function("main_alias", TEXT_ADDR, 32)
            .function("helper", TEXT_ADDR + 0x20, 16)
            .function("empty_fn", TEXT_ADDR + 0x30, 0)
            .function("bogus_fn", RODATA_ADDR, 8)
            .object("data_obj", RODATA_ADDR + 8, 8)
            .import("printf")
            .import("puts")
    }

    pub fn machine(mut self, e_machine: u16) -> Self {
        self.machine = e_machine;
        self
    }

    /// Bytes placed at [`TEXT_ADDR`]; the rest of `.text` is `int3` padding.
    pub fn text(mut self, bytes: Vec<u8>) -> Self {
        assert!(bytes.len() as u64 <= TEXT_SIZE, "fixture .text holds at most {TEXT_SIZE} bytes");
        self.text = bytes;
        self
    }

    pub fn function(self, name: &str, address: u64, size: u64) -> Self {
        self.symbol(name, address, size, FixtureKind::Func, false)
    }

    pub fn exported_function(self, name: &str, address: u64, size: u64) -> Self {
        self.symbol(name, address, size, FixtureKind::Func, true)
    }

    pub fn object(self, name: &str, address: u64, size: u64) -> Self {
        self.symbol(name, address, size, FixtureKind::Object, false)
    }

    pub fn symbol(
        mut self,
        name: &str,
        address: u64,
        size: u64,
        kind: FixtureKind,
        exported: bool,
    ) -> Self {
        self.symbols.push(FixtureSymbol { name: name.to_string(), address, size, kind, exported });
        self
    }

    /// Add an imported function; each import gets the next PLT slot.
    pub fn import(mut self, name: &str) -> Self {
        self.imports.push(name.to_string());
        self
    }

    /// Add an import called through `.plt.got`, its GOT slot bound by a
    /// `GLOB_DAT` relocation in `.rela.dyn` (as `-fno-plt` links produce).
    pub fn got_import(mut self, name: &str) -> Self {
        self.got_imports.push(name.to_string());
        self
    }

    /// Lay stubs out as an IBT-enabled link does: `endbr64` in every entry,
    /// callable PLT stubs in `.plt.sec` and 16-byte `.plt.got` entries.
    pub fn ibt(mut self) -> Self {
        self.ibt = true;
        self
    }

    /// Leave out `PT_DYNAMIC`, so relocations are only reachable through the
    /// section headers.
    pub fn without_dynamic_segment(mut self) -> Self {
        self.dynamic_segment = false;
        self
    }

    /// Leave out `.symtab` and `.strtab`, as `strip` would.
    pub fn strip_symtab(mut self) -> Self {
        self.strip_symtab = true;
        self
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.build())?;
        Ok(path)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();

        let (text_idx, rodata_idx, plt_idx) = (5u16, 6u16, 7u32);
        let shndx_for = |address: u64| {
            if (TEXT_ADDR..TEXT_ADDR + TEXT_SIZE).contains(&address) {
                text_idx
            } else if (RODATA_ADDR..RODATA_ADDR + RODATA.len() as u64).contains(&address) {
                rodata_idx
            } else {
                SHN_ABS
            }
        };

        // Dynamic symbols: exports first, then imports, so the relocation
        // with the highest symbol index covers the whole table.
        let mut dynstr = StringTable::new();
        let mut dynsyms = vec![sym64(0, 0, 0, 0, 0)];
        for s in self.symbols.iter().filter(|s| s.exported) {
            let name = dynstr.add(&s.name);
            dynsyms.push(sym64(name, s.st_info(), shndx_for(s.address), s.address, s.size));
        }
        let first_import = dynsyms.len();
        for import in self.imports.iter().chain(&self.got_imports) {
            let name = dynstr.add(import);
            dynsyms.push(sym64(name, st_info(elf::STT_FUNC), 0, 0, 0));
        }
        let first_got_import = first_import + self.imports.len();
        let dynsym_bytes = concat(&dynsyms);
        let dynsym_off = DYN_AREA;
        let dynstr_off = dynsym_off + dynsym_bytes.len() as u64;

        let relas: Vec<elf::Rela64<LE>> = (0..self.imports.len())
            .map(|i| elf::Rela64 {
                r_offset: U64::new(LE, GOT_ADDR + 8 * (3 + i as u64)),
                r_info: U64::new(
                    LE,
                    (((first_import + i) as u64) << 32) | u64::from(elf::R_X86_64_JUMP_SLOT),
                ),
                r_addend: I64::new(LE, 0),
            })
            .collect();
        let rela_bytes = concat(&relas);
        let rela_off = align8(dynstr_off + dynstr.len());

        let rela_dyn: Vec<elf::Rela64<LE>> = (0..self.got_imports.len())
            .map(|i| elf::Rela64 {
                r_offset: U64::new(LE, DATA_GOT_ADDR + 8 * i as u64),
                r_info: U64::new(
                    LE,
                    (((first_got_import + i) as u64) << 32) | u64::from(elf::R_X86_64_GLOB_DAT),
                ),
                r_addend: I64::new(LE, 0),
            })
            .collect();
        let rela_dyn_bytes = concat(&rela_dyn);
        let rela_dyn_off = rela_off + rela_bytes.len() as u64;

        let mut dyns = vec![
            (elf::DT_STRTAB, dynstr_off),
            (elf::DT_SYMTAB, dynsym_off),
            (elf::DT_STRSZ, dynstr.len()),
            (elf::DT_SYMENT, 24),
        ];
        if !relas.is_empty() {
            dyns.push((elf::DT_JMPREL, rela_off));
            dyns.push((elf::DT_PLTRELSZ, rela_bytes.len() as u64));
            dyns.push((elf::DT_PLTREL, u64::from(elf::DT_RELA)));
        }
        if !rela_dyn.is_empty() {
            dyns.push((elf::DT_RELA, rela_dyn_off));
            dyns.push((elf::DT_RELASZ, rela_dyn_bytes.len() as u64));
            dyns.push((elf::DT_RELAENT, 24));
        }
        dyns.push((elf::DT_NULL, 0));
        let dynamic: Vec<elf::Dyn64<LE>> = dyns
            .into_iter()
            .map(|(tag, val)| elf::Dyn64 {
                d_tag: U64::new(LE, u64::from(tag)),
                d_val: U64::new(LE, val),
            })
            .collect();
        let dynamic_bytes = concat(&dynamic);
        let dynamic_off = align8(rela_dyn_off + rela_dyn_bytes.len() as u64);
        assert!(
            dynamic_off + dynamic_bytes.len() as u64 <= TEXT_ADDR,
            "too many fixture symbols for the dynamic area"
        );

        put(&mut out, dynsym_off, &dynsym_bytes);
        put(&mut out, dynstr_off, dynstr.bytes());
        put(&mut out, rela_off, &rela_bytes);
        put(&mut out, rela_dyn_off, &rela_dyn_bytes);
        put(&mut out, dynamic_off, &dynamic_bytes);

        let mut text = self.text.clone();
        text.resize(TEXT_SIZE as usize, 0xCC);
        put(&mut out, TEXT_ADDR, &text);
        put(&mut out, RODATA_ADDR, RODATA);

        let jump_slot = |i: usize| GOT_ADDR + 8 * (3 + i as u64);
        let mut plt = if self.ibt {
            // push GOT+8; bnd jmp *GOT+16; nopl (%rax)
            vec![0xFF, 0x35, 0, 0, 0, 0, 0xF2, 0xFF, 0x25, 0, 0, 0, 0, 0x0F, 0x1F, 0x00]
        } else {
            // push GOT+8; jmp *GOT+16; nopl 0(%rax)
            vec![0xFF, 0x35, 0, 0, 0, 0, 0xFF, 0x25, 0, 0, 0, 0, 0x0F, 0x1F, 0x40, 0x00]
        };
        for i in 0..self.imports.len() {
            if self.ibt {
                // endbr64; push i; bnd jmp .plt; nop
                plt.extend(ENDBR64);
                plt.push(0x68);
                plt.extend((i as u32).to_le_bytes());
                plt.extend([0xF2, 0xE9, 0, 0, 0, 0, 0x90]);
            } else {
                // jmp *slot(%rip); push i; jmp .plt
                let at = plt_slot(i);
                plt.extend([0xFF, 0x25]);
                plt.extend(rip_disp(at + 6, jump_slot(i)));
                plt.push(0x68);
                plt.extend((i as u32).to_le_bytes());
                plt.extend([0xE9, 0, 0, 0, 0]);
            }
        }
        assert!(PLT_ADDR + plt.len() as u64 <= PLT_SEC_ADDR, "too many fixture imports");
        put(&mut out, PLT_ADDR, &plt);
        let mut data_end = PLT_ADDR + plt.len() as u64;

        let mut plt_sec = Vec::new();
        if self.ibt {
            for i in 0..self.imports.len() {
                plt_sec.extend(ibt_jump(plt_sec_slot(i), jump_slot(i)));
            }
            assert!(PLT_SEC_ADDR + plt_sec.len() as u64 <= PLT_GOT_ADDR, "too many fixture imports");
            put(&mut out, PLT_SEC_ADDR, &plt_sec);
            data_end = data_end.max(PLT_SEC_ADDR + plt_sec.len() as u64);
        }

        let mut plt_got = Vec::new();
        for i in 0..self.got_imports.len() {
            let at = plt_got_slot(i, self.ibt);
            let got_slot = DATA_GOT_ADDR + 8 * i as u64;
            if self.ibt {
                plt_got.extend(ibt_jump(at, got_slot));
            } else {
                // jmp *slot(%rip); xchg %ax,%ax
                plt_got.extend([0xFF, 0x25]);
                plt_got.extend(rip_disp(at + 6, got_slot));
                plt_got.extend([0x66, 0x90]);
            }
        }
        if !plt_got.is_empty() {
            assert!(
                PLT_GOT_ADDR + plt_got.len() as u64 <= DATA_GOT_ADDR,
                "too many fixture GOT imports"
            );
            put(&mut out, PLT_GOT_ADDR, &plt_got);
            data_end = data_end.max(PLT_GOT_ADDR + plt_got.len() as u64);
        }

        let mut shstrtab = StringTable::new();
        let mut sections = vec![section64(0, 0, 0, 0, 0, 0, 0, 0, 0, 0)];
        let alloc = u64::from(elf::SHF_ALLOC);
        let exec = alloc | u64::from(elf::SHF_EXECINSTR);
        sections.push(section64(
            shstrtab.add(".dynsym"),
            elf::SHT_DYNSYM,
            alloc,
            dynsym_off,
            dynsym_off,
            dynsym_bytes.len() as u64,
            2,
            1,
            8,
            24,
        ));
        sections.push(section64(
            shstrtab.add(".dynstr"),
            elf::SHT_STRTAB,
            alloc,
            dynstr_off,
            dynstr_off,
            dynstr.len(),
            0,
            0,
            1,
            0,
        ));
        sections.push(section64(
            shstrtab.add(".rela.plt"),
            elf::SHT_RELA,
            alloc | u64::from(elf::SHF_INFO_LINK),
            rela_off,
            rela_off,
            rela_bytes.len() as u64,
            1,
            plt_idx,
            8,
            24,
        ));
        sections.push(section64(
            shstrtab.add(".dynamic"),
            elf::SHT_DYNAMIC,
            alloc | u64::from(elf::SHF_WRITE),
            dynamic_off,
            dynamic_off,
            dynamic_bytes.len() as u64,
            2,
            0,
            8,
            16,
        ));
        sections.push(section64(
            shstrtab.add(".text"),
            elf::SHT_PROGBITS,
            exec,
            TEXT_ADDR,
            TEXT_ADDR,
            TEXT_SIZE,
            0,
            0,
            16,
            0,
        ));
        sections.push(section64(
            shstrtab.add(".rodata"),
            elf::SHT_PROGBITS,
            alloc,
            RODATA_ADDR,
            RODATA_ADDR,
            RODATA.len() as u64,
            0,
            0,
            1,
            0,
        ));
        sections.push(section64(
            shstrtab.add(".plt"),
            elf::SHT_PROGBITS,
            exec,
            PLT_ADDR,
            PLT_ADDR,
            plt.len() as u64,
            0,
            0,
            16,
            16,
        ));

        let stub_entry = if self.ibt { 16 } else { 8 };
        if !rela_dyn.is_empty() {
            sections.push(section64(
                shstrtab.add(".rela.dyn"),
                elf::SHT_RELA,
                alloc,
                rela_dyn_off,
                rela_dyn_off,
                rela_dyn_bytes.len() as u64,
                1,
                0,
                8,
                24,
            ));
        }
        if !plt_sec.is_empty() {
            sections.push(section64(
                shstrtab.add(".plt.sec"),
                elf::SHT_PROGBITS,
                exec,
                PLT_SEC_ADDR,
                PLT_SEC_ADDR,
                plt_sec.len() as u64,
                0,
                0,
                16,
                16,
            ));
        }
        if !plt_got.is_empty() {
            sections.push(section64(
                shstrtab.add(".plt.got"),
                elf::SHT_PROGBITS,
                exec,
                PLT_GOT_ADDR,
                PLT_GOT_ADDR,
                plt_got.len() as u64,
                0,
                0,
                8,
                stub_entry,
            ));
        }

        let mut cursor = align8(data_end);
        if !self.strip_symtab {
            let mut strtab = StringTable::new();
            let mut syms = vec![sym64(0, 0, 0, 0, 0)];
            for s in &self.symbols {
                let name = strtab.add(&s.name);
                syms.push(sym64(name, s.st_info(), shndx_for(s.address), s.address, s.size));
            }
            let symtab_bytes = concat(&syms);
            let symtab_off = cursor;
            let strtab_off = symtab_off + symtab_bytes.len() as u64;
            put(&mut out, symtab_off, &symtab_bytes);
            put(&mut out, strtab_off, strtab.bytes());
            let strtab_idx = sections.len() as u32 + 1;
            sections.push(section64(
                shstrtab.add(".symtab"),
                elf::SHT_SYMTAB,
                0,
                0,
                symtab_off,
                symtab_bytes.len() as u64,
                strtab_idx,
                1,
                8,
                24,
            ));
            sections.push(section64(
                shstrtab.add(".strtab"),
                elf::SHT_STRTAB,
                0,
                0,
                strtab_off,
                strtab.len(),
                0,
                0,
                1,
                0,
            ));
            cursor = strtab_off + strtab.len();
        }

        let shstrtab_name = shstrtab.add(".shstrtab");
        let shstrtab_off = cursor;
        let shstrndx = sections.len() as u16;
        sections.push(section64(
            shstrtab_name,
            elf::SHT_STRTAB,
            0,
            0,
            shstrtab_off,
            shstrtab.len(),
            0,
            0,
            1,
            0,
        ));
        put(&mut out, shstrtab_off, shstrtab.bytes());

        let shoff = align8(shstrtab_off + shstrtab.len());
        put(&mut out, shoff, &concat(&sections));
        let file_len = out.len() as u64;

        let mut phdrs = vec![
            elf::ProgramHeader64 {
                p_type: U32::new(LE, elf::PT_LOAD),
                p_flags: U32::new(LE, elf::PF_R | elf::PF_X),
                p_offset: U64::new(LE, 0),
                p_vaddr: U64::new(LE, 0),
                p_paddr: U64::new(LE, 0),
                p_filesz: U64::new(LE, file_len),
                p_memsz: U64::new(LE, file_len),
                p_align: U64::new(LE, 0x1000),
            },
            elf::ProgramHeader64 {
                p_type: U32::new(LE, elf::PT_DYNAMIC),
                p_flags: U32::new(LE, elf::PF_R),
                p_offset: U64::new(LE, dynamic_off),
                p_vaddr: U64::new(LE, dynamic_off),
                p_paddr: U64::new(LE, dynamic_off),
                p_filesz: U64::new(LE, dynamic_bytes.len() as u64),
                p_memsz: U64::new(LE, dynamic_bytes.len() as u64),
                p_align: U64::new(LE, 8),
            },
        ];
        if !self.dynamic_segment {
            phdrs.truncate(1);
        }
        let ehsize = std::mem::size_of::<elf::FileHeader64<LE>>() as u64;
        let header = elf::FileHeader64 {
            e_ident: elf::Ident {
                magic: elf::ELFMAG,
                class: elf::ELFCLASS64,
                data: elf::ELFDATA2LSB,
                version: elf::EV_CURRENT,
                os_abi: elf::ELFOSABI_SYSV,
                abi_version: 0,
                padding: [0; 7],
            },
            e_type: U16::new(LE, elf::ET_EXEC),
            e_machine: U16::new(LE, self.machine),
            e_version: U32::new(LE, u32::from(elf::EV_CURRENT)),
            e_entry: U64::new(LE, TEXT_ADDR),
            e_phoff: U64::new(LE, ehsize),
            e_shoff: U64::new(LE, shoff),
            e_flags: U32::new(LE, 0),
            e_ehsize: U16::new(LE, ehsize as u16),
            e_phentsize: U16::new(LE, std::mem::size_of::<elf::ProgramHeader64<LE>>() as u16),
            e_phnum: U16::new(LE, phdrs.len() as u16),
            e_shentsize: U16::new(LE, std::mem::size_of::<elf::SectionHeader64<LE>>() as u16),
            e_shnum: U16::new(LE, sections.len() as u16),
            e_shstrndx: U16::new(LE, shstrndx),
        };
        put(&mut out, 0, bytes_of(&header));
        put(&mut out, ehsize, &concat(&phdrs));
        out
    }
}

impl FixtureSymbol {
    fn st_info(&self) -> u8 {
        match self.kind {
            FixtureKind::Func => st_info(elf::STT_FUNC),
            FixtureKind::Object => st_info(elf::STT_OBJECT),
        }
    }
}

const ENDBR64: [u8; 4] = [0xF3, 0x0F, 0x1E, 0xFA];

/// Displacement of `target` from `next`, the address after the instruction.
fn rip_disp(next: u64, target: u64) -> [u8; 4] {
    (target.wrapping_sub(next) as i32).to_le_bytes()
}

/// endbr64; bnd jmp *slot(%rip); nopl 0(%rax,%rax,1)
fn ibt_jump(at: u64, slot: u64) -> Vec<u8> {
    let mut entry = ENDBR64.to_vec();
    entry.extend([0xF2, 0xFF, 0x25]);
    entry.extend(rip_disp(at + 11, slot));
    entry.extend([0x0F, 0x1F, 0x44, 0x00, 0x00]);
    entry
}

fn st_info(kind: u8) -> u8 {
    (elf::STB_GLOBAL << 4) | kind
}

fn sym64(name: u32, info: u8, shndx: u16, value: u64, size: u64) -> elf::Sym64<LE> {
    elf::Sym64 {
        st_name: U32::new(LE, name),
        st_info: info,
        st_other: 0,
        st_shndx: U16::new(LE, shndx),
        st_value: U64::new(LE, value),
        st_size: U64::new(LE, size),
    }
}

#[allow(clippy::too_many_arguments)]
fn section64(
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
) -> elf::SectionHeader64<LE> {
    elf::SectionHeader64 {
        sh_name: U32::new(LE, name),
        sh_type: U32::new(LE, sh_type),
        sh_flags: U64::new(LE, flags),
        sh_addr: U64::new(LE, addr),
        sh_offset: U64::new(LE, offset),
        sh_size: U64::new(LE, size),
        sh_link: U32::new(LE, link),
        sh_info: U32::new(LE, info),
        sh_addralign: U64::new(LE, align),
        sh_entsize: U64::new(LE, entsize),
    }
}

fn concat<T: object::Pod>(items: &[T]) -> Vec<u8> {
    items.iter().flat_map(|item| bytes_of(item).iter().copied()).collect()
}

fn align8(value: u64) -> u64 {
    (value + 7) & !7
}

fn put(out: &mut Vec<u8>, offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    let end = start + bytes.len();
    if out.len() < end {
        out.resize(end, 0);
    }
    out[start..end].copy_from_slice(bytes);
}

/// NUL-separated string table starting with the empty string.
struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    fn new() -> Self {
        Self { bytes: vec![0] }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
