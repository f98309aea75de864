//! Plain, little-endian x86-64/AArch64 ELF64 on-disk structures.
//!
//! The `object` crate is used on the read side (`crate::elfmap`) where its
//! high-level `object::read::File` API is a good fit; on the write side the
//! deferred-field model (spec.md §4.5) needs direct control over exactly
//! when each field of each record is written, so these are plain structs
//! serialized by hand, the same granularity `concretedeferred.cpp`
//! operates at (`ElfXX_Shdr`, `ElfXX_Sym`, `ElfXX_Rela`, ...).

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_DYNAMIC: u32 = 6;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_INIT_ARRAY: u32 = 14;

pub const SHF_WRITE: u64 = 1;
pub const SHF_ALLOC: u64 = 2;
pub const SHF_EXECINSTR: u64 = 4;

pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STT_NOTYPE: u8 = 0;
pub const STT_FUNC: u8 = 2;
pub const STT_SECTION: u8 = 3;
pub const SHN_UNDEF: u16 = 0;

pub const R_X86_64_64: u32 = 1;
pub const R_X86_64_PC32: u32 = 2;
pub const R_X86_64_GLOB_DAT: u32 = 6;

pub const DT_NULL: i64 = 0;
pub const DT_NEEDED: i64 = 1;
pub const DT_STRTAB: i64 = 5;
pub const DT_SYMTAB: i64 = 6;

pub const EI_NIDENT: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct Elf64Ehdr {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_phnum: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf64Ehdr {
    pub fn to_bytes(self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1; // EV_CURRENT
        out[16..18].copy_from_slice(&self.e_type.to_le_bytes());
        out[18..20].copy_from_slice(&self.e_machine.to_le_bytes());
        out[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
        out[24..32].copy_from_slice(&self.e_entry.to_le_bytes());
        out[32..40].copy_from_slice(&self.e_phoff.to_le_bytes());
        out[40..48].copy_from_slice(&self.e_shoff.to_le_bytes());
        out[48..52].copy_from_slice(&0u32.to_le_bytes()); // e_flags
        out[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
        out[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize
        out[56..58].copy_from_slice(&self.e_phnum.to_le_bytes());
        out[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
        out[60..62].copy_from_slice(&self.e_shnum.to_le_bytes());
        out[62..64].copy_from_slice(&self.e_shstrndx.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Shdr {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl Elf64Shdr {
    pub fn to_bytes(self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[0..4].copy_from_slice(&self.sh_name.to_le_bytes());
        out[4..8].copy_from_slice(&self.sh_type.to_le_bytes());
        out[8..16].copy_from_slice(&self.sh_flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.sh_addr.to_le_bytes());
        out[24..32].copy_from_slice(&self.sh_offset.to_le_bytes());
        out[32..40].copy_from_slice(&self.sh_size.to_le_bytes());
        out[40..44].copy_from_slice(&self.sh_link.to_le_bytes());
        out[44..48].copy_from_slice(&self.sh_info.to_le_bytes());
        out[48..56].copy_from_slice(&self.sh_addralign.to_le_bytes());
        out[56..64].copy_from_slice(&self.sh_entsize.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Phdr {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl Elf64Phdr {
    pub fn to_bytes(self) -> [u8; 56] {
        let mut out = [0u8; 56];
        out[0..4].copy_from_slice(&self.p_type.to_le_bytes());
        out[4..8].copy_from_slice(&self.p_flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.p_offset.to_le_bytes());
        out[16..24].copy_from_slice(&self.p_vaddr.to_le_bytes());
        out[24..32].copy_from_slice(&self.p_paddr.to_le_bytes());
        out[32..40].copy_from_slice(&self.p_filesz.to_le_bytes());
        out[40..48].copy_from_slice(&self.p_memsz.to_le_bytes());
        out[48..56].copy_from_slice(&self.p_align.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Sym {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Elf64Sym {
    pub fn st_info(bind: u8, ty: u8) -> u8 {
        (bind << 4) | (ty & 0xf)
    }

    pub fn to_bytes(self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..4].copy_from_slice(&self.st_name.to_le_bytes());
        out[4] = self.st_info;
        out[5] = self.st_other;
        out[6..8].copy_from_slice(&self.st_shndx.to_le_bytes());
        out[8..16].copy_from_slice(&self.st_value.to_le_bytes());
        out[16..24].copy_from_slice(&self.st_size.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Rela {
    pub r_offset: u64,
    pub r_sym: u32,
    pub r_type: u32,
    pub r_addend: i64,
}

impl Elf64Rela {
    pub fn r_info(sym: u32, ty: u32) -> u64 {
        ((sym as u64) << 32) | ty as u64
    }

    pub fn to_bytes(self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..8].copy_from_slice(&self.r_offset.to_le_bytes());
        out[8..16].copy_from_slice(&Self::r_info(self.r_sym, self.r_type).to_le_bytes());
        out[16..24].copy_from_slice(&self.r_addend.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Dyn {
    pub d_tag: i64,
    pub d_val: u64,
}

impl Elf64Dyn {
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&self.d_tag.to_le_bytes());
        out[8..16].copy_from_slice(&self.d_val.to_le_bytes());
        out
    }
}
