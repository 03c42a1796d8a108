//! Architecture descriptors
//!
//! The same inspection code serves all three supported architectures.
//! Differences between them are carried as data in [`ArchMode`] and
//! [`AddressingMode`] rather than as separately compiled code paths.

use core::fmt;

/// Architecture the emulated processor is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchMode {
    /// System/370 (24-bit, EC mode)
    S370,
    /// ESA/390 (24/31-bit)
    Esa390,
    /// z/Architecture (24/31/64-bit)
    Zarch,
}

impl ArchMode {
    /// Architecture name as shown to the operator
    pub const fn name(self) -> &'static str {
        match self {
            ArchMode::S370 => "S/370",
            ArchMode::Esa390 => "ESA/390",
            ArchMode::Zarch => "z/Arch",
        }
    }

    /// Look up an architecture by its operator-visible name
    pub fn from_name(name: &str) -> Option<Self> {
        [ArchMode::S370, ArchMode::Esa390, ArchMode::Zarch]
            .into_iter()
            .find(|arch| arch.name().eq_ignore_ascii_case(name))
    }

    /// True when the z/Architecture facility is installed
    pub const fn zarch_installed(self) -> bool {
        matches!(self, ArchMode::Zarch)
    }

    /// Length of the architected PSW image in bytes
    pub const fn psw_len(self) -> usize {
        if self.zarch_installed() { 16 } else { 8 }
    }

    /// Width in bits of addresses printed in storage dumps
    pub const fn dump_width(self) -> u8 {
        if self.zarch_installed() { 64 } else { 32 }
    }

    /// Number of hex digits used to print a real address
    pub const fn radr_digits(self) -> usize {
        if self.zarch_installed() { 16 } else { 8 }
    }

    /// Highest address accepted in a range operand
    pub const fn max_address(self) -> u64 {
        if self.zarch_installed() { u64::MAX } else { 0x7FFF_FFFF }
    }

    /// Mask selecting the page part of a real address for prefixing
    pub const fn prefix_mask(self) -> u64 {
        match self {
            ArchMode::S370 | ArchMode::Esa390 => 0x7FFF_F000,
            ArchMode::Zarch => !0x1FFF,
        }
    }

    /// True when the vector facility (E6/E7 opcodes) is present
    pub const fn has_vector(self) -> bool {
        self.zarch_installed()
    }

    /// True when the execute-extension facility (EXRL) is present
    pub const fn has_execute_extension(self) -> bool {
        self.zarch_installed()
    }
}

impl fmt::Display for ArchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "arch_zarch")] {
        const DEFAULT: ArchMode = ArchMode::Zarch;
    } else if #[cfg(feature = "arch_esa390")] {
        const DEFAULT: ArchMode = ArchMode::Esa390;
    } else if #[cfg(feature = "arch_s370")] {
        const DEFAULT: ArchMode = ArchMode::S370;
    } else {
        compile_error!("at least one of arch_s370, arch_esa390 or arch_zarch must be enabled");
    }
}

/// Architecture used when the caller does not pick one
pub const fn default_arch() -> ArchMode {
    DEFAULT
}

/// Addressing mode of the current PSW
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// 24-bit addressing
    Bit24,
    /// 31-bit addressing
    Bit31,
    /// 64-bit addressing
    Bit64,
}

impl AddressingMode {
    /// Mask applied when an address computation wraps
    pub const fn maxwrap(self) -> u64 {
        match self {
            AddressingMode::Bit24 => 0x00FF_FFFF,
            AddressingMode::Bit31 => 0x7FFF_FFFF,
            AddressingMode::Bit64 => u64::MAX,
        }
    }

    /// Extended wrap used by the storage-key instructions: 31 bits
    /// even in 24-bit mode, except on S/370 which has no 31-bit mode
    pub const fn maxwrap_e(self, arch: ArchMode) -> u64 {
        match (arch, self) {
            (ArchMode::S370, _) => 0x00FF_FFFF,
            (_, AddressingMode::Bit64) => u64::MAX,
            _ => 0x7FFF_FFFF,
        }
    }

    /// Number of address bits
    pub const fn bits(self) -> u32 {
        match self {
            AddressingMode::Bit24 => 24,
            AddressingMode::Bit31 => 31,
            AddressingMode::Bit64 => 64,
        }
    }
}
