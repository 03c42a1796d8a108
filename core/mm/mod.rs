//! Memory management module
//!
//! This module provides the storage model of the emulated machine:
//! main storage with its storage keys, prefixing (real → absolute) and
//! dynamic address translation (virtual → real).

pub mod dat;
pub mod storage;

/// Virtual address type
pub type VirtAddr = u64;

/// Real address type (after translation, before prefixing)
pub type RealAddr = u64;

/// Absolute address type (offset into main storage)
pub type AbsAddr = u64;

/// Page frame size (4KB)
pub const PAGE_SIZE: u64 = 4096;

/// Page shift (number of bits for page offset)
pub const PAGE_SHIFT: u32 = 12;

/// Page mask
pub const PAGE_MASK: u64 = !(PAGE_SIZE - 1);

/// Byte offset mask within a page
pub const PAGE_BYTEMASK: u64 = PAGE_SIZE - 1;

/// Kind of address an operand designates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Subject to DAT and address-space selection
    Virtual,
    /// Post-translation, subject to prefixing
    Real,
    /// Post-prefixing, direct offset into main storage
    Absolute,
}

impl AddressKind {
    /// Single-letter label used in operator messages
    pub const fn label(self) -> char {
        match self {
            AddressKind::Virtual => 'V',
            AddressKind::Real => 'R',
            AddressKind::Absolute => 'A',
        }
    }
}

/// Align an address down to page boundary
pub const fn align_down(addr: u64) -> u64 {
    addr & PAGE_MASK
}

/// Check if an address is page-aligned
pub const fn is_aligned(addr: u64) -> bool {
    (addr & PAGE_BYTEMASK) == 0
}

/// Convert an address to its page frame number
pub const fn frame_of(addr: u64) -> u64 {
    addr >> PAGE_SHIFT
}

/// Exchange the prefix area with page zero
///
/// A real address whose page part (under `mask`) is zero is redirected
/// to the prefix area and vice versa; all other addresses are unchanged.
pub const fn apply_prefixing(raddr: RealAddr, prefix: u64, mask: u64) -> AbsAddr {
    let page = raddr & mask;
    if page == 0 || page == prefix {
        raddr ^ prefix
    } else {
        raddr
    }
}
