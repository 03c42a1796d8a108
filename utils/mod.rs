//! Utility functions and data structures
//!
//! This module contains helpers shared by the inspection facilities:
//! log level selection, guest/host character translation and hex
//! formatting.

pub mod log;
pub mod ebcdic;

// Re-export commonly used utilities
pub use self::ebcdic::{guest_to_host, host_to_guest, is_printable};

use alloc::string::String;
use core::fmt::Write;

/// Append bytes as upper-case hex pairs
pub fn push_hex(out: &mut String, bytes: &[u8]) {
    for byte in bytes {
        let _ = write!(out, "{:02X}", byte);
    }
}

/// Value of a single hexadecimal digit
#[inline]
pub const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
