//! storinspect - Address translation and storage inspection core
//!
//! This is the inspection layer of a multi-architecture mainframe CPU
//! emulator (S/370, ESA/390 and z/Architecture). It lets operator and
//! trace tooling resolve addresses through the same virtual → real →
//! absolute pipeline the emulated hardware uses, without disturbing the
//! live processor being inspected:
//! - virtual to real translation on a disposable register snapshot
//! - page-bounded hexadecimal storage dumps
//! - range/alteration operand parsing and storage alteration
//! - instruction operand effective-address decoding for trace display

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Core modules
pub mod utils;
pub mod config;

// Architecture descriptors
pub mod arch;

// Processor context, storage and translation
pub mod core;

// Operator/debug inspection facilities
pub mod debug;

#[cfg(test)]
mod testutil;

use crate::core::mm::AddressKind;
use crate::core::pgm::ProgramInterrupt;
use crate::debug::operand::ParseError;

// Re-export key types for convenience
pub use crate::arch::{AddressingMode, ArchMode};
pub use crate::core::cpu::{CpuRegs, Psw, RegsSnapshot};
pub use crate::core::mm::storage::MainStorage;

/// storinspect version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common error type for storinspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument
    InvalidArgument,
    /// Out of memory while cloning a processor context
    OutOfMemory,
    /// No main storage is configured for the processor
    NoStorage,
    /// Internal parameter validation failed (programming error)
    InvalidParameters,
    /// Malformed range or alteration operand
    Parse(ParseError),
    /// Absolute address beyond the storage limit
    Addressing {
        /// Kind of address that was being resolved
        kind: AddressKind,
        /// Offending address
        addr: u64,
    },
    /// Dynamic address translation failed
    Translation {
        /// Virtual address being translated
        addr: u64,
        /// Program interruption code
        code: ProgramInterrupt,
    },
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl ::core::fmt::Display for Error {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("Missing or invalid argument(s)"),
            Error::OutOfMemory => f.write_str("Unable to allocate register work area"),
            Error::NoStorage => f.write_str("Storage address is not valid"),
            Error::InvalidParameters => f.write_str("invalid parameters"),
            Error::Parse(err) => write!(f, "{}", err),
            Error::Addressing { kind, addr } => {
                write!(f, "{}:{:X}  Addressing exception", kind.label(), addr)
            }
            Error::Translation { addr, code } => {
                write!(f, "V:{:X}  Translation exception {:04X} ({})", addr, code.code(), code.name())
            }
        }
    }
}

/// Result type alias
pub type Result<T> = ::core::result::Result<T, Error>;
