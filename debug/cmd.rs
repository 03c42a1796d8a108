//! Operator command surface
//!
//! Routes a pre-tokenized command line to the storage commands:
//!
//! | command | action                                   |
//! |---------|------------------------------------------|
//! | `r`     | alter/display real storage               |
//! | `abs`   | alter/display absolute storage           |
//! | `v`     | alter/display virtual storage            |
//! | `u`     | disassemble storage                      |

use super::alter::{alter_display_real_or_abs, alter_display_virt, missing};
use super::disasm::{disasm_stor, Disassembler};
use super::msg::MessageSink;
use crate::config::DisplayConfig;
use crate::core::cpu::CpuRegs;
use crate::core::mm::AddressKind;
use crate::Result;
use alloc::string::String;

/// Storage command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Real,
    Absolute,
    Virtual,
    Unassemble,
}

impl Command {
    /// Look up a command by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("r") {
            Some(Command::Real)
        } else if name.eq_ignore_ascii_case("abs") {
            Some(Command::Absolute)
        } else if name.eq_ignore_ascii_case("v") {
            Some(Command::Virtual)
        } else if name.eq_ignore_ascii_case("u") {
            Some(Command::Unassemble)
        } else {
            None
        }
    }
}

/// Execute one storage command
///
/// `argv[0]` names the command; the remaining words are joined into
/// its operand.
pub fn dispatch(
    regs: &CpuRegs,
    argv: &[&str],
    config: &DisplayConfig,
    disasm: &dyn Disassembler,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    let Some(cmd) = argv.first().and_then(|name| Command::from_name(name)) else {
        return Err(missing(sink));
    };

    let operand: String = argv[1..].join(" ");
    log::debug!("CPU{:04X}: {:?} {}", regs.cpuad, cmd, operand);

    match cmd {
        Command::Real => alter_display_real_or_abs(regs, AddressKind::Real, &operand, config, sink),
        Command::Absolute => alter_display_real_or_abs(regs, AddressKind::Absolute, &operand, config, sink),
        Command::Virtual => alter_display_virt(regs, &operand, config, sink),
        Command::Unassemble => disasm_stor(regs, &operand, config, disasm, sink),
    }
}
