//! Register block displays
//!
//! Each block is returned as one multi-line string. With more than one
//! configured processor every line starts with the processor tag.

use crate::config::DisplayConfig;
use crate::core::cpu::CpuRegs;
use alloc::format;
use alloc::string::String;
use bitflags::bitflags;
use core::fmt::Write;

bitflags! {
    /// Register blocks shown with an instruction
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegBlocks: u8 {
        const GR = 1 << 0;
        const CR = 1 << 1;
        const AR = 1 << 2;
        const FPC = 1 << 3;
        const FPR = 1 << 4;
        const VR = 1 << 5;
    }
}

/// Processor tag, e.g. `CP01: `
pub fn cpu_prefix(regs: &CpuRegs) -> String {
    format!("{}{:02X}: ", regs.ptype.name(), regs.cpuad)
}

fn line_prefix(regs: &CpuRegs, config: &DisplayConfig) -> String {
    if config.multi_cpu() { cpu_prefix(regs) } else { String::new() }
}

fn regs32(hdr: &str, r: &[u32; 16], prefix: &str) -> String {
    let mut out = String::new();
    for (i, value) in r.iter().enumerate() {
        if i % 4 == 0 {
            if i != 0 {
                out.push('\n');
            }
            out.push_str(prefix);
        } else {
            out.push(' ');
        }
        let _ = write!(out, "{}{:02}={:08X}", hdr, i, value);
    }
    out
}

fn regs64(hdr: &str, r: &[u64; 16], prefix: &str, per_line: usize) -> String {
    let mut out = String::new();
    for (i, value) in r.iter().enumerate() {
        if i % per_line == 0 {
            if i != 0 {
                out.push('\n');
            }
            out.push_str(prefix);
        } else {
            out.push(' ');
        }
        let _ = write!(out, "{}{:X}={:016X}", hdr, i, value);
    }
    out
}

fn per_line(config: &DisplayConfig) -> usize {
    if config.multi_cpu() && !config.inst_trace { 2 } else { 4 }
}

/// General registers
pub fn display_gregs(regs: &CpuRegs, config: &DisplayConfig) -> String {
    let prefix = line_prefix(regs, config);
    if regs.arch.zarch_installed() {
        regs64("R", &regs.gr, &prefix, per_line(config))
    } else {
        regs32("GR", &core::array::from_fn(|i| regs.gr_l(i)), &prefix)
    }
}

/// Control registers
pub fn display_cregs(regs: &CpuRegs, config: &DisplayConfig) -> String {
    let prefix = line_prefix(regs, config);
    if regs.arch.zarch_installed() {
        regs64("C", &regs.cr, &prefix, per_line(config))
    } else {
        regs32("CR", &core::array::from_fn(|i| regs.cr_l(i)), &prefix)
    }
}

/// Access registers
pub fn display_aregs(regs: &CpuRegs, config: &DisplayConfig) -> String {
    regs32("AR", &regs.ar, &line_prefix(regs, config))
}

/// Floating-point control register
pub fn display_fpc(regs: &CpuRegs, config: &DisplayConfig) -> String {
    format!("{}Floating point control register: {:08X}", line_prefix(regs, config), regs.fpc)
}

/// Floating-point registers: all 16 with AFP, else the four basic ones
pub fn display_fregs(regs: &CpuRegs, config: &DisplayConfig) -> String {
    let prefix = line_prefix(regs, config);
    let mut out = String::new();

    if regs.afp() {
        for i in (0..16).step_by(2) {
            if i != 0 {
                out.push('\n');
            }
            let _ = write!(
                out,
                "{}FP{:02}={:016X} FP{:02}={:016X}",
                prefix,
                i,
                regs.fpr[i],
                i + 1,
                regs.fpr[i + 1]
            );
        }
    } else {
        for i in (0..8).step_by(2) {
            if i != 0 {
                out.push('\n');
            }
            let _ = write!(out, "{}FP{:02}={:016X}", prefix, i, regs.fpr[i]);
        }
    }
    out
}

/// Vector registers, two per line
pub fn display_vregs(regs: &CpuRegs, config: &DisplayConfig) -> String {
    let prefix = line_prefix(regs, config);
    let mut out = String::new();
    for i in (0..32).step_by(2) {
        if i != 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{}VR{:02}={:016X}.{:016X} VR{:02}={:016X}.{:016X}",
            prefix,
            i,
            regs.vr_d(i, 0),
            regs.vr_d(i, 1),
            i + 1,
            regs.vr_d(i + 1, 0),
            regs.vr_d(i + 1, 1)
        );
    }
    out
}

/// Register blocks relevant to `inst`
pub fn select(regs: &CpuRegs, inst: &[u8; 6]) -> RegBlocks {
    let (op, op2, op5) = (inst[0], inst[1], inst[5]);
    let pfpo = op == 0x01 && op2 == 0x0A;
    let dfp_conv = op == 0xB9 && matches!(op2, 0x41..=0x43 | 0x49..=0x5B);
    let mut blocks = RegBlocks::empty();

    let hfp = op == 0xB3 || (0x20..=0x3F).contains(&op);
    if !hfp || (op == 0xB3 && matches!(op2, 0x80..=0xCF | 0xE1..=0xFE)) {
        blocks |= RegBlocks::GR;
    }

    if !regs.psw.real_mode() || matches!(op, 0xB2 | 0xB6 | 0xB7) {
        blocks |= RegBlocks::CR;
    }

    if regs.psw.ar_mode() {
        blocks |= RegBlocks::AR;
    }

    let fpc_op = pfpo
        || (op == 0xB2 && matches!(op2, 0x99 | 0x9C | 0x9D | 0xB8 | 0xB9 | 0xBD))
        || (op == 0xB3 && matches!(op2, 0x00..=0x1F | 0x40..=0x5F | 0x84..=0x8C | 0x90..=0xAF | 0xD0..=0xFF))
        || dfp_conv
        || (op == 0xED && matches!(op5, 0x00..=0x1F | 0x40..=0x59 | 0xA8..=0xAF));
    if regs.afp() && fpc_op {
        blocks |= RegBlocks::FPC;
    }

    let fpr_op = pfpo
        || (op == 0xB3 && !matches!(op2, 0x84 | 0x85 | 0x8C))
        || op == 0xED
        || matches!(op, 0x20..=0x3F | 0x60..=0x70 | 0x78..=0x7F)
        || (op == 0xB2 && matches!(op2, 0x2D | 0x44 | 0x45))
        || dfp_conv;
    if fpr_op {
        blocks |= RegBlocks::FPR;
    }

    if op == 0xE7 || (op == 0xE6 && regs.arch.zarch_installed()) {
        blocks |= RegBlocks::VR;
    }

    blocks
}
