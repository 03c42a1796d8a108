//! Storage display primitives
//!
//! One-line displays of real and virtual storage as used by the
//! instruction display, plus the page-bounded hex dump behind the
//! storage display commands.

use super::msg::{Message, MessageSink, MsgId};
use crate::core::cpu::snapshot::virt_to_real;
use crate::core::cpu::CpuRegs;
use crate::core::mm::dat::{AccessSpace, AccessType};
use crate::core::mm::{is_aligned, AbsAddr, AddressKind, RealAddr, VirtAddr, PAGE_SIZE};
use crate::core::pgm::ProgramInterrupt;
use crate::utils::ebcdic::display_char;
use crate::{Error, Result};
use alloc::string::String;
use core::fmt::Write;

/// Bytes shown by a one-line storage display
const LINE_BYTES: usize = 16;

/// Display up to 16 bytes of real storage on one line
///
/// Stops at the end of the page. With `draflag` the line starts with
/// the real address; a guest's line also shows the guest absolute
/// address.
pub fn display_real(regs: &CpuRegs, raddr: RealAddr, draflag: bool, hdr: &str) -> String {
    let digits = regs.arch.radr_digits();
    let mut out = String::from(hdr);

    if draflag {
        let _ = write!(out, "R:{:0w$X}:", raddr, w = digits);
    }

    let aaddr = regs.real_to_abs(raddr);
    if regs.sie_mode() {
        let guest_abs = regs.apply_prefixing(raddr);
        let _ = write!(out, "A:{:0w$X}:", guest_abs, w = digits);
        if aaddr.is_err() {
            out.push_str(" Guest real address is not valid");
            return out;
        }
    }

    let (Ok(aaddr), Some(storage)) = (aaddr, regs.abs_storage()) else {
        out.push_str(" Real address is not valid");
        return out;
    };

    let _ = write!(out, "K:{:02X}=", storage.get_key(aaddr));

    let mut hex = String::with_capacity(36);
    let mut chars = String::with_capacity(LINE_BYTES);
    let mut addr = aaddr;
    for _ in 0..LINE_BYTES {
        let Ok(byte) = storage.fetch_byte(addr) else {
            break;
        };
        let _ = write!(hex, "{:02X}", byte);
        chars.push(display_char(byte));
        addr += 1;
        if addr & 3 == 0 {
            hex.push(' ');
        }
        if is_aligned(addr) {
            break;
        }
    }

    let _ = write!(out, "{:<36.36} {:<16.16}", hex, chars);
    out
}

/// Display up to 16 bytes of virtual storage on one line
///
/// Returns the line and the translation exception, if any. The live
/// context is never modified.
pub fn display_virt(
    regs: &CpuRegs,
    vaddr: VirtAddr,
    space: AccessSpace,
    acctype: AccessType,
    hdr: &str,
) -> Result<(String, Option<ProgramInterrupt>)> {
    let digits = regs.arch.radr_digits();
    let label = if space == AccessSpace::Real { 'R' } else { 'V' };
    let mut out = String::from(hdr);

    match virt_to_real(regs, vaddr, space, acctype)? {
        Ok(done) => {
            if space == AccessSpace::Real {
                let _ = write!(out, "R:{:0w$X}:", vaddr, w = digits);
            } else {
                let _ = write!(out, "V:{:0w$X}:R:{:0w$X}:", vaddr, done.raddr, w = digits);
            }
            out.push_str(&display_real(regs, done.raddr, false, ""));
            Ok((out, None))
        }
        Err(fault) => {
            let _ = write!(
                out,
                "{}:{:0w$X}: Translation exception {:04X} ({})",
                label,
                vaddr,
                fault.code.code(),
                fault.code.name(),
                w = digits
            );
            Ok((out, Some(fault.code)))
        }
    }
}

/// One page-bounded hex dump request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDump {
    /// Offset of the page in [`CpuRegs::abs_storage`]
    pub aaddr: AbsAddr,
    /// Page address shown on each line
    pub label: u64,
    /// First byte within the page
    pub offset: usize,
    /// Number of bytes
    pub amount: usize,
    /// Address kind shown on each line
    pub kind: AddressKind,
    /// Address width in bits (32 or 64)
    pub width: u8,
}

impl PageDump {
    fn validate(&self) -> bool {
        is_aligned(self.aaddr)
            && is_aligned(self.label)
            && self.offset < PAGE_SIZE as usize
            && self.amount > 0
            && self.offset + self.amount <= PAGE_SIZE as usize
            && matches!(self.width, 32 | 64)
    }
}

/// Hex dump of part of one page, 16 bytes per line
///
/// Lines are aligned to 16 bytes; bytes outside the request are
/// blanked. The dump goes to `sink` as a single message.
pub fn dump_abs_page(regs: &CpuRegs, req: &PageDump, sink: &mut dyn MessageSink) -> Result<()> {
    if !req.validate() {
        log::warn!("dump_abs_page: invalid parameters {:?}", req);
        sink.emit(Message::error(
            MsgId::InternalError,
            String::from("Error in function dump_abs_page(): invalid parameters"),
        ));
        return Err(Error::InvalidParameters);
    }

    let digits = if req.width == 64 { 16 } else { 8 };
    let label = req.kind.label();
    let msg_id = match req.kind {
        AddressKind::Virtual => MsgId::VirtDump,
        _ => MsgId::AbsDump,
    };

    let storage = match regs.abs_storage() {
        Some(storage) if req.aaddr <= regs.abs_limit() => storage,
        _ => {
            let text = alloc::format!("{}:{:0w$X}  Addressing exception", label, req.label, w = digits);
            sink.emit(Message::error(MsgId::AddressingException, text));
            return Err(Error::Addressing { kind: req.kind, addr: req.label });
        }
    };

    let first = req.offset & !0xF;
    let end = req.offset + req.amount;
    let mut text = String::new();

    for line in (first..end).step_by(LINE_BYTES) {
        let mut hex = String::with_capacity(40);
        let mut chars = String::with_capacity(LINE_BYTES);

        for i in line..line + LINE_BYTES {
            if i >= req.offset && i < end {
                let byte = storage.fetch_byte(req.aaddr + i as u64)?;
                let _ = write!(hex, "{:02X}", byte);
                chars.push(display_char(byte));
            } else {
                hex.push_str("  ");
                chars.push(' ');
            }
            if i % 4 == 3 && i % LINE_BYTES != LINE_BYTES - 1 {
                hex.push(' ');
            }
        }

        if !text.is_empty() {
            text.push('\n');
        }
        let row = alloc::format!(
            "{}:{:0w$X}  {}  {}",
            label,
            req.label + line as u64,
            hex,
            chars,
            w = digits
        );
        text.push_str(row.trim_end());
    }

    sink.emit(Message::info(msg_id, text));
    Ok(())
}
