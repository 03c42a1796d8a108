//! Storage alteration and display commands
//!
//! `r`/`abs` work on real or absolute storage, `v` on virtual storage.
//! An operand either alters up to 32 bytes and then displays them, or
//! displays a range of at most [`DisplayConfig::display_limit`] bytes,
//! one page-bounded dump per page.

use super::display::{dump_abs_page, PageDump};
use super::msg::{Message, MessageSink, MsgId};
use super::operand::{normalize, ParsedRange, RangeParser};
use crate::config::{self, DisplayConfig};
use crate::core::cpu::snapshot::virt_to_real;
use crate::core::cpu::CpuRegs;
use crate::core::mm::dat::{AccessSpace, AccessType, SpaceId, TranslationFault};
use crate::core::mm::{align_down, AbsAddr, AddressKind, PAGE_BYTEMASK};
use crate::{Error, Result};
use alloc::format;
use alloc::string::String;

/// Address-space tag shown after a virtual display header
pub fn bldtrans(regs: &CpuRegs, stid: SpaceId) -> String {
    if regs.psw.real_mode() {
        return String::from("(dat off)");
    }
    match stid {
        SpaceId::Real => String::from("(dat off)"),
        SpaceId::Primary => String::from("(primary)"),
        SpaceId::Secondary => String::from("(secondary)"),
        SpaceId::Home => String::from("(home)"),
        SpaceId::AccessRegister(n) => format!("(AR{:02})", n),
    }
}

pub(crate) fn missing(sink: &mut dyn MessageSink) -> Error {
    sink.emit(Message::error(
        MsgId::MissingArgument,
        String::from("Missing or invalid argument(s)"),
    ));
    Error::InvalidArgument
}

/// Parse a command operand, reporting failures to the operator
pub(crate) fn parse_operand(
    parser: &RangeParser,
    operand: &str,
    sink: &mut dyn MessageSink,
) -> Result<ParsedRange> {
    parser.parse(operand).map_err(|err| {
        sink.emit(Message::error(
            MsgId::InvalidOperand,
            format!("Invalid argument {}: {}", operand, err),
        ));
        Error::Parse(err)
    })
}

fn storage_not_valid(kind: AddressKind, addr: u64, digits: usize, sink: &mut dyn MessageSink) -> Error {
    sink.emit(Message::error(
        MsgId::StorageNotValid,
        format!("{}:{:0w$X}  Storage address is not valid", kind.label(), addr, w = digits),
    ));
    Error::NoStorage
}

fn addressing(kind: AddressKind, addr: u64, digits: usize, sink: &mut dyn MessageSink) -> Error {
    sink.emit(Message::error(
        MsgId::AddressingException,
        format!("{}:{:0w$X}  Addressing exception", kind.label(), addr, w = digits),
    ));
    Error::Addressing { kind, addr }
}

fn translation(
    regs: &CpuRegs,
    vaddr: u64,
    fault: TranslationFault,
    sink: &mut dyn MessageSink,
) -> Error {
    sink.emit(Message::error(
        MsgId::TranslationException,
        format!(
            "V:{:0w$X}  Translation exception {:04X} ({})  {}",
            vaddr,
            fault.code.code(),
            fault.code.name(),
            bldtrans(regs, fault.stid),
            w = regs.arch.radr_digits()
        ),
    ));
    Error::Translation { addr: vaddr, code: fault.code }
}

/// Reject a display configuration the commands cannot honor
pub(crate) fn check_config(config: &DisplayConfig, sink: &mut dyn MessageSink) -> Result<()> {
    config::validate(config).map_err(|err| {
        log::warn!("rejected display configuration {:?}", config);
        sink.emit(Message::error(
            MsgId::InvalidOperand,
            String::from("Invalid display configuration"),
        ));
        err
    })
}

/// Clamp an inclusive range to the display limit
pub(crate) fn clamp(range: &ParsedRange, limit: u64) -> u64 {
    let limit = limit.max(1);
    if range.end - range.start >= limit {
        range.start + limit - 1
    } else {
        range.end
    }
}

/// Iterate the page-bounded pieces of `[start, end]` as
/// `(page, offset, amount)`
fn pages(start: u64, end: u64) -> impl Iterator<Item = (u64, usize, usize)> {
    let mut addr = Some(start);
    core::iter::from_fn(move || {
        let cur = addr?;
        if cur > end {
            return None;
        }
        let page = align_down(cur);
        let offset = (cur & PAGE_BYTEMASK) as usize;
        let page_last = page | PAGE_BYTEMASK;
        let last = page_last.min(end);
        let amount = (last - cur + 1) as usize;
        addr = page_last.checked_add(1);
        Some((page, offset, amount))
    })
}

/// `r` and `abs`: alter and/or display real or absolute storage
pub fn alter_display_real_or_abs(
    regs: &CpuRegs,
    kind: AddressKind,
    operand: &str,
    config: &DisplayConfig,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    check_config(config, sink)?;
    let operand = normalize(operand);
    if operand.is_empty() {
        return Err(missing(sink));
    }

    let digits = regs.arch.radr_digits();
    let parser = RangeParser::with_config(regs.arch.max_address(), config);
    let range = parse_operand(&parser, &operand, sink)?;

    if !regs.has_storage() {
        return Err(storage_not_valid(kind, range.start, digits, sink));
    }
    let Some(storage) = regs.abs_storage() else {
        return Err(storage_not_valid(kind, range.start, digits, sink));
    };

    // (absolute address, offset in storage)
    let to_abs = |addr: u64| -> (AbsAddr, Option<AbsAddr>) {
        let aaddr = match kind {
            AddressKind::Real => regs.apply_prefixing(addr),
            _ => addr,
        };
        (aaddr, regs.abs_to_storage(aaddr).ok())
    };

    if range.is_alteration() {
        for (i, &byte) in range.data.iter().enumerate() {
            let (aaddr, slot) = to_abs(range.start + i as u64);
            let Some(slot) = slot else {
                return Err(addressing(AddressKind::Absolute, aaddr, digits, sink));
            };
            storage.store_byte(slot, byte)?;
        }
        log::debug!(
            "CPU{:04X}: altered {} bytes of {} storage at {:X}",
            regs.cpuad,
            range.data.len(),
            if kind == AddressKind::Real { "real" } else { "absolute" },
            range.start
        );
    }

    let end = clamp(&range, config.display_limit);

    for (page, offset, amount) in pages(range.start, end) {
        let (aaddr, slot) = to_abs(page);
        let Some(slot) = slot else {
            return Err(addressing(AddressKind::Absolute, aaddr, digits, sink));
        };

        sink.emit(Message::info(
            MsgId::AbsDump,
            format!("A:{:0w$X}  K:{:02X}", aaddr, storage.get_key(slot), w = digits),
        ));

        let req = PageDump {
            aaddr: slot,
            label: page,
            offset,
            amount,
            kind,
            width: regs.arch.dump_width(),
        };
        dump_abs_page(regs, &req, sink)?;
    }

    Ok(())
}

/// `v`: alter and/or display virtual storage
///
/// A leading `P`, `S` or `H` selects the primary, secondary or home
/// space; otherwise the space follows the PSW using access register 0.
pub fn alter_display_virt(
    regs: &CpuRegs,
    operand: &str,
    config: &DisplayConfig,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    check_config(config, sink)?;
    let operand = normalize(operand);
    if operand.is_empty() {
        return Err(missing(sink));
    }

    let (space, rest) = match operand.as_bytes()[0] {
        b'P' => (AccessSpace::Primary, &operand[1..]),
        b'S' => (AccessSpace::Secondary, &operand[1..]),
        b'H' => (AccessSpace::Home, &operand[1..]),
        _ => (AccessSpace::Register(0), operand.as_str()),
    };

    let digits = regs.arch.radr_digits();
    let parser = RangeParser::with_config(regs.arch.max_address(), config);
    let range = parse_operand(&parser, rest, sink)?;

    if !regs.has_storage() {
        return Err(storage_not_valid(AddressKind::Virtual, range.start, digits, sink));
    }
    let Some(storage) = regs.abs_storage() else {
        return Err(storage_not_valid(AddressKind::Virtual, range.start, digits, sink));
    };

    if range.is_alteration() {
        // Nothing is written unless both ends of the range translate
        for vaddr in [range.start, range.end] {
            if let Err(fault) = virt_to_real(regs, vaddr, space, AccessType::Hardware)? {
                return Err(translation(regs, vaddr, fault, sink));
            }
        }

        for (i, &byte) in range.data.iter().enumerate() {
            let vaddr = range.start + i as u64;
            let done = match virt_to_real(regs, vaddr, space, AccessType::Write)? {
                Ok(done) => done,
                Err(fault) => return Err(translation(regs, vaddr, fault, sink)),
            };
            let Ok(slot) = regs.real_to_abs(done.raddr) else {
                return Err(addressing(AddressKind::Real, done.raddr, digits, sink));
            };
            storage.store_byte(slot, byte)?;
        }
        log::debug!(
            "CPU{:04X}: altered {} bytes of virtual storage at {:X}",
            regs.cpuad,
            range.data.len(),
            range.start
        );
    }

    let end = clamp(&range, config.display_limit);

    for (page, offset, amount) in pages(range.start, end) {
        let done = match virt_to_real(regs, page, space, AccessType::Hardware)? {
            Ok(done) => done,
            Err(fault) => return Err(translation(regs, page, fault, sink)),
        };
        let Ok(slot) = regs.real_to_abs(done.raddr) else {
            return Err(addressing(AddressKind::Real, done.raddr, digits, sink));
        };

        sink.emit(Message::info(
            MsgId::VirtDump,
            format!(
                "R:{:0w$X}  K:{:02X}  {}",
                done.raddr,
                storage.get_key(slot),
                bldtrans(regs, done.stid),
                w = digits
            ),
        ));

        let req = PageDump {
            aaddr: align_down(slot),
            label: page,
            offset,
            amount,
            kind: AddressKind::Virtual,
            width: regs.arch.dump_width(),
        };
        dump_abs_page(regs, &req, sink)?;
    }

    Ok(())
}
