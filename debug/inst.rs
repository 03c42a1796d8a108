//! Instruction display
//!
//! Shows the PSW and one instruction together with the storage at its
//! operands and the registers it uses. Used by instruction stepping
//! and tracing, and after a program check (in which case the live
//! instruction address already points past the failing instruction).
//!
//! All work happens on a [`RegsSnapshot`], so the live processor is
//! never touched.

use super::disasm::{inst_hex, Disassembler};
use super::display::display_virt;
use super::msg::{Message, MessageSink, MsgId};
use super::regs::{self, RegBlocks};
use super::shape::{effective_addresses, ilc, OperandAddr};
use super::trace::{OperandTrace, TraceSink};
use crate::config::DisplayConfig;
use crate::core::cpu::snapshot::virt_to_real;
use crate::core::cpu::{CpuRegs, RegsSnapshot};
use crate::core::mm::dat::{AccessSpace, AccessType};
use crate::core::mm::{PAGE_BYTEMASK, PAGE_SIZE};
use crate::utils::push_hex;
use crate::Result;
use alloc::string::String;
use alloc::vec::Vec;

/// Display the instruction about to execute
pub fn display_inst(
    regs: &CpuRegs,
    inst: Option<&[u8]>,
    config: &DisplayConfig,
    disasm: &dyn Disassembler,
    sink: &mut dyn MessageSink,
    trace: Option<&mut dyn TraceSink>,
) -> Result<()> {
    display_inst_adj(regs, inst, false, config, disasm, sink, trace)
}

/// Display the instruction that caused a program interruption
///
/// The instruction address is backed up by the instruction length
/// before display.
pub fn display_pgmint_inst(
    regs: &CpuRegs,
    inst: Option<&[u8]>,
    config: &DisplayConfig,
    disasm: &dyn Disassembler,
    sink: &mut dyn MessageSink,
    trace: Option<&mut dyn TraceSink>,
) -> Result<()> {
    display_inst_adj(regs, inst, true, config, disasm, sink, trace)
}

fn display_inst_adj(
    live: &CpuRegs,
    inst: Option<&[u8]>,
    pgmint: bool,
    config: &DisplayConfig,
    disasm: &dyn Disassembler,
    sink: &mut dyn MessageSink,
    mut trace: Option<&mut dyn TraceSink>,
) -> Result<()> {
    if !(config.trace_file && live.inst_trace) {
        trace = None;
    }

    if !live.has_storage() {
        match trace {
            Some(tf) => tf.storage_unavailable(live),
            None => sink.emit(Message::info(
                MsgId::StorageUnavailable,
                String::from("Real address is not valid"),
            )),
        }
        return Ok(());
    }

    let mut regs = RegsSnapshot::take(live)?;
    let sie = if regs.sie_mode() { "SIE: " } else { "" };

    let Some(bytes) = inst.filter(|b| !b.is_empty()) else {
        match trace {
            Some(tf) => tf.fetch_error(&regs),
            None => {
                let mut text = String::from(sie);
                text.push_str("Instruction fetch error\n");
                text.push_str(&regs::display_gregs(&regs, config));
                sink.emit(Message::error(MsgId::InstFetchError, text));
            }
        }
        return Ok(());
    };

    let len = ilc(bytes[0]);
    let mut inst = [0u8; 6];
    let avail = bytes.len().min(len);
    inst[..avail].copy_from_slice(&bytes[..avail]);

    if pgmint {
        let ia = regs.psw.ia.wrapping_sub(len as u64);
        regs.psw.ia = regs.psw.wrap(ia);
    }
    log::trace!(
        "CPU{:04X}: display instruction {:02X} at {:X}{}",
        regs.cpuad,
        inst[0],
        regs.psw.ia,
        if pgmint { " (program check)" } else { "" }
    );

    let psw = regs.psw.image(regs.arch);
    let cpu = if config.multi_cpu() { regs::cpu_prefix(&regs) } else { String::new() };

    let (shape, ops) = effective_addresses(&regs, &inst);
    let real = regs.psw.real_mode();
    let first = ops.first.map(|op| {
        let space = if real { AccessSpace::Real } else { AccessSpace::Register(op.reg) };
        let acctype = if shape.execute { AccessType::InstFetch } else { AccessType::Hardware };
        (op, space, acctype)
    });
    let second = ops.second.map(|op| {
        let space = if real || shape.real_second {
            AccessSpace::Real
        } else {
            AccessSpace::Register(op.reg)
        };
        (op, space, AccessType::Hardware)
    });

    let blocks = regs::select(&regs, &inst);

    if let Some(tf) = trace {
        let first = first.map(|(op, space, acctype)| operand_trace(&regs, op, space, acctype)).transpose()?;
        let second = second.map(|(op, space, acctype)| operand_trace(&regs, op, space, acctype)).transpose()?;
        tf.operands(&regs, first, second);
        trace_regs(tf, &regs, blocks);
        tf.instruction(&regs, &psw, &inst[..len]);
        return Ok(());
    }

    let mut lines = Vec::new();

    let mut text = String::from(sie);
    text.push_str(&cpu);
    text.push_str("PSW=");
    push_hex(&mut text, &psw[..8]);
    text.push(' ');
    if psw.len() > 8 {
        push_hex(&mut text, &psw[8..]);
        text.push(' ');
    }
    text.push_str("INST=");
    text.push_str(&inst_hex(&inst[..len]));
    text.push_str(&disasm.render(regs.arch, &inst[..len]));
    lines.push(Message::info(MsgId::InstPsw, text));

    for (op, space, acctype) in first.into_iter().chain(second) {
        let mut hdr = String::from(sie);
        hdr.push_str(&cpu);
        let (line, _) = display_virt(&regs, op.addr, space, acctype, &hdr)?;
        lines.push(Message::info(MsgId::InstOperand, String::from(line.trim_end())));
    }

    let reg_msgs = if config.show_regs_none {
        Vec::new()
    } else {
        reg_messages(&regs, blocks, config)
    };

    if config.show_regs_first {
        reg_msgs.into_iter().chain(lines).for_each(|msg| sink.emit(msg));
    } else {
        lines.into_iter().chain(reg_msgs).for_each(|msg| sink.emit(msg));
    }

    Ok(())
}

fn reg_messages(regs: &CpuRegs, blocks: RegBlocks, config: &DisplayConfig) -> Vec<Message> {
    let table: [(RegBlocks, MsgId, fn(&CpuRegs, &DisplayConfig) -> String); 6] = [
        (RegBlocks::GR, MsgId::GeneralRegs, regs::display_gregs),
        (RegBlocks::CR, MsgId::ControlRegs, regs::display_cregs),
        (RegBlocks::AR, MsgId::AccessRegs, regs::display_aregs),
        (RegBlocks::FPC, MsgId::FloatControl, regs::display_fpc),
        (RegBlocks::FPR, MsgId::FloatRegs, regs::display_fregs),
        (RegBlocks::VR, MsgId::VectorRegs, regs::display_vregs),
    ];

    table
        .iter()
        .filter(|(block, _, _)| blocks.contains(*block))
        .map(|(_, id, show)| Message::info(*id, show(regs, config)))
        .collect()
}

fn trace_regs(tf: &mut dyn TraceSink, regs: &CpuRegs, blocks: RegBlocks) {
    if blocks.contains(RegBlocks::GR) {
        tf.gregs(regs);
    }
    if blocks.contains(RegBlocks::CR) {
        tf.cregs(regs);
    }
    if blocks.contains(RegBlocks::AR) {
        tf.aregs(regs);
    }
    if blocks.contains(RegBlocks::FPC) {
        tf.fpc(regs);
    }
    if blocks.contains(RegBlocks::FPR) {
        tf.fregs(regs);
    }
    if blocks.contains(RegBlocks::VR) {
        tf.vregs(regs);
    }
}

/// Resolve one operand for the trace file: up to 16 bytes, stopping
/// at the page end
fn operand_trace(
    regs: &CpuRegs,
    op: OperandAddr,
    space: AccessSpace,
    acctype: AccessType,
) -> Result<OperandTrace> {
    let mut out = OperandTrace {
        vaddr: op.addr,
        reg: op.reg,
        raddr: None,
        xcode: None,
        data: heapless::Vec::new(),
    };

    let raddr = match virt_to_real(regs, op.addr, space, acctype)? {
        Ok(done) => done.raddr,
        Err(fault) => {
            out.xcode = Some(fault.code);
            return Ok(out);
        }
    };
    out.raddr = Some(raddr);

    let aaddr = match regs.real_to_abs(raddr) {
        Ok(aaddr) => aaddr,
        Err(code) => {
            out.xcode = Some(code);
            return Ok(out);
        }
    };

    if let Some(storage) = regs.abs_storage() {
        let to_page_end = PAGE_SIZE - (raddr & PAGE_BYTEMASK);
        let to_limit = regs.abs_limit() - aaddr + 1;
        let len = to_page_end.min(to_limit).min(16) as usize;
        let mut buf = [0u8; 16];
        storage.read(aaddr, &mut buf[..len])?;
        out.data = heapless::Vec::from_slice(&buf[..len]).unwrap_or_default();
    }

    Ok(out)
}
