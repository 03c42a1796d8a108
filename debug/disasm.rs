//! Storage disassembly (`u` command)
//!
//! Walks a storage range instruction by instruction, printing each
//! instruction's address, hex bytes and disassembly text. Rendering
//! the mnemonic text is delegated to a [`Disassembler`].

use super::alter::{check_config, clamp, missing, parse_operand};
use super::msg::{Message, MessageSink, MsgId};
use super::operand::{normalize, RangeParser};
use super::shape::ilc;
use crate::arch::ArchMode;
use crate::config::DisplayConfig;
use crate::core::cpu::snapshot::virt_to_real;
use crate::core::cpu::CpuRegs;
use crate::core::mm::dat::{AccessSpace, AccessType, SpaceId};
use crate::core::mm::AddressKind;
use crate::utils::push_hex;
use crate::{Error, Result};
use alloc::format;
use alloc::string::String;

/// Renders the text of one instruction
pub trait Disassembler {
    /// Mnemonic and operands of `inst` (exactly one instruction)
    fn render(&self, arch: ArchMode, inst: &[u8]) -> String;
}

impl<F> Disassembler for F
where
    F: Fn(ArchMode, &[u8]) -> String,
{
    fn render(&self, arch: ArchMode, inst: &[u8]) -> String {
        self(arch, inst)
    }
}

/// Disassembler that renders nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoText;

impl Disassembler for NoText {
    fn render(&self, _arch: ArchMode, _inst: &[u8]) -> String {
        String::new()
    }
}

/// Hex bytes of an instruction padded to the width of a 6-byte one
pub fn inst_hex(inst: &[u8]) -> String {
    let mut out = String::with_capacity(13);
    push_hex(&mut out, inst);
    match inst.len() {
        2 => out.push_str("         "),
        4 => out.push_str("     "),
        _ => out.push(' '),
    }
    out
}

fn space_tag(stid: SpaceId) -> char {
    match stid {
        SpaceId::Primary => 'P',
        SpaceId::Home => 'H',
        SpaceId::Secondary => 'S',
        _ => 'R',
    }
}

fn info(sink: &mut dyn MessageSink, text: String) {
    sink.emit(Message::info(MsgId::Disassembly, text));
}

/// `u`: disassemble a storage range
///
/// A leading `R`, `V`, `P` or `H` picks real, virtual, primary or home
/// addressing; without one the range is real when DAT is off and
/// virtual otherwise.
pub fn disasm_stor(
    regs: &CpuRegs,
    operand: &str,
    config: &DisplayConfig,
    disasm: &dyn Disassembler,
    sink: &mut dyn MessageSink,
) -> Result<()> {
    check_config(config, sink)?;
    let operand = normalize(operand);
    if operand.is_empty() {
        return Err(missing(sink));
    }

    let (space, rest) = match operand.as_bytes()[0] {
        b'R' => (AccessSpace::Real, &operand[1..]),
        b'V' => (AccessSpace::Register(0), &operand[1..]),
        b'P' => (AccessSpace::Primary, &operand[1..]),
        b'H' => (AccessSpace::Home, &operand[1..]),
        _ if regs.psw.real_mode() => (AccessSpace::Real, operand.as_str()),
        _ => (AccessSpace::Register(0), operand.as_str()),
    };

    let parser = RangeParser::with_config(regs.arch.max_address(), config).display_only();
    let range = parse_operand(&parser, rest, sink)?;

    let Some(storage) = regs.abs_storage().filter(|_| regs.has_storage()) else {
        info(sink, String::from("Real address is not valid"));
        return Err(Error::NoStorage);
    };

    let digits = regs.arch.radr_digits();
    let end = clamp(&range, config.display_limit);

    let mut saddr = range.start;
    let mut stid = SpaceId::Real;

    while saddr <= end {
        let raddr = if space == AccessSpace::Real {
            saddr
        } else {
            match virt_to_real(regs, saddr, space, AccessType::Hardware)? {
                Ok(done) => {
                    stid = done.stid;
                    done.raddr
                }
                Err(fault) => {
                    info(
                        sink,
                        format!(
                            "R:{:0w$X}  Storage not accessible code = {:04X} ({})",
                            saddr,
                            fault.code.code(),
                            fault.code.name(),
                            w = digits
                        ),
                    );
                    return Err(Error::Translation { addr: saddr, code: fault.code });
                }
            }
        };

        let Ok(aaddr) = regs.real_to_abs(raddr) else {
            info(sink, format!("R:{:0w$X}  Addressing exception", raddr, w = digits));
            return Err(Error::Addressing { kind: AddressKind::Real, addr: raddr });
        };

        let opcode = storage.fetch_byte(aaddr)?;
        let len = ilc(opcode);
        let mut inst = [0u8; 6];
        if aaddr + len as u64 - 1 > regs.abs_limit() || storage.read(aaddr, &mut inst[..len]).is_err() {
            info(sink, format!("R:{:0w$X}  Addressing exception", aaddr, w = digits));
            return Err(Error::Addressing { kind: AddressKind::Absolute, addr: aaddr });
        }

        let inst = &inst[..len];
        info(
            sink,
            format!(
                "{}:{:0w$X}  {}{}",
                space_tag(stid),
                raddr,
                inst_hex(inst),
                disasm.render(regs.arch, inst),
                w = digits
            ),
        );

        match saddr.checked_add(len as u64) {
            Some(next) => saddr = next,
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu::SysMask;
    use crate::testutil::Fixture;
    use alloc::vec::Vec;

    fn mnemonic(_arch: ArchMode, inst: &[u8]) -> String {
        match inst[0] {
            0x07 => String::from("BCR"),
            0x58 => String::from("L"),
            0xD2 => String::from("MVC"),
            _ => String::from("?"),
        }
    }

    fn run(regs: &CpuRegs, operand: &str) -> (Result<()>, Vec<Message>) {
        let mut sink: Vec<Message> = Vec::new();
        let rc = disasm_stor(regs, operand, &DisplayConfig::default(), &mnemonic, &mut sink);
        (rc, sink)
    }

    #[test]
    fn test_inst_hex_padding() {
        assert_eq!(inst_hex(&[0x07, 0xFE]), "07FE         ");
        assert_eq!(inst_hex(&[0x58, 0x10, 0x20, 0x00]), "58102000     ");
        assert_eq!(inst_hex(&[0xD2, 0x07, 0x10, 0x00, 0x20, 0x00]), "D20710002000 ");
    }

    #[test]
    fn test_disasm_real() {
        let fx = Fixture::esa390();
        fx.storage
            .write(0x1000, &[0x07, 0xFE, 0x58, 0x10, 0x20, 0x00, 0xD2, 0x07, 0x10, 0x00, 0x20, 0x00])
            .unwrap();
        let (rc, sink) = run(&fx.regs, "R1000.C");
        assert_eq!(rc, Ok(()));
        let lines: Vec<&str> = sink.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            lines,
            [
                "R:00001000  07FE         BCR",
                "R:00001002  58102000     L",
                "R:00001006  D20710002000 MVC",
            ]
        );
    }

    #[test]
    fn test_disasm_virtual_shows_space() {
        let fx = Fixture::esa390();
        fx.storage.write(Fixture::FRAME_A, &[0x07, 0xFE]).unwrap();
        let (rc, sink) = run(&fx.regs, "401000.2");
        assert_eq!(rc, Ok(()));
        assert_eq!(sink[0].text, "P:00020000  07FE         BCR");
    }

    #[test]
    fn test_disasm_default_real_in_real_mode() {
        let mut fx = Fixture::esa390();
        fx.regs.psw.sysmask.remove(SysMask::DAT);
        let (rc, sink) = run(&fx.regs, "1000.2");
        assert_eq!(rc, Ok(()));
        assert!(sink[0].text.starts_with("R:00001000  0000"));
    }

    #[test]
    fn test_disasm_translation_failure() {
        let fx = Fixture::esa390();
        let (rc, sink) = run(&fx.regs, "V403000.2");
        assert!(matches!(rc, Err(Error::Translation { addr: 0x0040_3000, .. })));
        assert_eq!(
            sink[0].text,
            "R:00403000  Storage not accessible code = 0011 (Page-translation exception)"
        );
    }

    #[test]
    fn test_disasm_instruction_past_storage_end() {
        let fx = Fixture::esa390();
        fx.storage.write(0xFFFFE, &[0x58, 0x10]).unwrap();
        let (rc, sink) = run(&fx.regs, "RFFFFE.2");
        assert!(matches!(rc, Err(Error::Addressing { addr: 0xFFFFE, .. })));
        assert_eq!(sink[0].text, "R:000FFFFE  Addressing exception");
    }

    #[test]
    fn test_disasm_rejects_alteration() {
        let fx = Fixture::esa390();
        let (rc, _) = run(&fx.regs, "R1000=0700");
        assert!(matches!(rc, Err(Error::Parse(_))));
    }

    #[test]
    fn test_disasm_rejects_zero_limit() {
        let fx = Fixture::esa390();
        let config = DisplayConfig { display_limit: 0, ..DisplayConfig::default() };
        let mut sink: Vec<Message> = Vec::new();
        let rc = disasm_stor(&fx.regs, "R1000.2", &config, &NoText, &mut sink);
        assert_eq!(rc, Err(Error::InvalidArgument));
        assert_eq!(sink[0].text, "Invalid display configuration");
    }

    #[test]
    fn test_disasm_without_storage() {
        let regs = CpuRegs::new(ArchMode::Esa390, None);
        let (rc, sink) = run(&regs, "R0.2");
        assert_eq!(rc, Err(Error::NoStorage));
        assert_eq!(sink[0].text, "Real address is not valid");
    }
}
