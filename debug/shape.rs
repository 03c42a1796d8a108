//! Instruction operand shapes
//!
//! Decides, for one instruction, which storage operands it has and how
//! their effective addresses are formed. The primary opcode selects an
//! entry of a table built at compile time; a handful of opcodes defer
//! to their secondary opcode.

use crate::arch::ArchMode;
use crate::core::cpu::CpuRegs;

/// Instruction length in bytes from the first opcode byte
#[inline]
pub const fn ilc(opcode: u8) -> usize {
    match opcode >> 6 {
        0 => 2,
        1 | 2 => 4,
        _ => 6,
    }
}

/// Index applied to a base-displacement address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    None,
    /// General register named by byte 1, low nibble
    General,
    /// Element of the vector register named by byte 1 and the RXB bits
    Vector { doubleword: bool },
}

/// How one operand address is formed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    None,
    /// Base from byte 2, displacement from bytes 2-3 (20-bit signed
    /// with byte 4 when `long`)
    BaseDisp { index: Index, long: bool },
    /// Base from byte 4, displacement from bytes 4-5
    SecondBaseDisp,
    /// Address in the general register named by a nibble of `byte`
    Register { byte: usize, high: bool, extended: bool },
    /// Halfword offset from the instruction address, 16 or 32 bits
    Relative { long: bool },
}

/// Storage operand layout of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub first: Addressing,
    pub second: Addressing,
    /// Second operand is a real address
    pub real_second: bool,
    /// First operand is the target of an execute instruction
    pub execute: bool,
}

impl Shape {
    const fn new(first: Addressing, second: Addressing) -> Self {
        Self { first, second, real_second: false, execute: false }
    }

    const fn real(mut self) -> Self {
        self.real_second = true;
        self
    }

    const fn execute(mut self) -> Self {
        self.execute = true;
        self
    }

    const fn extended(mut self) -> Self {
        if let Addressing::Register { byte, high, .. } = self.first {
            self.first = Addressing::Register { byte, high, extended: true };
        }
        if let Addressing::Register { byte, high, .. } = self.second {
            self.second = Addressing::Register { byte, high, extended: true };
        }
        self
    }
}

const NONE: Shape = Shape::new(Addressing::None, Addressing::None);
const RX: Shape = Shape::new(Addressing::BaseDisp { index: Index::General, long: false }, Addressing::None);
const RS: Shape = Shape::new(Addressing::BaseDisp { index: Index::None, long: false }, Addressing::None);
const RXY: Shape = Shape::new(Addressing::BaseDisp { index: Index::General, long: true }, Addressing::None);
const RSY: Shape = Shape::new(Addressing::BaseDisp { index: Index::None, long: true }, Addressing::None);
const SS: Shape = Shape::new(
    Addressing::BaseDisp { index: Index::None, long: false },
    Addressing::SecondBaseDisp,
);
const RI_REL: Shape = Shape::new(Addressing::Relative { long: false }, Addressing::None);
const RIL_REL: Shape = Shape::new(Addressing::Relative { long: true }, Addressing::None);
const PAIR: Shape = Shape::new(
    Addressing::Register { byte: 1, high: true, extended: false },
    Addressing::Register { byte: 1, high: false, extended: false },
);
const RRE: Shape = Shape::new(
    Addressing::Register { byte: 3, high: true, extended: false },
    Addressing::Register { byte: 3, high: false, extended: false },
);
const VRV_D: Shape = Shape::new(
    Addressing::BaseDisp { index: Index::Vector { doubleword: true }, long: false },
    Addressing::None,
);
const VRV_F: Shape = Shape::new(
    Addressing::BaseDisp { index: Index::Vector { doubleword: false }, long: false },
    Addressing::None,
);

/// Primary table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Fixed(Shape),
    /// Shape depends on the secondary opcode
    Sub(u8),
}

const fn primary(op: u8) -> Entry {
    match op {
        0x0E | 0x0F | 0xA8 | 0xA9 => Entry::Fixed(PAIR),
        0x00..=0x3F => Entry::Fixed(NONE),
        0x44 => Entry::Fixed(RX.execute()),
        0x40..=0x7F | 0xB1 => Entry::Fixed(RX),
        0x84 | 0x85 => Entry::Fixed(RI_REL),
        0xA5 | 0xB3 | 0xC2 | 0xCC | 0xEC => Entry::Fixed(NONE),
        0xA7 | 0xB2 | 0xB9 | 0xC0 | 0xC6 | 0xE6 | 0xE7 | 0xED => Entry::Sub(op),
        0x80..=0xBF => Entry::Fixed(RS),
        0xC4 => Entry::Fixed(RIL_REL),
        0xE3 => Entry::Fixed(RXY),
        0xEB => Entry::Fixed(RSY),
        _ => Entry::Fixed(SS),
    }
}

const fn build() -> [Entry; 256] {
    let mut table = [Entry::Fixed(NONE); 256];
    let mut op = 0;
    while op < 256 {
        table[op] = primary(op as u8);
        op += 1;
    }
    table
}

static PRIMARY: [Entry; 256] = build();

fn secondary(arch: ArchMode, op: u8, inst: &[u8; 6]) -> Shape {
    match op {
        0xA7 => match inst[1] & 0x0F {
            0x4..=0x7 => RI_REL,
            _ => NONE,
        },
        0xB2 => match inst[1] {
            0x21 => RRE.real(),
            0x29..=0x2C => RRE.extended().real(),
            0x46 | 0x4B => RRE.real(),
            0x20..=0x2F | 0x40..=0x6F | 0xA0..=0xAF => RRE,
            _ => RS,
        },
        0xB9 => match inst[1] {
            0x05 | 0x25 => RRE.real(),
            0x31..=0xFF => RRE,
            _ => NONE,
        },
        0xC0 => match inst[1] & 0x0F {
            0x0 | 0x4 | 0x5 => RIL_REL,
            _ => NONE,
        },
        0xC6 => match inst[1] & 0x0F {
            0x0 if arch.has_execute_extension() => RIL_REL.execute(),
            _ => RIL_REL,
        },
        0xE6 if arch.has_vector() => match inst[5] {
            0x01..=0x07 | 0x09..=0x0B | 0x0E | 0x0F => RX,
            0x34 | 0x35 | 0x3C | 0x3D => RS,
            _ => NONE,
        },
        0xE7 if arch.has_vector() => match inst[5] {
            0x00..=0x0B | 0x0E => RX,
            0x12 | 0x1A => VRV_D,
            0x13 | 0x1B => VRV_F,
            0x30 | 0x36 | 0x37 | 0x3E | 0x3F => RS,
            _ => NONE,
        },
        0xED => match inst[1] {
            0x64..=0x67 => RXY,
            _ => RX,
        },
        _ => NONE,
    }
}

/// Operand layout of `inst`
pub fn lookup(arch: ArchMode, inst: &[u8; 6]) -> Shape {
    match PRIMARY[inst[0] as usize] {
        Entry::Fixed(shape) => shape,
        Entry::Sub(op) => secondary(arch, op, inst),
    }
}

/// Effective address of one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandAddr {
    /// Address, wrapped to the addressing mode
    pub addr: u64,
    /// Register whose access register selects the space in AR mode
    pub reg: u8,
}

/// Effective addresses of an instruction's storage operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operands {
    pub first: Option<OperandAddr>,
    pub second: Option<OperandAddr>,
}

fn base_disp(regs: &CpuRegs, inst: &[u8; 6], index: Index, long: bool) -> OperandAddr {
    let b = inst[2] >> 4;
    let dl = u16::from_be_bytes([inst[2], inst[3]]) & 0x0FFF;

    let mut addr = if long {
        // 20-bit signed displacement, DH in byte 4
        let raw = (inst[4] as u32) << 12 | dl as u32;
        (((raw << 12) as i32) >> 12) as i64 as u64
    } else {
        dl as u64
    };

    if b != 0 {
        addr = addr.wrapping_add(regs.gr[b as usize]);
    }

    match index {
        Index::None => {}
        Index::General => {
            let x = inst[1] & 0x0F;
            if x != 0 {
                addr = addr.wrapping_add(regs.gr[x as usize]);
            }
        }
        Index::Vector { doubleword } => {
            let m3 = (inst[4] >> 4) as usize;
            let v2 = (inst[1] & 0x0F) as usize | if inst[4] & 0x04 != 0 { 16 } else { 0 };
            let elem = if doubleword {
                regs.vr_d(v2, m3)
            } else {
                regs.vr_f(v2, m3) as u64
            };
            addr = addr.wrapping_add(elem);
        }
    }

    OperandAddr { addr: regs.psw.wrap(addr), reg: b }
}

fn operand(regs: &CpuRegs, inst: &[u8; 6], how: Addressing) -> Option<OperandAddr> {
    match how {
        Addressing::None => None,
        Addressing::BaseDisp { index, long } => Some(base_disp(regs, inst, index, long)),
        Addressing::SecondBaseDisp => {
            let b = inst[4] >> 4;
            let mut addr = (u16::from_be_bytes([inst[4], inst[5]]) & 0x0FFF) as u64;
            if b != 0 {
                addr = addr.wrapping_add(regs.gr[b as usize]);
            }
            Some(OperandAddr { addr: regs.psw.wrap(addr), reg: b })
        }
        Addressing::Register { byte, high, extended } => {
            let r = if high { inst[byte] >> 4 } else { inst[byte] & 0x0F };
            let wrap = if extended {
                regs.psw.amode.maxwrap_e(regs.arch)
            } else {
                regs.psw.amode.maxwrap()
            };
            Some(OperandAddr { addr: regs.gr[r as usize] & wrap, reg: r })
        }
        Addressing::Relative { long } => {
            let offset = if long {
                i32::from_be_bytes([inst[2], inst[3], inst[4], inst[5]]) as i64
            } else {
                i16::from_be_bytes([inst[2], inst[3]]) as i64
            };
            let addr = regs.psw.ia.wrapping_add((offset * 2) as u64);
            Some(OperandAddr { addr: regs.psw.wrap(addr), reg: 0 })
        }
    }
}

/// Effective addresses of the storage operands of `inst` on `regs`
pub fn effective_addresses(regs: &CpuRegs, inst: &[u8; 6]) -> (Shape, Operands) {
    let shape = lookup(regs.arch, inst);
    let operands = Operands {
        first: operand(regs, inst, shape.first),
        second: operand(regs, inst, shape.second),
    };
    (shape, operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::AddressingMode;
    use test_case::test_case;

    fn regs(arch: ArchMode, amode: AddressingMode) -> CpuRegs {
        let mut regs = CpuRegs::new(arch, None);
        regs.psw.amode = amode;
        for (i, gr) in regs.gr.iter_mut().enumerate() {
            *gr = 0x1_0000 * i as u64;
        }
        regs
    }

    fn inst(bytes: &[u8]) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    #[test_case(0x05, 2)]
    #[test_case(0x58, 4)]
    #[test_case(0xB2, 4)]
    #[test_case(0xC0, 6)]
    #[test_case(0xD2, 6)]
    fn test_ilc(opcode: u8, expected: usize) {
        assert_eq!(ilc(opcode), expected);
    }

    #[test]
    fn test_rx_with_index() {
        // L R1,X'010'(R2,R3)
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (_, ops) = effective_addresses(&regs, &inst(&[0x58, 0x12, 0x30, 0x10]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x5_0010, reg: 3 }));
        assert_eq!(ops.second, None);
    }

    #[test]
    fn test_rr_has_no_operands() {
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (shape, ops) = effective_addresses(&regs, &inst(&[0x18, 0x12]));
        assert_eq!(shape, NONE);
        assert_eq!(ops, Operands::default());
    }

    #[test]
    fn test_ss_two_operands() {
        // MVC 0(8,R1),4(R2)
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (_, ops) = effective_addresses(&regs, &inst(&[0xD2, 0x07, 0x10, 0x00, 0x20, 0x04]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x1_0000, reg: 1 }));
        assert_eq!(ops.second, Some(OperandAddr { addr: 0x2_0004, reg: 2 }));
    }

    #[test]
    fn test_long_negative_displacement() {
        // LG R1,-8(,R2)
        let regs = regs(ArchMode::Zarch, AddressingMode::Bit64);
        let (_, ops) =
            effective_addresses(&regs, &inst(&[0xE3, 0x10, 0x2F, 0xF8, 0xFF, 0x04]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x1_FFF8, reg: 2 }));
    }

    #[test]
    fn test_mvcl_register_pair() {
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (_, ops) = effective_addresses(&regs, &inst(&[0x0E, 0x24]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x2_0000, reg: 2 }));
        assert_eq!(ops.second, Some(OperandAddr { addr: 0x4_0000, reg: 4 }));
    }

    #[test]
    fn test_storage_key_ops_use_extended_wrap() {
        // ISKE R1,R2 in 24-bit mode keeps 31 bits
        let mut regs = regs(ArchMode::Esa390, AddressingMode::Bit24);
        regs.gr[2] = 0x0123_4000;
        let (shape, ops) = effective_addresses(&regs, &inst(&[0xB2, 0x29, 0x00, 0x12]));
        assert!(shape.real_second);
        assert_eq!(ops.second, Some(OperandAddr { addr: 0x0123_4000, reg: 2 }));

        // IPM wraps to 24 bits
        let (shape, ops) = effective_addresses(&regs, &inst(&[0xB2, 0x22, 0x00, 0x12]));
        assert!(!shape.real_second);
        assert_eq!(ops.second, Some(OperandAddr { addr: 0x23_4000, reg: 2 }));
    }

    #[test]
    fn test_s_format_b2() {
        // STIDP 8(R5)
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (_, ops) = effective_addresses(&regs, &inst(&[0xB2, 0x02, 0x50, 0x08]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x5_0008, reg: 5 }));
    }

    #[test]
    fn test_relative_branches() {
        let mut regs = regs(ArchMode::Zarch, AddressingMode::Bit64);
        regs.psw.ia = 0x1000;

        // BRC 15,*-4
        let (_, ops) = effective_addresses(&regs, &inst(&[0xA7, 0xF4, 0xFF, 0xFE]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x0FFC, reg: 0 }));

        // LARL R1,*+0x100000
        let (_, ops) = effective_addresses(&regs, &inst(&[0xC0, 0x10, 0x00, 0x08, 0x00, 0x00]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x10_1000, reg: 0 }));

        // LGFI has no storage operand
        let (_, ops) = effective_addresses(&regs, &inst(&[0xC0, 0x11, 0x00, 0x08, 0x00, 0x00]));
        assert_eq!(ops.first, None);

        // EXRL
        let (shape, _) = effective_addresses(&regs, &inst(&[0xC6, 0x00, 0x00, 0x00, 0x00, 0x10]));
        assert!(shape.execute);
    }

    #[test]
    fn test_execute_target() {
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (shape, _) = effective_addresses(&regs, &inst(&[0x44, 0x10, 0x20, 0x00]));
        assert!(shape.execute);
    }

    #[test]
    fn test_vector_gather_element() {
        // VGEG V1,8(V2,R3),1
        let mut regs = regs(ArchMode::Zarch, AddressingMode::Bit64);
        regs.vr[2] = (0x100u128 << 64) | 0x200;
        let (_, ops) =
            effective_addresses(&regs, &inst(&[0xE7, 0x12, 0x30, 0x08, 0x10, 0x12]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x3_0208, reg: 3 }));

        // RXB selects V18
        regs.vr[18] = 0x5000u128 << 64;
        let (_, ops) =
            effective_addresses(&regs, &inst(&[0xE7, 0x12, 0x30, 0x08, 0x04, 0x12]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x3_5008, reg: 3 }));
    }

    #[test]
    fn test_vector_ops_need_facility() {
        let regs = regs(ArchMode::Esa390, AddressingMode::Bit31);
        let (_, ops) = effective_addresses(&regs, &inst(&[0xE7, 0x10, 0x30, 0x00, 0x00, 0x06]));
        assert_eq!(ops.first, None);
    }

    #[test]
    fn test_b9_register_only() {
        let regs = regs(ArchMode::Zarch, AddressingMode::Bit64);
        // LGR has no storage operand
        let (_, ops) = effective_addresses(&regs, &inst(&[0xB9, 0x04, 0x00, 0x12]));
        assert_eq!(ops, Operands::default());
        // LURAG second operand is real
        let (shape, ops) = effective_addresses(&regs, &inst(&[0xB9, 0x05, 0x00, 0x12]));
        assert!(shape.real_second);
        assert_eq!(ops.second, Some(OperandAddr { addr: 0x2_0000, reg: 2 }));
    }

    #[test]
    fn test_address_wraps_to_mode() {
        let mut regs = regs(ArchMode::Esa390, AddressingMode::Bit24);
        regs.gr[1] = 0x00FF_FFFF;
        let (_, ops) = effective_addresses(&regs, &inst(&[0x58, 0x00, 0x10, 0x02]));
        assert_eq!(ops.first, Some(OperandAddr { addr: 0x01, reg: 1 }));
    }
}
