//! Dynamic address translation
//!
//! This module walks the translation tables of all three architectures:
//! - address-space selection from the access selector and PSW ASC mode
//! - access-register translation (ART) for AR mode
//! - S/370 segment/page tables (4K pages, 1M segments)
//! - ESA/390 segment/page tables
//! - z/Architecture region, segment and page tables, including
//!   1M frames selected by the segment-table format control
//!
//! Table entries live at real addresses and are fetched through the
//! context's prefixing and storage limit. The walk itself is free of
//! side effects; recording the result is the caller's job.

use super::{AbsAddr, RealAddr, VirtAddr};
use crate::arch::ArchMode;
use crate::core::cpu::{AscMode, CpuRegs};
use crate::core::pgm::ProgramInterrupt;

/// Which address space a translation is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSpace {
    /// Address is already real
    Real,
    /// Primary space
    Primary,
    /// Secondary space
    Secondary,
    /// Home space
    Home,
    /// Space instructions are fetched from
    Instruction,
    /// Space selected by the PSW, using access register `n` in AR mode
    Register(u8),
}

/// Kind of access the translation is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch
    InstFetch,
    /// Operand fetch
    Read,
    /// Operand store
    Write,
    /// Diagnose or operator access
    Diagnostic,
    /// Hardware or trace access
    Hardware,
}

/// Address space that produced a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceId {
    /// No translation was performed
    #[default]
    Real,
    /// Primary space
    Primary,
    /// Secondary space
    Secondary,
    /// Home space
    Home,
    /// Space selected through access register `n`
    AccessRegister(u8),
}

/// Successful translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translated {
    /// Real address
    pub raddr: RealAddr,
    /// Space that governed the translation
    pub stid: SpaceId,
}

/// Failed translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationFault {
    /// Program interruption the hardware would present
    pub code: ProgramInterrupt,
    /// Space that was being used
    pub stid: SpaceId,
}

/// ESA/390 segment-table designation fields
mod std390 {
    pub const STO: u32 = 0x7FFF_F000;
    pub const STL: u32 = 0x0000_007F;
}

/// ESA/390 segment/page table entry fields
mod ent390 {
    pub const STE_INVALID: u32 = 0x0000_0020;
    pub const STE_PTO: u32 = 0x7FFF_FFC0;
    pub const STE_PTL: u32 = 0x0000_000F;
    pub const PTE_INVALID: u32 = 0x0000_0400;
    pub const PTE_PFRA: u32 = 0x7FFF_F000;
}

/// S/370 table fields (4K pages, 1M segments)
mod ent370 {
    pub const CR0_PAGE_SIZE: u32 = 0x00C0_0000;
    pub const CR0_PAGE_4K: u32 = 0x0080_0000;
    pub const CR0_SEG_SIZE: u32 = 0x0018_0000;
    pub const CR0_SEG_1M: u32 = 0x0010_0000;
    pub const STD_STL: u32 = 0xFF00_0000;
    pub const STD_STO: u32 = 0x00FF_FFC0;
    pub const STE_PTL: u32 = 0xF000_0000;
    pub const STE_PTO: u32 = 0x00FF_FFF8;
    pub const STE_INVALID: u32 = 0x0000_0001;
    pub const PTE_PFRA: u16 = 0xFFF0;
    pub const PTE_INVALID: u16 = 0x0008;
}

/// z/Architecture ASCE and table entry fields
mod entz {
    pub const ASCE_ORIGIN: u64 = !0xFFF;
    pub const ASCE_R: u64 = 0x20;
    pub const ASCE_DT: u64 = 0x0C;
    pub const ASCE_TL: u64 = 0x03;
    pub const RTE_ORIGIN: u64 = !0xFFF;
    pub const RTE_TF: u64 = 0xC0;
    pub const RTE_INVALID: u64 = 0x20;
    pub const RTE_TT: u64 = 0x0C;
    pub const RTE_TL: u64 = 0x03;
    pub const STE_PTO: u64 = !0x7FF;
    pub const STE_FC: u64 = 0x400;
    pub const STE_INVALID: u64 = 0x20;
    pub const STE_TT: u64 = 0x0C;
    pub const STE_SFAA: u64 = !0xF_FFFF;
    pub const PTE_PFRA: u64 = !0xFFF;
    pub const PTE_INVALID: u64 = 0x400;
}

/// ART table offsets and fields (identical for ESA/390 and z)
mod art {
    pub const ALET_RESERVED: u32 = 0xFE00_0000;
    pub const ALET_PRIMARY_LIST: u32 = 0x0100_0000;
    pub const ORIGIN_64: u32 = 0x7FFF_FFC0;
    pub const ALD_ORIGIN: u32 = 0x7FFF_FF80;
    pub const ALD_LENGTH: u32 = 0x0000_007F;
    pub const DUCT_DUALD: u64 = 16;
    pub const ASTE_DESIGNATION: u64 = 8;
    pub const ASTE_ALD: u64 = 16;
    pub const ASTE_ASTESN: u64 = 20;
    pub const ALE_INVALID: u32 = 0x8000_0000;
    pub const ALE_ASTESN: u64 = 12;
    pub const ALE_ASTEO: u64 = 8;
    pub const ASTE_INVALID: u32 = 0x8000_0000;
}

/// Table reader bound to one context's prefixing and storage limit
struct Tables<'a> {
    regs: &'a CpuRegs,
}

impl Tables<'_> {
    fn abs(&self, raddr: RealAddr) -> Result<AbsAddr, ProgramInterrupt> {
        self.regs.real_to_abs(raddr)
    }

    fn hw(&self, raddr: RealAddr) -> Result<u16, ProgramInterrupt> {
        let aaddr = self.abs(raddr)?;
        self.regs
            .abs_storage()
            .and_then(|s| s.fetch_hw(aaddr).ok())
            .ok_or(ProgramInterrupt::ADDRESSING)
    }

    fn fw(&self, raddr: RealAddr) -> Result<u32, ProgramInterrupt> {
        let aaddr = self.abs(raddr)?;
        self.regs
            .abs_storage()
            .and_then(|s| s.fetch_fw(aaddr).ok())
            .ok_or(ProgramInterrupt::ADDRESSING)
    }

    fn dw(&self, raddr: RealAddr) -> Result<u64, ProgramInterrupt> {
        let aaddr = self.abs(raddr)?;
        self.regs
            .abs_storage()
            .and_then(|s| s.fetch_dw(aaddr).ok())
            .ok_or(ProgramInterrupt::ADDRESSING)
    }
}

/// Translate `vaddr` on `regs`
///
/// DAT off or an explicit real access yields the address unchanged.
/// A hit in the context's TLB is returned without walking the tables.
pub fn translate(
    regs: &CpuRegs,
    vaddr: VirtAddr,
    space: AccessSpace,
    acctype: AccessType,
) -> Result<Translated, TranslationFault> {
    let (stid, designation) = select_space(regs, space)?;

    if stid == SpaceId::Real {
        return Ok(Translated { raddr: vaddr, stid });
    }

    if let Some(raddr) = regs.tlb.lookup(vaddr, stid) {
        log::trace!("TLB hit {:X} -> {:X}", vaddr, raddr);
        return Ok(Translated { raddr, stid });
    }

    let tables = Tables { regs };
    let walk = match regs.arch {
        ArchMode::S370 => walk_s370(&tables, vaddr, designation as u32),
        ArchMode::Esa390 => walk_esa390(&tables, vaddr, designation as u32),
        ArchMode::Zarch => walk_zarch(&tables, vaddr, designation),
    };

    match walk {
        Ok(raddr) => {
            log::trace!("{:?} {:?} {:X} -> {:X}", acctype, stid, vaddr, raddr);
            Ok(Translated { raddr, stid })
        }
        Err(code) => Err(TranslationFault { code, stid }),
    }
}

/// Pick the space and its designation (STD or ASCE)
fn select_space(regs: &CpuRegs, space: AccessSpace) -> Result<(SpaceId, u64), TranslationFault> {
    if space == AccessSpace::Real || regs.psw.real_mode() {
        return Ok((SpaceId::Real, 0));
    }

    let primary = (SpaceId::Primary, regs.cr[1]);
    let secondary = (SpaceId::Secondary, regs.cr[7]);
    let home = (SpaceId::Home, regs.cr[13]);

    let selected = match space {
        AccessSpace::Real => (SpaceId::Real, 0),
        AccessSpace::Primary => primary,
        AccessSpace::Secondary => secondary,
        AccessSpace::Home => home,
        AccessSpace::Instruction => match regs.psw.asc {
            AscMode::Home => home,
            _ => primary,
        },
        AccessSpace::Register(arn) => match regs.psw.asc {
            AscMode::Primary => primary,
            AscMode::Secondary => secondary,
            AscMode::Home => home,
            AscMode::AccessRegister if regs.arch == ArchMode::S370 => primary,
            AscMode::AccessRegister => {
                let tables = Tables { regs };
                access_register(&tables, arn & 0xF).map_err(|code| TranslationFault {
                    code,
                    stid: SpaceId::AccessRegister(arn & 0xF),
                })?
            }
        },
    };

    Ok(selected)
}

/// Access-register translation
fn access_register(t: &Tables<'_>, arn: u8) -> Result<(SpaceId, u64), ProgramInterrupt> {
    let regs = t.regs;

    // access register 0 is treated as containing zero
    let alet = if arn == 0 { 0 } else { regs.ar[arn as usize] };

    match alet {
        0 => return Ok((SpaceId::Primary, regs.cr[1])),
        1 => return Ok((SpaceId::Secondary, regs.cr[7])),
        _ => {}
    }

    if alet & art::ALET_RESERVED != 0 {
        return Err(ProgramInterrupt::ALET_SPECIFICATION);
    }

    let alesn = (alet >> 16) & 0xFF;
    let alen = alet & 0xFFFF;

    // access-list designation from the PASTE or the DUCT
    let ald = if alet & art::ALET_PRIMARY_LIST != 0 {
        let pasteo = (regs.cr[5] as u32 & art::ORIGIN_64) as u64;
        t.fw(pasteo + art::ASTE_ALD)?
    } else {
        let ducto = (regs.cr[2] as u32 & art::ORIGIN_64) as u64;
        t.fw(ducto + art::DUCT_DUALD)?
    };

    // eight 16-byte entries per unit of access-list length
    if alen >> 3 > ald & art::ALD_LENGTH {
        return Err(ProgramInterrupt::ALEN_TRANSLATION);
    }

    let ale = (ald & art::ALD_ORIGIN) as u64 + alen as u64 * 16;
    let word0 = t.fw(ale)?;
    if word0 & art::ALE_INVALID != 0 {
        return Err(ProgramInterrupt::ALEN_TRANSLATION);
    }
    if (word0 >> 16) & 0xFF != alesn {
        return Err(ProgramInterrupt::ALE_SEQUENCE);
    }

    let asteo = (t.fw(ale + art::ALE_ASTEO)? & art::ORIGIN_64) as u64;
    let astesn = t.fw(ale + art::ALE_ASTESN)?;

    if t.fw(asteo)? & art::ASTE_INVALID != 0 {
        return Err(ProgramInterrupt::ASTE_VALIDITY);
    }
    if t.fw(asteo + art::ASTE_ASTESN)? != astesn {
        return Err(ProgramInterrupt::ASTE_SEQUENCE);
    }

    let designation = match regs.arch {
        ArchMode::Zarch => t.dw(asteo + art::ASTE_DESIGNATION)?,
        _ => t.fw(asteo + art::ASTE_DESIGNATION)? as u64,
    };

    Ok((SpaceId::AccessRegister(arn), designation))
}

fn walk_s370(t: &Tables<'_>, vaddr: VirtAddr, std: u32) -> Result<RealAddr, ProgramInterrupt> {
    let cr0 = t.regs.cr[0] as u32;
    if cr0 & ent370::CR0_PAGE_SIZE != ent370::CR0_PAGE_4K
        || cr0 & ent370::CR0_SEG_SIZE != ent370::CR0_SEG_1M
    {
        return Err(ProgramInterrupt::TRANSLATION_SPECIFICATION);
    }

    let vaddr = vaddr & 0x00FF_FFFF;
    let sx = (vaddr >> 20) & 0xF;
    let stl = ((std & ent370::STD_STL) >> 24) as u64;
    if sx >> 4 > stl {
        return Err(ProgramInterrupt::SEGMENT_TRANSLATION);
    }

    let sto = (std & ent370::STD_STO) as u64;
    let ste = t.fw(sto + sx * 4)?;
    if ste & ent370::STE_INVALID != 0 {
        return Err(ProgramInterrupt::SEGMENT_TRANSLATION);
    }

    let px = (vaddr >> 12) & 0xFF;
    let ptl = ((ste & ent370::STE_PTL) >> 28) as u64;
    if px >> 4 > ptl {
        return Err(ProgramInterrupt::PAGE_TRANSLATION);
    }

    let pto = (ste & ent370::STE_PTO) as u64;
    let pte = t.hw(pto + px * 2)?;
    if pte & ent370::PTE_INVALID != 0 {
        return Err(ProgramInterrupt::PAGE_TRANSLATION);
    }

    Ok(((pte & ent370::PTE_PFRA) as u64) << 8 | (vaddr & 0xFFF))
}

fn walk_esa390(t: &Tables<'_>, vaddr: VirtAddr, std: u32) -> Result<RealAddr, ProgramInterrupt> {
    let vaddr = vaddr & 0x7FFF_FFFF;

    let sx = (vaddr >> 20) & 0x7FF;
    if sx >> 4 > (std & std390::STL) as u64 {
        return Err(ProgramInterrupt::SEGMENT_TRANSLATION);
    }

    let sto = (std & std390::STO) as u64;
    let ste = t.fw(sto + sx * 4)?;
    if ste & ent390::STE_INVALID != 0 {
        return Err(ProgramInterrupt::SEGMENT_TRANSLATION);
    }

    let px = (vaddr >> 12) & 0xFF;
    if px >> 4 > (ste & ent390::STE_PTL) as u64 {
        return Err(ProgramInterrupt::PAGE_TRANSLATION);
    }

    let pto = (ste & ent390::STE_PTO) as u64;
    let pte = t.fw(pto + px * 4)?;
    if pte & ent390::PTE_INVALID != 0 {
        return Err(ProgramInterrupt::PAGE_TRANSLATION);
    }

    Ok((pte & ent390::PTE_PFRA) as u64 | (vaddr & 0xFFF))
}

/// z/Architecture table levels, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    RegionFirst,
    RegionSecond,
    RegionThird,
    Segment,
}

impl Level {
    const fn from_dt(dt: u64) -> Self {
        match dt {
            3 => Level::RegionFirst,
            2 => Level::RegionSecond,
            1 => Level::RegionThird,
            _ => Level::Segment,
        }
    }

    /// Table-type field an entry of this level's table must carry
    const fn tt(self) -> u64 {
        match self {
            Level::RegionFirst => 3,
            Level::RegionSecond => 2,
            Level::RegionThird => 1,
            Level::Segment => 0,
        }
    }

    const fn shift(self) -> u32 {
        match self {
            Level::RegionFirst => 53,
            Level::RegionSecond => 42,
            Level::RegionThird => 31,
            Level::Segment => 20,
        }
    }

    const fn next(self) -> Self {
        match self {
            Level::RegionFirst => Level::RegionSecond,
            Level::RegionSecond => Level::RegionThird,
            _ => Level::Segment,
        }
    }

    const fn exception(self) -> ProgramInterrupt {
        match self {
            Level::RegionFirst => ProgramInterrupt::REGION_FIRST_TRANSLATION,
            Level::RegionSecond => ProgramInterrupt::REGION_SECOND_TRANSLATION,
            Level::RegionThird => ProgramInterrupt::REGION_THIRD_TRANSLATION,
            Level::Segment => ProgramInterrupt::SEGMENT_TRANSLATION,
        }
    }

    fn index(self, vaddr: VirtAddr) -> u64 {
        (vaddr >> self.shift()) & 0x7FF
    }
}

fn walk_zarch(t: &Tables<'_>, vaddr: VirtAddr, asce: u64) -> Result<RealAddr, ProgramInterrupt> {
    if asce & entz::ASCE_R != 0 {
        return Ok(vaddr);
    }

    let mut level = Level::from_dt((asce & entz::ASCE_DT) >> 2);

    // bits left of the top table's index must be zero
    if level != Level::RegionFirst && vaddr >> (level.shift() + 11) != 0 {
        return Err(ProgramInterrupt::ASCE_TYPE);
    }

    if level.index(vaddr) >> 9 > asce & entz::ASCE_TL {
        return Err(level.exception());
    }

    let mut origin = asce & entz::ASCE_ORIGIN;

    while level != Level::Segment {
        let rte = t.dw(origin.wrapping_add(level.index(vaddr) * 8))?;
        if rte & entz::RTE_INVALID != 0 {
            return Err(level.exception());
        }
        if (rte & entz::RTE_TT) >> 2 != level.tt() {
            return Err(ProgramInterrupt::TRANSLATION_SPECIFICATION);
        }

        let next = level.next();
        let nx = next.index(vaddr) >> 9;
        if nx < (rte & entz::RTE_TF) >> 6 || nx > rte & entz::RTE_TL {
            return Err(next.exception());
        }

        origin = rte & entz::RTE_ORIGIN;
        level = next;
    }

    let ste = t.dw(origin.wrapping_add(Level::Segment.index(vaddr) * 8))?;
    if ste & entz::STE_INVALID != 0 {
        return Err(ProgramInterrupt::SEGMENT_TRANSLATION);
    }
    if ste & entz::STE_TT != 0 {
        return Err(ProgramInterrupt::TRANSLATION_SPECIFICATION);
    }

    if ste & entz::STE_FC != 0 {
        return Ok((ste & entz::STE_SFAA) | (vaddr & 0xF_FFFF));
    }

    let px = (vaddr >> 12) & 0xFF;
    let pte = t.dw((ste & entz::STE_PTO).wrapping_add(px * 8))?;
    if pte & entz::PTE_INVALID != 0 {
        return Err(ProgramInterrupt::PAGE_TRANSLATION);
    }

    Ok((pte & entz::PTE_PFRA) | (vaddr & 0xFFF))
}
