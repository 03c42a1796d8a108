//! Disposable register snapshots
//!
//! Address translation updates the DAT shadow state, the translation
//! exception address and the TLB of the context it runs on. Inspection
//! must never disturb a live processor, so every translation runs on a
//! snapshot that is taken for the call and dropped afterwards.

use super::{CpuRegs, SieHost, Tlb};
use crate::core::mm::dat::{self, AccessSpace, AccessType, TranslationFault, Translated};
use crate::core::mm::VirtAddr;
use crate::{Error, Result};
use alloc::alloc::Layout;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// Working copy of a processor context
///
/// Holds exactly one context; a guest's host context travels with it
/// and is reset the same way.
#[derive(Debug)]
pub struct RegsSnapshot {
    slot: Vec<CpuRegs>,
}

impl RegsSnapshot {
    /// Copy `live` into a fresh snapshot with its TLBs cleared
    pub fn take(live: &CpuRegs) -> Result<Self> {
        let mut slot = Vec::new();
        let regs = match slot.try_reserve_exact(1) {
            Ok(()) => copy_regs(live),
            Err(_) => Err(Error::OutOfMemory),
        };
        let regs = regs.map_err(|err| {
            log::error!(
                "CPU{:04X}: unable to allocate register snapshot ({} bytes)",
                live.cpuad,
                core::mem::size_of::<CpuRegs>() * if live.sie_mode() { 2 } else { 1 }
            );
            err
        })?;
        slot.push(regs);

        log::trace!("CPU{:04X}: register snapshot taken", live.cpuad);
        Ok(Self { slot })
    }

    /// Translate a virtual address on this snapshot
    ///
    /// Instruction fetches always use the instruction space. On failure
    /// the exception is recorded in the guest's and, when nested, the
    /// host's DAT state before it is returned.
    pub fn translate(
        &mut self,
        vaddr: VirtAddr,
        space: AccessSpace,
        acctype: AccessType,
    ) -> core::result::Result<Translated, TranslationFault> {
        let space = match acctype {
            AccessType::InstFetch => AccessSpace::Instruction,
            _ => space,
        };

        let result = dat::translate(&self.slot[0], vaddr, space, acctype);
        let regs = &mut self.slot[0];

        match result {
            Ok(done) => {
                regs.dat.raddr = done.raddr;
                regs.dat.stid = done.stid;
                regs.dat.xcode = None;
                regs.tlb.insert(vaddr, done.raddr, done.stid);

                if let Some(storage) = regs.abs_storage() {
                    if let Ok(aaddr) = regs.real_to_abs(done.raddr) {
                        storage.mark_referenced(aaddr);
                        if acctype == AccessType::Write {
                            storage.mark_changed(aaddr);
                        }
                    }
                }
                if let Some(link) = regs.sie.as_deref_mut() {
                    link.host.dat.raddr = done.raddr;
                }
                Ok(done)
            }
            Err(fault) => {
                regs.dat.stid = fault.stid;
                regs.dat.xcode = Some(fault.code);
                regs.dat.tea = vaddr;
                if let Some(link) = regs.sie.as_deref_mut() {
                    link.host.dat.stid = fault.stid;
                    link.host.dat.xcode = Some(fault.code);
                    link.host.dat.tea = vaddr;
                }
                log::debug!(
                    "CPU{:04X}: translation of {:X} failed: {}",
                    regs.cpuad,
                    vaddr,
                    fault.code
                );
                Err(fault)
            }
        }
    }
}

/// Copy of `regs` with an empty TLB and no host link
fn detached(regs: &CpuRegs) -> CpuRegs {
    CpuRegs {
        arch: regs.arch,
        cpuad: regs.cpuad,
        ptype: regs.ptype,
        psw: regs.psw,
        gr: regs.gr,
        cr: regs.cr,
        ar: regs.ar,
        fpr: regs.fpr,
        fpc: regs.fpc,
        vr: regs.vr,
        prefix: regs.prefix,
        mainlim: regs.mainlim,
        storage: regs.storage.clone(),
        inst_trace: regs.inst_trace,
        dat: regs.dat,
        tlb: Tlb::default(),
        sie: None,
    }
}

/// Copy `live`, allocating a guest's host link fallibly
fn copy_regs(live: &CpuRegs) -> Result<CpuRegs> {
    let mut regs = detached(live);
    if let Some(link) = live.sie.as_deref() {
        let host = SieHost { host: detached(&link.host), origin: link.origin };
        regs.sie = Some(try_box(host)?);
    }
    Ok(regs)
}

fn try_box<T>(value: T) -> Result<Box<T>> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }
    // SAFETY: layout has non-zero size; a non-null block from the global
    // allocator with T's layout may be written once and owned by a Box.
    unsafe {
        let ptr = alloc::alloc::alloc(layout) as *mut T;
        if ptr.is_null() {
            return Err(Error::OutOfMemory);
        }
        ptr.write(value);
        Ok(Box::from_raw(ptr))
    }
}

impl Deref for RegsSnapshot {
    type Target = CpuRegs;

    fn deref(&self) -> &CpuRegs {
        &self.slot[0]
    }
}

impl DerefMut for RegsSnapshot {
    fn deref_mut(&mut self) -> &mut CpuRegs {
        &mut self.slot[0]
    }
}

impl Drop for RegsSnapshot {
    fn drop(&mut self) {
        log::trace!("CPU{:04X}: register snapshot released", self.slot[0].cpuad);
    }
}

/// Translate `vaddr` for `live` without disturbing it
///
/// Takes a snapshot, translates on it and drops it on every path.
pub fn virt_to_real(
    live: &CpuRegs,
    vaddr: VirtAddr,
    space: AccessSpace,
    acctype: AccessType,
) -> Result<core::result::Result<Translated, TranslationFault>> {
    let mut snap = RegsSnapshot::take(live)?;
    Ok(snap.translate(vaddr, space, acctype))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mm::dat::SpaceId;
    use crate::core::pgm::ProgramInterrupt;
    use crate::testutil::Fixture;

    #[test]
    fn test_snapshot_clears_tlb_and_leaves_live_untouched() {
        let mut fx = Fixture::esa390();
        fx.regs.tlb.insert(0x5000, 0x9000, SpaceId::Primary);
        let before = fx.regs.dat;

        let mut snap = RegsSnapshot::take(&fx.regs).unwrap();
        assert!(snap.tlb.is_empty());
        let done = snap.translate(0x0040_1010, AccessSpace::Primary, AccessType::Read).unwrap();
        assert_eq!(done.raddr, Fixture::FRAME_A + 0x10);
        assert_eq!(snap.dat.raddr, done.raddr);
        assert!(!snap.tlb.is_empty());
        drop(snap);

        assert_eq!(fx.regs.dat, before);
        assert_eq!(fx.regs.tlb.lookup(0x5000, SpaceId::Primary), Some(0x9000));
    }

    #[test]
    fn test_translation_sets_reference_bit() {
        let fx = Fixture::esa390();
        let storage = fx.storage.clone();
        assert_eq!(storage.get_key(Fixture::FRAME_A) & 0x04, 0);

        let done = virt_to_real(&fx.regs, 0x0040_1000, AccessSpace::Primary, AccessType::Diagnostic)
            .unwrap()
            .unwrap();
        assert_eq!(done.stid, SpaceId::Primary);
        assert_eq!(storage.get_key(Fixture::FRAME_A) & 0x04, 0x04);
        assert_eq!(storage.get_key(Fixture::FRAME_A) & 0x02, 0);
    }

    #[test]
    fn test_write_sets_change_bit() {
        let fx = Fixture::esa390();
        virt_to_real(&fx.regs, 0x0040_1000, AccessSpace::Primary, AccessType::Write)
            .unwrap()
            .unwrap();
        assert_eq!(fx.storage.get_key(Fixture::FRAME_A) & 0x06, 0x06);
    }

    #[test]
    fn test_fault_recorded_in_snapshot_only() {
        let fx = Fixture::esa390();
        let mut snap = RegsSnapshot::take(&fx.regs).unwrap();
        let fault = snap
            .translate(Fixture::UNMAPPED_PAGE, AccessSpace::Primary, AccessType::Read)
            .unwrap_err();
        assert_eq!(fault.code, ProgramInterrupt::PAGE_TRANSLATION);
        assert_eq!(snap.dat.xcode, Some(ProgramInterrupt::PAGE_TRANSLATION));
        assert_eq!(snap.dat.tea, Fixture::UNMAPPED_PAGE);
        drop(snap);
        assert_eq!(fx.regs.dat.xcode, None);
    }

    #[test]
    fn test_guest_fault_propagates_to_host_copy() {
        let fx = Fixture::esa390_guest();
        let mut snap = RegsSnapshot::take(&fx.regs).unwrap();
        let fault = snap
            .translate(Fixture::UNMAPPED_PAGE, AccessSpace::Primary, AccessType::Read)
            .unwrap_err();
        let host = snap.host().unwrap();
        assert_eq!(host.dat.xcode, Some(fault.code));
        assert!(host.tlb.is_empty());
    }

    #[test]
    fn test_guest_snapshot_owns_its_host_link() {
        let mut fx = Fixture::esa390_guest();
        if let Some(link) = fx.regs.sie.as_deref_mut() {
            link.host.tlb.insert(0x5000, 0x9000, SpaceId::Primary);
        }
        fx.regs.tlb.insert(0x6000, 0xA000, SpaceId::Primary);

        let snap = RegsSnapshot::take(&fx.regs).unwrap();
        let link = snap.sie.as_deref().unwrap();
        assert_eq!(link.origin, Fixture::GUEST_ORIGIN);
        assert_eq!(link.host.mainlim, fx.regs.host().unwrap().mainlim);
        assert!(link.host.sie.is_none());
        assert!(link.host.tlb.is_empty());
        assert!(snap.tlb.is_empty());
        assert_eq!(snap.abs_to_storage(0x100), Ok(Fixture::GUEST_ORIGIN + 0x100));
        drop(snap);

        let host = fx.regs.host().unwrap();
        assert_eq!(host.tlb.lookup(0x5000, SpaceId::Primary), Some(0x9000));
    }

    #[test]
    fn test_instruction_fetch_uses_instruction_space() {
        let mut fx = Fixture::esa390();
        fx.regs.psw.asc = crate::core::cpu::AscMode::Home;
        let done = virt_to_real(&fx.regs, 0x0040_1000, AccessSpace::Secondary, AccessType::InstFetch)
            .unwrap()
            .unwrap();
        assert_eq!(done.stid, SpaceId::Home);
    }
}
