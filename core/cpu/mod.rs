//! Processor context
//!
//! This module provides the register context of one emulated processor
//! as seen by the inspection facilities:
//! - PSW, general, control, access, floating-point and vector registers
//! - prefix register and storage limit
//! - DAT shadow state and a small software TLB
//! - the optional host link of an interpretive-execution guest

pub mod psw;
pub mod snapshot;

pub use self::psw::{AscMode, Psw, PswFlags, SysMask};
pub use self::snapshot::RegsSnapshot;

use crate::arch::ArchMode;
use crate::core::mm::dat::SpaceId;
use crate::core::mm::storage::MainStorage;
use crate::core::mm::{self, AbsAddr, RealAddr, PAGE_SHIFT};
use crate::core::pgm::ProgramInterrupt;
use alloc::boxed::Box;
use alloc::sync::Arc;

/// Control register 0 AFP-register control bit
pub const CR0_AFP: u64 = 0x0004_0000;

/// Number of software TLB entries
pub const TLB_ENTRIES: usize = 16;

/// Processor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorType {
    /// General purpose processor
    #[default]
    Cp,
    /// Integrated facility for Linux
    Ifl,
    /// Application assist processor
    Zaap,
    /// Integrated information processor
    Ziip,
    /// Integrated coupling facility
    Icf,
}

impl ProcessorType {
    /// Two-letter tag shown in multi-processor displays
    pub const fn name(self) -> &'static str {
        match self {
            ProcessorType::Cp => "CP",
            ProcessorType::Ifl => "IL",
            ProcessorType::Zaap => "ZA",
            ProcessorType::Ziip => "ZI",
            ProcessorType::Icf => "CF",
        }
    }
}

/// Result of the most recent address translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatState {
    /// Real address produced by the last successful translation
    pub raddr: RealAddr,
    /// Address space that governed the last translation
    pub stid: SpaceId,
    /// Exception raised by the last translation, if any
    pub xcode: Option<ProgramInterrupt>,
    /// Translation-exception address
    pub tea: u64,
}

/// Software TLB entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    /// Virtual page address
    pub vpage: u64,
    /// Real page address
    pub rpage: u64,
    /// Address space the entry belongs to
    pub stid: SpaceId,
}

/// Direct-mapped software TLB
#[derive(Debug, Clone, Default)]
pub struct Tlb {
    entries: [Option<TlbEntry>; TLB_ENTRIES],
}

impl Tlb {
    fn slot(vaddr: u64) -> usize {
        (vaddr >> PAGE_SHIFT) as usize % TLB_ENTRIES
    }

    /// Look up the real address of `vaddr` in `stid`
    pub fn lookup(&self, vaddr: u64, stid: SpaceId) -> Option<RealAddr> {
        self.entries[Self::slot(vaddr)]
            .filter(|e| e.stid == stid && e.vpage == mm::align_down(vaddr))
            .map(|e| e.rpage | (vaddr & mm::PAGE_BYTEMASK))
    }

    /// Record a translation
    pub fn insert(&mut self, vaddr: u64, raddr: RealAddr, stid: SpaceId) {
        self.entries[Self::slot(vaddr)] = Some(TlbEntry {
            vpage: mm::align_down(vaddr),
            rpage: mm::align_down(raddr),
            stid,
        });
    }

    /// Invalidate all entries
    pub fn clear(&mut self) {
        self.entries = [None; TLB_ENTRIES];
    }

    /// True when no entry is valid
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }
}

/// Host side of an interpretive-execution guest
#[derive(Debug, Clone)]
pub struct SieHost {
    /// Host processor context
    pub host: CpuRegs,
    /// Origin of the guest's storage window in host absolute storage
    pub origin: AbsAddr,
}

/// Register context of one emulated processor
#[derive(Debug, Clone)]
pub struct CpuRegs {
    /// Architecture the processor runs in
    pub arch: ArchMode,
    /// CPU address
    pub cpuad: u16,
    /// Processor type
    pub ptype: ProcessorType,
    /// Current PSW
    pub psw: Psw,
    /// General registers
    pub gr: [u64; 16],
    /// Control registers
    pub cr: [u64; 16],
    /// Access registers
    pub ar: [u32; 16],
    /// Floating-point registers
    pub fpr: [u64; 16],
    /// Floating-point control register
    pub fpc: u32,
    /// Vector registers
    pub vr: [u128; 32],
    /// Prefix register
    pub prefix: u64,
    /// Highest valid absolute address (0 when no storage)
    pub mainlim: AbsAddr,
    /// Main storage shared by all processors
    pub storage: Option<Arc<MainStorage>>,
    /// Instruction tracing or stepping is active on this processor
    pub inst_trace: bool,
    /// DAT shadow state
    pub dat: DatState,
    /// Software TLB
    pub tlb: Tlb,
    /// Host link when running as an interpretive-execution guest
    pub sie: Option<Box<SieHost>>,
}

impl CpuRegs {
    /// Create a processor context attached to `storage`
    pub fn new(arch: ArchMode, storage: Option<Arc<MainStorage>>) -> Self {
        let mainlim = storage.as_ref().map_or(0, |s| s.limit());

        Self {
            arch,
            cpuad: 0,
            ptype: ProcessorType::Cp,
            psw: Psw::default(),
            gr: [0; 16],
            cr: [0; 16],
            ar: [0; 16],
            fpr: [0; 16],
            fpc: 0,
            vr: [0; 32],
            prefix: 0,
            mainlim,
            storage,
            inst_trace: false,
            dat: DatState::default(),
            tlb: Tlb::default(),
            sie: None,
        }
    }

    /// Run this context as a guest of `host` with its storage at `origin`
    pub fn enter_sie(&mut self, host: CpuRegs, origin: AbsAddr) {
        self.sie = Some(Box::new(SieHost { host, origin }));
    }

    /// True when running as an interpretive-execution guest
    pub fn sie_mode(&self) -> bool {
        self.sie.is_some()
    }

    /// Host context, if any
    pub fn host(&self) -> Option<&CpuRegs> {
        self.sie.as_deref().map(|link| &link.host)
    }

    /// True when storage is configured for this processor
    pub fn has_storage(&self) -> bool {
        self.mainlim != 0 && self.abs_storage().is_some()
    }

    /// Storage that absolute addresses returned by [`Self::real_to_abs`] index
    pub fn abs_storage(&self) -> Option<&MainStorage> {
        match &self.sie {
            Some(link) => link.host.storage.as_deref(),
            None => self.storage.as_deref(),
        }
    }

    /// Low 32 bits of a general register
    pub fn gr_l(&self, r: usize) -> u32 {
        self.gr[r & 0xF] as u32
    }

    /// Low 32 bits of a control register
    pub fn cr_l(&self, r: usize) -> u32 {
        self.cr[r & 0xF] as u32
    }

    /// Doubleword element of a vector register (element 0 leftmost)
    pub fn vr_d(&self, v: usize, elem: usize) -> u64 {
        (self.vr[v & 0x1F] >> (64 * (1 - (elem & 1)))) as u64
    }

    /// Fullword element of a vector register (element 0 leftmost)
    pub fn vr_f(&self, v: usize, elem: usize) -> u32 {
        (self.vr[v & 0x1F] >> (32 * (3 - (elem & 3)))) as u32
    }

    /// True when the AFP-register control is on
    pub fn afp(&self) -> bool {
        self.cr[0] & CR0_AFP != 0
    }

    /// Apply this processor's prefix to a real address
    pub fn apply_prefixing(&self, raddr: RealAddr) -> AbsAddr {
        mm::apply_prefixing(raddr, self.prefix, self.arch.prefix_mask())
    }

    /// Convert a real address to an absolute storage offset
    ///
    /// A guest's absolute address is relocated into its host window
    /// and checked against the host's limit.
    pub fn real_to_abs(&self, raddr: RealAddr) -> Result<AbsAddr, ProgramInterrupt> {
        self.abs_to_storage(self.apply_prefixing(raddr))
    }

    /// Highest valid offset in [`Self::abs_storage`] (0 when none)
    pub fn abs_limit(&self) -> AbsAddr {
        match &self.sie {
            Some(link) => link.host.mainlim,
            None => self.mainlim,
        }
    }

    /// Convert an absolute address to an offset in [`Self::abs_storage`]
    pub fn abs_to_storage(&self, aaddr: AbsAddr) -> Result<AbsAddr, ProgramInterrupt> {
        let (aaddr, limit) = match &self.sie {
            Some(link) => (
                aaddr.checked_add(link.origin).ok_or(ProgramInterrupt::ADDRESSING)?,
                link.host.mainlim,
            ),
            None => (aaddr, self.mainlim),
        };

        if limit == 0 || aaddr > limit {
            return Err(ProgramInterrupt::ADDRESSING);
        }

        Ok(aaddr)
    }
}
