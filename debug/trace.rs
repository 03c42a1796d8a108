//! Instruction trace records
//!
//! When instruction tracing goes to a trace file, the instruction
//! display hands structured records to a [`TraceSink`] instead of
//! formatting operator messages. [`TraceLog`] is an in-memory sink
//! that keeps the most recent records.

use crate::core::cpu::CpuRegs;
use crate::core::pgm::ProgramInterrupt;
use alloc::collections::VecDeque;

/// Default number of records kept by a [`TraceLog`]
pub const DEFAULT_TRACE_RECORDS: usize = 1024;

/// Storage at one instruction operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandTrace {
    /// Operand address as computed from the instruction
    pub vaddr: u64,
    /// Register that selected the address space
    pub reg: u8,
    /// Real address, when translation succeeded
    pub raddr: Option<u64>,
    /// Translation or addressing exception
    pub xcode: Option<ProgramInterrupt>,
    /// Up to 16 bytes of operand storage, stopping at the page end
    pub data: heapless::Vec<u8, 16>,
}

/// Trace record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceRecordType {
    /// No storage configured
    StorageUnavailable,
    /// Instruction could not be fetched
    FetchError,
    /// PSW and instruction bytes
    Instruction,
    /// Operand storage
    Operands,
    /// General registers
    GeneralRegs,
    /// Control registers
    ControlRegs,
    /// Access registers
    AccessRegs,
    /// Floating-point control register
    FloatControl,
    /// Floating-point registers
    FloatRegs,
    /// Vector registers
    VectorRegs,
}

/// Trace record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    StorageUnavailable { cpuad: u16 },
    FetchError { cpuad: u16, gr: [u64; 16] },
    Instruction { cpuad: u16, psw: heapless::Vec<u8, 16>, inst: heapless::Vec<u8, 6> },
    Operands { cpuad: u16, first: Option<OperandTrace>, second: Option<OperandTrace> },
    GeneralRegs { cpuad: u16, gr: [u64; 16] },
    ControlRegs { cpuad: u16, cr: [u64; 16] },
    AccessRegs { cpuad: u16, ar: [u32; 16] },
    FloatControl { cpuad: u16, fpc: u32 },
    FloatRegs { cpuad: u16, fpr: [u64; 16], afp: bool },
    VectorRegs { cpuad: u16, vr: [u128; 32] },
}

impl TraceRecord {
    /// Record type
    pub fn record_type(&self) -> TraceRecordType {
        match self {
            TraceRecord::StorageUnavailable { .. } => TraceRecordType::StorageUnavailable,
            TraceRecord::FetchError { .. } => TraceRecordType::FetchError,
            TraceRecord::Instruction { .. } => TraceRecordType::Instruction,
            TraceRecord::Operands { .. } => TraceRecordType::Operands,
            TraceRecord::GeneralRegs { .. } => TraceRecordType::GeneralRegs,
            TraceRecord::ControlRegs { .. } => TraceRecordType::ControlRegs,
            TraceRecord::AccessRegs { .. } => TraceRecordType::AccessRegs,
            TraceRecord::FloatControl { .. } => TraceRecordType::FloatControl,
            TraceRecord::FloatRegs { .. } => TraceRecordType::FloatRegs,
            TraceRecord::VectorRegs { .. } => TraceRecordType::VectorRegs,
        }
    }

    /// Get the CPU address the record belongs to
    pub fn get_cpuad(&self) -> u16 {
        match *self {
            TraceRecord::StorageUnavailable { cpuad }
            | TraceRecord::FetchError { cpuad, .. }
            | TraceRecord::Instruction { cpuad, .. }
            | TraceRecord::Operands { cpuad, .. }
            | TraceRecord::GeneralRegs { cpuad, .. }
            | TraceRecord::ControlRegs { cpuad, .. }
            | TraceRecord::AccessRegs { cpuad, .. }
            | TraceRecord::FloatControl { cpuad, .. }
            | TraceRecord::FloatRegs { cpuad, .. }
            | TraceRecord::VectorRegs { cpuad, .. } => cpuad,
        }
    }
}

/// Destination for instruction trace records
pub trait TraceSink {
    fn storage_unavailable(&mut self, regs: &CpuRegs);
    fn fetch_error(&mut self, regs: &CpuRegs);
    fn instruction(&mut self, regs: &CpuRegs, psw: &[u8], inst: &[u8]);
    fn operands(&mut self, regs: &CpuRegs, first: Option<OperandTrace>, second: Option<OperandTrace>);
    fn gregs(&mut self, regs: &CpuRegs);
    fn cregs(&mut self, regs: &CpuRegs);
    fn aregs(&mut self, regs: &CpuRegs);
    fn fpc(&mut self, regs: &CpuRegs);
    fn fregs(&mut self, regs: &CpuRegs);
    fn vregs(&mut self, regs: &CpuRegs);
}

/// In-memory trace buffer keeping the most recent records
#[derive(Debug, Clone)]
pub struct TraceLog {
    records: VecDeque<TraceRecord>,
    capacity: usize,
    dropped: u64,
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_RECORDS)
    }
}

impl TraceLog {
    /// Create a trace buffer holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self { records: VecDeque::new(), capacity: capacity.max(1), dropped: 0 }
    }

    fn push(&mut self, record: TraceRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    /// Records in arrival order
    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Number of buffered records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records discarded because the buffer was full
    pub fn get_dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

fn truncate<const N: usize>(bytes: &[u8]) -> heapless::Vec<u8, N> {
    heapless::Vec::from_slice(&bytes[..bytes.len().min(N)]).unwrap_or_default()
}

impl TraceSink for TraceLog {
    fn storage_unavailable(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::StorageUnavailable { cpuad: regs.cpuad });
    }

    fn fetch_error(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::FetchError { cpuad: regs.cpuad, gr: regs.gr });
    }

    fn instruction(&mut self, regs: &CpuRegs, psw: &[u8], inst: &[u8]) {
        self.push(TraceRecord::Instruction {
            cpuad: regs.cpuad,
            psw: truncate(psw),
            inst: truncate(inst),
        });
    }

    fn operands(&mut self, regs: &CpuRegs, first: Option<OperandTrace>, second: Option<OperandTrace>) {
        self.push(TraceRecord::Operands { cpuad: regs.cpuad, first, second });
    }

    fn gregs(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::GeneralRegs { cpuad: regs.cpuad, gr: regs.gr });
    }

    fn cregs(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::ControlRegs { cpuad: regs.cpuad, cr: regs.cr });
    }

    fn aregs(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::AccessRegs { cpuad: regs.cpuad, ar: regs.ar });
    }

    fn fpc(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::FloatControl { cpuad: regs.cpuad, fpc: regs.fpc });
    }

    fn fregs(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::FloatRegs { cpuad: regs.cpuad, fpr: regs.fpr, afp: regs.afp() });
    }

    fn vregs(&mut self, regs: &CpuRegs) {
        self.push(TraceRecord::VectorRegs { cpuad: regs.cpuad, vr: regs.vr });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchMode;

    #[test]
    fn test_log_keeps_most_recent() {
        let mut regs = CpuRegs::new(ArchMode::Esa390, None);
        let mut log = TraceLog::new(2);
        for cpuad in 0..3 {
            regs.cpuad = cpuad;
            log.storage_unavailable(&regs);
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.get_dropped(), 1);
        let cpus: alloc::vec::Vec<u16> = log.records().map(TraceRecord::get_cpuad).collect();
        assert_eq!(cpus, [1, 2]);
    }

    #[test]
    fn test_instruction_record() {
        let regs = CpuRegs::new(ArchMode::Zarch, None);
        let mut log = TraceLog::default();
        log.instruction(&regs, &[0u8; 16], &[0x58, 0x10, 0x20, 0x00]);
        let record = log.records().next().unwrap();
        assert_eq!(record.record_type(), TraceRecordType::Instruction);
        match record {
            TraceRecord::Instruction { psw, inst, .. } => {
                assert_eq!(psw.len(), 16);
                assert_eq!(&inst[..], &[0x58, 0x10, 0x20, 0x00]);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_float_record_carries_afp() {
        let mut regs = CpuRegs::new(ArchMode::Zarch, None);
        regs.cr[0] = crate::core::cpu::CR0_AFP;
        let mut log = TraceLog::default();
        log.fregs(&regs);
        assert!(matches!(log.records().next(), Some(TraceRecord::FloatRegs { afp: true, .. })));
        log.clear();
        assert!(log.is_empty());
    }
}
