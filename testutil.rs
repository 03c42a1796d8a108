//! Shared test fixture: storage with hand-built translation tables
//!
//! Every fixture maps the same virtual layout in the primary,
//! secondary and home spaces:
//!
//! | virtual        | real                    |
//! |----------------|-------------------------|
//! | `0x0040_1000`  | `FRAME_A`               |
//! | `0x0040_2000`  | `FRAME_B`               |
//! | `0x0040_3000`  | page invalid            |
//! | `0x0040_4000`  | frame beyond storage    |
//! | `0x0050_0000`  | segment invalid         |
//!
//! The z/Architecture fixture also maps `0x0060_0000` as a 1M frame at 0.

use crate::arch::{AddressingMode, ArchMode};
use crate::core::cpu::{CpuRegs, SysMask};
use crate::core::mm::storage::MainStorage;
use alloc::sync::Arc;

pub struct Fixture {
    pub storage: Arc<MainStorage>,
    pub regs: CpuRegs,
}

impl Fixture {
    pub const SIZE: usize = 0x10_0000;
    pub const FRAME_A: u64 = 0x2_0000;
    pub const FRAME_B: u64 = 0x2_1000;
    pub const BEYOND: u64 = 0x20_0000;
    pub const MAPPED_PAGE: u64 = 0x0040_1000;
    pub const UNMAPPED_PAGE: u64 = 0x0040_3000;
    pub const BEYOND_PAGE: u64 = 0x0040_4000;
    pub const UNMAPPED_SEGMENT: u64 = 0x0050_0000;
    pub const SEGMENT_TABLE: u64 = 0x8000;
    pub const PAGE_TABLE: u64 = 0x9000;
    pub const ZARCH_SEGMENT_TABLE: u64 = 0xA000;
    pub const ZARCH_PAGE_TABLE: u64 = 0xB000;
    pub const GUEST_ORIGIN: u64 = 0x4_0000;

    fn regs(arch: ArchMode, storage: &Arc<MainStorage>, amode: AddressingMode) -> CpuRegs {
        let mut regs = CpuRegs::new(arch, Some(storage.clone()));
        regs.psw.sysmask = SysMask::DAT | SysMask::IO | SysMask::EXT;
        regs.psw.amode = amode;
        regs
    }

    fn storage() -> Arc<MainStorage> {
        Arc::new(MainStorage::new(Self::SIZE).unwrap())
    }

    fn put_fw(storage: &MainStorage, addr: u64, value: u32) {
        storage.write(addr, &value.to_be_bytes()).unwrap();
    }

    fn put_dw(storage: &MainStorage, addr: u64, value: u64) {
        storage.write(addr, &value.to_be_bytes()).unwrap();
    }

    /// ESA/390 segment and page table at `base + SEGMENT_TABLE/PAGE_TABLE`
    fn esa390_tables(storage: &MainStorage, base: u64) {
        for sx in 0..16 {
            Self::put_fw(storage, base + Self::SEGMENT_TABLE + sx * 4, 0x20);
        }
        Self::put_fw(storage, base + Self::SEGMENT_TABLE + 4 * 4, Self::PAGE_TABLE as u32);

        for px in 0..16 {
            Self::put_fw(storage, base + Self::PAGE_TABLE + px * 4, 0x400);
        }
        Self::put_fw(storage, base + Self::PAGE_TABLE + 4, Self::FRAME_A as u32);
        Self::put_fw(storage, base + Self::PAGE_TABLE + 8, Self::FRAME_B as u32);
        Self::put_fw(storage, base + Self::PAGE_TABLE + 16, Self::BEYOND as u32);
    }

    fn set_designations(regs: &mut CpuRegs, designation: u64) {
        regs.cr[1] = designation;
        regs.cr[7] = designation;
        regs.cr[13] = designation;
    }

    pub fn esa390() -> Self {
        let storage = Self::storage();
        Self::esa390_tables(&storage, 0);

        let mut regs = Self::regs(ArchMode::Esa390, &storage, AddressingMode::Bit31);
        Self::set_designations(&mut regs, Self::SEGMENT_TABLE);
        Self { storage, regs }
    }

    pub fn zarch() -> Self {
        let storage = Self::storage();

        for sx in 0..512 {
            Self::put_dw(&storage, Self::ZARCH_SEGMENT_TABLE + sx * 8, 0x20);
        }
        Self::put_dw(&storage, Self::ZARCH_SEGMENT_TABLE + 4 * 8, Self::ZARCH_PAGE_TABLE);
        Self::put_dw(&storage, Self::ZARCH_SEGMENT_TABLE + 6 * 8, 0x400);

        for px in 0..256 {
            Self::put_dw(&storage, Self::ZARCH_PAGE_TABLE + px * 8, 0x400);
        }
        Self::put_dw(&storage, Self::ZARCH_PAGE_TABLE + 8, Self::FRAME_A);
        Self::put_dw(&storage, Self::ZARCH_PAGE_TABLE + 16, Self::FRAME_B);
        Self::put_dw(&storage, Self::ZARCH_PAGE_TABLE + 32, Self::BEYOND);

        let mut regs = Self::regs(ArchMode::Zarch, &storage, AddressingMode::Bit64);
        Self::set_designations(&mut regs, Self::ZARCH_SEGMENT_TABLE);
        Self { storage, regs }
    }

    pub fn s370() -> Self {
        let storage = Self::storage();

        for sx in 0..16 {
            Self::put_fw(&storage, Self::SEGMENT_TABLE + sx * 4, 0x01);
        }
        Self::put_fw(&storage, Self::SEGMENT_TABLE + 4 * 4, Self::PAGE_TABLE as u32);

        let pte = |frame: u64| (((frame >> 12) as u16) << 4).to_be_bytes();
        for px in 0..16 {
            storage.write(Self::PAGE_TABLE + px * 2, &0x0008u16.to_be_bytes()).unwrap();
        }
        storage.write(Self::PAGE_TABLE + 2, &pte(Self::FRAME_A)).unwrap();
        storage.write(Self::PAGE_TABLE + 4, &pte(Self::FRAME_B)).unwrap();

        let mut regs = Self::regs(ArchMode::S370, &storage, AddressingMode::Bit24);
        regs.cr[0] = 0x0090_0000;
        Self::set_designations(&mut regs, Self::SEGMENT_TABLE);
        Self { storage, regs }
    }

    /// ESA/390 guest whose storage is a window at `GUEST_ORIGIN` of a
    /// z/Architecture host's storage
    pub fn esa390_guest() -> Self {
        let storage = Self::storage();
        Self::esa390_tables(&storage, Self::GUEST_ORIGIN);

        let host = Self::regs(ArchMode::Zarch, &storage, AddressingMode::Bit64);
        let mut regs = Self::regs(ArchMode::Esa390, &storage, AddressingMode::Bit31);
        regs.mainlim = Self::SIZE as u64 - Self::GUEST_ORIGIN - 1;
        Self::set_designations(&mut regs, Self::SEGMENT_TABLE);
        regs.enter_sie(host, Self::GUEST_ORIGIN);
        Self { storage, regs }
    }

    /// Fill `len` bytes at absolute `addr` with an incrementing pattern
    pub fn pattern(&self, addr: u64, len: usize) {
        for i in 0..len {
            self.storage.store_byte(addr + i as u64, i as u8).unwrap();
        }
    }
}
