//! Main storage and storage keys
//!
//! Main storage is shared by every processor and the operator thread.
//! Bytes and keys are atomics so that concurrent byte-granular access
//! is sound without a lock; no ordering beyond the single byte is
//! promised, the same as for storage alteration on live hardware.

use super::{frame_of, is_aligned, AbsAddr, AddressKind, PAGE_SIZE};
use crate::{Error, Result};
use alloc::boxed::Box;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU8, Ordering};

bitflags! {
    /// Storage key bits of one 4K frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StorageKey: u8 {
        /// Access-control bits
        const ACC = 0xF0;
        /// Fetch-protection bit
        const FETCH = 0x08;
        /// Reference bit
        const REF = 0x04;
        /// Change bit
        const CHANGE = 0x02;
        /// Frame known to be unusable (internal)
        const BADFRM = 0x01;
    }
}

/// Emulated main storage
pub struct MainStorage {
    bytes: Box<[AtomicU8]>,
    keys: Box<[AtomicU8]>,
}

impl core::fmt::Debug for MainStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MainStorage")
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn zeroed(len: usize) -> Result<Box<[AtomicU8]>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    v.extend((0..len).map(|_| AtomicU8::new(0)));
    Ok(v.into_boxed_slice())
}

impl MainStorage {
    /// Allocate `size` bytes of zeroed storage (a multiple of 4K)
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || !is_aligned(size as u64) {
            return Err(Error::InvalidArgument);
        }

        let frames = size / PAGE_SIZE as usize;
        let storage = Self {
            bytes: zeroed(size).inspect_err(|_| {
                log::error!("unable to allocate {} bytes of main storage", size)
            })?,
            keys: zeroed(frames)?,
        };

        log::debug!("main storage: {} KiB, {} frames", size / 1024, frames);
        Ok(storage)
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Highest valid absolute address
    pub fn limit(&self) -> AbsAddr {
        self.size() - 1
    }

    fn byte(&self, aaddr: AbsAddr) -> Result<&AtomicU8> {
        usize::try_from(aaddr)
            .ok()
            .and_then(|i| self.bytes.get(i))
            .ok_or(Error::Addressing { kind: AddressKind::Absolute, addr: aaddr })
    }

    fn key(&self, aaddr: AbsAddr) -> Option<&AtomicU8> {
        usize::try_from(frame_of(aaddr))
            .ok()
            .and_then(|i| self.keys.get(i))
    }

    /// Fetch one byte
    pub fn fetch_byte(&self, aaddr: AbsAddr) -> Result<u8> {
        Ok(self.byte(aaddr)?.load(Ordering::Relaxed))
    }

    /// Store one byte
    pub fn store_byte(&self, aaddr: AbsAddr, value: u8) -> Result<()> {
        self.byte(aaddr)?.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Copy bytes starting at `aaddr` into `buf`
    pub fn read(&self, aaddr: AbsAddr, buf: &mut [u8]) -> Result<()> {
        for (i, out) in buf.iter_mut().enumerate() {
            *out = self.fetch_byte(aaddr + i as u64)?;
        }
        Ok(())
    }

    /// Copy `data` into storage starting at `aaddr`
    pub fn write(&self, aaddr: AbsAddr, data: &[u8]) -> Result<()> {
        for (i, value) in data.iter().enumerate() {
            self.store_byte(aaddr + i as u64, *value)?;
        }
        Ok(())
    }

    /// Fetch a big-endian halfword
    pub fn fetch_hw(&self, aaddr: AbsAddr) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read(aaddr, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Fetch a big-endian fullword
    pub fn fetch_fw(&self, aaddr: AbsAddr) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(aaddr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Fetch a big-endian doubleword
    pub fn fetch_dw(&self, aaddr: AbsAddr) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read(aaddr, &mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Full key byte of the frame holding `aaddr`, including BADFRM
    pub fn get_key(&self, aaddr: AbsAddr) -> u8 {
        self.key(aaddr).map_or(0, |k| k.load(Ordering::Relaxed))
    }

    /// Replace the key of the frame holding `aaddr`
    pub fn set_key(&self, aaddr: AbsAddr, key: StorageKey) {
        if let Some(k) = self.key(aaddr) {
            k.store(key.bits(), Ordering::Relaxed);
        }
    }

    /// Set the reference bit of the frame holding `aaddr`
    pub fn mark_referenced(&self, aaddr: AbsAddr) {
        if let Some(k) = self.key(aaddr) {
            k.fetch_or(StorageKey::REF.bits(), Ordering::Relaxed);
        }
    }

    /// Set the reference and change bits of the frame holding `aaddr`
    pub fn mark_changed(&self, aaddr: AbsAddr) {
        if let Some(k) = self.key(aaddr) {
            k.fetch_or((StorageKey::REF | StorageKey::CHANGE).bits(), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_partial_frames() {
        assert_eq!(MainStorage::new(0).unwrap_err(), Error::InvalidArgument);
        assert_eq!(MainStorage::new(4097).unwrap_err(), Error::InvalidArgument);
        let storage = MainStorage::new(0x2000).unwrap();
        assert_eq!(storage.limit(), 0x1FFF);
    }

    #[test]
    fn test_big_endian_fetch() {
        let storage = MainStorage::new(0x1000).unwrap();
        storage.write(0x10, &[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]).unwrap();
        assert_eq!(storage.fetch_hw(0x10).unwrap(), 0x1234);
        assert_eq!(storage.fetch_fw(0x10).unwrap(), 0x1234_5678);
        assert_eq!(storage.fetch_dw(0x10).unwrap(), 0x1234_5678_9ABC_DEF0);
    }

    #[test]
    fn test_access_beyond_end_is_addressing() {
        let storage = MainStorage::new(0x1000).unwrap();
        assert_eq!(
            storage.fetch_byte(0x1000),
            Err(Error::Addressing { kind: AddressKind::Absolute, addr: 0x1000 })
        );
        assert!(storage.fetch_fw(0xFFE).is_err());
        assert!(storage.store_byte(u64::MAX, 0).is_err());
    }

    #[test]
    fn test_key_bits() {
        let storage = MainStorage::new(0x3000).unwrap();
        storage.set_key(0x1000, StorageKey::from_bits_retain(0x60) | StorageKey::BADFRM);
        storage.mark_referenced(0x1FFF);
        assert_eq!(storage.get_key(0x1234), 0x65);
        storage.mark_changed(0x2000);
        assert_eq!(storage.get_key(0x2000), 0x06);
        assert_eq!(storage.get_key(0x0), 0x00);
        assert_eq!(storage.get_key(0x9000), 0x00);
    }
}
