//! Program status word
//!
//! The PSW is kept in decoded form; [`Psw::image`] renders the
//! architected byte layout used by the trace display.

use crate::arch::{AddressingMode, ArchMode};
use bitflags::bitflags;

bitflags! {
    /// PSW system mask (byte 0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SysMask: u8 {
        /// Program event recording
        const PER = 0x40;
        /// Dynamic address translation
        const DAT = 0x04;
        /// I/O interruptions
        const IO = 0x02;
        /// External interruptions
        const EXT = 0x01;
    }
}

bitflags! {
    /// PSW state flags (low nibble of byte 1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PswFlags: u8 {
        /// Machine-check mask
        const MCHECK = 0x04;
        /// Wait state
        const WAIT = 0x02;
        /// Problem state
        const PROB = 0x01;
    }
}

/// Address-space control (PSW bits 16-17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AscMode {
    #[default]
    Primary,
    AccessRegister,
    Secondary,
    Home,
}

impl AscMode {
    const fn bits(self) -> u8 {
        match self {
            AscMode::Primary => 0,
            AscMode::AccessRegister => 1,
            AscMode::Secondary => 2,
            AscMode::Home => 3,
        }
    }
}

/// Decoded program status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Psw {
    /// System mask
    pub sysmask: SysMask,
    /// PSW key (0-15)
    pub pkey: u8,
    /// Machine-check / wait / problem-state flags
    pub flags: PswFlags,
    /// Address-space control
    pub asc: AscMode,
    /// Condition code (0-3)
    pub cc: u8,
    /// Program mask (fixed-point overflow, decimal overflow, ...)
    pub progmask: u8,
    /// Addressing mode
    pub amode: AddressingMode,
    /// Instruction address
    pub ia: u64,
}

impl Default for Psw {
    fn default() -> Self {
        Self {
            sysmask: SysMask::empty(),
            pkey: 0,
            flags: PswFlags::empty(),
            asc: AscMode::Primary,
            cc: 0,
            progmask: 0,
            amode: AddressingMode::Bit24,
            ia: 0,
        }
    }
}

impl Psw {
    /// True when DAT is off
    pub fn real_mode(&self) -> bool {
        !self.sysmask.contains(SysMask::DAT)
    }

    /// True when DAT is on and the PSW selects access-register mode
    pub fn ar_mode(&self) -> bool {
        !self.real_mode() && self.asc == AscMode::AccessRegister
    }

    /// Wrap an address at the current addressing-mode width
    pub fn wrap(&self, addr: u64) -> u64 {
        addr & self.amode.maxwrap()
    }

    /// Architected PSW image: 8 bytes for S/370 and ESA/390, 16 for z
    pub fn image(&self, arch: ArchMode) -> heapless::Vec<u8, 16> {
        let mut buf = [0u8; 16];

        buf[0] = self.sysmask.bits();
        buf[1] = (self.pkey & 0x0F) << 4 | self.flags.bits();
        buf[2] = self.asc.bits() << 6 | (self.cc & 0x03) << 4 | (self.progmask & 0x0F);

        match arch {
            ArchMode::S370 => {
                // EC mode; the instruction address occupies bytes 5-7
                buf[1] |= 0x08;
                buf[5..8].copy_from_slice(&(self.ia as u32 & 0x00FF_FFFF).to_be_bytes()[1..]);
            }
            ArchMode::Esa390 => {
                buf[1] |= 0x08;
                let mut word = self.ia as u32 & 0x7FFF_FFFF;
                if self.amode != AddressingMode::Bit24 {
                    word |= 0x8000_0000;
                }
                buf[4..8].copy_from_slice(&word.to_be_bytes());
            }
            ArchMode::Zarch => {
                match self.amode {
                    AddressingMode::Bit64 => {
                        buf[3] = 0x01;
                        buf[4] = 0x80;
                    }
                    AddressingMode::Bit31 => buf[4] = 0x80,
                    AddressingMode::Bit24 => {}
                }
                buf[8..16].copy_from_slice(&self.ia.to_be_bytes());
            }
        }

        heapless::Vec::from_slice(&buf[..arch.psw_len()]).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dat_on_psw() -> Psw {
        Psw {
            sysmask: SysMask::DAT | SysMask::IO | SysMask::EXT,
            pkey: 0,
            flags: PswFlags::MCHECK,
            cc: 2,
            amode: AddressingMode::Bit31,
            ia: 0x0001_2344,
            ..Psw::default()
        }
    }

    #[test]
    fn test_real_mode_and_ar_mode() {
        let mut psw = Psw::default();
        assert!(psw.real_mode());
        psw.asc = AscMode::AccessRegister;
        assert!(!psw.ar_mode());
        psw.sysmask.insert(SysMask::DAT);
        assert!(psw.ar_mode());
    }

    #[test]
    fn test_esa390_image() {
        let image = dat_on_psw().image(ArchMode::Esa390);
        assert_eq!(&image[..], &[0x07, 0x0C, 0x20, 0x00, 0x80, 0x01, 0x23, 0x44]);
    }

    #[test]
    fn test_zarch_image() {
        let mut psw = dat_on_psw();
        psw.amode = AddressingMode::Bit64;
        psw.ia = 0x0000_0001_0000_0F00;
        let image = psw.image(ArchMode::Zarch);
        assert_eq!(image.len(), 16);
        assert_eq!(&image[..8], &[0x07, 0x04, 0x20, 0x01, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(&image[8..], &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, 0x00]);
    }

    #[test]
    fn test_s370_image() {
        let mut psw = dat_on_psw();
        psw.amode = AddressingMode::Bit24;
        psw.ia = 0x0012_3456;
        let image = psw.image(ArchMode::S370);
        assert_eq!(&image[4..], &[0x00, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_wrap() {
        let psw = Psw::default();
        assert_eq!(psw.wrap(0x0100_0010), 0x10);
    }
}
