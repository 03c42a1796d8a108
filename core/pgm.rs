//! Program interruption codes
//!
//! Translation and addressing faults are reported with the code the
//! hardware would store on a program interruption.

use core::fmt;

/// Hardware program interruption code (never zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramInterrupt(u16);

impl ProgramInterrupt {
    pub const ADDRESSING: Self = Self(0x0005);
    pub const SEGMENT_TRANSLATION: Self = Self(0x0010);
    pub const PAGE_TRANSLATION: Self = Self(0x0011);
    pub const TRANSLATION_SPECIFICATION: Self = Self(0x0012);
    pub const ALET_SPECIFICATION: Self = Self(0x0028);
    pub const ALEN_TRANSLATION: Self = Self(0x0029);
    pub const ALE_SEQUENCE: Self = Self(0x002A);
    pub const ASTE_VALIDITY: Self = Self(0x002B);
    pub const ASTE_SEQUENCE: Self = Self(0x002C);
    pub const ASCE_TYPE: Self = Self(0x0038);
    pub const REGION_FIRST_TRANSLATION: Self = Self(0x0039);
    pub const REGION_SECOND_TRANSLATION: Self = Self(0x003A);
    pub const REGION_THIRD_TRANSLATION: Self = Self(0x003B);

    /// Wrap a raw interruption code; zero is not an exception
    pub const fn new(code: u16) -> Option<Self> {
        if code == 0 { None } else { Some(Self(code)) }
    }

    /// Raw interruption code
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Human-readable name of the interruption
    pub fn name(self) -> &'static str {
        // PER and transaction-abort bits do not change the cause
        match self.0 & 0x007F {
            0x01 => "Operation exception",
            0x02 => "Privileged-operation exception",
            0x03 => "Execute exception",
            0x04 => "Protection exception",
            0x05 => "Addressing exception",
            0x06 => "Specification exception",
            0x07 => "Data exception",
            0x10 => "Segment-translation exception",
            0x11 => "Page-translation exception",
            0x12 => "Translation-specification exception",
            0x13 => "Special-operation exception",
            0x28 => "ALET-specification exception",
            0x29 => "ALEN-translation exception",
            0x2A => "ALE-sequence exception",
            0x2B => "ASTE-validity exception",
            0x2C => "ASTE-sequence exception",
            0x2D => "Extended-authority exception",
            0x38 => "ASCE-type exception",
            0x39 => "Region-first-translation exception",
            0x3A => "Region-second-translation exception",
            0x3B => "Region-third-translation exception",
            _ => "Unknown program interrupt",
        }
    }
}

impl fmt::Display for ProgramInterrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X} ({})", self.0, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_zero_is_not_an_exception() {
        assert_eq!(ProgramInterrupt::new(0), None);
        assert_eq!(ProgramInterrupt::new(0x11), Some(ProgramInterrupt::PAGE_TRANSLATION));
    }

    #[test]
    fn test_names() {
        assert_eq!(ProgramInterrupt::ADDRESSING.name(), "Addressing exception");
        assert_eq!(ProgramInterrupt::SEGMENT_TRANSLATION.name(), "Segment-translation exception");
        assert_eq!(ProgramInterrupt::new(0x0091).map(|p| p.name()), Some("Page-translation exception"));
        assert_eq!(ProgramInterrupt::new(0x0211).map(|p| p.name()), Some("Page-translation exception"));
        assert_eq!(ProgramInterrupt::new(0x006E).map(|p| p.name()), Some("Unknown program interrupt"));
    }

    #[test]
    fn test_display() {
        let text = format!("{}", ProgramInterrupt::PAGE_TRANSLATION);
        assert_eq!(text, "0011 (Page-translation exception)");
    }
}
