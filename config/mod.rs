//! Configuration management
//!
//! This module holds the system-wide display settings that the
//! inspection commands consult, together with the build-time constants
//! generated from the enabled cargo features.

use crate::{Error, Result};

include!(concat!(env!("OUT_DIR"), "/config.rs"));

/// Maximum number of bytes displayed by one storage display command
pub const DISPLAY_LIMIT: u64 = 64 * 1024;

/// Bytes displayed when a range operand has only a start address
pub const DEFAULT_WINDOW: u64 = 0x40;

/// Maximum number of bytes one alteration operand may carry
pub const MAX_ALTER: usize = 32;

/// Display configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Number of configured processors (adds a CPU prefix when > 1)
    pub num_cpus: usize,
    /// Show the register block before the instruction lines
    pub show_regs_first: bool,
    /// Suppress the register block entirely
    pub show_regs_none: bool,
    /// System-wide instruction tracing or stepping is active
    pub inst_trace: bool,
    /// Instruction trace records go to a trace file
    pub trace_file: bool,
    /// Byte limit for one display command
    pub display_limit: u64,
    /// Default window for a start-only range operand
    pub default_window: u64,
    /// Maximum alteration length
    pub max_alter: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            num_cpus: 1,
            show_regs_first: false,
            show_regs_none: false,
            inst_trace: false,
            trace_file: false,
            display_limit: DISPLAY_LIMIT,
            default_window: DEFAULT_WINDOW,
            max_alter: MAX_ALTER,
        }
    }
}

impl DisplayConfig {
    /// True when processor-identifying prefixes are shown on each line
    pub fn multi_cpu(&self) -> bool {
        self.num_cpus > 1
    }
}

/// Validate a display configuration
pub fn validate(config: &DisplayConfig) -> Result<()> {
    if config.num_cpus == 0 {
        return Err(Error::InvalidArgument);
    }

    if config.display_limit == 0 || config.default_window == 0 {
        return Err(Error::InvalidArgument);
    }

    if config.max_alter == 0 || config.max_alter > MAX_ALTER {
        return Err(Error::InvalidArgument);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DisplayConfig::default();
        assert_eq!(config.num_cpus, 1);
        assert!(!config.show_regs_first);
        assert!(!config.show_regs_none);
        assert!(!config.trace_file);
        assert_eq!(config.display_limit, 0x10000);
        assert_eq!(config.default_window, 0x40);
        assert_eq!(config.max_alter, 32);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = DisplayConfig::default();
        config.max_alter = 33;
        assert_eq!(validate(&config), Err(Error::InvalidArgument));

        let mut config = DisplayConfig::default();
        config.num_cpus = 0;
        assert_eq!(validate(&config), Err(Error::InvalidArgument));

        let mut config = DisplayConfig::default();
        config.display_limit = 0;
        assert_eq!(validate(&config), Err(Error::InvalidArgument));
    }
}
