//! Core inspection modules
//!
//! This module contains the processor context model, the storage and
//! address translation machinery, and the program interruption codes
//! the translation pipeline reports.

pub mod cpu;
pub mod mm;
pub mod pgm;
