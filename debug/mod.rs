//! Operator and trace inspection facilities
//!
//! This module provides the storage-inspection commands and the
//! instruction trace display:
//! - range and alteration operand parsing
//! - page-bounded storage dumps and single-line displays
//! - `r`/`abs`/`v` alteration and display, `u` disassembly
//! - instruction display with operand storage and register blocks
//!
//! Output leaves as numbered [`msg::Message`]s through a
//! [`msg::MessageSink`]; binary tracing goes to a [`trace::TraceSink`].

pub mod alter;
pub mod cmd;
pub mod disasm;
pub mod display;
pub mod inst;
pub mod msg;
pub mod operand;
pub mod regs;
pub mod shape;
pub mod trace;

pub use self::cmd::{dispatch, Command};
pub use self::disasm::Disassembler;
pub use self::inst::{display_inst, display_pgmint_inst};
pub use self::msg::{Message, MessageSink, MsgId, Severity};
pub use self::operand::{ParseError, ParsedRange, RangeParser};
pub use self::trace::{TraceLog, TraceRecord, TraceSink};
