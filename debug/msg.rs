//! Operator messages
//!
//! All operator-facing output leaves the crate as numbered [`Message`]s
//! through a [`MessageSink`]. Multi-line output (storage dumps, register
//! blocks) is carried by one message whose text holds several lines.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    const fn letter(self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Error => 'E',
        }
    }
}

/// Message identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgId {
    MissingArgument,
    InvalidOperand,
    InternalError,
    StorageNotValid,
    AddressingException,
    TranslationException,
    AbsDump,
    VirtDump,
    Disassembly,
    StorageUnavailable,
    InstFetchError,
    InstPsw,
    InstOperand,
    GeneralRegs,
    ControlRegs,
    AccessRegs,
    FloatControl,
    FloatRegs,
    VectorRegs,
}

impl MsgId {
    /// Message number
    pub const fn code(self) -> u16 {
        match self {
            MsgId::MissingArgument => 100,
            MsgId::InvalidOperand => 101,
            MsgId::InternalError => 102,
            MsgId::StorageNotValid => 110,
            MsgId::AddressingException => 111,
            MsgId::TranslationException => 112,
            MsgId::AbsDump => 120,
            MsgId::VirtDump => 121,
            MsgId::Disassembly => 122,
            MsgId::StorageUnavailable => 130,
            MsgId::InstFetchError => 131,
            MsgId::InstPsw => 132,
            MsgId::InstOperand => 133,
            MsgId::GeneralRegs => 140,
            MsgId::ControlRegs => 141,
            MsgId::AccessRegs => 142,
            MsgId::FloatControl => 143,
            MsgId::FloatRegs => 144,
            MsgId::VectorRegs => 145,
        }
    }
}

/// One operator message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message identifier
    pub id: MsgId,
    /// Severity
    pub severity: Severity,
    /// Message text, possibly several lines
    pub text: String,
}

impl Message {
    pub fn info(id: MsgId, text: String) -> Self {
        Self { id, severity: Severity::Info, text }
    }

    pub fn error(id: MsgId, text: String) -> Self {
        Self { id, severity: Severity::Error, text }
    }

    /// Lines of the message text
    pub fn lines(&self) -> core::str::Lines<'_> {
        self.text.lines()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SI{:04}{} {}", self.id.code(), self.severity.letter(), self.text)
    }
}

/// Destination for operator messages
pub trait MessageSink {
    /// Deliver one message
    fn emit(&mut self, msg: Message);
}

impl MessageSink for Vec<Message> {
    fn emit(&mut self, msg: Message) {
        self.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn test_display() {
        let msg = Message::error(MsgId::AddressingException, "A:00001000  Addressing exception".to_string());
        assert_eq!(format!("{}", msg), "SI0111E A:00001000  Addressing exception");
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<Message> = Vec::new();
        sink.emit(Message::info(MsgId::AbsDump, "one\ntwo".to_string()));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].lines().count(), 2);
    }
}
