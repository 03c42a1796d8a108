//! Range and alteration operands
//!
//! Accepted shapes:
//! - `start` (default window, clamped to the highest address)
//! - `start-end`
//! - `start.length`
//! - `start=hexpairs` (blanks between pairs allowed, `#` ends the data)
//! - `start="string"` or `start='string'` (translated to guest code)

use crate::config::{DisplayConfig, DEFAULT_WINDOW, MAX_ALTER};
use crate::utils::{hex_value, host_to_guest};
use alloc::string::String;
use core::fmt;

/// Operand parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No operand given
    Missing,
    /// Operand does not match any accepted shape
    Syntax,
    /// Non-hex character where a pair should start
    InvalidHexDigit,
    /// Odd number of hex digits or bad second digit
    InvalidHexPair,
    /// More bytes than one alteration may carry
    TooManyBytes,
    /// Quoted alteration string is empty
    StringExpected,
    /// Quoted alteration string is too long
    StringTooLong,
    /// Address beyond the maximum, or end before start
    InvalidRange,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseError::Missing => "Missing or invalid argument(s)",
            ParseError::Syntax => "invalid operand",
            ParseError::InvalidHexDigit => "invalid hex digit",
            ParseError::InvalidHexPair => "invalid hex pair",
            ParseError::TooManyBytes => "only a maximum of 32 bytes may be altered",
            ParseError::StringExpected => "string expected",
            ParseError::StringTooLong => "maximum string length is 32 characters",
            ParseError::InvalidRange => "invalid range",
        })
    }
}

/// Parsed operand: an inclusive range plus replacement bytes, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRange {
    /// First address
    pub start: u64,
    /// Last address (inclusive)
    pub end: u64,
    /// Replacement bytes; empty for a display operand
    pub data: heapless::Vec<u8, MAX_ALTER>,
}

impl ParsedRange {
    /// True when the operand carries replacement bytes
    pub fn is_alteration(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Range operand parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeParser {
    /// Highest address accepted
    pub maxadr: u64,
    /// Bytes shown for a start-only operand
    pub window: u64,
    /// Maximum number of replacement bytes
    pub max_alter: usize,
    /// Whether `=` alteration syntax is accepted
    pub allow_alter: bool,
}

impl RangeParser {
    /// Parser with the default limits
    pub const fn new(maxadr: u64) -> Self {
        Self { maxadr, window: DEFAULT_WINDOW, max_alter: MAX_ALTER, allow_alter: true }
    }

    /// Parser with the limits of a display configuration
    pub fn with_config(maxadr: u64, config: &DisplayConfig) -> Self {
        Self {
            maxadr,
            window: config.default_window,
            max_alter: config.max_alter.min(MAX_ALTER),
            allow_alter: true,
        }
    }

    /// Reject alteration syntax
    pub const fn display_only(mut self) -> Self {
        self.allow_alter = false;
        self
    }

    /// Parse one operand
    pub fn parse(&self, operand: &str) -> Result<ParsedRange, ParseError> {
        let text = operand.as_bytes();
        if text.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Missing);
        }

        let scan = Scan::new(text);
        let mut data = heapless::Vec::new();

        let (start, end) = match scan {
            Scan { start, delim: Some((b'=', at)), second: None, .. } if self.allow_alter => {
                let quote = text.get(at + 1).copied().filter(|&c| c == b'"' || c == b'\'');
                let Some(quote) = quote else {
                    return Err(ParseError::Syntax);
                };
                let body = &text[at + 2..];
                let body = match body.iter().position(|&c| c == quote) {
                    Some(close) => &body[..close],
                    None => body,
                };
                if body.is_empty() {
                    return Err(ParseError::StringExpected);
                }
                if body.len() > self.max_alter {
                    return Err(ParseError::StringTooLong);
                }
                for &c in body {
                    data.push(host_to_guest(c)).map_err(|_| ParseError::StringTooLong)?;
                }
                (start, last(start, body.len() as u64)?)
            }
            Scan { start, delim: Some((b'=', at)), second: Some(_), .. } if self.allow_alter => {
                self.hex_pairs(&text[at + 1..], &mut data)?;
                (start, last(start, data.len() as u64)?)
            }
            Scan { start, delim: None, .. } => {
                let end = start.saturating_add(self.window.saturating_sub(1)).min(self.maxadr);
                (start, end)
            }
            Scan { start, delim: Some((b'-', _)), second: Some(end), trailing: false } => (start, end),
            Scan { start, delim: Some((b'.', _)), second: Some(len), trailing: false } => {
                (start, last(start, len)?)
            }
            _ => return Err(ParseError::Syntax),
        };

        if start > self.maxadr || end > self.maxadr || end < start {
            return Err(ParseError::InvalidRange);
        }

        Ok(ParsedRange { start, end, data })
    }

    fn hex_pairs(
        &self,
        text: &[u8],
        data: &mut heapless::Vec<u8, MAX_ALTER>,
    ) -> Result<(), ParseError> {
        let mut chars = text.iter().copied();

        while let Some(c) = chars.next() {
            if c == b'#' {
                break;
            }
            if c == b' ' || c == b'\t' {
                continue;
            }
            let hi = hex_value(c).ok_or(ParseError::InvalidHexDigit)?;
            let lo = chars.next().and_then(hex_value).ok_or(ParseError::InvalidHexPair)?;
            if data.len() >= self.max_alter {
                return Err(ParseError::TooManyBytes);
            }
            data.push(hi << 4 | lo).map_err(|_| ParseError::TooManyBytes)?;
        }

        if data.is_empty() {
            return Err(ParseError::Syntax);
        }
        Ok(())
    }
}

/// Last address of `len` bytes starting at `start`
fn last(start: u64, len: u64) -> Result<u64, ParseError> {
    len.checked_sub(1)
        .and_then(|n| start.checked_add(n))
        .ok_or(ParseError::InvalidRange)
}

/// Leading `hex [delim [hex [more]]]` structure of an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scan {
    start: u64,
    /// Delimiter and its byte position
    delim: Option<(u8, usize)>,
    second: Option<u64>,
    /// Anything follows the second number
    trailing: bool,
}

impl Scan {
    fn new(text: &[u8]) -> Self {
        let Some((start, pos)) = hex_number(text, 0) else {
            return Self { start: 0, delim: Some((0, 0)), second: None, trailing: true };
        };

        let Some(&d) = text.get(pos) else {
            return Self { start, delim: None, second: None, trailing: false };
        };

        match hex_number(text, pos + 1) {
            Some((second, end)) => Self {
                start,
                delim: Some((d, pos)),
                second: Some(second),
                trailing: end < text.len(),
            },
            None => Self { start, delim: Some((d, pos)), second: None, trailing: false },
        }
    }
}

/// Parse a hex number at `pos`, skipping leading blanks and an optional
/// `0x` prefix; values too large for 64 bits saturate
fn hex_number(text: &[u8], mut pos: usize) -> Option<(u64, usize)> {
    while text.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    if text.get(pos) == Some(&b'0')
        && matches!(text.get(pos + 1), Some(b'x' | b'X'))
        && text.get(pos + 2).copied().and_then(hex_value).is_some()
    {
        pos += 2;
    }

    let begin = pos;
    let mut value: u64 = 0;
    while let Some(digit) = text.get(pos).copied().and_then(hex_value) {
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(digit as u64))
            .unwrap_or(u64::MAX);
        pos += 1;
    }

    if pos == begin { None } else { Some((value, pos)) }
}

/// Prepare operand text for parsing
///
/// Blanks are removed and letters upper-cased, except inside a quoted
/// string following `=`. A `#` outside a string ends the operand.
pub fn normalize(operand: &str) -> String {
    let mut out = String::with_capacity(operand.len());
    let mut chars = operand.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {}
            '#' => break,
            '=' => {
                out.push('=');
                while chars.next_if(|&c| c == ' ' || c == '\t').is_some() {}
                if let Some(quote) = chars.next_if(|&c| c == '"' || c == '\'') {
                    out.push(quote);
                    for c in chars.by_ref() {
                        out.push(c);
                        if c == quote {
                            break;
                        }
                    }
                    break;
                }
            }
            _ => out.push(c.to_ascii_uppercase()),
        }
    }

    out
}
