//! Status reply decoding.
//!
//! WSP printers answer a status poll (or report on their own with automatic
//! status back enabled) with a single byte:
//!
//! | Bit | Meaning (1 / 0) |
//! |-----|-----------------|
//! | 0 | paper present / absent |
//! | 1 | cover closed / open |
//! | 2 | registration mark found / not found |
//! | 3-7 | reserved, ignored |
//!
//! Every byte value is a legal status, so decoding never fails.

use crate::{PrinterLinkError, Result};

const PAPER_PRESENT: u8 = 0x01;
const COVER_CLOSED: u8 = 0x02;
const MARK_FOUND: u8 = 0x04;

/// The three sensor flags carried by a status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub paper_present: bool,
    pub cover_closed: bool,
    pub mark_found: bool,
}

impl StatusFlags {
    /// Build the status byte these flags decode from (reserved bits clear).
    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.paper_present {
            byte |= PAPER_PRESENT;
        }
        if self.cover_closed {
            byte |= COVER_CLOSED;
        }
        if self.mark_found {
            byte |= MARK_FOUND;
        }
        byte
    }
}

/// Decode a status byte by masking bits 0-2.
pub fn decode_status(byte: u8) -> StatusFlags {
    StatusFlags {
        paper_present: byte & PAPER_PRESENT != 0,
        cover_closed: byte & COVER_CLOSED != 0,
        mark_found: byte & MARK_FOUND != 0,
    }
}

/// Human-readable summary for logs and diagnostics.
///
/// Not for protocol decisions: use [`decode_status`].
pub fn describe_status(byte: u8) -> String {
    let flags = decode_status(byte);
    let paper = if flags.paper_present {
        "Paper present"
    } else {
        "Paper out"
    };
    let cover = if flags.cover_closed {
        "Cover closed"
    } else {
        "Cover open"
    };
    let mark = if flags.mark_found { "Mark found" } else { "" };

    format!("{paper} {cover} {mark}").trim().to_string()
}

/// A decoded status reply as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterStatus {
    pub raw: u8,
    pub flags: StatusFlags,
}

impl PrinterStatus {
    pub fn from_byte(raw: u8) -> Self {
        Self {
            raw,
            flags: decode_status(raw),
        }
    }

    pub fn description(&self) -> String {
        describe_status(self.raw)
    }

    /// Whether a print job can start: paper loaded and cover closed.
    pub fn readiness(&self) -> Result<()> {
        let reason = match (self.flags.paper_present, self.flags.cover_closed) {
            (true, true) => return Ok(()),
            (false, false) => "Paper out and cover open",
            (false, true) => "Paper out",
            (true, false) => "Cover open",
        };
        Err(PrinterLinkError::NotReady(reason.to_string()))
    }
}
