//! Woosim WSP series command set (ESC/POS subset).
//!
//! Covers what receipt printing needs: reset, alignment, text style,
//! code tables, feeds, cut and the real-time status poll. Status replies
//! are decoded in [`super::status`].

use super::Command;
use crate::{PrinterLinkError, Result};

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const DLE: u8 = 0x10;
const EOT: u8 = 0x04;
const LF: u8 = 0x0a;

/// Full cut: GS V 'B' 0.
const CUT: [u8; 4] = [GS, 0x56, 0x42, 0x00];

/// Largest character magnification the size byte can carry (one nibble).
const MAX_MAGNIFICATION: u8 = 16;

/// Automatic status back mask sent when enabling ASB (all sensors).
const ASB_ALL: u8 = 0xff;

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Alignment {
    Left = 0,
    Center = 1,
    Right = 2,
}

impl TryFrom<u8> for Alignment {
    type Error = PrinterLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Left),
            1 => Ok(Self::Center),
            2 => Ok(Self::Right),
            other => Err(PrinterLinkError::InvalidAlignment(other)),
        }
    }
}

/// Character code tables selectable with ESC t.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodeTable {
    Cp437 = 0,
    Cp850 = 1,
    Cp852 = 2,
    Cp860 = 3,
    Cp863 = 4,
    Cp865 = 5,
    Cp866 = 6,
    Cp857 = 7,
    Cp862 = 8,
    Cp864 = 9,
    Cp737 = 10,
    Cp1252 = 11,
    Cp1250 = 12,
    Cp1251 = 13,
    Cp1253 = 14,
    Cp1254 = 15,
    Cp1255 = 16,
    Cp1256 = 17,
    Cp1257 = 18,
    Cp1258 = 19,
}

/// Validated text style.
///
/// Magnifications are packed into one nibble each, so only `1..=16` can be
/// represented. [`TextStyle::new`] rejects anything else instead of letting
/// the size byte wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    width: u8,
    height: u8,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            width: 1,
            height: 1,
        }
    }
}

impl TextStyle {
    pub fn new(bold: bool, italic: bool, underline: bool, width: u8, height: u8) -> Result<Self> {
        let in_range = |m: u8| (1..=MAX_MAGNIFICATION).contains(&m);
        if !in_range(width) || !in_range(height) {
            return Err(PrinterLinkError::InvalidMagnification { width, height });
        }
        Ok(Self {
            bold,
            italic,
            underline,
            width,
            height,
        })
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    /// Carried for callers; the WSP command set has no italic mode, so it is
    /// not encoded.
    pub fn italic(&self) -> bool {
        self.italic
    }

    pub fn underline(&self) -> bool {
        self.underline
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// GS ! size byte: width-1 in the high nibble, height-1 in the low one.
    pub fn size_byte(&self) -> u8 {
        ((self.width - 1) << 4) | (self.height - 1)
    }
}

/// ESC @: reset the printer to power-on defaults.
pub fn encode_initialize() -> Command {
    Command::from_bytes(vec![ESC, 0x40])
}

/// ESC a n. The value is passed through as-is; out-of-range values are the
/// printer's concern. Use [`Alignment`] for a checked value.
pub fn encode_alignment(value: u8) -> Command {
    Command::from_bytes(vec![ESC, 0x61, value])
}

/// ESC E (emphasis) then GS ! (character size). Underline is a separate
/// command, see [`encode_underline`].
pub fn encode_text_style(style: &TextStyle) -> Command {
    Command::from_bytes(vec![ESC, 0x45, u8::from(style.bold), GS, 0x21, style.size_byte()])
}

/// ESC - n: one-dot underline on or off.
pub fn encode_underline(on: bool) -> Command {
    Command::from_bytes(vec![ESC, 0x2d, u8::from(on)])
}

/// `lines` line feeds followed by a full cut.
pub fn encode_feed_and_cut(lines: u16) -> Command {
    let mut buf = Vec::with_capacity(lines as usize + CUT.len());
    buf.resize(lines as usize, LF);
    buf.extend_from_slice(&CUT);
    Command::from_bytes(buf)
}

/// Full cut without feeding.
pub fn encode_cut() -> Command {
    Command::from_bytes(CUT.to_vec())
}

/// DLE EOT EOT: real-time status poll. The printer answers with one byte.
pub fn encode_request_status() -> Command {
    Command::from_bytes(vec![DLE, EOT, EOT])
}

/// GS a n: enable or disable automatic status back.
pub fn encode_auto_status_back(enabled: bool) -> Command {
    let mask = if enabled { ASB_ALL } else { 0x00 };
    Command::from_bytes(vec![GS, 0x61, mask])
}

/// LF for a single line, ESC d n otherwise.
pub fn encode_print_and_feed(lines: u8) -> Command {
    match lines {
        1 => Command::from_bytes(vec![LF]),
        n => Command::from_bytes(vec![ESC, 0x64, n]),
    }
}

/// ESC S: return to standard mode.
pub fn encode_standard_mode() -> Command {
    Command::from_bytes(vec![ESC, 0x53])
}

/// ESC t n: select character code table.
pub fn encode_code_table(table: CodeTable) -> Command {
    Command::from_bytes(vec![ESC, 0x74, table as u8])
}

/// Raw text for the current code table.
///
/// Characters outside ASCII are replaced with `?`; multi-byte UTF-8 would
/// print as garbage on a single-byte code page.
pub fn encode_text(text: &str) -> Command {
    let bytes = text
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    Command::from_bytes(bytes)
}
