//! Printer protocol definitions.
//!
//! - [`woosim`]: ESC/POS command encoders for the Woosim WSP series
//! - [`status`]: single-byte status reply decoding
//!
//! Everything here is pure: no I/O, no state. The same request always
//! encodes to the same bytes.

pub mod status;
pub mod woosim;

pub use status::{PrinterStatus, StatusFlags, decode_status, describe_status};
pub use woosim::{
    Alignment, CodeTable, TextStyle, encode_alignment, encode_auto_status_back, encode_code_table,
    encode_cut, encode_feed_and_cut, encode_initialize, encode_print_and_feed,
    encode_request_status, encode_standard_mode, encode_text, encode_text_style, encode_underline,
};

/// An immutable, encoded printer command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(Vec<u8>);

impl Command {
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Concatenates several commands into a single write.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    buf: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append one command.
    pub fn push(mut self, command: Command) -> Self {
        self.buf.extend_from_slice(command.as_bytes());
        self
    }

    /// Append one command in place.
    pub fn extend(&mut self, command: &Command) {
        self.buf.extend_from_slice(command.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Command {
        Command(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_buffer_concatenates_in_order() {
        let mut buffer = CommandBuffer::new()
            .push(encode_initialize())
            .push(encode_alignment(1));
        buffer.extend(&encode_cut());

        assert_eq!(
            buffer.finish().as_bytes(),
            &[0x1b, 0x40, 0x1b, 0x61, 0x01, 0x1d, 0x56, 0x42, 0x00]
        );
    }

    #[test]
    fn empty_buffer_finishes_empty() {
        let cmd = CommandBuffer::new().finish();
        assert!(cmd.is_empty());
        assert_eq!(cmd.len(), 0);
    }
}
