//! Framing for the manager TCP stream
//!
//! The server first sends a one-line banner (`Asterisk Call Manager/x.y`),
//! then blank-line separated message blocks. The decoder yields the banner
//! once as `AmiFrame::Greeting` and every later block as `AmiFrame::Message`.

use crate::constants::MAX_FRAME_BYTES;
use crate::error::AmiError;
use crate::message::AmiMessage;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// One decoded unit from the manager stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiFrame {
    Greeting(String),
    Message(AmiMessage),
}

/// Codec for the AMI line protocol
#[derive(Debug, Default)]
pub struct AmiCodec {
    greeted: bool,
}

impl AmiCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec for the listening side, which never receives a banner
    #[cfg(test)]
    pub(crate) fn without_banner() -> Self {
        Self { greeted: true }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// End of the first message block and the length of its terminator
fn block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(buf, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(buf, b"\n\n").map(|i| (i, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

impl Decoder for AmiCodec {
    type Item = AmiFrame;
    type Error = AmiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AmiFrame>, AmiError> {
        if !self.greeted {
            let Some(pos) = find(src, b"\n") else {
                return check_size(src);
            };
            let line = src.split_to(pos + 1);
            self.greeted = true;
            let banner = String::from_utf8_lossy(&line).trim().to_string();
            return Ok(Some(AmiFrame::Greeting(banner)));
        }

        loop {
            // Stray separators between blocks
            while src.starts_with(b"\r\n") || src.starts_with(b"\n") {
                let skip = if src[0] == b'\r' { 2 } else { 1 };
                src.advance(skip);
            }

            let Some((end, sep)) = block_end(src) else {
                return check_size(src);
            };

            let block = src.split_to(end + sep);
            let text = String::from_utf8_lossy(&block[..end]);
            let message = AmiMessage::parse(&text);
            if message.is_empty() {
                continue;
            }
            return Ok(Some(AmiFrame::Message(message)));
        }
    }
}

fn check_size(src: &BytesMut) -> Result<Option<AmiFrame>, AmiError> {
    if src.len() > MAX_FRAME_BYTES {
        return Err(AmiError::Protocol(format!(
            "message exceeds {} bytes without terminator",
            MAX_FRAME_BYTES
        )));
    }
    Ok(None)
}

impl Encoder<AmiMessage> for AmiCodec {
    type Error = AmiError;

    fn encode(&mut self, item: AmiMessage, dst: &mut BytesMut) -> Result<(), AmiError> {
        let wire = item.to_wire()?;
        dst.reserve(wire.len());
        dst.put_slice(wire.as_bytes());
        Ok(())
    }
}
