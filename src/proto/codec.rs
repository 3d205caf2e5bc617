use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::proto::command::Command;

/// Line terminator appended to every command.
pub const TERMINATOR: u8 = b'\n';

/// Newline framed text protocol.
///
/// Encoding writes the command text plus a single terminator byte.
/// Decoding yields one trimmed reply line per terminator.
#[derive(Default)]
pub struct ProtocolCodec;

impl Decoder for ProtocolCodec {
    type Item = String;
    // A reply that is not valid UTF-8 is still a decoded frame from the
    // transport's point of view, so it is converted lossily here.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == TERMINATOR) {
            Some(n) => {
                let line = src.split_to(n + 1);
                Ok(Some(
                    String::from_utf8_lossy(&line[..n]).trim().to_string(),
                ))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Command> for ProtocolCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.as_scpi();
        dst.reserve(text.len() + 1);
        dst.put_slice(text.as_bytes());
        dst.put_u8(TERMINATOR);
        Ok(())
    }
}
