//! Newline framing for the child's stdout and stderr.
//!
//! Splits a byte stream on `\n`, strips an optional trailing `\r`, and keeps
//! partial lines buffered across reads. Bytes that are not valid UTF-8 are
//! replaced instead of failing the stream, so one bad line cannot stop the
//! reader.

use std::io;

use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decoder yielding one `String` per line, terminator removed.
#[derive(Debug, Default)]
pub(crate) struct LineCodec {
    /// Bytes before this index are known not to contain `\n`.
    next_index: usize,
}

impl LineCodec {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn to_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        match newline {
            Some(index) => {
                self.next_index = 0;
                let line = src.split_to(index + 1);
                Ok(Some(to_text(&line[..index])))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Trailing line without a terminator
        self.next_index = 0;
        let rest = src.split_to(src.len());
        Ok(Some(to_text(&rest)))
    }
}
