//! Encoding and decoding of protocol lines.
//!
//! Inbound grammar, checked in order:
//! ```text
//! ERROR<anything>        -> Frame::Error
//! <f>,<f>[,<f>...]       -> Frame::Status, f == "1" is on, anything else off
//! <anything else>        -> Frame::Unrecognized
//! ```

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::types::*;

/// Classify one received line.
///
/// Never fails: the grammar is permissive so that line noise is ignored
/// instead of surfacing as an error.
pub fn parse_line(line: &str) -> Frame {
    let line = line.trim_matches(|c: char| c.is_whitespace() || c.is_control());

    if line.starts_with(ERROR_PREFIX) {
        return Frame::Error(line.to_string());
    }

    if line.contains(',') {
        let states = line.split(',').map(|field| field == "1").collect();
        return Frame::Status(states);
    }

    Frame::Unrecognized
}

/// Encode a command into its wire form, newline included.
pub fn encode_command(cmd: &Command) -> Bytes {
    Bytes::from(format!("{}\n", cmd))
}

/// Split the next complete line off the front of `buf`.
///
/// Returns `Ok(None)` when no delimiter has arrived yet. Invalid UTF-8 is
/// replaced rather than rejected. A line longer than [`MAX_LINE_LENGTH`]
/// is consumed and reported as [`ProtocolError::LineTooLong`], as is a run
/// of more than [`MAX_LINE_LENGTH`] bytes without a delimiter (the buffer is
/// discarded). The caller may keep reading either way.
pub fn decode_line(
    buf: &mut BytesMut,
    delimiter: LineDelimiter,
) -> Result<Option<String>, ProtocolError> {
    let delim = delimiter.as_bytes();

    match find_subslice(buf, delim) {
        Some(pos) if pos > MAX_LINE_LENGTH => {
            buf.advance(pos + delim.len());
            Err(ProtocolError::LineTooLong {
                length: pos,
                max: MAX_LINE_LENGTH,
            })
        }
        Some(pos) => {
            let line = buf.split_to(pos + delim.len());
            let content = &line[..pos];
            Ok(Some(String::from_utf8_lossy(content).into_owned()))
        }
        None if buf.len() > MAX_LINE_LENGTH => {
            let length = buf.len();
            buf.clear();
            Err(ProtocolError::LineTooLong {
                length,
                max: MAX_LINE_LENGTH,
            })
        }
        None => Ok(None),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
