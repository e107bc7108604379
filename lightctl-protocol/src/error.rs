//! Error types for the light controller serial protocol.

use thiserror::Error;

/// Protocol-level errors raised while framing inbound bytes.
///
/// Line content itself never fails to parse; unknown lines classify as
/// [`Frame::Unrecognized`](crate::Frame::Unrecognized).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No delimiter was seen within the maximum line length.
    #[error("Line too long: {length} bytes without delimiter (max: {max})")]
    LineTooLong { length: usize, max: usize },
}
