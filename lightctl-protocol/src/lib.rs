//! Serial protocol definitions for the multi-channel light controller.
//!
//! The controller and the host exchange newline-delimited ASCII text.
//!
//! # Outbound (host → device)
//!
//! ```text
//! ON {channel}\n      switch a channel on
//! OFF {channel}\n     switch a channel off
//! STATUS\n            request a fresh status report
//! ```
//!
//! # Inbound (device → host)
//!
//! ```text
//! ERROR ...           device-side fault, free text
//! 1,0,1,1,0,0,1,0     full channel-state vector, channel 1 first
//! anything else       ignored
//! ```
//!
//! # Example
//!
//! ```rust
//! use lightctl_protocol::{encode_command, parse_line, Channel, Command, Frame};
//!
//! let frame = parse_line("1,0,1\r");
//! assert_eq!(frame, Frame::Status(vec![true, false, true]));
//!
//! let wire = encode_command(&Command::switch(Channel(2), false));
//! assert_eq!(&wire[..], b"OFF 2\n");
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode_line, encode_command, parse_line};
pub use error::ProtocolError;
pub use types::{
    Channel, Command, Frame, LineDelimiter, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT,
    ERROR_PREFIX, MAX_CHANNELS, MAX_LINE_LENGTH,
};
