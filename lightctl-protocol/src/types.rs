//! Message type definitions for the light controller protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serial device used when the configuration does not name one.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// Baud rate used when the configuration does not name one.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Longest inbound line accepted before the buffer is discarded.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Most channels a single status line can describe.
///
/// A line of `n` bytes holds at most `n` separators, so at most `n + 1`
/// (possibly empty) fields.
pub const MAX_CHANNELS: usize = MAX_LINE_LENGTH + 1;

/// Prefix of a device-side error report.
pub const ERROR_PREFIX: &str = "ERROR";

/// A device channel number.
///
/// Channels are 1-based on the wire. Position `i` in a status report
/// describes channel `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(pub u32);

impl Channel {
    /// Zero-based position of this channel in a status vector.
    ///
    /// Channel 0 does not exist on the device and has no position.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    /// Channel described by position `index` of a status vector.
    pub fn from_index(index: usize) -> Self {
        Channel(index as u32 + 1)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Device reported a fault. Carries the whole trimmed line.
    Error(String),
    /// Full channel-state vector, channel 1 first.
    Status(Vec<bool>),
    /// Anything else; ignored by the host.
    Unrecognized,
}

/// An outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On(Channel),
    Off(Channel),
    /// Ask the device for a fresh status report.
    Status,
}

impl Command {
    /// Build an `ON`/`OFF` command for the desired state.
    pub fn switch(channel: Channel, desired: bool) -> Self {
        if desired {
            Command::On(channel)
        } else {
            Command::Off(channel)
        }
    }

    /// Channel addressed by this command, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Command::On(c) | Command::Off(c) => Some(*c),
            Command::Status => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::On(c) => write!(f, "ON {}", c),
            Command::Off(c) => write!(f, "OFF {}", c),
            Command::Status => write!(f, "STATUS"),
        }
    }
}

/// Line terminator used by the device for inbound reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDelimiter {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineDelimiter {
    /// Delimiter bytes as they appear on the wire.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineDelimiter::Lf => b"\n",
            LineDelimiter::CrLf => b"\r\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_index_mapping() {
        assert_eq!(Channel(1).index(), Some(0));
        assert_eq!(Channel(8).index(), Some(7));
        assert_eq!(Channel(0).index(), None);
        assert_eq!(Channel::from_index(2), Channel(3));
    }

    #[test]
    fn test_command_switch() {
        assert_eq!(Command::switch(Channel(4), true), Command::On(Channel(4)));
        assert_eq!(Command::switch(Channel(4), false), Command::Off(Channel(4)));
        assert_eq!(Command::Status.channel(), None);
        assert_eq!(Command::Off(Channel(2)).to_string(), "OFF 2");
    }
}
