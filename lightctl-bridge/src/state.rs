//! Authoritative channel-state table.
//!
//! Written by the read loop (whole-table replacement on every status
//! report) and by the command dispatcher (single-cell optimistic updates).
//! Both writers take the write lock, so a reader sees either the previous
//! table or the new one, never a mix.

use lightctl_protocol::{Channel, MAX_CHANNELS};
use log::{debug, trace};
use parking_lot::RwLock;

/// Shared on/off state of every device channel.
///
/// Position `i` holds channel `i + 1`. A channel outside the table reads
/// as off; there is no "unknown" state.
#[derive(Debug, Default)]
pub struct ChannelStateTable {
    states: RwLock<Vec<bool>>,
}

impl ChannelStateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a full status report, discarding the previous contents.
    pub fn replace(&self, states: Vec<bool>) {
        trace!("Replacing channel table with {} entries", states.len());
        *self.states.write() = states;
    }

    /// State at position `index`, or `false` if out of range.
    pub fn get(&self, index: usize) -> bool {
        self.states.read().get(index).copied().unwrap_or(false)
    }

    /// State of a 1-based channel, or `false` if unknown.
    pub fn channel(&self, channel: Channel) -> bool {
        channel.index().map(|i| self.get(i)).unwrap_or(false)
    }

    /// Record a commanded state before the device confirms it.
    ///
    /// Grows the table with `false` entries when `index` is past the end.
    /// Positions no status line can report (`MAX_CHANNELS` and beyond) are
    /// not recorded. The next [`replace`](Self::replace) overwrites whatever
    /// is set here.
    pub fn set_optimistic(&self, index: usize, value: bool) {
        if index >= MAX_CHANNELS {
            debug!(
                "Skipping optimistic update at position {}: beyond {} reportable channels",
                index, MAX_CHANNELS
            );
            return;
        }
        let mut states = self.states.write();
        if index >= states.len() {
            states.resize(index + 1, false);
        }
        states[index] = value;
    }

    /// Copy of the current table.
    pub fn snapshot(&self) -> Vec<bool> {
        self.states.read().clone()
    }

    /// Number of channels in the most recent report (plus optimistic growth).
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}
