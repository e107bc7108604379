//! Read loop: inbound lines into the state table and out to accessories.

use std::sync::Arc;

use log::{debug, error, info, trace};
use tokio::sync::mpsc;

use lightctl_protocol::{parse_line, Frame};

use crate::accessory::AccessoryRegistry;
use crate::state::ChannelStateTable;
use crate::transport::LinkEvent;

/// Applies device reports to the table and fans them out.
///
/// The only writer of whole-table replacements.
#[derive(Debug, Clone)]
pub struct ReconciliationDriver {
    table: Arc<ChannelStateTable>,
    registry: Arc<AccessoryRegistry>,
}

impl ReconciliationDriver {
    pub fn new(table: Arc<ChannelStateTable>, registry: Arc<AccessoryRegistry>) -> Self {
        Self { table, registry }
    }

    /// Parse one line and apply it. Returns the decoded frame.
    pub fn handle_line(&self, line: &str) -> Frame {
        debug!("Received data: {}", line);
        let frame = parse_line(line);

        match &frame {
            Frame::Error(message) => {
                error!("Controller reported an error: {}", message);
            }
            Frame::Status(states) => {
                self.table.replace(states.clone());
                self.registry.push_states();
            }
            Frame::Unrecognized => {
                trace!("Ignoring unrecognized line");
            }
        }

        frame
    }

    /// Consume link events until the link closes.
    pub async fn run(self, mut events: mpsc::Receiver<LinkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::Opened => info!("Serial port opened"),
                LinkEvent::Line(line) => {
                    self.handle_line(&line);
                }
                LinkEvent::Error(message) => error!("Serial port error: {}", message),
                LinkEvent::Closed => {
                    info!("Serial port closed");
                    break;
                }
            }
        }
    }
}
