//! Command dispatch to the device.

use std::sync::Arc;

use log::{debug, error, info};
use serde::Deserialize;

use lightctl_protocol::{Channel, Command};

use crate::state::ChannelStateTable;
use crate::transport::LinkHandle;

/// When a commanded state is written into the table ahead of confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticUpdate {
    /// After every dispatch, even if the write failed.
    #[default]
    Always,
    /// Only after the write succeeded.
    OnSuccess,
}

/// Dispatcher behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub optimistic: OptimisticUpdate,
    /// Follow every command with `STATUS` to prompt a fresh report.
    pub refresh_after_write: bool,
}

/// Result of a fire-and-forget dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command was written to the link.
    Sent,
    /// The write failed; the failure has been logged.
    Failed,
}

/// Turns set-requests into wire commands.
///
/// Never waits for the device to acknowledge. Whatever it records in the
/// table is superseded by the next status report.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    link: LinkHandle,
    table: Arc<ChannelStateTable>,
    policy: DispatchPolicy,
}

impl CommandDispatcher {
    pub fn new(link: LinkHandle, table: Arc<ChannelStateTable>, policy: DispatchPolicy) -> Self {
        Self {
            link,
            table,
            policy,
        }
    }

    /// Send `ON`/`OFF` for `channel` and record the optimistic state.
    ///
    /// Channel numbers are not range-checked.
    pub async fn send_command(&self, channel: Channel, desired: bool) -> DispatchOutcome {
        let command = Command::switch(channel, desired);

        let outcome = match self.link.send(command).await {
            Ok(()) => {
                info!("Command sent: {}", command);
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("Error on write for channel {} ({}): {}", channel, command, e);
                DispatchOutcome::Failed
            }
        };

        let apply = match self.policy.optimistic {
            OptimisticUpdate::Always => true,
            OptimisticUpdate::OnSuccess => outcome == DispatchOutcome::Sent,
        };
        if apply {
            if let Some(index) = channel.index() {
                self.table.set_optimistic(index, desired);
            }
        } else {
            debug!("Skipping optimistic update for channel {} after failed write", channel);
        }

        if self.policy.refresh_after_write {
            self.request_status().await;
        }

        outcome
    }

    /// Ask the device for a fresh status report.
    pub async fn request_status(&self) -> DispatchOutcome {
        match self.link.send(Command::Status).await {
            Ok(()) => {
                info!("Command sent: {}", Command::Status);
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("Error on write ({}): {}", Command::Status, e);
                DispatchOutcome::Failed
            }
        }
    }
}
