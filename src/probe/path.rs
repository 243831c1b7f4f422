//! Path discovery wait.

use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

use super::ProbeError;
use super::spinner::Spinner;
use crate::address::DestinationHash;
use crate::transport::Transport;

/// Waits until the transport knows a path to a destination.
///
/// Issues at most one path request and then polls without a deadline;
/// cancellation is the caller's business.
pub struct PathWaiter<'a, T> {
    transport: &'a T,
    poll_interval: Duration,
}

impl<'a, T: Transport> PathWaiter<'a, T> {
    pub fn new(transport: &'a T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    /// Return once a path to `destination` is known.
    pub async fn await_path<W: Write>(
        &self,
        destination: &DestinationHash,
        console: &mut W,
    ) -> Result<(), ProbeError> {
        if self.transport.has_path(destination).await? {
            debug!(destination = %destination, "Path already known");
            return Ok(());
        }

        self.transport.request_path(destination).await?;
        info!(destination = %destination, "Path requested");
        write!(console, "Path to {} requested   ", destination)?;
        console.flush()?;

        let mut spinner = Spinner::new();
        let mut polls = 0u64;
        while !self.transport.has_path(destination).await? {
            tokio::time::sleep(self.poll_interval).await;
            spinner.tick(console)?;
            polls += 1;
        }

        debug!(destination = %destination, polls, "Path discovered");
        Ok(())
    }
}
