//! Receipt wait.

use std::io::Write;
use std::time::Duration;
use tracing::debug;

use super::ProbeError;
use super::spinner::Spinner;
use crate::receipt::{PacketReceipt, ReceiptStatus};

/// Polls a receipt until the transport resolves it.
///
/// There is no local deadline. Only the transport can turn an in-flight
/// receipt into `Failed`.
pub struct ReceiptWaiter {
    poll_interval: Duration,
}

impl ReceiptWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Wait for a terminal status, drawing one spinner frame per poll.
    pub async fn await_terminal<W: Write>(
        &self,
        receipt: &PacketReceipt,
        console: &mut W,
    ) -> Result<ReceiptStatus, ProbeError> {
        let mut spinner = Spinner::new();
        while receipt.status() == ReceiptStatus::InFlight {
            tokio::time::sleep(self.poll_interval).await;
            spinner.tick(console)?;
        }

        let status = receipt.status();
        debug!(packet_hash = %receipt.packet_hash(), status = %status, "Receipt resolved");
        Ok(status)
    }
}
