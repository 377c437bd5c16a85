//! Packet intake loop.
//!
//! Pulls packets from a [`PacketSource`] and hands them to the dispatcher
//! until `running` is cleared or the dispatcher shuts down. Designed with
//! trait-based dependencies for testability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::dispatch::{Admission, PacketIntake};
use crate::error::{DispatchError, Result};
use crate::packet::QueuedPacket;
use crate::queue::PacketSource;

/// Counters for one run of the intake loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeStats {
    pub received: u64,
    pub bypassed: u64,
    pub receive_errors: u64,
}

/// Run the intake loop on the calling thread.
///
/// `idle` is how long to sleep when the source has nothing ready. Receive
/// errors are logged and retried; they never stop the loop.
pub fn run_intake<P, S>(
    source: &S,
    intake: &PacketIntake<P>,
    running: &AtomicBool,
    idle: Duration,
) -> Result<IntakeStats>
where
    P: QueuedPacket,
    S: PacketSource<P> + ?Sized,
{
    let mut stats = IntakeStats::default();

    while running.load(Ordering::SeqCst) {
        let packet = match source.next_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                thread::sleep(idle);
                continue;
            }
            Err(err) => {
                warn!(%err, "Failed to receive packet");
                stats.receive_errors += 1;
                thread::sleep(idle);
                continue;
            }
        };

        stats.received += 1;
        match intake.on_packet(packet) {
            Ok(Admission::Queued) => {}
            Ok(Admission::Bypassed) => stats.bypassed += 1,
            Err(DispatchError::ShutDown) => {
                warn!("Dispatcher shut down, stopping intake");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(
        received = stats.received,
        bypassed = stats.bypassed,
        receive_errors = stats.receive_errors,
        "Packet intake stopped"
    );
    Ok(stats)
}
