//! Packet source and verdict sink abstraction.
//!
//! Provides a trait-based abstraction over the kernel packet queue to enable:
//! - Testing without netfilter or root privileges
//! - Different packet backends

mod nfqueue;

pub use nfqueue::{NfPacket, NfQueue};

use crate::error::Result;
use crate::packet::QueuedPacket;
use crate::policy::Verdict;

/// Trait for packet sources.
pub trait PacketSource<P: QueuedPacket>: Send + Sync {
    /// Receive the next packet.
    /// Returns `Ok(None)` when no packet is ready yet.
    fn next_packet(&self) -> Result<Option<P>>;
}

/// Trait for verdict sinks.
pub trait VerdictSink<P: QueuedPacket>: Send + Sync + 'static {
    /// Hand `packet` back to its source with `verdict`.
    fn submit(&self, packet: P, verdict: Verdict) -> Result<()>;
}
