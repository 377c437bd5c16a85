//! Raw packet handling: header parsing and the packet abstraction shared by
//! the dispatcher and the queue adapters.

pub mod builder;
pub mod header;

pub use builder::PacketBuilder;
pub use header::{HeaderError, ParsedHeader, parse, parse_strict};

/// A packet waiting for a verdict.
///
/// Implemented by [`PacketView`] and by the kernel queue adapter's message
/// wrapper, so the dispatcher does not care where packets come from.
pub trait QueuedPacket: Send + 'static {
    /// Opaque identifier assigned by the packet source.
    fn id(&self) -> u32;

    /// The raw packet, starting at the IP header.
    fn payload(&self) -> &[u8];
}

/// An owned, immutable packet buffer with its source-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketView {
    id: u32,
    data: Box<[u8]>,
}

impl PacketView {
    pub fn new(id: u32, data: impl Into<Box<[u8]>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

impl QueuedPacket for PacketView {
    #[inline]
    fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    fn payload(&self) -> &[u8] {
        &self.data
    }
}

