//! Netfilter queue backend.
//!
//! One netlink socket serves both directions, so it sits behind a mutex and
//! is switched to non-blocking mode: the receive side never holds the lock
//! while waiting, and workers can submit verdicts in between polls.

use std::io;

use nfq::{Message, Queue};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{PacketSource, VerdictSink};
use crate::config::KernelSettings;
use crate::error::{QueueError, Result};
use crate::packet::QueuedPacket;
use crate::policy::Verdict;

/// A packet received from the kernel, waiting for its verdict.
///
/// Identified by the kernel's packet id, so log events line up with
/// netfilter traces.
pub struct NfPacket {
    id: u32,
    message: Message,
}

impl NfPacket {
    pub fn new(message: Message) -> Self {
        Self {
            id: message.get_packet_id(),
            message,
        }
    }
}

impl QueuedPacket for NfPacket {
    #[inline]
    fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    fn payload(&self) -> &[u8] {
        self.message.get_payload()
    }
}

/// Production packet source and verdict sink backed by NFQUEUE.
pub struct NfQueue {
    queue: Mutex<Queue>,
    queue_num: u16,
}

impl NfQueue {
    /// Open the netlink socket, bind `queue_num` and apply `settings`.
    ///
    /// Requires `CAP_NET_ADMIN`. Any failure here is fatal for the caller.
    pub fn open(queue_num: u16, settings: &KernelSettings) -> Result<Self> {
        let mut queue = Queue::open().map_err(QueueError::Open)?;
        queue
            .bind(queue_num)
            .map_err(|source| QueueError::Bind { queue_num, source })?;

        queue
            .set_queue_max_len(queue_num, settings.max_queue_len)
            .map_err(option_error("queue_max_len"))?;
        queue
            .set_copy_range(queue_num, settings.copy_range)
            .map_err(option_error("copy_range"))?;
        queue
            .set_fail_open(queue_num, settings.fail_open)
            .map_err(option_error("fail_open"))?;
        queue
            .set_recv_enobufs(!settings.no_enobufs)
            .map_err(option_error("recv_enobufs"))?;
        queue.set_nonblocking(true);

        info!(
            queue_num,
            max_queue_len = settings.max_queue_len,
            copy_range = settings.copy_range,
            fail_open = settings.fail_open,
            "Bound netfilter queue"
        );

        Ok(Self {
            queue: Mutex::new(queue),
            queue_num,
        })
    }

    pub const fn queue_num(&self) -> u16 {
        self.queue_num
    }
}

fn option_error(option: &'static str) -> impl FnOnce(io::Error) -> QueueError {
    move |source| QueueError::SetOption { option, source }
}

impl PacketSource<NfPacket> for NfQueue {
    fn next_packet(&self) -> Result<Option<NfPacket>> {
        let received = self.queue.lock().recv();
        match received {
            Ok(message) => Ok(Some(NfPacket::new(message))),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(QueueError::Recv(err).into()),
        }
    }
}

impl VerdictSink<NfPacket> for NfQueue {
    fn submit(&self, packet: NfPacket, verdict: Verdict) -> Result<()> {
        let NfPacket { mut message, .. } = packet;
        message.set_verdict(verdict.into());
        self.queue
            .lock()
            .verdict(message)
            .map_err(QueueError::Verdict)?;
        Ok(())
    }
}

impl Drop for NfQueue {
    fn drop(&mut self) {
        let queue_num = self.queue_num;
        if let Err(err) = self.queue.get_mut().unbind(queue_num) {
            debug!(queue_num, %err, "Failed to unbind netfilter queue");
        }
    }
}
