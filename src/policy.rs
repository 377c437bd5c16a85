//! Per-packet verdict decisions.
//!
//! Combines header parsing, QNAME decoding and blocklist matching into one
//! accept/drop decision. Anything that cannot be parsed is accepted: the
//! filter only ever drops queries it positively identified as blocked.

use std::sync::Arc;

use rand::{Rng, RngCore};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, FilterMode};
use crate::dns::{Blocker, DecodeError, Qname, decode};
use crate::packet::{HeaderError, header};

/// The decision returned to the packet source for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accept,
    Drop,
}

impl From<Verdict> for nfq::Verdict {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accept => Self::Accept,
            Verdict::Drop => Self::Drop,
        }
    }
}

/// Why a packet got its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a DNS query, or inspection is disabled.
    Passthrough,
    /// The IP/UDP header could not be read.
    Unparsed(HeaderError),
    /// A DNS query accepted by random sampling without inspection.
    Sampled,
    /// A DNS query whose name could not be decoded.
    Malformed(DecodeError),
    Allowed(Qname),
    Blocked(Qname),
}

impl Outcome {
    #[inline]
    pub const fn verdict(&self) -> Verdict {
        match self {
            Self::Blocked(_) => Verdict::Drop,
            _ => Verdict::Accept,
        }
    }
}

/// Something that turns a packet into a verdict.
///
/// The worker pool only talks to this trait, so it can be driven by
/// substitute policies in tests.
pub trait PacketPolicy: Send + Sync + 'static {
    /// Decide the verdict for the packet `id` with raw bytes `packet`.
    fn decide(&self, id: u32, packet: &[u8], rng: &mut dyn RngCore) -> Verdict;
}

/// The DNS blocklist policy.
#[derive(Debug, Clone)]
pub struct VerdictPolicy {
    mode: FilterMode,
    blocker: Arc<Blocker>,
    sample_skip_probability: f64,
    strict_ipv4: bool,
}

impl VerdictPolicy {
    /// Create a filtering policy.
    ///
    /// `sample_skip_probability` is clamped to `[0, 1]`; NaN counts as 0.
    pub fn new(blocker: Blocker, sample_skip_probability: f64) -> Self {
        let sample_skip_probability = if sample_skip_probability.is_nan() {
            0.0
        } else {
            sample_skip_probability.clamp(0.0, 1.0)
        };

        Self {
            mode: FilterMode::Filter,
            blocker: Arc::new(blocker),
            sample_skip_probability,
            strict_ipv4: false,
        }
    }

    /// Build the policy described by `config` around an already merged
    /// blocklist.
    pub fn from_config(config: &Config, blocker: Blocker) -> Self {
        Self::new(blocker, config.sample_skip_probability)
            .with_mode(config.mode)
            .with_strict_ipv4(config.strict_ipv4)
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_strict_ipv4(mut self, strict: bool) -> Self {
        self.strict_ipv4 = strict;
        self
    }

    pub const fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn blocker(&self) -> &Blocker {
        &self.blocker
    }

    /// Classify one packet.
    pub fn evaluate<R: RngCore + ?Sized>(&self, packet: &[u8], rng: &mut R) -> Outcome {
        if self.mode == FilterMode::AcceptAll {
            return Outcome::Passthrough;
        }

        let parsed = if self.strict_ipv4 {
            header::parse_strict(packet)
        } else {
            header::parse(packet)
        };
        let header = match parsed {
            Ok(header) => header,
            Err(err) => return Outcome::Unparsed(err),
        };

        if !header.is_dns_query() {
            return Outcome::Passthrough;
        }

        if rng.gen_bool(self.sample_skip_probability) {
            return Outcome::Sampled;
        }

        let qname = match decode(header.udp_payload(packet)) {
            Ok(qname) => qname,
            Err(err) => return Outcome::Malformed(err),
        };

        if self.mode == FilterMode::Filter && self.blocker.is_blocked(&qname) {
            Outcome::Blocked(qname)
        } else {
            Outcome::Allowed(qname)
        }
    }
}

impl PacketPolicy for VerdictPolicy {
    fn decide(&self, id: u32, packet: &[u8], rng: &mut dyn RngCore) -> Verdict {
        let outcome = self.evaluate(packet, rng);
        report(id, &outcome);
        outcome.verdict()
    }
}

/// Emit the observability event for one decision.
fn report(id: u32, outcome: &Outcome) {
    match outcome {
        Outcome::Passthrough => trace!(id, "Data packet handled"),
        Outcome::Unparsed(err) => trace!(id, %err, "Unparseable packet accepted"),
        Outcome::Sampled => debug!(id, "UDP DNS packet randomly accepted"),
        Outcome::Malformed(err) => {
            warn!(id, %err, "Error decoding QNAME");
            crate::metrics::record_decode_error();
        }
        Outcome::Allowed(qname) => debug!(id, domain = %qname, "UDP DNS packet accepted"),
        Outcome::Blocked(qname) => info!(id, domain = %qname, "UDP DNS packet blocked"),
    }
}
