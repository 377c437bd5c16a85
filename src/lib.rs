//! nfq-dnsfilter - an NFQUEUE DNS blocklist filter.
//!
//! Packets redirected to a netfilter queue are inspected in userspace: UDP
//! datagrams to port 53 have their first question name decoded and matched
//! against a blocklist. Blocked queries are dropped, everything else
//! (including anything that fails to parse) is accepted.
//!
//! # Architecture
//!
//! - [`packet`]: IPv4/UDP header parsing and test packet construction
//! - [`dns`]: QNAME decoding and blocklist matching
//! - [`policy`]: The per-packet accept/drop decision
//! - [`dispatch`]: Bounded work queue and verdict worker pool
//! - [`queue`]: Packet source and verdict sink abstraction, NFQUEUE backend
//! - [`server`]: The intake loop feeding the dispatcher
//! - [`blocklist`]: Blocklist file loading
//! - [`config`]: Configuration loading and validation
//! - [`metrics`]: Prometheus counters
//! - [`error`]: Error types
//!
//! # Testing
//!
//! The kernel queue sits behind the [`queue::PacketSource`] and
//! [`queue::VerdictSink`] traits, so the whole pipeline runs in tests
//! without root privileges:
//!
//! ```rust
//! use nfq_dnsfilter::dns::{Blocker, decode};
//!
//! let blocker = Blocker::new(["example.com"]);
//! let mut message = vec![0u8; 12];
//! message.extend_from_slice(b"\x03ads\x07example\x03com\x00");
//!
//! let qname = decode(&message).unwrap();
//! assert_eq!(qname.as_bytes(), b"ads.example.com");
//! assert!(blocker.is_blocked(&qname));
//! ```

pub mod blocklist;
pub mod config;
pub mod dispatch;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod policy;
pub mod queue;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
