//! DNS-related modules.

pub mod blocker;
pub mod qname;

pub use blocker::{Blocker, is_blocked};
pub use qname::{DecodeError, Qname, decode};
