//! Domain blocking with exact and subdomain matching.
//!
//! An entry blocks the domain itself and every name below it:
//! `example.com` blocks `example.com` and `www.example.com`, but not
//! `notexample.com` or `example.com.evil.com`. Comparison is byte-exact,
//! so matching is case-sensitive.

use super::qname::Qname;

/// Check `name` against `blocklist` without precomputing anything.
///
/// Returns true if `name` equals an entry or ends with `"." + entry`.
pub fn is_blocked<S: AsRef<str>>(name: &[u8], blocklist: &[S]) -> bool {
    blocklist
        .iter()
        .any(|entry| matches_entry(name, entry.as_ref().as_bytes()))
}

#[inline]
fn matches_entry(name: &[u8], entry: &[u8]) -> bool {
    if name.len() == entry.len() {
        return name == entry;
    }
    name.len() > entry.len()
        && name.ends_with(entry)
        && name[name.len() - entry.len() - 1] == b'.'
}

/// A compiled blocklist for repeated lookups.
///
/// Entries keep their configured order. Each one is stored together with
/// its dotted suffix form so lookups do no allocation.
#[derive(Debug, Clone, Default)]
pub struct Blocker {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    /// The domain as configured, e.g. `example.com`.
    exact: Box<[u8]>,
    /// The domain with a leading dot, e.g. `.example.com`.
    suffix: Box<[u8]>,
}

impl Blocker {
    /// Create a new blocker from a list of domains.
    ///
    /// Empty entries are skipped; they would otherwise match only the root
    /// name, which never carries a blockable query.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = domains
            .into_iter()
            .filter(|domain| !domain.as_ref().is_empty())
            .map(|domain| {
                let exact = domain.as_ref().as_bytes();
                let mut suffix = Vec::with_capacity(exact.len() + 1);
                suffix.push(b'.');
                suffix.extend_from_slice(exact);
                Entry {
                    exact: exact.into(),
                    suffix: suffix.into_boxed_slice(),
                }
            })
            .collect();

        Self { entries }
    }

    /// Check if a decoded name is blocked.
    #[inline]
    pub fn is_blocked(&self, name: &Qname) -> bool {
        self.is_blocked_bytes(name.as_bytes())
    }

    /// Check raw name bytes, labels joined by `.`.
    #[inline]
    pub fn is_blocked_bytes(&self, name: &[u8]) -> bool {
        self.entries
            .iter()
            .any(|entry| name == &*entry.exact || name.ends_with(&entry.suffix))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
