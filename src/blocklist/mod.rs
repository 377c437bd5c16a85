//! Blocklist file parsing.
//!
//! Blocklists are plain text: one domain per line, `#` starts a comment
//! line, blank lines are skipped and surrounding whitespace is trimmed.
//! Entries are matched as exact names or parent domains by
//! [`Blocker`](crate::dns::Blocker), so `example.com` also covers
//! `ads.example.com`.
//!
//! # Example
//!
//! ```
//! use nfq_dnsfilter::blocklist::parse_domain_list;
//! use std::io::BufReader;
//!
//! let content = "# Comment\nexample.com\n\n  tracker.net  ";
//! let domains = parse_domain_list(&mut BufReader::new(content.as_bytes())).unwrap();
//! assert_eq!(domains, vec!["example.com", "tracker.net"]);
//! ```

pub mod loader;

use std::io::BufRead;

/// Error type for blocklist parsing operations.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// I/O error during reading.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("invalid line {line}: {reason}")]
    InvalidLine {
        /// Line number (1-indexed).
        line: usize,
        reason: String,
    },
}

/// Parse a domain list.
///
/// # Errors
///
/// Returns [`ParseError::Io`] if reading fails (including invalid UTF-8)
/// and [`ParseError::InvalidLine`] for entries that contain whitespace,
/// which can never match a decoded query name.
pub fn parse_domain_list(reader: &mut dyn BufRead) -> Result<Vec<String>, ParseError> {
    let mut domains = Vec::new();
    let mut line = String::new();
    let mut number = 0;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.contains(char::is_whitespace) {
            return Err(ParseError::InvalidLine {
                line: number,
                reason: format!("unexpected whitespace in {trimmed:?}"),
            });
        }

        domains.push(trimmed.to_string());
    }

    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(content: &str) -> Result<Vec<String>, ParseError> {
        parse_domain_list(&mut BufReader::new(content.as_bytes()))
    }

    #[test]
    fn test_simple_domains() {
        let domains = parse("example.com\ntest.org\nanother.net").unwrap();
        assert_eq!(domains, vec!["example.com", "test.org", "another.net"]);
    }

    #[test]
    fn test_with_comments() {
        let content = "# Comment line\nexample.com\n# Another comment\ntest.org";
        assert_eq!(parse(content).unwrap(), vec!["example.com", "test.org"]);
    }

    #[test]
    fn test_empty_lines() {
        let domains = parse("example.com\n\n\ntest.org\n\n").unwrap();
        assert_eq!(domains, vec!["example.com", "test.org"]);
    }

    #[test]
    fn test_whitespace_trimming() {
        let domains = parse("  example.com  \n\ttest.org\t\n  another.net").unwrap();
        assert_eq!(domains, vec!["example.com", "test.org", "another.net"]);
    }

    #[test]
    fn test_empty_file() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("# only\n  # comments\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_inline_hash_is_not_a_comment() {
        let domains = parse("example.com#not-a-comment").unwrap();
        assert_eq!(domains, vec!["example.com#not-a-comment"]);
    }

    #[test]
    fn test_windows_line_endings() {
        let domains = parse("example.com\r\ntest.org\r\n").unwrap();
        assert_eq!(domains, vec!["example.com", "test.org"]);
    }

    #[test]
    fn test_rejects_hosts_style_line() {
        let err = parse("example.com\n0.0.0.0 ads.example.com\n").unwrap_err();

        match err {
            ParseError::InvalidLine { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("ads.example.com"));
            }
            other => panic!("expected invalid line, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let bytes: &[u8] = b"example.com\n\xff\xfe\n";
        let result = parse_domain_list(&mut BufReader::new(bytes));
        assert!(matches!(result, Err(ParseError::Io(_))));
    }
}
