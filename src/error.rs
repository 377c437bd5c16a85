//! Error types for the NFQUEUE DNS filter.

use std::io;

use thiserror::Error;

/// Main error type for filter operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("packet queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("blocklist error: {0}")]
    Blocklist(#[from] crate::blocklist::loader::LoadError),

    #[error("DNS protocol error: {0}")]
    Protocol(#[from] hickory_proto::error::ProtoError),

    #[error("packet construction failed: {0}")]
    Packet(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("workers must be greater than 0")]
    ZeroWorkers,

    #[error("queue_capacity must be greater than 0")]
    ZeroQueueCapacity,

    #[error("sample_skip_probability must be within [0, 1], got {0}")]
    InvalidSampleProbability(f64),

    #[error("kernel.copy_range must be greater than 0")]
    ZeroCopyRange,

    #[error("kernel.poll_interval_us must be greater than 0")]
    ZeroPollInterval,

    #[error("blocklist entry cannot be empty")]
    EmptyBlocklistEntry,

    #[error("blocklist entry {0:?} contains whitespace")]
    InvalidBlocklistEntry(String),

    #[error("log.file cannot be empty when log.output = \"file\"")]
    EmptyLogFile,
}

/// Errors raised by the kernel packet queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to open netfilter queue socket: {0}")]
    Open(#[source] io::Error),

    #[error("failed to bind queue {queue_num}: {source}")]
    Bind {
        queue_num: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to set queue option {option}: {source}")]
    SetOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to receive packet: {0}")]
    Recv(#[source] io::Error),

    #[error("failed to submit verdict: {0}")]
    Verdict(#[source] io::Error),
}

/// Worker pool and queue lifecycle errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    ShutDown,

    #[error("worker count must be greater than 0")]
    ZeroWorkers,

    #[error("queue capacity must be greater than 0")]
    ZeroCapacity,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
