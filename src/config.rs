//! Configuration loading and validation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::{Backpressure, DispatcherConfig};
use crate::error::{ConfigError, Result, ValidationError};

/// Main configuration for the filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// NFQUEUE number to bind.
    #[serde(default)]
    pub queue_num: u16,

    /// What to do with DNS queries.
    #[serde(default)]
    pub mode: FilterMode,

    /// Blocked domains. Each entry also blocks all of its subdomains.
    #[serde(default)]
    pub blocklist: Vec<String>,

    /// Domain-list files merged after the inline entries.
    #[serde(default)]
    pub blocklist_files: Vec<PathBuf>,

    /// Probability of accepting a DNS query without inspecting it.
    #[serde(default)]
    pub sample_skip_probability: f64,

    /// Number of verdict worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the queue between the packet source and the workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bound on how long intake waits for queue space. When unset, intake
    /// blocks until a worker frees a slot.
    #[serde(default)]
    pub enqueue_timeout_ms: Option<u64>,

    /// Reject packets whose IP version nibble is not 4.
    #[serde(default)]
    pub strict_ipv4: bool,

    /// Seed for the per-worker random generators. Random when unset.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    #[serde(default)]
    pub kernel: KernelSettings,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// How DNS queries are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Accept every packet without looking at it.
    AcceptAll,
    /// Decode and log query names, accept everything.
    Inspect,
    /// Drop queries for blocked domains.
    #[default]
    Filter,
}

/// Options applied to the kernel queue at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelSettings {
    /// Maximum number of packets the kernel holds for this queue.
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: u32,

    /// Number of packet bytes copied to userspace.
    #[serde(default = "default_copy_range")]
    pub copy_range: u16,

    /// Stop the socket from reporting ENOBUFS when the kernel drops
    /// messages it could not deliver.
    #[serde(default = "default_no_enobufs")]
    pub no_enobufs: bool,

    /// Let the kernel accept packets when its queue is full instead of
    /// dropping them.
    #[serde(default)]
    pub fail_open: bool,

    /// Idle sleep between polls when no packet is ready, in microseconds.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            max_queue_len: default_max_queue_len(),
            copy_range: default_copy_range(),
            no_enobufs: default_no_enobufs(),
            fail_open: false,
            poll_interval_us: default_poll_interval_us(),
        }
    }
}

impl KernelSettings {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Discard all log output.
    None,
    #[default]
    Stdout,
    /// Append to `log.file`.
    File,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    /// Default level directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: LogOutput::default(),
            file: default_log_file(),
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

const fn default_workers() -> usize {
    4
}

const fn default_queue_capacity() -> usize {
    1000
}

const fn default_max_queue_len() -> u32 {
    0xFFFF
}

const fn default_copy_range() -> u16 {
    0xFFFF
}

const fn default_no_enobufs() -> bool {
    true
}

const fn default_poll_interval_us() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("log.txt")
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::ZeroWorkers);
        }

        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroQueueCapacity);
        }

        if !(0.0..=1.0).contains(&self.sample_skip_probability) {
            return Err(ValidationError::InvalidSampleProbability(
                self.sample_skip_probability,
            ));
        }

        if self.kernel.copy_range == 0 {
            return Err(ValidationError::ZeroCopyRange);
        }

        if self.kernel.poll_interval_us == 0 {
            return Err(ValidationError::ZeroPollInterval);
        }

        if self.blocklist.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ValidationError::EmptyBlocklistEntry);
        }

        // Names are matched byte for byte, so padded entries never match.
        if let Some(entry) = self
            .blocklist
            .iter()
            .find(|entry| entry.contains(char::is_whitespace))
        {
            return Err(ValidationError::InvalidBlocklistEntry(entry.clone()));
        }

        if self.log.output == LogOutput::File && self.log.file.as_os_str().is_empty() {
            return Err(ValidationError::EmptyLogFile);
        }

        Ok(())
    }

    /// Worker pool settings derived from this configuration.
    pub fn dispatcher(&self) -> DispatcherConfig {
        let backpressure = self
            .enqueue_timeout_ms
            .map_or(Backpressure::Block, |ms| {
                Backpressure::Timeout(Duration::from_millis(ms))
            });

        DispatcherConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            backpressure,
            rng_seed: self.rng_seed,
        }
    }
}
