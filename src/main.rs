//! nfq-dnsfilter - Entry point.
//!
//! Binds a netfilter queue, inspects the DNS queries the kernel hands us
//! and drops the ones whose name is on the blocklist. Everything else is
//! accepted. Requires `CAP_NET_ADMIN` and an iptables/nftables rule such as
//! `iptables -A OUTPUT -p udp --dport 53 -j NFQUEUE --queue-num 0`.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use nfq_dnsfilter::blocklist::loader::FileLoader;
use nfq_dnsfilter::config::{Config, LogOutput, LogSettings};
use nfq_dnsfilter::dispatch::Dispatcher;
use nfq_dnsfilter::dns::Blocker;
use nfq_dnsfilter::policy::VerdictPolicy;
use nfq_dnsfilter::queue::{NfPacket, NfQueue, VerdictSink};
use nfq_dnsfilter::server::run_intake;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let writer = match settings.output {
        LogOutput::None => BoxMakeWriter::new(std::io::sink),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::File => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&settings.file)
                .with_context(|| format!("Failed to open log file {}", settings.file.display()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(settings.output == LogOutput::Stdout)
        .with_thread_names(true)
        .init();

    Ok(())
}

/// Merge inline entries and blocklist files into one matcher.
async fn load_blocker(config: &Config) -> Result<Blocker> {
    let mut domains = config.blocklist.clone();
    let from_files = FileLoader::load_all(&config.blocklist_files)
        .await
        .context("Failed to load blocklist files")?;
    domains.extend(from_files);

    info!(
        inline = config.blocklist.len(),
        files = config.blocklist_files.len(),
        total = domains.len(),
        "Blocklist loaded"
    );
    Ok(Blocker::new(domains))
}

async fn run(config: Config) -> Result<()> {
    nfq_dnsfilter::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!(
        queue_num = config.queue_num,
        mode = ?config.mode,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        sample_skip_probability = config.sample_skip_probability,
        "Starting DNS filter"
    );

    let blocker = load_blocker(&config).await?;
    let policy = VerdictPolicy::from_config(&config, blocker);

    let queue = Arc::new(
        NfQueue::open(config.queue_num, &config.kernel)
            .with_context(|| format!("Failed to open netfilter queue {}", config.queue_num))?,
    );
    let sink: Arc<dyn VerdictSink<NfPacket>> = queue.clone();
    let dispatcher = Dispatcher::start(&config.dispatcher(), Arc::new(policy), sink)
        .context("Failed to start verdict workers")?;

    let running = Arc::new(AtomicBool::new(true));
    let idle = config.kernel.poll_interval();
    let intake = dispatcher.intake();
    let intake_running = Arc::clone(&running);
    let intake_queue = Arc::clone(&queue);
    let mut intake_handle = tokio::task::spawn_blocking(move || {
        run_intake(intake_queue.as_ref(), &intake, &intake_running, idle)
    });

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down...");
            None
        }
        result = &mut intake_handle => Some(result),
    };

    running.store(false, Ordering::SeqCst);
    let intake_result = match finished {
        Some(result) => result,
        None => intake_handle.await,
    };
    match intake_result {
        Ok(Ok(stats)) => info!(received = stats.received, "Intake finished"),
        Ok(Err(err)) => error!("Intake failed: {err}"),
        Err(err) => error!("Intake task failed: {err}"),
    }

    let stats = tokio::task::spawn_blocking(move || dispatcher.shutdown())
        .await
        .context("Dispatcher shutdown task failed")?
        .context("Dispatcher shutdown failed")?;

    if stats.failed > 0 {
        warn!(failed = stats.failed, "Some verdicts fell back to accept");
    }
    info!(
        enqueued = stats.enqueued,
        accepted = stats.accepted,
        dropped = stats.dropped,
        bypassed = stats.bypassed,
        "Shutdown complete."
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let config = Config::load(&*config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    init_logging(&config.log)?;
    run(config).await
}
