use std::path::PathBuf;

use anyhow::Context;
use billing_sim::config::{Config, MonitorConfig};
use billing_sim::load::{CycleDriver, ResourceOrchestrator, RetryPolicy};
use billing_sim::metrics::{
    ConsoleDashboard, DockerStatsSource, JsonLinesRecorder, JsonLinesSource, SamplerSummary,
    SnapshotSource, Tee, UsageSampler,
};
use billing_sim::ops::JobRegistry;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

#[derive(clap::Parser, Debug)]
#[clap(version, about = "Synthetic billing load and container usage sampling")]
struct Args {
    /// TOML file overriding the built-in defaults
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Consume RAM, CPU, disk and network in repeated cycles
    Load {
        #[clap(long)]
        ram_mb: Option<u64>,
        #[clap(long)]
        cpu_secs: Option<u64>,
        #[clap(long)]
        disk_mb: Option<u64>,
        #[clap(long)]
        net_secs: Option<u64>,
        /// Download target for the network job
        #[clap(long)]
        url: Option<String>,
        /// Stop after this many successful cycles
        #[clap(long)]
        cycles: Option<u64>,
    },
    /// Sample a container's usage stats and render a dashboard
    Monitor {
        /// Docker Engine API base URL
        #[clap(long)]
        endpoint: Option<String>,
        #[clap(long)]
        container: Option<String>,
        /// Replay a recorded JSON-lines file instead of a live stream
        #[clap(long, conflicts_with = "record")]
        replay: Option<PathBuf>,
        /// Append raw snapshots to a JSON-lines file (default location if no path)
        #[clap(long, num_args = 0..=1)]
        record: Option<Option<PathBuf>>,
        /// Number of ticks kept in the dashboard window
        #[clap(long)]
        history: Option<usize>,
        /// Stop after this many ticks
        #[clap(long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };

    let cancel = CancellationToken::new();
    match args.command {
        Command::Load {
            ram_mb,
            cpu_secs,
            disk_mb,
            net_secs,
            url,
            cycles,
        } => {
            let load = &mut config.load;
            if let Some(v) = ram_mb {
                load.profile.ram_mb = v;
            }
            if let Some(v) = cpu_secs {
                load.profile.cpu_duration_secs = v;
            }
            if let Some(v) = disk_mb {
                load.profile.disk_mb = v;
            }
            if let Some(v) = net_secs {
                load.profile.net_duration_secs = v;
            }
            if let Some(v) = url {
                load.net_url = v;
            }
            if cycles.is_some() {
                load.cycle_limit = cycles;
            }
            run_load(&config, cancel).await
        }
        Command::Monitor {
            endpoint,
            container,
            replay,
            record,
            history,
            ticks,
        } => {
            let monitor = &mut config.monitor;
            if let Some(v) = endpoint {
                monitor.endpoint = v;
            }
            if let Some(v) = container {
                monitor.container = v;
            }
            if let Some(v) = history {
                monitor.history_capacity = v;
            }
            if let Some(path) = record {
                monitor.record_path = Some(path.unwrap_or_else(MonitorConfig::default_record_path));
            }
            spawn_interrupt_handler(cancel.clone(), None);
            let summary = run_monitor(&config.monitor, replay, ticks, cancel).await?;
            info!(
                "Sampler stopped ({:?}): {} ticks, {} skipped, {} field faults",
                summary.stop_reason, summary.ticks, summary.skipped, summary.faults
            );
            Ok(())
        }
    }
}

async fn run_load(config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let orchestrator =
        ResourceOrchestrator::new(&config.load).context("building the load generator")?;
    spawn_interrupt_handler(cancel.clone(), Some(orchestrator.registry().clone()));

    let driver = CycleDriver::new(orchestrator, RetryPolicy::from_config(&config.load))
        .with_cycle_limit(config.load.cycle_limit);
    let summary = driver.run(&cancel).await;
    info!(
        "Load generator exited ({:?}) after {} cycle(s), {} failed attempt(s)",
        summary.exit, summary.state.completed, summary.state.failures
    );
    Ok(())
}

async fn run_monitor(
    config: &MonitorConfig,
    replay: Option<PathBuf>,
    ticks: Option<u64>,
    cancel: CancellationToken,
) -> anyhow::Result<SamplerSummary> {
    match replay {
        Some(path) => {
            let source = JsonLinesSource::open(&path, config.replay_interval()).await?;
            sample(source, config, ticks, cancel).await
        }
        None => {
            let client = reqwest::Client::new();
            let source = DockerStatsSource::connect(&client, &config.endpoint, &config.container)
                .await
                .with_context(|| format!("connecting to container {}", config.container))?;
            sample(source, config, ticks, cancel).await
        }
    }
}

async fn sample<S: SnapshotSource>(
    source: S,
    config: &MonitorConfig,
    ticks: Option<u64>,
    cancel: CancellationToken,
) -> anyhow::Result<SamplerSummary> {
    let dashboard = ConsoleDashboard::new(config.history_capacity);
    let summary = match &config.record_path {
        Some(path) => {
            let recorder = JsonLinesRecorder::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            let sink = Tee {
                first: dashboard,
                second: recorder,
            };
            let (summary, sink) = UsageSampler::new(source, sink, cancel)
                .with_tick_limit(ticks)
                .run()
                .await;
            info!("Recorded {} snapshot(s)", sink.second.written());
            summary
        }
        None => {
            UsageSampler::new(source, dashboard, cancel)
                .with_tick_limit(ticks)
                .run()
                .await
                .0
        }
    };
    Ok(summary)
}

fn spawn_interrupt_handler(cancel: CancellationToken, registry: Option<JobRegistry>) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for interrupt: {}", err);
            return;
        }
        info!("Interrupt received, stopping");
        if let Some(registry) = registry {
            for job in registry.in_flight() {
                info!("[{}] abandoning job {} of cycle {}", job.kind, job.id, job.cycle);
            }
            registry.cancel_all();
        }
        cancel.cancel();
    });
}
