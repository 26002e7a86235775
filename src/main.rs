//! hostsampler - samples Linux host metrics at a fixed interval.
//!
//! Runs every registered sampler once per pass and writes the pass as one
//! JSON object per line (to stdout or a log file), or as readable text.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use hostsampler::logging::{PassRecord, SampleLogger};
use hostsampler::{
    collect_pass, collect_pass_parallel, SampleValue, Sampler, SamplerConfig, SamplerKind, Value,
};
use num_format::{Locale, ToFormattedString};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Linux host metric sampler
#[derive(Parser, Debug)]
#[command(name = "hostsampler")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sampling interval in seconds
    #[arg(short = 'i', long, default_value = "1")]
    interval: f64,

    /// Stop after this many passes (default: run until interrupted)
    #[arg(short = 'c', long)]
    count: Option<u64>,

    /// Write passes to this file as JSON Lines instead of stdout
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Output format on stdout
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Only run these samplers (repeatable)
    #[arg(long = "only", value_name = "SAMPLER")]
    only: Vec<SamplerKind>,

    /// Print the metric descriptor table and exit
    #[arg(long)]
    list: bool,

    /// Run samplers concurrently on blocking worker threads
    #[arg(long)]
    parallel: bool,

    /// Root of the proc filesystem
    #[arg(long, default_value = "/proc")]
    proc_root: PathBuf,

    /// Root of the sys filesystem
    #[arg(long, default_value = "/sys")]
    sys_root: PathBuf,

    /// Root of the cgroup hierarchy
    #[arg(long, default_value = "/sys/fs/cgroup")]
    cgroup_root: PathBuf,

    /// Enable debug diagnostics (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

impl Args {
    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig::new()
            .with_proc_root(&self.proc_root)
            .with_sys_root(&self.sys_root)
            .with_cgroup_root(&self.cgroup_root)
    }

    fn kinds(&self) -> Vec<SamplerKind> {
        if self.only.is_empty() {
            SamplerKind::ALL.to_vec()
        } else {
            SamplerKind::ALL
                .into_iter()
                .filter(|kind| self.only.contains(kind))
                .collect()
        }
    }
}

/// Where each pass goes
enum Output {
    Log(SampleLogger<BufWriter<File>>),
    Stdout(SampleLogger<io::Stdout>),
    Text,
}

impl Output {
    fn emit(&mut self, record: &PassRecord<'_>) -> Result<()> {
        match self {
            Output::Log(logger) => logger.log(record),
            Output::Stdout(logger) => {
                logger.log(record)?;
                logger.flush()
            }
            Output::Text => {
                print_samples(record);
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            Output::Log(logger) => logger.flush(),
            Output::Stdout(logger) => logger.flush(),
            Output::Text => Ok(()),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn format_value(value: Value) -> String {
    match value {
        Value::Integer(v) => v.to_formatted_string(&Locale::en),
        Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            (v as i64).to_formatted_string(&Locale::en)
        }
        Value::Float(v) => format!("{v:.3}"),
    }
}

fn print_samples(record: &PassRecord<'_>) {
    println!("\n--- {} ---", record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"));
    for (name, value) in record.samples.iter() {
        match value {
            SampleValue::Scalar(v) => println!("{name} = {}", format_value(*v)),
            SampleValue::Instanced(instances) => {
                for (instance, v) in instances {
                    println!("{name}[{instance}] = {}", format_value(*v));
                }
            }
        }
    }
}

fn print_descriptors(kinds: &[SamplerKind]) {
    println!("{:<16} {:<26} {:<9} {:<9} INSTANCED", "SAMPLER", "METRIC", "UNITS", "SEMANTICS");
    for kind in kinds {
        for d in kind.descriptions() {
            println!(
                "{:<16} {:<26} {:<9} {:<9} {}",
                kind.name(),
                d.name,
                d.units,
                d.semantics,
                if d.instanced { "yes" } else { "no" }
            );
        }
    }
}

/// Run passes until `count` is reached or SIGINT arrives. Returns the number
/// of passes emitted.
async fn run_passes(
    samplers: &[Arc<dyn Sampler>],
    parallel: bool,
    interval: Duration,
    count: Option<u64>,
    interrupt: &mut Signal,
    output: &mut Output,
) -> Result<u64> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = interrupt.recv() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        let timestamp = Utc::now();
        let samples = if parallel {
            collect_pass_parallel(samplers).await
        } else {
            collect_pass(samplers)
        };

        output.emit(&PassRecord { timestamp, samples: &samples })?;
        passes += 1;
        debug!(pass = passes, metrics = samples.len(), "Pass complete");

        if count.is_some_and(|count| passes >= count) {
            break;
        }
    }

    Ok(passes)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let kinds = args.kinds();
    if args.list {
        print_descriptors(&kinds);
        return Ok(());
    }

    anyhow::ensure!(
        args.interval.is_finite() && args.interval > 0.0,
        "interval must be a positive number of seconds"
    );

    let config = args.sampler_config();
    debug!(?config, "Sampler configuration");

    let samplers: Vec<Arc<dyn Sampler>> = kinds
        .iter()
        .map(|kind| Arc::from(kind.build(&config)))
        .collect();
    let metrics: usize = kinds.iter().map(|kind| kind.descriptions().len()).sum();
    info!(
        samplers = samplers.len(),
        metrics,
        parallel = args.parallel,
        "Starting sampler"
    );

    let mut output = match (&args.log, args.format) {
        (Some(path), _) => {
            Output::Log(SampleLogger::create(path).context("Failed to open sample log")?)
        }
        (None, Format::Json) => Output::Stdout(SampleLogger::new(io::stdout())),
        (None, Format::Text) => Output::Text,
    };

    // Registered for the whole run so an interrupt during a pass is kept
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let passes = run_passes(
        &samplers,
        args.parallel,
        Duration::from_secs_f64(args.interval),
        args.count,
        &mut interrupt,
        &mut output,
    )
    .await?;

    output.finish()?;
    if let Some(ref path) = args.log {
        eprintln!("{} passes logged to: {}", passes, path.display());
    }

    Ok(())
}
