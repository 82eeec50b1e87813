use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use pdo_telemetry as telem;
use pdo_transport as bus;
use pdo_transport::FieldBus;

#[derive(Parser, Debug)]
#[command(
    name = "pdo",
    version,
    about = "Fieldbus process-data telemetry CLI",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Replay,
}

impl From<Backend> for telem::BackendKind {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Mock => telem::BackendKind::Mock,
            Backend::Replay => telem::BackendKind::Replay,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available buses
    BusList {
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Print raw input frames, optionally recording them as a replay capture
    Sniff {
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
        /// Bus name (mock) or capture path (replay)
        #[arg(long, default_value = "mock0")]
        source: String,
        /// Simulated device ids (mock only)
        #[arg(long, value_delimiter = ',')]
        devices: Vec<u8>,
        /// Number of cycles to read
        #[arg(long, default_value_t = 10)]
        cycles: u64,
        /// Write frames to a capture file
        #[arg(long)]
        to: Option<String>,
    },
    /// Decode one frame given as hex and print the published record as JSON
    Decode {
        /// Frame bytes, e.g. 3412 40420f00 ... or 34 12 40 ...
        #[arg(required = true, num_args = 1..)]
        hex: Vec<String>,
        /// Device id to publish the frame under
        #[arg(long, default_value_t = 1)]
        device: u8,
    },
    /// Run the cyclic ingest loop and publish telemetry snapshots as JSON lines
    Monitor {
        /// YAML monitor config; flags below override it
        #[arg(long)]
        config: Option<String>,
        #[arg(long, value_enum)]
        backend: Option<Backend>,
        /// Bus name (mock) or capture path (replay)
        #[arg(long)]
        source: Option<String>,
        /// Simulated device ids (mock only)
        #[arg(long, value_delimiter = ',')]
        devices: Vec<u8>,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Bus cycle period in milliseconds
        #[arg(long)]
        period_ms: Option<u64>,
        /// Snapshot interval in milliseconds
        #[arg(long)]
        report_ms: Option<u64>,
        /// Truncate one frame every N cycles (mock only)
        #[arg(long)]
        short_every: Option<u64>,
        /// Print Prometheus metrics on exit
        #[arg(long)]
        metrics: bool,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::BusList { backend } => bus_list(backend),
        Commands::Sniff {
            backend,
            source,
            devices,
            cycles,
            to,
        } => sniff(backend, &source, &devices, cycles, to.as_deref()),
        Commands::Decode { hex, device } => decode(&hex, device),
        Commands::Monitor {
            config,
            backend,
            source,
            devices,
            cycles,
            period_ms,
            report_ms,
            short_every,
            metrics,
        } => {
            let mut cfg = match config {
                Some(path) => telem::load_config_file(path)?,
                None => telem::MonitorConfig::default(),
            };
            if let Some(b) = backend {
                cfg.backend = b.into();
            }
            if source.is_some() {
                cfg.source = source;
            }
            if !devices.is_empty() {
                cfg.devices = devices;
            }
            if cycles.is_some() {
                cfg.cycles = cycles;
            }
            if let Some(p) = period_ms {
                cfg.period_ms = p.max(1);
            }
            if let Some(r) = report_ms {
                cfg.report_ms = r.max(1);
            }
            if let Some(n) = short_every {
                cfg.short_frame_every = n;
            }
            monitor(&cfg, metrics)
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn bus_list(backend: Backend) -> Result<()> {
    let buses = match backend {
        Backend::Mock => bus::MockBus::list()?,
        Backend::Replay => bus::ReplayBus::list()?,
    };
    for b in buses {
        println!("{}\t{}", b.name, b.driver);
    }
    Ok(())
}

fn open_mock(source: &str, devices: &[u8], short_every: u64) -> Result<bus::MockBus> {
    let bus = if devices.is_empty() {
        bus::MockBus::open(source)?
    } else {
        bus::MockBus::with_devices(source, devices)
    };
    Ok(bus.with_short_frame_every(short_every))
}

fn sniff(
    backend: Backend,
    source: &str,
    devices: &[u8],
    cycles: u64,
    to: Option<&str>,
) -> Result<()> {
    let mut writer = match to {
        Some(path) => {
            let mut w = BufWriter::new(File::create(path)?);
            writeln!(w, "# cycle device bytes")?;
            Some(w)
        }
        None => None,
    };
    match backend {
        Backend::Mock => sniff_bus(&mut open_mock(source, devices, 0)?, cycles, &mut writer)?,
        Backend::Replay => sniff_bus(&mut bus::ReplayBus::open(source)?, cycles, &mut writer)?,
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }
    Ok(())
}

fn sniff_bus<B: FieldBus>(
    bus: &mut B,
    cycles: u64,
    writer: &mut Option<BufWriter<File>>,
) -> Result<()> {
    for cycle in 1..=cycles {
        let frames = match bus.read_cycle() {
            Ok(frames) => frames,
            Err(bus::TransportError::EndOfCapture) => break,
            Err(e) => return Err(e.into()),
        };
        for f in &frames {
            println!("{cycle}\t{f}\t{}", format_ts(f.timestamp));
            if let Some(w) = writer.as_mut() {
                writeln!(w, "{}", bus::format_capture_line(cycle, f))?;
            }
        }
    }
    Ok(())
}

fn format_ts(ts: Option<bus::Timestamp>) -> String {
    ts.and_then(|t| {
        t.0.format(&time::format_description::well_known::Rfc3339)
            .ok()
    })
    .unwrap_or_default()
}

fn decode(items: &[String], device: u8) -> Result<()> {
    let bytes = parse_hex_bytes(items)?;
    let registry = telem::TelemetryRegistry::new();
    registry.ingest(device, &bytes)?;
    let rec = registry.get(device)?;
    println!("{}", serde_json::to_string_pretty(&rec)?);
    Ok(())
}

fn parse_hex_bytes(items: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(telem::FRAME_LEN);
    for s in items {
        let t = s.trim();
        let digits = t.strip_prefix("0x").unwrap_or(t);
        if digits.len() % 2 != 0 {
            anyhow::bail!("invalid hex group '{t}': odd number of digits");
        }
        for i in (0..digits.len()).step_by(2) {
            let pair = digits
                .get(i..i + 2)
                .ok_or_else(|| anyhow::anyhow!("invalid hex group '{t}'"))?;
            let b = u8::from_str_radix(pair, 16)
                .map_err(|e| anyhow::anyhow!("invalid hex byte '{pair}' in '{t}': {e}"))?;
            out.push(b);
        }
    }
    Ok(out)
}

fn monitor(cfg: &telem::MonitorConfig, print_metrics: bool) -> Result<()> {
    let hub = telem::MetricsHub::new()?;
    let registry = Arc::new(telem::TelemetryRegistry::new().with_metrics(&hub));
    let stop = Arc::new(AtomicBool::new(false));

    let reporter = {
        let registry = Arc::clone(&registry);
        let stop = Arc::clone(&stop);
        let interval = Duration::from_millis(cfg.report_ms);
        thread::spawn(move || -> Result<()> {
            let stdout = std::io::stdout();
            loop {
                thread::sleep(interval);
                let done = stop.load(Ordering::Acquire);
                let mut out = stdout.lock();
                for rec in registry.snapshot() {
                    writeln!(out, "{}", serde_json::to_string(&rec)?)?;
                }
                out.flush()?;
                if done {
                    return Ok(());
                }
            }
        })
    };

    let source = cfg.source.clone().unwrap_or_else(|| "mock0".to_string());
    info!(backend = ?cfg.backend, source = %source, period_ms = cfg.period_ms, "monitor starting");
    let result = match cfg.backend {
        telem::BackendKind::Mock => {
            let mut bus = open_mock(&source, &cfg.devices, cfg.short_frame_every)?;
            run_cycles(&mut bus, &registry, cfg)
        }
        telem::BackendKind::Replay => {
            let mut bus = bus::ReplayBus::open(&source)?;
            run_cycles(&mut bus, &registry, cfg)
        }
    };

    stop.store(true, Ordering::Release);
    reporter
        .join()
        .map_err(|_| anyhow::anyhow!("reporter thread panicked"))??;
    let cycles = result?;
    info!(
        cycles,
        devices = registry.len(),
        ingested = hub.telemetry.ingested_frames.get(),
        rejected = hub.telemetry.decode_failures.get(),
        "monitor finished"
    );
    if print_metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

/// Drive `bus` at the configured period, publishing every frame. Returns the cycle count.
fn run_cycles<B: FieldBus>(
    bus: &mut B,
    registry: &telem::TelemetryRegistry,
    cfg: &telem::MonitorConfig,
) -> Result<u64> {
    let period = Duration::from_millis(cfg.period_ms);
    let mut next = Instant::now();
    let mut cycle = 0u64;
    while cfg.cycles.map_or(true, |max| cycle < max) {
        let frames = match bus.read_cycle() {
            Ok(frames) => frames,
            Err(bus::TransportError::EndOfCapture) => break,
            Err(e) => return Err(e.into()),
        };
        cycle += 1;
        let report = registry.ingest_cycle(&frames);
        for (device_id, e) in &report.rejected {
            warn!(cycle, device_id, error = %e, "frame dropped");
        }

        next += period;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Overran; restart the schedule from here.
            next = now;
        }
    }
    Ok(cycle)
}
