//! msgtape CLI

use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use msgtape::config::Config;
use msgtape::deck::Deck;
use msgtape::recording::{format_clock, Ingest, RecordingSummary};
use msgtape::storage::{CaptureReader, DEFAULT_INDEX_INTERVAL};
use msgtape::transport::{parse_line, LineReceiver, LineTransmitter};

/// Host tick period for index upkeep and playback
const TICK_PERIOD: Duration = Duration::from_millis(10);

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let command = &args[1];
    let result = match command.as_str() {
        "record" => parse_record(&args[2..]).and_then(|config| run(record(config))),
        "play" => parse_play(&args[2..]).and_then(|play| run(play_capture(play))),
        "stats" => {
            if args.len() < 3 {
                eprintln!("Usage: msgtape stats <capture-dir>");
                process::exit(1);
            }
            show_stats(Path::new(&args[2]))
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'msgtape' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("msgtape v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: msgtape <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  record [--config FILE]");
    eprintln!("      Record message lines from stdin until EOF or Ctrl-C");
    eprintln!("  play <capture-dir> [--speed X] [--loop] [--from SECONDS] [--config FILE]");
    eprintln!("      Replay a capture to stdout in real time");
    eprintln!("  stats <capture-dir>");
    eprintln!("      Show capture statistics");
    eprintln!();
    eprintln!("Message lines look like: /address 1 2.5 \"text\"");
}

fn run(future: impl std::future::Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()
        .context("Failed to start runtime")?
        .block_on(future)
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config {path}")),
        None => Ok(Config::default()),
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    match args.get(i + 1) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{flag} needs a value"),
    }
}

fn parse_record(args: &[String]) -> anyhow::Result<Config> {
    let mut config_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(flag_value(args, i, "--config")?);
                i += 2;
            }
            other => bail!("Unknown option for record: {other}"),
        }
    }
    load_config(config_path)
}

struct PlayArgs {
    config: Config,
    dir: PathBuf,
    from: f64,
}

fn parse_play(args: &[String]) -> anyhow::Result<PlayArgs> {
    let mut dir = None;
    let mut config_path = None;
    let mut speed = None;
    let mut looping = false;
    let mut from = 0.0;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(flag_value(args, i, "--config")?);
                i += 2;
            }
            "--speed" => {
                let value = flag_value(args, i, "--speed")?;
                speed = Some(value.parse().with_context(|| format!("Bad speed: {value}"))?);
                i += 2;
            }
            "--from" => {
                let value = flag_value(args, i, "--from")?;
                from = value.parse().with_context(|| format!("Bad start time: {value}"))?;
                i += 2;
            }
            "--loop" => {
                looping = true;
                i += 1;
            }
            other if other.starts_with("--") => bail!("Unknown option for play: {other}"),
            other => {
                dir = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }

    let mut config = load_config(config_path)?;
    let Some(dir) = dir.or_else(|| config.playback.folder.clone()) else {
        bail!("Usage: msgtape play <capture-dir> [--speed X] [--loop] [--from SECONDS]");
    };
    if let Some(speed) = speed {
        config.playback.speed = speed;
    }
    config.playback.looping = looping;

    Ok(PlayArgs { config, dir, from })
}

fn print_summary(summary: &RecordingSummary) -> anyhow::Result<()> {
    print!("{}", summary.to_toml()?);
    Ok(())
}

async fn record(config: Config) -> anyhow::Result<()> {
    let mut deck = Deck::new(config, LineReceiver::new(), LineTransmitter::new(io::sink()))?;
    let dir = deck
        .start_recording(Instant::now())
        .context("Failed to start recording")?;
    eprintln!("Recording to {} (Ctrl-C to stop)", dir.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK_PERIOD);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let reason = loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break "end of input";
                };
                if line.trim().is_empty() {
                    continue;
                }
                let message = match parse_line(&line) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Skipping line: {e}");
                        continue;
                    }
                };
                if !deck.receiver().accepts(&message) {
                    continue;
                }
                if let Ingest::Aborted(summary) = deck.deliver(&message, Instant::now())? {
                    return print_summary(&summary);
                }
            }
            _ = ticker.tick() => {
                if let Some(summary) = deck.tick(Instant::now(), 0.0)?.stopped {
                    return print_summary(&summary);
                }
            }
            _ = &mut ctrl_c => break "stopped by user",
        }
    };

    if let Some(summary) = deck.stop_recording(reason, Instant::now())? {
        print_summary(&summary)?;
    }
    Ok(())
}

async fn play_capture(args: PlayArgs) -> anyhow::Result<()> {
    let looping = args.config.playback.looping;
    let mut deck = Deck::new(args.config, LineReceiver::new(), LineTransmitter::new(io::stdout()))?;
    deck.open_capture(&args.dir)
        .with_context(|| format!("Failed to open {}", args.dir.display()))?;
    deck.seek(args.from)?;
    deck.play();

    let status = deck.status(Instant::now());
    eprintln!(
        "Playing {} from {} of {} at {}x",
        args.dir.display(),
        format_clock(status.elapsed_seconds),
        format_clock(status.total_seconds),
        status.speed
    );

    let mut ticker = tokio::time::interval(TICK_PERIOD);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                deck.tick(now, (now - last).as_secs_f64())?;
                last = now;
                if !looping && deck.player().is_paused() {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    Ok(())
}

fn show_stats(dir: &Path) -> anyhow::Result<()> {
    let summary = RecordingSummary::from_capture(dir).ok();
    let interval = summary
        .as_ref()
        .map(|s| s.index_interval_seconds)
        .filter(|s| s.is_finite() && *s > 0.0)
        .map_or(DEFAULT_INDEX_INTERVAL, Duration::from_secs_f64);

    let reader = CaptureReader::open(dir, interval)
        .with_context(|| format!("Failed to open {}", dir.display()))?;

    let schema: Vec<&str> = reader.schema().fields().iter().map(|f| f.as_str()).collect();
    println!("Capture directory: {}", dir.display());
    println!();
    println!("Schema:          {}", schema.join(", "));
    println!("Record width:    {} bytes", reader.record_width());
    println!("Records:         {}", reader.record_count());
    println!("Duration:        {}", format_clock(reader.total_seconds()));
    println!("Strings:         {}", reader.strings().len());
    println!(
        "Index entries:   {} ({})",
        reader.index().len(),
        if reader.index().is_consistent(reader.record_count()) {
            "consistent"
        } else {
            "INCONSISTENT"
        }
    );

    let crc = format!("{:08x}", reader.log_crc());
    match summary {
        Some(summary) => {
            println!();
            println!("Stop reason:     {}", summary.reason);
            println!("Started:         {}", summary.started_at);
            println!("Stopped:         {}", summary.stopped_at);
            println!("Capture id:      {}", summary.capture_id);
            let verdict = if summary.log_crc32 == crc { "ok" } else { "MISMATCH" };
            println!("Log CRC-32:      {crc} ({verdict})");
        }
        None => {
            println!("Log CRC-32:      {crc} (no summary)");
        }
    }

    Ok(())
}
