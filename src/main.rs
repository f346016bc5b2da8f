//! filetally - per-directory file counts, sizes and ages.
//!
//! Usage:
//!   filetally gather [DIR...]          Gather once and print the records
//!   filetally gather -c CONFIG         Gather using a TOML config file
//!   filetally watch --interval 10s     Gather repeatedly until Ctrl-C
//!   filetally sample-config            Print a commented sample config
//!   filetally --help                   Show help

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tracing::{Level, info};

use filetally_core::units::{parse_duration, parse_size};
use filetally_scan::{
    CollectingAccumulator, DirectoryStats, FileCounter, FileSystem, FileTallyConfig, GatherSummary,
};

#[derive(Parser)]
#[command(
    name = "filetally",
    version,
    about = "Count files per directory, with size and age statistics",
    long_about = "filetally walks the directories matching each glob pattern and reports, \
                  per directory, how many files pass the configured filters, their total \
                  size and the oldest and newest modification times."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gather once and print the results
    Gather {
        #[command(flatten)]
        opts: GatherOpts,
    },

    /// Gather on a fixed interval until interrupted
    Watch {
        #[command(flatten)]
        opts: GatherOpts,

        /// Time between gathers (e.g., "10s", "5m")
        #[arg(short, long, default_value = "10s")]
        interval: String,
    },

    /// Print a commented sample configuration
    SampleConfig,
}

#[derive(Args)]
struct GatherOpts {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory patterns (override the config file)
    directories: Vec<String>,

    /// Only count files whose base name matches this glob
    #[arg(long)]
    name: Option<String>,

    /// Size threshold (e.g., "10MB"; negative counts smaller files)
    #[arg(long, allow_hyphen_values = true)]
    size: Option<String>,

    /// Age threshold (e.g., "2h"; negative counts newer files)
    #[arg(long, allow_hyphen_values = true)]
    mtime: Option<String>,

    /// Count only direct children of each matched directory
    #[arg(long)]
    no_recursive: bool,

    /// Count every entry type, not just regular files
    #[arg(long)]
    all_types: bool,

    /// Follow symbolic links
    #[arg(long)]
    follow_symlinks: bool,

    /// Walk the roots of each pattern in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Line,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Gather { opts } => run_gather(&opts)?,
        Command::Watch { opts, interval } => run_watch(&opts, &interval)?,
        Command::SampleConfig => print!("{}", FileTallyConfig::sample()),
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the config file (if any) with command-line overrides.
fn build_config(opts: &GatherOpts) -> Result<FileTallyConfig> {
    let mut config = match &opts.config {
        Some(path) => FileTallyConfig::load(path)
            .wrap_err_with(|| format!("Failed to load config {}", path.display()))?,
        None => {
            if opts.directories.is_empty() {
                bail!("No directories given; pass DIR arguments or --config");
            }
            FileTallyConfig::new(opts.directories.iter().cloned())
        }
    };

    if !opts.directories.is_empty() {
        config.directories = opts.directories.clone();
    }
    if let Some(name) = &opts.name {
        config.name = name.clone();
    }
    if let Some(size) = &opts.size {
        config.size = parse_size(size).map_err(|e| eyre!(e))?;
    }
    if let Some(mtime) = &opts.mtime {
        config.mtime = parse_duration(mtime).map_err(|e| eyre!(e))?;
    }
    if opts.no_recursive {
        config.recursive = false;
    }
    if opts.all_types {
        config.regular_only = false;
    }
    if opts.follow_symlinks {
        config.follow_symlinks = true;
    }
    if opts.parallel {
        config.parallel_roots = true;
    }

    config.validate()?;
    Ok(config)
}

/// Run a single gather and print it.
fn run_gather(opts: &GatherOpts) -> Result<()> {
    let config = build_config(opts)?;
    let mut counter = FileCounter::new(config).context("Invalid configuration")?;

    let mut acc = CollectingAccumulator::new();
    let summary = counter.gather(&mut acc);
    print_results(&acc, &summary, opts.format)?;

    Ok(())
}

/// Gather on an interval until Ctrl-C.
fn run_watch(opts: &GatherOpts, interval: &str) -> Result<()> {
    let period = parse_duration(interval)
        .map_err(|e| eyre!(e))?
        .to_std()
        .map_err(|_| eyre!("Interval must be positive: {interval}"))?;
    if period.is_zero() {
        bail!("Interval must be positive: {interval}");
    }

    let config = build_config(opts)?;
    let counter = FileCounter::new(config).context("Invalid configuration")?;
    let format = opts.format;
    info!(
        directories = ?counter.config().directories,
        interval = %interval,
        "watching"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let result = runtime.block_on(watch_loop(counter, period, format, tokio::signal::ctrl_c()));
    // An interrupted gather may still be running on the blocking pool.
    runtime.shutdown_background();
    result
}

/// Gather every `period` until `shutdown` completes, even mid-gather.
async fn watch_loop<F, S>(
    mut counter: FileCounter<F>,
    period: Duration,
    format: OutputFormat,
    shutdown: S,
) -> Result<()>
where
    F: FileSystem + 'static,
    S: Future,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Polled across every tick and gather.
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let gather = tokio::task::spawn_blocking(move || {
            let mut acc = CollectingAccumulator::new();
            let summary = counter.gather(&mut acc);
            (counter, acc, summary)
        });

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            joined = gather => {
                let (returned, acc, summary) = joined.context("Gather task failed")?;
                counter = returned;
                print_results(&acc, &summary, format)?;
            }
        }
    }

    info!("interrupted, stopping");
    Ok(())
}

/// Print gathered records to stdout and errors to stderr.
fn print_results(acc: &CollectingAccumulator, summary: &GatherSummary, format: OutputFormat) -> Result<()> {
    for error in &acc.errors {
        eprintln!("error: {error}");
    }

    match format {
        OutputFormat::Text => {
            println!("{}", "─".repeat(96));
            println!(
                " {:<44} {:>8} {:>10}  {:<14}  {:<14}",
                "Directory", "Files", "Size", "Oldest", "Newest"
            );
            println!("{}", "─".repeat(96));
            for gauge in &acc.gauges {
                let stats = DirectoryStats::from_gauge(gauge);
                println!(
                    " {:<44} {:>8} {:>10}  {:<14}  {:<14}",
                    truncate(gauge.tag_value("directory").unwrap_or("?"), 44),
                    stats.count,
                    format_size(stats.size_bytes),
                    format_time(stats.oldest()),
                    format_time(stats.newest()),
                );
            }
            println!("{}", "─".repeat(96));
            println!(
                " {} directories, {} entries in {:.2}s",
                acc.gauges.len(),
                summary.walk.entries_visited,
                summary.elapsed.as_secs_f64()
            );
            if summary.has_errors() {
                println!(" {} error(s) during gather", summary.errors_reported);
            }
            println!();
        }
        OutputFormat::Json => {
            for gauge in &acc.gauges {
                println!("{}", serde_json::to_string(gauge)?);
            }
        }
        OutputFormat::Line => {
            for gauge in &acc.gauges {
                println!("{gauge}");
            }
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: i64) -> String {
    humansize::format_size(bytes.max(0) as u64, humansize::BINARY)
}

/// Format a timestamp in local time, or `-` when there is none.
fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetally_scan::{FileMeta, MemoryFs};
    use std::ffi::OsString;
    use std::io;
    use std::path::Path;
    use std::time::Instant;

    fn opts(args: &[&str]) -> GatherOpts {
        let mut argv = vec!["filetally", "gather"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Command::Gather { opts } => opts,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let config = build_config(&opts(&[
            "/tmp",
            "--name",
            "*.log",
            "--size",
            "-1KiB",
            "--mtime",
            "2h",
            "--no-recursive",
            "--all-types",
        ]))
        .unwrap();

        assert_eq!(config.directories, vec!["/tmp".to_string()]);
        assert_eq!(config.name, "*.log");
        assert_eq!(config.size, -1024);
        assert_eq!(config.mtime, chrono::TimeDelta::hours(2));
        assert!(!config.recursive);
        assert!(!config.regular_only);
        assert!(!config.follow_symlinks);
    }

    #[test]
    fn test_directories_required() {
        assert!(build_config(&opts(&[])).is_err());
    }

    #[test]
    fn test_config_file_with_cli_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("filetally.toml");
        std::fs::write(&path, "directories = [\"/var/log\"]\nname = \"*.gz\"\n").unwrap();

        let config = build_config(&opts(&["-c", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.directories, vec!["/var/log".to_string()]);
        assert_eq!(config.name, "*.gz");

        let config = build_config(&opts(&["-c", path.to_str().unwrap(), "/srv"])).unwrap();
        assert_eq!(config.directories, vec!["/srv".to_string()]);
    }

    /// Lists directories slowly so a gather is still running when asked to stop.
    struct SlowFs(MemoryFs);

    impl FileSystem for SlowFs {
        fn stat(&self, path: &Path) -> io::Result<FileMeta> {
            self.0.stat(path)
        }

        fn lstat(&self, path: &Path) -> io::Result<FileMeta> {
            self.0.lstat(path)
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
            std::thread::sleep(Duration::from_secs(2));
            self.0.read_dir(path)
        }
    }

    #[tokio::test]
    async fn test_watch_stops_during_a_running_gather() {
        let fs = SlowFs(MemoryFs::new().file("/data/f", 1, std::time::UNIX_EPOCH));
        let counter = FileCounter::with_fs(FileTallyConfig::new(["/data"]), fs).unwrap();
        let start = Instant::now();

        watch_loop(
            counter,
            Duration::from_secs(60),
            OutputFormat::Line,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_millis(1500), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_watch_stops_between_ticks() {
        let counter = FileCounter::with_fs(FileTallyConfig::new(["/data"]), MemoryFs::new().dir("/data")).unwrap();
        let start = Instant::now();

        watch_loop(
            counter,
            Duration::from_secs(60),
            OutputFormat::Line,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_format_time_zero_is_dash() {
        assert_eq!(format_time(DirectoryStats::default().oldest()), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("/a/very/long/path", 8), "/a/very…");
    }
}
