use indicatif::MultiProgress;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::General;

/// The progress bars currently drawn, if any. Output goes above them.
static PROGRESS_BAR: LazyLock<Mutex<Option<MultiProgress>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for tracing::level_filters::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => Self::OFF,
            LevelFilter::Error => Self::ERROR,
            LevelFilter::Warn => Self::WARN,
            LevelFilter::Info => Self::INFO,
            LevelFilter::Debug => Self::DEBUG,
            LevelFilter::Trace => Self::TRACE,
        }
    }
}

/// Where and how much to log, merged from the command line and the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Fixed level. Without one, `RUST_LOG` decides, falling back to WARN.
    pub level: Option<LevelFilter>,
    /// JSON log file. A directory gets a new `nvmprog_<seconds>.log` per run.
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Command line values win over the config.
    pub fn resolve(
        level: Option<LevelFilter>,
        file: Option<PathBuf>,
        general: &General,
    ) -> Self {
        Self {
            level: level.or(general.log_level),
            file: file.or_else(|| general.log_file.clone()),
        }
    }

    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::from(level).into())
                .parse_lossy(""),
            None => EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
                .from_env_lossy(),
        }
    }
}

/// Returns the file to log to for the configured `path`.
fn log_file_path(path: &Path, now: SystemTime) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }

    let seconds = now
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    path.join(format!("nvmprog_{seconds}.log"))
}

/// Flushes the log file when dropped.
pub struct LogFileGuard {
    _worker: WorkerGuard,
    path: PathBuf,
}

impl Drop for LogFileGuard {
    fn drop(&mut self) {
        tracing::info!("Wrote log to {}", self.path.display());
    }
}

// Console log lines are drawn above the progress bars.
struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match PROGRESS_BAR.lock().as_ref() {
            Some(progress) => progress.suspend(|| std::io::stderr().write(buf)),
            None => std::io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

/// Installs the console logger and, if requested, the JSON file logger.
///
/// Keep the returned guard alive until the end of `main`, otherwise the tail
/// of the log file is lost.
pub fn setup_logging(settings: &LogSettings) -> anyhow::Result<Option<LogFileGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(|| ConsoleWriter)
        .with_filter(settings.filter());

    let Some(configured) = settings.file.as_deref() else {
        tracing_subscriber::registry().with(console).init();
        return Ok(None);
    };

    let path = log_file_path(configured, SystemTime::now());
    let (writer, worker) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(File::create(&path)?);

    let file = tracing_subscriber::fmt::layer()
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_writer(writer);

    tracing_subscriber::registry().with(console).with(file).init();
    tracing::info!("Writing log to {}", path.display());

    Ok(Some(LogFileGuard {
        _worker: worker,
        path,
    }))
}

/// Sets the currently displayed progress bar of the CLI.
pub fn set_progress_bar(progress: MultiProgress) {
    *PROGRESS_BAR.lock() = Some(progress);
}

/// Disables the currently displayed progress bar of the CLI.
pub fn clear_progress_bar() {
    *PROGRESS_BAR.lock() = None;
}

fn print_line(message: &str, to_stderr: bool) {
    let progress = PROGRESS_BAR.lock();
    match progress.as_ref() {
        Some(progress) => {
            let _ = progress.println(message);
        }
        None if to_stderr => eprintln!("{message}"),
        None => println!("{message}"),
    }
}

/// Writes a message to stderr, above the progress bar if one is shown.
pub fn eprintln(message: impl AsRef<str>) {
    print_line(message.as_ref(), true)
}

/// Writes a message to stdout, above the progress bar if one is shown.
pub fn println(message: impl AsRef<str>) {
    print_line(message.as_ref(), false)
}
