use parking_lot::Mutex;
/// Logging backend for the term-atlas binary.
///
/// Routes every `log::info!()` etc. from the workspace crates into a debug
/// log file. The level comes from, in order of precedence:
/// - the `--log-level` CLI flag
/// - the `DEBUG_LEVEL` environment variable (name or 0-4)
/// - the `log_level` field of the atlas config (applied after loading it)
///
/// Output goes to /tmp/term_atlas_debug.log on Unix/macOS,
/// or %TEMP%\term_atlas_debug.log on Windows.
/// When `RUST_LOG` is set, records are mirrored to stderr as well.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};
use term_atlas_config::LogLevel;

struct DebugLogger {
    file: Option<File>,
    mirror_stderr: bool,
}

impl DebugLogger {
    fn open(level: LevelFilter, mirror_stderr: bool) -> Self {
        let file = if level != LevelFilter::Off {
            match OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(log_path())
            {
                Ok(f) => Some(f),
                // Missing log file is not worth failing the run over
                Err(_) => None,
            }
        } else {
            None
        };

        let mut logger = DebugLogger {
            file,
            mirror_stderr,
        };
        logger.write_raw(&format!(
            "\n{}\nterm-atlas debug session started at {} (level={})\n{}\n",
            "=".repeat(80),
            get_timestamp(),
            level,
            "=".repeat(80)
        ));
        logger
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn write_record(&mut self, record: &Record) {
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        self.write_raw(&line);
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }
}

/// `log::Log` implementation backed by the shared [`DebugLogger`].
struct LogBridge;

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();
static BRIDGE: LogBridge = LogBridge;

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(logger) = LOGGER.get() {
            logger.lock().write_record(record);
        }
    }

    fn flush(&self) {
        if let Some(logger) = LOGGER.get() {
            logger.lock().write_raw("");
        }
    }
}

/// Path of the debug log file.
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    let log_path = PathBuf::from("/tmp/term_atlas_debug.log");
    #[cfg(not(unix))]
    let log_path = std::env::temp_dir().join("term_atlas_debug.log");
    log_path
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Level requested by the environment, if any.
pub fn env_level() -> Option<LogLevel> {
    std::env::var("DEBUG_LEVEL")
        .ok()
        .and_then(|val| LogLevel::parse(&val))
}

/// Pick the effective level: CLI flag, then `DEBUG_LEVEL`, then config.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    env_level: Option<LogLevel>,
    config_level: LogLevel,
) -> LogLevel {
    cli_level.or(env_level).unwrap_or(config_level)
}

/// Install the log bridge. Later calls only change the level filter; the
/// log file is opened by the first call.
pub fn init_log_bridge(level: LogLevel) {
    let filter = level.to_level_filter();
    let mirror_stderr = std::env::var_os("RUST_LOG").is_some();
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::open(filter, mirror_stderr)));
    // Already installed on a second call
    let _ = log::set_logger(&BRIDGE);
    log::set_max_level(filter);
}
