//! Logging for techmix, built on the `fern` crate.
//!
//! Informational messages go to stdout and warnings and errors to stderr, coloured when writing to
//! a terminal. When an output folder is given, plain-text copies are also written to log files
//! there so that a run can be inspected afterwards.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Set once the global logger has been installed
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Log level used when neither the environment nor the settings file gives one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable which overrides the log level in the settings file
const LOG_LEVEL_ENV_VAR: &str = "TECHMIX_LOG_LEVEL";

/// Log file for messages at info level and below
const LOG_INFO_FILE_NAME: &str = "techmix_info.log";

/// Log file for warnings and errors
const LOG_ERROR_FILE_NAME: &str = "techmix_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the program logger.
///
/// The level is taken from `TECHMIX_LOG_LEVEL` if set, otherwise from the settings file, and
/// defaults to `info`. Accepted levels are `off`, `error`, `warn`, `info`, `debug` and `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings` - The log level given in `settings.toml`, if any
/// * `log_file_path` - Folder in which to create log files, if any
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = resolve_log_level(env::var(LOG_LEVEL_ENV_VAR).ok(), log_level_from_settings)?;
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut dispatch = Dispatch::new()
        .chain(
            // Messages below warning level go to stdout
            console_dispatch(colours, std::io::stdout().is_terminal())
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            console_dispatch(colours, std::io::stderr().is_terminal())
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );
    if let Some(dir) = log_file_path {
        dispatch = dispatch.chain(file_dispatch(dir, log_level)?);
    }

    dispatch.apply().context("Logger already initialised")?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

/// Choose the log level, preferring the environment variable over the settings file
fn resolve_log_level(from_env: Option<String>, from_settings: Option<&str>) -> Result<LevelFilter> {
    match from_env {
        Some(level) => parse_log_level(&level)
            .with_context(|| format!("Invalid value for {LOG_LEVEL_ENV_VAR}")),
        None => parse_log_level(from_settings.unwrap_or(DEFAULT_LOG_LEVEL)),
    }
}

/// Convert a log level string to a [`LevelFilter`] (case insensitive)
pub(crate) fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// A console dispatch, coloured if `colour` is set
fn console_dispatch(colours: ColoredLevelConfig, colour: bool) -> Dispatch {
    Dispatch::new().format(move |out, message, record| {
        if colour {
            write_log(out, colours.color(record.level()), record, message);
        } else {
            write_log(out, record.level(), record, message);
        }
    })
}

/// Plain-text log files in the output folder.
///
/// The info file records at least info-level messages, whatever the console level.
fn file_dispatch(dir: &Path, log_level: LevelFilter) -> Result<Dispatch> {
    let create = |file_name: &str| {
        let path = dir.join(file_name);
        File::create(&path).with_context(|| format!("Could not create {}", path.display()))
    };

    Ok(Dispatch::new()
        .format(|out, message, record| write_log(out, record.level(), record, message))
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(log_level.max(LevelFilter::Info))
                .chain(create(LOG_INFO_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .level(LevelFilter::Warn)
                .chain(create(LOG_ERROR_FILE_NAME)?),
        ))
}

/// The module which logged a message, without the crate name
fn short_target(target: &str) -> &str {
    match target.strip_prefix("techmix") {
        Some("") => "techmix",
        Some(rest) => rest.strip_prefix("::").unwrap_or(target),
        None => target,
    }
}

/// Write one log line as `[time level module] message`
fn write_log<T: Display>(out: FormatCallback, level: T, record: &Record, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = short_target(record.target());
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}
