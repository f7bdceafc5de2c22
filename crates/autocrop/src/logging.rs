use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{Level, LevelFilter, Record};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;
use log4rs::filter::{Filter, Response};

/// Same layout as the original hook's log lines: `24/05/01 13:37:00 INFO       message`
const TIMESTAMP_FORMAT: &str = "%y/%m/%d %H:%M:%S";
const LOG_PATTERN: &str = "{d(%y/%m/%d %H:%M:%S)} {l:<10} {m}{n}";

pub const INFO_LOG_NAME: &str = "crop_info.log";
pub const ERROR_LOG_NAME: &str = "crop_err.log";

/// Passes only records less severe than a warning
#[derive(Debug)]
struct BelowWarnFilter;

impl Filter for BelowWarnFilter {
    fn filter(&self, record: &Record) -> Response {
        if record.level() > Level::Warn {
            Response::Neutral
        } else {
            Response::Reject
        }
    }
}

/// Resolve the effective level: `--verbose` wins, then the configured name
pub fn level_filter(configured: &str, verbose: bool) -> Result<LevelFilter> {
    if verbose {
        return Ok(LevelFilter::Debug);
    }
    configured
        .parse::<LevelFilter>()
        .with_context(|| format!("Unknown log level: {}", configured))
}

/// Paths of the operational and warning/error streams inside `log_dir`
pub fn log_paths(log_dir: &Path) -> (PathBuf, PathBuf) {
    (log_dir.join(INFO_LOG_NAME), log_dir.join(ERROR_LOG_NAME))
}

/// Install the global logger.
///
/// With a log directory, info and below go to `crop_info.log` while warnings
/// and errors go to `crop_err.log`; everything is mirrored to stderr. Without
/// one, env_logger writes to stderr and honours `RUST_LOG`.
pub fn init_logging(log_dir: Option<&Path>, level: LevelFilter) -> Result<()> {
    match log_dir {
        Some(dir) => init_file_logging(dir, level),
        None => init_console_logging(level),
    }
}

fn init_file_logging(log_dir: &Path, level: LevelFilter) -> Result<()> {
    let config = file_logging_config(log_dir, level)?;
    log4rs::init_config(config).context("Failed to install logger")?;
    Ok(())
}

fn file_logging_config(log_dir: &Path, level: LevelFilter) -> Result<Config> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let (info_path, err_path) = log_paths(log_dir);

    let info_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(&info_path)
        .with_context(|| format!("Failed to open log file: {}", info_path.display()))?;
    let err_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(&err_path)
        .with_context(|| format!("Failed to open log file: {}", err_path.display()))?;
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(BelowWarnFilter))
                .build("info", Box::new(info_appender)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build("err", Box::new(err_appender)),
        )
        .appender(Appender::builder().build("stderr", Box::new(console)))
        .build(
            Root::builder()
                .appender("info")
                .appender("err")
                .appender("stderr")
                .build(level),
        )
        .context("Invalid logging configuration")?;

    Ok(config)
}

fn init_console_logging(level: LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<10} {}",
                chrono::Local::now().format(TIMESTAMP_FORMAT),
                record.level(),
                record.args()
            )
        })
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(level: Level) -> Response {
        let record = Record::builder()
            .args(format_args!("message"))
            .level(level)
            .build();
        BelowWarnFilter.filter(&record)
    }

    #[test]
    fn test_info_stream_excludes_warnings() {
        assert!(matches!(record_at(Level::Info), Response::Neutral));
        assert!(matches!(record_at(Level::Debug), Response::Neutral));
        assert!(matches!(record_at(Level::Warn), Response::Reject));
        assert!(matches!(record_at(Level::Error), Response::Reject));
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("info", false).unwrap(), LevelFilter::Info);
        assert_eq!(level_filter("WARN", false).unwrap(), LevelFilter::Warn);
        assert_eq!(level_filter("info", true).unwrap(), LevelFilter::Debug);
        assert!(level_filter("chatty", false).is_err());
    }

    fn emit(logger: &log4rs::Logger, level: Level, message: &str) {
        use log::Log;
        logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .build(),
        );
        logger.flush();
    }

    #[test]
    fn test_file_streams_split_by_severity() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let logger = log4rs::Logger::new(file_logging_config(&log_dir, LevelFilter::Info).unwrap());

        emit(&logger, Level::Info, "Video already in the specified resolution. Skipping...");
        emit(&logger, Level::Warn, "Show X S2E5 failed at stage 'detect crop'");

        let (info_path, err_path) = log_paths(&log_dir);
        let info = std::fs::read_to_string(info_path).unwrap();
        let err = std::fs::read_to_string(err_path).unwrap();

        assert!(info.contains("INFO       Video already in the specified resolution. Skipping..."));
        assert!(!info.contains("failed at stage"));
        assert!(err.contains("WARN       Show X S2E5 failed at stage 'detect crop'"));
        assert!(!err.contains("Skipping"));
        assert_eq!(err.lines().count(), 1);
    }

    #[test]
    fn test_file_streams_append() {
        let dir = tempfile::TempDir::new().unwrap();
        for run in ["first run", "second run"] {
            let logger = log4rs::Logger::new(file_logging_config(dir.path(), LevelFilter::Info).unwrap());
            emit(&logger, Level::Info, run);
        }

        let info = std::fs::read_to_string(dir.path().join(INFO_LOG_NAME)).unwrap();
        assert_eq!(info.lines().count(), 2);
        assert!(info.contains("first run") && info.contains("second run"));
    }

    #[test]
    fn test_log_paths() {
        let (info, err) = log_paths(Path::new("/var/log/autocrop"));
        assert_eq!(info, PathBuf::from("/var/log/autocrop/crop_info.log"));
        assert_eq!(err, PathBuf::from("/var/log/autocrop/crop_err.log"));
    }
}
