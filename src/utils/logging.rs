use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use log::LevelFilter;
use log4rs::{
    Handle,
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}{n}";

/// `{log_dir}/backup_{YYYY-MM-DD}.log`
pub fn log_file_path(log_dir: &Path, day: NaiveDate) -> PathBuf {
    log_dir.join(format!("backup_{}.log", day.format("%Y-%m-%d")))
}

/// The installed logger. A long-running process calls `roll_over` so that each day's
/// lines land in that day's file.
pub struct DailyLog {
    handle: Handle,
    log_dir: Option<PathBuf>,
    level: LevelFilter,
    day: NaiveDate,
}

impl DailyLog {
    pub fn roll_over(&mut self) -> Result<()> {
        self.roll_over_to(Local::now().date_naive())
    }

    fn roll_over_to(&mut self, today: NaiveDate) -> Result<()> {
        if self.log_dir.is_none() || self.day == today {
            return Ok(());
        }
        let config = build_config(self.log_dir.as_deref(), self.level, today)?;
        self.handle.set_config(config);
        self.day = today;
        Ok(())
    }
}

/// Stderr appender, plus a file appender for `day` when `log_dir` is given.
fn build_config(log_dir: Option<&Path>, level: LevelFilter, day: NaiveDate) -> Result<Config> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");

    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = log_file_path(dir, day);
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder
        .build(root.build(level))
        .context("Invalid logging configuration")
}

/// Logs to stderr and, when `log_dir` is given, to today's file inside it.
pub fn init_logging(log_dir: Option<&Path>, level: LevelFilter) -> Result<DailyLog> {
    let day = Local::now().date_naive();
    let config = build_config(log_dir, level, day)?;
    let handle = log4rs::init_config(config).context("Logger already initialised")?;
    Ok(DailyLog {
        handle,
        log_dir: log_dir.map(Path::to_path_buf),
        level,
        day,
    })
}
