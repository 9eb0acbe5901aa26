use anyhow::Result;
use std::io::Write;
use log::{LevelFilter, Record};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use chrono::{DateTime, Local};

// The terminal belongs to the UI while it runs, so records go to a file.

pub struct SimpleLogger {
    level: LevelFilter,
    log_file: Option<Mutex<std::fs::File>>,
}

impl SimpleLogger {
    pub fn new(log_file_path: Option<&Path>, level: LevelFilter) -> Result<Self> {
        let log_file = if let Some(path) = log_file_path {
            Some(Mutex::new(OpenOptions::new().create(true).append(true).open(path)?))
        } else {
            None
        };

        Ok(SimpleLogger { level, log_file })
    }
}

pub fn format_record(now: DateTime<Local>, record: &Record) -> String {
    format!(
        "[{}] {} [{}:{}] {}\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_message = format_record(Local::now(), record);

            if let Some(file) = &self.log_file {
                if let Ok(mut file) = file.lock() {
                    let _ = file.write_all(log_message.as_bytes());
                }
            } else {
                print!("{}", log_message);
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        } else {
            let _: Result<(), std::io::Error> = std::io::stdout().flush();
        }
    }
}

pub fn setup_logging(log_file: Option<&Path>, level: LevelFilter) -> Result<()> {
    let logger = SimpleLogger::new(log_file, level)?;
    log::set_boxed_logger(Box::new(logger))
        .map(|()| log::set_max_level(level))?;

    log::info!("Logging initialized at level: {}", level);
    log::info!("App version: {} ({})", env!("CARGO_PKG_VERSION"), env!("CARGO_PKG_NAME"));

    Ok(())
}
