use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

/// One log line as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub prefix: String,
    pub timestamp: String,
    pub message: String,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "[{}] [{}] {}", self.timestamp, self.level, self.message)
        } else {
            write!(f, "[{}] [{}] [{}] {}", self.timestamp, self.level, self.prefix, self.message)
        }
    }
}

struct Sink {
    file: Option<File>,
    echo: bool,
    min_level: Level,
    subscribers: Vec<mpsc::Sender<Record>>,
}

/// Cloneable logging handle. Created once at startup and handed to every
/// component; `with_prefix` gives each component its own tag.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<Mutex<Sink>>,
    prefix: Arc<str>,
}

impl Logger {
    /// Open `<log_dir>/app.log` (truncated) and echo to stderr.
    pub fn init(log_dir: &Path, min_level: Level) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
        let log_path = log_dir.join("app.log");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        Ok(Self::from_sink(Sink {
            file: Some(file),
            echo: true,
            min_level,
            subscribers: Vec::new(),
        }))
    }

    /// Stderr only, used when the log file cannot be opened.
    pub fn stderr(min_level: Level) -> Self {
        Self::from_sink(Sink { file: None, echo: true, min_level, subscribers: Vec::new() })
    }

    /// Swallow everything.
    pub fn discard() -> Self {
        Self::from_sink(Sink { file: None, echo: false, min_level: Level::Error, subscribers: Vec::new() })
    }

    /// A silent logger whose records (all levels) go to the returned receiver.
    pub fn capture() -> (Self, mpsc::Receiver<Record>) {
        let logger = Self::from_sink(Sink {
            file: None,
            echo: false,
            min_level: Level::Debug,
            subscribers: Vec::new(),
        });
        let rx = logger.subscribe();
        (logger, rx)
    }

    fn from_sink(sink: Sink) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)), prefix: Arc::from("") }
    }

    /// Same sink, different tag.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self { sink: Arc::clone(&self.sink), prefix: Arc::from(prefix) }
    }

    /// Receive every record written from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<Record> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut sink) = self.sink.lock() {
            sink.subscribers.push(tx);
        }
        rx
    }

    pub fn set_level(&self, level: Level) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.min_level = level;
        }
    }

    pub fn log(&self, level: Level, msg: impl AsRef<str>) {
        let Ok(mut sink) = self.sink.lock() else { return };
        if level < sink.min_level {
            return;
        }

        let record = Record {
            level,
            prefix: self.prefix.to_string(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: msg.as_ref().to_string(),
        };

        if let Some(file) = sink.file.as_mut() {
            writeln!(file, "{}", record).ok();
        }
        if sink.echo {
            eprintln!("{}", record);
        }
        // Dropped receivers are pruned on the next send.
        sink.subscribers.retain(|tx| tx.send(record.clone()).is_ok());
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.log(Level::Debug, msg);
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(Level::Info, msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.log(Level::Warn, msg);
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(Level::Error, msg);
    }
}
