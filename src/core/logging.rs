use crate::shared::paths::{ensure_dir, get_log_dir};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Targets with a dedicated log file. Everything else goes to `winlapse.log`.
const ROUTED_TARGETS: [&str; 1] = ["encoder"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create logs directory: {0}")]
    LogDir(#[from] std::io::Error),
    #[error("Failed to set global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Keeps the non-blocking writers flushing; hold for the process lifetime.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

struct TargetWriter {
    writers: HashMap<&'static str, NonBlocking>,
    default_writer: NonBlocking,
}

impl TargetWriter {
    fn writer_for(&self, target: &str) -> &NonBlocking {
        self.writers
            .iter()
            .find(|(name, _)| target == **name || target.starts_with(&format!("{}::", name)))
            .map(|(_, writer)| writer)
            .unwrap_or(&self.default_writer)
    }
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = NonBlocking;

    fn make_writer(&'a self) -> Self::Writer {
        self.default_writer.clone()
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        self.writer_for(meta.target()).clone()
    }
}

pub fn init_logging() -> Result<LoggingGuards, LoggingError> {
    init_logging_in(&get_log_dir())
}

pub fn init_logging_in(log_dir: &Path) -> Result<LoggingGuards, LoggingError> {
    ensure_dir(log_dir)?;

    let mut guards = Vec::new();
    let mut writers = HashMap::new();

    for target in ROUTED_TARGETS {
        let appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        writers.insert(target, non_blocking);
        guards.push(guard);
    }

    let default_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "winlapse.log");
    let (default_writer, default_guard) = tracing_appender::non_blocking(default_appender);
    guards.push(default_guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(TargetWriter {
                writers,
                default_writer,
            })
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(target: "system", "Logging initialized at {:?}", log_dir);

    Ok(LoggingGuards { _guards: guards })
}
