//! Log output.
//!
//! Logs go to stderr until a table run redirects them to its own file,
//! `{path}/{family}_{phase}_log.txt`. The progress bar keeps the terminal
//! while a redirect is active.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Shared, switchable log destination.
#[derive(Clone, Default)]
pub struct LogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    /// Append logs to `{dir}/{family}_{phase}_log.txt` until the guard drops.
    pub fn redirect(&self, dir: &Path, family: &str, phase: &str) -> io::Result<RedirectGuard> {
        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(family, phase));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.set(Some(file));
        Ok(RedirectGuard { sink: self.clone() })
    }

    fn set(&self, file: Option<File>) {
        if let Ok(mut current) = self.file.lock() {
            *current = file;
        }
    }

    fn writer(&self) -> SinkWriter {
        SinkWriter {
            file: self.file.clone(),
        }
    }
}

/// Restores stderr logging when dropped.
pub struct RedirectGuard {
    sink: LogSink,
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        self.sink.set(None);
    }
}

pub fn log_file_name(family: &str, phase: &str) -> String {
    format!("{}_{}_log.txt", family, phase)
}

struct SinkWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;
        match file.as_mut() {
            Some(file) => file.write_all(buf)?,
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;
        match file.as_mut() {
            Some(file) => file.flush(),
            None => io::stderr().flush(),
        }
    }
}

/// Install the global JSON subscriber writing through a fresh [`LogSink`].
///
/// `RUST_LOG` overrides `level`.
pub fn init(level: &str) -> Result<LogSink> {
    let sink = LogSink::default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let writer_sink = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(BoxMakeWriter::new(move || writer_sink.writer()))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(sink)
}
