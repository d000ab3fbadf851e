//! Logging Module
//!
//! This module sets up `env_logger` so log lines are timestamped, appended to
//! a log file and, unless quiet, echoed to stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

/// Writes every buffer to an optional log file and optionally to stderr.
pub struct TeeWriter {
    file: Option<File>,
    console: bool,
}

impl TeeWriter {
    pub fn new(file: Option<File>, console: bool) -> Self {
        Self { file, console }
    }

    /// Opens `path` for appending. If it cannot be opened the writer falls
    /// back to the console and the error is returned alongside.
    pub fn append_to(path: &Path, console: bool) -> (Self, Option<io::Error>) {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => (Self::new(Some(file), console), None),
            Err(e) => (Self::new(None, true), Some(e)),
        }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stderr().write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stderr().flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Initializes the global logger.
///
/// `RUST_LOG` still wins over the verbosity flag when set.
pub fn init(log_path: Option<&Path>, verbose: bool, quiet: bool) {
    let (writer, open_error) = match log_path {
        Some(path) => TeeWriter::append_to(path, !quiet),
        None => (TeeWriter::new(None, true), None),
    };

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(writer)))
        .init();

    if let (Some(path), Some(e)) = (log_path, open_error) {
        log::warn!("Failed to open log file {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_tee_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.log");
        fs::write(&path, "[earlier] line\n").unwrap();

        let (mut writer, err) = TeeWriter::append_to(&path, false);
        assert!(err.is_none());
        writer.write_all(b"[now] INFO  hello\n").unwrap();
        writer.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[earlier] line\n[now] INFO  hello\n");
    }

    #[test]
    fn test_tee_falls_back_to_console() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, err) = TeeWriter::append_to(dir.path(), false);
        assert!(err.is_some());
        assert!(writer.file.is_none());
        assert!(writer.console);
        assert_eq!(writer.write(b"still works\n").unwrap(), 12);
    }
}
