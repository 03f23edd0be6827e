//! Process-wide logger: stderr plus an optional daily log file

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use env_logger::{Builder, Env};
use hermes_registry::ConfigError;
use log::LevelFilter;
use parking_lot::Mutex;

/// Install the global logger
///
/// `level` applies unless `RUST_LOG` is set. Each line is written as
/// `2025-12-07 09:00:01.123 INFO  target: message`, and also appended to
/// `log_file` when given. Returns false if a logger was already installed.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<bool, ConfigError> {
    let tee = match log_file {
        Some(path) => Some(Arc::new(Mutex::new(open_append(path)?))),
        None => None,
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_env(Env::default());
    builder.format(move |buf, record| {
        let line = format!(
            "{} {:<5} {}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = &tee {
            // best effort, stderr still gets the line
            let _ = writeln!(file.lock(), "{line}");
        }
        writeln!(buf, "{line}")
    });
    Ok(builder.try_init().is_ok())
}

fn open_append(path: &Path) -> Result<File, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_error)?;
    }
    OpenOptions::new().create(true).append(true).open(path).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_is_created_and_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("20251207_ctp.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "earlier\n").unwrap();

        let mut file = open_append(&path).unwrap();
        writeln!(file, "later").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }
}
