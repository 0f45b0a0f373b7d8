use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Append-only run log. Opening is best-effort: a machine whose log
/// directory cannot be created still gets provisioned, it just loses the
/// file record.
pub struct RunLog {
    file: Option<File>,
    path: PathBuf,
}

impl RunLog {
    pub fn open(path: &Path) -> (Self, Option<String>) {
        let opened = (|| -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new().create(true).append(true).open(path)
        })();

        match opened {
            Ok(file) => (
                Self {
                    file: Some(file),
                    path: path.to_path_buf(),
                },
                None,
            ),
            Err(err) => (
                Self {
                    file: None,
                    path: path.to_path_buf(),
                },
                Some(format!(
                    "could not open log file {}: {}; continuing without file logging",
                    path.display(),
                    err
                )),
            ),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, level: &str, message: &str) {
        let Some(file) = &mut self.file else {
            return;
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "{}", format_log_line(&stamp.to_string(), level, message));
    }
}

pub(crate) fn format_log_line(timestamp: &str, level: &str, message: &str) -> String {
    format!("[{timestamp}] {level:<5} {message}")
}
