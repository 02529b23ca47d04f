use std::path::{Path, PathBuf};

use simplelog::{ConfigBuilder, WriteLogger};

use crate::config::LoggingConfig;

/// Resolve the configured log file, expanding `~`. `None` when logging is off.
pub fn log_path(config: &LoggingConfig) -> Option<PathBuf> {
    let file = config.file.trim();
    if file.is_empty() || config.level_filter() == log::LevelFilter::Off {
        return None;
    }
    Some(PathBuf::from(shellexpand::tilde(file).into_owned()))
}

/// Install a file logger for the `log` facade.
/// Best-effort: failures are silently ignored (logging must never block a session).
/// Returns whether a logger was installed.
pub fn init(config: &LoggingConfig) -> bool {
    let Some(path) = log_path(config) else {
        return false;
    };
    let Some(file) = open_log(&path) else {
        return false;
    };
    let log_config = ConfigBuilder::new()
        .set_thread_level(log::LevelFilter::Debug)
        .set_target_level(log::LevelFilter::Error)
        .build();
    WriteLogger::init(config.level_filter(), log_config, file).is_ok()
}

fn open_log(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}
