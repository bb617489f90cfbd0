use std::{
    fs::{OpenOptions, create_dir_all},
    io,
    path::Path,
};

use env_logger::{Builder, Target};
use log::LevelFilter;

pub fn parse_level(log_level: &str) -> Option<LevelFilter> {
    match log_level.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Installs the global logger. Logs go to stderr unless `log_file` is set,
/// in which case they are appended to that file.
pub fn init_logger(log_level: &str, log_file: Option<&str>) -> io::Result<()> {
    let level = parse_level(log_level).unwrap_or_else(|| {
        eprintln!(
            "Invalid log level '{}', defaulting to 'info'",
            log_level
        );
        LevelFilter::Info
    });

    let mut builder = Builder::new();
    builder.filter_level(level).format_timestamp_secs();

    if let Some(log_file) = log_file {
        if let Some(parent) = Path::new(log_file).parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;

        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|err| io::Error::other(err.to_string()))
}
