//! # Logging Setup
//!
//! `env_logger` configured from `--log-level` / `--log-target`. `RUST_LOG`
//! still takes precedence when set.

use std::fs::OpenOptions;
use std::io;

use box_core::{LogLevel, LogTarget};

/// Install the global logger
pub fn init(level: LogLevel, target: &LogTarget) -> io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()));
    builder.format_timestamp_millis();

    let unsupported = match target {
        LogTarget::Stderr => None,
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            None
        }
        other => Some(other),
    };

    // a logger may already be installed (tests, embedding)
    let _ = builder.try_init();

    if let Some(target) = unsupported {
        log::warn!("Log target '{}' is not available; logging to stderr", target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_target_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxd.log");
        init(LogLevel::Info, &LogTarget::File(path.clone())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_file_target() {
        let target = LogTarget::File("/nonexistent/dir/boxd.log".into());
        assert!(init(LogLevel::Info, &target).is_err());
    }
}
