use anyhow::{Context, Result};
use daemonize::Daemonize;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Forks into the background, writes the PID file and, when configured,
/// drops to the unprivileged account.
///
/// Must run while the process is still single threaded; the tokio runtime
/// is built only afterwards. With `daemon_user` set, the PID file is
/// chowned but the log and snapshot directories must already be writable
/// by that account.
pub fn detach(config: &Config) -> Result<()> {
    ensure_parent_dirs(config)?;

    let mut daemon = Daemonize::new()
        .pid_file(&config.pid_path)
        .working_directory("/");
    if let Some(user) = &config.daemon_user {
        daemon = daemon.user(user.as_str()).chown_pid_file(true);
    }
    if let Some(group) = &config.daemon_group {
        daemon = daemon.group(group.as_str());
    }
    daemon.start().context("daemonizing")?;
    Ok(())
}

/// Routes the log to the configured file through a non-blocking writer.
/// The returned guard flushes on drop and must live as long as the
/// process.
pub fn init_file_logging(log_path: &Path) -> Result<WorkerGuard> {
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = log_path.file_name().context("log path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn ensure_parent_dirs(config: &Config) -> Result<()> {
    for path in [&config.pid_path, &config.log_path, &config.snapshot_path] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn parent_directories_are_created_up_front() {
        let dir = tempdir().unwrap();
        let config = Config {
            pid_path: dir.path().join("run/sbsmon.pid"),
            log_path: dir.path().join("log/sbsmon.log"),
            snapshot_path: dir.path().join("state/deep/snapshot"),
            ..Config::default()
        };

        ensure_parent_dirs(&config).unwrap();
        assert!(dir.path().join("run").is_dir());
        assert!(dir.path().join("log").is_dir());
        assert!(dir.path().join("state/deep").is_dir());
    }

    #[test]
    fn bare_relative_paths_need_no_directories() {
        let config = Config {
            pid_path: PathBuf::from("sbsmon.pid"),
            log_path: PathBuf::from("sbsmon.log"),
            snapshot_path: PathBuf::from("snapshot"),
            ..Config::default()
        };
        ensure_parent_dirs(&config).unwrap();
    }
}
