use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::stats;
use crate::window::WindowSamples;

/// Marker the monitoring agent reads as "no value this round".
const UNKNOWN: &str = "U";

/// Renders the six report fields in the order the agent graphs them:
/// spread, mean and count for the fix-interval series, then the same for
/// the displacement series.
pub fn render(samples: &WindowSamples) -> String {
    let mut out = String::new();
    push_series(&mut out, "ts", &samples.time_deltas);
    push_series(&mut out, "pos", &samples.ratios);
    out
}

fn push_series(out: &mut String, prefix: &str, samples: &[f64]) {
    let (mean, stddev) = match stats::mean_and_stddev(samples) {
        Some((mean, stddev)) => (mean.to_string(), stddev.to_string()),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };
    out.push_str(&format!("{}_sd.value {}\n", prefix, stddev));
    out.push_str(&format!("{}_mean.value {}\n", prefix, mean));
    out.push_str(&format!("{}_n.value {}\n", prefix, samples.len()));
}

/// Writes the rendered report, replacing the previous snapshot in one
/// rename so a concurrent reader never sees a half-written file.
///
/// The temp file lives next to the target to keep the rename on one
/// filesystem.
pub fn write(path: &Path, samples: &WindowSamples) -> Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, render(samples))
        .with_context(|| format!("writing snapshot temp file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("publishing snapshot {}", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
