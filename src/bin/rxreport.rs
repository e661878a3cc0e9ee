use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use sbsmon::stats;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Munin plugin reporting dump1090 receiver status")]
struct Args {
    /// Receiver status file, as written by dump1090
    #[clap(long, env = "RXREPORT_JSON", default_value = "/run/dump1090-fa/aircraft.json")]
    input: PathBuf,

    /// config, or a fetch when omitted
    mode: Option<String>,
}

/// One aircraft entry of the status file. The file carries many more keys
/// than the report needs; unknown ones are ignored.
#[derive(Debug, Deserialize)]
struct AircraftEntry {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    rssi: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReceiverStatus {
    /// Messages decoded since receiver start
    #[serde(default)]
    messages: Option<u64>,
    #[serde(default)]
    aircraft: Vec<AircraftEntry>,
}

fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    match args.mode.as_deref() {
        Some("config") => print!("{}", config_block()),
        None => print!("{}", report(&args.input)),
        Some(other) => {
            eprintln!("rxreport: unknown mode {:?}", other);
            eprintln!("usage: rxreport [--input <file>] [config]");
            std::process::exit(1);
        }
    }
}

fn config_block() -> &'static str {
    "graph_title ADS-B receiver status\n\
     graph_args --base 1000 -l 0\n\
     graph_category radio\n\
     graph_info Counters from the receiver's aircraft.json status file.\n\
     aircraft.label aircraft seen\n\
     positions.label aircraft with position\n\
     messages.label messages decoded\n\
     rssi_mean.label mean signal level (dBFS)\n"
}

/// The fetch output. An unreadable status file becomes a comment line and
/// a zero exit, the receiver being down is an answer in itself.
fn report(path: &Path) -> String {
    match read_status(path) {
        Ok(status) => render(&status),
        Err(e) => format!("# cannot read {}: {:#}\n", path.display(), e),
    }
}

fn read_status(path: &Path) -> Result<ReceiverStatus> {
    let content = std::fs::read_to_string(path).context("reading status file")?;
    serde_json::from_str(&content).context("decoding status file")
}

fn render(status: &ReceiverStatus) -> String {
    let positions = status
        .aircraft
        .iter()
        .filter(|a| a.lat.is_some() && a.lon.is_some())
        .count();
    let rssi: Vec<f64> = status.aircraft.iter().filter_map(|a| a.rssi).collect();

    let mut out = String::new();
    out.push_str(&format!("aircraft.value {}\n", status.aircraft.len()));
    out.push_str(&format!("positions.value {}\n", positions));
    match status.messages {
        Some(messages) => out.push_str(&format!("messages.value {}\n", messages)),
        None => out.push_str("messages.value U\n"),
    }
    match stats::mean_and_stddev(&rssi) {
        Some((mean, _)) => out.push_str(&format!("rssi_mean.value {}\n", mean)),
        None => out.push_str("rssi_mean.value U\n"),
    }
    out
}
