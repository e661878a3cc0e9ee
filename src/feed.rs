use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

use crate::queue::MessageQueue;
use crate::sbs;

/// Delay between connection attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Connects to the feed, retrying forever with a fixed delay.
///
/// A receiver restart should never take the monitor down, so connection
/// errors are only logged. Returns `None` once shutdown is requested.
pub async fn connect(
    host: &str,
    port: u16,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<TcpStream> {
    loop {
        if *shutdown.borrow() {
            return None;
        }
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                info!("connected to feed at {}:{}", host, port);
                return Some(stream);
            }
            Err(e) => {
                warn!("connecting to {}:{} failed: {}, retrying", host, port, e);
            }
        }
        tokio::select! {
            _ = time::sleep(RETRY_DELAY) => {}
            _ = shutdown.changed() => return None,
        }
    }
}

/// Reads feed lines and queues every retained record until shutdown.
///
/// The feed closing the connection is routine, dump1090 does it on
/// restart, so EOF and read errors lead straight back to `connect`.
pub async fn run_ingest(
    host: String,
    port: u16,
    queue: MessageQueue,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        let Some(stream) = connect(&host, port, &mut shutdown).await else {
            break;
        };
        let mut lines = BufReader::new(stream).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = shutdown.changed() => return Ok(()),
            };
            match line {
                Ok(Some(line)) => {
                    if let Some(msg) = sbs::parse_line(&line) {
                        queue.push(msg).await;
                    }
                }
                Ok(None) => {
                    info!("feed at {}:{} closed, reconnecting", host, port);
                    break;
                }
                Err(e) => {
                    warn!("feed read failed: {}, reconnecting", e);
                    break;
                }
            }
        }
    }
    Ok(())
}
