//! Framing for the tracker's config dump protocol.
//!
//! The tracker answers an ETX control byte with a free-running text stream.
//! Somewhere in that stream the parameter table appears: it starts at a line
//! beginning with `Address` and ends at the next NMEA-style `$` line, or at
//! the first line without a `=` once the table has started.

use std::time::Duration;

use super::transport::Transport;
use super::{Result, SerialError, DUMP_REQUEST};

/// First line of the parameter table starts with this token.
const START_SENTINEL: &str = "Address";
/// Consecutive empty waits tolerated before the read is abandoned.
const STALL_BUDGET: u32 = 9;
/// Dumps shorter than this are truncated and treated as failures.
const MIN_CONFIG_BYTES: usize = 10;
/// Bound on each wait for the next line.
const LINE_WAIT: Duration = Duration::from_millis(1000);

/// Request a config dump and frame the response into raw parameter lines.
///
/// Lines before the start sentinel are discarded; the terminating line is
/// not included. Fails after [`STALL_BUDGET`] consecutive stalls, when the
/// port closes mid-read, or when the accumulated table is implausibly short.
pub async fn read_config(transport: &mut dyn Transport) -> Result<Vec<String>> {
    if !transport.is_open() {
        return Err(SerialError::ConnectionFailed("not connected".to_string()));
    }

    // Stale output from an earlier dump must not leak into this one.
    transport.clear_input()?;
    transport.write_all(&[DUMP_REQUEST]).await?;

    let mut lines: Vec<String> = Vec::new();
    let mut bytes = 0usize;
    let mut accumulating = false;
    let mut stalls = 0u32;

    loop {
        if !transport.is_open() {
            return Err(SerialError::ConnectionFailed(
                "port closed during config read".to_string(),
            ));
        }
        match transport.read_line(LINE_WAIT).await? {
            None => {
                stalls += 1;
                if stalls >= STALL_BUDGET {
                    log::warn!("Config read stalled {} times, giving up", stalls);
                    return Err(SerialError::Timeout);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Some(line) => {
                stalls = 0;
                if line.starts_with('$') {
                    break;
                }
                if accumulating && !line.contains('=') {
                    break;
                }
                if !accumulating {
                    accumulating = line.starts_with(START_SENTINEL);
                }
                if accumulating {
                    bytes += line.len();
                    lines.push(line);
                }
            }
        }
    }

    if bytes < MIN_CONFIG_BYTES {
        return Err(SerialError::ShortRead(bytes));
    }
    log::debug!("Read {} config lines ({} bytes)", lines.len(), bytes);
    Ok(lines)
}
