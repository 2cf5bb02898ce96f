/*!
 * Reading and writing frames in the can-utils candump log format
 *
 * (1436509053.850870) vcan0 1A0#9C20407F96EA167B
 */

use std::fmt::Write;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use tracing::warn;

use crate::frame::{CanFrame, CAN_MAX_DATA_LEN};

/// A frame as recorded in a log, with capture time and interface.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedFrame {
    // Timestamp: Time the data was received (seconds)
    pub timestamp: f64,
    // Name of the CAN channel the data occurred on.
    pub channel: String,
    pub frame: CanFrame,
}

/// Turn hex data from candump log into byte values
pub fn candump_hex_to_bytes(hex_str: &str) -> anyhow::Result<([u8; CAN_MAX_DATA_LEN], u8)> {
    if hex_str.len() % 2 != 0 {
        bail!("odd number of hex digits in {hex_str}");
    }
    let len = hex_str.len() / 2;
    if len > CAN_MAX_DATA_LEN {
        bail!("{len} data bytes do not fit a classic CAN frame");
    }
    let mut data_bytes = [0; CAN_MAX_DATA_LEN];
    for (index, byte) in data_bytes.iter_mut().take(len).enumerate() {
        let pair = hex_str
            .get(index * 2..index * 2 + 2)
            .ok_or_else(|| anyhow!("invalid hex data {hex_str}"))?;
        *byte = u8::from_str_radix(pair, 16)?;
    }
    Ok((data_bytes, len as u8))
}

/// Parse a line in candump format
/// ```
/// let logged = canpack::candump::parse_candump_line("(1436509053.850870) vcan0 1A0#9C20407F96EA167B").unwrap();
/// assert_eq!(logged.frame.id, 0x1A0);
/// ```
pub fn parse_candump_line(line: &str) -> anyhow::Result<LoggedFrame> {
    let mut line_splits = line.split_whitespace();
    //Get timestamp
    let timestamp = line_splits
        .next()
        .ok_or_else(|| anyhow!("Error parsing timestamp of {line}"))?;
    let timestamp = timestamp
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| anyhow!("timestamp not in parentheses on {line}"))?
        .parse::<f64>()
        .with_context(|| format!("Error parsing timestamp of {line}"))?;
    // CAN interface name
    let channel = line_splits
        .next()
        .ok_or_else(|| anyhow!("Error parsing interface of {line}"))?;
    let id_and_data = line_splits
        .next()
        .ok_or_else(|| anyhow!("Error no id#data on {line}"))?;
    //"##" means it was CAN FD
    if id_and_data.contains("##") {
        bail!("CAN FD frames are not supported: {line}");
    }
    let (id, payload) = id_and_data
        .split_once('#')
        .ok_or_else(|| anyhow!("Error no id#data on {line}"))?;
    let id = u32::from_str_radix(id, 16).with_context(|| format!("Error parsing id of {line}"))?;
    let (data, dlc) = candump_hex_to_bytes(payload).with_context(|| format!("Error parsing data of {line}"))?;

    Ok(LoggedFrame {
        timestamp,
        channel: channel.to_owned(),
        frame: CanFrame { id, dlc, data },
    })
}

/// Convert a logged frame to an ascii candump line
pub fn frame_to_candump_line(logged: &LoggedFrame) -> String {
    let mut s = format!(
        "({:.6}) {} {:03X}#",
        logged.timestamp, logged.channel, logged.frame.id
    );
    for byte in logged.frame.payload() {
        // Writing into a String cannot fail
        let _ = write!(s, "{byte:02X}");
    }
    s
}

/// Iterator over the frames of a candump log. Lines that do not parse are
/// logged and skipped.
pub struct CandumpReader<R> {
    reader: R,
    buf: String, // local buf to re-use so we don't keep allocating
    line_number: usize,
}

impl CandumpReader<BufReader<File>> {
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CandumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for CandumpReader<R> {
    type Item = LoggedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.buf.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_candump_line(line) {
                        Ok(logged) => return Some(logged),
                        Err(error) => {
                            warn!(line = self.line_number, "skipping candump line: {error:#}")
                        }
                    }
                }
                Err(error) => {
                    warn!(line = self.line_number + 1, "stopped reading candump log: {error}");
                    return None;
                }
            }
        }
    }
}
