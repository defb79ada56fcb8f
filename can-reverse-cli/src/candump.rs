//! candump log parsing
//!
//! Reads the `candump -l` line format:
//!
//! ```text
//! (1436509052.249713) can0 044#2A366C2BBA
//! ```
//!
//! Remote frames (`ID#R`) carry no payload and are skipped.

use can_reverse::CanRecord;
use std::fs;
use std::path::Path;
use thiserror::Error;

const MAX_STANDARD_ID: u32 = 0x7FF;
const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

#[derive(Debug, Error)]
pub enum CandumpError {
    #[error("line {line}: missing timestamp")]
    MissingTimestamp { line: usize },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: missing interface or frame field")]
    MissingField { line: usize },

    #[error("line {line}: malformed frame '{frame}'")]
    MalformedFrame { line: usize, frame: String },

    #[error("line {line}: arbitration id 0x{id:X} out of range")]
    IdOutOfRange { line: usize, id: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse one log line. Blank lines, comments and remote frames yield `None`.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<CanRecord>, CandumpError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let timestamp = fields
        .next()
        .and_then(|f| f.strip_prefix('('))
        .and_then(|f| f.strip_suffix(')'))
        .ok_or(CandumpError::MissingTimestamp { line: line_number })?;
    let timestamp: f64 = timestamp.parse().map_err(|_| CandumpError::InvalidTimestamp {
        line: line_number,
        value: timestamp.to_string(),
    })?;

    let _interface = fields.next().ok_or(CandumpError::MissingField { line: line_number })?;
    let frame = fields.next().ok_or(CandumpError::MissingField { line: line_number })?;
    let malformed = || CandumpError::MalformedFrame {
        line: line_number,
        frame: frame.to_string(),
    };

    let (id_text, data_text) = frame.split_once('#').ok_or_else(malformed)?;
    let id = u32::from_str_radix(id_text, 16).map_err(|_| malformed())?;
    let limit = if id_text.len() > 3 { MAX_EXTENDED_ID } else { MAX_STANDARD_ID };
    if id > limit {
        return Err(CandumpError::IdOutOfRange { line: line_number, id });
    }

    if data_text.starts_with('R') {
        log::trace!("line {}: skipping remote frame 0x{:X}", line_number, id);
        return Ok(None);
    }
    // CAN FD frames (`ID##<flags><data>`) are outside the classic 8 byte payload
    if data_text.starts_with('#') {
        log::debug!("line {}: skipping CAN FD frame 0x{:X}", line_number, id);
        return Ok(None);
    }

    let data = decode_hex(data_text).ok_or_else(malformed)?;
    if data.len() > 8 {
        return Err(malformed());
    }

    Ok(Some(CanRecord::new(timestamp, id, data)))
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let text: String = text.chars().filter(|c| *c != '.').collect();
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Parse a whole log held in memory
pub fn parse_str(content: &str) -> Result<Vec<CanRecord>, CandumpError> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(record) = parse_line(line, index + 1)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Read and parse a candump log file
pub fn read_log(path: &Path) -> Result<Vec<CanRecord>, CandumpError> {
    let content = fs::read_to_string(path)?;
    let records = parse_str(&content)?;
    log::info!("Read {} frame(s) from {:?}", records.len(), path);
    Ok(records)
}
