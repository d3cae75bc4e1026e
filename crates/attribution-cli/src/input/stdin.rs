use attribution_core::data::csv_io::read_records;
use attribution_core::SectorRecord;
use std::io::{self, Read};

/// Read sector records CSV from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive) or the pipe is empty.
pub fn read_stdin_records() -> Result<Option<Vec<SectorRecord>>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let records = read_records(trimmed.as_bytes())?;
    tracing::debug!(records = records.len(), "read sector records from stdin");
    Ok(Some(records))
}
