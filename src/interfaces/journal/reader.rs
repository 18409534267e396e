use super::command::Command;
use crate::error::{LedgerError, Result};
use std::io::BufRead;

/// Reads commands from a JSON-lines journal.
///
/// Blank lines and lines starting with `#` are skipped. A line that fails to
/// parse yields an error without stopping the stream.
pub struct JournalReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> JournalReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Lazily parses the journal, one command per non-empty line.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.source.lines().filter_map(|line| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(LedgerError::Io(e))),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(serde_json::from_str(trimmed).map_err(LedgerError::from))
        })
    }
}
