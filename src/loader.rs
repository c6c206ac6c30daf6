//! `name = value` file loader
//!
//! Format:
//! - a line that starts with whitespace continues the previous logical line;
//!   the newline and the continuation's leading whitespace become one space
//! - blank lines and lines whose first non-blank character is `#` are skipped
//!   (they do not end a logical line)
//! - every logical line must have the form `name = value`

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::backends::syntax::split_nameval;
use crate::config::LoaderSettings;
use crate::error::{DictError, Result};
use crate::table::DictHandle;

/// Iterator over logical lines, yielding `(first physical line number, text)`.
pub struct LogicalLines<R> {
    reader: R,
    line_no: usize,
    pending: Option<(usize, String)>,
    eof: bool,
}

impl<R: BufRead> LogicalLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pending: None,
            eof: false,
        }
    }
}

impl<R: BufRead> Iterator for LogicalLines<R> {
    type Item = io::Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut raw = String::new();
        while !self.eof {
            raw.clear();
            match self.reader.read_line(&mut raw) {
                Ok(0) => self.eof = true,
                Ok(_) => {
                    self.line_no += 1;
                    let line = raw.trim_end_matches(['\n', '\r']);
                    let body = line.trim_start();
                    if body.is_empty() || body.starts_with('#') {
                        continue;
                    }
                    let continues = line.len() != body.len();
                    if continues {
                        if let Some((_, text)) = self.pending.as_mut() {
                            text.truncate(text.trim_end().len());
                            text.push(' ');
                            text.push_str(body.trim_end());
                            continue;
                        }
                    }
                    let started = (self.line_no, body.trim_end().to_string());
                    if let Some(done) = self.pending.replace(started) {
                        return Some(Ok(done));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
        self.pending.take().map(Ok)
    }
}

/// Apply every `name = value` line of `reader` to `table`.
///
/// `origin` only labels error messages. Returns the number of entries read.
pub fn load_stream<R: BufRead>(table: &DictHandle, reader: R, origin: &Path) -> Result<usize> {
    let mut count = 0;
    for item in LogicalLines::new(reader) {
        let (line, text) = item.map_err(|e| DictError::io(origin.display().to_string(), e))?;
        let (name, value) = split_nameval(&text).map_err(|message| DictError::Syntax {
            origin: origin.to_path_buf(),
            line,
            message: format!("{message}: \"{text}\""),
        })?;
        table.update(name, value)?;
        count += 1;
    }
    debug!("{}: loaded {} entries into {}", origin.display(), count, table.label());
    Ok(count)
}

/// Load a file, re-reading it while it appears to be still changing.
///
/// After each full read the file's modification time is compared against
/// the wall clock before and after the read; a file modified within that
/// window (or one second before it) is read again after a pause.
pub fn load_file(table: &DictHandle, path: &Path, settings: &LoaderSettings) -> Result<usize> {
    let label = path.display().to_string();
    let mut before = unix_secs(SystemTime::now());
    loop {
        let file = File::open(path).map_err(|e| DictError::io(&label, e))?;
        let count = load_stream(table, BufReader::new(&file), path)?;
        let mtime = file
            .metadata()
            .and_then(|m| m.modified())
            .map(unix_secs)
            .map_err(|e| DictError::io(&label, e))?;
        let after = unix_secs(SystemTime::now());
        if mtime < before - 1 || mtime > after {
            return Ok(count);
        }
        info!("pausing to let {} cool down", label);
        std::thread::sleep(settings.cool_down_pause());
        before = after;
    }
}

fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
