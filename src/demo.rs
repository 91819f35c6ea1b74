//! Demo recording and playback
//!
//! A demo is the command stream itself, one JSON object per line. Replaying
//! it into a fresh client reproduces the recorded game without running the
//! simulation.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::cmd::{Command, CommandLog};
use crate::error::DemoError;

/// Writes commands as JSON lines
#[derive(Debug)]
pub struct DemoRecorder<W: Write> {
    out: W,
    count: u64,
}

impl DemoRecorder<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DemoError> {
        let file = File::create(path.as_ref())?;
        log::info!("recording demo to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> DemoRecorder<W> {
    pub fn new(out: W) -> Self {
        Self { out, count: 0 }
    }

    pub fn record(&mut self, cmd: &Command) -> Result<(), DemoError> {
        serde_json::to_writer(&mut self.out, cmd)?;
        self.out.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Commands written so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn flush(&mut self) -> Result<(), DemoError> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Reads back a recorded stream
#[derive(Debug)]
pub struct DemoReader<R: BufRead> {
    input: R,
    line: String,
}

impl DemoReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DemoError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DemoReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for DemoReader<R> {
    type Item = Result<Command, DemoError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = self.line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(line).map_err(DemoError::from));
                }
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// Queue every command of a demo into `log`; returns how many were queued
///
/// Stops at the first bad record. Commands read before it stay queued.
pub fn replay_into<R: BufRead>(reader: DemoReader<R>, log: &mut CommandLog) -> Result<usize, DemoError> {
    let mut n = 0;
    for cmd in reader {
        match cmd {
            Ok(cmd) => {
                log.enqueue(cmd);
                n += 1;
            }
            Err(err) => {
                log::warn!("demo playback stopped after {n} commands: {err}");
                return Err(err);
            }
        }
    }
    Ok(n)
}
