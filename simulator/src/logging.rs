use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tees formatted log lines to stdout and, optionally, a file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(File::create(path)?))),
            None => None,
        };
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl LogWriterGuard {
    fn with_file(&self, f: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let mut handle = file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        f(&mut handle)
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.with_file(Write::flush)
    }
}

/// Keeps the first few steps and a rolling tail, so a failure report shows how the run
/// started and what led up to the failure without logging every step.
pub(crate) struct EventLog {
    head: Vec<String>,
    head_cap: usize,
    tail: VecDeque<String>,
    tail_cap: usize,
    dropped: u64,
}

impl EventLog {
    pub(crate) fn new(head_cap: usize, tail_cap: usize) -> Self {
        Self {
            head: Vec::with_capacity(head_cap),
            head_cap,
            tail: VecDeque::with_capacity(tail_cap),
            tail_cap,
            dropped: 0,
        }
    }

    pub(crate) fn record(&mut self, line: String) {
        if self.head.len() < self.head_cap {
            self.head.push(line);
            return;
        }
        if self.tail_cap == 0 {
            self.dropped += 1;
            return;
        }
        if self.tail.len() == self.tail_cap {
            self.tail.pop_front();
            self.dropped += 1;
        }
        self.tail.push_back(line);
    }

    pub(crate) fn dump_failure(&self, reason: &str) {
        tracing::error!("invariant violated: {}", reason);
        for line in &self.head {
            tracing::error!("  {}", line);
        }
        if self.dropped > 0 {
            tracing::error!("  ... {} steps omitted ...", self.dropped);
        }
        for line in &self.tail {
            tracing::error!("  {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_head_and_rolling_tail() {
        let mut log = EventLog::new(2, 2);
        for i in 0..7 {
            log.record(format!("step {i}"));
        }
        assert_eq!(log.head, vec!["step 0", "step 1"]);
        assert_eq!(log.tail, vec!["step 5", "step 6"]);
        assert_eq!(log.dropped, 3);
    }
}
