//! Line-oriented output channel of a plugin process

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Standard output and standard error of a plugin, shared by its context
#[derive(Clone)]
pub struct PluginOutput {
    stdout: SharedWriter,
    stderr: SharedWriter,
}

impl PluginOutput {
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Arc::new(Mutex::new(Box::new(stdout))),
            stderr: Arc::new(Mutex::new(Box::new(stderr))),
        }
    }

    /// The process's own standard streams
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }

    /// In-memory output, with a handle for reading back what was written
    pub fn captured() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        let output = Self::new(captured.stdout.clone(), captured.stderr.clone());
        (output, captured)
    }

    pub fn write_stdout_line(&self, line: &str) {
        write_line(&self.stdout, line);
    }

    pub fn write_stderr_line(&self, line: &str) {
        write_line(&self.stderr, line);
    }
}

fn write_line(writer: &SharedWriter, line: &str) {
    let Ok(mut writer) = writer.lock() else {
        return;
    };
    if let Err(e) = write_terminated(&mut **writer, line) {
        // the parent went away; nothing left to report to
        tracing::debug!(error = %e, "Failed to write plugin output");
    }
}

fn write_terminated(writer: &mut dyn Write, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Growable byte buffer usable as a writer from several clones
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        self.0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of [`PluginOutput::captured`]
#[derive(Clone, Default)]
pub struct CapturedOutput {
    pub stdout: SharedBuffer,
    pub stderr: SharedBuffer,
}

impl CapturedOutput {
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.contents().lines().map(str::to_string).collect()
    }

    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.contents().lines().map(str::to_string).collect()
    }
}
