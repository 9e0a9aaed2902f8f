//! Per-stream line readers

use crate::spec::OutputEncoding;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Read `stream` line by line into `tx` until end-of-stream.
///
/// The sender is dropped when the task ends, which closes the channel and
/// marks the stream as finished for the coordinator.
pub(crate) fn spawn_line_reader<R>(
    kind: StreamKind,
    stream: R,
    encoding: OutputEncoding,
    tx: mpsc::UnboundedSender<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!(stream = %kind, "Stream closed");
                    break;
                }
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                    }
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                    if tx.send(encoding.decode(&buf)).is_err() {
                        // coordinator is gone
                        break;
                    }
                }
                Err(e) => {
                    warn!(stream = %kind, error = %e, "Failed to read process output");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_splits_lines_and_strips_cr() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"one\r\ntwo\n\nlast";
        spawn_line_reader(StreamKind::Stdout, input, OutputEncoding::Utf8, tx)
            .await
            .unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["one", "two", "", "last"]);
    }
}
