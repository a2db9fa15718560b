//! Per-stream line reader that tags and forwards a child's stdout/stderr to
//! a [`LogSink`].
//!
//! Grounded directly on the reader tasks in the reference session code
//! (chunked `read()` loop breaking on `Ok(0) | Err(_)`) and on the original
//! `_log_fd` coroutine, adapted here to line-buffered reads since log
//! records are naturally line-shaped.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::logsink::{Level, LogSink, Record, Stream};

/// A spawned stdio pump. Dropping or calling [`StdioPump::abort`] cancels
/// the underlying read loop immediately, mirroring `ManagedSession`'s
/// `tasks.abort()` on kill.
pub struct StdioPump {
    handle: JoinHandle<()>,
}

impl StdioPump {
    /// Spawn a pump reading lines from `reader` and forwarding them to
    /// `sink` tagged with `tag`/`stream`, at `level`.
    pub fn spawn<R>(
        reader: R,
        tag: String,
        stream: Stream,
        level: Level,
        sink: Arc<dyn LogSink>,
    ) -> StdioPump
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        sink.emit(Record {
                            tag: tag.clone(),
                            stream,
                            level,
                            text: line,
                        });
                    }
                    Ok(None) => break, // EOF
                    Err(_) => break,
                }
            }
        });
        StdioPump { handle }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}
