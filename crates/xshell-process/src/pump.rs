//! Stream pump - drains one child stream to a chunk sink

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{ProcessError, StreamKind};

/// Receives each non-empty chunk read from a stream
pub type ChunkSink = Box<dyn FnMut(&[u8]) + Send>;

/// Summary of a finished pump
#[derive(Debug)]
pub struct PumpReport {
    /// Stream that was drained
    pub stream: StreamKind,
    /// Total bytes read
    pub bytes: u64,
    /// Number of chunks forwarded (or discarded when there was no sink)
    pub chunks: u64,
    /// Read error that ended the pump, if any
    pub error: Option<ProcessError>,
}

impl PumpReport {
    /// True when the pump stopped at end of stream
    pub fn reached_eof(&self) -> bool {
        self.error.is_none()
    }
}

/// Reads a byte stream to exhaustion, forwarding chunks as they arrive
///
/// Without a sink the pump still drains the stream so the child never blocks
/// on a full pipe; the bytes are dropped.
pub struct StreamPump<R> {
    reader: R,
    stream: StreamKind,
    buffer_size: usize,
    sink: Option<ChunkSink>,
}

impl<R> StreamPump<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a pump over `reader` with no sink
    pub fn new(reader: R, stream: StreamKind) -> Self {
        Self {
            reader,
            stream,
            buffer_size: DEFAULT_BUFFER_SIZE,
            sink: None,
        }
    }

    /// Forward chunks to `sink`
    pub fn with_sink(mut self, sink: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Forward chunks to an optional boxed sink
    pub fn with_optional_sink(mut self, sink: Option<ChunkSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Override the scratch buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Drain the stream until EOF or a read error
    ///
    /// The reader is dropped before this returns in every case.
    pub async fn run(self) -> PumpReport {
        let StreamPump {
            mut reader,
            stream,
            buffer_size,
            mut sink,
        } = self;

        let mut buf = vec![0u8; buffer_size];
        let mut report = PumpReport {
            stream,
            bytes: 0,
            chunks: 0,
            error: None,
        };

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    report.bytes += n as u64;
                    report.chunks += 1;
                    if let Some(sink) = sink.as_mut() {
                        sink(&buf[..n]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(stream = %stream, error = %e, "Stream read failed, stopping pump");
                    report.error = Some(ProcessError::io(stream, e));
                    break;
                }
            }
        }

        drop(reader);
        debug!(
            stream = %stream,
            bytes = report.bytes,
            chunks = report.chunks,
            "Stream pump finished"
        );
        report
    }
}
