//! Background tasks that move data between the child's pipes and the
//! session's channels.

use crate::error::Result;
use crate::framing::LineFramer;
use crate::message::{Frame, Message};
use std::io::ErrorKind;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Handles of the pump tasks belonging to one session.
#[derive(Debug, Default)]
pub(crate) struct Pumps {
    pub(crate) stdin: Option<JoinHandle<Result<()>>>,
    pub(crate) stdout: Option<JoinHandle<Result<()>>>,
    pub(crate) stderr: Option<JoinHandle<Result<()>>>,
}

impl Pumps {
    pub(crate) fn abort_all(&self) {
        for handle in [&self.stdin, &self.stdout, &self.stderr].into_iter().flatten() {
            handle.abort();
        }
    }
}

/// Read the child's stdout, frame it, and forward every frame in order.
///
/// Stops on EOF (after flushing any unterminated tail) or as soon as nobody
/// is listening on `tx` any more.
pub(crate) async fn stdout_pump<R>(
    reader: R,
    mut framer: LineFramer,
    tx: mpsc::Sender<Frame>,
    pid: Option<u32>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = reader;
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let read = tokio::select! {
            read = reader.read(&mut chunk) => read?,
            () = tx.closed() => {
                debug!(?pid, "inbound receiver dropped; stopping stdout pump");
                return Ok(());
            }
        };

        if read == 0 {
            if let Some(frame) = framer.finish() {
                report(&frame, pid);
                let _ = tx.send(frame).await;
            }
            debug!(?pid, "tool server closed stdout");
            return Ok(());
        }

        for frame in framer.decode(&chunk[..read]) {
            report(&frame, pid);
            if tx.send(frame).await.is_err() {
                debug!(?pid, "inbound receiver dropped; stopping stdout pump");
                return Ok(());
            }
        }
    }
}

fn report(frame: &Frame, pid: Option<u32>) {
    match frame {
        Ok(_) => trace!(?pid, "received message"),
        Err(e) => warn!(?pid, error = %e, "unparseable line from tool server"),
    }
}

/// Write every outbound message to the child's stdin, flushing after each.
///
/// Stops when the outbound channel closes, or when the child has closed its
/// end of the pipe.
pub(crate) async fn stdin_pump<W>(
    writer: W,
    framer: LineFramer,
    mut rx: mpsc::Receiver<Message>,
    pid: Option<u32>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer;

    while let Some(message) = rx.recv().await {
        let line = match framer.encode(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!(?pid, error = %e, "dropping outbound message that failed to serialize");
                continue;
            }
        };

        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => trace!(?pid, bytes = line.len(), "sent message"),
            Err(e) if is_pipe_closed(&e) => {
                debug!(?pid, "tool server closed stdin; stopping stdin pump");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(?pid, "outbound channel closed; closing tool server stdin");
    // The child may already be gone; nothing left to deliver either way.
    let _ = writer.shutdown().await;
    Ok(())
}

fn is_pipe_closed(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
}

/// Forward each stderr line to `tracing`.
pub(crate) async fn stderr_pump<R>(reader: R, pid: Option<u32>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        debug!(target: "toolpipe_transport::stderr", ?pid, "{line}");
    }
    Ok(())
}
