//! Docker log streaming.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use logfortress_core::{StreamLine, StreamMode, StreamOptions, StreamSession};
use tokio::sync::mpsc;

use crate::{ByteStream, ControlPlane, LineDecoder};

/// A handle to a live log stream.
///
/// Lines arrive in origin order. The stream ends when the origin ends,
/// after a single [`StreamLine::Notice`] if anything went wrong, or when
/// the handle is dropped. Dropping (or [`close`](Self::close)) detaches
/// from the container even if it is not producing output.
pub struct LogStream {
    session: StreamSession,
    rx: mpsc::Receiver<StreamLine>,
}

impl LogStream {
    /// Start streaming lines for `session`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        control_plane: Arc<dyn ControlPlane>,
        session: StreamSession,
        options: &StreamOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.buffer_lines.max(1));
        let task_session = session.clone();
        let follow_argv = task_session
            .path
            .as_deref()
            .map(|path| options.follow_argv(path));
        let max_line_bytes = options.max_line_bytes;

        tokio::spawn(async move {
            let attached = tokio::select! {
                attached = attach(control_plane.as_ref(), &task_session, follow_argv) => attached,
                () = tx.closed() => return,
            };

            match attached {
                Ok(origin) => pump(origin, &tx, max_line_bytes).await,
                Err(notice) => {
                    tracing::debug!(container = %task_session.container_ref, %notice, "stream not attached");
                    let _ = tx.send(StreamLine::Notice(notice)).await;
                }
            }
            tracing::debug!(container = %task_session.container_ref, mode = %task_session.mode, "log stream finished");
        });

        Self { session, rx }
    }

    /// A stream that yields a single notice and ends, without touching the control plane.
    pub fn notice(session: StreamSession, message: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(StreamLine::Notice(message.into()));
        Self { session, rx }
    }

    /// What this stream is following.
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Wait for the next line; `None` once the stream has ended.
    pub async fn next_line(&mut self) -> Option<StreamLine> {
        self.rx.recv().await
    }

    /// Stop streaming and release the origin.
    pub fn close(mut self) {
        self.rx.close();
    }
}

impl Stream for LogStream {
    type Item = StreamLine;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Resolve the container and open its origin, or describe why not.
async fn attach(
    control_plane: &dyn ControlPlane,
    session: &StreamSession,
    follow_argv: Option<Vec<String>>,
) -> Result<ByteStream, String> {
    let container = match control_plane.get_container(&session.container_ref).await {
        Ok(Some(container)) => container,
        Ok(None) => return Err(format!("Container {} not found.", session.container_ref)),
        Err(e) => return Err(format!("Error streaming logs: {e}")),
    };

    if !container.status.is_running() {
        return Err(format!("Container {} is not running.", container.name));
    }

    let origin = match (session.mode, follow_argv) {
        (StreamMode::Native, _) => control_plane.follow_logs(&container.id).await,
        (StreamMode::CustomFile, Some(argv)) => {
            control_plane.exec_follow(&container.id, &argv).await
        }
        (StreamMode::CustomFile, None) => {
            return Err(format!(
                "No custom log source registered for container '{}'.",
                session.container_ref
            ));
        }
    };

    origin.map_err(|e| format!("Error streaming logs: {e}"))
}

/// Forward decoded lines until the origin ends or the consumer goes away.
async fn pump(mut origin: ByteStream, tx: &mpsc::Sender<StreamLine>, max_line_bytes: usize) {
    let mut decoder = LineDecoder::new(max_line_bytes);

    loop {
        let chunk = tokio::select! {
            chunk = origin.next() => chunk,
            () = tx.closed() => {
                tracing::debug!("consumer closed the stream, detaching");
                return;
            }
        };

        match chunk {
            Some(Ok(bytes)) => {
                for line in decoder.push(&bytes) {
                    if tx.send(StreamLine::Output(line)).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                if let Some(rest) = decoder.finish() {
                    if tx.send(StreamLine::Output(rest)).await.is_err() {
                        return;
                    }
                }
                tracing::warn!(error = %e, "log origin failed");
                let _ = tx
                    .send(StreamLine::Notice(format!("Error streaming logs: {e}")))
                    .await;
                return;
            }
            None => {
                if let Some(rest) = decoder.finish() {
                    let _ = tx.send(StreamLine::Output(rest)).await;
                }
                return;
            }
        }
    }
}
