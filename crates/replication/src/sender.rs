use crate::envelope::Envelope;
use crate::error::ReplicationError;
use corestore_record::TimeBase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// A handle to the outbound half of one peer connection.
///
/// Publishing never blocks: `publish` uses `try_send` on a bounded channel,
/// so the caller (typically `corestore-engine`'s commit hook) is paced by
/// whichever is slower, the network or the peer's acknowledgement rate.
/// Buffering is never unbounded — a full channel means the peer is too far
/// behind and is treated as disconnected rather than queued indefinitely.
#[derive(Clone)]
pub struct ReplicationSender {
    tx: mpsc::Sender<Envelope>,
    disconnected: Arc<AtomicBool>,
}

impl ReplicationSender {
    /// Spawn the writer task over `sink`, pacing publishes through a
    /// channel of `queue_depth` envelopes.
    pub fn spawn<W>(sink: W, queue_depth: usize) -> Self
    where
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_depth);
        let disconnected = Arc::new(AtomicBool::new(false));
        let actor = SenderActor {
            rx,
            sink,
            time_base: TimeBase::default(),
            heartbeat_sent: false,
            disconnected: disconnected.clone(),
        };
        tokio::spawn(actor.run());
        Self { tx, disconnected }
    }

    /// Enqueue `envelope` for transmission. Never awaits: returns
    /// [`ReplicationError::PeerDisconnected`] immediately if the channel is
    /// full (sustained congestion) or the writer task has exited (a write
    /// failed, or the peer closed its read side).
    pub fn publish(&self, envelope: Envelope) -> Result<(), ReplicationError> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(ReplicationError::PeerDisconnected);
        }
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("replication queue full, treating peer as disconnected");
                self.disconnected.store(true, Ordering::Release);
                Err(ReplicationError::PeerDisconnected)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.disconnected.store(true, Ordering::Release);
                Err(ReplicationError::PeerDisconnected)
            }
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }
}

struct SenderActor<W> {
    rx: mpsc::Receiver<Envelope>,
    sink: W,
    time_base: TimeBase,
    heartbeat_sent: bool,
    disconnected: Arc<AtomicBool>,
}

impl<W: tokio::io::AsyncWrite + Unpin + Send> SenderActor<W> {
    async fn run(mut self) {
        while let Some(envelope) = self.rx.recv().await {
            if let Envelope::Heartbeat { wall_ns, .. } = &envelope {
                self.time_base.reset(*wall_ns);
                self.heartbeat_sent = true;
            }
            let nsec_delta = if self.heartbeat_sent { self.time_base.delta_for(now_approx()) } else { 0 };
            let frame = match envelope.to_frame(nsec_delta) {
                Ok(f) => f,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode outbound replication frame");
                    continue;
                }
            };
            let mut buf = Vec::with_capacity(frame.encoded_len());
            frame.encode(&mut buf);
            if let Err(e) = self.sink.write_all(&buf).await {
                tracing::warn!(error = %e, "replication write failed, disconnecting peer");
                self.disconnected.store(true, Ordering::Release);
                break;
            }
        }
    }
}

/// Best-effort wall clock for `nsec_delta` framing. Real callers stamp
/// heartbeats with their own clock reading; frames in between use this to
/// compute an offset purely for diagnostics, since `Append`/`RecoverChunk`
/// ordering depends only on `Un`, never on `nsec_delta`.
fn now_approx() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::expected_len;
    use corestore_record::Frame;
    use corestore_storage::WriteOp;
    use corestore_table::{TableId, Un};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn publishes_are_written_to_the_sink() {
        let (client, mut server) = tokio::io::duplex(4096);
        let sender = ReplicationSender::spawn(client, 8);

        sender
            .publish(Envelope::Append {
                table_id: TableId(1),
                un: Un(1),
                op: WriteOp::Insert,
                row_buf: Box::from(&[9u8][..]),
            })
            .unwrap();

        let mut buf = vec![0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        let (frame, rest) = Frame::decode(&buf[..n], expected_len).unwrap();
        assert!(rest.is_empty());
        let envelope = Envelope::from_frame(&frame).unwrap();
        assert_eq!(
            envelope,
            Envelope::Append {
                table_id: TableId(1),
                un: Un(1),
                op: WriteOp::Insert,
                row_buf: Box::from(&[9u8][..]),
            }
        );
    }

    #[tokio::test]
    async fn full_queue_marks_peer_disconnected() {
        // A sink that never drains, so the bounded channel backs up.
        let (client, _server) = tokio::io::duplex(1);
        let sender = ReplicationSender::spawn(client, 1);

        let msg = || Envelope::End { table_id: TableId(0), to_un: Un(0) };
        // Saturate the channel: depth 1 plus whatever the writer task can
        // pull before blocking on a full `duplex` pipe.
        let mut saw_disconnect = false;
        for _ in 0..64 {
            if sender.publish(msg()).is_err() {
                saw_disconnect = true;
                break;
            }
        }
        assert!(saw_disconnect);
        assert!(sender.is_disconnected());
        assert!(sender.publish(msg()).is_err());
    }
}
