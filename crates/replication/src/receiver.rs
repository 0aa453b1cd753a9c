use crate::envelope::{expected_len, Envelope};
use crate::error::ReplicationError;
use crate::gap::{AppendOutcome, GapTracker};
use crate::sender::ReplicationSender;
use corestore_record::Frame;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// A handle to the inbound half of one peer connection.
///
/// Decoded envelopes the caller should act on (in-order `Append`s,
/// `RecoverChunk`s, `End`s, incoming `Recover` requests, and `Heartbeat`s)
/// are delivered on [`Self::recv`]. Gap detection and the resulting
/// `Recover` request are handled internally: the caller never sees an
/// out-of-order `Append`.
pub struct ReplicationReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl ReplicationReceiver {
    /// Spawn the reader task over `source`, replying to detected gaps by
    /// publishing `Recover` requests through `reply_sender` (the outbound
    /// half of the same logical connection).
    pub fn spawn<R>(source: R, reply_sender: ReplicationSender) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = ReceiverActor {
            source,
            buf: Vec::with_capacity(4096),
            gap: GapTracker::new(),
            reply_sender,
            out: tx,
        };
        tokio::spawn(actor.run());
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

struct ReceiverActor<R> {
    source: R,
    buf: Vec<u8>,
    gap: GapTracker,
    reply_sender: ReplicationSender,
    out: mpsc::UnboundedSender<Envelope>,
}

impl<R: tokio::io::AsyncRead + Unpin + Send> ReceiverActor<R> {
    async fn run(mut self) {
        let mut read_buf = [0u8; 4096];
        loop {
            self.decode_available();
            match self.source.read(&mut read_buf).await {
                Ok(0) => {
                    tracing::info!("replication peer closed the connection");
                    return;
                }
                Ok(n) => self.buf.extend_from_slice(&read_buf[..n]),
                Err(e) => {
                    tracing::warn!(error = %e, "replication read failed");
                    return;
                }
            }
        }
    }

    /// Decode and dispatch every complete frame currently buffered,
    /// stopping as soon as what's left looks truncated.
    fn decode_available(&mut self) {
        loop {
            match Frame::decode(&self.buf, expected_len) {
                Ok((frame, rest)) => {
                    let consumed = self.buf.len() - rest.len();
                    self.buf.drain(0..consumed);
                    match Envelope::from_frame(&frame) {
                        Ok(envelope) => self.handle(envelope),
                        Err(e) => tracing::warn!(error = %e, "dropping unparseable replication frame"),
                    }
                }
                Err(_) => return,
            }
        }
    }

    fn handle(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Append { table_id, un, .. } => match self.gap.observe_append(table_id, un) {
                AppendOutcome::Apply => {
                    let _ = self.out.send(envelope);
                }
                AppendOutcome::Stale => {}
                AppendOutcome::GapDetected { expected } => {
                    tracing::warn!(table_id = table_id.0, expected = expected.0, got = un.0, "replication gap detected, requesting recovery");
                    let _ = self.reply_sender.publish(Envelope::Recover { table_id, from_un: expected });
                }
            },
            Envelope::RecoverChunk { table_id, un, .. } => {
                self.gap.observe_recover_chunk(table_id, un);
                let _ = self.out.send(envelope);
            }
            Envelope::End { table_id, to_un } => {
                self.gap.observe_end(table_id, to_un);
                let _ = self.out.send(envelope);
            }
            Envelope::Heartbeat { .. } | Envelope::Recover { .. } => {
                let _ = self.out.send(envelope);
            }
        }
    }
}
