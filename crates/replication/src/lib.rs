//! The point-to-point replication channel between a pair of hosts that may
//! ever exchange the primary role.
//!
//! [`Envelope`] is the message set; [`sender::ReplicationSender`] paces
//! outbound frames over a bounded channel, and [`receiver::ReplicationReceiver`]
//! decodes inbound frames, tracking per-table ordering with a [`gap::GapTracker`]
//! and requesting recovery the moment a gap is observed. Neither side knows
//! about sockets directly: both are generic over `tokio::io::AsyncWrite`/
//! `AsyncRead`, so `corestore-cluster` supplies the actual `TcpStream` halves.

mod envelope;
mod error;
mod gap;
mod receiver;
mod sender;

pub use envelope::{expected_len, Envelope};
pub use error::ReplicationError;
pub use gap::{AppendOutcome, GapTracker};
pub use receiver::ReplicationReceiver;
pub use sender::ReplicationSender;
