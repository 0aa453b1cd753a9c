use corestore_record::Frame;

use crate::error::TelemetryError;

const HEAP: u16 = 0;
const HASH_TBL: u16 = 1;
const THREAD: u16 = 2;
const MX: u16 = 3;
const QUEUE: u16 = 4;
const SOCKET: u16 = 5;
const ENGINE: u16 = 6;
const LINK: u16 = 7;
const DB: u16 = 8;
const DB_HOST: u16 = 9;
const DB_TABLE: u16 = 10;
const APP: u16 = 11;
const ALERT: u16 = 12;

/// The discriminated union of telemetry payload types this store reports.
/// Each scan materializes one or more of these and hands them to
/// [`Frame::new`]/[`Frame::encode_checksummed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryRecord {
    Heap { id: String },
    HashTbl { id: String },
    Thread { name: String, tid: u32 },
    Mx { id: String },
    Queue { queue_type: String, id: String },
    Socket { id: String },
    Engine { id: String },
    Link { id: String },
    Db,
    DbHost { id: String },
    DbTable { id: String },
    App { updated: bool },
    Alert {
        seq_no: u64,
        severity: u8,
        message: String,
    },
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn take_str(buf: &[u8]) -> Result<(String, &[u8]), TelemetryError> {
    if buf.len() < 4 {
        return Err(corestore_record::RecordError::Truncated.into());
    }
    let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let rest = &buf[4..];
    if rest.len() < len {
        return Err(corestore_record::RecordError::Truncated.into());
    }
    let s = String::from_utf8_lossy(&rest[..len]).into_owned();
    Ok((s, &rest[len..]))
}

impl TelemetryRecord {
    fn record_type(&self) -> u16 {
        match self {
            Self::Heap { .. } => HEAP,
            Self::HashTbl { .. } => HASH_TBL,
            Self::Thread { .. } => THREAD,
            Self::Mx { .. } => MX,
            Self::Queue { .. } => QUEUE,
            Self::Socket { .. } => SOCKET,
            Self::Engine { .. } => ENGINE,
            Self::Link { .. } => LINK,
            Self::Db => DB,
            Self::DbHost { .. } => DB_HOST,
            Self::DbTable { .. } => DB_TABLE,
            Self::App { .. } => APP,
            Self::Alert { .. } => ALERT,
        }
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Heap { id } | Self::HashTbl { id } | Self::Mx { id } | Self::Engine { id } => {
                push_str(&mut out, id)
            }
            Self::Socket { id } | Self::Link { id } | Self::DbHost { id } | Self::DbTable { id } => {
                push_str(&mut out, id)
            }
            Self::Thread { name, tid } => {
                push_str(&mut out, name);
                out.extend_from_slice(&tid.to_le_bytes());
            }
            Self::Queue { queue_type, id } => {
                push_str(&mut out, queue_type);
                push_str(&mut out, id);
            }
            Self::Db => {}
            Self::App { updated } => out.push(*updated as u8),
            Self::Alert {
                seq_no,
                severity,
                message,
            } => {
                out.extend_from_slice(&seq_no.to_le_bytes());
                out.push(*severity);
                push_str(&mut out, message);
            }
        }
        out
    }

    /// Builds the wire frame for this record. `nsec_delta` is relative to
    /// the subscriber's own connection-local time base, same convention as
    /// [`corestore_replication::Envelope`].
    pub fn to_frame(&self, nsec_delta: u32) -> Result<Frame, TelemetryError> {
        Ok(Frame::new(self.record_type(), 0, nsec_delta, self.encode_body())?)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, TelemetryError> {
        let body = &frame.body[..];
        Ok(match frame.header.record_type {
            HEAP => {
                let (id, _) = take_str(body)?;
                Self::Heap { id }
            }
            HASH_TBL => {
                let (id, _) = take_str(body)?;
                Self::HashTbl { id }
            }
            THREAD => {
                let (name, rest) = take_str(body)?;
                if rest.len() < 4 {
                    return Err(corestore_record::RecordError::Truncated.into());
                }
                let tid = u32::from_le_bytes(rest[0..4].try_into().unwrap());
                Self::Thread { name, tid }
            }
            MX => {
                let (id, _) = take_str(body)?;
                Self::Mx { id }
            }
            QUEUE => {
                let (queue_type, rest) = take_str(body)?;
                let (id, _) = take_str(rest)?;
                Self::Queue { queue_type, id }
            }
            SOCKET => {
                let (id, _) = take_str(body)?;
                Self::Socket { id }
            }
            ENGINE => {
                let (id, _) = take_str(body)?;
                Self::Engine { id }
            }
            LINK => {
                let (id, _) = take_str(body)?;
                Self::Link { id }
            }
            DB => Self::Db,
            DB_HOST => {
                let (id, _) = take_str(body)?;
                Self::DbHost { id }
            }
            DB_TABLE => {
                let (id, _) = take_str(body)?;
                Self::DbTable { id }
            }
            APP => Self::App {
                updated: body.first().copied().unwrap_or(0) != 0,
            },
            ALERT => {
                if body.len() < 9 {
                    return Err(corestore_record::RecordError::Truncated.into());
                }
                let seq_no = u64::from_le_bytes(body[0..8].try_into().unwrap());
                let severity = body[8];
                let (message, _) = take_str(&body[9..])?;
                Self::Alert {
                    seq_no,
                    severity,
                    message,
                }
            }
            other => {
                return Err(corestore_record::RecordError::LengthMismatch {
                    expected: 0,
                    actual: 0,
                    ty: other,
                }
                .into())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let records = vec![
            TelemetryRecord::Heap { id: "heap0".into() },
            TelemetryRecord::HashTbl { id: "hash0".into() },
            TelemetryRecord::Thread {
                name: "worker".into(),
                tid: 7,
            },
            TelemetryRecord::Mx { id: "mx0".into() },
            TelemetryRecord::Queue {
                queue_type: "ipc".into(),
                id: "orders".into(),
            },
            TelemetryRecord::Socket { id: "sock0".into() },
            TelemetryRecord::Engine { id: "eng0".into() },
            TelemetryRecord::Link { id: "link0".into() },
            TelemetryRecord::Db,
            TelemetryRecord::DbHost { id: "host0".into() },
            TelemetryRecord::DbTable { id: "orders".into() },
            TelemetryRecord::App { updated: true },
            TelemetryRecord::Alert {
                seq_no: 42,
                severity: 2,
                message: "disk low".into(),
            },
        ];
        for record in records {
            let frame = record.to_frame(0).unwrap();
            let decoded = TelemetryRecord::from_frame(&frame).unwrap();
            assert_eq!(decoded, record);
        }
    }
}
