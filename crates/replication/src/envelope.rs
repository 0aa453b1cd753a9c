use crate::error::ReplicationError;
use corestore_record::Frame;
use corestore_storage::WriteOp;
use corestore_table::{TableId, Un};

const HEARTBEAT: u16 = 1;
const APPEND: u16 = 2;
const RECOVER: u16 = 3;
const RECOVER_CHUNK: u16 = 4;
const END: u16 = 5;

/// One message on the point-to-point replication stream between a pair of
/// hosts. Frame bodies are hand-rolled little-endian layouts, reusing only
/// [`corestore_record::Frame`]'s length-prefixed envelope, not a
/// general-purpose serialization format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Heartbeat {
        wall_ns: u64,
        table_highs: Vec<(TableId, Un)>,
    },
    Append {
        table_id: TableId,
        un: Un,
        op: WriteOp,
        row_buf: Box<[u8]>,
    },
    Recover {
        table_id: TableId,
        from_un: Un,
    },
    RecoverChunk {
        table_id: TableId,
        un: Un,
        op: WriteOp,
        row_buf: Box<[u8]>,
    },
    End {
        table_id: TableId,
        to_un: Un,
    },
}

fn op_to_byte(op: WriteOp) -> u8 {
    match op {
        WriteOp::Insert => 0,
        WriteOp::Update => 1,
        WriteOp::Tombstone => 2,
    }
}

fn byte_to_op(b: u8) -> Result<WriteOp, ReplicationError> {
    match b {
        0 => Ok(WriteOp::Insert),
        1 => Ok(WriteOp::Update),
        2 => Ok(WriteOp::Tombstone),
        other => Err(ReplicationError::Protocol(format!("unknown write op byte {other}"))),
    }
}

/// No envelope variant has a fixed body length (the two row-carrying
/// variants are payload-sized and `Heartbeat` is watermark-count-sized), so
/// every record type is passed through [`corestore_record::Frame::decode`]
/// with no length check.
pub fn expected_len(_record_type: u16) -> Option<u16> {
    None
}

impl Envelope {
    fn record_type(&self) -> u16 {
        match self {
            Envelope::Heartbeat { .. } => HEARTBEAT,
            Envelope::Append { .. } => APPEND,
            Envelope::Recover { .. } => RECOVER,
            Envelope::RecoverChunk { .. } => RECOVER_CHUNK,
            Envelope::End { .. } => END,
        }
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Envelope::Heartbeat { wall_ns, table_highs } => {
                out.extend_from_slice(&wall_ns.to_le_bytes());
                out.extend_from_slice(&(table_highs.len() as u32).to_le_bytes());
                for (table_id, un) in table_highs {
                    out.extend_from_slice(&table_id.0.to_le_bytes());
                    out.extend_from_slice(&un.0.to_le_bytes());
                }
            }
            Envelope::Append { table_id, un, op, row_buf } => {
                out.extend_from_slice(&table_id.0.to_le_bytes());
                out.extend_from_slice(&un.0.to_le_bytes());
                out.push(op_to_byte(*op));
                out.extend_from_slice(row_buf);
            }
            Envelope::Recover { table_id, from_un } => {
                out.extend_from_slice(&table_id.0.to_le_bytes());
                out.extend_from_slice(&from_un.0.to_le_bytes());
            }
            Envelope::RecoverChunk { table_id, un, op, row_buf } => {
                out.extend_from_slice(&table_id.0.to_le_bytes());
                out.extend_from_slice(&un.0.to_le_bytes());
                out.push(op_to_byte(*op));
                out.extend_from_slice(row_buf);
            }
            Envelope::End { table_id, to_un } => {
                out.extend_from_slice(&table_id.0.to_le_bytes());
                out.extend_from_slice(&to_un.0.to_le_bytes());
            }
        }
        out
    }

    /// Encode this envelope as a [`Frame`], stamping `nsec_delta` (the
    /// caller computes this from its [`corestore_record::TimeBase`]
    /// relative to the last heartbeat it sent).
    pub fn to_frame(&self, nsec_delta: u32) -> Result<Frame, ReplicationError> {
        Ok(Frame::new(self.record_type(), 0, nsec_delta, self.encode_body())?)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ReplicationError> {
        let body = &frame.body[..];
        match frame.header.record_type {
            HEARTBEAT => {
                if body.len() < 12 {
                    return Err(ReplicationError::Protocol("truncated heartbeat".into()));
                }
                let wall_ns = u64::from_le_bytes(body[0..8].try_into().unwrap());
                let count = u32::from_le_bytes(body[8..12].try_into().unwrap()) as usize;
                let mut table_highs = Vec::with_capacity(count);
                let mut cursor = 12;
                for _ in 0..count {
                    if body.len() < cursor + 12 {
                        return Err(ReplicationError::Protocol("truncated heartbeat watermark".into()));
                    }
                    let table_id = TableId(u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap()));
                    let un = Un(u64::from_le_bytes(body[cursor + 4..cursor + 12].try_into().unwrap()));
                    table_highs.push((table_id, un));
                    cursor += 12;
                }
                Ok(Envelope::Heartbeat { wall_ns, table_highs })
            }
            APPEND | RECOVER_CHUNK => {
                if body.len() < 13 {
                    return Err(ReplicationError::Protocol("truncated append/recover-chunk".into()));
                }
                let table_id = TableId(u32::from_le_bytes(body[0..4].try_into().unwrap()));
                let un = Un(u64::from_le_bytes(body[4..12].try_into().unwrap()));
                let op = byte_to_op(body[12])?;
                let row_buf: Box<[u8]> = body[13..].into();
                if frame.header.record_type == APPEND {
                    Ok(Envelope::Append { table_id, un, op, row_buf })
                } else {
                    Ok(Envelope::RecoverChunk { table_id, un, op, row_buf })
                }
            }
            RECOVER => {
                if body.len() < 12 {
                    return Err(ReplicationError::Protocol("truncated recover".into()));
                }
                let table_id = TableId(u32::from_le_bytes(body[0..4].try_into().unwrap()));
                let from_un = Un(u64::from_le_bytes(body[4..12].try_into().unwrap()));
                Ok(Envelope::Recover { table_id, from_un })
            }
            END => {
                if body.len() < 12 {
                    return Err(ReplicationError::Protocol("truncated end".into()));
                }
                let table_id = TableId(u32::from_le_bytes(body[0..4].try_into().unwrap()));
                let to_un = Un(u64::from_le_bytes(body[4..12].try_into().unwrap()));
                Ok(Envelope::End { table_id, to_un })
            }
            other => Err(ReplicationError::Protocol(format!("unknown envelope record type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_round_trips() {
        let env = Envelope::Append {
            table_id: TableId(3),
            un: Un(42),
            op: WriteOp::Update,
            row_buf: Box::from(&[1u8, 2, 3][..]),
        };
        let frame = env.to_frame(1234).unwrap();
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let (decoded_frame, rest) = Frame::decode(&buf, expected_len).unwrap();
        assert!(rest.is_empty());
        assert_eq!(Envelope::from_frame(&decoded_frame).unwrap(), env);
    }

    #[test]
    fn heartbeat_round_trips_with_multiple_tables() {
        let env = Envelope::Heartbeat {
            wall_ns: 1_700_000_000_000,
            table_highs: vec![(TableId(0), Un(10)), (TableId(1), Un(99))],
        };
        let frame = env.to_frame(0).unwrap();
        assert_eq!(Envelope::from_frame(&frame).unwrap(), env);
    }

    #[test]
    fn recover_and_end_round_trip() {
        let recover = Envelope::Recover { table_id: TableId(5), from_un: Un(7) };
        let frame = recover.to_frame(0).unwrap();
        assert_eq!(Envelope::from_frame(&frame).unwrap(), recover);

        let end = Envelope::End { table_id: TableId(5), to_un: Un(20) };
        let frame = end.to_frame(0).unwrap();
        assert_eq!(Envelope::from_frame(&frame).unwrap(), end);
    }

    #[test]
    fn unknown_record_type_rejected() {
        let frame = Frame::new(99, 0, 0, vec![]).unwrap();
        assert!(matches!(Envelope::from_frame(&frame), Err(ReplicationError::Protocol(_))));
    }
}
