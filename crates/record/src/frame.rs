use crate::error::RecordError;

/// Compile-time cap on the total encoded size of a single frame
/// (header + body).
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Fixed-layout header preceding every frame's body.
///
/// Layout (little-endian): `length:u16, type:u16, shard:u16, nsec_delta:u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the body in bytes (not including this header).
    pub length: u16,
    /// Discriminator identifying how to interpret the body.
    pub record_type: u16,
    /// Shard/partition the record belongs to, if any (0 if not sharded).
    pub shard: u16,
    /// Nanoseconds elapsed since the last heartbeat's absolute timestamp.
    pub nsec_delta: u32,
}

impl FrameHeader {
    pub const LEN: usize = 2 + 2 + 2 + 4;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.record_type.to_le_bytes());
        out.extend_from_slice(&self.shard.to_le_bytes());
        out.extend_from_slice(&self.nsec_delta.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < Self::LEN {
            return Err(RecordError::Truncated);
        }
        let length = u16::from_le_bytes([buf[0], buf[1]]);
        let record_type = u16::from_le_bytes([buf[2], buf[3]]);
        let shard = u16::from_le_bytes([buf[4], buf[5]]);
        let nsec_delta = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]);
        Ok(Self {
            length,
            record_type,
            shard,
            nsec_delta,
        })
    }
}

/// A decoded frame: header plus an owned, verified body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(record_type: u16, shard: u16, nsec_delta: u32, body: Vec<u8>) -> Result<Self, RecordError> {
        let len = FrameHeader::LEN + body.len();
        if len > MAX_FRAME_LEN {
            return Err(RecordError::FrameTooLarge { len, cap: MAX_FRAME_LEN });
        }
        let length: u16 = body
            .len()
            .try_into()
            .map_err(|_| RecordError::FrameTooLarge { len, cap: MAX_FRAME_LEN })?;
        Ok(Self {
            header: FrameHeader {
                length,
                record_type,
                shard,
                nsec_delta,
            },
            body,
        })
    }

    /// Encoded size of this frame, not including any trailing checksum.
    pub fn encoded_len(&self) -> usize {
        FrameHeader::LEN + self.body.len()
    }

    /// Append the wire encoding of this frame (no checksum) to `out`.
    ///
    /// Used for the replication/telemetry network wire format, which relies
    /// on the underlying transport (TCP) for byte integrity.
    pub fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        out.extend_from_slice(&self.body);
    }

    /// Append the on-disk encoding of this frame, including a trailing
    /// CRC32C checksum over the header and body, to `out`.
    ///
    /// Used by the alert pipeline and any other durable-file writer.
    pub fn encode_checksummed(&self, out: &mut Vec<u8>) {
        let start = out.len();
        self.encode(out);
        let crc = crc32c::crc32c(&out[start..]);
        out.extend_from_slice(&crc.to_le_bytes());
    }

    /// Decode one frame from the front of `buf`, verifying that `length`
    /// matches `expected_len(record_type)` when it returns `Some`.
    ///
    /// Returns `(frame, rest)`. A body whose `record_type` is unrecognized
    /// by `expected_len` (returns `None`) is accepted as-is and skipped by
    /// the caller, per the wire format's "unknown types are skipped" rule.
    pub fn decode<'a>(
        buf: &'a [u8],
        expected_len: impl FnOnce(u16) -> Option<u16>,
    ) -> Result<(Self, &'a [u8]), RecordError> {
        let header = FrameHeader::decode(buf)?;
        let body_start = FrameHeader::LEN;
        let body_end = body_start
            .checked_add(header.length as usize)
            .ok_or(RecordError::Truncated)?;
        if buf.len() < body_end {
            return Err(RecordError::Truncated);
        }
        if let Some(expected) = expected_len(header.record_type) {
            if expected != header.length {
                return Err(RecordError::LengthMismatch {
                    expected,
                    actual: header.length as usize,
                    ty: header.record_type,
                });
            }
        }
        let body = buf[body_start..body_end].to_vec();
        Ok((Self { header, body }, &buf[body_end..]))
    }

    /// Decode one checksummed frame from the front of `buf`. See
    /// [`Self::encode_checksummed`].
    pub fn decode_checksummed<'a>(
        buf: &'a [u8],
        expected_len: impl FnOnce(u16) -> Option<u16>,
    ) -> Result<(Self, &'a [u8]), RecordError> {
        let (frame, rest) = Self::decode(buf, expected_len)?;
        let consumed = buf.len() - rest.len();
        if rest.len() < 4 {
            return Err(RecordError::Truncated);
        }
        let crc = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let actual = crc32c::crc32c(&buf[..consumed]);
        if crc != actual {
            return Err(RecordError::ChecksumMismatch);
        }
        Ok((frame, &rest[4..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wire_round_trip() {
        let frame = Frame::new(7, 3, 1_000_000, vec![1, 2, 3, 4]).unwrap();
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let (decoded, rest) = Frame::decode(&buf, |ty| (ty == 7).then_some(4)).unwrap();
        assert_eq!(decoded, frame);
        assert!(rest.is_empty());
    }

    #[test]
    fn checksummed_round_trip() {
        let frame = Frame::new(1, 0, 0, b"alert payload".to_vec()).unwrap();
        let mut buf = Vec::new();
        frame.encode_checksummed(&mut buf);
        let (decoded, rest) = Frame::decode_checksummed(&buf, |_| None).unwrap();
        assert_eq!(decoded, frame);
        assert!(rest.is_empty());
    }

    #[test]
    fn bitflip_detected_by_checksum() {
        let frame = Frame::new(1, 0, 0, vec![9; 32]).unwrap();
        let mut buf = Vec::new();
        frame.encode_checksummed(&mut buf);
        buf[FrameHeader::LEN + 1] ^= 0xFF;
        assert!(matches!(
            Frame::decode_checksummed(&buf, |_| None),
            Err(RecordError::ChecksumMismatch)
        ));
    }

    #[test]
    fn oversized_body_rejected() {
        let body = vec![0u8; MAX_FRAME_LEN];
        assert!(matches!(
            Frame::new(1, 0, 0, body),
            Err(RecordError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn length_mismatch_rejected() {
        let frame = Frame::new(5, 0, 0, vec![0; 10]).unwrap();
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let err = Frame::decode(&buf, |ty| (ty == 5).then_some(8)).unwrap_err();
        assert!(matches!(err, RecordError::LengthMismatch { .. }));
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let frame = Frame::new(5, 0, 0, vec![0; 10]).unwrap();
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        buf.truncate(buf.len() - 3);
        assert!(matches!(Frame::decode(&buf, |_| None), Err(RecordError::Truncated)));
    }

    proptest! {
        #[test]
        fn arbitrary_body_round_trips(body in proptest::collection::vec(any::<u8>(), 0..512), ty in any::<u16>(), shard in any::<u16>(), delta in any::<u32>()) {
            let frame = Frame::new(ty, shard, delta, body).unwrap();
            let mut buf = Vec::new();
            frame.encode(&mut buf);
            let (decoded, rest) = Frame::decode(&buf, |_| None).unwrap();
            prop_assert_eq!(decoded, frame);
            prop_assert!(rest.is_empty());
        }
    }
}
