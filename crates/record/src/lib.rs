//! Flat record codec.
//!
//! Records are length-prefixed, fixed-layout binary frames. A stream or
//! file begins with a [`FileHeader`] (`"RMD"` + version), followed by zero
//! or more [`Frame`]s. Each frame carries a [`FrameHeader`] and an opaque
//! body; callers interpret the body according to `header.record_type`.
//!
//! This crate only deals with framing: it does not know about table ids,
//! update numbers, or order transactions. `corestore-replication` and
//! `corestore-telemetry` both layer their own payloads on top of [`Frame`].

mod error;
mod frame;
mod heartbeat;

pub use error::RecordError;
pub use frame::{Frame, FrameHeader, MAX_FRAME_LEN};
pub use heartbeat::TimeBase;

/// Magic bytes at the start of every record file or stream.
pub const MAGIC: [u8; 3] = *b"RMD";

/// Current wire format version emitted by this crate.
pub const FORMAT_VERSION: (u16, u16) = (1, 0);

/// The 7-byte header preceding any sequence of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub vmajor: u16,
    pub vminor: u16,
}

impl FileHeader {
    pub const LEN: usize = 3 + 2 + 2;

    pub fn current() -> Self {
        Self {
            vmajor: FORMAT_VERSION.0,
            vminor: FORMAT_VERSION.1,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.vmajor.to_le_bytes());
        out.extend_from_slice(&self.vminor.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), RecordError> {
        if buf.len() < Self::LEN {
            return Err(RecordError::Truncated);
        }
        let (hdr, rest) = buf.split_at(Self::LEN);
        if &hdr[0..3] != &MAGIC {
            return Err(RecordError::BadMagic);
        }
        let vmajor = u16::from_le_bytes([hdr[3], hdr[4]]);
        let vminor = u16::from_le_bytes([hdr[5], hdr[6]]);
        // We only know how to read major version 1; newer majors may have
        // changed the frame layout in ways we cannot safely skip.
        if vmajor > FORMAT_VERSION.0 {
            return Err(RecordError::UnsupportedVersion { vmajor, vminor });
        }
        Ok((Self { vmajor, vminor }, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_round_trip() {
        let hdr = FileHeader::current();
        let mut buf = Vec::new();
        hdr.encode(&mut buf);
        let (decoded, rest) = FileHeader::decode(&buf).unwrap();
        assert_eq!(decoded, hdr);
        assert!(rest.is_empty());
    }

    #[test]
    fn bad_magic_rejected() {
        let buf = [0u8; FileHeader::LEN];
        assert!(matches!(FileHeader::decode(&buf), Err(RecordError::BadMagic)));
    }
}
