use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds the {cap} byte cap")]
    FrameTooLarge { len: usize, cap: usize },

    #[error("frame declared length {expected} for type {ty}, but body was {actual} bytes")]
    LengthMismatch { expected: u16, actual: usize, ty: u16 },

    #[error("truncated frame")]
    Truncated,

    #[error("bad magic bytes, expected \"RMD\"")]
    BadMagic,

    #[error("unsupported format version {vmajor}.{vminor}")]
    UnsupportedVersion { vmajor: u16, vminor: u16 },

    #[error("checksum mismatch decoding frame")]
    ChecksumMismatch,
}
