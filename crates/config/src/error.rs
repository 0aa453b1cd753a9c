//! [`ConfigError`]: the error cases the config parser and accessors can
//! raise — a missing required key, a value out of range, a syntax error,
//! a file that can't be opened or is implausibly large, or an unknown
//! `${define}`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("\"{key}\" missing")]
    Required { key: String },

    #[error("\"{key}\": invalid bool value \"{value}\"")]
    BadBool { key: String, value: String },

    #[error("\"{key}\" out of range: min({min}) <= {value} <= max({max})")]
    Range { key: String, min: i64, max: i64, value: i64 },

    #[error("\"{key}\" out of range: min({min}) <= {value} <= max({max})")]
    RangeF64 { key: String, min: f64, max: f64, value: f64 },

    #[error("\"{key}\": \"{value}\" is not one of {allowed:?}")]
    BadEnum { key: String, value: String, allowed: Vec<&'static str> },

    #[error("syntax error at line {line} near '{near}'")]
    Syntax { line: u32, near: String },

    #[error("\"{path}\": {source}")]
    FileOpen { path: PathBuf, source: std::io::Error },

    #[error("\"{path}\" file too big")]
    FileTooBig { path: PathBuf },

    #[error("bad %define \"{name}\"")]
    BadDefine { name: String },

    #[error("{0}")]
    Toml(#[from] toml::de::Error),
}
