//! Nested-scope application configuration.
//!
//! - [`value`]: the [`Cf`] tree itself and its typed `get_*` accessors.
//! - [`parser`]: the `%include`/`%define`/`${...}` recursive-descent parser.
//! - [`toml_config`]: a `serde`/`toml`-based escape hatch for plain,
//!   non-nested-scope config blobs — the bespoke parser exists only for
//!   the nested-scope, define-and-include features `toml` can't express.
//! - [`error`]: [`ConfigError`], this crate's only error type.

mod error;
mod parser;
mod toml_config;
mod value;

pub use error::ConfigError;
pub use parser::{parse_file, parse_str, Defines};
pub use toml_config::load_toml;
pub use value::{Cf, Value};
