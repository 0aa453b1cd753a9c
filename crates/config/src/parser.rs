//! The recursive-descent parser for the nested-scope config mini-language.
//! `%include`/`%define`/`${NAME}` interpolation is the reason this exists
//! instead of just using `toml`, which has no equivalent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::value::{Cf, Value};

/// `%define` bindings in scope for the current parse, resolved before the
/// process environment: a `${NAME}` first checks `defines`, then falls
/// back to `std::env::var`.
pub type Defines = BTreeMap<String, String>;

const MAX_FILE_SIZE: u64 = 1 << 20;

/// Parses `input` into a fresh [`Cf`], threading `defines` through nested
/// `%include`s so a `%define` earlier in the file is visible to included
/// files.
pub fn parse_str(input: &str, defines: &mut Defines) -> Result<Cf, ConfigError> {
    let mut scanner = Scanner::new(input);
    let mut cf = Cf::new();
    parse_scope_body(&mut scanner, &mut cf, defines, None)?;
    Ok(cf)
}

/// Parses a file, auto-defining `TOPDIR` (if unset) and `CURDIR` to its
/// parent directory so `%include`d paths can be written relative to it.
pub fn parse_file(path: impl AsRef<Path>, defines: &mut Defines) -> Result<Cf, ConfigError> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|source| ConfigError::FileOpen {
        path: path.to_owned(),
        source,
    })?;
    if meta.len() >= MAX_FILE_SIZE {
        return Err(ConfigError::FileTooBig { path: path.to_owned() });
    }
    let input = std::fs::read_to_string(path).map_err(|source| ConfigError::FileOpen {
        path: path.to_owned(),
        source,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    defines.entry("TOPDIR".to_owned()).or_insert_with(|| dir.display().to_string());
    defines.insert("CURDIR".to_owned(), dir.display().to_string());

    let mut scanner = Scanner::new(&input);
    let mut cf = Cf::new();
    parse_scope_body(&mut scanner, &mut cf, defines, Some(dir))?;
    Ok(cf)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            if self.peek() == Some('#') {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn syntax_error(&self) -> ConfigError {
        ConfigError::Syntax {
            line: self.line,
            near: self.peek().map(|c| c.to_string()).unwrap_or_default(),
        }
    }

    /// True if `c` ends an unquoted token: whitespace or one of the
    /// mini-language's structural characters.
    fn is_token_boundary(c: char) -> bool {
        c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ',' | '"' | '$' | '\\')
    }

    fn eat_word(&mut self) -> String {
        let mut out = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            out.push(self.advance().unwrap());
        }
        out
    }

    /// Scans one unquoted/quoted token, resolving `\x` escapes and
    /// `${NAME}` interpolation, matching `scanString`'s `File` variant.
    fn scan_token(&mut self, defines: &Defines) -> Result<String, ConfigError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => break,
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some(c) => out.push(c),
                        None => return Err(self.syntax_error()),
                    }
                }
                Some('$') if self.chars.get(self.pos + 1) == Some(&'{') => {
                    self.advance();
                    self.advance();
                    let name = self.eat_word();
                    if self.peek() != Some('}') {
                        return Err(self.syntax_error());
                    }
                    self.advance();
                    if let Some(value) = defines.get(&name).cloned().or_else(|| std::env::var(&name).ok()) {
                        out.push_str(&value);
                    }
                }
                Some('"') => {
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(self.syntax_error()),
                            Some('"') => {
                                self.advance();
                                break;
                            }
                            Some('\\') => {
                                self.advance();
                                match self.advance() {
                                    Some(c) => out.push(c),
                                    None => return Err(self.syntax_error()),
                                }
                            }
                            Some(c) => {
                                out.push(c);
                                self.advance();
                            }
                        }
                    }
                }
                Some(c) if Self::is_token_boundary(c) => break,
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        Ok(out)
    }
}

/// Parses key/value pairs into `cf` until EOF or an (unconsumed) closing
/// `}`, matching `fromString`'s main loop body between scope delimiters.
fn parse_scope_body(
    scanner: &mut Scanner,
    cf: &mut Cf,
    defines: &mut Defines,
    base_dir: Option<&Path>,
) -> Result<(), ConfigError> {
    loop {
        scanner.skip_ws_and_comments();
        if scanner.eof() || scanner.peek() == Some('}') {
            return Ok(());
        }
        if scanner.peek() == Some('%') {
            parse_directive(scanner, cf, defines, base_dir)?;
            continue;
        }
        let key = scanner.scan_token(defines)?;
        if key.is_empty() {
            return Err(scanner.syntax_error());
        }
        scanner.skip_ws_and_comments();
        let value = parse_value(scanner, defines, base_dir)?;
        match value {
            ParsedValue::Scalar(s) => cf.set(key, s),
            ParsedValue::Array(a) => cf.set_array(key, a),
            ParsedValue::Scope(s) => cf.set_scope(key, s),
            ParsedValue::ScopeArray(a) => cf.set_scope_array(key, a),
        }
    }
}

enum ParsedValue {
    Scalar(String),
    Array(Vec<String>),
    Scope(Cf),
    ScopeArray(Vec<Cf>),
}

fn parse_value(scanner: &mut Scanner, defines: &mut Defines, base_dir: Option<&Path>) -> Result<ParsedValue, ConfigError> {
    match scanner.peek() {
        Some('{') => {
            scanner.advance();
            let mut nested = Cf::new();
            parse_scope_body(scanner, &mut nested, defines, base_dir)?;
            scanner.skip_ws_and_comments();
            if scanner.peek() != Some('}') {
                return Err(scanner.syntax_error());
            }
            scanner.advance();
            Ok(ParsedValue::Scope(nested))
        }
        Some('[') => {
            scanner.advance();
            scanner.skip_ws_and_comments();
            let mut scalars = Vec::new();
            let mut scopes = Vec::new();
            loop {
                scanner.skip_ws_and_comments();
                if scanner.peek() == Some(']') {
                    scanner.advance();
                    break;
                }
                if scanner.peek() == Some('{') {
                    scanner.advance();
                    let mut nested = Cf::new();
                    parse_scope_body(scanner, &mut nested, defines, base_dir)?;
                    scanner.skip_ws_and_comments();
                    if scanner.peek() != Some('}') {
                        return Err(scanner.syntax_error());
                    }
                    scanner.advance();
                    scopes.push(nested);
                } else {
                    let before = scanner.pos;
                    let token = scanner.scan_token(defines)?;
                    if token.is_empty() && scanner.pos == before {
                        return Err(scanner.syntax_error());
                    }
                    scalars.push(token);
                }
                scanner.skip_ws_and_comments();
                if scanner.peek() == Some(',') {
                    scanner.advance();
                    continue;
                }
            }
            if !scalars.is_empty() && !scopes.is_empty() {
                return Err(scanner.syntax_error());
            }
            Ok(if !scopes.is_empty() {
                ParsedValue::ScopeArray(scopes)
            } else {
                ParsedValue::Array(scalars)
            })
        }
        _ => Ok(ParsedValue::Scalar(scanner.scan_token(defines)?)),
    }
}

fn parse_directive(
    scanner: &mut Scanner,
    cf: &mut Cf,
    defines: &mut Defines,
    base_dir: Option<&Path>,
) -> Result<(), ConfigError> {
    scanner.advance();
    let name = scanner.eat_word();
    scanner.skip_ws_and_comments();
    match name.as_str() {
        "include" => {
            let file = scanner.scan_token(defines)?;
            if file.is_empty() {
                return Err(scanner.syntax_error());
            }
            let path: PathBuf = if Path::new(&file).is_absolute() {
                PathBuf::from(file)
            } else {
                base_dir.unwrap_or_else(|| Path::new(".")).join(file)
            };
            tracing::debug!(path = %path.display(), "including config file");
            let included = parse_file(&path, defines)?;
            cf.merge(&included);
            Ok(())
        }
        "define" => {
            let var = scanner.eat_word();
            if var.is_empty() {
                return Err(ConfigError::BadDefine { name: String::new() });
            }
            scanner.skip_ws_and_comments();
            let value = scanner.scan_token(defines)?;
            defines.insert(var, value);
            Ok(())
        }
        _ => Err(scanner.syntax_error()),
    }
}
