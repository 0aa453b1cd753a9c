//! The configuration tree itself: a node holds exactly one of a scalar
//! string, an array of strings, a nested scope, or an array of nested
//! scopes, stored in a `BTreeMap` for sorted iteration.

use std::collections::BTreeMap;

use crate::error::ConfigError;

/// One configuration value. An absent key is simply not in the map, so
/// there is no separate `Null` placeholder state.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Array(Vec<String>),
    Scope(Cf),
    ScopeArray(Vec<Cf>),
}

/// A configuration (sub)tree: a sorted map of keys to [`Value`]s, plus
/// the typed `get_*`/`assure_*` accessors that validate on read rather
/// than on parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cf {
    nodes: BTreeMap<String, Value>,
}

impl Cf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.nodes.insert(key.into(), Value::Scalar(value.into()));
    }

    pub fn set_array(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.nodes.insert(key.into(), Value::Array(values));
    }

    pub fn set_scope(&mut self, key: impl Into<String>, scope: Cf) {
        self.nodes.insert(key.into(), Value::Scope(scope));
    }

    pub fn set_scope_array(&mut self, key: impl Into<String>, scopes: Vec<Cf>) {
        self.nodes.insert(key.into(), Value::ScopeArray(scopes));
    }

    pub fn unset(&mut self, key: &str) {
        self.nodes.remove(key);
    }

    pub fn exists(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &str) -> Option<&Value> {
        self.nodes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.nodes.iter()
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Merges `other`'s nodes into `self`, overwriting on key collision —
    /// the behavior `%include` relies on (`Cf::merge`).
    pub fn merge(&mut self, other: &Cf) {
        for (key, value) in &other.nodes {
            self.nodes.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self.nodes.get(key) {
            Some(Value::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_required(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Required { key: key.to_owned() })
    }

    pub fn get_or<'a>(&'a self, key: &str, deflt: &'a str) -> &'a str {
        self.get(key).unwrap_or(deflt)
    }

    pub fn get_array(&self, key: &str) -> Option<&[String]> {
        match self.nodes.get(key) {
            Some(Value::Array(a)) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn get_scope(&self, key: &str) -> Option<&Cf> {
        match self.nodes.get(key) {
            Some(Value::Scope(cf)) => Some(cf),
            _ => None,
        }
    }

    pub fn get_scope_required(&self, key: &str) -> Result<&Cf, ConfigError> {
        self.get_scope(key).ok_or_else(|| ConfigError::Required { key: key.to_owned() })
    }

    pub fn get_scope_array(&self, key: &str) -> Option<&[Cf]> {
        match self.nodes.get(key) {
            Some(Value::ScopeArray(a)) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str, deflt: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(deflt),
            Some(v) => scan_bool(key, v),
        }
    }

    pub fn get_bool_required(&self, key: &str) -> Result<bool, ConfigError> {
        scan_bool(key, self.get_required(key)?)
    }

    pub fn get_i64(&self, key: &str, min: i64, max: i64, deflt: i64) -> Result<i64, ConfigError> {
        match self.get(key) {
            None => Ok(deflt),
            Some(v) => scan_i64(key, v, min, max),
        }
    }

    pub fn get_i64_required(&self, key: &str, min: i64, max: i64) -> Result<i64, ConfigError> {
        scan_i64(key, self.get_required(key)?, min, max)
    }

    pub fn get_u32(&self, key: &str, min: u32, max: u32, deflt: u32) -> Result<u32, ConfigError> {
        Ok(self.get_i64(key, min as i64, max as i64, deflt as i64)? as u32)
    }

    pub fn get_f64(&self, key: &str, min: f64, max: f64, deflt: f64) -> Result<f64, ConfigError> {
        match self.get(key) {
            None => Ok(deflt),
            Some(v) => scan_f64(key, v, min, max),
        }
    }

    /// `allowed` pairs each valid string spelling with a value to return.
    pub fn get_enum<T: Copy>(&self, key: &str, allowed: &[(&'static str, T)], deflt: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(deflt),
            Some(v) => scan_enum(key, v, allowed),
        }
    }

    pub fn get_enum_required<T: Copy>(&self, key: &str, allowed: &[(&'static str, T)]) -> Result<T, ConfigError> {
        scan_enum(key, self.get_required(key)?, allowed)
    }
}

fn scan_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::BadBool {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

fn scan_i64(key: &str, value: &str, min: i64, max: i64) -> Result<i64, ConfigError> {
    let v: i64 = value.parse().map_err(|_| ConfigError::Range {
        key: key.to_owned(),
        min,
        max,
        value: 0,
    })?;
    if v < min || v > max {
        return Err(ConfigError::Range {
            key: key.to_owned(),
            min,
            max,
            value: v,
        });
    }
    Ok(v)
}

fn scan_f64(key: &str, value: &str, min: f64, max: f64) -> Result<f64, ConfigError> {
    let v: f64 = value.parse().map_err(|_| ConfigError::RangeF64 {
        key: key.to_owned(),
        min,
        max,
        value: 0.0,
    })?;
    if v < min || v > max {
        return Err(ConfigError::RangeF64 {
            key: key.to_owned(),
            min,
            max,
            value: v,
        });
    }
    Ok(v)
}

fn scan_enum<T: Copy>(key: &str, value: &str, allowed: &[(&'static str, T)]) -> Result<T, ConfigError> {
    allowed
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, v)| *v)
        .ok_or_else(|| ConfigError::BadEnum {
            key: key.to_owned(),
            value: value.to_owned(),
            allowed: allowed.iter().map(|(name, _)| *name).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips() {
        let mut cf = Cf::new();
        cf.set("host", "localhost");
        assert_eq!(cf.get("host"), Some("localhost"));
    }

    #[test]
    fn missing_required_key_errors() {
        let cf = Cf::new();
        let err = cf.get_required("host").unwrap_err();
        assert!(matches!(err, ConfigError::Required { .. }));
    }

    #[test]
    fn bool_accepts_common_spellings() {
        let mut cf = Cf::new();
        cf.set("verbose", "yes");
        assert!(cf.get_bool("verbose", false).unwrap());
    }

    #[test]
    fn bad_bool_is_an_error() {
        let mut cf = Cf::new();
        cf.set("verbose", "maybe");
        let err = cf.get_bool("verbose", false).unwrap_err();
        assert!(matches!(err, ConfigError::BadBool { .. }));
    }

    #[test]
    fn i64_out_of_range_is_an_error() {
        let mut cf = Cf::new();
        cf.set("port", "99999");
        let err = cf.get_i64_required("port", 1, 65535).unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));
    }

    #[test]
    fn nested_scope_is_reachable() {
        let mut inner = Cf::new();
        inner.set("port", "9000");
        let mut outer = Cf::new();
        outer.set_scope("listen", inner);
        let listen = outer.get_scope("listen").unwrap();
        assert_eq!(listen.get("port"), Some("9000"));
    }

    #[test]
    fn enum_resolves_against_allowed_spellings() {
        let mut cf = Cf::new();
        cf.set("level", "warn");
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Level {
            Info,
            Warn,
            Error,
        }
        let allowed = [("info", Level::Info), ("warn", Level::Warn), ("error", Level::Error)];
        assert_eq!(cf.get_enum("level", &allowed, Level::Info).unwrap(), Level::Warn);
    }

    #[test]
    fn unknown_enum_spelling_is_an_error() {
        let mut cf = Cf::new();
        cf.set("level", "verbose");
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Level {
            Info,
        }
        let allowed = [("info", Level::Info)];
        let err = cf.get_enum_required("level", &allowed).unwrap_err();
        assert!(matches!(err, ConfigError::BadEnum { .. }));
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut base = Cf::new();
        base.set("a", "1");
        base.set("b", "2");
        let mut overlay = Cf::new();
        overlay.set("b", "20");
        base.merge(&overlay);
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("20"));
    }
}
