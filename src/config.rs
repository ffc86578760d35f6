//! the flat `gvars`-style configuration store.
//!
//! The original tool reads every tunable from one `key = value` text file,
//! queried throughout the codebase with a typed `get<T>("key")`-style
//! accessor. We keep that shape: a single [`Configuration`] parsed from text,
//! with typed getters that return [`ConfigError`] on a missing key or a value
//! that won't parse as the requested type.
//!
//! Some keys are re-read mid-run ("triggers" in the original gvars sense —
//! e.g. `learn_detector`'s temperature schedule can be nudged by rewriting the
//! config file between iterations). [`Configuration::reload`] re-parses the
//! backing text in place so callers holding a `&Configuration` see the new
//! values on their next `get`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::ConfigError;

/// A flat, ordered key/value store parsed from `key = value` lines.
///
/// Blank lines and lines starting with `#` are ignored. A key may repeat;
/// the last assignment wins, matching gvars' "last wins" semantics.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    values: HashMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Configuration {
            values: HashMap::new(),
        }
    }

    /// Parse `text` into a fresh `Configuration`.
    pub fn parse(text: &str) -> Result<Configuration, ConfigError> {
        let mut cfg = Configuration::new();
        cfg.reload(text)?;
        Ok(cfg)
    }

    /// Re-parse `text`, replacing all current keys with what `text` defines.
    /// Keys omitted from `text` remain set, matching gvars' "only overrides
    /// what it sees" reload behavior in `learn_detector`'s trigger mechanism.
    pub fn reload(&mut self, text: &str) -> Result<(), ConfigError> {
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::MalformedLine {
                line: lineno + 1,
                text: raw.to_string(),
            })?;
            self.values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn raw(&self, key: &str) -> Result<&str, ConfigError> {
        self.values
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.raw(key)
    }

    pub fn get_str_or(&self, key: &str, default: &'static str) -> &str {
        self.values.get(key).map(|s| s.as_str()).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ConfigError> {
        self.parse_typed(key, "a floating point number")
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ConfigError> {
        self.parse_typed(key, "an integer")
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str) -> Result<usize, ConfigError> {
        self.parse_typed(key, "a non-negative integer")
    }

    pub fn get_usize_or(&self, key: &str, default: usize) -> usize {
        self.get_usize(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let raw = self.raw(key)?;
        match raw {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::WrongType {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "a boolean",
            }),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Parse `key`'s value as a comma/whitespace-separated set of iteration
    /// numbers, matching gvars' `set<int>` rendering of the `triggers` key
    /// (`learn_detector.cc`'s `debug_triggers`). Used by the learner to
    /// decide which iterations re-read config via `trigger.<n>`.
    pub fn get_int_set(&self, key: &str) -> Result<BTreeSet<u64>, ConfigError> {
        let raw = self.raw(key)?;
        let mut set = BTreeSet::new();
        for tok in raw.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()) {
            let v: u64 = tok.parse().map_err(|_| ConfigError::WrongType {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "a set of integers",
            })?;
            set.insert(v);
        }
        Ok(set)
    }

    pub fn get_int_set_or(&self, key: &str, default: BTreeSet<u64>) -> BTreeSet<u64> {
        self.get_int_set(key).unwrap_or(default)
    }

    fn parse_typed<T>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
    {
        let raw = self.raw(key)?;
        raw.parse().map_err(|_| ConfigError::WrongType {
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        for k in keys {
            writeln!(f, "{} = {}", k, self.values[k])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_keys() {
        let cfg = Configuration::parse(
            "min_radius = 2.5\nmax_radius = 3.5\n# comment\n\nseed = 42\n",
        )
        .unwrap();
        assert_eq!(cfg.get_f64("min_radius").unwrap(), 2.5);
        assert_eq!(cfg.get_i64("seed").unwrap(), 42);
    }

    #[test]
    fn missing_key_errors() {
        let cfg = Configuration::new();
        assert!(matches!(
            cfg.get_f64("nope"),
            Err(ConfigError::MissingKey(_))
        ));
    }

    #[test]
    fn wrong_type_errors() {
        let cfg = Configuration::parse("foo = bar\n").unwrap();
        assert!(matches!(
            cfg.get_f64("foo"),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn malformed_line_errors() {
        let err = Configuration::parse("this is not kv\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn last_assignment_wins_on_reload() {
        let mut cfg = Configuration::parse("x = 1\n").unwrap();
        cfg.reload("x = 2\n").unwrap();
        assert_eq!(cfg.get_i64("x").unwrap(), 2);
    }

    #[test]
    fn reload_preserves_unmentioned_keys() {
        let mut cfg = Configuration::parse("x = 1\ny = 2\n").unwrap();
        cfg.reload("x = 9\n").unwrap();
        assert_eq!(cfg.get_i64("x").unwrap(), 9);
        assert_eq!(cfg.get_i64("y").unwrap(), 2);
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        let cfg = Configuration::parse("a = true\nb = 0\nc = yes\n").unwrap();
        assert!(cfg.get_bool("a").unwrap());
        assert!(!cfg.get_bool("b").unwrap());
        assert!(cfg.get_bool("c").unwrap());
    }

    #[test]
    fn int_set_parses_comma_and_space_separated() {
        let cfg = Configuration::parse("triggers = 1, 5 10\n").unwrap();
        let set = cfg.get_int_set("triggers").unwrap();
        assert_eq!(set, BTreeSet::from([1, 5, 10]));
    }

    #[test]
    fn int_set_or_falls_back_on_missing_key() {
        let cfg = Configuration::new();
        assert_eq!(cfg.get_int_set_or("triggers", BTreeSet::new()), BTreeSet::new());
    }

    #[test]
    fn int_set_rejects_non_integer_token() {
        let cfg = Configuration::parse("triggers = 1, nope\n").unwrap();
        assert!(matches!(
            cfg.get_int_set("triggers"),
            Err(ConfigError::WrongType { .. })
        ));
    }
}
