//! Flat `KEY=VALUE` environment file store.
//!
//! Blank lines and `#` comments are ignored on read. A value wrapped in one
//! pair of double quotes is unescaped (`\"` and `\\`); one pair of single
//! quotes is stripped as-is. Writes emit keys in sorted order and
//! double-quote any value that would not read back verbatim. Comments do
//! not survive a rewrite.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{EnvError, EnvResult};
use crate::store::{EnvStore, Scope};

pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty file if none exists yet.
    pub fn ensure_exists(&self) -> EnvResult<()> {
        match std::fs::metadata(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                std::fs::write(&self.path, "").map_err(|source| EnvError::Write {
                    path: self.path.clone(),
                    source,
                })?;
                info!(path = ?self.path, "created empty env file");
                Ok(())
            }
            Err(source) => Err(EnvError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn read(&self) -> EnvResult<BTreeMap<String, String>> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| EnvError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse(&content))
    }

    fn write(&self, vars: &BTreeMap<String, String>) -> EnvResult<()> {
        std::fs::write(&self.path, render(vars)).map_err(|source| EnvError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl EnvStore for EnvFileStore {
    /// Both scopes target the same file, which every service loads.
    fn update(&self, scope: Scope<'_>, updates: &BTreeMap<String, String>) -> EnvResult<bool> {
        let mut vars = self.read()?;

        let mut changed = false;
        for (key, value) in updates {
            if vars.get(key) != Some(value) {
                vars.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        if changed {
            self.write(&vars)?;
            debug!(path = ?self.path, %scope, keys = updates.len(), "env file updated");
        }
        Ok(changed)
    }

    fn verify(&self) -> EnvResult<()> {
        self.read().map(|_| ())
    }

    fn describe(&self) -> String {
        format!("env:{}", self.path.display())
    }
}

fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
        .collect()
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match (c, chars.clone().next()) {
                ('\\', Some(next @ ('"' | '\\'))) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        }
        return out;
    }
    if let Some(inner) = value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return inner.to_string();
    }
    value.to_string()
}

fn needs_quotes(value: &str) -> bool {
    value.trim() != value || value.contains([' ', '"', '\'', '\\'])
}

fn render(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        if needs_quotes(value) {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            out.push_str(&format!("{key}=\"{escaped}\"\n"));
        } else {
            out.push_str(&format!("{key}={value}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(content: &str) -> (tempfile::TempDir, EnvFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidecar-injected.env");
        std::fs::write(&path, content).unwrap();
        (dir, EnvFileStore::new(path))
    }

    fn updates(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_skips_comments_and_strips_quotes() {
        let vars = parse("# header\n\nA=1\nB = \"two words\"\nC='x'\nmalformed\nD=a=b\n");
        assert_eq!(vars.len(), 4);
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "two words");
        assert_eq!(vars["C"], "x");
        assert_eq!(vars["D"], "a=b");
    }

    #[test]
    fn render_sorts_and_quotes() {
        let vars = updates(&[("Z", "last"), ("A", "has space"), ("M", "plain")]);
        assert_eq!(render(&vars), "A=\"has space\"\nM=plain\nZ=last\n");
    }

    #[test]
    fn update_twice_reports_changed_then_unchanged() {
        let (_dir, store) = fixture("");
        let batch = updates(&[("BLOCKSCOUT_HOST", "explorer.example.com")]);

        assert!(store.update(Scope::Shared(&[]), &batch).unwrap());
        assert!(!store.update(Scope::Shared(&[]), &batch).unwrap());
        assert_eq!(store.read().unwrap()["BLOCKSCOUT_HOST"], "explorer.example.com");
    }

    #[test]
    fn unchanged_update_leaves_file_byte_identical() {
        let original = "# keep me\nCOIN=ETH\n";
        let (_dir, store) = fixture(original);

        assert!(!store
            .update(Scope::Service("backend"), &updates(&[("COIN", "ETH")]))
            .unwrap());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn quoted_values_round_trip_without_spurious_change() {
        let (_dir, store) = fixture("");
        let batch = updates(&[("NEXT_PUBLIC_NETWORK_NAME", "Aurora Testnet")]);

        assert!(store.update(Scope::Shared(&[]), &batch).unwrap());
        assert!(!store.update(Scope::Shared(&[]), &batch).unwrap());
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "NEXT_PUBLIC_NETWORK_NAME=\"Aurora Testnet\"\n");
    }

    #[test]
    fn missing_file_is_an_error_until_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnvFileStore::new(dir.path().join("absent.env"));
        assert!(store.verify().is_err());

        store.ensure_exists().unwrap();
        assert!(store.verify().is_ok());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn unquote_strips_a_single_pair() {
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#""a\\b""#), r"a\b");
        assert_eq!(unquote(r#""\"x\"""#), r#""x""#);
        assert_eq!(unquote("'it''"), "it'");
        assert_eq!(unquote(r#"tail""#), r#"tail""#);
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn quote_characters_round_trip_without_spurious_change() {
        let (_dir, store) = fixture("");
        let batch = updates(&[
            ("NEXT_PUBLIC_NETWORK_NAME", r#"Aurora "Dev""#),
            ("TRAILING", r#"dev""#),
            ("LEADING", "'dev"),
            ("BACKSLASH", r"C:\dir\"),
            ("PADDED", " spaced "),
            ("FEATURED", "[{'title':'Aurora','url':'https://a.dev'}]"),
        ]);

        assert!(store.update(Scope::Shared(&[]), &batch).unwrap());
        assert!(!store.update(Scope::Shared(&[]), &batch).unwrap());
        assert_eq!(store.read().unwrap(), batch);
    }
}
