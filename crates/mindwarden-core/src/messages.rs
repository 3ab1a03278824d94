//! Player-facing text lookup.
//!
//! The core never builds a sentence itself: it hands a key and positional
//! arguments to a [`Messages`] implementation and broadcasts what comes back.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

const EMBEDDED_EN_US: &str = include_str!("../locale/en_US.json");

/// Formats a message key with positional arguments.
pub trait Messages: Send + Sync {
    fn format(&self, key: &str, args: &[String]) -> String;
}

/// JSON-backed message catalog.
///
/// Nested objects are flattened with `.`, so `{"info": {"ver": ".."}}`
/// provides `info.ver`. Templates use `{}` placeholders consumed in order.
/// Unknown keys render as the key itself, which lets free text (such as the
/// configured notice) go through the same path.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    /// The English catalog compiled into the binary.
    pub fn embedded() -> Self {
        // The embedded file is covered by a unit test.
        Self::from_json(EMBEDDED_EN_US).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("invalid catalog JSON")?;
        let mut entries = HashMap::new();
        flatten("", &value, &mut entries);
        Ok(Self { entries })
    }

    /// Load `<dir>/<language>.json`, falling back to the embedded English
    /// catalog if the file is absent or unreadable. Keys missing from the
    /// loaded file are filled from the embedded catalog.
    pub fn load(dir: &Path, language: &str) -> Self {
        let mut catalog = Self::embedded();
        let path = dir.join(format!("{language}.json"));
        match std::fs::read_to_string(&path) {
            Ok(text) => match Self::from_json(&text) {
                Ok(loaded) => {
                    debug!(path = %path.display(), keys = loaded.len(), "Catalog loaded");
                    catalog.entries.extend(loaded.entries);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Catalog unreadable, using English")
                }
            },
            Err(_) => {
                warn!(path = %path.display(), "Catalog not found, using English");
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Messages for Catalog {
    fn format(&self, key: &str, args: &[String]) -> String {
        let template = self.get(key).unwrap_or(key);
        render(template, args)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Substitute `{}` placeholders in order. Arguments without a placeholder
/// are appended, separated by spaces; placeholders without an argument are
/// left empty.
fn render(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    for arg in args {
        out.push(' ');
        out.push_str(arg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let catalog = Catalog::embedded();
        assert!(catalog.get("error.cmd_permission_denied").is_some());
        assert!(catalog.get("info.votetick_fail").is_some());
        assert!(catalog.get("helps.host").is_some());
    }

    #[test]
    fn placeholders_are_positional() {
        let catalog = Catalog::from_json(r#"{"info": {"pair": "{} then {}"}}"#).unwrap();
        let text = catalog.format("info.pair", &["a".to_string(), "b".to_string()]);
        assert_eq!(text, "a then b");
    }

    #[test]
    fn unknown_key_passes_through() {
        let catalog = Catalog::default();
        assert_eq!(
            catalog.format("Welcome, join our Discord!", &[]),
            "Welcome, join our Discord!"
        );
        assert_eq!(catalog.format("helps.nope", &["nope".to_string()]), "helps.nope nope");
    }

    #[test]
    fn load_merges_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("de_DE.json"),
            r#"{"info": {"admin_added": "{} ist jetzt Admin."}}"#,
        )
        .unwrap();

        let catalog = Catalog::load(dir.path(), "de_DE");
        assert_eq!(
            catalog.format("info.admin_added", &["Bob".to_string()]),
            "Bob ist jetzt Admin."
        );
        assert!(catalog.get("info.maps_list").is_some());
    }

    #[test]
    fn missing_locale_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(dir.path(), "xx_XX");
        assert_eq!(catalog.len(), Catalog::embedded().len());
    }
}
