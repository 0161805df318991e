//! The connections registry built by one indexing pass.
//!
//! A registry maps `<package>::<name>` to a [`ConnectionEntry`]. It is filled
//! by exactly one pass and then published read-only behind an `Arc`, so the
//! mutating methods below are only reachable while the pass still owns it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::entry::{ConnectionEntry, registry_key};
use crate::dcf::{self, DcfFields};

/// Descriptor blocks are separated by runs of two or more newlines.
static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("block separator regex is valid"));

/// Registry of connection extensions keyed by `<package>::<name>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionsRegistry {
    connections: BTreeMap<String, ConnectionEntry>,
}

impl ConnectionsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry with the same key.
    ///
    /// The key is built from `package` and the entry's name.
    pub fn add_entry(&mut self, package: &str, entry: ConnectionEntry) {
        self.connections
            .insert(registry_key(package, entry.name()), entry);
    }

    /// Add an entry built from parsed descriptor fields.
    ///
    /// A missing `Name` field yields an entry with an empty name rather than
    /// dropping the block.
    pub fn add_fields(&mut self, package: &str, fields: &DcfFields) {
        let name = match fields.get("Name") {
            Some(name) => name.clone(),
            None => {
                debug!(package, "Descriptor block has no Name field");
                String::new()
            }
        };
        self.add_entry(package, ConnectionEntry::new(name, package));
    }

    /// Index every descriptor block in the file at `path` under `package`.
    ///
    /// Read failures skip the file and parse failures skip the offending
    /// block; both are logged and never abort the caller's pass. Returns the
    /// number of blocks that produced an entry.
    pub fn add_file(&mut self, package: &str, path: &Path) -> usize {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(package, path = %path.display(), error = %e, "Failed to read connection descriptor");
                return 0;
            }
        };
        self.add_text(package, &contents, path)
    }

    /// Index descriptor text that did not come from a file.
    pub fn add_descriptor(&mut self, package: &str, contents: &str) -> usize {
        self.add_text(package, contents, Path::new("<inline>"))
    }

    fn add_text(&mut self, package: &str, contents: &str, origin: &Path) -> usize {
        let contents = normalize_line_endings(contents);
        let mut added = 0;

        for block in BLOCK_SEPARATOR.split(&contents) {
            if block.trim().is_empty() {
                continue;
            }
            match dcf::parse(block) {
                Ok(fields) => {
                    self.add_fields(package, &fields);
                    added += 1;
                }
                Err(e) => {
                    warn!(package, path = %origin.display(), error = %e, "Skipping malformed descriptor block");
                }
            }
        }

        added
    }

    /// Whether an entry exists for `package` and `name`.
    pub fn contains(&self, package: &str, name: &str) -> bool {
        self.connections.contains_key(&registry_key(package, name))
    }

    /// Look up an entry. Never inserts; a missing key yields `None`.
    pub fn get(&self, package: &str, name: &str) -> Option<&ConnectionEntry> {
        self.connections.get(&registry_key(package, name))
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.connections.values()
    }

    /// Serialize as a JSON object keyed by `<package>::<name>`.
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .connections
            .iter()
            .map(|(key, entry)| (key.clone(), entry.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
