//! A single connection extension contributed by a package.

use serde::{Deserialize, Serialize};

/// One named connection extension owned by one package.
///
/// Serializes as `{"name": ..., "package": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    name: String,
    package: String,
}

impl ConnectionEntry {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
        }
    }

    /// Connection name, unique within its package. May be empty when the
    /// descriptor block had no `Name` field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the owning package.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Composite registry key, `<package>::<name>`.
    pub fn key(&self) -> String {
        registry_key(&self.package, &self.name)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "package": self.package,
        })
    }
}

/// Build the composite key under which an entry is stored.
pub fn registry_key(package: &str, name: &str) -> String {
    format!("{package}::{name}")
}
