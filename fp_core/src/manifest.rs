//! Project and package manifests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::VersionRequest;

/// The root project manifest: identity, scripts, and direct dependency
/// requests. Every field defaults so a sparse hand-edited file loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionRequest>,
    /// Declared but never installed by the pipeline.
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, VersionRequest>,
}

impl Manifest {
    /// The manifest `fp init` writes before prompting.
    pub fn project_default(name: &str) -> Self {
        let mut scripts = BTreeMap::new();
        scripts.insert("start".to_string(), "node index.js".to_string());

        Manifest {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: "My App".to_string(),
            main: "index.js".to_string(),
            scripts,
            dependencies: BTreeMap::new(),
            dev_dependencies: BTreeMap::new(),
        }
    }
}

/// The slice of an installed package's own `package.json` the linker needs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bin: BinTable,
}

/// The `bin` field comes in two shapes: a table of link name to relative
/// path, or a single path string that links under the package's basename.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinTable {
    Path(String),
    Table(BTreeMap<String, String>),
}

impl Default for BinTable {
    fn default() -> Self {
        BinTable::Table(BTreeMap::new())
    }
}

impl BinTable {
    /// Normalize to link-name → relative-path entries. `package_name` names
    /// the link for the single-string form (`@scope/pkg` links as `pkg`).
    pub fn entries(&self, package_name: &str) -> BTreeMap<String, String> {
        match self {
            BinTable::Table(table) => table.clone(),
            BinTable::Path(path) => {
                let link = package_name
                    .rsplit('/')
                    .next()
                    .unwrap_or(package_name)
                    .to_string();
                let mut table = BTreeMap::new();
                table.insert(link, path.clone());
                table
            }
        }
    }
}

/// Lowercase with an underscore between a lower/digit and upper boundary:
/// `MyApp` → `my_app`. Used for the default project name at init time.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_breaks = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_breaks {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_breaks = false;
        } else {
            prev_breaks = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}
