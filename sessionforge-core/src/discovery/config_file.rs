//! Discovery from INI-style config files.

use ini::Ini;
use std::io;
use std::path::Path;

use super::{DiscoveryError, ImportCandidate, ImportContext, Importer};
use crate::model::{FieldMapping, FieldName, ItemFields};

/// Label for keys that appear before any `[section]` header.
const GLOBAL_SECTION_LABEL: &str = "(global)";

/// Looks for credentials in the sections of an INI config file.
///
/// Each section yields at most one candidate built from the keys in the
/// mapping. Keys not in the mapping are ignored. Sections without a
/// non-empty value for the required field are skipped.
///
/// # Example
///
/// ```rust,ignore
/// let importer = ConfigFileImporter::new(
///     "~/.nirmata/config",
///     FieldMapping::new()
///         .with("address", FieldName::ADDRESS)
///         .with("token", FieldName::TOKEN),
///     FieldName::TOKEN,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFileImporter {
    path: String,
    keys: FieldMapping,
    required: FieldName,
}

impl ConfigFileImporter {
    /// `path` may start with `~/` to refer to the home directory.
    pub fn new(path: impl Into<String>, keys: FieldMapping, required: FieldName) -> Self {
        Self {
            path: path.into(),
            keys,
            required,
        }
    }
}

impl Importer for ConfigFileImporter {
    fn name(&self) -> &str {
        &self.path
    }

    fn import(&self, ctx: &ImportContext) -> Result<Vec<ImportCandidate>, DiscoveryError> {
        let path = ctx.expand_path(&self.path)?;
        let contents = read_source(&path)?;

        // Values are taken literally; backslashes are not escape sequences.
        let parsed = Ini::load_from_str_noescape(&contents).map_err(|e| DiscoveryError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut candidates = Vec::new();
        for (section, properties) in parsed.iter() {
            let mut fields = ItemFields::new();
            for (key, field) in self.keys.iter() {
                if let Some(value) = properties.get(key).filter(|v| !v.is_empty()) {
                    fields.insert(field.clone(), value);
                }
            }

            if fields.get_non_empty(&self.required).is_none() {
                tracing::trace!(path = %path.display(), section = ?section, "section has no {}", self.required);
                continue;
            }

            let source = match section {
                Some(name) => format!("{} [{}]", self.path, name),
                None => format!("{} {}", self.path, GLOBAL_SECTION_LABEL),
            };
            candidates.push(ImportCandidate::new(fields, source));
        }

        Ok(candidates)
    }
}

fn read_source(path: &Path) -> Result<String, DiscoveryError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DiscoveryError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => DiscoveryError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })
}
