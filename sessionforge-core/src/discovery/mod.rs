//! Discovery of candidate credentials from ambient sources.
//!
//! This module provides:
//! - [`Importer`] - Trait for one ambient-source scanning strategy
//! - [`EnvVarPairImporter`] - Scans environment variables
//! - [`ConfigFileImporter`] - Scans the sections of an INI config file
//! - [`DiscoveryChain`] - Runs every importer and aggregates the results
//! - [`ImportAttempt`] - Candidates plus non-fatal errors of one run
//!
//! Unlike provisioning, discovery is best-effort: a failing importer is
//! recorded and the remaining importers still run.
//!
//! # Example
//!
//! ```rust,ignore
//! use sessionforge_core::discovery::{DiscoveryChain, ImportContext};
//! use sessionforge_core::presets;
//!
//! let attempt = presets::nirmata_discovery_chain().run(&ImportContext::from_environment());
//! for candidate in attempt.candidates() {
//!     println!("found credential in {}", candidate.source);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{FieldName, ItemFields};

mod config_file;
mod env_pair;

pub use config_file::ConfigFileImporter;
pub use env_pair::EnvVarPairImporter;

/// A single importer failed to read or parse its source.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A home-relative path was given but the home directory is unknown.
    #[error("cannot expand '{path}': home directory unknown")]
    HomeDirUnavailable { path: String },

    #[error("{}: file not found", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Ambient information available to importers.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    /// Directory that `~` expands to.
    pub home_dir: Option<PathBuf>,
}

impl ImportContext {
    /// Context for the current user.
    pub fn from_environment() -> Self {
        Self {
            home_dir: directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
        }
    }

    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }

    /// Expand a leading `~` to the home directory.
    pub fn expand_path(&self, path: &str) -> Result<PathBuf, DiscoveryError> {
        let rest = match path.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => return Ok(PathBuf::from(path)),
        };

        let home = self
            .home_dir
            .as_ref()
            .ok_or_else(|| DiscoveryError::HomeDirUnavailable {
                path: path.to_string(),
            })?;

        Ok(if rest.is_empty() {
            home.clone()
        } else {
            home.join(rest)
        })
    }
}

/// One self-consistent credential found in an ambient source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub fields: ItemFields,
    /// Where the candidate was found, for presentation.
    pub source: String,
}

impl ImportCandidate {
    pub fn new(fields: ItemFields, source: impl Into<String>) -> Self {
        Self {
            fields,
            source: source.into(),
        }
    }
}

/// Aggregated result of one discovery run.
#[derive(Debug, Default)]
pub struct ImportAttempt {
    candidates: Vec<ImportCandidate>,
    errors: Vec<DiscoveryError>,
}

impl ImportAttempt {
    pub fn candidates(&self) -> &[ImportCandidate] {
        &self.candidates
    }

    pub fn errors(&self) -> &[DiscoveryError] {
        &self.errors
    }

    /// True if nothing was found and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ImportCandidate>, Vec<DiscoveryError>) {
        (self.candidates, self.errors)
    }
}

/// A strategy scanning one ambient source for credentials.
pub trait Importer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Scan the source.
    ///
    /// Finding nothing is `Ok(vec![])`, not an error.
    fn import(&self, ctx: &ImportContext) -> Result<Vec<ImportCandidate>, DiscoveryError>;
}

/// Runs a fixed list of importers and merges their results.
///
/// Candidates keep registration order, then each importer's own order.
/// Candidates lacking a non-empty value for the required field are dropped.
pub struct DiscoveryChain {
    required: FieldName,
    importers: Vec<Box<dyn Importer>>,
}

impl DiscoveryChain {
    /// Create an empty chain whose candidates must carry `required`.
    pub fn new(required: FieldName) -> Self {
        Self {
            required,
            importers: Vec::new(),
        }
    }

    /// Append an importer.
    pub fn with(mut self, importer: impl Importer + 'static) -> Self {
        self.importers.push(Box::new(importer));
        self
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }

    /// Run every importer to completion.
    pub fn run(&self, ctx: &ImportContext) -> ImportAttempt {
        let mut attempt = ImportAttempt::default();

        for importer in &self.importers {
            match importer.import(ctx) {
                Ok(candidates) => {
                    tracing::trace!(importer = importer.name(), count = candidates.len(), "importer finished");
                    for candidate in candidates {
                        if candidate.fields.get_non_empty(&self.required).is_some() {
                            attempt.candidates.push(candidate);
                        } else {
                            tracing::debug!(
                                importer = importer.name(),
                                source = %candidate.source,
                                "discarding candidate without {}",
                                self.required
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(importer = importer.name(), error = %e, "importer failed");
                    attempt.errors.push(e);
                }
            }
        }

        attempt
    }
}

impl std::fmt::Debug for DiscoveryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.importers.iter().map(|i| i.name()).collect();
        f.debug_struct("DiscoveryChain")
            .field("required", &self.required)
            .field("importers", &names)
            .finish()
    }
}
