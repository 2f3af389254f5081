//! Discovery from environment variables.

use super::{DiscoveryError, ImportCandidate, ImportContext, Importer};
use crate::model::{FieldMapping, FieldName, ItemFields};

/// Looks for a credential in a fixed set of environment variables.
///
/// Produces exactly one candidate when the variable mapped to the required
/// field is set and non-empty, and none otherwise. Every other mapped
/// variable that is set and non-empty is added to that candidate.
#[derive(Debug, Clone)]
pub struct EnvVarPairImporter {
    mapping: FieldMapping,
    required: FieldName,
}

impl EnvVarPairImporter {
    pub fn new(mapping: FieldMapping, required: FieldName) -> Self {
        Self { mapping, required }
    }
}

impl Importer for EnvVarPairImporter {
    fn name(&self) -> &str {
        "environment"
    }

    fn import(&self, _ctx: &ImportContext) -> Result<Vec<ImportCandidate>, DiscoveryError> {
        let mut fields = ItemFields::new();

        for (name, field) in self.mapping.iter() {
            match std::env::var(name) {
                Ok(value) if !value.is_empty() => {
                    tracing::trace!(variable = name, "found environment variable");
                    fields.insert(field.clone(), value);
                }
                _ => {}
            }
        }

        if fields.get_non_empty(&self.required).is_none() {
            return Ok(Vec::new());
        }

        Ok(vec![ImportCandidate::new(fields, "environment")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer() -> EnvVarPairImporter {
        EnvVarPairImporter::new(
            FieldMapping::new()
                .with("SFTEST_PAIR_TOKEN", FieldName::TOKEN)
                .with("SFTEST_PAIR_URL", FieldName::ADDRESS),
            FieldName::TOKEN,
        )
    }

    #[test]
    fn test_empty_required_variable_yields_nothing() {
        temp_env::with_vars(
            [
                ("SFTEST_PAIR_TOKEN", Some("")),
                ("SFTEST_PAIR_URL", Some("https://nirmata.io")),
            ],
            || {
                let candidates = importer().import(&ImportContext::default()).unwrap();
                assert!(candidates.is_empty());
            },
        );
    }

    #[test]
    fn test_required_variable_only() {
        temp_env::with_vars(
            [
                ("SFTEST_PAIR_TOKEN", Some("tok")),
                ("SFTEST_PAIR_URL", None),
            ],
            || {
                let candidates = importer().import(&ImportContext::default()).unwrap();
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].fields.len(), 1);
                assert_eq!(candidates[0].source, "environment");
            },
        );
    }
}
