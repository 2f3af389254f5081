//! Integration tests for the Nirmata discovery chain.
//!
//! These tests verify that the chain:
//! - Finds a token in NIRMATA_TOKEN / NIRMATA_URL
//! - Finds one candidate per usable section of ~/.nirmata/config
//! - Records unreadable sources as errors without dropping other candidates

use sessionforge_core::{
    discovery::{DiscoveryError, ImportContext},
    model::FieldName,
    presets::nirmata_discovery_chain,
};
use std::path::Path;

const TOKEN_VAR: &str = "NIRMATA_TOKEN";
const URL_VAR: &str = "NIRMATA_URL";

fn write_config(home: &Path, contents: &str) {
    std::fs::create_dir_all(home.join(".nirmata")).unwrap();
    std::fs::write(home.join(".nirmata/config"), contents).unwrap();
}

#[test]
fn test_env_pair_with_both_variables() {
    let home = tempfile::tempdir().unwrap();
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars(
        [(TOKEN_VAR, Some("env-token")), (URL_VAR, Some("https://env.nirmata.io"))],
        || {
            let attempt = nirmata_discovery_chain().run(&ctx);

            assert_eq!(attempt.candidates().len(), 1);
            let candidate = &attempt.candidates()[0];
            assert_eq!(candidate.fields.len(), 2);
            assert_eq!(candidate.fields.get(&FieldName::TOKEN).unwrap().expose(), "env-token");
            assert_eq!(
                candidate.fields.get(&FieldName::ADDRESS).unwrap().expose(),
                "https://env.nirmata.io"
            );
        },
    );
}

#[test]
fn test_env_pair_with_only_optional_variable() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), "");
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars(
        [(TOKEN_VAR, None), (URL_VAR, Some("https://env.nirmata.io"))],
        || {
            let attempt = nirmata_discovery_chain().run(&ctx);

            assert!(attempt.candidates().is_empty());
            assert!(attempt.errors().is_empty());
        },
    );
}

#[test]
fn test_config_file_with_partial_section() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "[default]\n\
         address = https://nirmata.io\n\
         email = dev@example.com\n\
         token = file-token\n\
         \n\
         [staging]\n\
         address = https://staging.nirmata.io\n",
    );
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars([(TOKEN_VAR, None::<&str>), (URL_VAR, None)], || {
        let attempt = nirmata_discovery_chain().run(&ctx);

        assert!(attempt.errors().is_empty());
        assert_eq!(attempt.candidates().len(), 1);

        let candidate = &attempt.candidates()[0];
        assert_eq!(candidate.source, "~/.nirmata/config [default]");
        assert_eq!(candidate.fields.get(&FieldName::TOKEN).unwrap().expose(), "file-token");
        assert_eq!(
            candidate.fields.get(&FieldName::ADDRESS).unwrap().expose(),
            "https://nirmata.io"
        );
        assert!(!candidate.fields.contains(&FieldName::EMAIL));
    });
}

#[test]
fn test_missing_config_file_keeps_env_candidate() {
    let home = tempfile::tempdir().unwrap();
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars([(TOKEN_VAR, Some("env-token")), (URL_VAR, None)], || {
        let attempt = nirmata_discovery_chain().run(&ctx);

        assert_eq!(attempt.candidates().len(), 1);
        assert_eq!(attempt.candidates()[0].source, "environment");
        assert_eq!(attempt.errors().len(), 1);
        assert!(matches!(attempt.errors()[0], DiscoveryError::FileNotFound { .. }));
    });
}

#[test]
fn test_missing_config_file_alone() {
    let home = tempfile::tempdir().unwrap();
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars([(TOKEN_VAR, None::<&str>), (URL_VAR, None)], || {
        let attempt = nirmata_discovery_chain().run(&ctx);

        assert!(attempt.candidates().is_empty());
        assert_eq!(attempt.errors().len(), 1);
    });
}

#[test]
fn test_malformed_config_file_is_recorded() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), "[unterminated");
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars([(TOKEN_VAR, Some("env-token")), (URL_VAR, None)], || {
        let attempt = nirmata_discovery_chain().run(&ctx);

        assert_eq!(attempt.candidates().len(), 1);
        assert_eq!(attempt.errors().len(), 1);
        assert!(matches!(attempt.errors()[0], DiscoveryError::Parse { .. }));
        assert!(attempt.errors()[0].to_string().contains(".nirmata/config"));
    });
}

#[test]
fn test_env_candidate_precedes_file_candidates() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), "[one]\ntoken = t1\n[two]\ntoken = t2\n");
    let ctx = ImportContext::default().with_home_dir(home.path());

    temp_env::with_vars([(TOKEN_VAR, Some("env-token")), (URL_VAR, None)], || {
        let attempt = nirmata_discovery_chain().run(&ctx);

        let tokens: Vec<&str> = attempt
            .candidates()
            .iter()
            .map(|c| c.fields.get(&FieldName::TOKEN).unwrap().expose())
            .collect();
        assert_eq!(tokens, vec!["env-token", "t1", "t2"]);
    });
}
